//! Append-only storage for timers, chunked into fixed size blocks that each
//! remember the time span of everything added to them. Range queries skip
//! whole blocks whose span does not overlap the query.

use std::mem;

use crate::capturepb::TimerInfo;

pub const BLOCK_SIZE: usize = 1024;

/// Something that covers the closed interval `[start, end]` in time.
pub trait Timestamped {
    fn start(&self) -> u64;
    fn end(&self) -> u64;
}

impl Timestamped for TimerInfo {
    fn start(&self) -> u64 {
        self.start
    }

    fn end(&self) -> u64 {
        self.end
    }
}

#[derive(Debug, Clone)]
pub struct TimerBlock<T> {
    data: Vec<T>,
    min_timestamp: u64,
    max_timestamp: u64,
}

impl<T: Timestamped> TimerBlock<T> {
    fn new() -> Self {
        Self {
            data: Vec::with_capacity(BLOCK_SIZE),
            min_timestamp: u64::MAX,
            max_timestamp: u64::MIN,
        }
    }

    fn push(&mut self, item: T) -> &T {
        assert!(!self.at_capacity(), "timer block is full");
        self.min_timestamp = self.min_timestamp.min(item.start());
        self.max_timestamp = self.max_timestamp.max(item.end());
        self.data.push(item);
        &self.data[self.data.len() - 1]
    }

    /// Whether `[min, max]` overlaps the span of the timers added so far.
    pub fn intersects(&self, min: u64, max: u64) -> bool {
        min <= self.max_timestamp && max >= self.min_timestamp
    }

    pub fn min_timestamp(&self) -> u64 {
        self.min_timestamp
    }

    pub fn max_timestamp(&self) -> u64 {
        self.max_timestamp
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn at_capacity(&self) -> bool {
        self.data.len() == BLOCK_SIZE
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.data.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    /// Index of `element` if it is stored in this block.
    fn position_of(&self, element: &T) -> Option<usize> {
        let range = self.data.as_ptr_range();
        let ptr = element as *const T;
        if !range.contains(&ptr) {
            return None;
        }
        let offset = ptr as usize - range.start as usize;
        Some(offset / mem::size_of::<T>().max(1))
    }
}

/// TimerChain is the per-thread timeline of a capture.
///
/// Blocks are allocated on demand and live as long as the chain. Items are
/// never removed or reordered.
#[derive(Debug, Clone)]
pub struct TimerChain<T> {
    blocks: Vec<TimerBlock<T>>,
    num_items: usize,
}

impl<T> Default for TimerChain<T> {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            num_items: 0,
        }
    }
}

impl<T: Timestamped> TimerChain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `item` to the last block, starting a new block if it is full.
    pub fn push(&mut self, item: T) -> &T {
        let needs_block = self.blocks.last().map_or(true, TimerBlock::at_capacity);
        if needs_block {
            self.blocks.push(TimerBlock::new());
        }
        self.num_items += 1;
        let last = self.blocks.len() - 1;
        self.blocks[last].push(item)
    }

    pub fn len(&self) -> usize {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Iterates over blocks, not items.
    pub fn blocks(&self) -> std::slice::Iter<'_, TimerBlock<T>> {
        self.blocks.iter()
    }

    /// Blocks whose span overlaps `[min, max]`.
    pub fn blocks_intersecting(
        &self,
        min: u64,
        max: u64,
    ) -> impl Iterator<Item = &TimerBlock<T>> {
        self.blocks
            .iter()
            .filter(move |block| block.intersects(min, max))
    }

    /// Items overlapping `[min, max]`. Only blocks that intersect the range
    /// are inspected.
    pub fn items_in_range(&self, min: u64, max: u64) -> impl Iterator<Item = &T> {
        self.blocks_intersecting(min, max).flat_map(move |block| {
            block
                .iter()
                .filter(move |item| item.start() <= max && item.end() >= min)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.blocks.iter().flat_map(TimerBlock::iter)
    }

    fn locate(&self, element: &T) -> Option<(usize, usize)> {
        self.blocks
            .iter()
            .enumerate()
            .find_map(|(block_index, block)| {
                block
                    .position_of(element)
                    .map(|index| (block_index, index))
            })
    }

    /// The block that stores `element`, which must be a reference into this chain.
    pub fn block_containing(&self, element: &T) -> Option<&TimerBlock<T>> {
        let (block_index, _) = self.locate(element)?;
        Some(&self.blocks[block_index])
    }

    /// The item stored right after `element`, possibly in the next block.
    pub fn element_after(&self, element: &T) -> Option<&T> {
        let (block_index, index) = self.locate(element)?;
        match self.blocks[block_index].get(index + 1) {
            Some(next) => Some(next),
            None => self.blocks.get(block_index + 1)?.get(0),
        }
    }

    /// The item stored right before `element`, possibly in the previous block.
    pub fn element_before(&self, element: &T) -> Option<&T> {
        let (block_index, index) = self.locate(element)?;
        if index > 0 {
            return self.blocks[block_index].get(index - 1);
        }
        let previous = self.blocks.get(block_index.checked_sub(1)?)?;
        previous.get(previous.len().checked_sub(1)?)
    }
}
