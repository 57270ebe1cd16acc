use crossbeam_channel::Sender;

use super::CallstackTable;
use crate::capturepb::{
    CallstackEvent, LinuxAddressInfo, ThreadStateSliceInfo, TimerInfo, TracepointEventInfo,
    TracepointInfo,
};

/// Everything a producer can deliver into a running capture.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Timer(TimerInfo),
    /// The callstack itself is already in the session's [`CallstackTable`].
    Callstack(CallstackEvent),
    AddressInfo(LinuxAddressInfo),
    ThreadName { thread_id: i32, name: String },
    ThreadStateSlice(ThreadStateSliceInfo),
    /// `tracepoint_info_key` of the info is its table key.
    TracepointInfo(TracepointInfo),
    TracepointEvent(TracepointEventInfo),
    KeyAndString { key: u64, string: String },
    /// Name of a manual instrumentation zone, keyed like `TimerInfo::function_address`.
    ZoneName { zone_id: u64, name: String },
}

/// EventSink is the producer side of a capture. It is cheap to clone and can
/// be moved to any thread.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Sender<CaptureEvent>,
    callstacks: CallstackTable,
}

impl EventSink {
    pub(crate) fn new(sender: Sender<CaptureEvent>, callstacks: CallstackTable) -> Self {
        Self { sender, callstacks }
    }

    /// Delivers `event`. Returns false once the capture no longer listens.
    pub fn send(&self, event: CaptureEvent) -> bool {
        match self.sender.send(event) {
            Ok(()) => true,
            Err(_) => {
                log::debug!("Dropping event, the capture is gone");
                false
            }
        }
    }

    pub fn timer(&self, timer_info: TimerInfo) -> bool {
        self.send(CaptureEvent::Timer(timer_info))
    }

    /// Records one sampled callstack of `thread_id`, innermost frame first.
    /// Returns the callstack hash.
    pub fn callstack_sample(&self, thread_id: i32, time: u64, frames: Vec<u64>) -> u64 {
        let callstack_hash = self.callstacks.insert(frames);
        self.send(CaptureEvent::Callstack(CallstackEvent {
            time,
            callstack_hash,
            thread_id,
        }));
        callstack_hash
    }
}
