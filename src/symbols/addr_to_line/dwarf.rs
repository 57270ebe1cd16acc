use std::borrow::Cow;
use std::rc::Rc;

use addr2line::Context;
use anyhow::Context as _;
use gimli::{EndianRcSlice, RunTimeEndian};
use object::{Object, ObjectSection};

use super::{invalid_line_info, LineTable};
use crate::capturepb::LineInfo;

/// DwarfLiner answers line queries from the DWARF sections of one image.
pub struct DwarfLiner {
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
}

impl DwarfLiner {
    pub fn try_new(data: &[u8]) -> anyhow::Result<Self> {
        let file = object::File::parse(data).context("Failed to parse object file")?;
        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        // Load a section, or an empty slice when the image lacks it.
        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section).context("Failed to load Dwarf sections")?;

        // Constructing a Context is somewhat costly, reuse it for every lookup.
        let ctx = Context::from_dwarf(dwarf).context("Failed to create Context")?;
        Ok(Self { ctx })
    }
}

impl LineTable for DwarfLiner {
    fn lookup(&self, address: u64) -> anyhow::Result<LineInfo> {
        let location = self
            .ctx
            .find_location(address)
            .context("Failed to lookup address")?;

        let line_info = match location {
            Some(addr2line::Location {
                file: Some(file),
                line: Some(line),
                ..
            }) => LineInfo {
                source_file: file.to_string(),
                source_line: line,
            },
            _ => invalid_line_info(),
        };

        Ok(line_info)
    }
}

impl std::fmt::Debug for DwarfLiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DwarfLiner").finish_non_exhaustive()
    }
}
