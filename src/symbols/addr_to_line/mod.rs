pub mod dwarf;

pub use dwarf::DwarfLiner;

use crate::capturepb::LineInfo;

/// What a line table reports for an address it has no row for.
pub const INVALID_SOURCE_FILE: &str = "<invalid>";

/// LineTable resolves an address of an object file to a source location.
///
/// Implementations report a miss with [`invalid_line_info`] rather than an
/// error; callers decide whether a miss is fatal.
pub trait LineTable {
    fn lookup(&self, address: u64) -> anyhow::Result<LineInfo>;
}

pub fn invalid_line_info() -> LineInfo {
    LineInfo {
        source_file: INVALID_SOURCE_FILE.to_string(),
        source_line: 0,
    }
}

pub fn is_invalid(line_info: &LineInfo) -> bool {
    line_info.source_file == INVALID_SOURCE_FILE && line_info.source_line == 0
}
