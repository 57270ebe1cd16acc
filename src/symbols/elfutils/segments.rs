use std::path::Path;

use object::elf;
use object::read::elf::{FileHeader, ProgramHeader};
use object::LittleEndian;

use crate::error::ElfError;

use super::parse_error;

/// load_bias returns the lowest virtual address of all PT_LOAD segments.
pub(crate) fn load_bias<Elf: FileHeader<Endian = LittleEndian>>(
    data: &[u8],
    path: &Path,
) -> Result<u64, ElfError> {
    let header = Elf::parse(data).map_err(|e| parse_error(path, e))?;
    let endian = header.endian().map_err(|e| parse_error(path, e))?;
    let program_headers = header
        .program_headers(endian, data)
        .map_err(|e| parse_error(path, e))?;

    if program_headers.is_empty() {
        let e = ElfError::NoProgramHeaders(path.to_path_buf());
        log::error!("{}", e);
        return Err(e);
    }

    let min_vaddr: Option<u64> = program_headers
        .iter()
        .filter(|phdr| phdr.p_type(endian) == elf::PT_LOAD)
        .map(|phdr| phdr.p_vaddr(endian).into())
        .min();

    match min_vaddr {
        Some(vaddr) => Ok(vaddr),
        None => {
            let e = ElfError::NoLoadSegment(path.to_path_buf());
            log::error!("{}", e);
            Err(e)
        }
    }
}
