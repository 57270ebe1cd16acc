use std::fmt::Write;
use std::path::Path;

use object::elf;
use object::read::elf::{FileHeader, SectionHeader};
use object::LittleEndian;

/// build_id concatenates the descriptor bytes of every GNU build-id note of
/// `section` as lowercase hex.
///
/// A malformed note stops the walk; what was collected so far is kept.
pub(crate) fn build_id<Elf: FileHeader<Endian = LittleEndian>>(
    section: &Elf::SectionHeader,
    endian: LittleEndian,
    data: &[u8],
    path: &Path,
) -> String {
    let mut build_id = String::new();

    let mut notes = match section.notes(endian, data) {
        Ok(Some(notes)) => notes,
        Ok(None) => return build_id,
        Err(e) => {
            log::warn!("Error while reading elf notes of \"{}\": {}", path.display(), e);
            return build_id;
        }
    };

    loop {
        match notes.next() {
            Ok(Some(note)) => {
                if note.n_type(endian) != elf::NT_GNU_BUILD_ID {
                    continue;
                }
                for byte in note.desc() {
                    let _ = write!(build_id, "{:02x}", byte);
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("Error while reading elf notes of \"{}\": {}", path.display(), e);
                break;
            }
        }
    }

    build_id
}
