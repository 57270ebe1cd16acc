use object::elf;
use object::read::elf::{Dyn, FileHeader, SectionHeader, SectionTable};
use object::LittleEndian;

/// soname returns the DT_SONAME entry of a SHT_DYNAMIC section, if any.
pub(crate) fn soname<Elf: FileHeader<Endian = LittleEndian>>(
    sections: &SectionTable<'_, Elf>,
    section: &Elf::SectionHeader,
    endian: LittleEndian,
    data: &[u8],
) -> Option<String> {
    let (entries, link) = section.dynamic(endian, data).ok()??;
    let strings = sections.strings(endian, data, link).ok()?;

    entries
        .iter()
        .take_while(|entry| entry.tag32(endian) != Some(elf::DT_NULL))
        .find(|entry| entry.tag32(endian) == Some(elf::DT_SONAME))
        .and_then(|entry| entry.string(endian, strings).ok())
        .map(|name| String::from_utf8_lossy(name).into_owned())
}
