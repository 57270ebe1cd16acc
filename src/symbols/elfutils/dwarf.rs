/// Sections whose presence means the image carries DWARF line information.
///
/// Compressed `.zdebug_info` is accepted too; gimli reads either through
/// `uncompressed_data`.
const DEBUG_INFO_SECTIONS: [&[u8]; 2] = [b".debug_info", b".zdebug_info"];

/// is_debug_info_section reports whether a section name denotes DWARF debug information.
pub(crate) fn is_debug_info_section(name: &[u8]) -> bool {
    DEBUG_INFO_SECTIONS.contains(&name)
}
