use std::path::Path;

use object::elf;
use object::read::elf::{FileHeader, SectionTable, Sym};
use object::LittleEndian;

use crate::capturepb::SymbolInfo;
use crate::error::ElfError;
use crate::symbols::Demangler;

use super::parse_error;

/// function_symbols walks `.symtab` and returns every defined function symbol.
///
/// Undefined symbols are skipped. Data, section, file and other well-known
/// non-function types are skipped silently; a type code this walk does not
/// know is logged and skipped.
pub(crate) fn function_symbols<Elf: FileHeader<Endian = LittleEndian>>(
    sections: &SectionTable<'_, Elf>,
    endian: LittleEndian,
    data: &[u8],
    path: &Path,
    demangler: &Demangler,
) -> Result<Vec<SymbolInfo>, ElfError> {
    let symbols = sections
        .symbols(endian, data, elf::SHT_SYMTAB)
        .map_err(|e| parse_error(path, e))?;
    let strings = symbols.strings();

    let mut result = vec![];
    for symbol in symbols.iter() {
        if symbol.st_shndx(endian) == elf::SHN_UNDEF {
            continue;
        }

        let name = symbol
            .name(endian, strings)
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .unwrap_or_default();

        match symbol.st_type() {
            // IFUNC resolvers are functions too; LLVM reports both as ST_Function.
            elf::STT_FUNC | elf::STT_GNU_IFUNC => {}
            elf::STT_NOTYPE
            | elf::STT_OBJECT
            | elf::STT_SECTION
            | elf::STT_FILE
            | elf::STT_COMMON
            | elf::STT_TLS => continue,
            _ => {
                log::warn!(
                    "Type is not set for symbol \"{}\" in \"{}\", skipping.",
                    name,
                    path.display()
                );
                continue;
            }
        }

        result.push(demangler.demangle(&SymbolInfo {
            name,
            demangled_name: String::new(),
            address: symbol.st_value(endian).into(),
            size: symbol.st_size(endian).into(),
        }));
    }

    Ok(result)
}
