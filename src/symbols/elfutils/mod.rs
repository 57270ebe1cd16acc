mod dwarf;
mod dynamic;
mod notes;
mod segments;
mod symtab;

use std::fmt;
use std::path::{Path, PathBuf};

use object::elf::{self, FileHeader32, FileHeader64};
use object::read::elf::{FileHeader, SectionHeader};
use object::{FileKind, LittleEndian};

use super::addr_to_line::{self, DwarfLiner, LineTable};
use super::Demangler;
use crate::capturepb::{LineInfo, ModuleSymbols};
use crate::error::ElfError;

/// Offset of the data encoding byte in `e_ident`.
const EI_DATA: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElfClass {
    Elf32,
    Elf64,
}

/// Runs a generic per-class helper with the header type matching `$class`.
macro_rules! with_elf {
    ($class:expr, $module:ident :: $func:ident ( $($arg:expr),* $(,)? )) => {
        match $class {
            ElfClass::Elf32 => $module::$func::<FileHeader32<LittleEndian>>($($arg),*),
            ElfClass::Elf64 => $module::$func::<FileHeader64<LittleEndian>>($($arg),*),
        }
    };
    ($class:expr, $func:ident ( $($arg:expr),* $(,)? )) => {
        match $class {
            ElfClass::Elf32 => $func::<FileHeader32<LittleEndian>>($($arg),*),
            ElfClass::Elf64 => $func::<FileHeader64<LittleEndian>>($($arg),*),
        }
    };
}

pub(crate) fn parse_error(path: &Path, e: object::read::Error) -> ElfError {
    ElfError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Facts gathered by the single section header pass done at construction.
#[derive(Debug, Default, Clone)]
struct SectionScan {
    has_symtab: bool,
    has_debug_info: bool,
    build_id: String,
    soname: String,
}

fn scan_sections<Elf: FileHeader<Endian = LittleEndian>>(
    data: &[u8],
    path: &Path,
) -> Result<SectionScan, ElfError> {
    let header = Elf::parse(data).map_err(|e| parse_error(path, e))?;
    let endian = header.endian().map_err(|e| parse_error(path, e))?;
    let sections = header
        .sections(endian, data)
        .map_err(|e| parse_error(path, e))?;

    let mut scan = SectionScan::default();
    for section in sections.iter() {
        let name = match sections.section_name(endian, section) {
            Ok(name) => name,
            Err(_) => {
                log::debug!("Unable to get section name in \"{}\"", path.display());
                continue;
            }
        };

        if name == b".symtab" {
            scan.has_symtab = true;
        }

        if dwarf::is_debug_info_section(name) {
            scan.has_debug_info = true;
        }

        match section.sh_type(endian) {
            elf::SHT_NOTE if name == b".note.gnu.build-id" => {
                scan.build_id
                    .push_str(&notes::build_id::<Elf>(section, endian, data, path));
            }
            elf::SHT_DYNAMIC => {
                if let Some(soname) = dynamic::soname(&sections, section, endian, data) {
                    scan.soname = soname;
                }
            }
            _ => {}
        }
    }

    Ok(scan)
}

fn load_symbols<Elf: FileHeader<Endian = LittleEndian>>(
    data: &[u8],
    path: &Path,
    demangler: &Demangler,
) -> Result<ModuleSymbols, ElfError> {
    let header = Elf::parse(data).map_err(|e| parse_error(path, e))?;
    let endian = header.endian().map_err(|e| parse_error(path, e))?;
    let sections = header
        .sections(endian, data)
        .map_err(|e| parse_error(path, e))?;

    let symbol_infos = symtab::function_symbols(&sections, endian, data, path, demangler)?;
    if symbol_infos.is_empty() {
        return Err(ElfError::NoFunctionSymbols(path.to_path_buf()));
    }

    Ok(ModuleSymbols { symbol_infos })
}

/// ElfFile is a little-endian ELF image held in memory.
///
/// Everything that a section walk can answer is computed once in
/// [`ElfFile::create_from_buffer`]; symbols, load bias and line info are
/// computed on request.
pub struct ElfFile {
    file_path: PathBuf,
    data: Vec<u8>,
    class: ElfClass,
    scan: SectionScan,
    liner: Option<Box<dyn LineTable>>,
}

impl ElfFile {
    pub fn create(file_path: impl Into<PathBuf>) -> Result<Self, ElfError> {
        let file_path = file_path.into();
        let data = std::fs::read(&file_path).map_err(|source| ElfError::Io {
            path: file_path.clone(),
            source,
        })?;
        Self::create_from_buffer(file_path, data)
    }

    pub fn create_from_buffer(
        file_path: impl Into<PathBuf>,
        data: Vec<u8>,
    ) -> Result<Self, ElfError> {
        let file_path = file_path.into();

        let class = match FileKind::parse(&*data) {
            Ok(FileKind::Elf32) => ElfClass::Elf32,
            Ok(FileKind::Elf64) => ElfClass::Elf64,
            _ => return Err(ElfError::UnsupportedFormat(file_path)),
        };

        if data.get(EI_DATA) != Some(&elf::ELFDATA2LSB) {
            return Err(ElfError::BigEndian(file_path));
        }

        let scan = with_elf!(class, scan_sections(&data, &file_path))?;

        Ok(Self {
            file_path,
            data,
            class,
            scan,
            liner: None,
        })
    }

    /// Replaces the DWARF backed line table, which is otherwise built on the
    /// first [`ElfFile::line_info`] call.
    pub fn with_line_table(mut self, liner: Box<dyn LineTable>) -> Self {
        self.liner = Some(liner);
        self
    }

    /// Returns every defined function symbol of `.symtab`, demangled.
    pub fn load_symbols(&self) -> Result<ModuleSymbols, ElfError> {
        if !self.scan.has_symtab {
            return Err(ElfError::NoSymtab(self.file_path.clone()));
        }
        let demangler = Demangler::new(false);
        with_elf!(
            self.class,
            load_symbols(&self.data, &self.file_path, &demangler)
        )
    }

    /// Returns the lowest virtual address among the loadable segments.
    pub fn load_bias(&self) -> Result<u64, ElfError> {
        with_elf!(self.class, segments::load_bias(&self.data, &self.file_path))
    }

    pub fn has_symtab(&self) -> bool {
        self.scan.has_symtab
    }

    pub fn has_debug_info(&self) -> bool {
        self.scan.has_debug_info
    }

    /// Hex encoded GNU build-id, empty when the image has no build-id note.
    pub fn build_id(&self) -> &str {
        &self.scan.build_id
    }

    /// DT_SONAME of the dynamic section, empty when absent.
    pub fn soname(&self) -> &str {
        &self.scan.soname
    }

    pub fn is_64_bit(&self) -> bool {
        self.class == ElfClass::Elf64
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Resolves `address` to a source location.
    ///
    /// # Panics
    /// The image must carry debug info; check [`ElfFile::has_debug_info`] first.
    pub fn line_info(&mut self, address: u64) -> Result<LineInfo, ElfError> {
        assert!(
            self.scan.has_debug_info,
            "line_info called on \"{}\" which has no debug info",
            self.file_path.display()
        );

        let no_line_info = |reason: String| ElfError::NoLineInfo {
            path: self.file_path.clone(),
            address,
            reason,
        };

        let liner = match self.liner.take() {
            Some(liner) => liner,
            None => {
                let liner = DwarfLiner::try_new(&self.data)
                    .map_err(|e| no_line_info(format!("{:#}", e)))?;
                Box::new(liner)
            }
        };
        let result = liner.lookup(address);
        self.liner = Some(liner);

        let line_info = result.map_err(|e| no_line_info(format!("{:#}", e)))?;
        if addr_to_line::is_invalid(&line_info) {
            return Err(no_line_info("no line table row covers the address".to_string()));
        }

        Ok(line_info)
    }
}

impl fmt::Debug for ElfFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElfFile")
            .field("file_path", &self.file_path)
            .field("class", &self.class)
            .field("scan", &self.scan)
            .finish_non_exhaustive()
    }
}
