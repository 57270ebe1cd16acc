use std::path::{Path, PathBuf};

use object::FileKind;

use super::ElfFile;
use crate::error::ElfError;

/// ObjectFile classifies an on-disk image backing a module.
#[derive(Debug)]
pub enum ObjectFile {
    Elf(ElfFile),
    /// A PE/COFF image. Recognised so the module can be listed, never symbolized.
    Coff { file_path: PathBuf },
}

impl ObjectFile {
    /// Module name: the soname of an ELF image if it has one, otherwise the file name.
    pub fn name(&self) -> String {
        match self {
            ObjectFile::Elf(elf) if !elf.soname().is_empty() => elf.soname().to_string(),
            ObjectFile::Elf(elf) => file_name(elf.file_path()),
            ObjectFile::Coff { file_path } => file_name(file_path),
        }
    }

    pub fn is_elf(&self) -> bool {
        matches!(self, ObjectFile::Elf(_))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// create_object_file reads `path` and classifies it.
pub fn create_object_file(path: impl AsRef<Path>) -> Result<ObjectFile, ElfError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| ElfError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match FileKind::parse(&*data) {
        Ok(FileKind::Elf32 | FileKind::Elf64) => {
            Ok(ObjectFile::Elf(ElfFile::create_from_buffer(path, data)?))
        }
        Ok(FileKind::Pe32 | FileKind::Pe64 | FileKind::Coff | FileKind::CoffBig) => {
            Ok(ObjectFile::Coff {
                file_path: path.to_path_buf(),
            })
        }
        _ => Err(ElfError::UnsupportedFormat(path.to_path_buf())),
    }
}
