//! Address space mapping: turns a process's `/proc/<pid>/maps` description
//! into the list of modules backing its executable mappings.

use std::collections::BTreeMap;
use std::path::Path;

use crate::capturepb::ModuleInfo;
use crate::error::ModuleError;
use crate::symbols::{create_object_file, ObjectFile};

/// Merged range of every mapping that shares one backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
    pub is_executable: bool,
}

impl AddressRange {
    fn merge(&mut self, other: AddressRange) {
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
        self.is_executable |= other.is_executable;
    }
}

fn parse_record(line: &str) -> Option<(String, AddressRange)> {
    // "start-end perms offset dev inode path"
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return None;
    }

    // Not mapped to a file: heap, stack, anonymous memory.
    if fields[4] == "0" {
        return None;
    }

    let (start, end) = fields[0].split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    let is_executable = fields[1].as_bytes().get(2) == Some(&b'x');

    Some((
        fields[5..].join(" "),
        AddressRange {
            start,
            end,
            is_executable,
        },
    ))
}

/// parse_maps_ranges groups the records of a maps description by backing
/// file and merges the ranges of each group.
pub fn parse_maps_ranges(proc_maps_data: &str) -> BTreeMap<String, AddressRange> {
    let mut address_map: BTreeMap<String, AddressRange> = BTreeMap::new();

    for (path, range) in proc_maps_data.lines().filter_map(parse_record) {
        address_map
            .entry(path)
            .and_modify(|existing| existing.merge(range))
            .or_insert(range);
    }

    address_map
}

/// create_module builds the [`ModuleInfo`] of one backing file mapped at
/// `[start_address, end_address)`.
pub fn create_module(
    module_path: &Path,
    start_address: u64,
    end_address: u64,
) -> Result<ModuleInfo, ModuleError> {
    if module_path.starts_with("/dev/") {
        return Err(ModuleError::DeviceFile(module_path.to_path_buf()));
    }

    if !module_path.exists() {
        return Err(ModuleError::NotFound(module_path.to_path_buf()));
    }

    let file_size = std::fs::metadata(module_path)
        .map_err(|source| ModuleError::Io {
            path: module_path.to_path_buf(),
            source,
        })?
        .len();

    let object_file = create_object_file(module_path).map_err(ModuleError::Object)?;

    let mut module_info = ModuleInfo {
        name: object_file.name(),
        file_path: module_path.to_string_lossy().into_owned(),
        file_size,
        address_start: start_address,
        address_end: end_address,
        ..Default::default()
    };

    if let ObjectFile::Elf(elf_file) = &object_file {
        module_info.build_id = elf_file.build_id().to_string();
        module_info.soname = elf_file.soname().to_string();
        // Every loadable ELF module has a load bias.
        module_info.load_bias = elf_file.load_bias().map_err(ModuleError::LoadBias)?;
    }

    Ok(module_info)
}

/// parse_maps returns one module per executable backing file of the maps
/// description. Modules that cannot be created are logged and dropped.
pub fn parse_maps(proc_maps_data: &str) -> Vec<ModuleInfo> {
    let mut result = vec![];

    for (module_path, range) in parse_maps_ranges(proc_maps_data) {
        if !range.is_executable {
            continue;
        }

        match create_module(Path::new(&module_path), range.start, range.end) {
            Ok(module_info) => {
                log::debug!(
                    "Module \"{}\" at [0x{:x}, 0x{:x})",
                    module_info.file_path,
                    module_info.address_start,
                    module_info.address_end
                );
                result.push(module_info);
            }
            Err(e) => log::error!("Unable to create module: {}", e),
        }
    }

    result
}

/// read_modules reads `/proc/<pid>/maps` and parses it with [`parse_maps`].
pub fn read_modules(pid: i32) -> Result<Vec<ModuleInfo>, ModuleError> {
    let proc_maps_path = format!("/proc/{}/maps", pid);
    let proc_maps_data = std::fs::read_to_string(&proc_maps_path)
        .map_err(|source| ModuleError::Maps { pid, source })?;
    Ok(parse_maps(&proc_maps_data))
}
