mod maps;
mod module_data;
mod normalize;

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub use maps::{create_module, parse_maps, parse_maps_ranges, read_modules, AddressRange};
pub use module_data::ModuleData;
pub use normalize::{absolute_address, ElfAddress};

use crate::capturepb::{ModuleInfo, ProcessInfo};
use crate::error::{ElfError, ModuleError};
use crate::symbols::ElfFile;

/// ProcessData is a snapshot of a target process and the modules it maps.
#[derive(Debug, Clone, Default)]
pub struct ProcessData {
    process_info: ProcessInfo,
    modules: BTreeMap<String, ModuleData>,
    // address_start -> file path
    modules_by_start: BTreeMap<u64, String>,
}

impl ProcessData {
    pub fn new(process_info: ProcessInfo) -> Self {
        Self {
            process_info,
            ..Default::default()
        }
    }

    /// Snapshot of a live process: what procfs tells about `pid` plus the
    /// modules of its executable mappings. Symbols are not loaded.
    pub fn from_pid(pid: i32) -> Result<Self, ModuleError> {
        let proc_dir = PathBuf::from(format!("/proc/{}", pid));
        let module_infos = read_modules(pid)?;

        let name = fs::read_to_string(proc_dir.join("comm"))
            .map(|comm| comm.trim_end().to_string())
            .unwrap_or_default();
        let full_path = fs::read_link(proc_dir.join("exe"))
            .map(|exe| exe.to_string_lossy().into_owned())
            .unwrap_or_default();
        let command_line = fs::read(proc_dir.join("cmdline"))
            .map(|raw| {
                raw.split(|&b| b == 0)
                    .filter(|arg| !arg.is_empty())
                    .map(String::from_utf8_lossy)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        let is_64_bit = ElfFile::create(&full_path)
            .map(|elf| elf.is_64_bit())
            .unwrap_or(cfg!(target_pointer_width = "64"));

        let mut process = Self::new(ProcessInfo {
            pid,
            name,
            full_path,
            command_line,
            is_64_bit,
            ..Default::default()
        });
        process.update_module_infos(module_infos);
        Ok(process)
    }

    /// Loads the function symbols of every module that has none yet.
    /// Modules whose file cannot be symbolized are logged and stay empty.
    /// Returns the number of modules loaded.
    pub fn load_module_symbols(&mut self) -> usize {
        let mut loaded = 0;
        for module in self.modules.values_mut().filter(|m| !m.is_loaded()) {
            match ElfFile::create(module.file_path()).and_then(|elf| elf.load_symbols()) {
                Ok(symbols) => {
                    module.add_symbols(&symbols);
                    loaded += 1;
                }
                Err(e @ ElfError::NoSymtab(_)) => log::info!("Skipping symbols: {}", e),
                Err(e) => log::warn!(
                    "Unable to load symbols of \"{}\": {}",
                    module.file_path(),
                    e
                ),
            }
        }
        log::debug!(
            "Loaded symbols of {} modules of process {}",
            loaded,
            self.pid()
        );
        loaded
    }

    pub fn process_info(&self) -> &ProcessInfo {
        &self.process_info
    }

    pub fn pid(&self) -> i32 {
        self.process_info.pid
    }

    pub fn name(&self) -> &str {
        &self.process_info.name
    }

    pub fn is_64_bit(&self) -> bool {
        self.process_info.is_64_bit
    }

    /// Replaces the module list.
    pub fn update_module_infos(&mut self, module_infos: Vec<ModuleInfo>) {
        self.modules.clear();
        self.modules_by_start.clear();
        for module_info in module_infos {
            self.modules_by_start
                .insert(module_info.address_start, module_info.file_path.clone());
            self.modules
                .insert(module_info.file_path.clone(), ModuleData::new(module_info));
        }
    }

    pub fn module_by_path(&self, path: &str) -> Option<&ModuleData> {
        self.modules.get(path)
    }

    pub fn module_by_path_mut(&mut self, path: &str) -> Option<&mut ModuleData> {
        self.modules.get_mut(path)
    }

    /// Finds the module whose mapping contains `absolute_address`.
    pub fn find_module_by_address(&self, absolute_address: u64) -> Option<&ModuleData> {
        let (_, path) = self
            .modules_by_start
            .range(..=absolute_address)
            .next_back()?;
        let module = self.modules.get(path)?;
        (absolute_address < module.module_info().address_end).then_some(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleData> {
        self.modules.values()
    }
}
