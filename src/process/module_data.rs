use std::collections::BTreeMap;
use std::path::Path;

use crate::capturepb::{FunctionInfo, FunctionType, ModuleInfo, ModuleSymbols, SymbolInfo};

/// ModuleData is a module of the target process plus, once loaded, its
/// functions keyed by ELF address.
#[derive(Debug, Clone)]
pub struct ModuleData {
    module_info: ModuleInfo,
    functions: BTreeMap<u64, FunctionInfo>,
    is_loaded: bool,
}

fn function_from_symbol(symbol: &SymbolInfo, module_path: &str) -> FunctionInfo {
    FunctionInfo {
        name: symbol.name.clone(),
        pretty_name: symbol.demangled_name.clone(),
        address: symbol.address,
        size: symbol.size,
        loaded_module_path: module_path.to_string(),
        function_type: FunctionType::Regular as i32,
        ..Default::default()
    }
}

impl ModuleData {
    pub fn new(module_info: ModuleInfo) -> Self {
        Self {
            module_info,
            functions: BTreeMap::new(),
            is_loaded: false,
        }
    }

    pub fn module_info(&self) -> &ModuleInfo {
        &self.module_info
    }

    /// Name of the backing file, without directories.
    pub fn name(&self) -> String {
        Path::new(&self.module_info.file_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn file_path(&self) -> &str {
        &self.module_info.file_path
    }

    pub fn build_id(&self) -> &str {
        &self.module_info.build_id
    }

    pub fn load_bias(&self) -> u64 {
        self.module_info.load_bias
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    /// Adds the symbols of this module.
    ///
    /// # Panics
    /// Symbols can be added only once.
    pub fn add_symbols(&mut self, module_symbols: &ModuleSymbols) {
        assert!(
            !self.is_loaded,
            "symbols of \"{}\" are already loaded",
            self.module_info.file_path
        );

        // The same address often carries several names, e.g. the destructors
        // of the __cxxabiv1 type_info classes. The first one wins.
        let mut address_reuse_counter = 0;
        for symbol in &module_symbols.symbol_infos {
            if self.functions.contains_key(&symbol.address) {
                address_reuse_counter += 1;
                continue;
            }
            self.functions.insert(
                symbol.address,
                function_from_symbol(symbol, &self.module_info.file_path),
            );
        }

        if address_reuse_counter != 0 {
            log::warn!(
                "{} absolute addresses are used by more than one symbol in \"{}\"",
                address_reuse_counter,
                self.module_info.file_path
            );
        }

        self.is_loaded = true;
    }

    /// Finds the function at `elf_address`.
    ///
    /// Without `is_exact` the function with the greatest address not above
    /// `elf_address` is returned, unless `elf_address` lies past its end.
    pub fn find_function_by_elf_address(
        &self,
        elf_address: u64,
        is_exact: bool,
    ) -> Option<&FunctionInfo> {
        if is_exact {
            return self.functions.get(&elf_address);
        }

        let (_, function) = self.functions.range(..=elf_address).next_back()?;
        if function.address.saturating_add(function.size) < elf_address {
            return None;
        }
        Some(function)
    }

    /// `relative_address` is the absolute address minus the module's start address.
    pub fn find_function_by_relative_address(
        &self,
        relative_address: u64,
        is_exact: bool,
    ) -> Option<&FunctionInfo> {
        let elf_address = relative_address.checked_add(self.load_bias())?;
        self.find_function_by_elf_address(elf_address, is_exact)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.functions.values()
    }
}
