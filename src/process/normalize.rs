use crate::capturepb::{FunctionInfo, ModuleInfo};

/// An address as the ELF image sees it: before the module was mapped and
/// before the load bias was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElfAddress(pub u64);

impl ElfAddress {
    /// Maps an absolute address of the running process back into `module`.
    ///
    /// Returns `None` if the address is not inside the module's mapping.
    pub fn from_absolute(absolute_address: u64, module: &ModuleInfo) -> Option<Self> {
        if absolute_address < module.address_start || absolute_address >= module.address_end {
            return None;
        }
        let relative = absolute_address - module.address_start;
        Some(ElfAddress(relative.wrapping_add(module.load_bias)))
    }

    pub fn to_absolute(self, module: &ModuleInfo) -> u64 {
        self.0
            .wrapping_sub(module.load_bias)
            .wrapping_add(module.address_start)
    }
}

/// absolute_address is where `function` lives in the process that mapped `module`.
pub fn absolute_address(function: &FunctionInfo, module: &ModuleInfo) -> u64 {
    ElfAddress(function.address).to_absolute(module)
}
