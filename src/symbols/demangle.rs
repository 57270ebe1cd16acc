use crate::capturepb::SymbolInfo;

/// Demangler demangles GCC/LLVM C++ and Rust symbol names.
///
/// Demangling is the inverse process of mangling (encoding of each unique
/// function and parameter list combination into a unique name for the linker).
/// With mangling the linker can tell the difference between overloaded functions
/// (they have the same name in the source code but different parameter lists).
#[derive(Debug, Clone, Copy, Default)]
pub struct Demangler {
    force: bool,
}

impl Demangler {
    /// Creates a new Demangler with a given demangler mode.
    ///
    /// If force is set, overwrite any names that appear already demangled.
    pub fn new(force: bool) -> Self {
        Self { force }
    }

    pub fn demangle(&self, symbol: &SymbolInfo) -> SymbolInfo {
        let mut new_symbol = symbol.clone();

        if !self.force
            && !symbol.demangled_name.is_empty()
            && symbol.demangled_name != symbol.name
        {
            return new_symbol; // Already Demangled
        }

        new_symbol.demangled_name = Self::filter(&symbol.name);
        new_symbol
    }

    // Filter demangles a C++ or Rust symbol name,
    // returning the human-readable C++ or Rust name.
    // If any error occurs during demangling, the input string is returned.
    pub fn filter(sys_name: &str) -> String {
        //Try Demangling Rust
        if let Ok(demangled) = rustc_demangle::try_demangle(sys_name) {
            return format!("{:#}", demangled);
        }

        //Try Demangling C/C++
        if let Ok(symbol) = cpp_demangle::Symbol::new(sys_name) {
            return symbol.to_string();
        }

        sys_name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, demangled_name: &str) -> SymbolInfo {
        SymbolInfo {
            name: name.to_string(),
            demangled_name: demangled_name.to_string(),
            address: 0x1000,
            size: 16,
        }
    }

    #[test]
    fn test_not_mangled() {
        let demangler = Demangler::new(false);
        let demangled = demangler.demangle(&symbol("main", ""));
        assert_eq!("main", demangled.demangled_name);
        assert_eq!("main", demangled.name);
    }

    #[test]
    fn test_already_demangled() {
        let demangler = Demangler::new(false);
        let s = symbol("_ZNSaIcEC1ERKS_", "custom name");
        assert_eq!(s, demangler.demangle(&s));
    }

    #[test]
    fn test_force_overwrites() {
        let demangler = Demangler::new(true);
        let demangled = demangler.demangle(&symbol("_ZNSaIcEC1ERKS_", "custom name"));
        assert_eq!(
            "std::allocator<char>::allocator(std::allocator<char> const&)",
            demangled.demangled_name
        );
    }

    #[test]
    fn test_cpp() {
        let demangler = Demangler::new(false);
        let demangled = demangler.demangle(&symbol("_ZNSaIcEC1ERKS_", ""));
        assert_eq!(
            "std::allocator<char>::allocator(std::allocator<char> const&)",
            demangled.demangled_name
        );
    }

    #[test]
    fn test_rust() {
        let demangler = Demangler::new(false);
        let demangled = demangler.demangle(&symbol(
            "_ZN11collections5slice29_$LT$impl$u20$$u5b$T$u5d$$GT$10as_mut_ptr17hf12a6d0409938c96E",
            "",
        ));
        assert_eq!(
            "collections::slice::<impl [T]>::as_mut_ptr",
            demangled.demangled_name
        );
    }
}
