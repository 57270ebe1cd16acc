pub mod addr_to_line;
mod demangle;
pub mod elfutils;
mod object_file;

#[cfg(test)]
pub(crate) mod testing;

pub use demangle::Demangler;
pub use elfutils::ElfFile;
pub use object_file::{create_object_file, ObjectFile};
