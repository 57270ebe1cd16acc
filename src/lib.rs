//! Capture engine of a native-code profiler: object-file symbols, process
//! address spaces, capture artifacts and the per-thread timer timeline.

pub mod capture;
pub mod capturepb;
pub mod error;
pub mod process;
pub mod session;
pub mod symbols;
pub mod timeline;
