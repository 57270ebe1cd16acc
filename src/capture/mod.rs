//! Capture artifacts: a header, a metadata message and an open-ended tail of
//! timer records, each framed by [`codec`].

mod cancellation;
pub mod codec;
mod deserializer;
mod listener;
mod serializer;

pub use cancellation::CancellationToken;
pub use deserializer::{load, load_file};
pub use listener::CaptureListener;
pub use serializer::{
    capture_file_name, include_capture_extension, save, save_to_file, CAPTURE_FILE_EXTENSION,
};

/// The only artifact version this build reads and the one it writes.
pub const REQUIRED_CAPTURE_VERSION: &str = "1.0";
