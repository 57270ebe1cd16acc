//! Structured error types for evcapture.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the object-file symbol extractor.
#[derive(Error, Debug)]
pub enum ElfError {
    #[error("Unable to load ELF file \"{path}\": {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Unable to load \"{0}\": not an ELF image")]
    UnsupportedFormat(PathBuf),

    #[error("Unable to load \"{0}\": Big-endian architectures are not supported.")]
    BigEndian(PathBuf),

    #[error("ELF file \"{0}\" does not have a .symtab section.")]
    NoSymtab(PathBuf),

    #[error(
        "Unable to load symbols from ELF file \"{0}\", not even a single symbol of type function found."
    )]
    NoFunctionSymbols(PathBuf),

    #[error("Unable to get load bias of ELF file: \"{0}\". No program headers found.")]
    NoProgramHeaders(PathBuf),

    #[error("Unable to get load bias of ELF file: \"{0}\". No PT_LOAD program headers found.")]
    NoLoadSegment(PathBuf),

    #[error("Unable to get line info for \"{path}\", address=0x{address:x}: {reason}")]
    NoLineInfo {
        path: PathBuf,
        address: u64,
        reason: String,
    },

    #[error("Unable to read \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while turning one memory mapping into a module.
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("The module \"{0}\" is a character or block device (is in /dev/)")]
    DeviceFile(PathBuf),

    #[error("The module file \"{0}\" does not exist")]
    NotFound(PathBuf),

    #[error("Unable to get size of \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to create module from object file: {0}")]
    Object(#[source] ElfError),

    #[error(transparent)]
    LoadBias(ElfError),

    #[error("Unable to read memory maps of process {pid}: {source}")]
    Maps {
        pid: i32,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of capture loading, saving and of the capture session.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error(
        "Error parsing the capture from \"{0}\".\nNote: If the capture was taken with a previous version, it could be incompatible. Please check release notes for more information."
    )]
    Malformed(String),

    #[error(
        "The format of capture \"{file_name}\" is no longer supported but could be opened with version {version}."
    )]
    UnsupportedVersion { file_name: String, version: String },

    #[error("Error opening file \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("Failed to decode message: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Function \"{function}\" refers to unknown module \"{module}\"")]
    UnknownModule { function: String, module: String },

    #[error("No process selected. Please choose a target process for the capture.")]
    NoTarget,

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("Operation not allowed while the session is {0}")]
    InvalidState(&'static str),

    #[error("Target connection failed: {0:#}")]
    Transport(anyhow::Error),

    #[error("Event producer failed: {0:#}")]
    Producer(anyhow::Error),
}
