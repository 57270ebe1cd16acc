use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDateTime;

use super::codec::write_message;
use super::REQUIRED_CAPTURE_VERSION;
use crate::capturepb::{CaptureHeader, CaptureInfo, TimerInfo};
use crate::error::CaptureError;

pub const CAPTURE_FILE_EXTENSION: &str = "evcap";

/// Writes header, `capture_info` and then every timer, each as its own frame.
pub fn save<'a, W: Write>(
    writer: &mut W,
    capture_info: &CaptureInfo,
    timers: impl IntoIterator<Item = &'a TimerInfo>,
) -> Result<(), CaptureError> {
    let header = CaptureHeader {
        version: REQUIRED_CAPTURE_VERSION.to_string(),
    };
    write_message(&header, writer)?;
    write_message(capture_info, writer)?;

    for timer in timers {
        write_message(timer, writer)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save_to_file<'a>(
    path: &Path,
    capture_info: &CaptureInfo,
    timers: impl IntoIterator<Item = &'a TimerInfo>,
) -> Result<(), CaptureError> {
    let file = File::create(path).map_err(|source| CaptureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    save(&mut writer, capture_info, timers)?;
    log::info!("Saved capture to \"{}\"", path.display());
    Ok(())
}

/// Default file name of a capture: the process name without its extension
/// followed by the capture start time.
pub fn capture_file_name(process_name: &str, start_time: NaiveDateTime) -> String {
    let stem = Path::new(process_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut file_name = format!("{}_{}", stem, start_time.format("%Y_%m_%d_%H_%M_%S"));
    include_capture_extension(&mut file_name);
    file_name
}

/// Appends the capture extension unless `file_name` already has it.
pub fn include_capture_extension(file_name: &mut String) {
    let extension = Path::new(file_name.as_str()).extension();
    if extension.and_then(|e| e.to_str()) != Some(CAPTURE_FILE_EXTENSION) {
        file_name.push('.');
        file_name.push_str(CAPTURE_FILE_EXTENSION);
    }
}
