use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::codec::read_message;
use super::{CancellationToken, CaptureListener, REQUIRED_CAPTURE_VERSION};
use crate::capturepb::{CaptureHeader, CaptureInfo, TimerInfo, TracepointInfo};
use crate::error::CaptureError;
use crate::process::{absolute_address, ProcessData};

enum LoadOutcome {
    Complete { timer_count: usize },
    Cancelled,
}

/// Returns from the enclosing loader once cancellation was requested.
macro_rules! return_if_cancelled {
    ($cancellation:expr) => {
        if $cancellation.is_cancelled() {
            return Ok(LoadOutcome::Cancelled);
        }
    };
}

/// Loads the capture stored at `path`. See [`load`].
pub fn load_file(
    path: &Path,
    listener: &mut dyn CaptureListener,
    cancellation: &CancellationToken,
) {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(source) => {
            let e = CaptureError::Io {
                path: path.to_path_buf(),
                source,
            };
            log::error!("Loading capture from \"{}\": {}", path.display(), e);
            listener.on_capture_failed(e);
            return;
        }
    };

    let mut reader = BufReader::new(file);
    load(
        &mut reader,
        &path.to_string_lossy(),
        listener,
        cancellation,
    );
}

/// Streams a capture from `reader` into `listener`.
///
/// Nothing is returned: every entity, and the final outcome, is delivered
/// through the listener. `cancellation` is polled before each delivered
/// entity and before each timer is read.
pub fn load<R: Read>(
    reader: &mut R,
    file_name: &str,
    listener: &mut dyn CaptureListener,
    cancellation: &CancellationToken,
) {
    log::info!("Loading capture from \"{}\"", file_name);

    match load_stream(reader, file_name, listener, cancellation) {
        Ok(LoadOutcome::Complete { timer_count }) => {
            log::info!(
                "Loaded capture from \"{}\" with {} timers",
                file_name,
                timer_count
            );
            listener.on_capture_complete();
        }
        Ok(LoadOutcome::Cancelled) => {
            log::info!("Loading capture from \"{}\" was cancelled", file_name);
            listener.on_capture_cancelled();
        }
        Err(e) => {
            log::error!("{}", e);
            listener.on_capture_failed(e);
        }
    }
}

/// Accepts a header only if it carries exactly `required_version`.
fn validate_header(
    header: Option<CaptureHeader>,
    required_version: &str,
    file_name: &str,
) -> Result<(), CaptureError> {
    let header = match header {
        Some(header) if !header.version.is_empty() => header,
        _ => return Err(CaptureError::Malformed(file_name.to_string())),
    };

    if header.version != required_version {
        return Err(CaptureError::UnsupportedVersion {
            file_name: file_name.to_string(),
            version: header.version,
        });
    }

    Ok(())
}

fn load_stream<R: Read>(
    reader: &mut R,
    file_name: &str,
    listener: &mut dyn CaptureListener,
    cancellation: &CancellationToken,
) -> Result<LoadOutcome, CaptureError> {
    let header = read_message::<CaptureHeader, _>(reader).unwrap_or(None);
    validate_header(header, REQUIRED_CAPTURE_VERSION, file_name)?;

    let capture_info = match read_message::<CaptureInfo, _>(reader) {
        Ok(Some(capture_info)) => capture_info,
        _ => return Err(CaptureError::Malformed(file_name.to_string())),
    };

    load_capture_info(capture_info, reader, listener, cancellation)
}

fn load_capture_info<R: Read>(
    capture_info: CaptureInfo,
    reader: &mut R,
    listener: &mut dyn CaptureListener,
    cancellation: &CancellationToken,
) -> Result<LoadOutcome, CaptureError> {
    let CaptureInfo {
        selected_functions,
        process,
        modules,
        thread_names,
        address_infos,
        callstacks,
        callstack_events,
        key_to_string,
        tracepoint_infos,
        tracepoint_event_infos,
        thread_state_slices,
    } = capture_info;

    let mut process = ProcessData::new(process.unwrap_or_default());
    return_if_cancelled!(cancellation);

    process.update_module_infos(modules);
    return_if_cancelled!(cancellation);

    let mut functions_by_address = BTreeMap::new();
    for function in selected_functions {
        let module = process
            .module_by_path(&function.loaded_module_path)
            .ok_or_else(|| CaptureError::UnknownModule {
                function: function.name.clone(),
                module: function.loaded_module_path.clone(),
            })?;
        let address = absolute_address(&function, module.module_info());
        functions_by_address.insert(address, function);
    }

    let selected_tracepoints: BTreeSet<TracepointInfo> = tracepoint_infos
        .iter()
        .map(|tracepoint_info| TracepointInfo {
            category: tracepoint_info.category.clone(),
            name: tracepoint_info.name.clone(),
            tracepoint_info_key: 0,
        })
        .collect();
    return_if_cancelled!(cancellation);

    listener.on_capture_started(process, functions_by_address, selected_tracepoints);

    for address_info in address_infos {
        return_if_cancelled!(cancellation);
        listener.on_address_info(address_info);
    }

    for (thread_id, thread_name) in thread_names {
        return_if_cancelled!(cancellation);
        listener.on_thread_name(thread_id, thread_name);
    }

    for thread_state_slice in thread_state_slices {
        return_if_cancelled!(cancellation);
        listener.on_thread_state_slice(thread_state_slice);
    }

    for callstack in callstacks {
        return_if_cancelled!(cancellation);
        listener.on_unique_callstack(callstack);
    }

    for callstack_event in callstack_events {
        return_if_cancelled!(cancellation);
        listener.on_callstack_event(callstack_event);
    }

    for tracepoint_info in tracepoint_infos {
        return_if_cancelled!(cancellation);
        let key = tracepoint_info.tracepoint_info_key;
        listener.on_unique_tracepoint_info(
            key,
            TracepointInfo {
                tracepoint_info_key: 0,
                ..tracepoint_info
            },
        );
    }

    for tracepoint_event in tracepoint_event_infos {
        return_if_cancelled!(cancellation);
        listener.on_tracepoint_event(tracepoint_event);
    }

    for (key, string) in key_to_string {
        return_if_cancelled!(cancellation);
        listener.on_key_and_string(key, string);
    }

    let mut timer_count = 0;
    loop {
        return_if_cancelled!(cancellation);
        match read_message::<TimerInfo, _>(reader)? {
            Some(timer_info) => listener.on_timer(timer_info),
            None => break,
        }
        timer_count += 1;
    }

    Ok(LoadOutcome::Complete { timer_count })
}
