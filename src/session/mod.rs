//! The capture session: one instance owns everything a capture accumulates
//! and drives it through Idle, Starting, Capturing and Stopping.

mod callstack;
mod events;
mod options;
mod target;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

pub use callstack::{callstack_hash, CallstackTable};
pub use events::{CaptureEvent, EventSink};
pub use options::CaptureOptions;
pub use target::{EventTracer, SamplingProfiler, TargetConnection, TargetMessage};

use crate::capture::{self, CancellationToken, CaptureListener};
use crate::capturepb::{
    CallstackEvent, CallstackInfo, CaptureInfo, FunctionInfo, FunctionType, LinuxAddressInfo,
    ThreadStateSliceInfo, TimerInfo, TracepointEventInfo, TracepointInfo,
};
use crate::error::CaptureError;
use crate::process::{absolute_address, ElfAddress, ModuleData, ProcessData};
use crate::timeline::TimerChain;

pub const UNKNOWN_FUNCTION_NAME: &str = "???";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Capturing,
    Stopping,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Capturing => "capturing",
            SessionState::Stopping => "stopping",
        }
    }
}

fn display_name(function: &FunctionInfo) -> &str {
    if function.pretty_name.is_empty() {
        &function.name
    } else {
        &function.pretty_name
    }
}

/// Resolves an absolute address of the target to its module and function.
fn find_function(process: &ProcessData, address: u64) -> Option<(&ModuleData, &FunctionInfo)> {
    let module = process.find_module_by_address(address)?;
    let elf_address = ElfAddress::from_absolute(address, module.module_info())?;
    let function = module.find_function_by_elf_address(elf_address.0, false)?;
    Some((module, function))
}

pub struct CaptureSession {
    options: CaptureOptions,
    state: SessionState,
    session_id: u64,
    tracing: bool,
    sampling: bool,

    target: Option<ProcessData>,
    connection: Option<Box<dyn TargetConnection>>,
    tracer: Option<Box<dyn EventTracer>>,
    sampler: Option<Box<dyn SamplingProfiler>>,

    selected_functions: BTreeMap<u64, FunctionInfo>,
    selected_tracepoints: BTreeSet<TracepointInfo>,

    function_counts: HashMap<u64, u64>,
    zone_names: HashMap<u64, String>,
    thread_names: BTreeMap<i32, String>,
    address_infos: BTreeMap<u64, LinuxAddressInfo>,
    address_to_function_name: HashMap<u64, String>,
    callstacks: CallstackTable,
    callstack_events: Vec<CallstackEvent>,
    tracepoint_infos: BTreeMap<u64, TracepointInfo>,
    tracepoint_events: Vec<TracepointEventInfo>,
    thread_state_slices: Vec<ThreadStateSliceInfo>,
    key_to_string: BTreeMap<u64, String>,
    timelines: BTreeMap<i32, TimerChain<TimerInfo>>,
    capture_start: Option<DateTime<Local>>,

    event_sender: Option<Sender<CaptureEvent>>,
    events: Option<Receiver<CaptureEvent>>,
    load_result: Option<Result<bool, CaptureError>>,
}

impl CaptureSession {
    pub fn new(options: CaptureOptions) -> Self {
        Self {
            options,
            state: SessionState::Idle,
            session_id: 0,
            tracing: false,
            sampling: false,
            target: None,
            connection: None,
            tracer: None,
            sampler: None,
            selected_functions: BTreeMap::new(),
            selected_tracepoints: BTreeSet::new(),
            function_counts: HashMap::new(),
            zone_names: HashMap::new(),
            thread_names: BTreeMap::new(),
            address_infos: BTreeMap::new(),
            address_to_function_name: HashMap::new(),
            callstacks: CallstackTable::default(),
            callstack_events: vec![],
            tracepoint_infos: BTreeMap::new(),
            tracepoint_events: vec![],
            thread_state_slices: vec![],
            key_to_string: BTreeMap::new(),
            timelines: BTreeMap::new(),
            capture_start: None,
            event_sender: None,
            events: None,
            load_result: None,
        }
    }

    pub fn with_connection(mut self, connection: Box<dyn TargetConnection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn with_event_tracer(mut self, tracer: Box<dyn EventTracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn with_sampling_profiler(mut self, sampler: Box<dyn SamplingProfiler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the running capture samples instead of tracing.
    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    /// Whether an event tracer feeds the running capture.
    pub fn is_tracing(&self) -> bool {
        self.tracing
    }

    /// Id of the current or most recent capture, 0 before the first one.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    fn is_remote(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_remote())
    }

    fn ensure_state(&self, expected: SessionState) -> Result<(), CaptureError> {
        if self.state != expected {
            return Err(CaptureError::InvalidState(self.state.name()));
        }
        Ok(())
    }

    /// Selects the process to capture and loads the symbols of its modules.
    /// Drops the current function selection.
    pub fn set_target(&mut self, mut process: ProcessData) -> Result<(), CaptureError> {
        self.ensure_state(SessionState::Idle)?;
        process.load_module_symbols();
        log::info!(
            "Selected process {} [{}]",
            process.name(),
            process.pid()
        );
        self.target = Some(process);
        self.selected_functions.clear();
        Ok(())
    }

    /// Selects the live process `pid`, reading its modules from procfs.
    pub fn set_target_pid(&mut self, pid: i32) -> Result<(), CaptureError> {
        self.ensure_state(SessionState::Idle)?;
        let process = ProcessData::from_pid(pid)?;
        self.set_target(process)
    }

    pub fn target(&self) -> Option<&ProcessData> {
        self.target.as_ref()
    }

    pub fn target_mut(&mut self) -> Option<&mut ProcessData> {
        self.target.as_mut()
    }

    /// Adds `function` to the hook set. Returns its absolute address.
    pub fn select_function(&mut self, function: FunctionInfo) -> Result<u64, CaptureError> {
        let target = self.target.as_ref().ok_or(CaptureError::NoTarget)?;
        let module = target
            .module_by_path(&function.loaded_module_path)
            .ok_or_else(|| CaptureError::UnknownModule {
                function: function.name.clone(),
                module: function.loaded_module_path.clone(),
            })?;
        let address = absolute_address(&function, module.module_info());
        self.selected_functions.insert(address, function);
        Ok(address)
    }

    pub fn deselect_function(&mut self, address: u64) -> Option<FunctionInfo> {
        self.selected_functions.remove(&address)
    }

    /// Selected functions keyed by absolute address.
    pub fn selected_functions(&self) -> &BTreeMap<u64, FunctionInfo> {
        &self.selected_functions
    }

    pub fn selected_tracepoints(&self) -> &BTreeSet<TracepointInfo> {
        &self.selected_tracepoints
    }

    pub fn select_tracepoint(&mut self, tracepoint: TracepointInfo) {
        self.selected_tracepoints.insert(tracepoint);
    }

    fn clear_capture_data(&mut self) {
        self.function_counts = self.selected_functions.keys().map(|&a| (a, 0)).collect();
        self.zone_names.clear();
        self.thread_names.clear();
        self.address_infos.clear();
        self.address_to_function_name.clear();
        self.callstacks = CallstackTable::default();
        self.callstack_events.clear();
        self.tracepoint_infos.clear();
        self.tracepoint_events.clear();
        self.thread_state_slices.clear();
        self.key_to_string.clear();
        self.timelines.clear();
    }

    fn send(&mut self, message: TargetMessage) -> Result<(), CaptureError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(CaptureError::InvalidState("not connected"))?;
        connection.send(message).map_err(CaptureError::Transport)
    }

    /// Sends one hook batch per kind, empty batches included.
    fn send_function_hooks(&mut self) -> Result<(), CaptureError> {
        let mut hooks: BTreeMap<FunctionType, Vec<u64>> =
            FunctionType::ALL.iter().map(|&t| (t, vec![])).collect();
        for (&address, function) in &self.selected_functions {
            let function_type =
                FunctionType::try_from(function.function_type).unwrap_or(FunctionType::Regular);
            hooks.entry(function_type).or_default().push(address);
        }

        for (function_type, addresses) in hooks {
            log::debug!(
                "Sending {} {:?} hooks for session {}",
                addresses.len(),
                function_type,
                self.session_id
            );
            self.send(TargetMessage::FunctionHooks {
                function_type,
                addresses,
            })?;
        }
        Ok(())
    }

    fn begin_capture(&mut self, pid: i32, sink: EventSink) -> Result<(), CaptureError> {
        let is_remote = self.is_remote();
        self.send(TargetMessage::NewSession {
            session_id: self.session_id,
        })?;
        if is_remote {
            let functions = self.selected_functions.values().cloned().collect();
            self.send(TargetMessage::SelectedFunctions(functions))?;
            self.send(TargetMessage::StartCapture { pid })?;
        }
        self.send_function_hooks()?;

        if !is_remote && self.options.is_tracking_events() {
            match self.tracer.as_mut() {
                Some(tracer) => {
                    tracer.start(sink).map_err(CaptureError::Producer)?;
                    self.tracing = true;
                }
                None => log::warn!(
                    "Session {} tracks events but has no event tracer",
                    self.session_id
                ),
            }
        } else if is_remote {
            match self.sampler.as_mut() {
                Some(sampler) => {
                    sampler.start(sink).map_err(CaptureError::Producer)?;
                    self.sampling = true;
                }
                None => log::warn!(
                    "Session {} targets a remote process but has no sampling profiler",
                    self.session_id
                ),
            }
        }
        Ok(())
    }

    /// Starts a capture of the selected target. Returns the new session id.
    pub fn start_capture(&mut self) -> Result<u64, CaptureError> {
        self.ensure_state(SessionState::Idle)?;
        let pid = self.target.as_ref().ok_or(CaptureError::NoTarget)?.pid();

        self.state = SessionState::Starting;
        self.session_id += 1;
        log::info!("Starting capture session {} of pid {}", self.session_id, pid);

        self.clear_capture_data();
        self.capture_start = Some(Local::now());
        let (sender, receiver) = crossbeam_channel::unbounded();
        let sink = EventSink::new(sender.clone(), self.callstacks.clone());
        self.event_sender = Some(sender);
        self.events = Some(receiver);

        if let Err(err) = self.begin_capture(pid, sink) {
            log::error!("Unable to start capture session {}: {}", self.session_id, err);
            if self.tracing {
                if let Some(tracer) = self.tracer.as_mut() {
                    tracer.stop();
                }
            }
            self.event_sender = None;
            self.events = None;
            self.tracing = false;
            self.sampling = false;
            self.state = SessionState::Idle;
            return Err(err);
        }

        self.state = SessionState::Capturing;
        log::info!("Capture session {} is capturing", self.session_id);
        Ok(self.session_id)
    }

    /// A new producer handle for the running capture.
    pub fn event_sink(&self) -> Option<EventSink> {
        self.event_sender
            .as_ref()
            .map(|sender| EventSink::new(sender.clone(), self.callstacks.clone()))
    }

    /// Accumulates every event that is already queued. Never blocks.
    pub fn process_events(&mut self) -> usize {
        let Some(events) = self.events.clone() else {
            return 0;
        };
        let mut count = 0;
        for event in events.try_iter() {
            if self.state != SessionState::Capturing {
                log::warn!(
                    "Ignoring event of session {} while {}",
                    self.session_id,
                    self.state.name()
                );
                continue;
            }
            self.handle_event(event);
            count += 1;
        }
        count
    }

    fn handle_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Timer(timer_info) => self.add_timer(timer_info),
            CaptureEvent::Callstack(callstack_event) => self.add_callstack_event(callstack_event),
            CaptureEvent::AddressInfo(address_info) => self.add_address_info(address_info),
            CaptureEvent::ThreadName { thread_id, name } => {
                self.thread_names.insert(thread_id, name);
            }
            CaptureEvent::ThreadStateSlice(slice) => self.thread_state_slices.push(slice),
            CaptureEvent::TracepointInfo(info) => {
                self.tracepoint_infos.insert(info.tracepoint_info_key, info);
            }
            CaptureEvent::TracepointEvent(event) => self.tracepoint_events.push(event),
            CaptureEvent::KeyAndString { key, string } => {
                self.key_to_string.insert(key, string);
            }
            CaptureEvent::ZoneName { zone_id, name } => {
                self.zone_names.insert(zone_id, name);
            }
        }
    }

    fn add_timer(&mut self, timer_info: TimerInfo) {
        if let Some(count) = self.function_counts.get_mut(&timer_info.function_address) {
            *count += 1;
        }
        self.timelines
            .entry(timer_info.thread_id)
            .or_default()
            .push(timer_info);
    }

    fn add_address_info(&mut self, address_info: LinuxAddressInfo) {
        self.address_to_function_name.insert(
            address_info.absolute_address,
            address_info.function_name.clone(),
        );
        self.address_infos
            .insert(address_info.absolute_address, address_info);
    }

    fn add_callstack_event(&mut self, callstack_event: CallstackEvent) {
        let frames = self
            .callstacks
            .with_callstack(callstack_event.callstack_hash, <[u64]>::to_vec)
            .unwrap_or_default();
        for address in frames {
            self.resolve_function_name(address);
        }
        self.callstack_events.push(callstack_event);
    }

    /// Name of the function at `address`, resolved through the target's
    /// modules on first use and cached afterwards.
    fn resolve_function_name(&mut self, address: u64) -> &str {
        if !self.address_to_function_name.contains_key(&address) {
            let name = self
                .target
                .as_ref()
                .and_then(|target| find_function(target, address))
                .map_or(UNKNOWN_FUNCTION_NAME, |(_, function)| display_name(function))
                .to_string();
            self.address_to_function_name.insert(address, name);
        }
        &self.address_to_function_name[&address]
    }

    /// Stops the running capture and waits for in-flight events.
    /// Returns the number of events drained.
    pub fn stop_capture(&mut self) -> Result<usize, CaptureError> {
        self.ensure_state(SessionState::Capturing)?;
        self.state = SessionState::Stopping;
        log::info!("Stopping capture session {}", self.session_id);

        let mut result = Ok(());
        if self.tracing {
            if let Some(tracer) = self.tracer.as_mut() {
                tracer.stop();
            }
        } else if self.sampling {
            if let Some(sampler) = self.sampler.as_mut() {
                if let Err(err) = sampler.stop() {
                    result = Err(CaptureError::Producer(err));
                }
            }
        }
        if self.is_remote() {
            if let Err(err) = self.send(TargetMessage::StopCapture) {
                result = result.and(Err(err));
            }
        }

        self.event_sender = None;
        let drained = self.drain_events();

        self.tracing = false;
        self.sampling = false;
        self.state = SessionState::Idle;
        log::info!(
            "Capture session {} stopped, {} events drained",
            self.session_id,
            drained
        );
        result.map(|()| drained)
    }

    fn drain_events(&mut self) -> usize {
        let Some(events) = self.events.clone() else {
            return 0;
        };
        let mut count = 0;
        loop {
            match events.recv_timeout(self.options.drain_timeout) {
                Ok(event) => {
                    self.handle_event(event);
                    count += 1;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.events = None;
                    break;
                }
                // Producers still hold sinks; anything later is reported by
                // process_events and dropped.
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "Timed out after {:?} waiting for events of session {}",
                        self.options.drain_timeout,
                        self.session_id
                    );
                    break;
                }
            }
        }
        count
    }

    /// Number of timers of the selected function at `address`.
    pub fn function_count(&self, address: u64) -> u64 {
        self.function_counts.get(&address).copied().unwrap_or(0)
    }

    /// Names a manual zone. Producers do the same with [`CaptureEvent::ZoneName`].
    pub fn register_zone_name(&mut self, zone_id: u64, name: impl Into<String>) {
        self.zone_names.insert(zone_id, name.into());
    }

    pub fn zone_name(&self, zone_id: u64) -> Option<&str> {
        self.zone_names.get(&zone_id).map(String::as_str)
    }

    pub fn thread_name(&self, thread_id: i32) -> Option<&str> {
        self.thread_names.get(&thread_id).map(String::as_str)
    }

    pub fn timeline(&self, thread_id: i32) -> Option<&TimerChain<TimerInfo>> {
        self.timelines.get(&thread_id)
    }

    pub fn timelines(&self) -> &BTreeMap<i32, TimerChain<TimerInfo>> {
        &self.timelines
    }

    fn timers(&self) -> impl Iterator<Item = &TimerInfo> {
        self.timelines.values().flat_map(TimerChain::iter)
    }

    pub fn callstacks(&self) -> &CallstackTable {
        &self.callstacks
    }

    pub fn callstack_events(&self) -> &[CallstackEvent] {
        &self.callstack_events
    }

    /// Cached name of the function at `address`, if it was resolved.
    pub fn function_name(&self, address: u64) -> Option<&str> {
        self.address_to_function_name
            .get(&address)
            .map(String::as_str)
    }

    pub fn key_to_string(&self) -> &BTreeMap<u64, String> {
        &self.key_to_string
    }

    fn address_info(&self, address: u64) -> LinuxAddressInfo {
        if let Some(address_info) = self.address_infos.get(&address) {
            let mut address_info = address_info.clone();
            if address_info.function_name.is_empty() {
                if let Some(name) = self.function_name(address) {
                    address_info.function_name = name.to_string();
                }
            }
            return address_info;
        }

        let mut address_info = LinuxAddressInfo {
            absolute_address: address,
            function_name: self
                .function_name(address)
                .unwrap_or(UNKNOWN_FUNCTION_NAME)
                .to_string(),
            ..Default::default()
        };
        if let Some(target) = &self.target {
            if let Some(module) = target.find_module_by_address(address) {
                address_info.module_path = module.file_path().to_string();
            }
            if let Some((module, function)) = find_function(target, address) {
                if let Some(elf_address) = ElfAddress::from_absolute(address, module.module_info())
                {
                    address_info.offset_in_function = elf_address.0 - function.address;
                }
            }
        }
        address_info
    }

    /// Snapshot of everything accumulated except the timers.
    pub fn generate_capture_info(&self) -> Result<CaptureInfo, CaptureError> {
        let target = self.target.as_ref().ok_or(CaptureError::NoTarget)?;

        let mut callstacks = vec![];
        let mut frame_addresses = BTreeSet::new();
        self.callstacks.for_each(|hash, frames| {
            frame_addresses.extend(frames.iter().copied());
            callstacks.push(CallstackInfo {
                hash,
                data: frames.to_vec(),
            });
        });
        frame_addresses.extend(self.address_infos.keys().copied());

        Ok(CaptureInfo {
            selected_functions: self.selected_functions.values().cloned().collect(),
            process: Some(target.process_info().clone()),
            modules: target.modules().map(|m| m.module_info().clone()).collect(),
            thread_names: self.thread_names.clone(),
            address_infos: frame_addresses
                .into_iter()
                .map(|address| self.address_info(address))
                .collect(),
            callstacks,
            callstack_events: self.callstack_events.clone(),
            key_to_string: self.key_to_string.clone(),
            tracepoint_infos: self.tracepoint_infos.values().cloned().collect(),
            tracepoint_event_infos: self.tracepoint_events.clone(),
            thread_state_slices: self.thread_state_slices.clone(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), CaptureError> {
        let capture_info = self.generate_capture_info()?;
        capture::save_to_file(path, &capture_info, self.timers())
    }

    /// Saves under the default capture name inside the capture directory.
    pub fn save_to_capture_dir(&self) -> Result<PathBuf, CaptureError> {
        let target = self.target.as_ref().ok_or(CaptureError::NoTarget)?;
        let start = self.capture_start.unwrap_or_else(Local::now);
        let file_name = capture::capture_file_name(target.name(), start.naive_local());
        let path = self.options.capture_dir.join(file_name);
        self.save(&path)?;
        Ok(path)
    }

    /// Replays the capture at `path` into this session.
    ///
    /// Returns false if `cancellation` stopped the load early.
    pub fn load_capture(
        &mut self,
        path: &Path,
        cancellation: &CancellationToken,
    ) -> Result<bool, CaptureError> {
        self.ensure_state(SessionState::Idle)?;
        self.load_result = None;
        capture::load_file(path, self, cancellation);
        self.load_result.take().unwrap_or(Ok(false))
    }
}

impl CaptureListener for CaptureSession {
    fn on_capture_started(
        &mut self,
        process: ProcessData,
        selected_functions: BTreeMap<u64, FunctionInfo>,
        selected_tracepoints: BTreeSet<TracepointInfo>,
    ) {
        self.target = Some(process);
        self.selected_functions = selected_functions;
        self.selected_tracepoints = selected_tracepoints;
        self.clear_capture_data();
        self.capture_start = None;
    }

    fn on_address_info(&mut self, address_info: LinuxAddressInfo) {
        self.add_address_info(address_info);
    }

    fn on_thread_name(&mut self, thread_id: i32, thread_name: String) {
        self.thread_names.insert(thread_id, thread_name);
    }

    fn on_thread_state_slice(&mut self, thread_state_slice: ThreadStateSliceInfo) {
        self.thread_state_slices.push(thread_state_slice);
    }

    fn on_unique_callstack(&mut self, callstack: CallstackInfo) {
        self.callstacks
            .insert_with_hash(callstack.hash, callstack.data);
    }

    fn on_callstack_event(&mut self, callstack_event: CallstackEvent) {
        self.add_callstack_event(callstack_event);
    }

    fn on_unique_tracepoint_info(&mut self, key: u64, mut tracepoint_info: TracepointInfo) {
        tracepoint_info.tracepoint_info_key = key;
        self.tracepoint_infos.insert(key, tracepoint_info);
    }

    fn on_tracepoint_event(&mut self, tracepoint_event: TracepointEventInfo) {
        self.tracepoint_events.push(tracepoint_event);
    }

    fn on_key_and_string(&mut self, key: u64, string: String) {
        self.key_to_string.insert(key, string);
    }

    fn on_timer(&mut self, timer_info: TimerInfo) {
        self.add_timer(timer_info);
    }

    fn on_capture_complete(&mut self) {
        self.load_result = Some(Ok(true));
    }

    fn on_capture_cancelled(&mut self) {
        self.load_result = Some(Ok(false));
    }

    fn on_capture_failed(&mut self, error: CaptureError) {
        self.load_result = Some(Err(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capturepb::{ModuleInfo, ModuleSymbols, ProcessInfo, SymbolInfo};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const MODULE_PATH: &str = "/opt/game/bin/game";

    #[derive(Clone, Default)]
    struct FakeConnection {
        remote: bool,
        messages: Arc<Mutex<Vec<TargetMessage>>>,
        fail: bool,
    }

    impl TargetConnection for FakeConnection {
        fn is_remote(&self) -> bool {
            self.remote
        }

        fn send(&mut self, message: TargetMessage) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("connection reset");
            }
            self.messages.lock().unwrap().push(message);
            Ok(())
        }
    }

    /// Emits one timer per selected address from its own thread on start.
    #[derive(Default)]
    struct FakeTracer {
        addresses: Vec<u64>,
        worker: Option<std::thread::JoinHandle<()>>,
        started: Arc<Mutex<u32>>,
    }

    impl EventTracer for FakeTracer {
        fn start(&mut self, sink: EventSink) -> anyhow::Result<()> {
            *self.started.lock().unwrap() += 1;
            let addresses = self.addresses.clone();
            self.worker = Some(std::thread::spawn(move || {
                for (i, address) in addresses.into_iter().enumerate() {
                    let start = i as u64 * 100;
                    sink.timer(TimerInfo {
                        thread_id: 7,
                        start,
                        end: start + 50,
                        function_address: address,
                        ..Default::default()
                    });
                }
                sink.send(CaptureEvent::ThreadName {
                    thread_id: 7,
                    name: "render".to_string(),
                });
            }));
            Ok(())
        }

        fn stop(&mut self) {
            if let Some(worker) = self.worker.take() {
                worker.join().unwrap();
            }
        }
    }

    /// Keeps the sink until stop, then flushes one sampled callstack.
    #[derive(Default)]
    struct FakeSampler {
        sink: Option<EventSink>,
        frames: Vec<u64>,
    }

    impl SamplingProfiler for FakeSampler {
        fn start(&mut self, sink: EventSink) -> anyhow::Result<()> {
            self.sink = Some(sink);
            Ok(())
        }

        fn stop(&mut self) -> anyhow::Result<()> {
            let sink = self.sink.take().ok_or_else(|| anyhow::anyhow!("not started"))?;
            sink.callstack_sample(3, 1000, self.frames.clone());
            sink.callstack_sample(3, 2000, self.frames.clone());
            Ok(())
        }
    }

    fn options() -> CaptureOptions {
        CaptureOptions {
            drain_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    fn process() -> ProcessData {
        let mut process = ProcessData::new(ProcessInfo {
            pid: 1234,
            name: "game.exe".to_string(),
            is_64_bit: true,
            ..Default::default()
        });
        process.update_module_infos(vec![ModuleInfo {
            name: "game".to_string(),
            file_path: MODULE_PATH.to_string(),
            address_start: 0x400000,
            address_end: 0x500000,
            load_bias: 0x1000,
            ..Default::default()
        }]);
        let symbols = ModuleSymbols {
            symbol_infos: vec![
                SymbolInfo {
                    name: "_Z6updatev".to_string(),
                    demangled_name: "update()".to_string(),
                    address: 0x2000,
                    size: 0x100,
                },
                SymbolInfo {
                    name: "render".to_string(),
                    demangled_name: String::new(),
                    address: 0x3000,
                    size: 0x80,
                },
            ],
        };
        process
            .module_by_path_mut(MODULE_PATH)
            .unwrap()
            .add_symbols(&symbols);
        process
    }

    fn function(name: &str, address: u64, function_type: FunctionType) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            address,
            size: 0x10,
            loaded_module_path: MODULE_PATH.to_string(),
            function_type: function_type as i32,
            ..Default::default()
        }
    }

    #[test]
    fn test_start_without_target() {
        let mut session = CaptureSession::new(options())
            .with_connection(Box::new(FakeConnection::default()));
        assert!(matches!(
            session.start_capture(),
            Err(CaptureError::NoTarget)
        ));
        assert_eq!(SessionState::Idle, session.state());
        assert_eq!(0, session.session_id());
    }

    #[test]
    fn test_select_function_unknown_module() {
        let mut session = CaptureSession::new(options());
        session.set_target(process()).unwrap();
        let mut f = function("f", 0x2000, FunctionType::Regular);
        f.loaded_module_path = "/lib/missing.so".to_string();
        assert!(matches!(
            session.select_function(f),
            Err(CaptureError::UnknownModule { .. })
        ));
    }

    #[test]
    fn test_local_capture() {
        let connection = FakeConnection::default();
        let messages = connection.messages.clone();
        let mut session = CaptureSession::new(options())
            .with_connection(Box::new(connection))
            .with_event_tracer(Box::new(FakeTracer {
                addresses: vec![0x401000, 0x401000, 0x402000],
                ..Default::default()
            }));
        session.set_target(process()).unwrap();

        let update = session
            .select_function(function("update", 0x2000, FunctionType::Regular))
            .unwrap();
        let zone = session
            .select_function(function("zone", 0x3000, FunctionType::ZoneStart))
            .unwrap();
        assert_eq!(0x401000, update);
        assert_eq!(0x402000, zone);

        assert_eq!(1, session.start_capture().unwrap());
        assert_eq!(SessionState::Capturing, session.state());
        assert!(!session.is_sampling());

        let drained = session.stop_capture().unwrap();
        assert_eq!(4, drained);
        assert_eq!(SessionState::Idle, session.state());
        assert_eq!(2, session.function_count(update));
        assert_eq!(1, session.function_count(zone));
        assert_eq!(Some("render"), session.thread_name(7));
        assert_eq!(3, session.timeline(7).unwrap().len());

        let messages = messages.lock().unwrap();
        assert_eq!(
            TargetMessage::NewSession { session_id: 1 },
            messages[0]
        );
        assert_eq!(1 + FunctionType::ALL.len(), messages.len());
        assert_eq!(
            TargetMessage::FunctionHooks {
                function_type: FunctionType::Regular,
                addresses: vec![update],
            },
            messages[1]
        );
        assert_eq!(
            TargetMessage::FunctionHooks {
                function_type: FunctionType::ZoneStart,
                addresses: vec![zone],
            },
            messages[2]
        );
    }

    #[test]
    fn test_remote_capture_samples() {
        let connection = FakeConnection {
            remote: true,
            ..Default::default()
        };
        let messages = connection.messages.clone();
        let tracer = FakeTracer::default();
        let tracer_starts = tracer.started.clone();
        let mut session = CaptureSession::new(options())
            .with_connection(Box::new(connection))
            .with_event_tracer(Box::new(tracer))
            .with_sampling_profiler(Box::new(FakeSampler {
                frames: vec![0x401010, 0x402004, 0x499999],
                ..Default::default()
            }));
        session.set_target(process()).unwrap();
        session
            .select_function(function("update", 0x2000, FunctionType::Regular))
            .unwrap();

        session.start_capture().unwrap();
        assert!(session.is_sampling());
        assert_eq!(0, *tracer_starts.lock().unwrap());
        assert_eq!(2, session.stop_capture().unwrap());
        assert!(!session.is_sampling());

        // Two samples of the same stack share one table entry.
        assert_eq!(1, session.callstacks().len());
        assert_eq!(2, session.callstack_events().len());
        assert_eq!(Some("update()"), session.function_name(0x401010));
        assert_eq!(Some("render"), session.function_name(0x402004));
        assert_eq!(Some(UNKNOWN_FUNCTION_NAME), session.function_name(0x499999));

        let messages = messages.lock().unwrap();
        assert_eq!(TargetMessage::NewSession { session_id: 1 }, messages[0]);
        assert!(matches!(&messages[1], TargetMessage::SelectedFunctions(f) if f.len() == 1));
        assert_eq!(TargetMessage::StartCapture { pid: 1234 }, messages[2]);
        assert_eq!(Some(&TargetMessage::StopCapture), messages.last());
    }

    #[test]
    fn test_failed_start_returns_to_idle() {
        let mut session = CaptureSession::new(options()).with_connection(Box::new(
            FakeConnection {
                fail: true,
                ..Default::default()
            },
        ));
        session.set_target(process()).unwrap();
        assert!(matches!(
            session.start_capture(),
            Err(CaptureError::Transport(_))
        ));
        assert_eq!(SessionState::Idle, session.state());
        assert!(session.event_sink().is_none());
        assert!(matches!(
            session.stop_capture(),
            Err(CaptureError::InvalidState("idle"))
        ));
    }

    #[test]
    fn test_events_through_sink() {
        let mut session = CaptureSession::new(options())
            .with_connection(Box::new(FakeConnection::default()));
        session.set_target(process()).unwrap();
        session.start_capture().unwrap();
        assert!(matches!(
            session.set_target(process()),
            Err(CaptureError::InvalidState("capturing"))
        ));
        // Tracking is on but no tracer was given, so only sinks deliver events.
        assert!(!session.is_tracing());
        assert!(!session.is_sampling());

        let sink = session.event_sink().unwrap();
        let producer = std::thread::spawn(move || {
            sink.send(CaptureEvent::KeyAndString {
                key: 9,
                string: "frame".to_string(),
            });
            sink.send(CaptureEvent::ZoneName {
                zone_id: 11,
                name: "physics".to_string(),
            });
            sink.callstack_sample(1, 10, vec![0x403000])
        });
        let hash = producer.join().unwrap();

        assert_eq!(3, session.process_events());
        assert!(session.callstacks().contains(hash));
        assert_eq!(Some(&"frame".to_string()), session.key_to_string().get(&9));
        assert_eq!(Some("physics"), session.zone_name(11));
        assert_eq!(0, session.stop_capture().unwrap());
    }

    #[test]
    fn test_drain_timeout_with_live_producer() {
        let mut session = CaptureSession::new(CaptureOptions {
            drain_timeout: Duration::from_millis(20),
            ..Default::default()
        })
        .with_connection(Box::new(FakeConnection::default()));
        session.set_target(process()).unwrap();
        session.start_capture().unwrap();

        let sink = session.event_sink().unwrap();
        assert_eq!(0, session.stop_capture().unwrap());

        // Late events are not accumulated once the session is idle.
        assert!(sink.timer(TimerInfo::default()));
        assert_eq!(0, session.process_events());
        assert!(session.timelines().is_empty());

        session.start_capture().unwrap();
        assert_eq!(2, session.session_id());
        assert!(!sink.timer(TimerInfo::default()));
    }

    #[inline(never)]
    fn sampled_marker() -> u64 {
        std::hint::black_box(0xcafe)
    }

    #[test]
    fn test_resolves_functions_of_own_process() {
        let marker = std::hint::black_box(sampled_marker as fn() -> u64);
        assert_eq!(0xcafe, marker());
        let address = marker as usize as u64;

        let mut session = CaptureSession::new(options())
            .with_connection(Box::new(FakeConnection::default()));
        session.set_target_pid(std::process::id() as i32).unwrap();
        assert!(session.target().unwrap().modules().any(ModuleData::is_loaded));

        session.start_capture().unwrap();
        let sink = session.event_sink().unwrap();
        sink.callstack_sample(1, 1, vec![address]);
        drop(sink);
        assert_eq!(1, session.process_events());

        let name = session.function_name(address).unwrap();
        assert!(name.ends_with("::sampled_marker"), "{}", name);
        session.stop_capture().unwrap();
    }

    #[test]
    fn test_zone_names() {
        let mut session = CaptureSession::new(options());
        session.register_zone_name(3, "physics");
        assert_eq!(Some("physics"), session.zone_name(3));
        assert_eq!(None, session.zone_name(4));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let connection = FakeConnection {
            remote: true,
            ..Default::default()
        };
        let mut session = CaptureSession::new(CaptureOptions {
            capture_dir: dir.path().to_path_buf(),
            ..options()
        })
        .with_connection(Box::new(connection))
        .with_sampling_profiler(Box::new(FakeSampler {
            frames: vec![0x401010, 0x402004],
            ..Default::default()
        }));
        session.set_target(process()).unwrap();
        let update = session
            .select_function(function("update", 0x2000, FunctionType::Regular))
            .unwrap();
        session.start_capture().unwrap();
        let sink = session.event_sink().unwrap();
        for start in [10, 20, 30] {
            sink.timer(TimerInfo {
                thread_id: 5,
                start,
                end: start + 5,
                function_address: update,
                ..Default::default()
            });
        }
        drop(sink);
        session.stop_capture().unwrap();

        let capture_info = session.generate_capture_info().unwrap();
        assert_eq!(2, capture_info.address_infos.len());
        assert_eq!("update()", capture_info.address_infos[0].function_name);
        assert_eq!(0x10, capture_info.address_infos[0].offset_in_function);
        assert_eq!(MODULE_PATH, capture_info.address_infos[0].module_path);

        let path = session.save_to_capture_dir().unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("game_"));

        let mut replay = CaptureSession::new(options());
        assert!(replay
            .load_capture(&path, &CancellationToken::new())
            .unwrap());
        assert_eq!(1234, replay.target().unwrap().pid());
        assert_eq!(3, replay.function_count(update));
        assert_eq!(3, replay.timeline(5).unwrap().len());
        assert_eq!(1, replay.callstacks().len());
        assert_eq!(2, replay.callstack_events().len());
        assert_eq!(Some("render"), replay.function_name(0x402004));
        assert_eq!(capture_info, replay.generate_capture_info().unwrap());

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(!replay.load_capture(&path, &cancelled).unwrap());

        assert!(matches!(
            replay.load_capture(&dir.path().join("missing.evcap"), &CancellationToken::new()),
            Err(CaptureError::Io { .. })
        ));
    }
}
