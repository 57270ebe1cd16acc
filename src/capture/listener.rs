use std::collections::{BTreeMap, BTreeSet};

use crate::capturepb::{
    CallstackEvent, CallstackInfo, FunctionInfo, LinuxAddressInfo, ThreadStateSliceInfo,
    TimerInfo, TracepointEventInfo, TracepointInfo,
};
use crate::error::CaptureError;
use crate::process::ProcessData;

/// CaptureListener receives the entities of a capture one at a time.
///
/// A load ends with exactly one of `on_capture_complete`,
/// `on_capture_cancelled` or `on_capture_failed`.
pub trait CaptureListener {
    /// `selected_functions` is keyed by absolute address in the captured process.
    fn on_capture_started(
        &mut self,
        process: ProcessData,
        selected_functions: BTreeMap<u64, FunctionInfo>,
        selected_tracepoints: BTreeSet<TracepointInfo>,
    );
    fn on_address_info(&mut self, address_info: LinuxAddressInfo);
    fn on_thread_name(&mut self, thread_id: i32, thread_name: String);
    fn on_thread_state_slice(&mut self, thread_state_slice: ThreadStateSliceInfo);
    fn on_unique_callstack(&mut self, callstack: CallstackInfo);
    fn on_callstack_event(&mut self, callstack_event: CallstackEvent);
    fn on_unique_tracepoint_info(&mut self, key: u64, tracepoint_info: TracepointInfo);
    fn on_tracepoint_event(&mut self, tracepoint_event: TracepointEventInfo);
    fn on_key_and_string(&mut self, key: u64, string: String);
    fn on_timer(&mut self, timer_info: TimerInfo);
    fn on_capture_complete(&mut self);
    fn on_capture_cancelled(&mut self);
    fn on_capture_failed(&mut self, error: CaptureError);
}
