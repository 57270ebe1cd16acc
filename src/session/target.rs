//! Seams between the session and the outside world: the connection to the
//! profiled target and the producers that feed events into a capture.

use crate::capturepb::{FunctionInfo, FunctionType};

use super::EventSink;

/// Messages the session sends to the target.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetMessage {
    NewSession { session_id: u64 },
    /// Absolute addresses to hook, one batch per hook kind.
    FunctionHooks {
        function_type: FunctionType,
        addresses: Vec<u64>,
    },
    /// Remote targets only: the functions behind the hooks.
    SelectedFunctions(Vec<FunctionInfo>),
    /// Remote targets only.
    StartCapture { pid: i32 },
    StopCapture,
}

/// TargetConnection carries [`TargetMessage`]s to the profiled process.
pub trait TargetConnection {
    /// Whether the target runs on another machine.
    fn is_remote(&self) -> bool;

    fn send(&mut self, message: TargetMessage) -> anyhow::Result<()>;
}

/// OS level event tracing of a local target.
///
/// `stop` must drop every clone of the sink given to `start`.
pub trait EventTracer {
    fn start(&mut self, sink: EventSink) -> anyhow::Result<()>;
    fn stop(&mut self);
}

/// Sampling profiler used for remote targets.
///
/// `stop` processes what was sampled into the sink, then drops it.
pub trait SamplingProfiler {
    fn start(&mut self, sink: EventSink) -> anyhow::Result<()>;
    fn stop(&mut self) -> anyhow::Result<()>;
}
