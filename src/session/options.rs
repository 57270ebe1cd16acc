use std::path::PathBuf;
use std::time::Duration;

use clap::ArgAction;

fn parse_millis(value: &str) -> Result<Duration, std::num::ParseIntError> {
    value.parse().map(Duration::from_millis)
}

/// Knobs of a capture session.
#[derive(Debug, Clone, clap::Args)]
pub struct CaptureOptions {
    /// Trace context switches of the target (local targets only)
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub track_context_switches: bool,

    /// Collect callstack samples through the OS tracer (local targets only)
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub track_sampling_events: bool,

    /// How long stopping a capture waits for in-flight events
    #[arg(
        long = "drain-timeout-ms",
        value_name = "MILLIS",
        default_value = "2000",
        value_parser = parse_millis
    )]
    pub drain_timeout: Duration,

    /// Directory that saved captures are written to
    #[arg(long, default_value = ".")]
    pub capture_dir: PathBuf,
}

impl CaptureOptions {
    /// Whether a local capture runs the OS level event tracer.
    pub fn is_tracking_events(&self) -> bool {
        self.track_context_switches || self.track_sampling_events
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            track_context_switches: true,
            track_sampling_events: true,
            drain_timeout: Duration::from_secs(2),
            capture_dir: PathBuf::from("."),
        }
    }
}
