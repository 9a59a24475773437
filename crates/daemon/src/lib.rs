//! Batch Compressor
//!
//! Watches an input folder, transcodes each video with ffmpeg at a fixed
//! quantization value, records the result in a per-run CSV report, and moves
//! finished originals into an archive folder.

pub mod archive;
pub mod cancel;
pub mod display;
pub mod encode;
pub mod job;
pub mod orchestrator;
pub mod probe;
pub mod progress;
pub mod report;
pub mod scan;
pub mod startup;
pub mod stats;

pub use archive::{archive_path, copy_then_remove, move_to_archive, ArchiveError};
pub use batch_compressor_config as config;
pub use batch_compressor_config::Config;
pub use cancel::CancellationState;
pub use encode::{build_encode_command, EncodeError, EncodeParams, ProcessRunner};
pub use job::{FileJob, JobError, JobOutcome, JobRecord};
pub use orchestrator::{BatchOrchestrator, CycleOutcome, OrchestratorState};
pub use probe::{probe_duration, ProbeError};
pub use progress::{ProgressParser, ProgressSample};
pub use report::{ReportError, ReportWriter};
pub use scan::{BatchScanner, IdleOutcome};
pub use startup::{
    check_tool_available, ensure_directories, parse_tool_version, run_startup_checks,
    StartupError,
};
pub use stats::BatchStats;
