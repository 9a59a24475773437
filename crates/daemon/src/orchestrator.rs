//! Batch orchestrator and main processing loop
//!
//! Alternates between scanning the input directory and processing the files it
//! found, one at a time and in scan order. Any file-local failure abandons the
//! rest of the cycle; a shutdown request stops the loop and the cumulative
//! statistics are summarized.

use crate::cancel::CancellationState;
use crate::config::Config;
use crate::display;
use crate::encode::ProcessRunner;
use crate::job::{FileJob, JobOutcome};
use crate::report::ReportWriter;
use crate::scan::{BatchScanner, IdleOutcome};
use crate::stats::BatchStats;
use log::{error, info, warn};
use std::path::Path;

/// Orchestrator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Scanning,
    ProcessingFile,
    /// Terminal
    Stopped,
}

/// Result of one scan cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing to do; the idle wait elapsed
    Idle,
    /// Every file of the scan finalized normally
    BatchCompleted { processed: usize },
    /// A file failed; the files after it were not attempted
    BatchAbandoned { processed: usize, remaining: usize },
    /// Shutdown was observed
    Stopped,
}

/// Sequential scan / transcode loop
pub struct BatchOrchestrator {
    config: Config,
    scanner: BatchScanner,
    runner: ProcessRunner,
    report: ReportWriter,
    cancel: CancellationState,
    stats: BatchStats,
    state: OrchestratorState,
    files_seen: u64,
}

impl BatchOrchestrator {
    pub fn new(config: Config, report: ReportWriter, cancel: CancellationState) -> Self {
        let scanner = BatchScanner::from_config(&config);
        Self {
            config,
            scanner,
            runner: ProcessRunner::new(),
            report,
            cancel,
            stats: BatchStats::new(),
            state: OrchestratorState::Scanning,
            files_seen: 0,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn report_path(&self) -> &Path {
        self.report.path()
    }

    /// Run one cycle: a scan followed by either a batch or an idle wait
    ///
    /// # Returns
    /// * `CycleOutcome::Idle` - The scan was empty and the full wait elapsed
    /// * `CycleOutcome::BatchCompleted` - All scanned files finalized normally
    /// * `CycleOutcome::BatchAbandoned` - A file failed and the rest were skipped
    /// * `CycleOutcome::Stopped` - Shutdown was requested; the state is now terminal
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        if self.state == OrchestratorState::Stopped || self.cancel.is_shutdown_requested() {
            self.stop();
            return CycleOutcome::Stopped;
        }
        self.state = OrchestratorState::Scanning;

        let files = match self.scanner.scan() {
            Ok(files) => files,
            Err(e) => {
                error!(
                    "Failed to scan input folder {}: {}",
                    self.config.input_folder.display(),
                    e
                );
                Vec::new()
            }
        };

        if files.is_empty() {
            info!(
                "No files found. Retrying in {}s...",
                self.scanner.retry_wait_secs()
            );
            return match self.scanner.idle_wait(&self.cancel).await {
                IdleOutcome::Elapsed => CycleOutcome::Idle,
                IdleOutcome::Interrupted => {
                    self.stop();
                    CycleOutcome::Stopped
                }
            };
        }

        self.files_seen += files.len() as u64;
        self.state = OrchestratorState::ProcessingFile;

        for (index, name) in files.iter().enumerate() {
            if self.cancel.is_shutdown_requested() {
                self.stop();
                return CycleOutcome::Stopped;
            }

            display::print_line(&format!(
                "\rFile {}/{}: {}",
                self.stats.file_count + 1,
                self.files_seen,
                name
            ));

            let job = FileJob::new(&self.config, name);
            let record = job.execute(&self.runner, &self.cancel, &mut self.report).await;
            self.stats.record(&record);

            match record.outcome {
                JobOutcome::Completed { .. } => {}
                JobOutcome::Aborted => {
                    self.state = OrchestratorState::Scanning;
                    self.stop();
                    return CycleOutcome::Stopped;
                }
                JobOutcome::Failed(_) => {
                    let remaining = files.len() - index - 1;
                    if remaining > 0 {
                        warn!(
                            "Abandoning current batch after failure; {} file(s) left for the next scan",
                            remaining
                        );
                    }
                    self.state = OrchestratorState::Scanning;
                    return CycleOutcome::BatchAbandoned {
                        processed: index + 1,
                        remaining,
                    };
                }
            }
        }

        self.state = OrchestratorState::Scanning;
        CycleOutcome::BatchCompleted {
            processed: files.len(),
        }
    }

    /// Run cycles until shutdown, then summarize
    ///
    /// An abandoned batch goes straight back to scanning; only an empty scan
    /// waits.
    pub async fn run(mut self) -> BatchStats {
        info!(
            "Watching {} for new files",
            self.config.input_folder.display()
        );

        loop {
            match self.run_cycle().await {
                CycleOutcome::Stopped => break,
                CycleOutcome::Idle
                | CycleOutcome::BatchCompleted { .. }
                | CycleOutcome::BatchAbandoned { .. } => {}
            }
        }

        self.finish()
    }

    /// Log and draw the cumulative summary
    pub fn finish(&self) -> BatchStats {
        info!("{}", self.stats.summary_line());
        for line in display::render_summary_box(
            self.stats.file_count,
            self.stats.input_mb(),
            self.stats.output_mb(),
            self.stats.saved_percent(),
        ) {
            display::print_line(&line);
        }
        self.stats
    }

    fn stop(&mut self) {
        if self.state == OrchestratorState::Stopped {
            return;
        }
        self.state = OrchestratorState::Stopped;
        display::print_line("\nInterrupt received. Stopping ...");
        info!("Exit signal received. Aborting current file and shutting down...");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    // Writing an executable while another test forks can fail with ETXTBSY.
    static SCRIPT_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

    const PROBE_SCRIPT: &str = "#!/bin/sh\necho '{\"format\":{\"duration\":\"10.000000\"}}'\n";

    struct Fixture {
        dir: TempDir,
        config: Config,
    }

    impl Fixture {
        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn add_input(&self, name: &str, len: usize) {
            fs::write(self.config.input_folder.join(name), vec![b'x'; len]).unwrap();
        }

        fn encoder_runs(&self) -> usize {
            fs::read_to_string(self.path("runs"))
                .map(|s| s.lines().count())
                .unwrap_or(0)
        }

        fn report_lines(&self, report: &Path) -> Vec<String> {
            fs::read_to_string(report)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn orchestrator(&self) -> (BatchOrchestrator, CancellationState) {
            let report = ReportWriter::create(self.path("report.csv")).unwrap();
            let cancel = CancellationState::new();
            (
                BatchOrchestrator::new(self.config.clone(), report, cancel.clone()),
                cancel,
            )
        }
    }

    fn write_script(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Mock encoder: the output path is the argument before `-y`. `tail` runs
    /// after the output and progress lines are written.
    fn encoder_script(runs: &Path, tail: &str) -> String {
        format!(
            "#!/bin/sh\n\
             echo run >> '{}'\n\
             prev=''\n\
             out=''\n\
             for a in \"$@\"; do\n\
               if [ \"$a\" = '-y' ]; then out=\"$prev\"; fi\n\
               prev=\"$a\"\n\
             done\n\
             printf 'compressed' > \"$out\"\n\
             echo out_time_ms=5000000\n\
             echo progress=continue\n\
             {}\n",
            runs.display(),
            tail
        )
    }

    fn fixture(encoder_tail: &str, retry_wait_seconds: u64) -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for sub in ["input", "output", "archive", "bin"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }

        let encoder = root.join("bin/ffmpeg");
        let probe = root.join("bin/ffprobe");
        write_script(&encoder, &encoder_script(&root.join("runs"), encoder_tail));
        write_script(&probe, PROBE_SCRIPT);

        let config = Config {
            qp_value: 24,
            video_codec: "hevc_nvenc".to_string(),
            audio_codec: "aac".to_string(),
            preset_val: "p5".to_string(),
            op_extension: "mp4".to_string(),
            input_folder: root.join("input"),
            output_folder: root.join("output"),
            archive_folder: root.join("archive"),
            log_file: root.join("compressor.log"),
            csv_filename_pattern: "report.csv".to_string(),
            video_extensions: vec![".mp4".to_string()],
            retry_wait_seconds,
            encoder_bin: encoder.to_string_lossy().into_owned(),
            probe_bin: probe.to_string_lossy().into_owned(),
        };

        Fixture { dir, config }
    }

    const SUCCEED: &str = "echo out_time_ms=10000000\necho progress=end\nexit 0";
    const FAIL: &str = "exit 1";
    const HANG: &str = "exec sleep 30";

    #[tokio::test]
    async fn test_successful_file_is_reported_and_archived() {
        let _guard = SCRIPT_LOCK.lock().await;
        let fx = fixture(SUCCEED, 1);
        fx.add_input("clip one.mp4", 4096);
        let (mut orchestrator, _cancel) = fx.orchestrator();

        let outcome = orchestrator.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::BatchCompleted { processed: 1 });
        assert_eq!(orchestrator.state(), OrchestratorState::Scanning);
        assert_eq!(orchestrator.stats().file_count, 1);
        assert_eq!(orchestrator.stats().input_bytes, 4096);
        assert_eq!(orchestrator.stats().output_bytes, "compressed".len() as u64);

        let lines = fx.report_lines(orchestrator.report_path());
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("clip one.mp4,clip_one_[ffmpeg_hevc_nvenc_aac_p5_QP24].mp4,"));

        assert!(!fx.config.input_folder.join("clip one.mp4").exists());
        assert!(fx.config.archive_folder.join("clip one.mp4").exists());
        assert!(fx
            .config
            .output_folder
            .join("clip_one_[ffmpeg_hevc_nvenc_aac_p5_QP24].mp4")
            .exists());
    }

    #[tokio::test]
    async fn test_encoder_failure_abandons_batch() {
        let _guard = SCRIPT_LOCK.lock().await;
        let fx = fixture(FAIL, 1);
        fx.add_input("a.mp4", 1024);
        fx.add_input("b.mp4", 1024);
        let (mut orchestrator, _cancel) = fx.orchestrator();

        let outcome = orchestrator.run_cycle().await;

        assert_eq!(
            outcome,
            CycleOutcome::BatchAbandoned {
                processed: 1,
                remaining: 1
            }
        );
        assert_eq!(fx.encoder_runs(), 1, "second file must not be attempted");
        assert_eq!(orchestrator.stats(), BatchStats::default());
        assert_eq!(fx.report_lines(orchestrator.report_path()).len(), 1);

        // partial output removed, inputs untouched
        assert_eq!(fs::read_dir(&fx.config.output_folder).unwrap().count(), 0);
        assert!(fx.config.input_folder.join("a.mp4").exists());
        assert!(fx.config.input_folder.join("b.mp4").exists());
        assert_eq!(fs::read_dir(&fx.config.archive_folder).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_probe_failure_is_file_local() {
        let _guard = SCRIPT_LOCK.lock().await;
        let mut fx = fixture(SUCCEED, 1);
        let bad_probe = fx.path("bin/bad-ffprobe");
        write_script(&bad_probe, "#!/bin/sh\necho 'no such file' >&2\nexit 1\n");
        fx.config.probe_bin = bad_probe.to_string_lossy().into_owned();
        fx.add_input("a.mp4", 1024);
        let (mut orchestrator, _cancel) = fx.orchestrator();

        let outcome = orchestrator.run_cycle().await;

        assert_eq!(
            outcome,
            CycleOutcome::BatchAbandoned {
                processed: 1,
                remaining: 0
            }
        );
        assert_eq!(fx.encoder_runs(), 0);
        assert!(fx.config.input_folder.join("a.mp4").exists());
        assert_eq!(orchestrator.stats().file_count, 0);
    }

    #[tokio::test]
    async fn test_shutdown_mid_transcode_keeps_prior_stats() {
        let _guard = SCRIPT_LOCK.lock().await;
        let fx = fixture(SUCCEED, 1);
        fx.add_input("first.mp4", 2048);
        let (mut orchestrator, cancel) = fx.orchestrator();

        assert_eq!(
            orchestrator.run_cycle().await,
            CycleOutcome::BatchCompleted { processed: 1 }
        );

        // the next file hangs until killed
        write_script(
            Path::new(&fx.config.encoder_bin),
            &encoder_script(&fx.path("runs"), HANG),
        );
        fx.add_input("second.mp4", 2048);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.request_shutdown();
        });

        let started = Instant::now();
        let outcome = tokio::time::timeout(Duration::from_secs(10), orchestrator.run_cycle())
            .await
            .expect("cycle should stop promptly after shutdown");

        assert_eq!(outcome, CycleOutcome::Stopped);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(cancel.is_job_aborted());
        assert_eq!(orchestrator.state(), OrchestratorState::Stopped);

        // no row and no output for the aborted file
        assert_eq!(fx.report_lines(orchestrator.report_path()).len(), 2);
        assert!(!fx
            .config
            .output_folder
            .join("second_[ffmpeg_hevc_nvenc_aac_p5_QP24].mp4")
            .exists());
        assert!(fx.config.input_folder.join("second.mp4").exists());

        let stats = orchestrator.finish();
        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.input_bytes, 2048);
    }

    #[tokio::test]
    async fn test_shutdown_while_idle_exits_with_empty_summary() {
        let _guard = SCRIPT_LOCK.lock().await;
        let fx = fixture(SUCCEED, 30);
        let (orchestrator, cancel) = fx.orchestrator();
        let report = orchestrator.report_path().to_path_buf();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.request_shutdown();
        });

        let started = Instant::now();
        let stats = tokio::time::timeout(Duration::from_secs(10), orchestrator.run())
            .await
            .expect("run should return promptly after shutdown");

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(stats, BatchStats::default());
        assert_eq!(
            stats.summary_line(),
            "Summary: Files=0, Input=0.00 MB, Output=0.00 MB, Saved=0.00 MB (0.00%)"
        );
        assert_eq!(fx.report_lines(&report).len(), 1);
        assert_eq!(fx.encoder_runs(), 0);
    }

    #[tokio::test]
    async fn test_run_rescans_immediately_after_abandoned_batch() {
        let _guard = SCRIPT_LOCK.lock().await;
        // a long retry wait that an abandoned batch must not sit through
        let fx = fixture(FAIL, 30);
        fx.add_input("broken.mp4", 1024);
        let (orchestrator, cancel) = fx.orchestrator();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1000)).await;
            trigger.request_shutdown();
        });

        let started = Instant::now();
        let stats = tokio::time::timeout(Duration::from_secs(10), orchestrator.run())
            .await
            .expect("run should return promptly after shutdown");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(
            fx.encoder_runs() >= 2,
            "failed file should be retried without waiting, got {} runs",
            fx.encoder_runs()
        );
        assert_eq!(stats, BatchStats::default());
        assert!(fx.config.input_folder.join("broken.mp4").exists());
    }

    #[tokio::test]
    async fn test_archive_failure_still_counts_and_continues() {
        let _guard = SCRIPT_LOCK.lock().await;
        let mut fx = fixture(SUCCEED, 1);
        // a regular file where the archive directory should be
        let blocker = fx.path("archive-blocker");
        fs::write(&blocker, b"").unwrap();
        fx.config.archive_folder = blocker;
        fx.add_input("a.mp4", 1024);
        fx.add_input("b.mp4", 1024);
        let (mut orchestrator, _cancel) = fx.orchestrator();

        let outcome = orchestrator.run_cycle().await;

        assert_eq!(outcome, CycleOutcome::BatchCompleted { processed: 2 });
        assert_eq!(fx.encoder_runs(), 2);
        assert_eq!(orchestrator.stats().file_count, 2);
        assert_eq!(fx.report_lines(orchestrator.report_path()).len(), 3);
        assert!(fx.config.input_folder.join("a.mp4").exists());
        assert!(fx.config.input_folder.join("b.mp4").exists());
    }

    #[tokio::test]
    async fn test_unreadable_input_dir_is_treated_as_empty() {
        let _guard = SCRIPT_LOCK.lock().await;
        let mut fx = fixture(SUCCEED, 1);
        fx.config.input_folder = fx.path("missing");
        let (mut orchestrator, _cancel) = fx.orchestrator();

        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::Idle);
        assert_eq!(orchestrator.state(), OrchestratorState::Scanning);
    }

    #[tokio::test]
    async fn test_stopped_is_terminal() {
        let _guard = SCRIPT_LOCK.lock().await;
        let fx = fixture(SUCCEED, 1);
        fx.add_input("a.mp4", 1024);
        let (mut orchestrator, cancel) = fx.orchestrator();
        cancel.request_shutdown();

        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::Stopped);
        assert_eq!(orchestrator.run_cycle().await, CycleOutcome::Stopped);
        assert_eq!(orchestrator.state(), OrchestratorState::Stopped);
        assert_eq!(fx.encoder_runs(), 0);
    }
}
