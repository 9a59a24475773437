//! CLI entry point for the batch compressor
//!
//! Loads the configuration, sets up the log file, runs the preflight checks
//! and drives the orchestrator until Ctrl+C or SIGTERM.

use batch_compressor::{
    ensure_directories, run_startup_checks, BatchOrchestrator, CancellationState, Config,
    ReportWriter,
};
use chrono::Local;
use clap::Parser;
use log::{error, info, warn};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Batch Compressor - watch a folder and re-encode every video with ffmpeg
#[derive(Parser, Debug)]
#[command(name = "batch-compressor")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Skip startup checks (ffmpeg/ffprobe availability). For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Send log records to `log_file`, appending, as `YYYY-MM-DD HH:MM:SS [LEVEL] message`
fn init_logging(log_file: &Path, verbose: bool) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(log_file)?;
    let default_filter = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
    Ok(())
}

fn log_settings(config: &Config) {
    info!("Batch compressor starting");
    info!("Configuration loaded:");
    info!("  Input folder: {}", config.input_folder.display());
    info!("  Output folder: {}", config.output_folder.display());
    info!("  Archive folder: {}", config.archive_folder.display());
    info!(
        "  Encoder: {} -c:v {} -preset {} -qp {} -c:a {}",
        config.encoder_bin,
        config.video_codec,
        config.preset_val,
        config.qp_value,
        config.audio_codec
    );
    info!("  Output extension: {}", config.op_extension);
    info!("  Video extensions: {:?}", config.video_extensions);
    info!("  Retry wait: {}s", config.retry_wait_seconds);
}

/// Listen for Ctrl+C and SIGTERM; either one only raises the shutdown flag
fn spawn_signal_listener(cancel: CancellationState) {
    #[cfg(unix)]
    let terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            None
        }
    };

    tokio::spawn(async move {
        let ctrl_c = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match terminate {
                Some(mut stream) => {
                    stream.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }
        cancel.request_shutdown();
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Failed to load configuration from {}: {}",
                args.config.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.log_file, args.verbose) {
        eprintln!(
            "Failed to open log file {}: {}",
            config.log_file.display(),
            e
        );
        return ExitCode::FAILURE;
    }
    log_settings(&config);

    if args.skip_checks {
        println!("WARNING: Skipping startup checks (--skip-checks enabled)");
        warn!("Startup checks skipped");
    } else if let Err(e) = run_startup_checks(&config) {
        error!("Startup check failed: {}", e);
        eprintln!("Startup check failed: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = ensure_directories(&config) {
        error!("{}", e);
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let report = match ReportWriter::create_from_pattern(&config.csv_filename_pattern) {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to create report: {}", e);
            eprintln!("Failed to create report: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Writing report to {}", report.path().display());

    let cancel = CancellationState::new();
    spawn_signal_listener(cancel.clone());

    let report_path = report.path().to_path_buf();
    let log_file = config.log_file.clone();

    println!(
        "Watching {} for videos (Ctrl+C to stop)",
        config.input_folder.display()
    );

    BatchOrchestrator::new(config, report, cancel).run().await;

    println!("CSV: {}", report_path.display());
    println!("Log: {}", log_file.display());
    ExitCode::SUCCESS
}
