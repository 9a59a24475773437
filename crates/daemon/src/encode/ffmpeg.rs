//! FFmpeg command construction
//!
//! Builds the encoder invocation with a fixed parameter order:
//! input, video codec, constant-QP rate control, QP, preset, audio codec,
//! output, overwrite.

use crate::config::Config;
use std::path::PathBuf;
use tokio::process::Command;

/// Rate-control mode passed to `-rc`
const RATE_CONTROL_MODE: &str = "constqp";

/// Parameters for one encoder invocation
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    /// Encoder executable
    pub encoder_bin: String,
    /// Path to the input video file
    pub input_path: PathBuf,
    /// Path for the encoded output file
    pub output_path: PathBuf,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub qp: u32,
}

impl EncodeParams {
    /// Take codec, preset and QP settings from the configuration
    pub fn from_config(config: &Config, input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            encoder_bin: config.encoder_bin.clone(),
            input_path,
            output_path,
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
            preset: config.preset_val.clone(),
            qp: config.qp_value,
        }
    }
}

/// Build the encoder command
///
/// Progress flags are not included here; `ProcessRunner` appends them when it
/// launches the process.
///
/// # Arguments
/// * `params` - Encoding parameters including paths and codec settings
///
/// # Returns
/// A configured Command ready for execution
pub fn build_encode_command(params: &EncodeParams) -> Command {
    let mut cmd = Command::new(&params.encoder_bin);

    cmd.arg("-hide_banner").arg("-loglevel").arg("error");

    cmd.arg("-i").arg(&params.input_path);
    cmd.arg("-c:v").arg(&params.video_codec);
    cmd.arg("-rc").arg(RATE_CONTROL_MODE);
    cmd.arg("-qp").arg(params.qp.to_string());
    cmd.arg("-preset").arg(&params.preset);
    cmd.arg("-c:a").arg(&params.audio_codec);
    cmd.arg(&params.output_path);
    cmd.arg("-y");

    cmd
}
