//! Encoder command construction and process execution

pub mod ffmpeg;
pub mod runner;

pub use ffmpeg::{build_encode_command, EncodeParams};
pub use runner::{EncodeError, ProcessRunner};
