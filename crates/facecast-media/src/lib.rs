//! FFmpeg CLI wrapper for layout compositing.
//!
//! This crate provides:
//! - Type-safe multi-input FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - FFprobe inspection of inputs and outputs
//! - Filter graphs that composite a resolved layout

pub mod command;
pub mod compose;
pub mod error;
pub mod filters;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compose::{build_composite_command, build_normalize_command, CompositeInputs};
pub use error::{MediaError, MediaResult};
pub use filters::{build_composite_filter, build_normalize_filter};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
