//! Full FFmpeg invocations for compositing and normalizing.

use std::path::{Path, PathBuf};

use facecast_models::{EncodingConfig, HexColor, ResolvedLayout};

use crate::command::FfmpegCommand;
use crate::filters::{build_composite_filter, build_normalize_filter, OUTPUT_LABEL};

/// The three source files of a composite.
#[derive(Debug, Clone)]
pub struct CompositeInputs {
    pub screen: PathBuf,
    pub face: PathBuf,
    pub background: PathBuf,
}

/// Composite a resolved layout into `output`.
///
/// `duration` bounds the output; audio is taken from the screen recording
/// when `screen_has_audio` is set.
pub fn build_composite_command(
    inputs: &CompositeInputs,
    layout: &ResolvedLayout,
    background_color: &HexColor,
    encoding: &EncodingConfig,
    duration: f64,
    screen_has_audio: bool,
    output: impl AsRef<Path>,
) -> FfmpegCommand {
    let graph = build_composite_filter(layout, background_color, duration, encoding.frame_rate);

    let mut cmd = FfmpegCommand::new(output)
        .input(&inputs.screen)
        .input(&inputs.face)
        .input_with_args(["-loop", "1"], &inputs.background)
        .filter_complex(graph)
        .map(format!("[{}]", OUTPUT_LABEL));

    if screen_has_audio {
        cmd = cmd.map("0:a:0");
    }

    cmd.output_args(encoding.to_ffmpeg_args(screen_has_audio))
        .duration(duration)
}

/// Re-encode a single video onto a `width` x `height` canvas.
pub fn build_normalize_command(
    input: impl AsRef<Path>,
    width: u32,
    height: u32,
    background_color: &HexColor,
    encoding: &EncodingConfig,
    has_audio: bool,
    output: impl AsRef<Path>,
) -> FfmpegCommand {
    let graph = build_normalize_filter(width, height, background_color, encoding.frame_rate);

    let mut cmd = FfmpegCommand::new(output)
        .input(input)
        .filter_complex(graph)
        .map(format!("[{}]", OUTPUT_LABEL));

    if has_audio {
        cmd = cmd.map("0:a:0");
    }

    cmd.output_args(encoding.to_ffmpeg_args(has_audio))
}
