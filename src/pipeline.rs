use std::path::{Path, PathBuf};

use crate::{
    anim::interpolate_frames,
    cache::FrameCache,
    encode_gif::{GifConfig, write_animation},
    error::{AsciimateError, AsciimateResult},
    gateway::FrameSource,
    loader::load_source_image,
    requester::{RequestOpts, request_frames},
};

/// Everything one end-to-end run needs besides the source path and the
/// gateway itself.
#[derive(Clone, Debug)]
pub struct PipelineOpts {
    /// One prompt per key pose, in animation order.
    pub prompts: Vec<String>,
    pub request: RequestOpts,
    pub gif: GifConfig,
    /// Crossfade frames inserted between consecutive poses.
    pub frames_between: usize,
    /// Fade from the last pose back toward the first for a seamless loop.
    pub loop_back: bool,
    /// Cache generated poses on disk; `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    pub out_path: PathBuf,
}

impl PipelineOpts {
    pub fn new(prompts: Vec<String>, out_path: impl Into<PathBuf>) -> Self {
        Self {
            prompts,
            request: RequestOpts::default(),
            gif: GifConfig::default(),
            frames_between: 0,
            loop_back: false,
            cache_dir: None,
            out_path: out_path.into(),
        }
    }
}

/// Counters from a completed pipeline run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Poses fetched from the gateway.
    pub poses_generated: u64,
    /// Poses served from the on-disk cache.
    pub cache_hits: u64,
    /// Transient-failure retries performed across all requests.
    pub retries: u64,
    /// Frames in the written animation, interpolation included.
    pub frames_encoded: u64,
}

/// Run the whole pipeline: load the source image, request one pose per
/// prompt, interpolate, and write the looping GIF atomically.
///
/// Control flow is strictly linear; any unrecovered failure propagates with
/// its cause and leaves no partial output at the target path.
#[tracing::instrument(skip(gateway, opts), fields(out = %opts.out_path.display()))]
pub fn generate_animation(
    source_path: &Path,
    gateway: &dyn FrameSource,
    opts: &PipelineOpts,
) -> AsciimateResult<PipelineReport> {
    if opts.prompts.is_empty() {
        return Err(AsciimateError::encode(
            "pipeline requires at least one prompt",
        ));
    }

    let source = load_source_image(source_path)?;
    tracing::debug!(
        width = source.width(),
        height = source.height(),
        poses = opts.prompts.len(),
        "source loaded"
    );

    let cache = opts.cache_dir.as_ref().map(FrameCache::new);
    let (poses, stats) = request_frames(
        &source,
        &opts.prompts,
        gateway,
        cache.as_ref(),
        &opts.request,
    )?;

    let frames = interpolate_frames(&poses, opts.frames_between, opts.loop_back)?;
    write_animation(&frames, &opts.gif, &opts.out_path)?;

    tracing::info!(
        frames = frames.len(),
        cache_hits = stats.cache_hits,
        "animation written"
    );
    Ok(PipelineReport {
        poses_generated: stats.frames_requested,
        cache_hits: stats.cache_hits,
        retries: stats.retries,
        frames_encoded: frames.len() as u64,
    })
}
