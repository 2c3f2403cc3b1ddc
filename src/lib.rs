//! Asciimate turns a still image into a looping ASCII-art GIF animation.
//!
//! The glyph rendering itself is delegated to a hosted generative-image
//! model; the local pipeline is deliberately linear:
//!
//! 1. **Load**: source file -> [`Frame`] (RGBA8)
//! 2. **Request**: one gateway call per prompt via [`FrameSource`], with a
//!    bounded retry policy for transient network failures and an optional
//!    on-disk [`FrameCache`]
//! 3. **Interpolate** (optional): crossfade frames between key poses
//! 4. **Assemble**: ordered frames -> looping GIF, written atomically
//!
//! Key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic assembly**: the same frames and delay always produce
//!   byte-identical GIF output.
//! - **Narrow network seam**: all outbound traffic goes through the
//!   [`FrameSource`] trait, so tests run against stubs and never touch the
//!   network.
//! - **Explicit credentials**: the gateway key is a plain [`GatewayConfig`]
//!   field, never read from process-wide state.
#![forbid(unsafe_code)]

pub mod anim;
pub mod ascii;
pub mod cache;
pub mod encode_gif;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod requester;
pub mod retry;

pub use anim::{blend, interpolate_frames};
pub use ascii::{AsciiOptions, BLOCK_CHARSET, CharStyle, STANDARD_CHARSET, render_ascii};
pub use cache::FrameCache;
pub use encode_gif::{GifConfig, assemble, ensure_parent_dir, write_animation};
pub use error::{AsciimateError, AsciimateResult};
pub use gateway::{DEFAULT_ENDPOINT, DEFAULT_MODEL, FrameSource, GatewayConfig, HttpGateway};
pub use loader::{decode_frame, load_source_image};
pub use model::{Frame, FrameRequest};
pub use pipeline::{PipelineOpts, PipelineReport, generate_animation};
pub use requester::{Chaining, RequestOpts, RequestStats, request_frames};
pub use retry::RetryPolicy;
