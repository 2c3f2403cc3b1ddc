use std::path::Path;

use crate::{
    error::{AsciimateError, AsciimateResult},
    model::Frame,
};

/// Read and decode the source image for a pipeline run.
///
/// Fails with [`AsciimateError::Io`] when the file is missing or unreadable
/// and [`AsciimateError::Decode`] when the data is not a supported raster
/// format. No side effects beyond the read.
pub fn load_source_image(path: &Path) -> AsciimateResult<Frame> {
    let bytes = std::fs::read(path)
        .map_err(|e| AsciimateError::io(format!("failed to read '{}': {e}", path.display())))?;
    decode_frame(&bytes)
}

/// Decode raster bytes (PNG, JPEG, ...) into a [`Frame`].
pub fn decode_frame(bytes: &[u8]) -> AsciimateResult<Frame> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| AsciimateError::decode(format!("failed to decode image: {e}")))?;
    Ok(Frame::from_rgba(dyn_img.to_rgba8()))
}
