use std::io::Cursor;

use image::RgbaImage;

use crate::error::{AsciimateError, AsciimateResult};

/// One still image of the animation, RGBA8 end-to-end.
///
/// A `Frame` is both what the loader produces from the source file and what
/// the gateway returns for each generation step. Insertion order in a frame
/// sequence is animation order.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    rgba: RgbaImage,
}

impl Frame {
    pub fn from_rgba(rgba: RgbaImage) -> Self {
        Self { rgba }
    }

    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    pub fn height(&self) -> u32 {
        self.rgba.height()
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.rgba
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.rgba
    }

    /// Encode the frame as PNG bytes (gateway upload and cache payload format).
    pub fn to_png_bytes(&self) -> AsciimateResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.rgba
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| AsciimateError::encode(format!("failed to encode frame as png: {e}")))?;
        Ok(buf)
    }

    /// Return a copy resized to `width`x`height`, or a plain clone when the
    /// dimensions already match.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if self.width() == width && self.height() == height {
            return self.clone();
        }
        Frame::from_rgba(image::imageops::resize(
            &self.rgba,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }
}

/// One generation step: the image to transform plus the steering prompt.
///
/// Ephemeral, constructed per gateway call.
#[derive(Clone, Copy, Debug)]
pub struct FrameRequest<'a> {
    pub image: &'a Frame,
    pub prompt: &'a str,
}
