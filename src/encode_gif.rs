use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::codecs::gif::{GifEncoder, Repeat};

use crate::{
    error::{AsciimateError, AsciimateResult},
    model::Frame,
};

// Fixed quantizer speed so identical inputs always produce identical bytes.
const GIF_QUANTIZER_SPEED: i32 = 10;

/// Assembly settings for the output animation. Looping is always on.
#[derive(Clone, Debug)]
pub struct GifConfig {
    /// Display duration of every frame, in milliseconds.
    pub frame_delay_ms: u32,
}

impl GifConfig {
    pub fn from_fps(fps: f32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 10.0 };
        Self {
            frame_delay_ms: ((1000.0 / fps).round() as u32).max(1),
        }
    }

    pub fn validate(&self) -> AsciimateResult<()> {
        if self.frame_delay_ms == 0 {
            return Err(AsciimateError::encode("frame delay must be non-zero"));
        }
        Ok(())
    }
}

impl Default for GifConfig {
    fn default() -> Self {
        Self::from_fps(10.0)
    }
}

/// Encode an ordered frame sequence into a single looping GIF byte stream.
///
/// Frames whose dimensions differ from the first frame are resized to match.
/// Deterministic: the same frames and delay produce byte-identical output.
pub fn assemble(frames: &[Frame], cfg: &GifConfig) -> AsciimateResult<Vec<u8>> {
    cfg.validate()?;
    let Some(first) = frames.first() else {
        return Err(AsciimateError::encode(
            "cannot assemble an animation from zero frames",
        ));
    };
    let (width, height) = (first.width(), first.height());

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buf, GIF_QUANTIZER_SPEED);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| AsciimateError::encode(format!("failed to set gif loop flag: {e}")))?;

        for frame in frames {
            let rgba = frame.resized(width, height).into_rgba();
            let delay = image::Delay::from_numer_denom_ms(cfg.frame_delay_ms, 1);
            encoder
                .encode_frame(image::Frame::from_parts(rgba, 0, 0, delay))
                .map_err(|e| AsciimateError::encode(format!("failed to encode gif frame: {e}")))?;
        }
    }
    Ok(buf)
}

/// Assemble and write the animation, atomically.
///
/// Bytes go to a temporary sibling first and are renamed onto `out_path`
/// only on full success, so a failed run never leaves a partial file at the
/// target path.
pub fn write_animation(frames: &[Frame], cfg: &GifConfig, out_path: &Path) -> AsciimateResult<()> {
    let bytes = assemble(frames, cfg)?;
    ensure_parent_dir(out_path)?;

    let tmp = tmp_sibling(out_path);
    if let Err(e) = std::fs::write(&tmp, &bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(AsciimateError::io(format!(
            "failed to write '{}': {e}",
            tmp.display()
        )));
    }
    if let Err(e) = std::fs::rename(&tmp, out_path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(AsciimateError::io(format!(
            "failed to move animation into place at '{}': {e}",
            out_path.display()
        )));
    }
    Ok(())
}

pub fn ensure_parent_dir(path: &Path) -> AsciimateResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "animation.gif".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "asciimate_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    fn solid(width: u32, height: u32, px: [u8; 4]) -> Frame {
        Frame::from_rgba(image::RgbaImage::from_pixel(width, height, image::Rgba(px)))
    }

    fn decoded_frame_count(bytes: &[u8]) -> usize {
        use image::AnimationDecoder as _;
        let decoder =
            image::codecs::gif::GifDecoder::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
        decoder.into_frames().collect_frames().unwrap().len()
    }

    #[test]
    fn zero_frames_is_an_encode_error() {
        let err = assemble(&[], &GifConfig::default()).unwrap_err();
        assert!(matches!(err, AsciimateError::Encode(_)));
    }

    #[test]
    fn output_contains_exactly_the_requested_frames_in_order() {
        let frames = vec![
            solid(4, 4, [255, 0, 0, 255]),
            solid(4, 4, [0, 255, 0, 255]),
            solid(4, 4, [0, 0, 255, 255]),
        ];
        let bytes = assemble(&frames, &GifConfig::default()).unwrap();
        assert_eq!(decoded_frame_count(&bytes), 3);

        use image::AnimationDecoder as _;
        let decoder =
            image::codecs::gif::GifDecoder::new(std::io::Cursor::new(bytes)).unwrap();
        // Quantization may nudge exact values; the dominant channel per
        // frame still identifies the request order.
        let decoded = decoder.into_frames().collect_frames().unwrap();
        for (i, frame) in decoded.iter().enumerate() {
            let px = frame.buffer().get_pixel(0, 0).0;
            let dominant = (0..3).max_by_key(|&c| px[c]).unwrap();
            assert_eq!(dominant, i, "frame {i} has pixel {px:?}");
        }
    }

    #[test]
    fn assembly_is_deterministic() {
        let frames = vec![solid(6, 6, [10, 20, 30, 255]), solid(6, 6, [30, 20, 10, 255])];
        let cfg = GifConfig::from_fps(4.0);
        assert_eq!(assemble(&frames, &cfg).unwrap(), assemble(&frames, &cfg).unwrap());
    }

    #[test]
    fn mismatched_frames_are_resized_to_the_first() {
        let frames = vec![solid(4, 4, [0, 0, 0, 255]), solid(8, 2, [50, 50, 50, 255])];
        let bytes = assemble(&frames, &GifConfig::default()).unwrap();
        assert_eq!(decoded_frame_count(&bytes), 2);
    }

    #[test]
    fn write_is_atomic_and_leaves_no_tmp_file() {
        let tmp = temp_dir("gif_write");
        std::fs::create_dir_all(&tmp).unwrap();
        let out = tmp.join("nested").join("anim.gif");

        write_animation(
            &[solid(2, 2, [1, 2, 3, 255])],
            &GifConfig::default(),
            &out,
        )
        .unwrap();
        assert!(out.exists());
        assert!(!tmp_sibling(&out).exists());

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn failed_assembly_never_touches_the_target_path() {
        let tmp = temp_dir("gif_no_partial");
        std::fs::create_dir_all(&tmp).unwrap();
        let out = tmp.join("anim.gif");

        assert!(write_animation(&[], &GifConfig::default(), &out).is_err());
        assert!(!out.exists());
        assert!(!tmp_sibling(&out).exists());

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn fps_conversion_rounds_to_millis() {
        assert_eq!(GifConfig::from_fps(10.0).frame_delay_ms, 100);
        assert_eq!(GifConfig::from_fps(4.0).frame_delay_ms, 250);
        // nonsense fps falls back to 10 fps
        assert_eq!(GifConfig::from_fps(0.0).frame_delay_ms, 100);
        assert_eq!(GifConfig::from_fps(f32::NAN).frame_delay_ms, 100);
    }
}
