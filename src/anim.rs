use crate::{
    error::{AsciimateError, AsciimateResult},
    model::Frame,
};

/// Expand key poses into a smooth sequence by inserting `frames_between`
/// linear crossfades between each consecutive pair.
///
/// With `loop_back` the sequence also fades from the last pose back toward
/// the first, so an infinitely looping animation has no visual seam. Poses
/// whose dimensions differ from the first pose are resized before blending.
pub fn interpolate_frames(
    poses: &[Frame],
    frames_between: usize,
    loop_back: bool,
) -> AsciimateResult<Vec<Frame>> {
    let Some(first) = poses.first() else {
        return Err(AsciimateError::encode(
            "interpolation requires at least one pose",
        ));
    };
    let (width, height) = (first.width(), first.height());
    let poses: Vec<Frame> = poses.iter().map(|p| p.resized(width, height)).collect();

    let mut out = Vec::new();
    for pair in poses.windows(2) {
        out.push(pair[0].clone());
        push_blends(&mut out, &pair[0], &pair[1], frames_between);
    }
    out.push(poses[poses.len() - 1].clone());

    if loop_back && poses.len() > 1 {
        push_blends(
            &mut out,
            &poses[poses.len() - 1],
            &poses[0],
            frames_between,
        );
    }
    Ok(out)
}

fn push_blends(out: &mut Vec<Frame>, from: &Frame, to: &Frame, count: usize) {
    for step in 1..=count {
        // weight in 0..=255, never hitting either endpoint exactly.
        let weight = ((step * 255) / (count + 1)) as u16;
        out.push(blend(from, to, weight));
    }
}

/// Per-pixel linear blend; `weight` 0 returns `from`, 255 returns `to`.
///
/// `to` is resized to `from`'s dimensions first, so no pixel of `from` is
/// ever left unblended.
pub fn blend(from: &Frame, to: &Frame, weight: u16) -> Frame {
    let to = to.resized(from.width(), from.height());
    let mut rgba = from.rgba().clone();
    for (dst, src) in rgba
        .chunks_exact_mut(4)
        .zip(to.rgba().as_raw().chunks_exact(4))
    {
        for (d, s) in dst.iter_mut().zip(src) {
            *d = lerp_u8(*d, *s, weight);
        }
    }
    Frame::from_rgba(rgba)
}

fn lerp_u8(a: u8, b: u8, weight: u16) -> u8 {
    let inv = 255 - u32::from(weight);
    ((u32::from(a) * inv + u32::from(b) * u32::from(weight) + 127) / 255) as u8
}
