use crate::{
    error::{AsciimateError, AsciimateResult},
    model::Frame,
};

/// Dark-to-light glyph ramp used by [`CharStyle::Standard`].
pub const STANDARD_CHARSET: &[char] = &['@', '%', '#', '*', '+', '=', '-', ':', '.', ' '];
/// Dark-to-light block glyph ramp used by [`CharStyle::Blocks`].
pub const BLOCK_CHARSET: &[char] = &['█', '▓', '▒', '░', ' '];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CharStyle {
    #[default]
    Standard,
    Blocks,
}

impl CharStyle {
    fn charset(self) -> &'static [char] {
        match self {
            CharStyle::Standard => STANDARD_CHARSET,
            CharStyle::Blocks => BLOCK_CHARSET,
        }
    }
}

/// Controls for terminal ASCII rendering.
#[derive(Clone, Debug)]
pub struct AsciiOptions {
    /// Output width in character cells.
    pub width: u32,
    pub style: CharStyle,
    /// Emit 24-bit ANSI color per glyph.
    pub colored: bool,
    /// Luma multiplier, 1.0 leaves the image unchanged.
    pub brightness: f32,
    /// Contrast around the midpoint, 1.0 leaves the image unchanged.
    pub contrast: f32,
}

impl Default for AsciiOptions {
    fn default() -> Self {
        Self {
            width: 120,
            style: CharStyle::Standard,
            colored: false,
            brightness: 1.0,
            contrast: 1.0,
        }
    }
}

/// Render a frame as text for terminal preview.
///
/// The glyph for a cell is picked by `luma * charset_len / 256` on the
/// dark-to-light ramp; output height is derived from the source aspect
/// ratio, halved because terminal cells are roughly twice as tall as wide.
pub fn render_ascii(frame: &Frame, opts: &AsciiOptions) -> AsciimateResult<String> {
    if opts.width == 0 {
        return Err(AsciimateError::encode("ascii width must be non-zero"));
    }

    let aspect = frame.height() as f32 / frame.width() as f32;
    let rows = ((opts.width as f32 * aspect * 0.5).round() as u32).max(1);
    let small = frame.resized(opts.width, rows);

    let charset = opts.style.charset();
    let mut out = String::with_capacity((opts.width as usize + 1) * rows as usize);
    for y in 0..rows {
        for x in 0..opts.width {
            let [r, g, b, _] = small.rgba().get_pixel(x, y).0;
            let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
            let boosted = boost(luma, opts.brightness, opts.contrast);
            let index = (boosted as usize * charset.len() / 256).min(charset.len() - 1);

            if opts.colored {
                out.push_str(&format!("\x1b[38;2;{r};{g};{b}m"));
            }
            out.push(charset[index]);
        }
        if opts.colored {
            out.push_str("\x1b[0m");
        }
        out.push('\n');
    }
    Ok(out)
}

fn boost(luma: f32, brightness: f32, contrast: f32) -> u8 {
    let contrasted = (luma - 128.0) * contrast + 128.0;
    (contrasted * brightness).clamp(0.0, 255.0) as u8
}
