//! Thumbnail encoding for display

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Shrink `image` so its longest side is at most `max_side` and encode it as PNG
///
/// Images already within the bound are encoded at their own size.
pub fn encode_thumbnail(image: &DynamicImage, max_side: u32) -> Result<Vec<u8>, image::ImageError> {
    let max_side = max_side.max(1);
    let (w, h) = (image.width(), image.height());

    let mut buf = Cursor::new(Vec::new());
    if w.max(h) > max_side {
        let (new_w, new_h) = fit_within(w, h, max_side);
        image
            .resize_exact(new_w, new_h, FilterType::Lanczos3)
            .write_to(&mut buf, ImageFormat::Png)?;
    } else {
        image.write_to(&mut buf, ImageFormat::Png)?;
    }

    Ok(buf.into_inner())
}

/// Scale (w, h) down to fit a square of `max_side`, keeping the aspect ratio
fn fit_within(w: u32, h: u32, max_side: u32) -> (u32, u32) {
    if w >= h {
        let scaled = (h as u64 * max_side as u64 / w as u64) as u32;
        (max_side, scaled.max(1))
    } else {
        let scaled = (w as u64 * max_side as u64 / h as u64) as u32;
        (scaled.max(1), max_side)
    }
}
