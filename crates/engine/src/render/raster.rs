use image::RgbaImage;

use crate::geometry::{PixelRect, Rgba};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlendMode {
    Replace,
    Over,
}

pub(crate) fn write_pixel_rgba_clipped(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    color: Rgba,
    mode: BlendMode,
) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let Some(pixel_offset) = (y as usize)
        .checked_mul(width as usize)
        .and_then(|row| row.checked_add(x as usize))
    else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    let pixel = &mut frame[byte_offset..end];
    match mode {
        BlendMode::Replace => pixel.copy_from_slice(&color),
        BlendMode::Over => blend_over(pixel, color),
    }
}

/// Source-over compositing on straight (non-premultiplied) RGBA.
pub(crate) fn blend_over(dst: &mut [u8], src: Rgba) {
    let alpha = src[3] as u32;
    if alpha == 255 {
        dst.copy_from_slice(&src);
        return;
    }
    if alpha == 0 {
        return;
    }
    let dst_alpha = dst[3] as u32;
    let inv = 255 - alpha;
    let out_alpha = alpha * 255 + dst_alpha * inv;
    if out_alpha == 0 {
        return;
    }
    for channel in 0..3 {
        let blended = src[channel] as u32 * alpha * 255 + dst[channel] as u32 * dst_alpha * inv;
        dst[channel] = ((blended + out_alpha / 2) / out_alpha) as u8;
    }
    dst[3] = ((out_alpha + 127) / 255) as u8;
}

pub(crate) fn fill_rect(
    frame: &mut [u8],
    width: u32,
    height: u32,
    rect: PixelRect,
    color: Rgba,
    mode: BlendMode,
) {
    let bounds = PixelRect::from_size(0, 0, width, height);
    let Some(clipped) = rect.intersection(&bounds) else {
        return;
    };
    for y in clipped.top..clipped.bottom {
        for x in clipped.left..clipped.right {
            write_pixel_rgba_clipped(frame, width, height, x, y, color, mode);
        }
    }
}

/// Nearest-neighbour scaled copy of `src_rect` from `source` into `dst_rect`.
pub(crate) fn blit_scaled(
    frame: &mut [u8],
    width: u32,
    height: u32,
    source: &RgbaImage,
    src_rect: PixelRect,
    dst_rect: PixelRect,
    mode: BlendMode,
) {
    if src_rect.is_empty() || dst_rect.is_empty() {
        return;
    }
    let source_bounds = PixelRect::from_size(0, 0, source.width(), source.height());
    if src_rect.intersection(&source_bounds) != Some(src_rect) {
        return;
    }
    let frame_bounds = PixelRect::from_size(0, 0, width, height);
    let Some(clipped) = dst_rect.intersection(&frame_bounds) else {
        return;
    };

    let src_width = src_rect.width() as i64;
    let src_height = src_rect.height() as i64;
    let dst_width = dst_rect.width() as i64;
    let dst_height = dst_rect.height() as i64;
    for y in clipped.top..clipped.bottom {
        let sy = src_rect.top as i64 + (y - dst_rect.top) as i64 * src_height / dst_height;
        for x in clipped.left..clipped.right {
            let sx = src_rect.left as i64 + (x - dst_rect.left) as i64 * src_width / dst_width;
            let color = source.get_pixel(sx as u32, sy as u32).0;
            write_pixel_rgba_clipped(frame, width, height, x, y, color, mode);
        }
    }
}
