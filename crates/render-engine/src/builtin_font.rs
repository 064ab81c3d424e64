//! Minimal 5x7 bitmap font used when no vector font can be loaded.
//!
//! Covers printable ASCII. Each glyph is five columns, least significant bit
//! at the top. Anything outside the table renders as an outlined box.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

const GLYPH_COLUMNS: u32 = 5;
const GLYPH_ROWS: u32 = 8;
const ADVANCE: u32 = 6;

#[rustfmt::skip]
const GLYPHS: [[u8; 5]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x00, 0x00, 0x5F, 0x00, 0x00], // !
    [0x00, 0x07, 0x00, 0x07, 0x00], // "
    [0x14, 0x7F, 0x14, 0x7F, 0x14], // #
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], // $
    [0x23, 0x13, 0x08, 0x64, 0x62], // %
    [0x36, 0x49, 0x56, 0x20, 0x50], // &
    [0x00, 0x08, 0x07, 0x03, 0x00], // '
    [0x00, 0x1C, 0x22, 0x41, 0x00], // (
    [0x00, 0x41, 0x22, 0x1C, 0x00], // )
    [0x2A, 0x1C, 0x7F, 0x1C, 0x2A], // *
    [0x08, 0x08, 0x3E, 0x08, 0x08], // +
    [0x00, 0x80, 0x70, 0x30, 0x00], // ,
    [0x08, 0x08, 0x08, 0x08, 0x08], // -
    [0x00, 0x00, 0x60, 0x60, 0x00], // .
    [0x20, 0x10, 0x08, 0x04, 0x02], // /
    [0x3E, 0x51, 0x49, 0x45, 0x3E], // 0
    [0x00, 0x42, 0x7F, 0x40, 0x00], // 1
    [0x72, 0x49, 0x49, 0x49, 0x46], // 2
    [0x21, 0x41, 0x49, 0x4D, 0x33], // 3
    [0x18, 0x14, 0x12, 0x7F, 0x10], // 4
    [0x27, 0x45, 0x45, 0x45, 0x39], // 5
    [0x3C, 0x4A, 0x49, 0x49, 0x31], // 6
    [0x41, 0x21, 0x11, 0x09, 0x07], // 7
    [0x36, 0x49, 0x49, 0x49, 0x36], // 8
    [0x46, 0x49, 0x49, 0x29, 0x1E], // 9
    [0x00, 0x00, 0x14, 0x00, 0x00], // :
    [0x00, 0x40, 0x34, 0x00, 0x00], // ;
    [0x00, 0x08, 0x14, 0x22, 0x41], // <
    [0x14, 0x14, 0x14, 0x14, 0x14], // =
    [0x00, 0x41, 0x22, 0x14, 0x08], // >
    [0x02, 0x01, 0x59, 0x09, 0x06], // ?
    [0x3E, 0x41, 0x5D, 0x59, 0x4E], // @
    [0x7C, 0x12, 0x11, 0x12, 0x7C], // A
    [0x7F, 0x49, 0x49, 0x49, 0x36], // B
    [0x3E, 0x41, 0x41, 0x41, 0x22], // C
    [0x7F, 0x41, 0x41, 0x41, 0x3E], // D
    [0x7F, 0x49, 0x49, 0x49, 0x41], // E
    [0x7F, 0x09, 0x09, 0x09, 0x01], // F
    [0x3E, 0x41, 0x41, 0x51, 0x73], // G
    [0x7F, 0x08, 0x08, 0x08, 0x7F], // H
    [0x00, 0x41, 0x7F, 0x41, 0x00], // I
    [0x20, 0x40, 0x41, 0x3F, 0x01], // J
    [0x7F, 0x08, 0x14, 0x22, 0x41], // K
    [0x7F, 0x40, 0x40, 0x40, 0x40], // L
    [0x7F, 0x02, 0x1C, 0x02, 0x7F], // M
    [0x7F, 0x04, 0x08, 0x10, 0x7F], // N
    [0x3E, 0x41, 0x41, 0x41, 0x3E], // O
    [0x7F, 0x09, 0x09, 0x09, 0x06], // P
    [0x3E, 0x41, 0x51, 0x21, 0x5E], // Q
    [0x7F, 0x09, 0x19, 0x29, 0x46], // R
    [0x26, 0x49, 0x49, 0x49, 0x32], // S
    [0x03, 0x01, 0x7F, 0x01, 0x03], // T
    [0x3F, 0x40, 0x40, 0x40, 0x3F], // U
    [0x1F, 0x20, 0x40, 0x20, 0x1F], // V
    [0x3F, 0x40, 0x38, 0x40, 0x3F], // W
    [0x63, 0x14, 0x08, 0x14, 0x63], // X
    [0x03, 0x04, 0x78, 0x04, 0x03], // Y
    [0x61, 0x59, 0x49, 0x4D, 0x43], // Z
    [0x00, 0x7F, 0x41, 0x41, 0x41], // [
    [0x02, 0x04, 0x08, 0x10, 0x20], // backslash
    [0x00, 0x41, 0x41, 0x41, 0x7F], // ]
    [0x04, 0x02, 0x01, 0x02, 0x04], // ^
    [0x40, 0x40, 0x40, 0x40, 0x40], // _
    [0x00, 0x03, 0x07, 0x08, 0x00], // `
    [0x20, 0x54, 0x54, 0x78, 0x40], // a
    [0x7F, 0x28, 0x44, 0x44, 0x38], // b
    [0x38, 0x44, 0x44, 0x44, 0x28], // c
    [0x38, 0x44, 0x44, 0x28, 0x7F], // d
    [0x38, 0x54, 0x54, 0x54, 0x18], // e
    [0x00, 0x08, 0x7E, 0x09, 0x02], // f
    [0x18, 0xA4, 0xA4, 0x9C, 0x78], // g
    [0x7F, 0x08, 0x04, 0x04, 0x78], // h
    [0x00, 0x44, 0x7D, 0x40, 0x00], // i
    [0x20, 0x40, 0x40, 0x3D, 0x00], // j
    [0x7F, 0x10, 0x28, 0x44, 0x00], // k
    [0x00, 0x41, 0x7F, 0x40, 0x00], // l
    [0x7C, 0x04, 0x78, 0x04, 0x78], // m
    [0x7C, 0x08, 0x04, 0x04, 0x78], // n
    [0x38, 0x44, 0x44, 0x44, 0x38], // o
    [0xFC, 0x18, 0x24, 0x24, 0x18], // p
    [0x18, 0x24, 0x24, 0x18, 0xFC], // q
    [0x7C, 0x08, 0x04, 0x04, 0x08], // r
    [0x48, 0x54, 0x54, 0x54, 0x24], // s
    [0x04, 0x04, 0x3F, 0x44, 0x24], // t
    [0x3C, 0x40, 0x40, 0x20, 0x7C], // u
    [0x1C, 0x20, 0x40, 0x20, 0x1C], // v
    [0x3C, 0x40, 0x30, 0x40, 0x3C], // w
    [0x44, 0x28, 0x10, 0x28, 0x44], // x
    [0x4C, 0x90, 0x90, 0x90, 0x7C], // y
    [0x44, 0x64, 0x54, 0x4C, 0x44], // z
    [0x00, 0x08, 0x36, 0x41, 0x00], // {
    [0x00, 0x00, 0x77, 0x00, 0x00], // |
    [0x00, 0x41, 0x36, 0x08, 0x00], // }
    [0x02, 0x01, 0x02, 0x04, 0x02], // ~
];

/// Integer pixel scale for a requested pixel size.
pub fn pixel_scale(size_px: f32) -> u32 {
    ((size_px / GLYPH_ROWS as f32).round() as u32).max(1)
}

/// Width and height of `text` at the given pixel size.
pub fn measure(size_px: f32, text: &str) -> (u32, u32) {
    let scale = pixel_scale(size_px);
    let count = text.chars().count() as u32;
    (count * ADVANCE * scale, GLYPH_ROWS * scale)
}

/// Draw `text` with its top-left corner at `(x, y)`. Pixels outside the
/// canvas are clipped.
pub fn draw(canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, size_px: f32, text: &str) {
    let scale = pixel_scale(size_px);
    let mut pen_x = x;

    for ch in text.chars() {
        match glyph(ch) {
            Some(columns) => draw_glyph(canvas, color, pen_x, y, scale, columns),
            None if !ch.is_whitespace() => {
                let rect = Rect::at(pen_x, y + scale as i32)
                    .of_size(GLYPH_COLUMNS * scale, (GLYPH_ROWS - 2) * scale);
                draw_hollow_rect_mut(canvas, rect, color);
            }
            None => {}
        }
        pen_x += (ADVANCE * scale) as i32;
    }
}

fn glyph(ch: char) -> Option<&'static [u8; 5]> {
    let code = ch as u32;
    if (0x20..=0x7E).contains(&code) {
        GLYPHS.get((code - 0x20) as usize)
    } else {
        None
    }
}

fn draw_glyph(canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, scale: u32, columns: &[u8; 5]) {
    for (col, bits) in columns.iter().enumerate() {
        for row in 0..GLYPH_ROWS {
            if bits & (1 << row) == 0 {
                continue;
            }
            let px = x + (col as u32 * scale) as i32;
            let py = y + (row * scale) as i32;
            draw_filled_rect_mut(canvas, Rect::at(px, py).of_size(scale, scale), color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_scales_with_size() {
        assert_eq!(measure(8.0, "ab"), (12, 8));
        assert_eq!(measure(70.0, "ab"), (2 * 6 * 9, 72));
        assert_eq!(measure(2.0, ""), (0, 8));
    }

    #[test]
    fn test_draw_sets_pixels_for_ascii() {
        let mut canvas = RgbImage::from_pixel(40, 20, Rgb([0, 0, 0]));
        draw(&mut canvas, Rgb([255, 255, 255]), 1, 1, 8.0, "H");
        // Left stem of 'H'.
        assert_eq!(canvas.get_pixel(1, 1), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(1, 7), &Rgb([255, 255, 255]));
        // Gap between stems on the top row.
        assert_eq!(canvas.get_pixel(3, 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_non_ascii_draws_box_and_clips() {
        let mut canvas = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        draw(&mut canvas, Rgb([9, 9, 9]), 6, 6, 16.0, "ⴰ");
        assert!(canvas.pixels().any(|p| *p == Rgb([9, 9, 9])));
    }
}
