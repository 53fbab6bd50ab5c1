//! 2x2 preview grid compositor
//!
//! Pure pixel work, no SDL types. Each camera slot gets one tile;
//! live frames are scale-fit and centered, empty slots stay black.
//! Every tile carries a thin border and a status label.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::camera::{PixelLayout, SharedFrame, VideoFrame};

pub const GRID_COLS: u32 = 2;
pub const GRID_ROWS: u32 = 2;

const BORDER_RGB: [u8; 3] = [60, 60, 60];
const LABEL_OK_RGB: [u8; 3] = [255, 255, 0];
const LABEL_OFF_RGB: [u8; 3] = [255, 0, 0];

/// Label position inside a tile, pixels from the tile origin
const LABEL_X: u32 = 10;
const LABEL_Y: u32 = 10;
const LABEL_SCALE: u32 = 2;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// Flat RGB24 image, row major, no padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl CompositeImage {
    fn new_black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 3],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Out-of-bounds writes are dropped, so labels clip cleanly on
    /// tiny tiles.
    fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x < self.width && y < self.height {
            let i = (y as usize * self.width as usize + x as usize) * 3;
            self.data[i..i + 3].copy_from_slice(&rgb);
        }
    }
}

/// Lay the slot frames out on a 2x2 grid.
///
/// `frames` is indexed by slot; missing or `None` entries render as a
/// black tile labeled OFF. The output is always `GRID_COLS x GRID_ROWS`
/// tiles regardless of how many slots are configured.
pub fn compose_grid(
    frames: &[Option<SharedFrame>],
    tile_width: u32,
    tile_height: u32,
) -> CompositeImage {
    let mut canvas = CompositeImage::new_black(tile_width * GRID_COLS, tile_height * GRID_ROWS);

    for tile in 0..GRID_COLS * GRID_ROWS {
        let col = tile % GRID_COLS;
        let row = tile / GRID_COLS;
        let x0 = col * tile_width;
        let y0 = row * tile_height;

        let frame = frames.get(tile as usize).and_then(|f| f.as_deref());
        if let Some(frame) = frame {
            blit_scaled(&mut canvas, frame, x0, y0, tile_width, tile_height);
        }

        draw_border(&mut canvas, x0, y0, tile_width, tile_height);

        let live = frame.is_some();
        let label = format!("C{} {}", tile, if live { "OK" } else { "OFF" });
        let color = if live { LABEL_OK_RGB } else { LABEL_OFF_RGB };
        draw_label(&mut canvas, &label, x0 + LABEL_X, y0 + LABEL_Y, color);
    }

    canvas
}

/// Scale-fit the frame into the tile, preserving aspect, centered.
/// A frame whose buffer does not match its dimensions leaves the tile
/// black.
fn blit_scaled(
    canvas: &mut CompositeImage,
    frame: &VideoFrame,
    x0: u32,
    y0: u32,
    tile_width: u32,
    tile_height: u32,
) {
    let Some(rgb) = frame_to_rgb(frame) else {
        return;
    };

    let scale = f64::min(
        tile_width as f64 / frame.width as f64,
        tile_height as f64 / frame.height as f64,
    );
    let new_w = ((frame.width as f64 * scale) as u32).clamp(1, tile_width);
    let new_h = ((frame.height as f64 * scale) as u32).clamp(1, tile_height);

    let resized = imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);
    let x_off = x0 + (tile_width - new_w) / 2;
    let y_off = y0 + (tile_height - new_h) / 2;

    for (x, y, px) in resized.enumerate_pixels() {
        canvas.put_pixel(x_off + x, y_off + y, px.0);
    }
}

fn frame_to_rgb(frame: &VideoFrame) -> Option<RgbImage> {
    if frame.data.len() != frame.expected_len() {
        return None;
    }
    let rgb: Vec<u8> = match frame.layout {
        PixelLayout::Rgb24 => frame.data.to_vec(),
        PixelLayout::Bgr24 => {
            let mut v = frame.data.to_vec();
            for px in v.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            v
        }
        PixelLayout::Luma8 => frame.data.iter().flat_map(|&g| [g, g, g]).collect(),
    };
    RgbImage::from_raw(frame.width, frame.height, rgb)
}

/// One-pixel frame along the tile's own edge
fn draw_border(canvas: &mut CompositeImage, x0: u32, y0: u32, width: u32, height: u32) {
    for x in x0..x0 + width {
        canvas.put_pixel(x, y0, BORDER_RGB);
        canvas.put_pixel(x, y0 + height - 1, BORDER_RGB);
    }
    for y in y0..y0 + height {
        canvas.put_pixel(x0, y, BORDER_RGB);
        canvas.put_pixel(x0 + width - 1, y, BORDER_RGB);
    }
}

fn draw_label(canvas: &mut CompositeImage, text: &str, x: u32, y: u32, color: [u8; 3]) {
    let mut pen_x = x;
    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (gy, bits) in rows.iter().enumerate() {
                for gx in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - gx)) == 0 {
                        continue;
                    }
                    for dy in 0..LABEL_SCALE {
                        for dx in 0..LABEL_SCALE {
                            canvas.put_pixel(
                                pen_x + gx * LABEL_SCALE + dx,
                                y + gy as u32 * LABEL_SCALE + dy,
                                color,
                            );
                        }
                    }
                }
            }
        }
        pen_x += (GLYPH_WIDTH + 1) * LABEL_SCALE;
    }
}

/// 5x7 bitmaps for the handful of characters the status labels use.
/// Rows are top to bottom, bit 4 is the leftmost column.
#[rustfmt::skip]
fn glyph(c: char) -> Option<&'static [u8; GLYPH_HEIGHT as usize]> {
    match c {
        'C' => Some(&[0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
        'O' => Some(&[0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
        'K' => Some(&[0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
        'F' => Some(&[0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000]),
        '0' => Some(&[0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
        '1' => Some(&[0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        '2' => Some(&[0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
        '3' => Some(&[0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110]),
        '4' => Some(&[0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
        '5' => Some(&[0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
        '6' => Some(&[0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
        '7' => Some(&[0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
        '8' => Some(&[0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
        '9' => Some(&[0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
        ' ' => None,
        _ => None,
    }
}
