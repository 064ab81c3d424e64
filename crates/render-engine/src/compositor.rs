//! Frame compositor: background, optional photo, and the three text bands.
//!
//! Every clip of a video is a single still frame. The compositor draws it
//! once into an RGB raster that the encoder later loops for the clip's
//! duration. Drawing is deterministic: the same item, photo bytes, and
//! fonts always produce the same pixels.

use std::io::Cursor;
use std::sync::Arc;

use drillreel_common::error::{DrillreelError, DrillreelResult};
use drillreel_drill_model::item::{Band, RenderItem};
use drillreel_drill_model::job::JobMode;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::assets::{AssetLoadError, AssetOutcome, AssetRole, Degradation, LoadedAsset};
use crate::fonts::{FontSet, FontWeight};

/// Portrait canvas for shorts.
pub const SHORT_CANVAS: (u32, u32) = (1080, 1920);

/// Landscape canvas for demos.
pub const DEMO_CANVAS: (u32, u32) = (1280, 720);

const BACKGROUND: Rgb<u8> = Rgb([30, 30, 50]);
const BAND_BACKING: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const GRAY: Rgb<u8> = Rgb([200, 200, 200]);
const GOLD: Rgb<u8> = Rgb([255, 215, 0]);

/// Placement and look of one text band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStyle {
    /// Top edge of the backing rectangle.
    pub rect_top: i32,
    /// Height of the backing rectangle.
    pub rect_height: u32,
    /// Top edge of the text.
    pub text_y: i32,
    pub size_px: f32,
    /// Horizontal padding on each side of the text.
    pub padding: u32,
    pub weight: FontWeight,
    pub color: Rgb<u8>,
}

/// A right-aligned label below the bottom band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterStyle {
    pub text_y: i32,
    pub right_margin: u32,
    pub size_px: f32,
    pub color: Rgb<u8>,
}

/// Full geometry for one canvas kind.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub background: Rgb<u8>,
    /// Largest box a photo may occupy; photos are centered on the canvas.
    pub photo_box: (u32, u32),
    pub top: BandStyle,
    pub middle: BandStyle,
    pub bottom: BandStyle,
    /// "Drill i of n" position label, for multi-item videos.
    pub counter: Option<CounterStyle>,
}

impl FrameLayout {
    pub fn short() -> Self {
        let (width, height) = SHORT_CANVAS;
        let h = height as i32;
        Self {
            width,
            height,
            background: BACKGROUND,
            photo_box: (width - 200, height - 800),
            top: BandStyle {
                rect_top: 100,
                rect_height: 101,
                text_y: 120,
                size_px: 70.0,
                padding: 20,
                weight: FontWeight::Bold,
                color: WHITE,
            },
            middle: BandStyle {
                rect_top: 230,
                rect_height: 81,
                text_y: 240,
                size_px: 50.0,
                padding: 15,
                weight: FontWeight::Regular,
                color: GRAY,
            },
            bottom: BandStyle {
                rect_top: h - 220,
                rect_height: 101,
                text_y: h - 200,
                size_px: 70.0,
                padding: 20,
                weight: FontWeight::Bold,
                color: GOLD,
            },
            counter: None,
        }
    }

    pub fn demo() -> Self {
        let (width, height) = DEMO_CANVAS;
        let h = height as i32;
        Self {
            width,
            height,
            background: BACKGROUND,
            photo_box: (width - 200, height - 280),
            top: BandStyle {
                rect_top: 20,
                rect_height: 61,
                text_y: 30,
                size_px: 40.0,
                padding: 14,
                weight: FontWeight::Bold,
                color: WHITE,
            },
            middle: BandStyle {
                rect_top: 90,
                rect_height: 47,
                text_y: 96,
                size_px: 30.0,
                padding: 10,
                weight: FontWeight::Regular,
                color: GRAY,
            },
            bottom: BandStyle {
                rect_top: h - 100,
                rect_height: 61,
                text_y: h - 90,
                size_px: 40.0,
                padding: 14,
                weight: FontWeight::Bold,
                color: GOLD,
            },
            counter: Some(CounterStyle {
                text_y: h - 32,
                right_margin: 30,
                size_px: 22.0,
                color: GRAY,
            }),
        }
    }

    pub fn for_mode(mode: JobMode) -> Self {
        match mode {
            JobMode::Short => Self::short(),
            JobMode::Demo => Self::demo(),
        }
    }

    pub fn band(&self, band: Band) -> &BandStyle {
        match band {
            Band::Top => &self.top,
            Band::Middle => &self.middle,
            Band::Bottom => &self.bottom,
        }
    }
}

/// Where the photo ended up on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoPlacement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// A rendered frame plus whatever went wrong while producing it.
#[derive(Debug, Clone)]
pub struct ComposedFrame {
    pub image: RgbImage,
    pub photo: Option<PhotoPlacement>,
    pub degradations: Vec<Degradation>,
}

impl ComposedFrame {
    /// Encode the frame as PNG.
    pub fn to_png_bytes(&self) -> DrillreelResult<Vec<u8>> {
        encode_png(&self.image)
    }
}

/// One line of a title card.
#[derive(Debug, Clone)]
pub struct TitleLine {
    pub text: String,
    pub size_px: f32,
    pub weight: FontWeight,
    pub color: Rgb<u8>,
}

const TITLE_LINE_GAP: u32 = 30;

/// Draws frames with a shared, pre-resolved font set.
#[derive(Debug, Clone)]
pub struct FrameComposer {
    fonts: Arc<FontSet>,
}

impl FrameComposer {
    pub fn new(fonts: Arc<FontSet>) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    /// Compose one item frame.
    ///
    /// A photo that fails to decode is dropped and reported; it never fails
    /// the frame.
    pub fn compose(
        &self,
        layout: &FrameLayout,
        item: &RenderItem,
        photo: AssetOutcome<LoadedAsset>,
    ) -> ComposedFrame {
        let mut canvas = RgbImage::from_pixel(layout.width, layout.height, layout.background);
        let mut degradations = Vec::new();
        let mut placement = None;

        match photo {
            AssetOutcome::Absent => {}
            AssetOutcome::Degraded(degradation) => degradations.push(degradation),
            AssetOutcome::Ready(asset) => match image::load_from_memory(&asset.bytes) {
                Ok(decoded) => {
                    placement = Some(paste_photo(&mut canvas, layout, decoded.to_rgb8()));
                }
                Err(err) => {
                    let error = AssetLoadError::decode(&asset.locator, err.to_string());
                    tracing::warn!(locator = %asset.locator, error = %error, "Photo could not be decoded, composing without it");
                    degradations.push(Degradation::new(AssetRole::Photo, asset.locator, &error));
                }
            },
        }

        for band in Band::ALL {
            if let Some(text) = item.band_text(band) {
                self.draw_band(&mut canvas, layout.band(band), text);
            }
        }

        ComposedFrame {
            image: canvas,
            photo: placement,
            degradations,
        }
    }

    /// Stamp "Drill {position} of {total}" in the layout's counter slot.
    /// Layouts without a counter slot are left untouched.
    pub fn draw_counter(
        &self,
        layout: &FrameLayout,
        canvas: &mut RgbImage,
        position: usize,
        total: usize,
    ) {
        let Some(style) = layout.counter else {
            return;
        };
        let text = format!("Drill {position} of {total}");
        let (text_w, _) = self.fonts.measure(FontWeight::Regular, style.size_px, &text);
        let x = layout.width as i32 - text_w as i32 - style.right_margin as i32;
        self.fonts.draw(
            canvas,
            FontWeight::Regular,
            style.size_px,
            x,
            style.text_y,
            style.color,
            &text,
        );
    }

    /// Compose a card of vertically stacked, centered lines.
    pub fn compose_title_card(&self, width: u32, height: u32, lines: &[TitleLine]) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

        let sizes: Vec<(u32, u32)> = lines
            .iter()
            .map(|line| self.fonts.measure(line.weight, line.size_px, &line.text))
            .collect();
        let gaps = TITLE_LINE_GAP * lines.len().saturating_sub(1) as u32;
        let block_height: u32 = sizes.iter().map(|(_, h)| *h).sum::<u32>() + gaps;

        let mut y = (height as i32 - block_height as i32) / 2;
        for (line, (w, h)) in lines.iter().zip(&sizes) {
            let x = (width as i32 - *w as i32) / 2;
            self.fonts
                .draw(&mut canvas, line.weight, line.size_px, x, y, line.color, &line.text);
            y += (*h + TITLE_LINE_GAP) as i32;
        }

        canvas
    }

    /// Opening card of a demo.
    pub fn intro_card(&self, job_id: u64, item_count: usize) -> RgbImage {
        let (w, h) = DEMO_CANVAS;
        self.compose_title_card(
            w,
            h,
            &[
                TitleLine {
                    text: "Drill Player Demo".to_string(),
                    size_px: 60.0,
                    weight: FontWeight::Bold,
                    color: WHITE,
                },
                TitleLine {
                    text: format!("Test ID: {job_id} - {item_count} drills"),
                    size_px: 36.0,
                    weight: FontWeight::Regular,
                    color: GRAY,
                },
            ],
        )
    }

    /// Closing card of a demo.
    pub fn outro_card(&self, branding: &str) -> RgbImage {
        let (w, h) = DEMO_CANVAS;
        let mut lines = vec![TitleLine {
            text: "Demo Completed".to_string(),
            size_px: 60.0,
            weight: FontWeight::Bold,
            color: WHITE,
        }];
        if !branding.trim().is_empty() {
            lines.push(TitleLine {
                text: branding.trim().to_string(),
                size_px: 36.0,
                weight: FontWeight::Regular,
                color: GRAY,
            });
        }
        self.compose_title_card(w, h, &lines)
    }

    fn draw_band(&self, canvas: &mut RgbImage, style: &BandStyle, text: &str) {
        let (text_w, _) = self.fonts.measure(style.weight, style.size_px, text);
        let x = (canvas.width() as i32 - text_w as i32) / 2;

        let backing = Rect::at(x - style.padding as i32, style.rect_top)
            .of_size(text_w + 2 * style.padding + 1, style.rect_height);
        draw_filled_rect_mut(canvas, backing, BAND_BACKING);

        self.fonts
            .draw(canvas, style.weight, style.size_px, x, style.text_y, style.color, text);
    }
}

/// Scale `(width, height)` down to fit inside `(max_w, max_h)`, keeping the
/// aspect ratio. Images that already fit are returned unchanged.
pub fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width <= max_w && height <= max_h {
        return (width, height);
    }
    let scale = (max_w as f64 / width as f64).min(max_h as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_w);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_h);
    (w, h)
}

fn paste_photo(canvas: &mut RgbImage, layout: &FrameLayout, photo: RgbImage) -> PhotoPlacement {
    let (max_w, max_h) = layout.photo_box;
    let (w, h) = fit_within(photo.width(), photo.height(), max_w, max_h);
    let photo = if (w, h) == photo.dimensions() {
        photo
    } else {
        imageops::resize(&photo, w, h, FilterType::Lanczos3)
    };

    let x = (layout.width as i64 - w as i64) / 2;
    let y = (layout.height as i64 - h as i64) / 2;
    imageops::replace(canvas, &photo, x, y);

    PhotoPlacement {
        x,
        y,
        width: w,
        height: h,
    }
}

/// PNG-encode a raster.
pub fn encode_png(image: &RgbImage) -> DrillreelResult<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|e| DrillreelError::encode(format!("Failed to encode frame as PNG: {e}")))?;
    Ok(bytes.into_inner())
}
