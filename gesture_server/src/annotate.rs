//! Draw detections onto frames.
//!
use std::path::Path;

use common::Gesture;
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use rusttype::{Font, Scale};

use crate::nn::Detection;

/// Font used for captions unless configured otherwise.
pub const DEFAULT_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf";

const CAPTION_HEIGHT: f32 = 16.0;

const PALETTE: [[u8; 3]; 6] = [
    [0, 255, 0],
    [255, 56, 56],
    [0, 194, 255],
    [255, 157, 151],
    [255, 178, 29],
    [207, 210, 49],
];

/// Label for a class index of the model.
pub fn class_label(class_id: usize) -> String {
    match Gesture::from_class_id(class_id) {
        Some(gesture) => gesture.label().to_owned(),
        None => format!("class {class_id}"),
    }
}

pub struct Annotator {
    font: Option<Font<'static>>,
}

impl Annotator {
    /// Build an annotator with captions rendered in the font at `font_path`.
    ///
    /// If the font cannot be loaded, only boxes are drawn.
    pub fn new(font_path: &Path) -> Self {
        let font = std::fs::read(font_path).ok().and_then(Font::try_from_vec);
        if font.is_none() {
            log::warn!(
                "Could not load font {}, drawing boxes without captions",
                font_path.display()
            );
        }

        Self { font }
    }

    pub fn without_captions() -> Self {
        Self { font: None }
    }

    /// Draw bounding boxes with labels and confidence scores on the frame.
    pub fn draw(&self, frame: &mut RgbImage, detections: &[Detection]) {
        let (width, height) = frame.dimensions();

        for detection in detections {
            let color = Rgb(PALETTE[detection.class_id % PALETTE.len()]);

            // Coordinate frame basis is on the top left corner
            let x_tl = detection.bbox[0].clamp(0.0, width as f32) as u32;
            let y_tl = detection.bbox[1].clamp(0.0, height as f32) as u32;
            let x_br = detection.bbox[2].clamp(0.0, width as f32) as u32;
            let y_br = detection.bbox[3].clamp(0.0, height as f32) as u32;
            if x_br <= x_tl || y_br <= y_tl {
                continue;
            }

            let rect = Rect::at(x_tl as i32, y_tl as i32).of_size(x_br - x_tl, y_br - y_tl);
            draw_hollow_rect_mut(frame, rect, color);
            if rect.width() > 2 && rect.height() > 2 {
                let inner = Rect::at(rect.left() + 1, rect.top() + 1)
                    .of_size(rect.width() - 2, rect.height() - 2);
                draw_hollow_rect_mut(frame, inner, color);
            }

            if let Some(font) = &self.font {
                let caption = format!(
                    "{} {:.2}",
                    class_label(detection.class_id),
                    detection.confidence
                );
                let caption_top = (y_tl as i32 - CAPTION_HEIGHT as i32).max(0);
                let caption_width = (caption.len() as f32 * CAPTION_HEIGHT * 0.6) as u32;

                let caption_rect = Rect::at(x_tl as i32, caption_top)
                    .of_size(caption_width.max(1), CAPTION_HEIGHT as u32);

                draw_filled_rect_mut(frame, caption_rect, color);
                draw_text_mut(
                    frame,
                    Rgb([0, 0, 0]),
                    x_tl as i32,
                    caption_top,
                    Scale::uniform(CAPTION_HEIGHT),
                    font,
                    &caption,
                );
            }
        }
    }
}
