//! Object detection with YOLO-style ONNX models.
//!
use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use image::{imageops::FilterType, Rgb, RgbImage};
use ndarray::{s, ArrayView2, Axis, Ix2};
use tract_onnx::prelude::*;

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Positive additive constant to avoid divide-by-zero.
const EPS: f32 = 1.0e-7;

/// Gray value used to pad letterboxed images.
const PAD_VALUE: u8 = 114;

/// Bounding box `[x_top_left, y_top_left, x_bottom_right, y_bottom_right]`.
pub type Bbox = [f32; 4];

/// A single detected object in source image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: Bbox,
    pub confidence: f32,
    pub class_id: usize,
}

/// Time spent in the stages of one model run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Timings {
    pub preprocess: Duration,
    pub inference: Duration,
    pub postprocess: Duration,
}

impl Timings {
    pub fn total(&self) -> Duration {
        self.preprocess + self.inference + self.postprocess
    }
}

pub trait InferModel {
    /// Detect objects on an image, most confident first.
    fn run(&self, input: &RgbImage) -> Result<Vec<Detection>>;
}

/// Parameters of a detection model.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Edge length of the square model input.
    pub input_size: u32,
    pub min_confidence: f32,
    pub max_iou: f32,
    pub max_detections: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("yolo11n.onnx"),
            input_size: 640,
            min_confidence: 0.25,
            max_iou: 0.7,
            max_detections: 300,
        }
    }
}

pub struct YoloModel {
    model: NnModel,
    config: ModelConfig,
}

impl YoloModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        if config.input_size == 0 {
            bail!("model input size must be at least 1");
        }
        let size = config.input_size as usize;
        let input_fact = InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size));

        log::info!("Loading model {}", config.path.display());
        let model = tract_onnx::onnx()
            .model_for_path(&config.path)?
            .with_input_fact(0, input_fact)?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { model, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Run the model and measure the time spent in each stage.
    pub fn run_timed(&self, input: &RgbImage) -> Result<(Vec<Detection>, Timings)> {
        let start = Instant::now();
        let letterbox = Letterbox::new(input.width(), input.height(), self.config.input_size);
        let tensor = self.preproc(input, &letterbox);

        let preprocessed = Instant::now();
        let raw_nn_out = self.model.run(tvec!(tensor.into()))?;

        let inferred = Instant::now();
        let detections = self.postproc(&raw_nn_out[0], &letterbox)?;

        let timings = Timings {
            preprocess: preprocessed - start,
            inference: inferred - preprocessed,
            postprocess: inferred.elapsed(),
        };

        Ok((detections, timings))
    }

    fn preproc(&self, input: &RgbImage, letterbox: &Letterbox) -> Tensor {
        let size = self.config.input_size as usize;
        let canvas = letterbox.apply(input);

        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
                canvas[(x as _, y as _)][c] as f32 / 255.0
            })
            .into();

        tensor
    }

    fn postproc(&self, raw_nn_out: &Tensor, letterbox: &Letterbox) -> Result<Vec<Detection>> {
        let output = raw_nn_out.to_array_view::<f32>()?;
        if output.ndim() != 3 {
            bail!("unexpected model output shape {:?}", output.shape());
        }
        let output = output.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;

        let mut candidates = decode_output(output, letterbox, self.config.min_confidence);
        candidates.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));

        let mut selected = non_maximum_suppression(candidates, self.config.max_iou);
        selected.truncate(self.config.max_detections);

        Ok(selected)
    }
}

impl InferModel for YoloModel {
    fn run(&self, input: &RgbImage) -> Result<Vec<Detection>> {
        self.run_timed(input).map(|(detections, _)| detections)
    }
}

/// Aspect-preserving resize of a source image onto a square, centred canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    size: u32,
    scale: f32,
    resized: (u32, u32),
    pad: (u32, u32),
    source: (u32, u32),
}

impl Letterbox {
    pub fn new(width: u32, height: u32, size: u32) -> Self {
        let scale = f32::min(
            size as f32 / width.max(1) as f32,
            size as f32 / height.max(1) as f32,
        );
        let resized_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let resized_height = ((height as f32 * scale).round() as u32).clamp(1, size);

        Self {
            size,
            scale,
            resized: (resized_width, resized_height),
            pad: ((size - resized_width) / 2, (size - resized_height) / 2),
            source: (width, height),
        }
    }

    pub fn apply(&self, input: &RgbImage) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(self.size, self.size, Rgb([PAD_VALUE; 3]));
        let resized = image::imageops::resize(
            input,
            self.resized.0,
            self.resized.1,
            FilterType::Triangle,
        );
        image::imageops::overlay(&mut canvas, &resized, self.pad.0 as i64, self.pad.1 as i64);

        canvas
    }

    /// Map a box from model input coordinates back onto the source image.
    pub fn to_source(&self, bbox: Bbox) -> Bbox {
        let (pad_x, pad_y) = (self.pad.0 as f32, self.pad.1 as f32);
        let (width, height) = (self.source.0 as f32, self.source.1 as f32);

        [
            ((bbox[0] - pad_x) / self.scale).clamp(0.0, width),
            ((bbox[1] - pad_y) / self.scale).clamp(0.0, height),
            ((bbox[2] - pad_x) / self.scale).clamp(0.0, width),
            ((bbox[3] - pad_y) / self.scale).clamp(0.0, height),
        ]
    }
}

/// Turn raw model output into candidate detections above `min_confidence`.
///
/// The output holds one column per anchor with `cx, cy, w, h` in model input
/// pixels followed by one score per class. Exports with one row per anchor
/// are transposed first.
fn decode_output(
    output: ArrayView2<f32>,
    letterbox: &Letterbox,
    min_confidence: f32,
) -> Vec<Detection> {
    let output = match output.nrows() > output.ncols() {
        true => output.reversed_axes(),
        false => output,
    };
    if output.nrows() <= 4 {
        return vec![];
    }

    output
        .axis_iter(Axis(1))
        .filter_map(|anchor| {
            let (class_id, confidence) = anchor
                .slice(s![4..])
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))?;
            if confidence <= min_confidence {
                return None;
            }

            let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
            let bbox = [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0];

            Some(Detection {
                bbox: letterbox.to_source(bbox),
                confidence,
                class_id,
            })
        })
        .collect()
}

/// Run non-maximum-suppression on candidate detections.
///
/// Start with the most confident detection and iterate over all others in the
/// order of sinking confidence. A candidate is kept only if its IoU with every
/// already selected detection of the same class is at most `max_iou`.
/// Candidates must be sorted by ascending confidence.
pub fn non_maximum_suppression(
    mut sorted_candidates: Vec<Detection>,
    max_iou: f32,
) -> Vec<Detection> {
    let mut selected: Vec<Detection> = vec![];
    'candidates: loop {
        // Get next most confident detection from the back of the ascending-sorted vector.
        match sorted_candidates.pop() {
            Some(candidate) => {
                for chosen in selected.iter() {
                    if chosen.class_id == candidate.class_id
                        && iou(&candidate.bbox, &chosen.bbox) > max_iou
                    {
                        continue 'candidates;
                    }
                }

                selected.push(candidate)
            }
            None => break 'candidates,
        }
    }

    selected
}

/// Calculate the intersection-over-union metric for two bounding boxes.
pub fn iou(bbox_a: &Bbox, bbox_b: &Bbox) -> f32 {
    // If the boxes do not overlap, the corner points of the overlap box are
    // swapped and its area is zero.
    let overlap_box: Bbox = [
        f32::max(bbox_a[0], bbox_b[0]),
        f32::max(bbox_a[1], bbox_b[1]),
        f32::min(bbox_a[2], bbox_b[2]),
        f32::min(bbox_a[3], bbox_b[3]),
    ];

    let overlap_area = bbox_area(&overlap_box);

    overlap_area / (bbox_area(bbox_a) + bbox_area(bbox_b) - overlap_area + EPS)
}

/// Calculate the area enclosed by a bounding box.
///
/// If the bottom-right point lies above or left of the top-left point, the
/// area is zero.
fn bbox_area(bbox: &Bbox) -> f32 {
    let width = bbox[2] - bbox[0];
    let height = bbox[3] - bbox[1];
    if width < 0.0 || height < 0.0 {
        return 0.0;
    }

    width * height
}

#[cfg(test)]
mod test {

    use ndarray::Array2;

    use super::*;

    fn detection(bbox: Bbox, confidence: f32, class_id: usize) -> Detection {
        Detection {
            bbox,
            confidence,
            class_id,
        }
    }

    #[test]
    fn empty_input_size_is_rejected_before_loading() {
        let error = YoloModel::new(ModelConfig {
            input_size: 0,
            ..Default::default()
        })
        .err()
        .map(|e| e.to_string());

        assert_eq!(error.as_deref(), Some("model input size must be at least 1"));
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let bbox = [0.0, 0.0, 10.0, 10.0];
        assert!((iou(&bbox, &bbox) - 1.0).abs() < 1e-4);
        assert_eq!(iou(&bbox, &[20.0, 20.0, 30.0, 30.0]), 0.0);

        // Half of the first box overlaps with the second one
        let iou_half = iou(&bbox, &[5.0, 0.0, 15.0, 10.0]);
        assert!((iou_half - 50.0 / 150.0).abs() < 1e-4);
    }

    #[test]
    fn bbox_area_of_swapped_corners_is_zero() {
        assert_eq!(bbox_area(&[10.0, 10.0, 0.0, 0.0]), 0.0);
        assert_eq!(bbox_area(&[0.0, 0.0, 4.0, 2.0]), 8.0);
    }

    #[test]
    fn nms_keeps_most_confident_of_overlapping_boxes() {
        let candidates = vec![
            detection([1.0, 1.0, 11.0, 11.0], 0.6, 0),
            detection([50.0, 50.0, 60.0, 60.0], 0.7, 0),
            detection([0.0, 0.0, 10.0, 10.0], 0.9, 0),
        ];

        let selected = non_maximum_suppression(candidates, 0.5);

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].confidence, 0.9);
        assert_eq!(selected[1].confidence, 0.7);
    }

    #[test]
    fn nms_is_per_class() {
        let candidates = vec![
            detection([0.0, 0.0, 10.0, 10.0], 0.8, 2),
            detection([0.0, 0.0, 10.0, 10.0], 0.9, 1),
        ];

        let selected = non_maximum_suppression(candidates, 0.5);

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].class_id, 1);
        assert_eq!(selected[1].class_id, 2);
    }

    #[test]
    fn letterbox_pads_short_side() {
        let letterbox = Letterbox::new(640, 480, 640);
        assert_eq!(letterbox.resized, (640, 480));
        assert_eq!(letterbox.pad, (0, 80));

        let bbox = letterbox.to_source([100.0, 180.0, 200.0, 280.0]);
        assert_eq!(bbox, [100.0, 100.0, 200.0, 200.0]);

        let canvas = letterbox.apply(&RgbImage::from_pixel(640, 480, Rgb([255, 0, 0])));
        assert_eq!(canvas.dimensions(), (640, 640));
        assert_eq!(canvas[(320, 10)], Rgb([PAD_VALUE; 3]));
        assert_eq!(canvas[(320, 320)], Rgb([255, 0, 0]));
    }

    #[test]
    fn letterbox_scales_and_clamps() {
        let letterbox = Letterbox::new(1280, 720, 640);
        assert_eq!(letterbox.resized, (640, 360));
        assert_eq!(letterbox.pad, (0, 140));

        let bbox = letterbox.to_source([-10.0, 140.0, 320.0, 700.0]);
        assert_eq!(bbox, [0.0, 0.0, 640.0, 720.0]);
    }

    #[test]
    fn decode_picks_best_class_above_threshold() {
        let letterbox = Letterbox::new(640, 640, 640);

        // Eight anchors, two classes: rows are cx, cy, w, h, score_0, score_1
        let mut output = Array2::<f32>::zeros((6, 8));
        output
            .column_mut(0)
            .assign(&ndarray::arr1(&[100.0, 100.0, 20.0, 20.0, 0.9, 0.05]));
        output
            .column_mut(1)
            .assign(&ndarray::arr1(&[300.0, 300.0, 40.0, 40.0, 0.1, 0.8]));
        output
            .column_mut(2)
            .assign(&ndarray::arr1(&[500.0, 500.0, 10.0, 10.0, 0.2, 0.1]));

        let detections = decode_output(output.view(), &letterbox, 0.25);

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_id, 0);
        assert_eq!(detections[0].bbox, [90.0, 90.0, 110.0, 110.0]);
        assert_eq!(detections[1].class_id, 1);
        assert_eq!(detections[1].confidence, 0.8);
    }

    #[test]
    fn decode_accepts_transposed_output() {
        let letterbox = Letterbox::new(640, 640, 640);

        // Eight anchors as rows, one class
        let mut output = Array2::<f32>::zeros((8, 5));
        output
            .row_mut(3)
            .assign(&ndarray::arr1(&[50.0, 50.0, 10.0, 10.0, 0.6]));

        let detections = decode_output(output.view(), &letterbox, 0.25);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, [45.0, 45.0, 55.0, 55.0]);
    }

    #[test]
    fn missing_model_file_fails() {
        let config = ModelConfig {
            path: PathBuf::from("does/not/exist.onnx"),
            ..Default::default()
        };
        assert!(YoloModel::new(config).is_err());
    }
}
