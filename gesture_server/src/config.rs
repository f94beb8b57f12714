//! Command line arguments shared by the binaries.
//!
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::{
    nn::{ModelConfig, YoloModel},
    sensors::{Camera, PixelFormat, Resolution},
    utils::ensure_model,
};

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// ONNX model exported from the detector's training run
    #[clap(long, default_value = "yolo11n.onnx")]
    pub model: PathBuf,

    /// URL to download the model from if it is not available locally
    #[clap(long)]
    pub model_url: Option<String>,

    /// Edge length of the square model input
    #[clap(long, default_value_t = 640, value_parser = clap::value_parser!(u32).range(1..))]
    pub imgsz: u32,

    /// Minimum confidence of a detection
    #[clap(long, default_value_t = 0.25)]
    pub conf: f32,

    /// Maximum IoU of two detections of the same class
    #[clap(long, default_value_t = 0.7)]
    pub iou: f32,

    /// Maximum number of detections per frame
    #[clap(long, default_value_t = 300)]
    pub max_det: usize,
}

impl ModelArgs {
    /// Resolve the model file and load it.
    pub async fn load(&self) -> Result<YoloModel> {
        let path = ensure_model(&self.model, self.model_url.as_deref()).await?;
        YoloModel::new(ModelConfig {
            path,
            input_size: self.imgsz,
            min_confidence: self.conf,
            max_iou: self.iou,
            max_detections: self.max_det,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct CameraArgs {
    /// Video device to capture from
    #[clap(long, default_value = "/dev/video0")]
    pub device: String,

    /// Pixel format requested from the camera (MJPG or RGB3)
    #[clap(long, default_value = "MJPG")]
    pub format: PixelFormat,

    /// Capture resolution as WIDTHxHEIGHT, or `max` for the highest supported
    #[clap(long)]
    pub resolution: Option<Resolution>,

    /// Frames per second, the highest supported if not given
    #[clap(long)]
    pub fps: Option<u32>,
}

impl CameraArgs {
    /// Open the camera, using `default_resolution` if none was requested.
    pub fn open(&self, default_resolution: (u32, u32)) -> Result<Camera> {
        let resolution = self
            .resolution
            .unwrap_or(Resolution::Exact(default_resolution.0, default_resolution.1));

        Camera::open(&self.device, self.format, resolution.exact(), self.fps)
    }
}
