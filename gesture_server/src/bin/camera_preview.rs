//! Run the model on the camera stream and log what it sees.
//!
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use env_logger::TimestampPrecision;
use gesture_server::{
    annotate::{class_label, Annotator, DEFAULT_FONT},
    config::{CameraArgs, ModelArgs},
    nn::YoloModel,
    sensors::Camera,
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Write the latest annotated frame to this JPEG file
    #[clap(long)]
    output: Option<PathBuf>,

    /// Font for detection captions
    #[clap(long, default_value = DEFAULT_FONT)]
    font: PathBuf,

    #[clap(flatten)]
    model: ModelArgs,

    #[clap(flatten)]
    camera: CameraArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let model = args.model.load().await?;
    let camera = args.camera.open((1280, 720))?;
    let annotator = Annotator::new(&args.font);

    tokio::task::spawn_blocking(move || {
        preview(&camera, &model, &annotator, args.output.as_deref())
    })
    .await?
}

fn preview(
    camera: &Camera,
    model: &YoloModel,
    annotator: &Annotator,
    output: Option<&std::path::Path>,
) -> Result<()> {
    loop {
        let mut frame = camera.capture()?;
        let (detections, timings) = model.run_timed(&frame)?;

        let seen: Vec<_> = detections
            .iter()
            .map(|detection| {
                format!(
                    "{} {:.2}",
                    class_label(detection.class_id),
                    detection.confidence
                )
            })
            .collect();
        log::info!(
            "{} detections in {:.1} ms: {}",
            detections.len(),
            timings.total().as_secs_f64() * 1000.0,
            seen.join(", ")
        );

        if let Some(output) = output {
            annotator.draw(&mut frame, &detections);
            let buf = turbojpeg::compress_image(&frame, 90, turbojpeg::Subsamp::Sub2x2)?;
            std::fs::write(output, &buf[..])?;
        }
    }
}
