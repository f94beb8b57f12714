//! Print a message whenever the recognized gesture changes.
//!
use anyhow::Result;
use clap::Parser;
use common::gesture::announcement_for_class;
use env_logger::TimestampPrecision;
use gesture_server::{
    config::{CameraArgs, ModelArgs},
    nn::{InferModel, YoloModel},
    pipeline::recognized_class,
    sensors::Camera,
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
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
    let camera = args.camera.open((640, 480))?;

    tokio::task::spawn_blocking(move || watch_gestures(&camera, &model)).await?
}

fn watch_gestures(camera: &Camera, model: &YoloModel) -> Result<()> {
    let mut last_class = None;

    loop {
        let frame = camera.capture()?;
        let detections = model.run(&frame)?;

        if let Some(class_id) = recognized_class(&detections) {
            if last_class != Some(class_id) {
                println!("{}", announcement_for_class(class_id));
                last_class = Some(class_id);
            }
        }
    }
}
