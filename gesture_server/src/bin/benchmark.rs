//! Benchmark the model on an image dataset.
//!
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use env_logger::TimestampPrecision;
use gesture_server::{
    benchmark::{dataset_images, Run, Summary},
    config::ModelArgs,
    nn::YoloModel,
};
use image::RgbImage;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Directory with the images to run the model on
    #[clap(long)]
    dataset: PathBuf,

    /// Runs on the first image before measuring
    #[clap(long, default_value_t = 3)]
    warmup: usize,

    #[clap(flatten)]
    model: ModelArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let model = args.model.load().await?;

    let images = dataset_images(&args.dataset)?
        .into_iter()
        .map(|path| -> Result<(PathBuf, RgbImage)> {
            log::debug!("Loading {}", path.display());
            Ok((path.clone(), image::open(&path)?.to_rgb8()))
        })
        .collect::<Result<Vec<_>>>()?;

    let warmup = args.warmup;
    let runs = tokio::task::spawn_blocking(move || benchmark(&model, &images, warmup)).await??;

    let Some(summary) = Summary::from_runs(&runs) else {
        bail!("no images benchmarked");
    };
    println!(
        "Benchmark of {} at {}x{} on {}",
        args.model.model.display(),
        args.model.imgsz,
        args.model.imgsz,
        args.dataset.display()
    );
    println!("{summary}");

    Ok(())
}

fn benchmark(
    model: &YoloModel,
    images: &[(PathBuf, RgbImage)],
    warmup: usize,
) -> Result<Vec<Run>> {
    if let Some((_, image)) = images.first() {
        for _ in 0..warmup {
            model.run_timed(image)?;
        }
    }

    images
        .iter()
        .map(|(path, image)| {
            let (detections, timings) = model.run_timed(image)?;
            log::info!(
                "{}: {} detections in {:.2} ms",
                path.display(),
                detections.len(),
                timings.total().as_secs_f64() * 1000.0
            );

            Ok(Run {
                timings,
                detections: detections.len(),
            })
        })
        .collect()
}
