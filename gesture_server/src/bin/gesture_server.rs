//! Gesture server binary.
//!
use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use env_logger::TimestampPrecision;
use gesture_server::{
    annotate::{Annotator, DEFAULT_FONT},
    config::{CameraArgs, ModelArgs},
    endpoints::router,
    meter::spawn_meter_logger,
    pipeline::{spawn_pipeline, Pipeline},
    pubsub::channels,
};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve the video feed and gesture endpoints on
    #[clap(long, default_value = "0.0.0.0:5000")]
    server_address: String,

    /// Quality of the streamed JPEG frames (1-100)
    #[clap(long, default_value_t = 90)]
    jpeg_quality: i32,

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

    let addr: SocketAddr = args.server_address.parse()?;

    // Build channels between inference and serving via HTTP
    let (publisher, subscriptions) = channels();

    let model = args.model.load().await?;
    let camera = args.camera.open((640, 480))?;
    let pipeline = Pipeline::new(model, Annotator::new(&args.font), publisher)
        .with_jpeg_quality(args.jpeg_quality);

    // Run capture and inference on separate threads
    let pipeline_handle = spawn_pipeline(camera, pipeline);

    spawn_meter_logger();

    // Build HTTP server with endpoints
    let app = router(Arc::new(subscriptions));
    let server = axum::Server::bind(&addr).serve(app.into_make_service());
    log::info!("Serving on http://{}", addr);

    tokio::select! {
        res = server => {
            res?;
            log::error!("HTTP server stopped");
        }
        res = pipeline_handle => {
            res??;
            log::error!("Pipeline stopped");
        }
    }

    Ok(())
}
