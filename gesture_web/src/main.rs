//! Web front end binary.
//!
use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use clap::Parser;
use env_logger::TimestampPrecision;
use gesture_web::{router, Upstream};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve the web page on
    #[clap(long, default_value = "127.0.0.1:3000")]
    address: String,

    /// Base URL of the gesture server
    #[clap(long, default_value = "http://localhost:5000")]
    upstream: String,

    /// URL of the video feed as reachable from browsers, derived from the
    /// upstream URL if not given
    #[clap(long)]
    video_feed_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let mut upstream = Upstream::new(&args.upstream);
    if let Some(video_feed_url) = &args.video_feed_url {
        upstream = upstream.with_video_feed_url(video_feed_url);
    }

    let addr: SocketAddr = args.address.parse()?;
    log::info!("Web server running at http://{}", addr);

    axum::Server::bind(&addr)
        .serve(router(Arc::new(upstream)).into_make_service())
        .await?;

    Ok(())
}
