//! Endpoints of HTTP server.
//!
use std::{convert::Infallible, sync::Arc};

use axum::{
    body::StreamBody, http::header, response::IntoResponse, routing::get, Extension, Json, Router,
};
use common::GestureReport;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;

use crate::{pubsub::Subscriptions, VIDEO_FEED_CONTENT_TYPE};

/// Build the HTTP router on top of the pipeline subscriptions.
///
/// All routes are open to any origin so the stream and the gesture can be
/// embedded by pages served elsewhere.
pub fn router(subscriptions: Arc<Subscriptions>) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/video_feed", get(video_feed))
        .route("/gesture", get(gesture))
        .layer(Extension(subscriptions))
        .layer(CorsLayer::permissive())
}

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

/// Endpoint of the annotated camera stream.
pub async fn video_feed(
    Extension(subscriptions): Extension<Arc<Subscriptions>>,
) -> impl IntoResponse {
    log::info!("Video feed requested");

    let mut rx = subscriptions.frames();
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(item) => yield Ok::<_, Infallible>(item),
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("Video feed client lagging, skipped {skipped} frames");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    // Set body and headers for multipart streaming
    let body = StreamBody::new(stream);
    let headers = [(header::CONTENT_TYPE, VIDEO_FEED_CONTENT_TYPE)];

    (headers, body)
}

/// Endpoint reporting the most recently recognized gesture.
pub async fn gesture(
    Extension(subscriptions): Extension<Arc<Subscriptions>>,
) -> impl IntoResponse {
    Json(GestureReport::from(subscriptions.current_gesture()))
}
