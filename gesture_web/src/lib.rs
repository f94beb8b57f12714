//! Web front end showing the annotated stream and the recognized gesture.
//!
use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use common::GestureReport;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const INDEX_HTML: &str = include_str!("index.html");

/// Body returned when the gesture server cannot be reached.
#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProxyError {
    pub error: String,
}

/// The gesture server this front end is attached to.
pub struct Upstream {
    client: Client,
    base_url: String,
    video_feed_url: String,
}

impl Upstream {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_owned();
        Self {
            client: Client::new(),
            video_feed_url: format!("{base_url}/video_feed"),
            base_url,
        }
    }

    /// Use a different address for the video feed as seen from browsers.
    pub fn with_video_feed_url(mut self, video_feed_url: &str) -> Self {
        self.video_feed_url = video_feed_url.to_owned();
        self
    }

    pub fn video_feed_url(&self) -> &str {
        &self.video_feed_url
    }

    pub async fn fetch_gesture(&self) -> Result<GestureReport> {
        let report = self
            .client
            .get(format!("{}/gesture", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(report)
    }
}

pub fn router(upstream: Arc<Upstream>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/gesture", get(gesture))
        .layer(Extension(upstream))
}

async fn index(Extension(upstream): Extension<Arc<Upstream>>) -> Html<String> {
    Html(INDEX_HTML.replace("{{VIDEO_FEED_URL}}", upstream.video_feed_url()))
}

/// Forward the gesture of the upstream server.
async fn gesture(Extension(upstream): Extension<Arc<Upstream>>) -> Response {
    match upstream.fetch_gesture().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            log::warn!("Failed to fetch gesture data: {e}");
            let body = ProxyError {
                error: "Failed to fetch gesture data".into(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}
