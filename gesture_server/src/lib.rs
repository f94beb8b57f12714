//! Hand-gesture recognition on a live camera stream, served via HTTP.
//!
use bytes::Bytes;

pub mod annotate;
pub mod benchmark;
pub mod config;
pub mod endpoints;
pub mod meter;
pub mod nn;
pub mod pipeline;
pub mod pubsub;
pub mod sensors;
pub mod utils;

/// Content type of the video feed, parts are separated by `--frame`.
pub const VIDEO_FEED_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Wrap a JPEG image as one part of a `multipart/x-mixed-replace` stream.
pub fn as_jpeg_stream_item(data: &[u8]) -> Bytes {
    Bytes::copy_from_slice(
        &[
            "--frame\r\nContent-Type: image/jpeg\r\n\r\n".as_bytes(),
            data,
            "\r\n\r\n".as_bytes(),
        ]
        .concat(),
    )
}
