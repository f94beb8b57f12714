//! Capture → infer → annotate → publish.
//!
use anyhow::{bail, Result};
use common::Gesture;
use image::RgbImage;
use thingbuf::mpsc::blocking::{self, Sender};
use tokio::task::JoinHandle;

use crate::{
    annotate::Annotator,
    meter::METER,
    nn::{Detection, InferModel},
    pubsub::Publisher,
    sensors::FrameSource,
};

/// Raw frames buffered between capture and inference.
const RAW_FRAME_SLOTS: usize = 2;

/// Consecutive capture failures after which the camera is given up.
const MAX_CAPTURE_FAILURES: u32 = 10;

const DEFAULT_JPEG_QUALITY: i32 = 90;

/// Gesture of the last detection whose class belongs to the gesture set.
///
/// Detections are ordered by descending confidence, so with several hands in
/// view the least confident recognized one wins.
pub fn recognized_gesture(detections: &[Detection]) -> Option<Gesture> {
    detections
        .iter()
        .filter_map(|detection| Gesture::from_class_id(detection.class_id))
        .last()
}

/// Class of the last detection, whether or not it is a known gesture.
pub fn recognized_class(detections: &[Detection]) -> Option<usize> {
    detections.last().map(|detection| detection.class_id)
}

pub struct Pipeline<M> {
    model: M,
    annotator: Annotator,
    publisher: Publisher,
    jpeg_quality: i32,
}

impl<M: InferModel> Pipeline<M> {
    pub fn new(model: M, annotator: Annotator, publisher: Publisher) -> Self {
        Self {
            model,
            annotator,
            publisher,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, jpeg_quality: i32) -> Self {
        self.jpeg_quality = jpeg_quality.clamp(1, 100);
        self
    }

    /// Run inference on a frame and publish the results.
    ///
    /// The frame is only annotated and encoded while someone watches the
    /// video feed.
    pub fn process(&self, mut frame: RgbImage) -> Result<Vec<Detection>> {
        let detections = self.model.run(&frame)?;
        METER.tick_infered();

        if let Some(gesture) = recognized_gesture(&detections) {
            if self.publisher.publish_gesture(gesture) {
                log::info!("Recognized gesture {gesture}");
            }
        }

        if self.publisher.has_viewers() {
            self.annotator.draw(&mut frame, &detections);
            let buf =
                turbojpeg::compress_image(&frame, self.jpeg_quality, turbojpeg::Subsamp::Sub2x2)?;
            self.publisher.publish_frame(&buf);
        }

        Ok(detections)
    }
}

/// Run capture and inference on blocking threads until the source fails.
///
/// Frames arriving while inference is busy are dropped.
pub fn spawn_pipeline<S, M>(source: S, pipeline: Pipeline<M>) -> JoinHandle<Result<()>>
where
    S: FrameSource + Send + 'static,
    M: InferModel + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let format = source.format();
        let resolution = source.resolution();
        let (frames_tx, frames_rx) = blocking::channel::<Vec<u8>>(RAW_FRAME_SLOTS);

        let capture = std::thread::Builder::new()
            .name("capture".into())
            .spawn(move || capture_frames(source, frames_tx))?;

        while let Some(raw_frame) = frames_rx.recv_ref() {
            let frame = format.decode(&raw_frame, resolution);
            drop(raw_frame);

            match frame {
                Ok(frame) => {
                    if let Err(e) = pipeline.process(frame) {
                        log::warn!("Failed to process frame: {e}");
                    }
                }
                Err(e) => log::warn!("Dropping undecodable frame: {e}"),
            }
        }

        match capture.join() {
            Ok(result) => result,
            Err(_) => bail!("capture thread panicked"),
        }
    })
}

fn capture_frames<S: FrameSource>(mut source: S, frames_tx: Sender<Vec<u8>>) -> Result<()> {
    let mut failures = 0;

    loop {
        match source.capture_raw() {
            Ok(frame) => {
                failures = 0;
                METER.tick_captured();

                if let Ok(mut slot) = frames_tx.try_send_ref() {
                    slot.clear();
                    slot.extend_from_slice(&frame);
                }
            }
            Err(e) => {
                failures += 1;
                log::error!("Unable to capture frame ({failures}/{MAX_CAPTURE_FAILURES}): {e}");
                if failures >= MAX_CAPTURE_FAILURES {
                    bail!("capture failed {failures} times in a row, last error: {e}");
                }
            }
        }
    }
}
