//! Channels between the inference pipeline and the HTTP endpoints.
//!
use bytes::Bytes;
use common::Gesture;
use tokio::sync::{broadcast, watch};

use crate::{as_jpeg_stream_item, meter::METER};

/// Annotated frames kept for slow stream clients before they start skipping.
const FRAME_BROADCAST_CAPACITY: usize = 4;

pub type FrameReceiver = broadcast::Receiver<Bytes>;
pub type GestureReceiver = watch::Receiver<Option<Gesture>>;

/// Create a connected publisher/subscriptions pair.
pub fn channels() -> (Publisher, Subscriptions) {
    let (frames_tx, _) = broadcast::channel(FRAME_BROADCAST_CAPACITY);
    let (gesture_tx, gesture_rx) = watch::channel(None);

    let publisher = Publisher {
        frames_tx: frames_tx.clone(),
        gesture_tx,
    };
    let subscriptions = Subscriptions {
        frames_tx,
        gesture_rx,
    };

    (publisher, subscriptions)
}

/// Sending half, owned by the inference pipeline.
pub struct Publisher {
    frames_tx: broadcast::Sender<Bytes>,
    gesture_tx: watch::Sender<Option<Gesture>>,
}

impl Publisher {
    /// Whether any client currently watches the video feed.
    pub fn has_viewers(&self) -> bool {
        self.frames_tx.receiver_count() > 0
    }

    /// Send a JPEG image to all video feed clients.
    pub fn publish_frame(&self, jpeg: &[u8]) {
        match self.frames_tx.send(as_jpeg_stream_item(jpeg)) {
            Ok(_) => METER.tick_published(),
            Err(_) => log::debug!("No video feed listener for frame"),
        }
    }

    /// Store the most recently recognized gesture, returns whether it changed.
    pub fn publish_gesture(&self, gesture: Gesture) -> bool {
        self.gesture_tx.send_if_modified(|current| {
            if *current == Some(gesture) {
                return false;
            }
            *current = Some(gesture);
            true
        })
    }
}

/// Receiving half, shared by the HTTP endpoints.
pub struct Subscriptions {
    frames_tx: broadcast::Sender<Bytes>,
    gesture_rx: watch::Receiver<Option<Gesture>>,
}

impl Subscriptions {
    /// Subscribe to annotated frames published from now on.
    pub fn frames(&self) -> FrameReceiver {
        self.frames_tx.subscribe()
    }

    pub fn current_gesture(&self) -> Option<Gesture> {
        *self.gesture_rx.borrow()
    }

    pub fn gesture_updates(&self) -> GestureReceiver {
        self.gesture_rx.clone()
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn gesture_starts_unset_and_tracks_changes() {
        let (publisher, subscriptions) = channels();
        assert_eq!(subscriptions.current_gesture(), None);

        assert!(publisher.publish_gesture(Gesture::Fist));
        assert!(!publisher.publish_gesture(Gesture::Fist));
        assert_eq!(subscriptions.current_gesture(), Some(Gesture::Fist));

        assert!(publisher.publish_gesture(Gesture::Point));
        assert_eq!(subscriptions.current_gesture(), Some(Gesture::Point));
    }

    #[tokio::test]
    async fn gesture_updates_notify_on_change() {
        let (publisher, subscriptions) = channels();
        let mut updates = subscriptions.gesture_updates();

        publisher.publish_gesture(Gesture::OpenPalm);
        updates.changed().await.unwrap();
        assert_eq!(*updates.borrow(), Some(Gesture::OpenPalm));

        publisher.publish_gesture(Gesture::OpenPalm);
        assert!(!updates.has_changed().unwrap());
    }

    #[tokio::test]
    async fn frames_reach_subscribers_as_stream_items() {
        let (publisher, subscriptions) = channels();
        assert!(!publisher.has_viewers());

        let mut frames = subscriptions.frames();
        assert!(publisher.has_viewers());

        publisher.publish_frame(b"jpeg");
        let item = frames.recv().await.unwrap();
        assert_eq!(item, as_jpeg_stream_item(b"jpeg"));

        drop(frames);
        assert!(!publisher.has_viewers());
    }
}
