//! Common code shared between `gesture_server` and `gesture_web`.
pub mod gesture;

pub use gesture::{Gesture, GestureReport, NO_GESTURE};
