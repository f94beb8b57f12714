//! Gesture labels assigned by the detector's class indices.
//!
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Label reported while no gesture has been recognized yet.
pub const NO_GESTURE: &str = "None";

/// Hand gestures the detector is trained on.
///
/// The discriminant order is the class order of the model, i.e. class `0` is
/// `ThumbsUp`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    ThumbsUp,
    OpenPalm,
    Fist,
    ThumbsDown,
    Point,
}

impl Gesture {
    /// All gestures in class order.
    pub const ALL: [Gesture; 5] = [
        Gesture::ThumbsUp,
        Gesture::OpenPalm,
        Gesture::Fist,
        Gesture::ThumbsDown,
        Gesture::Point,
    ];

    /// Map a class index of the model to a gesture.
    pub fn from_class_id(class_id: usize) -> Option<Self> {
        Self::ALL.get(class_id).copied()
    }

    pub fn class_id(&self) -> usize {
        *self as usize
    }

    /// Label as used on the wire.
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::ThumbsUp => "thumbs_up",
            Gesture::OpenPalm => "open_palm",
            Gesture::Fist => "fist",
            Gesture::ThumbsDown => "thumbs_down",
            Gesture::Point => "point",
        }
    }

    /// Human readable message printed when the gesture shows up.
    pub fn announcement(&self) -> &'static str {
        match self {
            Gesture::ThumbsUp => "Thumbs Up!",
            Gesture::OpenPalm => "Open Palm!",
            Gesture::Fist => "Fist!",
            Gesture::ThumbsDown => "Thumbs Down!",
            Gesture::Point => "Point!",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error for labels outside of the gesture set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGesture(pub String);

impl fmt::Display for UnknownGesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown gesture label {:?}", self.0)
    }
}

impl std::error::Error for UnknownGesture {}

impl FromStr for Gesture {
    type Err = UnknownGesture;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|gesture| gesture.label() == s)
            .ok_or_else(|| UnknownGesture(s.to_owned()))
    }
}

/// Announcement for a raw class index, including indices the gesture set
/// does not cover.
pub fn announcement_for_class(class_id: usize) -> String {
    match Gesture::from_class_id(class_id) {
        Some(gesture) => gesture.announcement().to_owned(),
        None => format!("Unknown gesture: class {class_id}"),
    }
}

/// Body of the `/gesture` endpoint.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GestureReport {
    pub gesture: String,
}

impl GestureReport {
    /// Parsed gesture, `None` for the sentinel or an unknown label.
    pub fn gesture(&self) -> Option<Gesture> {
        self.gesture.parse().ok()
    }
}

impl From<Option<Gesture>> for GestureReport {
    fn from(gesture: Option<Gesture>) -> Self {
        let gesture = match gesture {
            Some(gesture) => gesture.label().to_owned(),
            None => NO_GESTURE.to_owned(),
        };
        Self { gesture }
    }
}
