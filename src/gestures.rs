use serde::Serialize;

use crate::config::Thresholds;
use crate::landmarks::{FINGERS, INDEX_MCP, LandmarkFrame, THUMB_TIP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gesture {
    #[default]
    None,
    Fist,
    OpenPalm,
    Pointing,
}

impl Gesture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Fist => "FIST",
            Self::OpenPalm => "OPEN_PALM",
            Self::Pointing => "POINTING",
        }
    }
}

/// Per-finger openness for one frame. Index, middle, ring, pinky.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandPose {
    pub fingers: [bool; 4],
    /// Computed but not a discriminant: a thumb-only difference never
    /// changes the gesture.
    pub thumb: bool,
}

impl HandPose {
    pub fn gesture(&self) -> Gesture {
        match self.fingers {
            [true, true, true, true] => Gesture::OpenPalm,
            [true, false, false, false] => Gesture::Pointing,
            [false, false, false, false] => Gesture::Fist,
            _ => Gesture::None,
        }
    }
}

/// Stateless frame → gesture mapping. No smoothing happens here.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    extension_ratio: f32,
    thumb_open_dist: f32,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self {
            extension_ratio: 1.2,
            thumb_open_dist: 0.1,
        }
    }
}

impl GestureClassifier {
    pub fn new(th: &Thresholds) -> Self {
        Self {
            extension_ratio: th.extension_ratio,
            thumb_open_dist: th.thumb_open_dist,
        }
    }

    pub fn pose(&self, frame: &LandmarkFrame) -> HandPose {
        let wrist = frame.wrist();
        let mut fingers = [false; 4];
        for (open, (tip, pip)) in fingers.iter_mut().zip(FINGERS) {
            let tip_d = frame.get(tip).dist(wrist);
            let pip_d = frame.get(pip).dist(wrist);
            *open = tip_d > pip_d * self.extension_ratio;
        }
        let thumb = frame.get(THUMB_TIP).dist(frame.get(INDEX_MCP)) > self.thumb_open_dist;
        HandPose { fingers, thumb }
    }

    pub fn classify(&self, frame: Option<&LandmarkFrame>) -> Gesture {
        match frame {
            Some(f) => self.pose(f).gesture(),
            None => Gesture::None,
        }
    }
}
