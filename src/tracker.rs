//! Hand kinematics: centroid, velocity, tilt and pointing angle.

use serde::Serialize;

use crate::gestures::Gesture;
use crate::landmarks::{INDEX_TIP, LandmarkFrame, MIDDLE_MCP};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MotionState {
    pub gesture: Gesture,
    /// Mirrored for display, normalized 0-1.
    pub x: f32,
    pub y: f32,
    /// Normalized units per second, x mirrored.
    pub vx: f32,
    pub vy: f32,
    /// Index tip x minus wrist x, never mirrored.
    pub tilt: f32,
    /// Degrees, 0 = index pointing straight up, mirrored.
    pub angle: f32,
}

impl Default for MotionState {
    fn default() -> Self {
        Self {
            gesture: Gesture::None,
            x: 0.5,
            y: 0.5,
            vx: 0.0,
            vy: 0.0,
            tilt: 0.0,
            angle: 0.0,
        }
    }
}

impl MotionState {
    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

#[derive(Debug)]
pub struct MotionEstimator {
    mirror: bool,
    prev_centroid: Option<(f32, f32)>,
    prev_ms: Option<u64>,
}

impl Default for MotionEstimator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MotionEstimator {
    pub fn new(mirror: bool) -> Self {
        Self {
            mirror,
            prev_centroid: None,
            prev_ms: None,
        }
    }

    pub fn reset(&mut self) {
        self.prev_centroid = None;
        self.prev_ms = None;
    }

    pub fn update(
        &mut self,
        frame: Option<&LandmarkFrame>,
        gesture: Gesture,
        timestamp_ms: u64,
    ) -> MotionState {
        let Some(frame) = frame else {
            // a hand reappearing must not see a velocity spike
            self.reset();
            return MotionState::default();
        };

        let wrist = frame.wrist();
        let mcp = frame.get(MIDDLE_MCP);
        let centroid = ((wrist.x + mcp.x) / 2.0, (wrist.y + mcp.y) / 2.0);

        let mut velocity = (0.0, 0.0);
        if let (Some(prev), Some(prev_ms)) = (self.prev_centroid, self.prev_ms) {
            if timestamp_ms > prev_ms {
                let dt = (timestamp_ms - prev_ms) as f32 / 1000.0;
                velocity = ((centroid.0 - prev.0) / dt, (centroid.1 - prev.1) / dt);
            }
        }

        let tip = frame.get(INDEX_TIP);
        let dx = tip.x - wrist.x;
        let dy = tip.y - wrist.y;
        // screen y grows downward, so an upright finger has dy < 0
        let angle = dx.atan2(-dy).to_degrees();

        self.prev_centroid = Some(centroid);
        self.prev_ms = Some(timestamp_ms);

        let sign = if self.mirror { -1.0 } else { 1.0 };
        MotionState {
            gesture,
            x: if self.mirror { 1.0 - centroid.0 } else { centroid.0 },
            y: centroid.1,
            vx: sign * velocity.0,
            vy: velocity.1,
            tilt: dx,
            angle: sign * angle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::fixtures::{hand, hand_at, pointing_at};

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_no_hand_is_neutral() {
        let mut est = MotionEstimator::default();
        let m = est.update(None, Gesture::Fist, 100);
        assert_eq!(m, MotionState::default());
    }

    #[test]
    fn test_position_is_mirrored_centroid() {
        let mut est = MotionEstimator::default();
        // wrist (0.3, 0.8), middle mcp (0.29, 0.7) -> centroid (0.295, 0.75)
        let m = est.update(Some(&hand_at([true; 4], (0.3, 0.8))), Gesture::OpenPalm, 0);
        assert!(approx(m.x, 1.0 - 0.295), "x = {}", m.x);
        assert!(approx(m.y, 0.75), "y = {}", m.y);
        assert_eq!(m.vx, 0.0);
        assert_eq!(m.vy, 0.0);
        assert_eq!(m.gesture, Gesture::OpenPalm);
    }

    #[test]
    fn test_velocity_mirrors_x() {
        let mut est = MotionEstimator::default();
        est.update(Some(&hand_at([true; 4], (0.3, 0.8))), Gesture::OpenPalm, 1000);
        let m = est.update(Some(&hand_at([true; 4], (0.4, 0.7))), Gesture::OpenPalm, 1500);
        // moved +0.1 x, -0.1 y over 0.5s
        assert!(approx(m.vx, -0.2), "vx = {}", m.vx);
        assert!(approx(m.vy, -0.2), "vy = {}", m.vy);
        assert!(approx(m.speed(), (0.08f32).sqrt()));
    }

    #[test]
    fn test_zero_dt_skips_velocity() {
        let mut est = MotionEstimator::default();
        est.update(Some(&hand_at([true; 4], (0.3, 0.8))), Gesture::OpenPalm, 1000);
        let m = est.update(Some(&hand_at([true; 4], (0.6, 0.8))), Gesture::OpenPalm, 1000);
        assert_eq!((m.vx, m.vy), (0.0, 0.0));
        assert!(m.vx.is_finite());
    }

    #[test]
    fn test_no_spike_after_reappearance() {
        let mut est = MotionEstimator::default();
        est.update(Some(&hand_at([true; 4], (0.1, 0.8))), Gesture::OpenPalm, 0);
        est.update(None, Gesture::None, 16);
        let m = est.update(Some(&hand_at([true; 4], (0.9, 0.8))), Gesture::OpenPalm, 32);
        assert_eq!((m.vx, m.vy), (0.0, 0.0));
    }

    #[test]
    fn test_angle_upright_is_zero() {
        let mut est = MotionEstimator::default();
        let m = est.update(Some(&hand([true, false, false, false])), Gesture::Pointing, 0);
        assert!(approx(m.angle, 0.0), "angle = {}", m.angle);
    }

    #[test]
    fn test_angle_is_mirrored_and_tilt_is_not() {
        let mut est = MotionEstimator::default();
        let m = est.update(Some(&pointing_at(12.0)), Gesture::Pointing, 0);
        assert!(approx(m.angle, 12.0), "angle = {}", m.angle);
        // displayed right means the raw tip sits left of the wrist
        assert!(m.tilt < 0.0);

        let mut raw = MotionEstimator::new(false);
        let m = raw.update(Some(&pointing_at(12.0)), Gesture::Pointing, 0);
        assert!(approx(m.angle, -12.0), "angle = {}", m.angle);
    }
}
