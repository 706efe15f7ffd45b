use std::collections::VecDeque;

/// Confirms a "shake" of the pointing finger: the angle range over the most
/// recent `window` samples exceeding `range_deg`.
#[derive(Debug)]
pub struct ShakeDetector {
    history: VecDeque<f32>,
    window: usize,
    range_deg: f32,
}

impl Default for ShakeDetector {
    fn default() -> Self {
        Self::new(20, 20.0)
    }
}

impl ShakeDetector {
    pub fn new(window: usize, range_deg: f32) -> Self {
        Self {
            history: VecDeque::with_capacity(window + 1),
            window: window.max(1),
            range_deg,
        }
    }

    /// Feed one angle; true exactly once per completed shake.
    pub fn observe(&mut self, angle: f32) -> bool {
        self.history.push_back(angle);
        while self.history.len() > self.window {
            self.history.pop_front();
        }

        let (min, max) = self
            .history
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &a| {
                (lo.min(a), hi.max(a))
            });

        if max - min > self.range_deg {
            // stale samples must not retrigger the next shake
            self.history.clear();
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triggers_on_fifth_sample() {
        let mut d = ShakeDetector::default();
        let fired: Vec<bool> = [0.0, 5.0, 10.0, 15.0, -10.0, 5.0]
            .into_iter()
            .map(|a| d.observe(a))
            .collect();
        assert_eq!(fired, vec![false, false, false, false, true, false]);
    }

    #[test]
    fn test_exactly_threshold_does_not_fire() {
        let mut d = ShakeDetector::default();
        assert!(!d.observe(0.0));
        assert!(!d.observe(20.0));
        assert!(d.observe(20.5));
    }

    #[test]
    fn test_clears_after_positive() {
        let mut d = ShakeDetector::default();
        d.observe(-15.0);
        assert!(d.observe(15.0));
        assert!(d.is_empty());
        // needs a fresh qualifying range
        assert!(!d.observe(15.0));
        assert!(!d.observe(0.0));
        assert!(d.observe(-10.0));
    }

    #[test]
    fn test_window_evicts_old_samples() {
        let mut d = ShakeDetector::new(3, 20.0);
        assert!(!d.observe(-15.0));
        assert!(!d.observe(0.0));
        assert!(!d.observe(0.0));
        // -15 is evicted before the range is measured
        assert!(!d.observe(6.0));
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn test_slow_drift_never_fires() {
        let mut d = ShakeDetector::default();
        for i in 0..200 {
            assert!(!d.observe(i as f32 * 0.5), "fired at sample {i}");
        }
    }
}
