//! Card transforms as a pure function of state, hand kinematics and the
//! card's fixed scatter slot.

use serde::Serialize;

use crate::deck::{CardSlot, DECK_SIZE};
use crate::machine::AppState;
use crate::tracker::MotionState;

pub const SELECTED_Z: i32 = 1000;
const BLUR_PX: f32 = 8.0;
const DRAG_GAIN: f32 = 150.0;
const TILT_GAIN: f32 = 60.0;

/// Width at or above which the revealed card shifts aside instead of up.
pub const DEFAULT_WIDE_BREAKPOINT: f32 = 768.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub wide_breakpoint: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            wide_breakpoint: DEFAULT_WIDE_BREAKPOINT,
        }
    }

    pub fn is_wide(&self) -> bool {
        self.width >= self.wide_breakpoint
    }
}

/// How the external animator should move the card to its new transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionHint {
    Spring { stiffness: f32, damping: f32, mass: f32 },
    Tween { duration: f32, ease_in_out: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CardTransform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale: f32,
    pub z_index: i32,
    pub opacity: f32,
    pub blur: f32,
    pub flipped: bool,
    pub glow: bool,
    pub transition: TransitionHint,
}

impl CardTransform {
    fn at(x: f32, y: f32, rotation: f32, scale: f32, z_index: i32) -> Self {
        Self {
            x,
            y,
            rotation,
            scale,
            z_index,
            opacity: 1.0,
            blur: 0.0,
            flipped: false,
            glow: false,
            transition: TransitionHint::Tween {
                duration: 0.8,
                ease_in_out: false,
            },
        }
    }
}

/// Everything the layout needs for one card on one tick.
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    pub state: AppState,
    pub index: usize,
    pub slot: &'a CardSlot,
    pub motion: &'a MotionState,
    pub selected: Option<usize>,
    pub flipped: bool,
    pub viewport: &'a Viewport,
}

pub fn layout(input: &LayoutInput<'_>) -> CardTransform {
    let i = input.index;
    let is_selected = input.selected == Some(i);

    match input.state {
        AppState::Intro => {
            let mut t = stacked(i);
            t.opacity = 0.0;
            t
        }
        AppState::Stacked => stacked(i),
        AppState::Shuffling => shuffling(i, input.slot, input.motion, input.viewport),
        AppState::Selecting | AppState::Revealed if is_selected => {
            let (x, y, scale) = match input.state {
                AppState::Revealed if input.viewport.is_wide() => {
                    (-input.viewport.width * 0.12, 0.0, 1.2)
                }
                AppState::Revealed => (0.0, -40.0, 1.1),
                _ => (0.0, 0.0, 1.4),
            };
            let mut t = CardTransform::at(x, y, 0.0, scale, SELECTED_Z);
            t.glow = true;
            t.flipped = input.flipped;
            if input.state == AppState::Selecting {
                t.transition = TransitionHint::Tween {
                    duration: 1.2,
                    ease_in_out: true,
                };
            }
            t
        }
        AppState::Selecting | AppState::Revealed => {
            let mut t =
                CardTransform::at(input.slot.x * 2.0, input.slot.y * 2.0, 0.0, 0.5, i as i32);
            t.opacity = 0.3;
            t.blur = BLUR_PX;
            t
        }
    }
}

fn stacked(i: usize) -> CardTransform {
    let f = i as f32;
    CardTransform::at(f * 0.2, -f * 0.2, f * 0.1, 0.8, i as i32)
}

fn shuffling(i: usize, slot: &CardSlot, m: &MotionState, vp: &Viewport) -> CardTransform {
    let speed = m.speed();
    let n = i as f32 / DECK_SIZE as f32;

    let hand_x = (m.x - 0.5) * vp.width;
    let hand_y = (m.y - 0.5) * vp.height;
    // cards further back follow the hand less and drag more
    let follow = 0.8 - n * 0.4;
    let scatter = 1.0 + speed * 2.5;
    let drag_x = -m.vx * DRAG_GAIN * n;
    let drag_y = m.vy * DRAG_GAIN * n;

    let mut t = CardTransform::at(
        slot.x * scatter * 0.4 + hand_x * follow + drag_x,
        slot.y * scatter * 0.4 + hand_y * follow + drag_y,
        slot.rotation + m.vx * TILT_GAIN * (1.0 - n),
        0.8 + (speed * 0.15).min(0.3),
        i as i32,
    );
    t.transition = TransitionHint::Spring {
        stiffness: 240.0,
        damping: 18.0,
        mass: 0.5 + i as f32 * 0.04,
    };
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(
        state: AppState,
        index: usize,
        slot: &'a CardSlot,
        motion: &'a MotionState,
        viewport: &'a Viewport,
    ) -> LayoutInput<'a> {
        LayoutInput {
            state,
            index,
            slot,
            motion,
            selected: Some(3),
            flipped: false,
            viewport,
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_stacked_fan() {
        let slot = CardSlot::default();
        let m = MotionState::default();
        let vp = Viewport::default();
        let t = layout(&input(AppState::Stacked, 5, &slot, &m, &vp));
        assert!(approx(t.x, 1.0));
        assert!(approx(t.y, -1.0));
        assert!(approx(t.rotation, 0.5));
        assert_eq!(t.scale, 0.8);
        assert_eq!(t.z_index, 5);
        assert_eq!(t.opacity, 1.0);
        assert_eq!(t.blur, 0.0);
    }

    #[test]
    fn test_intro_hides_the_deck() {
        let slot = CardSlot::default();
        let m = MotionState::default();
        let vp = Viewport::default();
        let t = layout(&input(AppState::Intro, 2, &slot, &m, &vp));
        assert_eq!(t.opacity, 0.0);
    }

    #[test]
    fn test_shuffling_at_rest_follows_center() {
        let slot = CardSlot {
            x: 100.0,
            y: -50.0,
            rotation: 30.0,
        };
        let m = MotionState::default();
        let vp = Viewport::default();
        let t = layout(&input(AppState::Shuffling, 0, &slot, &m, &vp));
        // hand centred, no velocity: only the 0.4 scatter term remains
        assert!(approx(t.x, 40.0));
        assert!(approx(t.y, -20.0));
        assert!(approx(t.rotation, 30.0));
        assert!(approx(t.scale, 0.8));
        assert!(matches!(t.transition, TransitionHint::Spring { .. }));
    }

    #[test]
    fn test_shuffling_velocity_terms() {
        let slot = CardSlot {
            x: 100.0,
            y: 0.0,
            rotation: 0.0,
        };
        let m = MotionState {
            x: 0.75,
            vx: 1.0,
            ..MotionState::default()
        };
        let vp = Viewport::new(1000.0, 500.0);
        let i = 11; // n = 0.5
        let t = layout(&input(AppState::Shuffling, i, &slot, &m, &vp));
        let scatter = 1.0 + 2.5;
        let expected_x = 100.0 * scatter * 0.4 + 250.0 * 0.6 - 150.0 * 0.5;
        assert!(approx(t.x, expected_x), "x = {}", t.x);
        assert!(approx(t.rotation, 30.0), "rotation = {}", t.rotation);
        assert!(approx(t.scale, 0.95));
    }

    #[test]
    fn test_shuffling_scale_is_clamped() {
        let slot = CardSlot::default();
        let m = MotionState {
            vx: 10.0,
            vy: 10.0,
            ..MotionState::default()
        };
        let vp = Viewport::default();
        let t = layout(&input(AppState::Shuffling, 4, &slot, &m, &vp));
        assert!(approx(t.scale, 1.1));
    }

    #[test]
    fn test_selecting_selected_and_others() {
        let slot = CardSlot {
            x: 10.0,
            y: 20.0,
            rotation: 45.0,
        };
        let m = MotionState::default();
        let vp = Viewport::default();
        let sel = layout(&input(AppState::Selecting, 3, &slot, &m, &vp));
        assert_eq!((sel.x, sel.y, sel.rotation, sel.scale), (0.0, 0.0, 0.0, 1.4));
        assert_eq!(sel.z_index, SELECTED_Z);
        assert!(sel.glow);

        let other = layout(&input(AppState::Selecting, 4, &slot, &m, &vp));
        assert_eq!((other.x, other.y), (20.0, 40.0));
        assert_eq!(other.scale, 0.5);
        assert_eq!(other.opacity, 0.3);
        assert!(other.blur > 0.0);
        assert!(other.z_index < SELECTED_Z);
    }

    #[test]
    fn test_revealed_wide_and_narrow() {
        let slot = CardSlot::default();
        let m = MotionState::default();
        let wide = Viewport::new(1000.0, 700.0);
        let mut inp = input(AppState::Revealed, 3, &slot, &m, &wide);
        inp.flipped = true;
        let t = layout(&inp);
        assert!(approx(t.x, -120.0));
        assert_eq!(t.y, 0.0);
        assert_eq!(t.scale, 1.2);
        assert!(t.flipped);

        let narrow = Viewport::new(400.0, 800.0);
        let t = layout(&input(AppState::Revealed, 3, &slot, &m, &narrow));
        assert_eq!((t.x, t.y, t.scale), (0.0, -40.0, 1.1));
        assert_eq!(t.z_index, SELECTED_Z);
    }

    #[test]
    fn test_layout_is_pure() {
        let slot = CardSlot {
            x: -33.0,
            y: 12.0,
            rotation: -70.0,
        };
        let m = MotionState {
            x: 0.2,
            y: 0.9,
            vx: -0.7,
            vy: 0.4,
            ..MotionState::default()
        };
        let vp = Viewport::default();
        let inp = input(AppState::Shuffling, 9, &slot, &m, &vp);
        assert_eq!(layout(&inp), layout(&inp));
    }
}
