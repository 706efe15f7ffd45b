//! One interaction session: the explicit per-tick pipeline.
//!
//! frame → classifier + estimator → state machine (shake, lock) → layout.
//! Every piece of mutable state is owned here and touched only from the
//! thread that calls [`Session::tick`].

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::config::Profile;
use crate::deck::{self, CardBack, CardSlot, DECK_SIZE};
use crate::gestures::{Gesture, GestureClassifier};
use crate::landmarks::LandmarkFrame;
use crate::layout::{self, CardTransform, LayoutInput, Viewport};
use crate::machine::{AppState, Intent, InteractionStateMachine};
use crate::tracker::{MotionEstimator, MotionState};

#[derive(Debug, Clone, Serialize)]
pub struct TickOutput {
    pub t_ms: u64,
    pub gesture: Gesture,
    pub motion: MotionState,
    pub state: AppState,
    pub intents: Vec<Intent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<CardTransform>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: AppState,
    pub instruction: &'static str,
    pub gesture: Gesture,
    /// |velocity.x|, as shown in the gesture feedback line.
    pub velocity: f32,
    pub selected: Option<usize>,
    pub card: Option<&'static str>,
    /// Shown on the card face once it is flipped.
    pub meaning: Option<&'static str>,
    pub flipped: bool,
    pub locked: bool,
    pub lock_remaining: u64,
    /// Lock banner under the revealed card.
    pub lock_label: Option<String>,
    pub design: &'static str,
}

pub struct Session {
    classifier: GestureClassifier,
    estimator: MotionEstimator,
    machine: InteractionStateMachine,
    slots: Vec<CardSlot>,
    viewport: Viewport,
    design: CardBack,
    motion: MotionState,
    rng: StdRng,
}

impl Session {
    pub fn new(profile: &Profile) -> Self {
        Self::with_rng(profile, StdRng::from_entropy())
    }

    pub fn with_seed(profile: &Profile, seed: u64) -> Self {
        Self::with_rng(profile, StdRng::seed_from_u64(seed))
    }

    fn with_rng(profile: &Profile, mut rng: StdRng) -> Self {
        let viewport = profile.layout.viewport();
        let slots = deck::scatter(&mut rng, &viewport);
        Self {
            classifier: GestureClassifier::new(&profile.thresholds),
            estimator: MotionEstimator::new(profile.meta.mirror),
            machine: InteractionStateMachine::new(&profile.thresholds),
            slots,
            viewport,
            design: CardBack::default(),
            motion: MotionState::default(),
            rng,
        }
    }

    /// Swaps in new thresholds. Interaction state restarts at the intro.
    pub fn apply_profile(&mut self, profile: &Profile) {
        self.classifier = GestureClassifier::new(&profile.thresholds);
        self.estimator = MotionEstimator::new(profile.meta.mirror);
        self.machine = InteractionStateMachine::new(&profile.thresholds);
        self.viewport = profile.layout.viewport();
        self.slots = deck::scatter(&mut self.rng, &self.viewport);
        self.motion = MotionState::default();
        info!(
            "session restarted with profile '{}'",
            profile.meta.name.as_deref().unwrap_or("unnamed")
        );
    }

    pub fn state(&self) -> AppState {
        self.machine.state()
    }

    #[cfg(test)]
    pub fn slots(&self) -> &[CardSlot] {
        &self.slots
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Resizes the viewport. The profile's wide breakpoint and each card's
    /// scatter slot are kept.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport.width = width;
        self.viewport.height = height;
    }

    pub fn next_design(&mut self) -> CardBack {
        self.design = self.design.next();
        self.design
    }

    pub fn prev_design(&mut self) -> CardBack {
        self.design = self.design.prev();
        self.design
    }

    /// INTRO → STACKED. The scatter drawn at construction (or by the last
    /// reset) carries through the whole session.
    pub fn begin(&mut self) -> bool {
        self.machine.begin()
    }

    pub fn reset(&mut self) -> Vec<Intent> {
        let intents = self.machine.reset();
        self.estimator.reset();
        self.motion = MotionState::default();
        self.slots = deck::scatter(&mut self.rng, &self.viewport);
        debug!("scatter regenerated");
        intents
    }

    pub fn poll_lock(&mut self, now_ms: u64) -> Option<u64> {
        self.machine.poll_lock(now_ms)
    }

    /// Processes one capture tick. `frame` is `None` when no hand is seen.
    pub fn tick(&mut self, frame: Option<&LandmarkFrame>, t_ms: u64) -> TickOutput {
        let gesture = self.classifier.classify(frame);
        let motion = self.estimator.update(frame, gesture, t_ms);
        self.machine.poll_lock(t_ms);
        let intents = self.machine.step(&motion, t_ms, &mut self.rng);

        if gesture != self.motion.gesture {
            debug!("gesture {} -> {}", self.motion.gesture.as_str(), gesture.as_str());
        }
        self.motion = motion;

        TickOutput {
            t_ms,
            gesture,
            motion,
            state: self.machine.state(),
            intents,
            transforms: Vec::new(),
        }
    }

    /// Current transform for every card in the deck.
    pub fn transforms(&self) -> Vec<CardTransform> {
        (0..DECK_SIZE)
            .map(|index| {
                layout::layout(&LayoutInput {
                    state: self.machine.state(),
                    index,
                    slot: &self.slots[index],
                    motion: &self.motion,
                    selected: self.machine.selected(),
                    flipped: self.machine.is_flipped(),
                    viewport: &self.viewport,
                })
            })
            .collect()
    }

    pub fn status(&self, now_ms: u64) -> SessionStatus {
        let state = self.machine.state();
        let selected = self.machine.selected();
        let lock = self.machine.lock_status(now_ms);
        let flipped = self.machine.is_flipped();
        let card = selected.and_then(deck::card_at);
        let lock_label = (state == AppState::Revealed).then(|| {
            if lock.active {
                format!("Reading... ({}s)", lock.remaining)
            } else {
                "Gestures Unlocked".to_string()
            }
        });
        SessionStatus {
            state,
            instruction: state.instruction(),
            gesture: self.motion.gesture,
            velocity: self.motion.vx.abs(),
            selected,
            card: card.map(|c| c.name),
            meaning: card.filter(|_| flipped).map(|c| c.meaning),
            flipped,
            locked: lock.active,
            lock_remaining: lock.remaining,
            lock_label,
            design: self.design.name(),
        }
    }
}
