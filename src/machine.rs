//! Interaction flow: intro → stacked → shuffling → selecting → revealed.
//!
//! The machine consumes one [`MotionState`] per tick and answers with the
//! intents the external collaborators (sound, interpretation) should act on.
//! It never calls those collaborators itself.
//!
//! | State | Trigger | Next |
//! |---|---|---|
//! | Intro | `begin()` | Stacked |
//! | Stacked | open palm | Shuffling |
//! | Shuffling | pointing | Selecting (random card) |
//! | Shuffling | fist | Stacked |
//! | Selecting | shake while pointing | Revealed (lock starts) |
//! | Selecting | open palm | Shuffling |
//! | Revealed, unlocked | open palm / fist | Shuffling / Stacked |

use log::{debug, error, info};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::config::Thresholds;
use crate::deck::{DECK_SIZE, card_at};
use crate::gestures::Gesture;
use crate::lock::{LockStatus, LockTimer};
use crate::shake::ShakeDetector;
use crate::tracker::MotionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    #[default]
    Intro,
    Stacked,
    Shuffling,
    Selecting,
    Revealed,
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intro => "INTRO",
            Self::Stacked => "STACKED",
            Self::Shuffling => "SHUFFLING",
            Self::Selecting => "SELECTING",
            Self::Revealed => "REVEALED",
        }
    }

    /// On-screen hint for the current step.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Intro => "",
            Self::Stacked => "Open your hand to shuffle the deck.",
            Self::Shuffling => "Move hand to shuffle. Point to select a card.",
            Self::Selecting => "Shake your finger to reveal destiny.",
            Self::Revealed => "Open hand to restart.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    PlayShuffleSound,
    PlayFlipSound,
    BeginInterpretation { card_id: usize },
    CancelInterpretation,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no card selected")]
    Missing,
    #[error("selected index {0} is outside the 22-card deck")]
    OutOfRange(usize),
}

#[derive(Debug)]
pub struct InteractionStateMachine {
    state: AppState,
    selected: Option<usize>,
    flipped: bool,
    shake: ShakeDetector,
    lock: LockTimer,
    shuffle_speed: f32,
    sound_throttle_ms: u64,
    last_shuffle_sound_ms: Option<u64>,
}

impl Default for InteractionStateMachine {
    fn default() -> Self {
        Self::new(&Thresholds::default())
    }
}

impl InteractionStateMachine {
    pub fn new(th: &Thresholds) -> Self {
        Self {
            state: AppState::Intro,
            selected: None,
            flipped: false,
            shake: ShakeDetector::new(th.shake_window, th.shake_range_deg),
            lock: LockTimer::new(th.lock_secs),
            shuffle_speed: th.shuffle_speed,
            sound_throttle_ms: th.sound_throttle_ms,
            last_shuffle_sound_ms: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// The lock is only observable while revealed.
    pub fn lock_status(&self, now_ms: u64) -> LockStatus {
        if self.state == AppState::Revealed {
            self.lock.status(now_ms)
        } else {
            LockStatus {
                active: false,
                remaining: 0,
            }
        }
    }

    /// Advances the lock countdown; returns the remaining seconds when it
    /// changed.
    pub fn poll_lock(&mut self, now_ms: u64) -> Option<u64> {
        let changed = self.lock.poll(now_ms);
        if changed == Some(0) {
            info!("lock window expired");
        } else if let Some(left) = changed {
            debug!("lock: {left}s left");
        }
        changed
    }

    /// The explicit start action. Only meaningful from the intro.
    pub fn begin(&mut self) -> bool {
        if self.state != AppState::Intro {
            return false;
        }
        self.enter(AppState::Stacked);
        true
    }

    /// Back to the intro with a clean slate.
    pub fn reset(&mut self) -> Vec<Intent> {
        let mut intents = Vec::new();
        if self.selected.is_some() {
            intents.push(Intent::CancelInterpretation);
        }
        self.selected = None;
        self.flipped = false;
        self.last_shuffle_sound_ms = None;
        self.enter(AppState::Intro);
        intents
    }

    pub fn step<R: Rng>(&mut self, motion: &MotionState, now_ms: u64, rng: &mut R) -> Vec<Intent> {
        let gesture = motion.gesture;
        let mut intents = Vec::new();

        if self.state != AppState::Selecting || gesture != Gesture::Pointing {
            self.shake.clear();
        }

        if matches!(self.state, AppState::Selecting | AppState::Revealed) {
            if let Err(e) = self.checked_selection() {
                self.fail_closed(e);
                return intents;
            }
        }

        match self.state {
            AppState::Intro => {}
            AppState::Stacked => {
                if gesture == Gesture::OpenPalm {
                    self.shuffle_sound(now_ms, &mut intents);
                    self.enter(AppState::Shuffling);
                }
            }
            AppState::Shuffling => match gesture {
                Gesture::Pointing => {
                    let index = rng.gen_range(0..DECK_SIZE);
                    debug!("selected card {index}");
                    self.selected = Some(index);
                    self.enter(AppState::Selecting);
                }
                Gesture::Fist => self.enter(AppState::Stacked),
                _ => {
                    let throttled = self
                        .last_shuffle_sound_ms
                        .is_some_and(|t| now_ms.saturating_sub(t) < self.sound_throttle_ms);
                    if motion.speed() > self.shuffle_speed && !throttled {
                        self.shuffle_sound(now_ms, &mut intents);
                    }
                }
            },
            AppState::Selecting => match gesture {
                Gesture::Pointing => {
                    if self.shake.observe(motion.angle) && !self.flipped {
                        self.reveal(now_ms, &mut intents);
                    }
                }
                Gesture::OpenPalm => {
                    self.clear_selection(&mut intents);
                    self.shuffle_sound(now_ms, &mut intents);
                    self.enter(AppState::Shuffling);
                }
                _ => {}
            },
            AppState::Revealed => {
                if self.lock.is_active(now_ms) {
                    return intents;
                }
                match gesture {
                    Gesture::OpenPalm => {
                        self.clear_selection(&mut intents);
                        self.shuffle_sound(now_ms, &mut intents);
                        self.enter(AppState::Shuffling);
                    }
                    Gesture::Fist => {
                        self.clear_selection(&mut intents);
                        self.enter(AppState::Stacked);
                    }
                    _ => {}
                }
            }
        }

        intents
    }

    fn checked_selection(&self) -> Result<usize, SelectionError> {
        let index = self.selected.ok_or(SelectionError::Missing)?;
        card_at(index)
            .map(|c| c.id)
            .ok_or(SelectionError::OutOfRange(index))
    }

    fn reveal(&mut self, now_ms: u64, intents: &mut Vec<Intent>) {
        let card_id = match self.checked_selection() {
            Ok(id) => id,
            Err(e) => return self.fail_closed(e),
        };
        self.flipped = true;
        self.shake.clear();
        intents.push(Intent::PlayFlipSound);
        intents.push(Intent::BeginInterpretation { card_id });
        self.enter(AppState::Revealed);
        self.lock.start(now_ms);
        info!("lock window started ({}s)", self.lock.duration_secs());
    }

    fn fail_closed(&mut self, e: SelectionError) {
        error!("{e}; returning to {}", AppState::Stacked.as_str());
        self.selected = None;
        self.flipped = false;
        self.enter(AppState::Stacked);
    }

    fn clear_selection(&mut self, intents: &mut Vec<Intent>) {
        self.flipped = false;
        self.selected = None;
        intents.push(Intent::CancelInterpretation);
    }

    fn shuffle_sound(&mut self, now_ms: u64, intents: &mut Vec<Intent>) {
        self.last_shuffle_sound_ms = Some(now_ms);
        intents.push(Intent::PlayShuffleSound);
    }

    fn enter(&mut self, next: AppState) {
        if next == self.state {
            return;
        }
        info!("state {} -> {}", self.state.as_str(), next.as_str());
        if self.state == AppState::Revealed {
            self.lock.cancel();
        }
        if next != AppState::Selecting {
            self.shake.clear();
        }
        self.state = next;
    }

    #[cfg(test)]
    pub(crate) fn force_selection(&mut self, state: AppState, selected: Option<usize>) {
        self.state = state;
        self.selected = selected;
    }
}
