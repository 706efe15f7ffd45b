//! The fixed Major Arcana deck, per-card scatter slots and card-back designs.

use rand::Rng;
use serde::Serialize;

use crate::layout::Viewport;

pub const DECK_SIZE: usize = 22;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Card {
    pub id: usize,
    pub name: &'static str,
    pub meaning: &'static str,
}

const fn card(id: usize, name: &'static str, meaning: &'static str) -> Card {
    Card { id, name, meaning }
}

pub const MAJOR_ARCANA: [Card; DECK_SIZE] = [
    card(0, "The Fool", "New beginnings, innocence, spontaneity."),
    card(1, "The Magician", "Manifestation, resourcefulness, power."),
    card(2, "The High Priestess", "Intuition, sacred knowledge, divine feminine."),
    card(3, "The Empress", "Femininity, beauty, nature, nurturing."),
    card(4, "The Emperor", "Authority, establishment, structure."),
    card(5, "The Hierophant", "Spiritual wisdom, religious beliefs, conformity."),
    card(6, "The Lovers", "Love, harmony, relationships, values alignment."),
    card(7, "The Chariot", "Control, willpower, success, action."),
    card(8, "Strength", "Strength, courage, persuasion, influence."),
    card(9, "The Hermit", "Soul-searching, introspection, being alone."),
    card(10, "Wheel of Fortune", "Good luck, karma, life cycles, destiny."),
    card(11, "Justice", "Justice, fairness, truth, cause and effect."),
    card(12, "The Hanged Man", "Pause, surrender, letting go, new perspectives."),
    card(13, "Death", "Endings, change, transformation, transition."),
    card(14, "Temperance", "Balance, moderation, patience, purpose."),
    card(15, "The Devil", "Shadow self, attachment, addiction, restriction."),
    card(16, "The Tower", "Sudden change, upheaval, chaos, revelation."),
    card(17, "The Star", "Hope, faith, purpose, renewal, spirituality."),
    card(18, "The Moon", "Illusion, fear, anxiety, subconscious, intuition."),
    card(19, "The Sun", "Positivity, fun, warmth, success, vitality."),
    card(20, "Judgement", "Judgement, rebirth, inner calling, absolution."),
    card(21, "The World", "Completion, integration, accomplishment, travel."),
];

pub fn card_at(index: usize) -> Option<&'static Card> {
    MAJOR_ARCANA.get(index)
}

/// A card's resting point in the scatter cloud, in viewport pixels and
/// degrees. Fixed for the whole shuffle session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CardSlot {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

/// Draws one slot per card: offsets within ±60% of the viewport, rotation
/// within ±90°.
pub fn scatter<R: Rng>(rng: &mut R, viewport: &Viewport) -> Vec<CardSlot> {
    (0..DECK_SIZE)
        .map(|_| CardSlot {
            x: rng.gen_range(-0.5f32..0.5) * viewport.width * 1.2,
            y: rng.gen_range(-0.5f32..0.5) * viewport.height * 1.2,
            rotation: rng.gen_range(-0.5f32..0.5) * 180.0,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBack {
    #[default]
    Mystic,
    Celestial,
    Alchemy,
}

impl CardBack {
    pub const ALL: [CardBack; 3] = [CardBack::Mystic, CardBack::Celestial, CardBack::Alchemy];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mystic => "The Mystic",
            Self::Celestial => "Celestial Void",
            Self::Alchemy => "Alchemist",
        }
    }

    fn position(&self) -> usize {
        Self::ALL.iter().position(|d| d == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let n = Self::ALL.len();
        Self::ALL[(self.position() + n - 1) % n]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_deck_ids_match_positions() {
        for (i, c) in MAJOR_ARCANA.iter().enumerate() {
            assert_eq!(c.id, i);
        }
        assert_eq!(card_at(21).map(|c| c.name), Some("The World"));
        assert!(card_at(DECK_SIZE).is_none());
    }

    #[test]
    fn test_scatter_stays_in_bounds() {
        let vp = Viewport::new(1000.0, 800.0);
        let mut rng = StdRng::seed_from_u64(7);
        let slots = scatter(&mut rng, &vp);
        assert_eq!(slots.len(), DECK_SIZE);
        for s in &slots {
            assert!(s.x.abs() <= 600.0);
            assert!(s.y.abs() <= 480.0);
            assert!(s.rotation.abs() <= 90.0);
        }
    }

    #[test]
    fn test_scatter_is_seed_deterministic() {
        let vp = Viewport::new(1280.0, 720.0);
        let a = scatter(&mut StdRng::seed_from_u64(3), &vp);
        let b = scatter(&mut StdRng::seed_from_u64(3), &vp);
        assert_eq!(a, b);
    }

    #[test]
    fn test_design_cycle_wraps() {
        assert_eq!(CardBack::Alchemy.next(), CardBack::Mystic);
        assert_eq!(CardBack::Mystic.prev(), CardBack::Alchemy);
        assert_eq!(CardBack::Mystic.next().name(), "Celestial Void");
    }
}
