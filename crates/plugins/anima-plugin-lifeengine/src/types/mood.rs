//! Discrete moods as nearest archetype centers in PAD space

use super::affect::AffectState;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Named mood with a fixed PAD center
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodArchetype {
    /// Origin of the PAD space
    Neutral,
    Joyful,
    Relaxed,
    Affectionate,
    Docile,
    Excited,
    Curious,
    Hostile,
    Anxious,
    Disdainful,
    Bored,
    Sad,
}

impl MoodArchetype {
    /// Every archetype in declaration order; classification ties resolve to
    /// the earliest entry
    pub const ALL: [MoodArchetype; 12] = [
        MoodArchetype::Neutral,
        MoodArchetype::Joyful,
        MoodArchetype::Relaxed,
        MoodArchetype::Affectionate,
        MoodArchetype::Docile,
        MoodArchetype::Excited,
        MoodArchetype::Curious,
        MoodArchetype::Hostile,
        MoodArchetype::Anxious,
        MoodArchetype::Disdainful,
        MoodArchetype::Bored,
        MoodArchetype::Sad,
    ];

    /// Center of the archetype
    pub fn center(&self) -> AffectState {
        match self {
            MoodArchetype::Neutral => AffectState::NEUTRAL,
            MoodArchetype::Joyful => AffectState::new(0.8, 0.6, 0.5),
            MoodArchetype::Relaxed => AffectState::new(0.6, -0.5, 0.4),
            MoodArchetype::Affectionate => AffectState::new(0.5, 0.4, -0.4),
            MoodArchetype::Docile => AffectState::new(0.4, -0.4, -0.5),
            MoodArchetype::Excited => AffectState::new(0.2, 0.9, 0.0),
            MoodArchetype::Curious => AffectState::new(0.3, 0.6, 0.1),
            MoodArchetype::Hostile => AffectState::new(-0.6, 0.6, 0.5),
            MoodArchetype::Anxious => AffectState::new(-0.6, 0.6, -0.6),
            MoodArchetype::Disdainful => AffectState::new(-0.5, -0.3, 0.5),
            MoodArchetype::Bored => AffectState::new(-0.5, -0.6, -0.4),
            MoodArchetype::Sad => AffectState::new(-0.7, -0.2, -0.3),
        }
    }

    /// Lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            MoodArchetype::Neutral => "neutral",
            MoodArchetype::Joyful => "joyful",
            MoodArchetype::Relaxed => "relaxed",
            MoodArchetype::Affectionate => "affectionate",
            MoodArchetype::Docile => "docile",
            MoodArchetype::Excited => "excited",
            MoodArchetype::Curious => "curious",
            MoodArchetype::Hostile => "hostile",
            MoodArchetype::Anxious => "anxious",
            MoodArchetype::Disdainful => "disdainful",
            MoodArchetype::Bored => "bored",
            MoodArchetype::Sad => "sad",
        }
    }

    /// Short description for prompts and status text
    pub fn description(&self) -> &'static str {
        match self {
            MoodArchetype::Neutral => "calm and even, neither up nor down",
            MoodArchetype::Joyful => "happy, energetic and confident",
            MoodArchetype::Relaxed => "content and at ease",
            MoodArchetype::Affectionate => "warm and open toward others",
            MoodArchetype::Docile => "gentle and willing to follow",
            MoodArchetype::Excited => "lively and stimulated",
            MoodArchetype::Curious => "interested and eager to explore",
            MoodArchetype::Hostile => "irritated and confrontational",
            MoodArchetype::Anxious => "tense and uneasy",
            MoodArchetype::Disdainful => "cool and dismissive",
            MoodArchetype::Bored => "flat and disengaged",
            MoodArchetype::Sad => "low and withdrawn",
        }
    }
}

impl std::fmt::Display for MoodArchetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps affect to the nearest archetype
///
/// Stateless: every call recomputes from the given state.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoodClassifier;

impl MoodClassifier {
    /// Create a classifier over the fixed archetype catalogue
    pub fn new() -> Self {
        Self
    }

    /// Nearest archetype by Euclidean distance
    pub fn classify(&self, state: &AffectState) -> MoodArchetype {
        self.classify_with_distance(state).0
    }

    /// Nearest archetype together with its distance
    pub fn classify_with_distance(&self, state: &AffectState) -> (MoodArchetype, f32) {
        nearest(
            MoodArchetype::ALL
                .iter()
                .map(|archetype| (*archetype, state.distance(&archetype.center()))),
        )
        .unwrap_or((MoodArchetype::Neutral, state.distance(&AffectState::NEUTRAL)))
    }

    /// One-line mood summary
    pub fn describe(&self, state: &AffectState) -> String {
        let mood = self.classify(state);
        format!(
            "{} ({}) at P={:.2} A={:.2} D={:.2}",
            mood,
            mood.description(),
            state.pleasure(),
            state.arousal(),
            state.dominance()
        )
    }
}

/// Smallest distance; the first of several equal minima wins
fn nearest<I>(scored: I) -> Option<(MoodArchetype, f32)>
where
    I: IntoIterator<Item = (MoodArchetype, f32)>,
{
    scored
        .into_iter()
        .min_by_key(|(_, distance)| OrderedFloat(*distance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_center_classifies_to_its_archetype() {
        let classifier = MoodClassifier::new();
        assert_eq!(
            classifier.classify(&AffectState::new(0.8, 0.6, 0.5)),
            MoodArchetype::Joyful
        );
        for archetype in MoodArchetype::ALL {
            let (mood, distance) = classifier.classify_with_distance(&archetype.center());
            assert_eq!(mood, archetype);
            assert_eq!(distance, 0.0);
        }
    }

    #[test]
    fn test_origin_is_neutral() {
        assert_eq!(
            MoodClassifier::new().classify(&AffectState::new(0.0, 0.0, 0.0)),
            MoodArchetype::Neutral
        );
    }

    #[test]
    fn test_catalogue_has_twelve_distinct_centers() {
        assert_eq!(MoodArchetype::ALL.len(), 12);
        for (i, a) in MoodArchetype::ALL.iter().enumerate() {
            for b in &MoodArchetype::ALL[i + 1..] {
                assert!(a.center().distance(&b.center()) > 0.0, "{} == {}", a, b);
            }
        }
    }

    #[test]
    fn test_tie_resolves_to_declaration_order() {
        assert_eq!(
            nearest([(MoodArchetype::Hostile, 0.55), (MoodArchetype::Anxious, 0.55)]),
            Some((MoodArchetype::Hostile, 0.55))
        );
        assert_eq!(
            nearest([
                (MoodArchetype::Anxious, 0.55),
                (MoodArchetype::Hostile, 0.55),
                (MoodArchetype::Sad, 0.9),
            ]),
            Some((MoodArchetype::Anxious, 0.55))
        );
        assert_eq!(nearest(std::iter::empty()), None);
    }

    #[test]
    fn test_hostile_anxious_boundary() {
        // The two centers differ only in dominance (0.5 vs -0.6).
        let classifier = MoodClassifier::new();
        assert_eq!(
            classifier.classify(&AffectState::new(-0.6, 0.6, -0.04)),
            MoodArchetype::Hostile
        );
        assert_eq!(
            classifier.classify(&AffectState::new(-0.6, 0.6, -0.06)),
            MoodArchetype::Anxious
        );
    }

    #[test]
    fn test_classification_follows_state_changes() {
        let classifier = MoodClassifier::new();
        let mut state = AffectState::default();
        assert_eq!(classifier.classify(&state), MoodArchetype::Neutral);

        state.update(-0.7, -0.2, -0.3);
        assert_eq!(classifier.classify(&state), MoodArchetype::Sad);

        state.update(1.5, 0.8, 0.8);
        assert_eq!(classifier.classify(&state), MoodArchetype::Joyful);
    }

    #[test]
    fn test_describe_mentions_mood() {
        let text = MoodClassifier::new().describe(&AffectState::new(0.6, -0.5, 0.4));
        assert!(text.starts_with("relaxed"));
    }
}
