use serde::{Deserialize, Serialize};

/// Positional card identifier, `0..pairs * 2` for a session.
pub type CardId = usize;

/// Pair key: exactly two cards in a well-formed deck share one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FaceValue(pub u16);

impl std::fmt::Display for FaceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for FaceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub face_value: FaceValue,
    /// Face showing because the card is selected or matched.
    pub flipped: bool,
    /// Terminal for the session.
    pub matched: bool,
    pub shaking: bool,
    pub hinted: bool,
    /// Temporarily shown by the reveal power-up; not a selection.
    pub revealed: bool,
}

impl Card {
    pub fn new(id: CardId, face_value: FaceValue) -> Self {
        Self {
            id,
            face_value,
            flipped: false,
            matched: false,
            shaking: false,
            hinted: false,
            revealed: false,
        }
    }

    pub fn is_face_up(&self) -> bool {
        self.flipped || self.matched || self.revealed
    }

    pub fn is_pending(&self) -> bool {
        self.flipped && !self.matched
    }

    /// Face down and unresolved: a valid selection or power-up target.
    pub fn is_hidden(&self) -> bool {
        !self.flipped && !self.matched
    }

    pub fn matches(&self, other: &Card) -> bool {
        self.id != other.id && self.face_value == other.face_value
    }
}
