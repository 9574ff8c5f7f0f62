/// Why an intent was turned away. Rejections are routine user races, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoSession,
    Paused,
    Finished,
    Locked,
    UnknownCard,
    AlreadyFaceUp,
    NotPlaying,
    NotPaused,
    NoUsesLeft,
    NoTarget,
    EffectActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Rejected(Rejection),
    /// First card of a comparison is showing.
    Flipped,
    /// Second card is showing; the comparison is locked until it resolves.
    ComparisonPending,
}

impl SelectOutcome {
    pub const fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerUpOutcome {
    Rejected(Rejection),
    Activated { uses_remaining: u32 },
}

impl PowerUpOutcome {
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Activated { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    Rejected(Rejection),
    Paused,
    Resumed,
}

impl PauseOutcome {
    pub const fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}
