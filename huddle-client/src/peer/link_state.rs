use std::fmt;

/// Negotiation state of one peer link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LinkState {
    #[default]
    Idle,
    Offering,
    OfferSent,
    AnswerPending,
    Answered,
    Connected,
    Renegotiating,
    Failed,
    Closed,
}

impl LinkState {
    /// `Failed` and `Closed` accept no further negotiation.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Offering => "offering",
            Self::OfferSent => "offer-sent",
            Self::AnswerPending => "answer-pending",
            Self::Answered => "answered",
            Self::Connected => "connected",
            Self::Renegotiating => "renegotiating",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
