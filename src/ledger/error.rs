use serde::{Deserialize, Serialize};

/// Structured rejection codes for mutating ledger calls. These are the
/// primary classification; substring sniffing of raw messages exists only as
/// a last-resort fallback for ledgers that return free-form text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    // join_room
    AlreadyFull,
    BadInviteCode,
    AlreadyJoined,
    Expired,
    Canceled,
    Completed,
    // submit_score
    NotActive,
    NotMember,
    AlreadySubmitted,
    // claim_prize
    NotWinner,
    AlreadyClaimed,
    NotCompleted,
    // cancel_room
    NotCreator,
    NotFilling,
    // create_room / join_room pre-flight, re-validated by the ledger
    InsufficientBalance,
}

impl RejectReason {
    pub fn message(self) -> &'static str {
        match self {
            RejectReason::AlreadyFull => "room is already full",
            RejectReason::BadInviteCode => "invite code does not match",
            RejectReason::AlreadyJoined => "address already joined this room",
            RejectReason::Expired => "room has expired",
            RejectReason::Canceled => "room was canceled",
            RejectReason::Completed => "room is already completed",
            RejectReason::NotActive => "room is not active",
            RejectReason::NotMember => "address is not a player in this room",
            RejectReason::AlreadySubmitted => "score already submitted",
            RejectReason::NotWinner => "address is not the winner",
            RejectReason::AlreadyClaimed => "prize already claimed",
            RejectReason::NotCompleted => "room is not completed",
            RejectReason::NotCreator => "only the creator may cancel",
            RejectReason::NotFilling => "room is no longer filling",
            RejectReason::InsufficientBalance => "balance below entry fee",
        }
    }

    /// Last-resort classifier for ledgers that only surface message text.
    /// Keep the needles conservative; an unmatched message stays raw.
    pub fn from_message(message: &str) -> Option<Self> {
        let needle = message.to_ascii_lowercase();
        let table: &[(&str, RejectReason)] = &[
            ("full", RejectReason::AlreadyFull),
            ("invite", RejectReason::BadInviteCode),
            ("already joined", RejectReason::AlreadyJoined),
            ("expired", RejectReason::Expired),
            // "creator" must outrank "cancel": cancel-permission messages
            // mention both.
            ("creator", RejectReason::NotCreator),
            ("cancel", RejectReason::Canceled),
            ("already submitted", RejectReason::AlreadySubmitted),
            ("not active", RejectReason::NotActive),
            ("not a player", RejectReason::NotMember),
            ("not the winner", RejectReason::NotWinner),
            ("already claimed", RejectReason::AlreadyClaimed),
            ("not completed", RejectReason::NotCompleted),
            ("completed", RejectReason::Completed),
            ("not filling", RejectReason::NotFilling),
            ("balance", RejectReason::InsufficientBalance),
        ];
        table
            .iter()
            .find(|(fragment, _)| needle.contains(fragment))
            .map(|(_, reason)| *reason)
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The id is out of range or the ledger has no such record. Distinct from
    /// a transient read failure, which must never be interpreted as absence.
    #[error("not found")]
    NotFound,
    /// The call reached the ledger and was refused.
    #[error("ledger rejected the operation: {0}")]
    Rejected(RejectReason),
    /// The call reached the ledger, was refused, and the message matched no
    /// known code. Surfaced verbatim.
    #[error("ledger rejected the operation: {0}")]
    RejectedRaw(String),
    /// Network/availability failure; the operation may or may not have
    /// reached the ledger. Retry or treat the state as unknown.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_))
    }

    /// Classify a free-form rejection message, falling back to the raw text.
    pub fn classify_rejection(message: impl Into<String>) -> Self {
        let message = message.into();
        match RejectReason::from_message(&message) {
            Some(reason) => LedgerError::Rejected(reason),
            None => LedgerError::RejectedRaw(message),
        }
    }
}
