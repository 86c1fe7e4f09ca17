//! Manager errors and join outcomes.

use super::store::StoreError;

/// Failures surfaced by [`GameManager`](super::manager::GameManager).
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("game {game_id} has a malformed document: {source}")]
    Malformed {
        game_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode game document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a join was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinRejection {
    #[error("game not found")]
    NotFound,
    #[error("incorrect game password")]
    WrongPassword,
}

/// Result of a join attempt that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Now attached to the game with this (normalized) code
    Joined { game_id: String },
    Rejected(JoinRejection),
}

impl JoinOutcome {
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined { .. })
    }

    pub fn game_id(&self) -> Option<&str> {
        match self {
            Self::Joined { game_id } => Some(game_id),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<JoinRejection> {
        match self {
            Self::Joined { .. } => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}
