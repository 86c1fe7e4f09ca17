//! Client session state machine.
//!
//! Tracks which game, if any, this client is attached to and how far its
//! subscription has got. Every subscription is stamped with an epoch; pushes
//! and vanish notices carry the epoch of the subscription that produced them
//! and are rejected unless it is the current one, so a torn-down
//! subscription can never write into a newer session.
//!
//! # State Diagram
//!
//! ```text
//!                  activate(id)
//!   ┌──────┐ ──────────────────────▶ ┌─────────────┐
//!   │ Idle │                         │ Subscribing │
//!   └──────┘ ◀─── vanished / leave ─ └──────┬──────┘
//!      ▲                                    │ push
//!      │                                    ▼
//!      │                             ┌─────────────┐
//!      └──────── vanished / leave ── │    Live     │◀─┐ push
//!                                    └──────┬──────┘──┘
//!                                           │ activate(other id)
//!                                           ▼
//!                                    Subscribing (new epoch)
//! ```

use std::fmt;

/// Subscription status, without the game identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Unsubscribed,
    Pending,
    Live,
}

/// Where the session is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionLocation {
    /// No active game
    #[default]
    Idle,

    /// Subscribed, waiting for the first push
    Subscribing { game_id: String, epoch: u64 },

    /// Subscribed and materialized
    Live { game_id: String, epoch: u64 },
}

impl SessionLocation {
    pub fn game_id(&self) -> Option<&str> {
        match self {
            Self::Subscribing { game_id, .. } | Self::Live { game_id, .. } => Some(game_id),
            Self::Idle => None,
        }
    }

    pub fn epoch(&self) -> Option<u64> {
        match self {
            Self::Subscribing { epoch, .. } | Self::Live { epoch, .. } => Some(*epoch),
            Self::Idle => None,
        }
    }

    pub fn status(&self) -> SubscriptionStatus {
        match self {
            Self::Idle => SubscriptionStatus::Unsubscribed,
            Self::Subscribing { .. } => SubscriptionStatus::Pending,
            Self::Live { .. } => SubscriptionStatus::Live,
        }
    }
}

impl fmt::Display for SessionLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Subscribing { game_id, epoch } => write!(f, "Subscribing({}, #{})", game_id, epoch),
            Self::Live { game_id, epoch } => write!(f, "Live({}, #{})", game_id, epoch),
        }
    }
}

/// State transition events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Attach to a game, opening a new subscription
    Activate { game_id: String },
    /// A document arrived from the subscription with this epoch
    Push { epoch: u64 },
    /// The subscription with this epoch reported the document gone
    Vanished { epoch: u64 },
    /// Detach locally
    Leave,
}

/// Error when a state transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SessionLocation,
    pub event: SessionEvent,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid transition from {} via {:?}: {}",
            self.from, self.event, self.reason
        )
    }
}

impl std::error::Error for InvalidTransition {}

/// Session state machine.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    location: SessionLocation,
    /// Last epoch handed out
    last_epoch: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location(&self) -> &SessionLocation {
        &self.location
    }

    /// Apply an event in place, returning error if invalid.
    pub fn apply_mut(&mut self, event: SessionEvent) -> Result<(), InvalidTransition> {
        let (location, epoch) = self.transition(&event)?;
        self.location = location;
        self.last_epoch = epoch;
        Ok(())
    }

    /// Calculate the new location (and epoch counter) for an event.
    fn transition(&self, event: &SessionEvent) -> Result<(SessionLocation, u64), InvalidTransition> {
        use SessionEvent::*;
        use SessionLocation::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.location.clone(),
            event: event.clone(),
            reason,
        };
        let stay = |location: SessionLocation| -> Result<(SessionLocation, u64), InvalidTransition> {
            Ok((location, self.last_epoch))
        };

        match (&self.location, event) {
            // Re-activating the current game keeps the subscription
            (Subscribing { game_id, .. } | Live { game_id, .. }, Activate { game_id: next })
                if game_id == next =>
            {
                stay(self.location.clone())
            }
            (_, Activate { game_id }) => {
                let epoch = self.last_epoch + 1;
                Ok((
                    Subscribing {
                        game_id: game_id.clone(),
                        epoch,
                    },
                    epoch,
                ))
            }

            // Push: Subscribing/Live -> Live, same epoch only
            (Subscribing { game_id, epoch } | Live { game_id, epoch }, Push { epoch: pushed })
                if epoch == pushed =>
            {
                stay(Live {
                    game_id: game_id.clone(),
                    epoch: *epoch,
                })
            }
            (Idle, Push { .. }) => Err(invalid("No active game")),
            (_, Push { .. }) => Err(invalid("Stale subscription")),

            // Vanished: Subscribing/Live -> Idle, same epoch only
            (Subscribing { epoch, .. } | Live { epoch, .. }, Vanished { epoch: pushed })
                if epoch == pushed =>
            {
                stay(Idle)
            }
            (Idle, Vanished { .. }) => Err(invalid("No active game")),
            (_, Vanished { .. }) => Err(invalid("Stale subscription")),

            // Leave: Any -> Idle
            (_, Leave) => stay(Idle),
        }
    }

    pub fn game_id(&self) -> Option<&str> {
        self.location.game_id()
    }

    pub fn epoch(&self) -> Option<u64> {
        self.location.epoch()
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.location.status()
    }

    pub fn is_active(&self) -> bool {
        self.game_id().is_some()
    }

    pub fn is_live(&self) -> bool {
        self.status() == SubscriptionStatus::Live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activate(state: &mut SessionState, game_id: &str) -> u64 {
        state
            .apply_mut(SessionEvent::Activate {
                game_id: game_id.to_string(),
            })
            .unwrap();
        state.epoch().unwrap()
    }

    #[test]
    fn test_initial_state() {
        let state = SessionState::new();
        assert!(!state.is_active());
        assert_eq!(state.status(), SubscriptionStatus::Unsubscribed);
        assert_eq!(*state.location(), SessionLocation::Idle);
    }

    #[test]
    fn test_activate_push_leave() {
        let mut state = SessionState::new();

        let epoch = activate(&mut state, "G1");
        assert_eq!(state.status(), SubscriptionStatus::Pending);
        assert_eq!(state.game_id(), Some("G1"));

        state.apply_mut(SessionEvent::Push { epoch }).unwrap();
        assert!(state.is_live());

        state.apply_mut(SessionEvent::Push { epoch }).unwrap();
        assert!(state.is_live());

        state.apply_mut(SessionEvent::Leave).unwrap();
        assert!(!state.is_active());

        // Leave is always allowed
        state.apply_mut(SessionEvent::Leave).unwrap();
    }

    #[test]
    fn test_vanished_returns_to_idle() {
        let mut state = SessionState::new();
        let epoch = activate(&mut state, "G1");
        state.apply_mut(SessionEvent::Push { epoch }).unwrap();

        state.apply_mut(SessionEvent::Vanished { epoch }).unwrap();
        assert_eq!(*state.location(), SessionLocation::Idle);

        // Pending subscriptions can vanish too
        let epoch = activate(&mut state, "G2");
        state.apply_mut(SessionEvent::Vanished { epoch }).unwrap();
        assert!(!state.is_active());
    }

    #[test]
    fn test_switch_games_bumps_epoch() {
        let mut state = SessionState::new();
        let first = activate(&mut state, "G1");
        state.apply_mut(SessionEvent::Push { epoch: first }).unwrap();

        let second = activate(&mut state, "G2");
        assert!(second > first);
        assert_eq!(state.status(), SubscriptionStatus::Pending);

        // Late push and vanish from the first subscription are rejected
        let err = state
            .apply_mut(SessionEvent::Push { epoch: first })
            .unwrap_err();
        assert_eq!(err.reason, "Stale subscription");
        assert!(state
            .apply_mut(SessionEvent::Vanished { epoch: first })
            .is_err());
        assert_eq!(state.game_id(), Some("G2"));
    }

    #[test]
    fn test_reactivate_same_game_keeps_epoch() {
        let mut state = SessionState::new();
        let epoch = activate(&mut state, "G1");
        state.apply_mut(SessionEvent::Push { epoch }).unwrap();

        let again = activate(&mut state, "G1");
        assert_eq!(again, epoch);
        assert!(state.is_live());
    }

    #[test]
    fn test_epochs_never_reused_after_leave() {
        let mut state = SessionState::new();
        let first = activate(&mut state, "G1");
        state.apply_mut(SessionEvent::Leave).unwrap();

        let second = activate(&mut state, "G1");
        assert_ne!(first, second);
        assert!(state.apply_mut(SessionEvent::Push { epoch: first }).is_err());
    }

    #[test]
    fn test_push_when_idle() {
        let mut state = SessionState::new();
        let err = state.apply_mut(SessionEvent::Push { epoch: 1 }).unwrap_err();
        assert_eq!(err.reason, "No active game");
    }

    #[test]
    fn test_display() {
        let loc = SessionLocation::Live {
            game_id: "G1".to_string(),
            epoch: 3,
        };
        assert_eq!(format!("{}", loc), "Live(G1, #3)");
    }
}
