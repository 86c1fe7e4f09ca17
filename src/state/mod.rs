//! State management module for squares pools.
//!
//! This module provides the core state types and the manager:
//!
//! - `settings` - Game settings and axis digit orders
//! - `game` - The game document and the field-group updates computed from it
//! - `codes` - Game codes and digit shuffles
//! - `store` - The document store port
//! - `memory` - In-memory store with a synchronous change feed
//! - `session` - Client session state machine
//! - `manager` - The per-client game manager
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            GameManager                               │
//! │                                                                      │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌─────────────────┐   │
//! │  │  SessionState    │   │  snapshot        │   │  Subscription   │   │
//! │  │                  │   │                  │   │                 │   │
//! │  │ Idle             │   │ Option<GameState>│   │ epoch-stamped   │   │
//! │  │ Subscribing(id,e)│   │ replaced on push │   │ change callback │   │
//! │  │ Live(id, e)      │   │                  │   │                 │   │
//! │  └──────────────────┘   └──────────────────┘   └────────┬────────┘   │
//! │                                                         │            │
//! │   operation ─▶ GameState::claim/... ─▶ GameUpdate ──┐   │ push       │
//! └─────────────────────────────────────────────────────┼───┼────────────┘
//!                                                       ▼   │
//!                                    ┌──────────────────────┴──────┐
//!                                    │  dyn DocumentStore          │
//!                                    │  get / set / update /       │
//!                                    │  subscribe                  │
//!                                    └─────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use squares_pool_state::state::{
//!     game::GameState,
//!     settings::GameSettings,
//! };
//!
//! let game = GameState::new(id, host_id, host_name, None, GameSettings::default());
//! let update = game.claim(CellKey::new(3, 7), &Claimant::new("p1", "Alice"));
//! ```

pub mod codes;
pub mod config;
pub mod error;
pub mod game;
pub mod manager;
pub mod memory;
pub mod session;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use codes::{
    generate_game_code, normalize_game_code, shuffled_digits, GAME_CODE_ALPHABET, GAME_CODE_LEN,
};
pub use config::{ManagerConfig, DEFAULT_COLLECTION};
pub use error::{JoinOutcome, JoinRejection, ManagerError};
pub use game::{
    CellKey, CellKeyError, Claimant, GameState, GameUpdate, PayoutLog, Player, PotSummary, Scores,
    SquareMap,
};
pub use manager::{CreateGame, GameManager};
pub use memory::MemoryStore;
pub use session::{
    InvalidTransition, SessionEvent, SessionLocation, SessionState, SubscriptionStatus,
};
pub use settings::{
    DigitOrder, DigitOrderError, GameSettings, Payout, SettingsPatch, DEFAULT_PRICE_PER_SQUARE,
    DIGIT_COUNT,
};
pub use store::{
    ChangeCallback, Document, DocumentChange, DocumentStore, StoreError, Subscription,
};
