//! Squares Pool State Library
//!
//! This crate provides shared, realtime game state for squares pools.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Game Documents** - One document per game: settings, cell ownership,
//!   players and scores, with every mutation computed as a set of top-level
//!   field groups to overwrite.
//!
//! - **Document Store Port** - A small async trait (get, set, merge update,
//!   subscribe) that any document backend can implement, plus an in-memory
//!   store for tests and embedded use.
//!
//! - **Session State Machine** - Which game this client is attached to and
//!   whether its subscription is pending or live, with stale pushes rejected.
//!
//! - **Game Manager** - Create, join and leave games, and the host/player
//!   operations on the active one.
//!
//! # Design Principles
//!
//! 1. **The store is the source of truth** - Operations never edit the local
//!    snapshot; they write to the store and wait for the push.
//!
//! 2. **Last writer wins per field group** - Updates replace whole top-level
//!    fields. Concurrent writers to the same group race.
//!
//! 3. **No server authority** - Everything here runs on the client.
//!
//! 4. **Serialization-ready** - Documents are plain JSON objects.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use squares_pool_state::state::{
//!     Claimant, CreateGame, GameManager, MemoryStore, SettingsPatch,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), squares_pool_state::state::ManagerError> {
//! let store = Arc::new(MemoryStore::new());
//!
//! // Host creates a game
//! let host = GameManager::new(store.clone());
//! let code = host
//!     .create_game(
//!         CreateGame::new("host-1", "Hank")
//!             .with_settings(SettingsPatch::new().with_teams("A", "B")),
//!     )
//!     .await?;
//!
//! // A player joins by code and claims a cell
//! let player = GameManager::new(store);
//! assert!(player.join_game(&code.to_lowercase(), None).await?.is_joined());
//! player.claim_square(3, 7, &Claimant::new("p1", "Alice")).await?;
//!
//! assert_eq!(host.players().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
