//! Game state manager.
//!
//! One [`GameManager`] per client. It owns the client's session (which game
//! is active, if any), keeps a subscription open on that game's document and
//! materializes every push as the current snapshot.
//!
//! Mutations read the latest local snapshot, compute the field groups to
//! replace (see [`GameUpdate`]) and send them as one merge write. They never
//! apply the change locally: the store pushes the merged document back, and
//! that push is what updates the snapshot. Two clients writing the same field
//! group from the same snapshot race, and the later write replaces the
//! earlier one's group wholesale.
//!
//! Operations that need an active game (or a snapshot) quietly do nothing
//! without one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::codes::{generate_game_code, normalize_game_code, shuffled_digits};
use super::config::ManagerConfig;
use super::error::{JoinOutcome, JoinRejection, ManagerError};
use super::game::{
    CellKey, Claimant, GameState, GameUpdate, PayoutLog, Player, PotSummary, Scores, SquareMap,
};
use super::session::{SessionEvent, SessionState, SubscriptionStatus};
use super::settings::{GameSettings, SettingsPatch};
use super::store::{ChangeCallback, DocumentChange, DocumentStore, Subscription};

/// Input for [`GameManager::create_game`].
#[derive(Debug, Clone, Default)]
pub struct CreateGame {
    pub host_user_id: String,
    pub host_name: String,
    pub password: Option<String>,
    /// Applied over the default settings. Row and column orders in the
    /// patch are ignored; new games always get fresh ones.
    pub settings: SettingsPatch,
}

impl CreateGame {
    pub fn new(host_user_id: impl Into<String>, host_name: impl Into<String>) -> Self {
        Self {
            host_user_id: host_user_id.into(),
            host_name: host_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SettingsPatch) -> Self {
        self.settings = settings;
        self
    }
}

/// Session, snapshot and subscription, guarded together.
#[derive(Default)]
struct Attachment {
    session: SessionState,
    snapshot: Option<GameState>,
    subscription: Option<Subscription>,
}

struct Shared {
    attachment: Mutex<Attachment>,
    changes: watch::Sender<Option<GameState>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn attachment(&self) -> MutexGuard<'_, Attachment> {
        lock(&self.attachment)
    }

    /// Handle a push from the subscription stamped `epoch`.
    fn on_change(&self, game_id: &str, epoch: u64, change: DocumentChange) {
        match change {
            DocumentChange::Present(document) => {
                let game = match GameState::from_document(document) {
                    Ok(game) => game,
                    Err(err) => {
                        warn!(game_id, epoch, error = %err, "ignoring undecodable game document");
                        return;
                    }
                };

                let mut attachment = self.attachment();
                if let Err(err) = attachment.session.apply_mut(SessionEvent::Push { epoch }) {
                    debug!(game_id, epoch, reason = err.reason, "dropping push");
                    return;
                }
                debug!(game_id, epoch, players = game.players.len(), "snapshot updated");
                attachment.snapshot = Some(game.clone());
                self.changes.send_replace(Some(game));
            }
            DocumentChange::Absent => {
                let mut attachment = self.attachment();
                if let Err(err) = attachment.session.apply_mut(SessionEvent::Vanished { epoch }) {
                    debug!(game_id, epoch, reason = err.reason, "dropping vanish notice");
                    return;
                }
                attachment.snapshot = None;
                let subscription = attachment.subscription.take();
                self.changes.send_replace(None);
                drop(attachment);

                info!(game_id, "active game no longer exists");
                drop(subscription);
            }
        }
    }
}

/// Client-side manager for the active game.
pub struct GameManager {
    store: Arc<dyn DocumentStore>,
    config: ManagerConfig,
    rng: Mutex<StdRng>,
    shared: Arc<Shared>,
}

impl GameManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, ManagerConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: ManagerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let (changes, _) = watch::channel(None);
        Self {
            store,
            config,
            rng: Mutex::new(rng),
            shared: Arc::new(Shared {
                attachment: Mutex::new(Attachment::default()),
                changes,
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ── Projections ────────────────────────────────────────────────

    /// Code of the active game.
    pub fn active_game_id(&self) -> Option<String> {
        self.shared.attachment().session.game_id().map(str::to_string)
    }

    /// Latest materialized document of the active game.
    pub fn active_game(&self) -> Option<GameState> {
        self.shared.attachment().snapshot.clone()
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.shared.attachment().session.status()
    }

    /// Current settings, or the configured defaults with no game.
    pub fn settings(&self) -> GameSettings {
        self.project(|game| game.settings.clone())
            .unwrap_or_else(|| self.config.default_settings.clone())
    }

    pub fn squares(&self) -> SquareMap {
        self.project(|game| game.squares.clone()).unwrap_or_default()
    }

    pub fn players(&self) -> Vec<Player> {
        self.project(|game| game.players.clone()).unwrap_or_default()
    }

    pub fn scores(&self) -> Scores {
        self.project(|game| game.scores).unwrap_or_default()
    }

    pub fn pot_summary(&self) -> Option<PotSummary> {
        self.project(GameState::pot_summary)
    }

    pub fn winning_cell(&self) -> Option<CellKey> {
        self.project(GameState::winning_cell).flatten()
    }

    pub fn current_winner(&self) -> Option<Player> {
        self.project(|game| game.winner().cloned()).flatten()
    }

    /// Recorded payouts, oldest first.
    pub fn payout_history(&self) -> Vec<PayoutLog> {
        self.project(|game| game.payout_history.clone()).unwrap_or_default()
    }

    /// Watch the materialized snapshot; `None` while no game is active.
    pub fn watch(&self) -> watch::Receiver<Option<GameState>> {
        self.shared.changes.subscribe()
    }

    fn project<T>(&self, f: impl FnOnce(&GameState) -> T) -> Option<T> {
        self.shared.attachment().snapshot.as_ref().map(f)
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Create a game as host and make it active. Returns its code.
    pub async fn create_game(&self, input: CreateGame) -> Result<String, ManagerError> {
        let (game_id, rows, cols) = {
            let mut rng = lock(&self.rng);
            let game_id = generate_game_code(&mut *rng);
            let rows = shuffled_digits(&mut *rng);
            let cols = shuffled_digits(&mut *rng);
            (game_id, rows, cols)
        };

        let settings = input
            .settings
            .apply(&self.config.default_settings)
            .with_digits(rows, cols);
        let game = GameState::new(
            game_id.clone(),
            input.host_user_id,
            input.host_name,
            input.password.as_deref(),
            settings,
        );

        self.store
            .set(&self.config.collection, &game_id, game.to_document()?)
            .await?;
        info!(
            game_id = %game_id,
            host = %game.host_user_id,
            protected = game.password.is_some(),
            "game created"
        );

        self.activate(&game_id).await?;
        Ok(game_id)
    }

    /// Join a game by code.
    ///
    /// The code is trimmed and upper-cased. Unknown codes and wrong
    /// passwords come back as [`JoinOutcome::Rejected`] with the session
    /// untouched.
    pub async fn join_game(
        &self,
        code: &str,
        password: Option<&str>,
    ) -> Result<JoinOutcome, ManagerError> {
        let game_id = normalize_game_code(code);

        let Some(document) = self.store.get(&self.config.collection, &game_id).await? else {
            info!(game_id = %game_id, "join refused: no such game");
            return Ok(JoinOutcome::Rejected(JoinRejection::NotFound));
        };
        let game = GameState::from_document(document).map_err(|source| ManagerError::Malformed {
            game_id: game_id.clone(),
            source,
        })?;

        if !game.accepts_password(password) {
            info!(game_id = %game_id, "join refused: wrong password");
            return Ok(JoinOutcome::Rejected(JoinRejection::WrongPassword));
        }

        self.activate(&game_id).await?;
        info!(game_id = %game_id, "joined game");
        Ok(JoinOutcome::Joined { game_id })
    }

    /// Detach from the active game. The document is not touched.
    pub fn leave_game(&self) {
        let (previous, subscription) = {
            let mut attachment = self.shared.attachment();
            let previous = attachment.session.game_id().map(str::to_string);
            // Leave is valid from every location.
            let _ = attachment.session.apply_mut(SessionEvent::Leave);
            attachment.snapshot = None;
            self.shared.changes.send_replace(None);
            (previous, attachment.subscription.take())
        };
        drop(subscription);

        if let Some(game_id) = previous {
            info!(game_id = %game_id, "left game");
        }
    }

    /// Point the session at `game_id` and open its subscription.
    async fn activate(&self, game_id: &str) -> Result<(), ManagerError> {
        let (epoch, previous) = {
            let mut attachment = self.shared.attachment();
            if attachment.session.game_id() == Some(game_id) {
                return Ok(());
            }
            if let Err(err) = attachment.session.apply_mut(SessionEvent::Activate {
                game_id: game_id.to_string(),
            }) {
                warn!(game_id, error = %err, "activation rejected");
                return Ok(());
            }
            attachment.snapshot = None;
            self.shared.changes.send_replace(None);
            let epoch = attachment.session.epoch().unwrap_or_default();
            (epoch, attachment.subscription.take())
        };
        // Tear down the old feed before opening the new one.
        drop(previous);
        debug!(game_id, epoch, "subscribing");

        let callback = change_callback(Arc::downgrade(&self.shared), game_id.to_string(), epoch);
        let subscription = match self
            .store
            .subscribe(&self.config.collection, game_id, callback)
            .await
        {
            Ok(subscription) => subscription,
            Err(err) => {
                let mut attachment = self.shared.attachment();
                if attachment.session.epoch() == Some(epoch) {
                    let _ = attachment.session.apply_mut(SessionEvent::Leave);
                    attachment.snapshot = None;
                    self.shared.changes.send_replace(None);
                }
                return Err(err.into());
            }
        };

        let stale = {
            let mut attachment = self.shared.attachment();
            if attachment.session.epoch() == Some(epoch) {
                attachment.subscription = Some(subscription);
                None
            } else {
                // Superseded or vanished while subscribing.
                Some(subscription)
            }
        };
        drop(stale);
        Ok(())
    }

    // ── Mutations ──────────────────────────────────────────────────

    /// Clear cells, players and scores. Settings stay.
    pub async fn reset_game(&self) -> Result<(), ManagerError> {
        let Some(game_id) = self.active_game_id() else {
            return Ok(());
        };
        self.write(&game_id, GameUpdate::reset()).await
    }

    /// Claim the cell at (`row`, `col`) for `claimant`.
    ///
    /// Does nothing if the cell is already owned in the local snapshot.
    pub async fn claim_square(
        &self,
        row: u8,
        col: u8,
        claimant: &Claimant,
    ) -> Result<(), ManagerError> {
        let Some((game_id, game)) = self.writable() else {
            return Ok(());
        };
        let key = CellKey::new(row, col);
        match game.claim(key, claimant) {
            Some(update) => self.write(&game_id, update).await,
            None => {
                debug!(game_id = %game_id, cell = %key, "cell not claimable");
                Ok(())
            }
        }
    }

    /// Flip a player's paid flag.
    pub async fn toggle_paid(&self, player_id: &str) -> Result<(), ManagerError> {
        let Some((game_id, game)) = self.writable() else {
            return Ok(());
        };
        match game.toggle_paid(player_id) {
            Some(update) => self.write(&game_id, update).await,
            None => Ok(()),
        }
    }

    /// Remove a player and release all their cells.
    pub async fn delete_player(&self, player_id: &str) -> Result<(), ManagerError> {
        let Some((game_id, game)) = self.writable() else {
            return Ok(());
        };
        self.write(&game_id, game.remove_player(player_id)).await
    }

    /// Merge a settings patch onto the current settings.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<(), ManagerError> {
        let Some((game_id, game)) = self.writable() else {
            return Ok(());
        };
        self.write(&game_id, game.patch_settings(patch)).await
    }

    /// Replace both scores.
    pub async fn update_scores(&self, team_a: u32, team_b: u32) -> Result<(), ManagerError> {
        let Some(game_id) = self.active_game_id() else {
            return Ok(());
        };
        self.write(&game_id, GameUpdate::scores(team_a, team_b)).await
    }

    /// Draw new row and column labels.
    ///
    /// Claimed cells keep their owners, so they now sit under different
    /// digits.
    pub async fn scramble_grid_digits(&self) -> Result<(), ManagerError> {
        let Some((game_id, game)) = self.writable() else {
            return Ok(());
        };
        let (rows, cols) = {
            let mut rng = lock(&self.rng);
            (shuffled_digits(&mut *rng), shuffled_digits(&mut *rng))
        };
        self.write(&game_id, game.relabel(rows, cols)).await
    }

    /// Put both axes back in natural order and clear the scrambled flag.
    pub async fn reset_grid_digits(&self) -> Result<(), ManagerError> {
        let Some((game_id, game)) = self.writable() else {
            return Ok(());
        };
        self.write(&game_id, game.reset_digits()).await
    }

    /// Record a payout for the current winning cell at the current score.
    pub async fn record_payout(
        &self,
        label: impl Into<String>,
        amount: f64,
    ) -> Result<(), ManagerError> {
        let Some((game_id, game)) = self.writable() else {
            return Ok(());
        };
        let update = game.record_payout(label, amount);
        if let Some(entry) = update.payout_history.as_ref().and_then(|h| h.last()) {
            info!(
                game_id = %game_id,
                period = entry.period,
                amount,
                winner = entry.winner_id.as_deref().unwrap_or("-"),
                "payout recorded"
            );
        }
        self.write(&game_id, update).await
    }

    /// Active game id and its snapshot, if both exist.
    fn writable(&self) -> Option<(String, GameState)> {
        let attachment = self.shared.attachment();
        let game_id = attachment.session.game_id()?.to_string();
        let game = attachment.snapshot.clone()?;
        Some((game_id, game))
    }

    async fn write(&self, game_id: &str, update: GameUpdate) -> Result<(), ManagerError> {
        debug!(game_id, fields = ?update.field_groups(), "merge update");
        self.store
            .update(&self.config.collection, game_id, update.to_document()?)
            .await?;
        Ok(())
    }
}

impl Drop for GameManager {
    fn drop(&mut self) {
        let subscription = self.shared.attachment().subscription.take();
        drop(subscription);
    }
}

fn change_callback(shared: Weak<Shared>, game_id: String, epoch: u64) -> ChangeCallback {
    Arc::new(move |change: DocumentChange| {
        if let Some(shared) = shared.upgrade() {
            shared.on_change(&game_id, epoch, change);
        }
    })
}
