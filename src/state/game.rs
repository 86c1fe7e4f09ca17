//! Game document state.
//!
//! [`GameState`] is the whole document stored for one game. Every mutating
//! operation is computed here as a pure function from a snapshot to a
//! [`GameUpdate`]: the set of top-level field groups to replace. The store
//! applies an update by overwriting exactly those groups, so nothing in an
//! update is merged with what another client may have written meanwhile.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::settings::{DigitOrder, GameSettings, Payout, SettingsPatch, DIGIT_COUNT};
use super::store::{to_document, Document};

/// A grid position: row index and column index, each 0-9.
///
/// The digits shown for a cell are `settings.rows[row]` and
/// `settings.cols[col]`, so re-labelling the axes changes what a claimed
/// cell means without changing who owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellKey {
    pub row: u8,
    pub col: u8,
}

impl CellKey {
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Check if position is valid (within grid bounds).
    pub fn is_valid(&self) -> bool {
        (self.row as usize) < DIGIT_COUNT && (self.col as usize) < DIGIT_COUNT
    }

    /// Every cell on the grid, row by row.
    pub fn all() -> impl Iterator<Item = CellKey> {
        (0..DIGIT_COUNT as u8)
            .flat_map(|row| (0..DIGIT_COUNT as u8).map(move |col| Self::new(row, col)))
    }

    /// Digits shown on the axes for this cell.
    pub fn labels(&self, settings: &GameSettings) -> Option<(u8, u8)> {
        let row = settings.rows.label(self.row as usize)?;
        let col = settings.cols.label(self.col as usize)?;
        Some((row, col))
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

impl From<CellKey> for String {
    fn from(value: CellKey) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for CellKey {
    type Error = CellKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for CellKey {
    type Err = CellKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || CellKeyError(value.to_string());
        let (row, col) = value.split_once('-').ok_or_else(invalid)?;
        let key = CellKey::new(
            row.parse().map_err(|_| invalid())?,
            col.parse().map_err(|_| invalid())?,
        );
        if key.is_valid() {
            Ok(key)
        } else {
            Err(invalid())
        }
    }
}

/// A cell key string that is not `"<row>-<col>"` within the grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid cell key {0:?}")]
pub struct CellKeyError(pub String);

/// Cell ownership: cell key to owning player id. Absent means unclaimed.
pub type SquareMap = BTreeMap<CellKey, String>;

/// A participant in the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Player ID, scoped to this game
    pub id: String,

    /// Display name
    pub name: String,

    /// Cells attributed to this player; kept alongside the cell map
    pub squares: u32,

    /// Whether the player has paid for their cells
    pub paid: bool,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            squares: 0,
            paid: false,
        }
    }

    /// What this player owes at the given price.
    pub fn amount_owed(&self, price_per_square: f64) -> f64 {
        f64::from(self.squares) * price_per_square
    }
}

/// Who is claiming a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimant {
    pub id: String,
    pub name: String,
}

impl Claimant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Current score per team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub team_a: u32,
    pub team_b: u32,
}

impl Scores {
    pub fn new(team_a: u32, team_b: u32) -> Self {
        Self { team_a, team_b }
    }
}

/// One recorded payout: which period, who won it and at what score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutLog {
    /// Unique within the game: `<game id>-<period>`
    pub id: String,

    /// 1-based, in recording order
    pub period: u32,

    pub label: String,

    /// Owner of the winning cell, if it was claimed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_name: Option<String>,

    pub amount: f64,
    pub team_a_score: u32,
    pub team_b_score: u32,

    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// The full game document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Game code, also the document key
    pub id: String,

    /// Join password, compared as plain text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Host user ID
    pub host_user_id: String,

    /// Host display name
    pub host_name: String,

    /// Creation time, milliseconds since the Unix epoch
    pub created_at: i64,

    pub settings: GameSettings,

    /// Cell ownership
    #[serde(default)]
    pub squares: SquareMap,

    /// Players in the order they first claimed
    #[serde(default)]
    pub players: Vec<Player>,

    #[serde(default)]
    pub scores: Scores,

    /// Payouts recorded so far, oldest first
    #[serde(default)]
    pub payout_history: Vec<PayoutLog>,
}

impl GameState {
    /// Create a new, empty game.
    ///
    /// A password that is empty after trimming means no password.
    pub fn new(
        id: String,
        host_user_id: String,
        host_name: String,
        password: Option<&str>,
        settings: GameSettings,
    ) -> Self {
        let password = password
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Self {
            id,
            password,
            host_user_id,
            host_name,
            created_at: chrono::Utc::now().timestamp_millis(),
            settings,
            squares: SquareMap::new(),
            players: Vec::new(),
            scores: Scores::default(),
            payout_history: Vec::new(),
        }
    }

    pub fn from_document(document: Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(document))
    }

    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        to_document(self)
    }

    /// Check a join password against this game.
    ///
    /// Plain equality on the trimmed input. A game without a password (or
    /// with an empty one) accepts anything.
    pub fn accepts_password(&self, supplied: Option<&str>) -> bool {
        match self.password.as_deref() {
            None | Some("") => true,
            Some(expected) => supplied.unwrap_or("").trim() == expected,
        }
    }

    /// Get a player.
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    /// Check if player is in game.
    pub fn has_player(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }

    /// Owner of a cell.
    pub fn owner(&self, key: CellKey) -> Option<&str> {
        self.squares.get(&key).map(String::as_str)
    }

    /// Cells owned by a player.
    pub fn squares_of<'a>(&'a self, player_id: &'a str) -> impl Iterator<Item = CellKey> + 'a {
        self.squares
            .iter()
            .filter(move |(_, owner)| owner.as_str() == player_id)
            .map(|(key, _)| *key)
    }

    pub fn claimed_count(&self) -> usize {
        self.squares.len()
    }

    /// Unclaimed cells, row by row.
    pub fn open_cells(&self) -> impl Iterator<Item = CellKey> + '_ {
        CellKey::all().filter(move |key| !self.squares.contains_key(key))
    }

    /// Claim a cell.
    ///
    /// Returns `None` when the cell is already owned or off the grid. A new
    /// player is appended with one cell; a known one gets the supplied name
    /// and one more cell.
    pub fn claim(&self, key: CellKey, claimant: &Claimant) -> Option<GameUpdate> {
        if !key.is_valid() || self.squares.contains_key(&key) {
            return None;
        }

        let mut squares = self.squares.clone();
        squares.insert(key, claimant.id.clone());

        let mut players = self.players.clone();
        match players.iter_mut().find(|p| p.id == claimant.id) {
            Some(player) => {
                player.name = claimant.name.clone();
                player.squares = player.squares.saturating_add(1);
            }
            None => {
                let mut player = Player::new(claimant.id.clone(), claimant.name.clone());
                player.squares = 1;
                players.push(player);
            }
        }

        Some(GameUpdate {
            squares: Some(squares),
            players: Some(players),
            ..GameUpdate::default()
        })
    }

    /// Flip a player's paid flag. `None` if there is no such player.
    pub fn toggle_paid(&self, player_id: &str) -> Option<GameUpdate> {
        if !self.has_player(player_id) {
            return None;
        }

        let players = self
            .players
            .iter()
            .map(|p| {
                if p.id == player_id {
                    Player {
                        paid: !p.paid,
                        ..p.clone()
                    }
                } else {
                    p.clone()
                }
            })
            .collect();

        Some(GameUpdate {
            players: Some(players),
            ..GameUpdate::default()
        })
    }

    /// Drop a player and every cell they own. Other players are untouched.
    pub fn remove_player(&self, player_id: &str) -> GameUpdate {
        let squares = self
            .squares
            .iter()
            .filter(|(_, owner)| owner.as_str() != player_id)
            .map(|(key, owner)| (*key, owner.clone()))
            .collect();
        let players = self
            .players
            .iter()
            .filter(|p| p.id != player_id)
            .cloned()
            .collect();

        GameUpdate {
            squares: Some(squares),
            players: Some(players),
            ..GameUpdate::default()
        }
    }

    /// Settings with a patch merged on top.
    pub fn patch_settings(&self, patch: &SettingsPatch) -> GameUpdate {
        GameUpdate {
            settings: Some(patch.apply(&self.settings)),
            ..GameUpdate::default()
        }
    }

    /// Settings with freshly drawn axis labels, marked as scrambled. Cell
    /// ownership is left as is.
    pub fn relabel(&self, rows: DigitOrder, cols: DigitOrder) -> GameUpdate {
        let mut settings = self.settings.clone().with_digits(rows, cols);
        settings.is_scrambled = true;
        GameUpdate {
            settings: Some(settings),
            ..GameUpdate::default()
        }
    }

    /// Settings with both axes back in natural order and the scrambled
    /// flag cleared.
    pub fn reset_digits(&self) -> GameUpdate {
        let mut settings = self
            .settings
            .clone()
            .with_digits(DigitOrder::identity(), DigitOrder::identity());
        settings.is_scrambled = false;
        GameUpdate {
            settings: Some(settings),
            ..GameUpdate::default()
        }
    }

    /// Payout line the next recording would normally use.
    pub fn next_payout(&self) -> Option<&Payout> {
        self.settings.payout_for_period(self.payout_history.len() + 1)
    }

    /// Append a payout for the current winning cell at the current score.
    ///
    /// The winner fields stay empty when the winning cell is unclaimed.
    pub fn record_payout(&self, label: impl Into<String>, amount: f64) -> GameUpdate {
        let period = u32::try_from(self.payout_history.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        let winner = self.winner();
        let entry = PayoutLog {
            id: format!("{}-{}", self.id, period),
            period,
            label: label.into(),
            winner_id: winner.map(|p| p.id.clone()),
            winner_name: winner.map(|p| p.name.clone()),
            amount,
            team_a_score: self.scores.team_a,
            team_b_score: self.scores.team_b,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        let mut history = self.payout_history.clone();
        history.push(entry);
        GameUpdate {
            payout_history: Some(history),
            ..GameUpdate::default()
        }
    }

    /// Total paid out across recorded payouts.
    pub fn total_paid_out(&self) -> f64 {
        self.payout_history.iter().map(|log| log.amount).sum()
    }

    /// Cell whose labels match the last digit of each team's score.
    pub fn winning_cell(&self) -> Option<CellKey> {
        let row = self.settings.rows.position_of((self.scores.team_a % 10) as u8)?;
        let col = self.settings.cols.position_of((self.scores.team_b % 10) as u8)?;
        Some(CellKey::new(row as u8, col as u8))
    }

    /// Player who owns the winning cell, if it is claimed.
    pub fn winner(&self) -> Option<&Player> {
        let owner = self.owner(self.winning_cell()?)?;
        self.player(owner)
    }

    /// Money in the pot and how much of it has been collected.
    pub fn pot_summary(&self) -> PotSummary {
        let price = self.settings.price_per_square;
        let total_pot: f64 = self.players.iter().map(|p| p.amount_owed(price)).sum();
        let collected: f64 = self
            .players
            .iter()
            .filter(|p| p.paid)
            .map(|p| p.amount_owed(price))
            .sum();
        let percent_collected = if total_pot > 0.0 {
            collected / total_pot * 100.0
        } else {
            0.0
        };

        PotSummary {
            total_pot,
            collected,
            outstanding: total_pot - collected,
            percent_collected,
        }
    }

    /// Players for the payments view: unpaid first, then by name.
    pub fn payment_ledger(&self) -> Vec<&Player> {
        let mut ledger: Vec<&Player> = self.players.iter().collect();
        ledger.sort_by(|a, b| a.paid.cmp(&b.paid).then_with(|| a.name.cmp(&b.name)));
        ledger
    }
}

/// Pot totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PotSummary {
    pub total_pot: f64,
    pub collected: f64,
    pub outstanding: f64,
    pub percent_collected: f64,
}

/// Top-level field groups to overwrite on a game document.
///
/// Groups left `None` are not sent and stay as they are in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<GameSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squares: Option<SquareMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<Player>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_history: Option<Vec<PayoutLog>>,
}

impl GameUpdate {
    /// Empty cells, no players, zero scores. Settings and payout history
    /// stay.
    pub fn reset() -> Self {
        Self {
            squares: Some(SquareMap::new()),
            players: Some(Vec::new()),
            scores: Some(Scores::default()),
            ..Self::default()
        }
    }

    /// Replace both scores as one unit.
    pub fn scores(team_a: u32, team_b: u32) -> Self {
        Self {
            scores: Some(Scores::new(team_a, team_b)),
            ..Self::default()
        }
    }

    /// Names of the field groups this update overwrites.
    pub fn field_groups(&self) -> Vec<&'static str> {
        let mut groups = Vec::new();
        if self.settings.is_some() {
            groups.push("settings");
        }
        if self.squares.is_some() {
            groups.push("squares");
        }
        if self.players.is_some() {
            groups.push("players");
        }
        if self.scores.is_some() {
            groups.push("scores");
        }
        if self.payout_history.is_some() {
            groups.push("payoutHistory");
        }
        groups
    }

    pub fn is_empty(&self) -> bool {
        self.field_groups().is_empty()
    }

    pub fn to_document(&self) -> Result<Document, serde_json::Error> {
        to_document(self)
    }
}
