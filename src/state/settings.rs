//! Game settings.
//!
//! Settings are the host-editable part of a game document: display name,
//! price, payouts, team names and the digit labels along each grid axis.
//! Money is `f64` because stored documents carry plain JSON numbers, which
//! may be fractional.
//! They are replaced wholesale on every settings write, so a
//! [`SettingsPatch`] is always resolved against the latest snapshot before
//! it is sent.

use serde::{Deserialize, Serialize};

/// Number of digits along each grid axis.
pub const DIGIT_COUNT: usize = 10;

/// Default display name for a new game.
pub const DEFAULT_GAME_NAME: &str = "Season Opener 2024";

/// Default price per claimed cell.
pub const DEFAULT_PRICE_PER_SQUARE: f64 = 50.0;

/// An ordering of the digits 0-9 used to label one grid axis.
///
/// Always a full permutation: construction and deserialization reject
/// anything shorter, longer, out of range or repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct DigitOrder([u8; DIGIT_COUNT]);

impl DigitOrder {
    /// The natural order 0, 1, ..., 9.
    pub fn identity() -> Self {
        let mut digits = [0u8; DIGIT_COUNT];
        for (idx, slot) in digits.iter_mut().enumerate() {
            *slot = idx as u8;
        }
        Self(digits)
    }

    /// Build from a slice, validating it is a permutation of 0-9.
    pub fn from_slice(digits: &[u8]) -> Result<Self, DigitOrderError> {
        if digits.len() != DIGIT_COUNT {
            return Err(DigitOrderError::InvalidLength {
                expected: DIGIT_COUNT,
                found: digits.len(),
            });
        }

        let mut seen = [false; DIGIT_COUNT];
        let mut out = [0u8; DIGIT_COUNT];
        for (idx, &digit) in digits.iter().enumerate() {
            let slot = seen
                .get_mut(digit as usize)
                .ok_or(DigitOrderError::OutOfRange { digit, index: idx })?;
            if *slot {
                return Err(DigitOrderError::Duplicate { digit });
            }
            *slot = true;
            out[idx] = digit;
        }
        Ok(Self(out))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Digit shown at the given axis position.
    pub fn label(&self, index: usize) -> Option<u8> {
        self.0.get(index).copied()
    }

    /// Axis position that shows the given digit.
    pub fn position_of(&self, digit: u8) -> Option<usize> {
        self.0.iter().position(|&d| d == digit)
    }
}

impl Default for DigitOrder {
    fn default() -> Self {
        Self::identity()
    }
}

impl TryFrom<Vec<u8>> for DigitOrder {
    type Error = DigitOrderError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_slice(&value)
    }
}

impl From<DigitOrder> for Vec<u8> {
    fn from(value: DigitOrder) -> Self {
        value.0.to_vec()
    }
}

/// Why a digit sequence is not a valid axis order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigitOrderError {
    #[error("digit order must have {expected} digits, got {found}")]
    InvalidLength { expected: usize, found: usize },
    #[error("digit {digit} at position {index} is out of range")]
    OutOfRange { digit: u8, index: usize },
    #[error("digit {digit} appears more than once")]
    Duplicate { digit: u8 },
}

/// One payout line, e.g. "Q1 Winner" for 500.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub label: String,
    pub amount: f64,
}

impl Payout {
    pub fn new(label: impl Into<String>, amount: f64) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}

/// Settings stored on every game document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    /// Display name
    pub name: String,

    /// Price of one cell
    pub price_per_square: f64,

    /// Payout lines, in display order
    pub payouts: Vec<Payout>,

    /// Team labelling the rows
    pub team_a: String,

    /// Team labelling the columns
    pub team_b: String,

    /// Row labels
    pub rows: DigitOrder,

    /// Column labels
    pub cols: DigitOrder,

    /// Set once the host has drawn the labels; cleared when they are put
    /// back in natural order
    #[serde(default)]
    pub is_scrambled: bool,

    /// Free-text house rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_GAME_NAME.to_string(),
            price_per_square: DEFAULT_PRICE_PER_SQUARE,
            payouts: vec![
                Payout::new("Q1 Winner", 500.0),
                Payout::new("Q2 Winner", 500.0),
                Payout::new("Q3 Winner", 500.0),
                Payout::new("Final Winner", 1000.0),
            ],
            team_a: "Baltimore Ravens".to_string(),
            team_b: "Kansas City Chiefs".to_string(),
            rows: DigitOrder::identity(),
            cols: DigitOrder::identity(),
            is_scrambled: false,
            rules: None,
        }
    }
}

impl GameSettings {
    /// Replace both axis orders, keeping everything else.
    pub fn with_digits(mut self, rows: DigitOrder, cols: DigitOrder) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Total of all payout lines.
    pub fn total_payouts(&self) -> f64 {
        self.payouts.iter().map(|p| p.amount).sum()
    }

    /// Payout line for a 1-based period, e.g. 4 for "Final Winner".
    pub fn payout_for_period(&self, period: usize) -> Option<&Payout> {
        self.payouts.get(period.checked_sub(1)?)
    }
}

/// A partial settings value.
///
/// Every field that is `Some` replaces the matching field wholesale; a
/// `payouts` value replaces the entire payout list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_square: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payouts: Option<Vec<Payout>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_a: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_b: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<DigitOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cols: Option<DigitOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
}

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_price_per_square(mut self, price: f64) -> Self {
        self.price_per_square = Some(price);
        self
    }

    pub fn with_payouts(mut self, payouts: Vec<Payout>) -> Self {
        self.payouts = Some(payouts);
        self
    }

    pub fn with_teams(mut self, team_a: impl Into<String>, team_b: impl Into<String>) -> Self {
        self.team_a = Some(team_a.into());
        self.team_b = Some(team_b.into());
        self
    }

    pub fn with_digits(mut self, rows: DigitOrder, cols: DigitOrder) -> Self {
        self.rows = Some(rows);
        self.cols = Some(cols);
        self
    }

    pub fn with_rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = Some(rules.into());
        self
    }

    /// Check if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow-merge onto `base`, field by field.
    pub fn apply(&self, base: &GameSettings) -> GameSettings {
        let mut next = base.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(price) = self.price_per_square {
            next.price_per_square = price;
        }
        if let Some(payouts) = &self.payouts {
            next.payouts = payouts.clone();
        }
        if let Some(team_a) = &self.team_a {
            next.team_a = team_a.clone();
        }
        if let Some(team_b) = &self.team_b {
            next.team_b = team_b.clone();
        }
        if let Some(rows) = self.rows {
            next.rows = rows;
        }
        if let Some(cols) = self.cols {
            next.cols = cols;
        }
        if let Some(rules) = &self.rules {
            next.rules = Some(rules.clone());
        }
        next
    }
}
