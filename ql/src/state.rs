use std::fmt::{Display, Formatter};
use std::str::FromStr;

use itertools::Itertools;

use crate::model_file::{self, ModelFileError};

/// Horizontal classification of one sampled frame row relative to the center band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Offset {
    Left,
    Center,
    Right,
}

impl Offset {
    pub fn value(self) -> i8 {
        match self {
            Offset::Left => -1,
            Offset::Center => 0,
            Offset::Right => 1,
        }
    }

    pub fn try_from_value(value: i64) -> Option<Self> {
        match value {
            -1 => Some(Offset::Left),
            0 => Some(Offset::Center),
            1 => Some(Offset::Right),
            _ => None,
        }
    }
}

/// Aggregated world state: one [Offset] per sampled row, ordered top to bottom.
///
/// Used as a table key, so equality and hashing are value based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct State(Vec<Offset>);

impl State {
    pub fn new(offsets: Vec<Offset>) -> Self {
        Self(offsets)
    }

    /// The neutral state of the given arity
    pub fn centered(n_features: usize) -> Self {
        Self(vec![Offset::Center; n_features])
    }

    pub fn from_values(values: &[i64]) -> Result<Self, String> {
        values
            .iter()
            .map(|&v| Offset::try_from_value(v).ok_or_else(|| format!("value {} out of range (-1..=1)", v)))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.0
    }

    pub fn values(&self) -> impl Iterator<Item = i8> + '_ {
        self.0.iter().map(|o| o.value())
    }

    /// Sum over all offsets; negative when the majority of rows lean left
    pub fn balance(&self) -> i32 {
        self.values().map(i32::from).sum()
    }
}

impl FromIterator<Offset> for State {
    fn from_iter<T: IntoIterator<Item = Offset>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Literal tuple notation: `(-1, 0, 1)`, `(0,)` or `()`
impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "({},)", single.value()),
            offsets => write!(f, "({})", offsets.iter().map(|o| o.value()).join(", ")),
        }
    }
}

impl FromStr for State {
    type Err = ModelFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        model_file::parse_state(s)
    }
}
