use std::borrow::Cow;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::state::State;

/// Running average reward of one (state, action) slot and the number of samples it is built from
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct QEntry {
    pub value: f64,
    pub count: u64,
}

impl QEntry {
    pub fn new(value: f64, count: u64) -> Self {
        Self { value, count }
    }

    /// Incremental average: V' = (V·N + r) / (N+1)
    pub fn updated(self, reward: f64) -> Self {
        let n = self.count as f64;
        Self {
            value: (self.value * n + reward) / (n + 1.0),
            count: self.count + 1,
        }
    }
}

/// Value table: one row of [QEntry] per visited [State], indexed by action number.
///
/// States never written are not stored. Lookups of those yield a default row
/// without touching the table.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable {
    rows: FxHashMap<State, Vec<QEntry>>,
    action_space: usize,
    arity: Option<usize>,
}

impl QTable {
    pub fn new(action_space: usize) -> Self {
        assert!(action_space > 0);
        Self {
            rows: FxHashMap::default(),
            action_space,
            arity: None,
        }
    }

    pub fn action_space(&self) -> usize {
        self.action_space
    }

    /// Length of the states stored so far. Fixed by the first write.
    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, state: &State) -> bool {
        self.rows.contains_key(state)
    }

    /// Lookup-or-default. Never inserts.
    pub fn row(&self, state: &State) -> Cow<'_, [QEntry]> {
        self.check_arity(state);
        match self.rows.get(state) {
            Some(row) => Cow::Borrowed(row.as_slice()),
            None => Cow::Owned(self.default_row()),
        }
    }

    /// Index of the highest valued entry in the row of `state`; ties go to the lowest index
    pub fn best_action(&self, state: &State) -> usize {
        self.row(state)
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (idx, entry)| {
                if entry.value > best.1 {
                    (idx, entry.value)
                } else {
                    best
                }
            })
            .0
    }

    /// Folds one reward sample into the slot (state, action), materializing the row if needed
    pub fn apply_reward(&mut self, state: &State, action: usize, reward: f64) {
        assert!(
            action < self.action_space,
            "action index {} out of range (0..{})",
            action,
            self.action_space
        );
        self.check_arity(state);
        self.arity = Some(state.len());
        let default_row = self.default_row();
        let row = self.rows.entry(state.clone()).or_insert(default_row);
        row[action] = row[action].updated(reward);
    }

    /// Replaces the full row of `state`
    pub fn insert_row(&mut self, state: State, row: Vec<QEntry>) {
        assert_eq!(row.len(), self.action_space, "row length must match the action space");
        self.check_arity(&state);
        self.arity = Some(state.len());
        self.rows.insert(state, row);
    }

    /// Rows in state order
    pub fn iter(&self) -> impl Iterator<Item = (&State, &[QEntry])> {
        self.rows
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(state, row)| (state, row.as_slice()))
    }

    fn default_row(&self) -> Vec<QEntry> {
        vec![QEntry::default(); self.action_space]
    }

    fn check_arity(&self, state: &State) {
        if let Some(arity) = self.arity {
            assert_eq!(
                state.len(),
                arity,
                "state {} does not match the table's state arity {}",
                state,
                arity
            );
        }
    }
}
