use std::path::PathBuf;

use thiserror::Error;

/// How the rewards of an episode are folded into the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreditAssignment {
    /// Reward of the last recorded state, handed backwards through the episode with discounting
    #[default]
    TerminalDiscounted,
    /// Fixed reward per (state, action) pair, undiscounted
    PerStep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Read the table from `model_file` at construction
    pub use_existing_model: bool,
    /// Training mode explores and learns, demo mode only exploits
    pub is_training: bool,
    /// Number of recorded steps after which the rewards are propagated
    pub episode_length: usize,
    /// Number of episodes until training ends
    pub max_episodes: usize,
    /// Initial epsilon greedy parameter
    pub explore_chance: f64,
    /// Multiplicative epsilon decay per episode
    pub explore_decay: f64,
    /// Minimum epsilon greedy parameter
    pub explore_min: f64,
    /// Discount factor for rewards handed to earlier steps
    pub reward_discount: f64,
    pub credit_assignment: CreditAssignment,
    pub model_file: PathBuf,
    /// Fixed seed for reproducible exploration
    pub rng_seed: Option<u64>,
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            use_existing_model: true,
            is_training: true,
            episode_length: 10,
            max_episodes: 10000,
            explore_chance: 0.5,
            explore_decay: 0.9,
            explore_min: 0.01,
            reward_discount: 0.9,
            credit_assignment: CreditAssignment::default(),
            model_file: PathBuf::from("model.txt"),
            rng_seed: None,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ParameterError {
    #[error("{name} must be {constraint}, got {value}")]
    OutOfRange {
        name: &'static str,
        constraint: &'static str,
        value: f64,
    },
}

impl Parameter {
    pub fn validate(&self) -> Result<(), ParameterError> {
        let check = |ok: bool, name, constraint, value| {
            if ok {
                Ok(())
            } else {
                Err(ParameterError::OutOfRange { name, constraint, value })
            }
        };
        check(self.episode_length > 0, "episode_length", "> 0", self.episode_length as f64)?;
        check(self.max_episodes > 0, "max_episodes", "> 0", self.max_episodes as f64)?;
        check(
            self.explore_decay > 0.0 && self.explore_decay <= 1.0,
            "explore_decay",
            "in (0, 1]",
            self.explore_decay,
        )?;
        check(self.explore_min >= 0.0, "explore_min", ">= 0", self.explore_min)?;
        check(
            self.explore_chance >= self.explore_min && self.explore_chance <= 1.0,
            "explore_chance",
            "in [explore_min, 1]",
            self.explore_chance,
        )?;
        check(
            self.reward_discount > 0.0 && self.reward_discount <= 1.0,
            "reward_discount",
            "in (0, 1]",
            self.reward_discount,
        )
    }
}
