use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::path::Path;

use anyhow::Context;
use rand::prelude::*;

use crate::learn::parameter::{CreditAssignment, Parameter, ParameterError};
use crate::model_file;
use crate::prelude::{Action, ModelActionType};
use crate::state::State;
use crate::table::{QEntry, QTable};

/// Source of the rewards an agent learns from
pub trait RewardFunction<A: Action> {
    /// Reward for having ended up in `state`; used by [CreditAssignment::TerminalDiscounted]
    fn terminal_reward(&self, state: &State) -> f64;

    /// Reward for choosing `action` in `state`; used by [CreditAssignment::PerStep]
    fn step_reward(&self, state: &State, action: A) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    /// Never explores and never touches the table
    Demo,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Training => write!(f, "training"),
            Mode::Demo => write!(f, "demo"),
        }
    }
}

/// Read-only view of the agent for status displays
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub mode: Mode,
    pub episode: usize,
    pub max_episodes: usize,
    pub explore_chance: f64,
    pub table_size: usize,
    pub last_action: Option<String>,
}

impl Display for AgentSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] episode {}/{} | explore {:.3} | states {} | action {}",
            self.mode,
            self.episode,
            self.max_episodes,
            self.explore_chance,
            self.table_size,
            self.last_action.as_deref().unwrap_or("-")
        )
    }
}

/**
    Tabular Q-learning agent with epsilon greedy exploration.

    Steps are collected in an episode history. Once the history outgrows `episode_length`
    the rewards are folded into the table through incremental averaging, exploration decays
    and the episode counter advances. After `max_episodes` the agent switches to [Mode::Demo]
    and saves its table once.
 */
pub struct TabularAgent<A: Action, R: RewardFunction<A>> {
    param: Parameter,
    reward_fn: R,
    table: QTable,
    history: Vec<(State, A)>,
    mode: Mode,
    explore_chance: f64,
    episode: usize,
    last_action: Option<A>,
    /// Table changed since it was last saved to `param.model_file`
    unsaved: bool,
    rng: StdRng,
}

impl<A: Action, R: RewardFunction<A>> TabularAgent<A, R> {
    /// Loads the table from `param.model_file` when `param.use_existing_model` is set
    pub fn new(param: Parameter, reward_fn: R) -> Result<Self, ParameterError> {
        let table = if param.use_existing_model {
            model_file::load(&param.model_file, A::ACTION_SPACE as usize)
        } else {
            QTable::new(A::ACTION_SPACE as usize)
        };
        Self::with_table(param, reward_fn, table)
    }

    pub fn with_table(param: Parameter, reward_fn: R, table: QTable) -> Result<Self, ParameterError> {
        param.validate()?;
        assert_eq!(table.action_space(), A::ACTION_SPACE as usize, "table does not match the action space");
        let rng = match param.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            mode: if param.is_training { Mode::Training } else { Mode::Demo },
            explore_chance: param.explore_chance,
            param,
            reward_fn,
            table,
            history: vec![],
            episode: 0,
            last_action: None,
            unsaved: false,
            rng,
        })
    }

    pub fn get_row(&self, state: &State) -> Cow<'_, [QEntry]> {
        self.table.row(state)
    }

    pub fn select_action(&mut self, state: &State) -> A {
        let explore_chance = match self.mode {
            Mode::Training => self.explore_chance,
            Mode::Demo => 0.0,
        };
        let idx = if self.rng.gen::<f64>() < explore_chance {
            self.rng.gen_range(0..A::ACTION_SPACE)
        } else {
            self.table.best_action(state) as ModelActionType
        };
        let action = A::try_from_numeric(idx).expect("action value should be in proper range");
        self.last_action = Some(action);
        action
    }

    /// Appends to the episode history and propagates once the episode is complete. No-op in demo mode.
    pub fn record(&mut self, state: State, action: A) -> anyhow::Result<()> {
        if self.mode != Mode::Training {
            return Ok(());
        }
        self.history.push((state, action));
        if self.history.len() > self.param.episode_length {
            self.propagate_reward()?;
        }
        Ok(())
    }

    /// Select an action for `state` and record it
    pub fn step(&mut self, state: State) -> anyhow::Result<A> {
        let action = self.select_action(&state);
        log::debug!("state {} -> action {}", state, action);
        self.record(state, action)?;
        Ok(action)
    }

    /// Folds the episode history into the table.
    ///
    /// Returns an error only when the final save at the end of training fails. The agent is in
    /// demo mode then and [Self::has_unsaved_changes] stays set, so the caller can retry [Self::save].
    pub fn propagate_reward(&mut self) -> anyhow::Result<()> {
        if self.mode != Mode::Training || self.history.is_empty() {
            return Ok(());
        }
        match self.param.credit_assignment {
            CreditAssignment::TerminalDiscounted => self.propagate_terminal_reward(),
            CreditAssignment::PerStep => self.propagate_step_rewards(),
        }
        self.unsaved = true;
        self.update_explore_chance();
        self.episode += 1;
        log::debug!(
            "episode {} done, explore chance {:.4}, {} states known",
            self.episode,
            self.explore_chance,
            self.table.len()
        );

        if self.episode >= self.param.max_episodes {
            self.mode = Mode::Demo;
            log::info!("training finished after {} episodes, switching to demo mode", self.episode);
            self.save()?;
        }
        Ok(())
    }

    fn propagate_terminal_reward(&mut self) {
        let Some((last_state, last_action)) = self.history.pop() else {
            return;
        };
        let mut reward = self.reward_fn.terminal_reward(&last_state);
        log::debug!("terminal reward {} from state {}", reward, last_state);
        for (state, action) in self.history.iter().rev() {
            reward *= self.param.reward_discount;
            self.table.apply_reward(state, action.index(), reward);
        }
        self.history.clear();
        self.history.push((last_state, last_action));
    }

    fn propagate_step_rewards(&mut self) {
        for (state, action) in self.history.drain(..) {
            let reward = self.reward_fn.step_reward(&state, action);
            self.table.apply_reward(&state, action.index(), reward);
        }
    }

    fn update_explore_chance(&mut self) {
        self.explore_chance = f64::max(self.explore_chance * self.param.explore_decay, self.param.explore_min);
    }

    pub fn apply_reward(&mut self, state: &State, action: A, reward: f64) {
        self.table.apply_reward(state, action.index(), reward);
        self.unsaved = true;
    }

    /// Saves to the configured model file
    pub fn save(&mut self) -> anyhow::Result<()> {
        self.save_to(&self.param.model_file)?;
        self.unsaved = false;
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        model_file::save(&self.table, path).with_context(|| format!("saving model to {}", path.display()))
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_training(&self) -> bool {
        self.mode == Mode::Training
    }

    pub fn episode(&self) -> usize {
        self.episode
    }

    pub fn explore_chance(&self) -> f64 {
        self.explore_chance
    }

    pub fn history(&self) -> &[(State, A)] {
        &self.history
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            mode: self.mode,
            episode: self.episode,
            max_episodes: self.param.max_episodes,
            explore_chance: self.explore_chance,
            table_size: self.table.len(),
            last_action: self.last_action.map(|a| a.to_string()),
        }
    }
}
