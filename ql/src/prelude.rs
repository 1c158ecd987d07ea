use std::fmt::Display;

pub use crate::learn::parameter::{CreditAssignment, Parameter};
pub use crate::learn::tabular_agent::{AgentSnapshot, Mode, RewardFunction, TabularAgent};
pub use crate::state::{Offset, State};
pub use crate::table::{QEntry, QTable};

pub type ModelActionType = u8;

/// Action type placeholder
pub trait Action: Display + Sized + Clone + Copy {
    /// ACTION_SPACE = number of possible actions
    const ACTION_SPACE: ModelActionType;
    /// identifying the Action as a unique value in range (0..Self::ACTION_SPACE)
    fn numeric(&self) -> ModelActionType;
    fn try_from_numeric(value: ModelActionType) -> Result<Self, String>;

    /// Position of the action inside a table row
    fn index(&self) -> usize {
        self.numeric() as usize
    }
}
