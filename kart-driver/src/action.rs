use std::fmt::{Display, Formatter};

use ql::prelude::{Action, ModelActionType};

/// Driving commands, in table order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KartAction {
    Left,
    Right,
    Throttle,
}

impl KartAction {
    pub const ALL: [KartAction; 3] = [KartAction::Left, KartAction::Right, KartAction::Throttle];

    /// Label understood by the actuator
    pub fn name(&self) -> &'static str {
        match self {
            KartAction::Left => "left",
            KartAction::Right => "right",
            KartAction::Throttle => "throttle",
        }
    }
}

impl Action for KartAction {
    const ACTION_SPACE: ModelActionType = 3;

    fn numeric(&self) -> ModelActionType {
        match self {
            KartAction::Left => 0,
            KartAction::Right => 1,
            KartAction::Throttle => 2,
        }
    }

    fn try_from_numeric(value: ModelActionType) -> Result<Self, String> {
        match value {
            0 => Ok(KartAction::Left),
            1 => Ok(KartAction::Right),
            2 => Ok(KartAction::Throttle),
            _ => Err(format!("value {} out of range", value)),
        }
    }
}

impl Display for KartAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_roundtrip() {
        for action in KartAction::ALL {
            assert_eq!(KartAction::try_from_numeric(action.numeric()), Ok(action));
        }
        assert!(KartAction::try_from_numeric(3).is_err());
    }

    #[test]
    fn test_names() {
        assert_eq!(KartAction::Throttle.to_string(), "throttle");
        assert_eq!(KartAction::ALL.map(|a| a.name()), ["left", "right", "throttle"]);
    }
}
