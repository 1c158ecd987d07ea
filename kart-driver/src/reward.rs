use ql::prelude::{RewardFunction, State};

use crate::action::KartAction;

/// Qualitative position of the kart on the track, derived from the row offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackPosition {
    Center,
    NearLeft,
    NearRight,
    OffLeft,
    OffRight,
}

impl TrackPosition {
    /// Balanced offsets are centered; a lean of up to half the rows is near, more is off track
    pub fn classify(state: &State) -> Self {
        let balance = state.balance();
        let near_limit = state.len() as i32 / 2;
        match balance {
            0 => TrackPosition::Center,
            b if b < 0 && -b <= near_limit => TrackPosition::NearLeft,
            b if b < 0 => TrackPosition::OffLeft,
            b if b <= near_limit => TrackPosition::NearRight,
            _ => TrackPosition::OffRight,
        }
    }
}

/// Driving-correctness rewards
#[derive(Debug, Clone, PartialEq)]
pub struct KartReward {
    pub center: f64,
    pub near: f64,
    pub off: f64,
}

impl Default for KartReward {
    fn default() -> Self {
        Self {
            center: 0.0,
            near: -50.0,
            off: -100.0,
        }
    }
}

impl RewardFunction<KartAction> for KartReward {
    fn terminal_reward(&self, state: &State) -> f64 {
        match TrackPosition::classify(state) {
            TrackPosition::Center => self.center,
            TrackPosition::NearLeft | TrackPosition::NearRight => self.near,
            TrackPosition::OffLeft | TrackPosition::OffRight => self.off,
        }
    }

    fn step_reward(&self, state: &State, action: KartAction) -> f64 {
        use KartAction::*;
        use TrackPosition::*;
        match (TrackPosition::classify(state), action) {
            (Center, Throttle) => 100.0,
            (Center, Left | Right) => 0.0,
            (_, Throttle) => 100.0,
            (NearLeft | OffLeft, Right) | (NearRight | OffRight, Left) => 100.0,
            (NearLeft | OffLeft, Left) | (NearRight | OffRight, Right) => -100.0,
        }
    }
}
