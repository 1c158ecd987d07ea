use anyhow::Context;
use image::RgbImage;
use ql::prelude::{AgentSnapshot, Parameter, TabularAgent};

use crate::action::KartAction;
use crate::perception::{self, ExtractorParameter};
use crate::reward::KartReward;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverConfig {
    pub agent: Parameter,
    pub extractor: ExtractorParameter,
}

/// Frame in, action out: state extraction followed by the tabular agent
pub struct Driver {
    extractor: ExtractorParameter,
    agent: TabularAgent<KartAction, KartReward>,
}

impl Driver {
    pub fn new(config: DriverConfig, reward: KartReward) -> anyhow::Result<Self> {
        config.extractor.validate().context("invalid extractor configuration")?;
        let agent = TabularAgent::new(config.agent, reward).context("invalid agent configuration")?;
        if let Some(arity) = agent.table().arity().filter(|&a| a != config.extractor.n_features) {
            anyhow::bail!(
                "loaded model has states of {} features, extractor is configured for {}",
                arity,
                config.extractor.n_features
            );
        }
        Ok(Self {
            extractor: config.extractor,
            agent,
        })
    }

    /// Extracts the state, selects an action, records it while training and
    /// propagates rewards when the episode is due
    pub fn act(&mut self, frame: &RgbImage) -> anyhow::Result<KartAction> {
        let state = perception::extract(frame, &self.extractor);
        self.agent.step(state)
    }

    pub fn agent(&self) -> &TabularAgent<KartAction, KartReward> {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut TabularAgent<KartAction, KartReward> {
        &mut self.agent
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        self.agent.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;
    use ql::prelude::{Mode, QEntry};

    use super::*;

    fn config() -> DriverConfig {
        DriverConfig {
            agent: Parameter {
                use_existing_model: false,
                rng_seed: Some(3),
                ..Parameter::default()
            },
            extractor: ExtractorParameter::default(),
        }
    }

    #[test]
    fn test_act_records_extracted_state() {
        let mut driver = Driver::new(config(), KartReward::default()).unwrap();
        let frame = RgbImage::from_pixel(200, 150, Rgb([90, 90, 90]));
        driver.act(&frame).unwrap();
        let history = driver.agent().history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].0.to_string(), "(0, 0, 0, 0, 0)");
    }

    #[test]
    fn test_demo_driver_exploits_loaded_model() {
        let dir = tempfile::tempdir().unwrap();
        let model_file = dir.path().join("model.txt");
        std::fs::write(&model_file, "(0, 0, 0, 0, 0):[(0.0, 2), (-10.0, 1), (100.0, 5)]\n").unwrap();

        let mut config = config();
        config.agent.use_existing_model = true;
        config.agent.is_training = false;
        config.agent.explore_chance = 1.0;
        config.agent.model_file = model_file;
        let mut driver = Driver::new(config, KartReward::default()).unwrap();
        assert_eq!(driver.agent().mode(), Mode::Demo);
        assert_eq!(driver.agent().table().len(), 1);

        let frame = RgbImage::from_pixel(200, 150, Rgb([0, 0, 0]));
        for _ in 0..20 {
            assert_eq!(driver.act(&frame).unwrap(), KartAction::Throttle);
        }
        assert!(driver.agent().history().is_empty());
        assert_eq!(driver.agent().table().row(&ql::prelude::State::centered(5))[2], QEntry::new(100.0, 5));
    }

    #[test]
    fn test_model_arity_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let model_file = dir.path().join("model.txt");
        std::fs::write(&model_file, "(0, 0, 0):[(0.0, 0), (0.0, 0), (1.0, 1)]\n").unwrap();

        let mut config = config();
        config.agent.use_existing_model = true;
        config.agent.model_file = model_file;
        assert!(Driver::new(config, KartReward::default()).is_err());
    }

    #[test]
    fn test_invalid_extractor_is_rejected() {
        let mut config = config();
        config.extractor.center_margin = 0.0;
        assert!(Driver::new(config, KartReward::default()).is_err());
    }
}
