use std::path::PathBuf;
use std::{io, thread};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use kart_driver::action::KartAction;
use kart_driver::actuator::{EmulatorActuator, KeyMapping, LogKeySink};
use kart_driver::driver::{Driver, DriverConfig};
use kart_driver::frame_source::{ImageSequence, Viewport};
use kart_driver::perception::ExtractorParameter;
use kart_driver::reward::KartReward;
use kart_driver::runner::{toggle_pause_on_lines, Runner};
use ql::log::init_logging;
use ql::prelude::{CreditAssignment, Parameter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CreditArg {
    Terminal,
    PerStep,
}

impl From<CreditArg> for CreditAssignment {
    fn from(value: CreditArg) -> Self {
        match value {
            CreditArg::Terminal => CreditAssignment::TerminalDiscounted,
            CreditArg::PerStep => CreditAssignment::PerStep,
        }
    }
}

/// Drives a racing game from captured frames with a tabular Q-learning agent
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Glob pattern of the frame images, replayed in file name order
    frames: String,
    /// How often the frame sequence is replayed
    #[arg(long, default_value_t = 1)]
    rounds: usize,
    /// Recording area inside each frame: x,y,width,height
    #[arg(long, value_parser = parse_viewport)]
    viewport: Option<Viewport>,
    #[arg(long, default_value = "model.txt")]
    model_file: PathBuf,
    /// Start with an empty table instead of reading the model file
    #[arg(long)]
    fresh: bool,
    /// Only exploit the table, never explore or learn
    #[arg(long)]
    demo: bool,
    #[arg(long, default_value_t = 10)]
    episode_length: usize,
    #[arg(long, default_value_t = 10000)]
    max_episodes: usize,
    #[arg(long, default_value_t = 0.5)]
    explore_chance: f64,
    #[arg(long, default_value_t = 0.9)]
    explore_decay: f64,
    #[arg(long, default_value_t = 0.01)]
    explore_min: f64,
    #[arg(long, default_value_t = 0.9)]
    reward_discount: f64,
    #[arg(long, value_enum, default_value_t = CreditArg::Terminal)]
    credit_assignment: CreditArg,
    #[arg(long, default_value_t = 5)]
    n_features: usize,
    #[arg(long, default_value_t = 0.05)]
    center_margin: f64,
    #[arg(long, default_value = "mupen 64")]
    emulator: String,
    /// Ticks per second, 0 for unthrottled
    #[arg(long, default_value_t = 30)]
    fps: u32,
    #[arg(long)]
    seed: Option<u64>,
    /// Save the table after the run when it changed since the last save, also after a failed run
    #[arg(long)]
    save_on_exit: bool,
    /// Do not read stdin; by default every entered line toggles pause
    #[arg(long)]
    no_pause_input: bool,
}

impl Cli {
    fn config(&self) -> DriverConfig {
        DriverConfig {
            agent: Parameter {
                use_existing_model: !self.fresh,
                is_training: !self.demo,
                episode_length: self.episode_length,
                max_episodes: self.max_episodes,
                explore_chance: self.explore_chance,
                explore_decay: self.explore_decay,
                explore_min: self.explore_min,
                reward_discount: self.reward_discount,
                credit_assignment: self.credit_assignment.into(),
                model_file: self.model_file.clone(),
                rng_seed: self.seed,
            },
            extractor: ExtractorParameter {
                n_features: self.n_features,
                center_margin: self.center_margin,
                ..ExtractorParameter::default()
            },
        }
    }
}

fn parse_viewport(s: &str) -> Result<Viewport, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>().map_err(|e| format!("'{}': {}", p, e)))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        &[x, y, width, height] => Ok(Viewport { x, y, width, height }),
        _ => Err("expected x,y,width,height".to_string()),
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut frames = ImageSequence::from_glob(&cli.frames)?.with_rounds(cli.rounds);
    if let Some(viewport) = cli.viewport {
        frames = frames.with_viewport(viewport);
    }
    let actuator = EmulatorActuator::new(KeyMapping::for_emulator(&cli.emulator)?, LogKeySink);
    let driver = Driver::new(cli.config(), KartReward::default())?;

    let mut runner = Runner::new(driver, frames, actuator).with_fps(cli.fps);
    if !cli.no_pause_input {
        let paused = runner.pause_handle();
        thread::spawn(move || toggle_pause_on_lines(io::stdin().lock(), paused));
        log::info!("press enter to pause or resume");
    }
    let outcome = runner.run();

    let mut driver = runner.into_driver();
    if cli.save_on_exit && driver.agent().has_unsaved_changes() {
        driver.agent_mut().save().context("saving model on exit")?;
    }
    let summary = outcome?;
    let counts = KartAction::ALL
        .iter()
        .zip(summary.action_counts)
        .map(|(action, count)| format!("{} {}", action, count))
        .collect::<Vec<_>>();
    log::info!("actions: {}; paused ticks {}", counts.join(", "), summary.paused_ticks);
    println!("{}", driver.snapshot());
    Ok(())
}
