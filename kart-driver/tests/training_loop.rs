use image::{Rgb, RgbImage};
use kart_driver::actuator::{EmulatorActuator, KeyEvent, KeyMapping};
use kart_driver::driver::{Driver, DriverConfig};
use kart_driver::frame_source::{FrameIter, ImageSequence};
use kart_driver::reward::KartReward;
use kart_driver::runner::Runner;
use ql::log::init_logging;
use ql::prelude::{Action, CreditAssignment, Mode, Offset, Parameter, State};

const WIDTH: u32 = 200;
const HEIGHT: u32 = 150;

/// Dark track with a bright stripe; the stripe position decides the extracted state
fn stripe_frame(from: u32, to: u32) -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, _| {
        if (from..to).contains(&x) {
            Rgb([240, 240, 240])
        } else {
            Rgb([10, 10, 10])
        }
    })
}

fn frames(n: usize) -> impl Iterator<Item = RgbImage> {
    (0..n).map(|i| match i % 3 {
        0 => stripe_frame(50, 150),
        1 => stripe_frame(25, 75),
        _ => stripe_frame(125, 175),
    })
}

fn actuator() -> EmulatorActuator<Vec<KeyEvent>> {
    EmulatorActuator::new(KeyMapping::for_emulator("mupen 64").unwrap(), vec![])
}

fn training_config(model_file: std::path::PathBuf, credit_assignment: CreditAssignment) -> DriverConfig {
    DriverConfig {
        agent: Parameter {
            use_existing_model: false,
            episode_length: 4,
            max_episodes: 6,
            explore_chance: 0.8,
            credit_assignment,
            model_file,
            rng_seed: Some(42),
            ..Parameter::default()
        },
        ..DriverConfig::default()
    }
}

#[test]
fn itest_training_finishes_and_model_reloads() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let model_file = dir.path().join("model.txt");

    let driver = Driver::new(
        training_config(model_file.clone(), CreditAssignment::TerminalDiscounted),
        KartReward::default(),
    )
    .unwrap();
    let mut runner = Runner::new(driver, FrameIter(frames(60)), actuator());
    let summary = runner.run().unwrap();

    assert_eq!(summary.ticks, 60);
    assert_eq!(summary.episodes, 6);
    assert_eq!(summary.mode, Mode::Demo);
    assert!(model_file.exists());

    let trained = runner.into_driver();
    assert!(!trained.agent().table().is_empty());
    assert_eq!(trained.agent().table().arity(), Some(5));

    let mut reload_config = training_config(model_file, CreditAssignment::TerminalDiscounted);
    reload_config.agent.use_existing_model = true;
    reload_config.agent.is_training = false;
    let mut demo = Driver::new(reload_config, KartReward::default()).unwrap();
    assert_eq!(demo.agent().table(), trained.agent().table());

    let frame = stripe_frame(25, 75);
    let state = State::new(vec![Offset::Left; 5]);
    let expected = trained.agent().table().best_action(&state);
    for _ in 0..10 {
        let action = demo.act(&frame).unwrap();
        assert_eq!(action.index(), expected);
    }
}

#[test]
fn itest_step_rewards_teach_steering_back_to_center() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut config = training_config(dir.path().join("model.txt"), CreditAssignment::PerStep);
    config.agent.explore_chance = 1.0;
    config.agent.explore_decay = 1.0;
    config.agent.max_episodes = 100;
    let driver = Driver::new(config, KartReward::default()).unwrap();
    let mut runner = Runner::new(driver, FrameIter(frames(300)), actuator());
    runner.run().unwrap();
    let driver = runner.into_driver();
    let table = driver.agent().table();

    // stripe on the left is off track to the left: right and throttle score, left is punished
    let left = State::new(vec![Offset::Left; 5]);
    let row = table.row(&left);
    assert_eq!(row[0].value, -100.0);
    assert_eq!(row[1].value, 100.0);
    assert_eq!(table.best_action(&left), 1);

    let right = State::new(vec![Offset::Right; 5]);
    assert_eq!(table.best_action(&right), 0);

    let centered = State::centered(5);
    assert_eq!(table.best_action(&centered), 2);
}

#[test]
fn itest_frames_from_files() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    for (i, frame) in frames(6).enumerate() {
        frame.save(dir.path().join(format!("frame_{:03}.png", i))).unwrap();
    }
    let sequence = ImageSequence::from_glob(&format!("{}/frame_*.png", dir.path().display()))
        .unwrap()
        .with_rounds(2);

    let config = DriverConfig {
        agent: Parameter {
            use_existing_model: false,
            is_training: false,
            ..Parameter::default()
        },
        ..DriverConfig::default()
    };
    let driver = Driver::new(config, KartReward::default()).unwrap();
    let mut runner = Runner::new(driver, sequence, actuator());
    let summary = runner.run().unwrap();

    // empty table in demo mode: the first action wins every tie
    assert_eq!(summary.ticks, 12);
    assert_eq!(summary.action_counts, [12, 0, 0]);
}
