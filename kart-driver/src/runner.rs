use std::io::BufRead;
use std::ops::Add;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use num_format::ToFormattedString;
use ql::prelude::{Action, Mode};

use crate::action::KartAction;
use crate::actuator::Actuator;
use crate::driver::Driver;
use crate::frame_source::FrameSource;
use crate::util::number_format;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Acted(KartAction),
    Paused,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: usize,
    pub paused_ticks: usize,
    /// Per action, in table order
    pub action_counts: [usize; 3],
    pub episodes: usize,
    pub mode: Mode,
}

/// Tick scheduler: one frame in, one action out, at a fixed rate
pub struct Runner<F: FrameSource, A: Actuator> {
    driver: Driver,
    frames: F,
    actuator: A,
    tick_duration: Duration,
    paused: Arc<AtomicBool>,
    status_every: usize,
}

impl<F: FrameSource, A: Actuator> Runner<F, A> {
    pub fn new(driver: Driver, frames: F, actuator: A) -> Self {
        Self {
            driver,
            frames,
            actuator,
            tick_duration: Duration::ZERO,
            paused: Arc::new(AtomicBool::new(false)),
            status_every: 1000,
        }
    }

    /// Ticks per second; 0 runs as fast as frames arrive
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.tick_duration = match fps {
            0 => Duration::ZERO,
            fps => Duration::from_secs(1) / fps,
        };
        self
    }

    pub fn with_status_every(mut self, ticks: usize) -> Self {
        self.status_every = ticks.max(1);
        self
    }

    /// While set, frames are consumed without acting
    pub fn pause_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.paused)
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn into_driver(self) -> Driver {
        self.driver
    }

    pub fn tick(&mut self) -> anyhow::Result<TickOutcome> {
        let Some(frame) = self.frames.next_frame()? else {
            return Ok(TickOutcome::Exhausted);
        };
        if self.paused.load(Relaxed) {
            return Ok(TickOutcome::Paused);
        }
        let action = self.driver.act(&frame)?;
        self.actuator.actuate(&[action.name()])?;
        Ok(TickOutcome::Acted(action))
    }

    pub fn run(&mut self) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary {
            ticks: 0,
            paused_ticks: 0,
            action_counts: [0; 3],
            episodes: 0,
            mode: self.driver.agent().mode(),
        };
        log::info!("run started in {} mode", summary.mode);

        let mut next_tick_time = Instant::now();
        loop {
            let now = Instant::now();
            if now < next_tick_time {
                thread::sleep(next_tick_time - now);
            }
            next_tick_time = next_tick_time.add(self.tick_duration);

            match self.tick()? {
                TickOutcome::Exhausted => break,
                TickOutcome::Paused => summary.paused_ticks += 1,
                TickOutcome::Acted(action) => summary.action_counts[action.index()] += 1,
            }
            summary.ticks += 1;

            let mode = self.driver.agent().mode();
            if mode != summary.mode {
                log::info!("switched from {} to {} mode", summary.mode, mode);
                summary.mode = mode;
            }
            if summary.ticks % self.status_every == 0 {
                log::info!(
                    "tick {}: {}",
                    summary.ticks.to_formatted_string(&number_format()),
                    self.driver.snapshot()
                );
            }
        }

        summary.episodes = self.driver.agent().episode();
        log::info!(
            "run finished after {} ticks, {} episodes",
            summary.ticks.to_formatted_string(&number_format()),
            summary.episodes.to_formatted_string(&number_format())
        );
        Ok(summary)
    }
}

/// Flips `paused` on every line read from `input` until it ends. Meant for a thread reading stdin.
pub fn toggle_pause_on_lines<R: BufRead>(input: R, paused: Arc<AtomicBool>) {
    for line in input.lines() {
        if line.is_err() {
            break;
        }
        let was_paused = paused.fetch_xor(true, Relaxed);
        log::info!("{}", if was_paused { "resumed" } else { "paused" });
    }
}
