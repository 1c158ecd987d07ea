use std::path::PathBuf;

use anyhow::{bail, Context};
use image::{imageops, RgbImage};

/// Supplies one RGB frame per tick. `None` ends the run.
pub trait FrameSource {
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>>;
}

/// Recording area inside a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn crop(&self, frame: &RgbImage) -> RgbImage {
        imageops::crop_imm(frame, self.x, self.y, self.width, self.height).to_image()
    }
}

/// Frames read from image files, in file name order, optionally replayed several times
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    viewport: Option<Viewport>,
    rounds: usize,
    next: usize,
}

impl ImageSequence {
    pub fn from_glob(pattern: &str) -> anyhow::Result<Self> {
        let mut paths = glob::glob(pattern)
            .with_context(|| format!("invalid frame pattern '{}'", pattern))?
            .collect::<Result<Vec<_>, _>>()?;
        if paths.is_empty() {
            bail!("no frames match '{}'", pattern);
        }
        paths.sort();
        log::info!("{} frames found for '{}'", paths.len(), pattern);
        Ok(Self::new(paths))
    }

    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            viewport: None,
            rounds: 1,
            next: 0,
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len() * self.rounds
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        if self.next >= self.len() {
            return Ok(None);
        }
        let path = &self.paths[self.next % self.paths.len()];
        self.next += 1;
        let frame = image::open(path)
            .with_context(|| format!("reading frame {}", path.display()))?
            .to_rgb8();
        Ok(Some(match &self.viewport {
            Some(viewport) => viewport.crop(&frame),
            None => frame,
        }))
    }
}

/// Frames produced by any iterator, e.g. synthetic frames
pub struct FrameIter<I>(pub I);

impl<I: Iterator<Item = RgbImage>> FrameSource for FrameIter<I> {
    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        Ok(self.0.next())
    }
}
