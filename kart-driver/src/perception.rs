//! State aggregation: frame -> luminance -> downscale -> edge mask -> [State].
//!
//! A handful of rows in the lower half of the (downscaled) frame are sampled. The mean column of
//! the edge pixels in each row is compared against a band around the frame center.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use ql::prelude::{Offset, State};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorParameter {
    /// Number of sampled rows = length of the state
    pub n_features: usize,
    /// Half width of the centered band as a fraction of the frame width
    pub center_margin: f64,
    /// Integer downscale factor applied before edge detection
    pub downscale: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Fraction of the frame height at the bottom never sampled (HUD, minimap)
    pub hud_exclusion: f64,
}

impl Default for ExtractorParameter {
    fn default() -> Self {
        Self {
            n_features: 5,
            center_margin: 0.05,
            downscale: 5,
            canny_low: 150.0,
            canny_high: 200.0,
            hud_exclusion: 0.1,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ExtractorError {
    #[error("n_features must be > 0")]
    NoFeatures,
    #[error("center_margin must be in (0, 0.5), got {0}")]
    CenterMargin(f64),
    #[error("downscale factor must be > 0")]
    Downscale,
    #[error("canny thresholds must satisfy 0 <= low <= high, got {low}/{high}")]
    Thresholds { low: f32, high: f32 },
    #[error("hud_exclusion must be in [0, 0.5), got {0}")]
    HudExclusion(f64),
}

impl ExtractorParameter {
    pub fn validate(&self) -> Result<(), ExtractorError> {
        if self.n_features == 0 {
            return Err(ExtractorError::NoFeatures);
        }
        if !(self.center_margin > 0.0 && self.center_margin < 0.5) {
            return Err(ExtractorError::CenterMargin(self.center_margin));
        }
        if self.downscale == 0 {
            return Err(ExtractorError::Downscale);
        }
        if !(self.canny_low >= 0.0 && self.canny_low <= self.canny_high) {
            return Err(ExtractorError::Thresholds {
                low: self.canny_low,
                high: self.canny_high,
            });
        }
        if !(self.hud_exclusion >= 0.0 && self.hud_exclusion < 0.5) {
            return Err(ExtractorError::HudExclusion(self.hud_exclusion));
        }
        Ok(())
    }
}

/// Maps `frame` to a state of exactly `param.n_features` offsets.
///
/// Pure function of its inputs. Rows without any edge pixel count as centered, so a frame
/// without edges yields the all-centered state.
pub fn extract(frame: &RgbImage, param: &ExtractorParameter) -> State {
    if frame.width() == 0 || frame.height() == 0 {
        return State::centered(param.n_features);
    }
    let edges = edge_mask(frame, param);
    let (width, height) = edges.dimensions();
    let center = (width / 2) as f64;
    let band = param.center_margin * width as f64;

    sample_rows(height, param.n_features, param.hud_exclusion)
        .into_iter()
        .map(|y| {
            let mean = mean_edge_column(&edges, y).unwrap_or(center);
            classify(mean, center, band)
        })
        .collect()
}

/// Binary edge mask (255 = edge) of the downscaled luminance image
pub fn edge_mask(frame: &RgbImage, param: &ExtractorParameter) -> GrayImage {
    let gray = imageops::grayscale(frame);
    let (width, height) = gray.dimensions();
    let small = imageops::resize(
        &gray,
        (width / param.downscale).max(1),
        (height / param.downscale).max(1),
        FilterType::Triangle,
    );
    canny(&small, param.canny_low, param.canny_high)
}

/// `n` evenly spaced rows from the middle of the frame down to the HUD band.
///
/// Spacing is `(height - hud) / 2 / n`, at least one row. Rows running past the bottom are
/// clamped to the last row, so exactly `n` rows come back for any height.
pub fn sample_rows(height: u32, n: usize, hud_exclusion: f64) -> Vec<u32> {
    if n == 0 || height == 0 {
        return vec![];
    }
    let h = height as usize;
    let start = h / 2;
    let end = h - (h as f64 * hud_exclusion) as usize;
    let step = (end / 2 / n).max(1);
    (0..n)
        .map(|i| (start + i * step).min(h - 1) as u32)
        .collect()
}

fn mean_edge_column(edges: &GrayImage, y: u32) -> Option<f64> {
    let (sum, count) = (0..edges.width())
        .filter(|&x| edges.get_pixel(x, y)[0] > 0)
        .fold((0u64, 0u64), |(sum, count), x| (sum + x as u64, count + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}

fn classify(mean: f64, center: f64, band: f64) -> Offset {
    if mean < center - band {
        Offset::Left
    } else if mean > center + band {
        Offset::Right
    } else {
        Offset::Center
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;
    use rstest::rstest;

    use super::*;

    const WIDTH: u32 = 200;
    const HEIGHT: u32 = 150;

    fn uniform(value: u8) -> RgbImage {
        RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([value, value, value]))
    }

    /// Dark frame with a bright vertical stripe covering columns `from..to`
    fn stripe(from: u32, to: u32) -> RgbImage {
        RgbImage::from_fn(WIDTH, HEIGHT, |x, _| {
            if (from..to).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    fn noise(seed: u32) -> RgbImage {
        let mut v = seed;
        RgbImage::from_fn(WIDTH, HEIGHT, |_, _| {
            v = v.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let b = (v >> 24) as u8;
            Rgb([b, b.wrapping_mul(3), b.wrapping_add(91)])
        })
    }

    fn param(n_features: usize) -> ExtractorParameter {
        ExtractorParameter {
            n_features,
            ..ExtractorParameter::default()
        }
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(5)]
    #[case(7)]
    fn test_edge_free_frame_is_centered(#[case] n_features: usize) {
        assert_eq!(extract(&uniform(128), &param(n_features)), State::centered(n_features));
    }

    #[rstest]
    #[case(1, 11)]
    #[case(5, 12)]
    #[case(7, 13)]
    fn test_length_and_determinism(#[case] n_features: usize, #[case] seed: u32) {
        let frame = noise(seed);
        let first = extract(&frame, &param(n_features));
        assert_eq!(first.len(), n_features);
        assert!(first.values().all(|v| (-1..=1).contains(&v)));
        for _ in 0..3 {
            assert_eq!(extract(&frame, &param(n_features)), first);
        }
    }

    #[rstest]
    #[case(25, 75, Offset::Left)]
    #[case(50, 150, Offset::Center)]
    #[case(125, 175, Offset::Right)]
    fn test_stripe_position(#[case] from: u32, #[case] to: u32, #[case] expected: Offset) {
        let state = extract(&stripe(from, to), &param(5));
        assert_eq!(state, State::new(vec![expected; 5]));
    }

    #[test]
    fn test_tiny_and_empty_frames() {
        assert_eq!(extract(&RgbImage::new(0, 0), &param(4)), State::centered(4));
        assert_eq!(extract(&RgbImage::new(3, 2), &param(4)).len(), 4);
    }

    #[rstest]
    // 30 rows: start 15, end 27, spacing 2 -> 15, 17, .., 25 truncated to 5 rows
    #[case(30, 5, vec![15, 17, 19, 21, 23])]
    // 136 rows: start 68, end 123, spacing 12
    #[case(136, 5, vec![68, 80, 92, 104, 116])]
    #[case(10, 3, vec![5, 6, 7])]
    #[case(1, 2, vec![0, 0])]
    fn test_sample_rows(#[case] height: u32, #[case] n: usize, #[case] expected: Vec<u32>) {
        assert_eq!(sample_rows(height, n, 0.1), expected);
    }

    #[rstest]
    #[case(17.9, Offset::Left)]
    #[case(18.0, Offset::Center)]
    #[case(22.0, Offset::Center)]
    #[case(22.1, Offset::Right)]
    fn test_classify(#[case] mean: f64, #[case] expected: Offset) {
        assert_eq!(classify(mean, 20.0, 2.0), expected);
    }

    #[rstest]
    #[case(ExtractorParameter { n_features: 0, ..ExtractorParameter::default() }, ExtractorError::NoFeatures)]
    #[case(ExtractorParameter { center_margin: 0.5, ..ExtractorParameter::default() }, ExtractorError::CenterMargin(0.5))]
    #[case(ExtractorParameter { downscale: 0, ..ExtractorParameter::default() }, ExtractorError::Downscale)]
    #[case(ExtractorParameter { canny_low: 250.0, ..ExtractorParameter::default() }, ExtractorError::Thresholds { low: 250.0, high: 200.0 })]
    fn test_validate(#[case] param: ExtractorParameter, #[case] expected: ExtractorError) {
        assert_eq!(param.validate(), Err(expected));
    }
}
