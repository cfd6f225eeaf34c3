//! Simulated leaf and fruit disease models
//!
//! Each "model" is a fixed function of colour statistics taken from the
//! centre of a 150x150 thumbnail: a yellowing index for yellow leaf disease
//! and a dark-brown index for fruit rot.

use image::imageops::FilterType;
use image::RgbImage;
use serde::Serialize;

use super::DetectionType;

/// Thumbnail edge the models work on
pub const IMG_SIZE: u32 = 150;

const VALIDATION_CONFIDENCE: f64 = 75.0;
const VALIDATION_REASON: &str = "Image validation bypassed - user responsibility";

pub const YELLOW_LEAF_DISEASE: &str = "Yellow Leaf Disease";
pub const HEALTHY_LEAF: &str = "Healthy Leaf";
pub const FRUIT_ROT: &str = "Fruit Rot (Koleroga)";
pub const HEALTHY_FRUIT: &str = "Healthy Fruit";

/// Colour statistics of the centre 60 % of the thumbnail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColourStats {
    /// Mean R, G, B
    pub mean: [f64; 3],
    /// Standard deviation of R, G, B
    pub std: [f64; 3],
    pub brightness: f64,
    pub overall_std: f64,
    /// Mean absolute difference between neighbouring pixels
    pub texture: f64,
}

impl ColourStats {
    pub fn from_image(img: &RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let x0 = (width as f64 * 0.2) as u32;
        let x1 = ((width as f64 * 0.8) as u32).max(x0 + 1).min(width);
        let y0 = (height as f64 * 0.2) as u32;
        let y1 = ((height as f64 * 0.8) as u32).max(y0 + 1).min(height);

        let mut sum = [0.0f64; 3];
        let mut sum_sq = [0.0f64; 3];
        let mut diff_sum = 0.0;
        let mut diff_count = 0u64;

        for y in y0..y1 {
            for x in x0..x1 {
                let p = img.get_pixel(x, y).0;
                for c in 0..3 {
                    let v = p[c] as f64;
                    sum[c] += v;
                    sum_sq[c] += v * v;
                }
                if x + 1 < x1 {
                    diff_sum += channel_diff(p, img.get_pixel(x + 1, y).0);
                    diff_count += 3;
                }
                if y + 1 < y1 {
                    diff_sum += channel_diff(p, img.get_pixel(x, y + 1).0);
                    diff_count += 3;
                }
            }
        }

        let n = ((x1 - x0) * (y1 - y0)) as f64;
        let mean = sum.map(|s| s / n);
        let mut std = [0.0; 3];
        for c in 0..3 {
            std[c] = (sum_sq[c] / n - mean[c] * mean[c]).max(0.0).sqrt();
        }

        let brightness = mean.iter().sum::<f64>() / 3.0;
        let overall_var = (0..3)
            .map(|c| sum_sq[c] / n)
            .sum::<f64>()
            / 3.0
            - brightness * brightness;

        Self {
            mean,
            std,
            brightness,
            overall_std: overall_var.max(0.0).sqrt(),
            texture: if diff_count > 0 { diff_sum / diff_count as f64 } else { 0.0 },
        }
    }

    /// How far the region has moved from green towards yellow, 0..1
    pub fn yellowing_index(&self) -> f64 {
        let [r, g, b] = self.mean;
        let warm = (((r + g) / 2.0 - b) / 128.0).clamp(0.0, 1.0);
        let red_green_balance = (1.0 - (g - r).abs() / 80.0).clamp(0.0, 1.0);
        warm * red_green_balance
    }

    /// Dark brown, lesion-like colouring, 0..1
    pub fn rot_index(&self) -> f64 {
        let [r, g, b] = self.mean;
        let brownness = if r >= g && g >= b {
            ((r - b) / 100.0).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let darkness = ((160.0 - self.brightness) / 120.0).clamp(0.0, 1.0);
        brownness * darkness
    }

    fn texture_factor(&self) -> f64 {
        (self.texture / 40.0).clamp(0.0, 1.0)
    }
}

fn channel_diff(a: [u8; 3], b: [u8; 3]) -> f64 {
    (0..3).map(|c| (a[c] as f64 - b[c] as f64).abs()).sum()
}

/// Infection probability from an index, clamped to [0.01, 0.99]
fn probability(index: f64, texture: f64) -> f64 {
    (0.1 + 0.85 * index + 0.05 * texture).clamp(0.01, 0.99)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PredictionStatus {
    Infected,
    Healthy,
}

/// Output of one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub disease: &'static str,
    pub confidence: f64,
    pub status: PredictionStatus,
}

impl Prediction {
    fn from_probability(prob: f64, infected: &'static str, healthy: &'static str) -> Self {
        if prob > 0.5 {
            Self {
                disease: infected,
                confidence: round2(prob * 100.0),
                status: PredictionStatus::Infected,
            }
        } else {
            Self {
                disease: healthy,
                confidence: round2((1.0 - prob) * 100.0),
                status: PredictionStatus::Healthy,
            }
        }
    }

    pub fn is_infected(&self) -> bool {
        self.status == PredictionStatus::Infected
    }
}

/// Content check result. The check is disabled, so it always passes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub confidence: f64,
    pub reason: &'static str,
}

impl Validation {
    fn bypassed() -> Self {
        Self {
            is_valid: true,
            confidence: VALIDATION_CONFIDENCE,
            reason: VALIDATION_REASON,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub validation: Validation,
    pub stats: ColourStats,
    pub yellow_leaf: Option<Prediction>,
    pub fruit_rot: Option<Prediction>,
}

impl Analysis {
    pub fn predictions(&self) -> impl Iterator<Item = &Prediction> {
        self.yellow_leaf.iter().chain(self.fruit_rot.iter())
    }

    /// Most confident infection, else `Healthy` at the best confidence
    /// among the predictions and the content check
    pub fn primary(&self) -> (String, f64) {
        let infected = self
            .predictions()
            .filter(|p| p.is_infected())
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

        match infected {
            Some(p) => (p.disease.to_string(), p.confidence),
            None => {
                let confidence = self
                    .predictions()
                    .map(|p| p.confidence)
                    .fold(self.validation.confidence, f64::max);
                (crate::models::detection::HEALTHY.to_string(), confidence)
            }
        }
    }
}

/// Run the models selected by `detection_type` on an already decoded thumbnail
pub fn analyze_rgb(img: &RgbImage, detection_type: DetectionType) -> Analysis {
    let stats = ColourStats::from_image(img);
    let texture = stats.texture_factor();

    let yellow_leaf = detection_type.includes_leaf().then(|| {
        Prediction::from_probability(
            probability(stats.yellowing_index(), texture),
            YELLOW_LEAF_DISEASE,
            HEALTHY_LEAF,
        )
    });
    let fruit_rot = detection_type.includes_fruit().then(|| {
        Prediction::from_probability(probability(stats.rot_index(), texture), FRUIT_ROT, HEALTHY_FRUIT)
    });

    Analysis {
        validation: Validation::bypassed(),
        stats,
        yellow_leaf,
        fruit_rot,
    }
}

/// Decode image bytes and analyze them
pub fn analyze(bytes: &[u8], detection_type: DetectionType) -> Result<Analysis, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let thumb = img.resize_exact(IMG_SIZE, IMG_SIZE, FilterType::Triangle).to_rgb8();
    Ok(analyze_rgb(&thumb, detection_type))
}
