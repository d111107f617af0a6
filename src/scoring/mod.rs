/// In-process GAR scoring engine.
///
/// Scoring is deliberately self-contained: given the same bytes, sport, and
/// MODEL_VERSION the returned Scorecard is bit-identical, which is what makes
/// golden regression tests and idempotent result writes possible. The pipeline
/// is frame sampling -> per-frame metric aggregation -> sport-weighted
/// composite -> clamp to [0, 100].
pub mod features;

use crate::error::{AppError, Result};
use features::{sample_frames, FrameMetrics};
use serde::{Deserialize, Serialize};

/// Stamped into every Scorecard; bump when any formula or weight changes.
pub const MODEL_VERSION: &str = "gar-2026.2";

const MIN_FRAMES: usize = 8;
const CONFIDENCE_FLOOR: f64 = 0.6;
const RECOMMENDATION_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub overall: f64,
    pub technical: f64,
    pub physical: f64,
    pub tactical: f64,
    pub mental: f64,
    pub low_confidence: bool,
    pub feedback: String,
    pub recommendations: Vec<String>,
    pub model_version: String,
}

pub struct ScoreEngine {
    min_frames: usize,
}

impl Default for ScoreEngine {
    fn default() -> Self {
        Self {
            min_frames: MIN_FRAMES,
        }
    }
}

impl ScoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score a video. `Decode` and `InsufficientContent` are terminal for the
    /// job; everything else about the input maps to some score in [0, 100].
    pub fn score(&self, bytes: &[u8], sport: &str) -> Result<Scorecard> {
        let kind = infer::get(bytes)
            .ok_or_else(|| AppError::Decode("unrecognized container".to_string()))?;
        if kind.matcher_type() != infer::MatcherType::Video {
            return Err(AppError::Decode(format!(
                "not a video container: {}",
                kind.mime_type()
            )));
        }

        let frames = sample_frames(bytes);
        if frames.len() < self.min_frames {
            return Err(AppError::InsufficientContent {
                frames: frames.len(),
                min: self.min_frames,
            });
        }

        let agg = Aggregates::from_frames(&frames);

        let technical = round1(clamp(100.0 * (0.55 * agg.entropy + 0.45 * agg.consistency)));
        let physical = round1(clamp(100.0 * (0.65 * agg.motion + 0.35 * agg.energy)));
        let tactical = round1(clamp(100.0 * (0.50 * agg.tempo + 0.50 * agg.entropy)));
        let mental = round1(clamp(100.0 * (0.70 * agg.consistency + 0.30 * agg.tempo)));

        let weights = weights_for(sport);
        let overall = round1(clamp(
            weights[0] * technical + weights[1] * physical + weights[2] * tactical
                + weights[3] * mental,
        ));

        let low_confidence = agg.coverage < CONFIDENCE_FLOOR;
        let recommendations = recommendations(sport, technical, physical, tactical, mental);
        let feedback = feedback(sport, overall, low_confidence);

        Ok(Scorecard {
            overall,
            technical,
            physical,
            tactical,
            mental,
            low_confidence,
            feedback,
            recommendations,
            model_version: MODEL_VERSION.to_string(),
        })
    }
}

struct Aggregates {
    energy: f64,
    entropy: f64,
    /// Average inter-frame motion, scaled so typical footage spreads the range.
    motion: f64,
    /// 1 minus the spread of motion across frames.
    consistency: f64,
    /// Fraction of frames with above-average motion.
    tempo: f64,
    /// Fraction of frames carrying enough signal to trust.
    coverage: f64,
}

impl Aggregates {
    fn from_frames(frames: &[FrameMetrics]) -> Self {
        let n = frames.len() as f64;
        let energy = frames.iter().map(|f| f.energy).sum::<f64>() / n;
        let entropy = frames.iter().map(|f| f.entropy).sum::<f64>() / n;
        let mean_motion = frames.iter().map(|f| f.motion).sum::<f64>() / n;

        let motion_var = frames
            .iter()
            .map(|f| (f.motion - mean_motion).powi(2))
            .sum::<f64>()
            / n;
        let consistency = (1.0 - motion_var.sqrt() * 80.0).max(0.0);

        let above = frames.iter().filter(|f| f.motion > mean_motion).count() as f64;
        let tempo = above / n;

        let covered = frames.iter().filter(|f| f.entropy > 0.2).count() as f64;
        let coverage = covered / n;

        Self {
            energy,
            entropy,
            motion: (mean_motion * 40.0).min(1.0),
            consistency,
            tempo,
            coverage,
        }
    }
}

/// Per-sport blend of the four dimensions; rows sum to 1.
fn weights_for(sport: &str) -> [f64; 4] {
    // [technical, physical, tactical, mental]
    match sport.to_ascii_lowercase().as_str() {
        "basketball" => [0.30, 0.30, 0.25, 0.15],
        "soccer" => [0.30, 0.25, 0.30, 0.15],
        "football" => [0.25, 0.40, 0.20, 0.15],
        "tennis" => [0.35, 0.25, 0.20, 0.20],
        _ => [0.25, 0.25, 0.25, 0.25],
    }
}

fn recommendations(
    sport: &str,
    technical: f64,
    physical: f64,
    tactical: f64,
    mental: f64,
) -> Vec<String> {
    let mut out = Vec::new();
    if technical < RECOMMENDATION_THRESHOLD {
        out.push(format!("Focus on {}-specific technique drills", sport));
    }
    if physical < RECOMMENDATION_THRESHOLD {
        out.push("Improve power and speed through conditioning work".to_string());
    }
    if tactical < RECOMMENDATION_THRESHOLD {
        out.push("Work on tactical awareness and positioning".to_string());
    }
    if mental < RECOMMENDATION_THRESHOLD {
        out.push("Build consistency with repeatable practice routines".to_string());
    }
    if out.is_empty() {
        out.push("Excellent fundamentals. Keep training at your current level".to_string());
    }
    out
}

fn feedback(sport: &str, overall: f64, low_confidence: bool) -> String {
    let mut text = if overall >= 80.0 {
        format!(
            "Elite-level {} performance. An overall GAR of {:.1} puts this clip in the top band.",
            sport, overall
        )
    } else if overall >= 60.0 {
        format!(
            "Solid {} performance with an overall GAR of {:.1}. Clear potential with targeted work.",
            sport, overall
        )
    } else {
        format!(
            "Developing {} performance at an overall GAR of {:.1}. Focus on the fundamentals below.",
            sport, overall
        )
    };
    if low_confidence {
        text.push_str(" Sample quality limited confidence in this read.");
    }
    text
}

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

fn round1(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::features::FRAME_SIZE;
    use super::*;

    // Minimal mp4: size box + "ftyp" + "isom" brand, then a seeded payload.
    fn synthetic_mp4(payload_frames: usize, seed: u64) -> Vec<u8> {
        let mut bytes = vec![
            0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm',
        ];
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        for _ in 0..payload_frames * FRAME_SIZE {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            bytes.push((state >> 33) as u8);
        }
        bytes
    }

    #[test]
    fn scoring_is_deterministic() {
        let engine = ScoreEngine::new();
        let video = synthetic_mp4(32, 42);

        let first = engine.score(&video, "basketball").unwrap();
        let second = engine.score(&video, "basketball").unwrap();
        assert_eq!(first, second);

        // Serialized form must match too, it is what lands in the database.
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn different_bytes_may_differ_but_stay_bounded() {
        let engine = ScoreEngine::new();
        for seed in [1, 7, 99, 12345] {
            let card = engine.score(&synthetic_mp4(16, seed), "soccer").unwrap();
            for score in [
                card.overall,
                card.technical,
                card.physical,
                card.tactical,
                card.mental,
            ] {
                assert!((0.0..=100.0).contains(&score), "out of range: {}", score);
            }
            assert_eq!(card.model_version, MODEL_VERSION);
            assert!(!card.recommendations.is_empty());
        }
    }

    #[test]
    fn non_video_bytes_fail_decode() {
        let engine = ScoreEngine::new();
        let err = engine.score(b"just some text, not a video", "tennis");
        assert!(matches!(err, Err(AppError::Decode(_))));
    }

    #[test]
    fn short_video_is_insufficient_content() {
        let engine = ScoreEngine::new();
        let err = engine.score(&synthetic_mp4(2, 5), "tennis");
        assert!(matches!(
            err,
            Err(AppError::InsufficientContent { frames: _, min: MIN_FRAMES })
        ));
    }

    #[test]
    fn degenerate_footage_is_flagged_low_confidence() {
        let engine = ScoreEngine::new();
        // Constant bytes: zero entropy everywhere, so no frame clears the
        // coverage floor.
        let mut video = vec![
            0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm',
        ];
        video.extend(std::iter::repeat(128u8).take(FRAME_SIZE * 12));

        let card = engine.score(&video, "basketball").unwrap();
        assert!(card.low_confidence);
        // Flat signal scores poorly on three of four dimensions.
        assert!(card
            .recommendations
            .iter()
            .any(|r| r.contains("technique drills")));
        assert!(card
            .recommendations
            .iter()
            .any(|r| r.contains("conditioning")));
    }

    #[test]
    fn sport_weights_sum_to_one() {
        for sport in ["basketball", "soccer", "football", "tennis", "curling"] {
            let sum: f64 = weights_for(sport).iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "{} weights sum to {}", sport, sum);
        }
    }

    #[test]
    fn unknown_sport_uses_flat_weights() {
        assert_eq!(weights_for("underwater-hockey"), [0.25, 0.25, 0.25, 0.25]);
    }
}
