//! Cosine similarity between embedding vectors.

use nc_core::{Error, Result};

/// Slack allowed above 1.0 (or below -1.0) before a score counts as anomalous.
/// Normalized vectors routinely land a few ULPs past the bound.
pub const ROUNDING_TOLERANCE: f32 = 1e-5;

/// `dot(a, b) / (|a| * |b|)`, or 0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch { left: a.len(), right: b.len() });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// A score that had to be forced back into [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampedScore {
    pub raw: f32,
    pub clamped: f32,
}

/// Clamp a score into [-1, 1]. Returns the usable score plus, when the raw value
/// was NaN or beyond the rounding tolerance, the anomaly to report.
pub fn clamp_score(score: f32) -> (f32, Option<ClampedScore>) {
    if score.is_nan() {
        return (0.0, Some(ClampedScore { raw: score, clamped: 0.0 }));
    }
    let clamped = score.clamp(-1.0, 1.0);
    if (score - clamped).abs() > ROUNDING_TOLERANCE {
        (clamped, Some(ClampedScore { raw: score, clamped }))
    } else {
        (clamped, None)
    }
}
