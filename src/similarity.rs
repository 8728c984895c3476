//! Lightweight frame similarity measures over grayscale buffers.
//!
//! [`score`] is a normalized cross-correlation used as a cheap proxy for
//! perceptual similarity. It is not a structural-similarity index.

use crate::{NowcastError, NowcastResult};

pub const SCORE_EPSILON: f64 = 1e-6;

fn check_lengths(a: &[u8], b: &[u8]) -> NowcastResult<usize> {
    if a.len() != b.len() {
        return Err(NowcastError::validation(
            "similarity expects equal-length buffers",
        ));
    }
    if a.is_empty() {
        return Err(NowcastError::validation(
            "similarity expects non-empty buffers",
        ));
    }
    Ok(a.len())
}

/// Normalized cross-correlation, roughly in `[-1, 1]`.
///
/// Uniform inputs have zero variance and score `0` instead of dividing by
/// zero.
pub fn score(a: &[u8], b: &[u8]) -> NowcastResult<f64> {
    let n = check_lengths(a, b)? as f64;

    let (sum_a, sum_b) = a
        .iter()
        .zip(b)
        .fold((0.0f64, 0.0f64), |(sa, sb), (&x, &y)| {
            (sa + f64::from(x), sb + f64::from(y))
        });
    let mu_a = sum_a / n;
    let mu_b = sum_b / n;

    let mut num = 0.0f64;
    let mut den_a = 0.0f64;
    let mut den_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let da = f64::from(x) - mu_a;
        let db = f64::from(y) - mu_b;
        num += da * db;
        den_a += da * da;
        den_b += db * db;
    }

    Ok(num / ((den_a * den_b).sqrt() + SCORE_EPSILON))
}

/// Mean squared error between two buffers, in squared 8-bit units.
pub fn mse(a: &[u8], b: &[u8]) -> NowcastResult<f64> {
    let n = check_lengths(a, b)? as f64;
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum();
    Ok(sum / n)
}
