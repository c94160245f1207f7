// Temperature-scaled categorical sampling.
//
// Given model probabilities p and temperature τ, the draw is from
// softmax(log(p) / τ), which is p^(1/τ) renormalized. Low τ sharpens toward
// the most likely token, τ = 1 leaves p unchanged, high τ flattens toward
// uniform.
//
// Zero (or negative, or NaN) entries get zero weight: log(0) = -inf would
// otherwise turn the normalization into inf/inf. The exponent is taken
// relative to the largest log-probability so tiny temperatures do not
// underflow every weight to zero.

use crate::error::{MelodyError, Result};
use rand::Rng;

/// Reweight `probabilities` for temperature `temperature`. The result sums
/// to 1; entries that were not positive and finite stay at 0.
pub fn apply_temperature(probabilities: &[f64], temperature: f64) -> Result<Vec<f64>> {
    if !(temperature > 0.0 && temperature.is_finite()) {
        return Err(MelodyError::InvalidTemperature(temperature));
    }

    let scaled: Vec<Option<f64>> = probabilities
        .iter()
        .map(|&p| (p > 0.0 && p.is_finite()).then(|| p.ln() / temperature))
        .collect();

    let max = scaled
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return Err(MelodyError::DegenerateDistribution);
    }

    let weights: Vec<f64> = scaled
        .iter()
        .map(|s| s.map_or(0.0, |v| (v - max).exp()))
        .collect();
    // The maximum contributes exp(0) = 1, so the total is at least 1.
    let total: f64 = weights.iter().sum();
    Ok(weights.into_iter().map(|w| w / total).collect())
}

/// Draw an index from a normalized weight vector using a uniform value in
/// [0, 1).
pub fn sample_index(weights: &[f64], rng_val: f64) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    let target = rng_val * total;
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = Some(i);
        if cumulative > target {
            return Some(i);
        }
    }
    // Rounding can leave the cumulative sum a hair below the target.
    last_positive
}

/// Sample a token id from `probabilities` at `temperature`.
pub fn sample_with_temperature(
    probabilities: &[f64],
    temperature: f64,
    rng: &mut impl Rng,
) -> Result<usize> {
    let weights = apply_temperature(probabilities, temperature)?;
    let rng_val: f64 = rng.random();
    sample_index(&weights, rng_val).ok_or(MelodyError::DegenerateDistribution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_temperature_one_is_identity() {
        let p = [0.1, 0.2, 0.7];
        let w = apply_temperature(&p, 1.0).unwrap();
        for (a, b) in p.iter().zip(&w) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_low_temperature_selects_argmax() {
        let p = [0.05, 0.3, 0.25, 0.4];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            assert_eq!(sample_with_temperature(&p, 0.01, &mut rng).unwrap(), 3);
        }
    }

    #[test]
    fn test_high_temperature_flattens() {
        let p = [0.9, 0.1];
        let w = apply_temperature(&p, 1000.0).unwrap();
        assert!((w[0] - 0.5).abs() < 0.01, "expected near-uniform, got {w:?}");
    }

    #[test]
    fn test_zero_probabilities_never_drawn() {
        let p = [0.0, 0.5, 0.0, 0.5];
        let w = apply_temperature(&p, 0.3).unwrap();
        assert_eq!(w[0], 0.0);
        assert_eq!(w[2], 0.0);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let i = sample_with_temperature(&p, 2.0, &mut rng).unwrap();
            assert!(i == 1 || i == 3);
        }
    }

    #[test]
    fn test_tiny_temperature_does_not_underflow() {
        // ln(0.2)/1e-4 is about -16000; exp of that is 0 without the
        // max shift.
        let w = apply_temperature(&[0.2, 0.1], 1e-4).unwrap();
        assert_eq!(w[0], 1.0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            apply_temperature(&[0.5, 0.5], 0.0),
            Err(MelodyError::InvalidTemperature(_))
        ));
        assert!(matches!(
            apply_temperature(&[0.5, 0.5], f64::NAN),
            Err(MelodyError::InvalidTemperature(_))
        ));
        assert!(matches!(
            apply_temperature(&[0.0, 0.0], 1.0),
            Err(MelodyError::DegenerateDistribution)
        ));
        assert!(matches!(
            apply_temperature(&[], 1.0),
            Err(MelodyError::DegenerateDistribution)
        ));
    }

    #[test]
    fn test_sample_index_edges() {
        assert_eq!(sample_index(&[0.5, 0.5], 0.0), Some(0));
        assert_eq!(sample_index(&[0.5, 0.5], 0.999_999), Some(1));
        assert_eq!(sample_index(&[0.0, 1.0, 0.0], 0.999_999_999), Some(1));
        assert_eq!(sample_index(&[], 0.5), None);
    }
}
