//! Cosine similarity scoring.

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1, 1]`. Vectors of different lengths, vectors with
/// zero magnitude and vectors holding NaN or infinite components score `0.0`
/// rather than producing an error or NaN.
///
/// Sums are accumulated in `f64` so large finite components do not overflow.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum();
    let norm_a: f64 = a.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a * norm_b);
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn identical_vectors_score_one() {
        assert!((cosine_similarity(&[3.0, 4.0], &[3.0, 4.0]) - 1.0).abs() < EPS);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn opposite_vectors_score_minus_one() {
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < EPS);
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[1.0]), 0.0);
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn near_parallel_vector() {
        let score = cosine_similarity(&[1.0, 0.0], &[0.9, 0.1]);
        assert!((score - 0.99388).abs() < 1e-4, "score was {score}");
    }

    #[test]
    fn large_components_do_not_overflow() {
        assert!((cosine_similarity(&[1e20, 0.0], &[1e20, 0.0]) - 1.0).abs() < EPS);
        assert!((cosine_similarity(&[f32::MAX, f32::MAX], &[1.0, 1.0]) - 1.0).abs() < EPS);
        assert_eq!(cosine_similarity(&[1e20, 0.0], &[0.0, 1e20]), 0.0);
    }

    #[test]
    fn non_finite_components_score_zero() {
        assert_eq!(cosine_similarity(&[f32::NAN, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::INFINITY, 1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[f32::NEG_INFINITY, 0.0]), 0.0);
    }

    /// Finite components from tiny to near `f32::MAX`.
    fn component() -> impl Strategy<Value = f32> {
        prop_oneof![-10.0f32..10.0, -1e30f32..1e30, -1e38f32..1e38, -1e-30f32..1e-30]
    }

    proptest! {
        #[test]
        fn symmetric(
            a in proptest::collection::vec(component(), 8),
            b in proptest::collection::vec(component(), 8),
        ) {
            prop_assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
        }

        #[test]
        fn bounded(
            a in proptest::collection::vec(component(), 1..16),
            b in proptest::collection::vec(component(), 1..16),
        ) {
            let s = cosine_similarity(&a, &b);
            prop_assert!((-1.0..=1.0).contains(&s));
        }

        #[test]
        fn self_similarity_is_one(
            a in proptest::collection::vec(component(), 1..16)
                .prop_filter("non-zero vector", |v| v.iter().any(|x| *x != 0.0)),
        ) {
            prop_assert!((cosine_similarity(&a, &a) - 1.0).abs() < EPS);
        }
    }
}
