use std::cmp::Ordering;

use crate::core::errors::DimensionMismatch;

use super::types::{EmbeddedRule, ScoredRule};

/// Cosine similarity with f64 accumulation.
///
/// A zero-magnitude vector scores 0 against anything; only a length
/// mismatch is an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, DimensionMismatch> {
    if a.len() != b.len() {
        return Err(DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32)
}

/// Score every candidate against the query and keep the best `k`.
///
/// Ties keep corpus order (stable sort). A candidate whose vector length
/// disagrees with the query is skipped and logged loudly, since that
/// combination means a stale cache survived a model change.
pub fn top_k(query: &[f32], candidates: &[EmbeddedRule], k: usize) -> Vec<ScoredRule> {
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<ScoredRule> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match cosine_similarity(query, &candidate.embedding) {
            Ok(score) => scored.push(ScoredRule {
                rule: candidate.rule.clone(),
                score,
            }),
            Err(err) => {
                tracing::error!("Skipping rule {} in ranking: {}", candidate.rule.id, err);
            }
        }
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::types::Severity;
    use crate::retrieval::types::{NormalizedRule, RuleMetadata};

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    fn candidate(id: &str, embedding: Vec<f32>) -> EmbeddedRule {
        EmbeddedRule {
            rule: NormalizedRule {
                id: id.to_string(),
                text: format!("Rule: {}", id),
                metadata: RuleMetadata {
                    jurisdiction: "general".to_string(),
                    severity: Severity::Medium,
                    contract_types: vec!["msa".to_string()],
                    category: None,
                    reference: None,
                },
            },
            embedding,
        }
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let vec = vec![1.0, 2.0, 3.0, 4.0];
        let score = cosine_similarity(&vec, &vec).unwrap();
        assert!(approx_eq(score, 1.0));
    }

    #[test]
    fn cosine_is_minus_one_for_opposite_vectors() {
        let score = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]).unwrap();
        assert!(approx_eq(score, -1.0));
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_vectors() {
        let score = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(approx_eq(score, 0.0));
    }

    #[test]
    fn zero_vector_scores_zero_instead_of_failing() {
        let score = cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).unwrap();
        assert!(approx_eq(score, 0.0));
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let err = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err.left, 2);
        assert_eq!(err.right, 3);
    }

    #[test]
    fn scores_stay_in_unit_range() {
        let a = vec![0.123, -4.56, 7.89, 0.001];
        let b = vec![9.87, 6.54, -3.21, 0.002];
        let score = cosine_similarity(&a, &b).unwrap();
        assert!((-1.0..=1.0).contains(&score));
    }

    #[test]
    fn top_k_sorts_descending_and_truncates() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            candidate("mid", vec![0.8, 0.2]),
            candidate("low", vec![0.1, 0.9]),
            candidate("high", vec![0.9, 0.0]),
        ];

        let ranked = top_k(&query, &candidates, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].rule.id, "high");
        assert_eq!(ranked[1].rule.id, "mid");
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn top_k_size_is_min_of_k_and_candidates() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            candidate("a", vec![1.0, 0.0]),
            candidate("b", vec![0.5, 0.5]),
        ];

        assert_eq!(top_k(&query, &candidates, 0).len(), 0);
        assert_eq!(top_k(&query, &candidates, 1).len(), 1);
        assert_eq!(top_k(&query, &candidates, 10).len(), 2);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            candidate("first", vec![2.0, 0.0]),
            candidate("second", vec![4.0, 0.0]),
        ];

        let ranked = top_k(&query, &candidates, 2);
        assert!(approx_eq(ranked[0].score, ranked[1].score));
        assert_eq!(ranked[0].rule.id, "first");
        assert_eq!(ranked[1].rule.id, "second");
    }

    #[test]
    fn mismatched_candidate_is_skipped_not_fatal() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            candidate("good", vec![1.0, 0.0]),
            candidate("stale", vec![1.0, 0.0, 0.0]),
        ];

        let ranked = top_k(&query, &candidates, 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].rule.id, "good");
    }
}
