//! Borda-style rank fusion over admitted candidates.
//!
//! Each enabled criterion contributes the candidate's dense rank (0-based,
//! stable on input order) rather than its raw value, so criteria with
//! different units weigh comparably.

use crate::matching::policy::{Criterion, RankingPolicy};
use crate::models::Candidate;

#[derive(Debug, Clone, Copy)]
pub struct CandidateRanker {
    policy: RankingPolicy,
}

impl CandidateRanker {
    pub fn new(policy: RankingPolicy) -> Self {
        Self { policy }
    }

    /// Best candidate by composite rank; `None` iff `candidates` is empty.
    ///
    /// Equal composite scores resolve to the earliest candidate.
    pub fn select_best<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        let scores = self.composite_ranks(candidates);
        let mut best: Option<(usize, f64)> = None;
        for (idx, score) in scores.into_iter().enumerate() {
            match best {
                Some((_, best_score)) if score >= best_score => {}
                _ => best = Some((idx, score)),
            }
        }
        best.map(|(idx, _)| &candidates[idx])
    }

    /// Weighted sum of per-criterion dense ranks, one score per candidate
    pub fn composite_ranks(&self, candidates: &[Candidate]) -> Vec<f64> {
        let mut scores = vec![0.0; candidates.len()];
        for (criterion, weight) in self.policy.normalized_weights() {
            let keys: Vec<f64> = candidates
                .iter()
                .map(|c| self.sort_key(criterion, c))
                .collect();
            for (score, rank) in scores.iter_mut().zip(dense_ranks(&keys)) {
                *score += weight * rank as f64;
            }
        }
        scores
    }

    /// Ascending key: smaller is better. Missing derived values sort last.
    fn sort_key(&self, criterion: Criterion, candidate: &Candidate) -> f64 {
        match criterion {
            Criterion::SearchRank => candidate.search_rank() as f64,
            Criterion::Area => {
                f64::from(self.policy.weight(Criterion::Area).signum()) * candidate.area_km2()
            }
            Criterion::Distance => candidate.distance_m().unwrap_or(f64::INFINITY),
            Criterion::Similarity => candidate.similarity().map_or(f64::INFINITY, |s| -s),
        }
    }
}

/// Position of each key in a stable ascending sort
fn dense_ranks(keys: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|a, b| keys[*a].total_cmp(&keys[*b]));

    let mut ranks = vec![0; keys.len()];
    for (rank, idx) in order.into_iter().enumerate() {
        ranks[idx] = rank;
    }
    ranks
}
