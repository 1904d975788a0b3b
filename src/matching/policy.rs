//! Ranking and validation policies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ranking criteria, in the fixed order used by the weight table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Upstream search ordinal, smaller is better
    SearchRank,
    /// Polygon area, direction chosen by the weight sign
    Area,
    /// Planar distance to the POI, smaller is better
    Distance,
    /// Name similarity to the POI, larger is better
    Similarity,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::SearchRank,
        Criterion::Area,
        Criterion::Distance,
        Criterion::Similarity,
    ];

    fn index(self) -> usize {
        match self {
            Criterion::SearchRank => 0,
            Criterion::Area => 1,
            Criterion::Distance => 2,
            Criterion::Similarity => 3,
        }
    }

    /// Setting name of the criterion
    pub fn name(self) -> &'static str {
        match self {
            Criterion::SearchRank => "by_search_rank",
            Criterion::Area => "by_area",
            Criterion::Distance => "by_distance",
            Criterion::Similarity => "by_similarity",
        }
    }

    /// Weights a criterion accepts: only area may be negative
    fn accepts(self, weight: i8) -> bool {
        match self {
            Criterion::Area => (-1..=1).contains(&weight),
            _ => (0..=1).contains(&weight),
        }
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("ranking weights must not all be 0")]
    NoCriterion,
    #[error("\"{criterion}\" must be {allowed}, got {weight}")]
    WeightOutOfRange {
        criterion: Criterion,
        weight: i8,
        allowed: &'static str,
    },
    #[error("\"{name}\" must be a non-negative number, got {value}")]
    NegativeBound { name: &'static str, value: f64 },
    #[error("min_aoi_area ({min}) exceeds max_aoi_area ({max})")]
    InvertedAreaBounds { min: f64, max: f64 },
    #[error("\"min_similarity\" must be in [0, 1), got {0}")]
    SimilarityOutOfRange(f64),
}

/// Signed weights for the four ranking criteria.
///
/// `0` disables a criterion. At least one criterion is always enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingPolicy {
    weights: [i8; 4],
}

impl RankingPolicy {
    pub fn new(
        by_search_rank: i8,
        by_area: i8,
        by_distance: i8,
        by_similarity: i8,
    ) -> Result<Self, PolicyError> {
        let weights = [by_search_rank, by_area, by_distance, by_similarity];
        for criterion in Criterion::ALL {
            let weight = weights[criterion.index()];
            if !criterion.accepts(weight) {
                return Err(PolicyError::WeightOutOfRange {
                    criterion,
                    weight,
                    allowed: if criterion == Criterion::Area {
                        "0 or ±1"
                    } else {
                        "0 or 1"
                    },
                });
            }
        }
        if weights.iter().all(|w| *w == 0) {
            return Err(PolicyError::NoCriterion);
        }
        Ok(Self { weights })
    }

    pub fn weight(&self, criterion: Criterion) -> i8 {
        self.weights[criterion.index()]
    }

    pub fn is_enabled(&self, criterion: Criterion) -> bool {
        self.weight(criterion) != 0
    }

    /// Enabled criteria with their signed weights, in table order
    pub fn enabled(&self) -> impl Iterator<Item = (Criterion, i8)> + '_ {
        Criterion::ALL
            .into_iter()
            .map(|c| (c, self.weight(c)))
            .filter(|(_, w)| *w != 0)
    }

    /// Enabled criteria with `|w| / Σ|w|`, summing to 1
    pub fn normalized_weights(&self) -> Vec<(Criterion, f64)> {
        let total: f64 = self.enabled().map(|(_, w)| f64::from(w.abs())).sum();
        self.enabled()
            .map(|(c, w)| (c, f64::from(w.abs()) / total))
            .collect()
    }
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            weights: [1, 0, 1, 1],
        }
    }
}

/// Admission bounds for candidate polygons
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationPolicy {
    /// Lower area bound in km², 0 disables
    pub min_area_km2: f64,
    /// Upper area bound in km², infinity disables
    pub max_area_km2: f64,
    /// Name similarity floor, 0 disables
    pub min_similarity: f64,
}

impl ValidationPolicy {
    pub fn new(
        min_area_km2: f64,
        max_area_km2: f64,
        min_similarity: f64,
    ) -> Result<Self, PolicyError> {
        // Written as negated comparisons so NaN fails too
        if !(min_area_km2 >= 0.0) {
            return Err(PolicyError::NegativeBound {
                name: "min_aoi_area",
                value: min_area_km2,
            });
        }
        if !(max_area_km2 >= 0.0) {
            return Err(PolicyError::NegativeBound {
                name: "max_aoi_area",
                value: max_area_km2,
            });
        }
        if min_area_km2 > max_area_km2 {
            return Err(PolicyError::InvertedAreaBounds {
                min: min_area_km2,
                max: max_area_km2,
            });
        }
        if !(0.0..1.0).contains(&min_similarity) {
            return Err(PolicyError::SimilarityOutOfRange(min_similarity));
        }
        Ok(Self {
            min_area_km2,
            max_area_km2,
            min_similarity,
        })
    }

    /// Inclusive area check; NaN never passes
    pub fn admits_area(&self, area_km2: f64) -> bool {
        area_km2 >= self.min_area_km2 && area_km2 <= self.max_area_km2
    }

    pub fn admits_similarity(&self, similarity: f64) -> bool {
        similarity >= self.min_similarity
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_area_km2: 0.0,
            max_area_km2: f64::INFINITY,
            min_similarity: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_policy_is_rejected() {
        assert_eq!(RankingPolicy::new(0, 0, 0, 0), Err(PolicyError::NoCriterion));
    }

    #[test]
    fn test_only_area_may_be_negative() {
        assert!(RankingPolicy::new(0, -1, 0, 0).is_ok());
        assert!(matches!(
            RankingPolicy::new(-1, 0, 1, 0),
            Err(PolicyError::WeightOutOfRange {
                criterion: Criterion::SearchRank,
                ..
            })
        ));
        assert!(RankingPolicy::new(1, 2, 0, 0).is_err());
    }

    #[test]
    fn test_normalized_weights_use_magnitudes() {
        let policy = RankingPolicy::new(1, -1, 0, 0).unwrap();
        let weights = policy.normalized_weights();
        assert_eq!(
            weights,
            vec![(Criterion::SearchRank, 0.5), (Criterion::Area, 0.5)]
        );
    }

    #[test]
    fn test_default_policy() {
        let policy = RankingPolicy::default();
        assert!(policy.is_enabled(Criterion::SearchRank));
        assert!(!policy.is_enabled(Criterion::Area));
        assert_eq!(policy.enabled().count(), 3);
    }

    #[test]
    fn test_validation_bounds() {
        let policy = ValidationPolicy::new(0.02, 1.0, 0.1).unwrap();
        assert!(policy.admits_area(0.02));
        assert!(policy.admits_area(1.0));
        assert!(!policy.admits_area(1.0001));
        assert!(!policy.admits_area(f64::NAN));

        assert!(ValidationPolicy::new(-1.0, 1.0, 0.0).is_err());
        assert!(ValidationPolicy::new(2.0, 1.0, 0.0).is_err());
        assert!(ValidationPolicy::new(0.0, 1.0, 1.0).is_err());
        assert!(ValidationPolicy::new(0.0, f64::INFINITY, 0.0).is_ok());
    }
}
