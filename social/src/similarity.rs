//! Similarity scoring over engagement data
//!
//! Pure functions, no I/O. Every score lies in `[0, 1]`; rounding for display
//! happens where results are serialized, never here.

use crate::ids::{EngagementSet, RatingMap};
use serde::{Deserialize, Serialize};

/// Ratings this close (inclusive) count as agreeing
const RATING_TOLERANCE: i16 = 1;

/// Jaccard index of two engagement sets, `0.0` when both are empty
pub fn product_similarity(a: &EngagementSet, b: &EngagementSet) -> f64 {
    let (smaller, larger) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let intersection = smaller.iter().filter(|p| larger.contains(p)).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }

    clamp_unit(intersection as f64 / union as f64)
}

/// Fraction of commonly rated products where the ratings differ by at most one
/// star, `0.0` when nothing was rated by both
pub fn rating_similarity(a: &RatingMap, b: &RatingMap) -> f64 {
    let mut common = 0usize;
    let mut agreeing = 0usize;

    for (product, rating_a) in a {
        if let Some(rating_b) = b.get(product) {
            common += 1;
            if (i16::from(*rating_a) - i16::from(*rating_b)).abs() <= RATING_TOLERANCE {
                agreeing += 1;
            }
        }
    }

    if common == 0 {
        return 0.0;
    }
    clamp_unit(agreeing as f64 / common as f64)
}

/// Unweighted mean of the product and rating scores
pub fn combined_similarity(product: f64, rating: f64) -> f64 {
    clamp_unit((product + rating) / 2.0)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// The three scores of one user pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityScores {
    pub product_similarity: f64,
    pub rating_similarity: f64,
    pub combined_similarity: f64,
}

impl SimilarityScores {
    /// Degraded result served when scoring is unavailable
    pub const ZERO: SimilarityScores = SimilarityScores {
        product_similarity: 0.0,
        rating_similarity: 0.0,
        combined_similarity: 0.0,
    };

    pub fn compute(
        engagement_a: &EngagementSet,
        engagement_b: &EngagementSet,
        ratings_a: &RatingMap,
        ratings_b: &RatingMap,
    ) -> Self {
        let product = product_similarity(engagement_a, engagement_b);
        let rating = rating_similarity(ratings_a, ratings_b);

        Self {
            product_similarity: product,
            rating_similarity: rating,
            combined_similarity: combined_similarity(product, rating),
        }
    }
}
