use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::domain::{Candidate, Rating, RatingCategory, RatingId, ReviewerId};
use super::repository::{CandidateStore, StoreError};

pub const SCORE_MIN: f32 = 0.0;
pub const SCORE_MAX: f32 = 5.0;

#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("score {0} is outside 0 to 5")]
    OutOfRange(f32),
    #[error("score {0} must be a whole or half step")]
    NotHalfStep(f32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Accepts scores in `[0, 5]` on half steps.
pub fn validate_score(score: f32) -> Result<f32, RatingError> {
    if !score.is_finite() || !(SCORE_MIN..=SCORE_MAX).contains(&score) {
        return Err(RatingError::OutOfRange(score));
    }
    if (score * 2.0).fract() != 0.0 {
        return Err(RatingError::NotHalfStep(score));
    }
    Ok(score)
}

/// Persists a new rating, then appends it and returns the new aggregate.
/// Existing ratings are never modified.
pub fn add_rating<S>(
    store: &S,
    candidate: &mut Candidate,
    reviewer: ReviewerId,
    score: f32,
    category: Option<RatingCategory>,
    now: DateTime<Utc>,
) -> Result<f32, RatingError>
where
    S: CandidateStore + ?Sized,
{
    let score = validate_score(score)?;
    let rating = Rating {
        id: RatingId::generate(),
        reviewer,
        score,
        category,
        created_at: now,
    };

    store.insert_rating(&candidate.id, &rating)?;
    candidate.ratings.push(rating);

    let aggregate = candidate.rating();
    info!(candidate = %candidate.id, score, aggregate, "rating recorded");
    Ok(aggregate)
}

/// Mean of the ratings filed under `category`.
pub fn category_average(ratings: &[Rating], category: RatingCategory) -> Option<f32> {
    let scores: Vec<f32> = ratings
        .iter()
        .filter(|rating| rating.category == Some(category))
        .map(|rating| rating.score)
        .collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f32>() / scores.len() as f32)
}

/// Opt-in aggregate that weights each category average by its published weight.
/// Categories nobody rated are left out; uncategorized ratings are ignored.
pub fn weighted_mean(ratings: &[Rating]) -> Option<f32> {
    let (weighted, weights) = RatingCategory::ordered()
        .into_iter()
        .filter_map(|category| {
            category_average(ratings, category)
                .map(|average| (average * f32::from(category.weight()), f32::from(category.weight())))
        })
        .fold((0.0_f32, 0.0_f32), |(sum, total), (value, weight)| {
            (sum + value, total + weight)
        });
    (weights > 0.0).then(|| weighted / weights)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category: RatingCategory,
    pub label: &'static str,
    pub weight: u8,
    pub average: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: f32,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted: Option<f32>,
    pub categories: Vec<CategoryScore>,
}

impl RatingSummary {
    pub fn of(candidate: &Candidate) -> Self {
        let categories = RatingCategory::ordered()
            .into_iter()
            .filter_map(|category| {
                category_average(&candidate.ratings, category).map(|average| CategoryScore {
                    category,
                    label: category.label(),
                    weight: category.weight(),
                    average,
                })
            })
            .collect();

        Self {
            average: candidate.rating(),
            count: candidate.ratings.len(),
            weighted: weighted_mean(&candidate.ratings),
            categories,
        }
    }
}
