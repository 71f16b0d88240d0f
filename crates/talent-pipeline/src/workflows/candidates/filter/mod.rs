mod debounce;
mod recent;

pub use debounce::FilterDebouncer;
pub use recent::RecentSearches;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::Candidate;
use super::stage::Stage;

pub const RATING_FLOOR: f32 = 0.0;
pub const RATING_CEILING: f32 = 5.0;

/// Independent predicates combined with logical AND. The default matches everyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub search_query: String,
    pub positions: Vec<String>,
    pub stages: Vec<Stage>,
    pub rating_min: f32,
    pub rating_max: f32,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub has_resume: Option<bool>,
    pub has_notes: Option<bool>,
    pub has_linkedin: Option<bool>,
    pub has_portfolio: Option<bool>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search_query: String::new(),
            positions: Vec::new(),
            stages: Vec::new(),
            rating_min: RATING_FLOOR,
            rating_max: RATING_CEILING,
            date_from: None,
            date_to: None,
            has_resume: None,
            has_notes: None,
            has_linkedin: None,
            has_portfolio: None,
        }
    }
}

impl FilterState {
    /// Ordered subsequence of non-archived candidates that satisfy every predicate.
    pub fn apply<'a>(&self, candidates: &'a [Candidate]) -> Vec<&'a Candidate> {
        let query = self.normalized_query();
        candidates
            .iter()
            .filter(|candidate| !candidate.is_archived)
            .filter(|candidate| self.matches_with(candidate, query.as_deref()))
            .collect()
    }

    /// Predicate check for a single candidate; archived records never match.
    pub fn matches(&self, candidate: &Candidate) -> bool {
        !candidate.is_archived && self.matches_with(candidate, self.normalized_query().as_deref())
    }

    fn normalized_query(&self) -> Option<String> {
        let trimmed = self.search_query.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
    }

    fn matches_with(&self, candidate: &Candidate, query: Option<&str>) -> bool {
        if let Some(query) = query {
            let hit = [
                &candidate.name,
                &candidate.email,
                &candidate.phone,
                &candidate.position,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(query));
            if !hit {
                return false;
            }
        }

        if !self.positions.is_empty() && !self.positions.contains(&candidate.position) {
            return false;
        }

        if !self.stages.is_empty() && !self.stages.contains(&candidate.stage) {
            return false;
        }

        let rating = candidate.rating();
        if rating < self.rating_min || rating > self.rating_max {
            return false;
        }

        let applied_on = candidate.applied_on();
        if self.date_from.is_some_and(|from| applied_on < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| applied_on > to) {
            return false;
        }

        flag_holds(self.has_resume, candidate.has_resume())
            && flag_holds(self.has_notes, candidate.has_notes())
            && flag_holds(self.has_linkedin, candidate.has_linkedin())
            && flag_holds(self.has_portfolio, candidate.has_portfolio())
    }

    /// Chip count shown beside the filter toggle: one per active predicate and one per
    /// selected list entry.
    pub fn active_filter_count(&self) -> usize {
        let flags = [
            self.has_resume,
            self.has_notes,
            self.has_linkedin,
            self.has_portfolio,
        ]
        .iter()
        .filter(|flag| flag.is_some())
        .count();

        usize::from(!self.search_query.trim().is_empty())
            + self.positions.len()
            + self.stages.len()
            + usize::from(self.rating_min > RATING_FLOOR || self.rating_max < RATING_CEILING)
            + usize::from(self.date_from.is_some())
            + usize::from(self.date_to.is_some())
            + flags
    }

    pub fn is_default(&self) -> bool {
        self.active_filter_count() == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn flag_holds(flag: Option<bool>, actual: bool) -> bool {
    flag.map_or(true, |expected| expected == actual)
}

/// Cycles a tri-state toggle: unset -> required -> excluded -> unset.
pub fn cycle_flag(flag: Option<bool>) -> Option<bool> {
    match flag {
        None => Some(true),
        Some(true) => Some(false),
        Some(false) => None,
    }
}
