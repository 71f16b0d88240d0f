use super::common::*;
use chrono::{Duration, NaiveDate};

use crate::workflows::candidates::domain::Candidate;
use crate::workflows::candidates::filter::FilterState;
use crate::workflows::candidates::stage::Stage;

fn rated(raw_id: &str, name: &str, score: Option<f32>) -> Candidate {
    let mut candidate = candidate(raw_id, name, "Analyst", Stage::Screening);
    if let Some(score) = score {
        candidate.ratings.push(rating("riley", score));
    }
    candidate
}

#[test]
fn rating_range_keeps_only_top_scores() {
    let pool = vec![
        rated("r-1", "First", Some(4.5)),
        rated("r-2", "Second", Some(3.0)),
        rated("r-3", "Third", Some(5.0)),
        rated("r-4", "Fourth", None),
    ];
    let filter = FilterState {
        rating_min: 4.0,
        rating_max: 5.0,
        ..FilterState::default()
    };

    assert_eq!(names(filter.apply(&pool)), vec!["First", "Third"]);
}

#[test]
fn archived_candidates_never_match() {
    let mut pool = roster();
    pool[1].is_archived = true;

    let visible = FilterState::default().apply(&pool);

    assert_eq!(visible.len(), 7);
    assert!(visible.iter().all(|candidate| candidate.id != id("cand-2")));
}

#[test]
fn search_is_case_insensitive_across_contact_fields() {
    let pool = roster();

    let by_name = FilterState {
        search_query: "  TURING ".to_string(),
        ..FilterState::default()
    };
    assert_eq!(names(by_name.apply(&pool)), vec!["Alan Turing"]);

    let by_email = FilterState {
        search_query: "grace.hopper@".to_string(),
        ..FilterState::default()
    };
    assert_eq!(names(by_email.apply(&pool)), vec!["Grace Hopper"]);

    let by_position = FilterState {
        search_query: "product".to_string(),
        ..FilterState::default()
    };
    assert_eq!(
        names(by_position.apply(&pool)),
        vec!["Margaret Hamilton", "Barbara Liskov"]
    );
}

#[test]
fn predicates_combine_with_and() {
    let pool = roster();
    let filter = FilterState {
        positions: vec!["Software Engineer".to_string()],
        stages: vec![Stage::New, Stage::OfferPending],
        rating_min: 3.5,
        ..FilterState::default()
    };

    assert_eq!(
        names(filter.apply(&pool)),
        vec!["Ada Lovelace", "Edsger Dijkstra"]
    );
}

#[test]
fn applied_date_bounds_are_inclusive() {
    let pool = roster();
    let applied = (now() - Duration::days(20)).date_naive();
    let filter = FilterState {
        date_from: Some(applied),
        date_to: Some(applied),
        ..FilterState::default()
    };

    assert_eq!(filter.apply(&pool).len(), 7);

    let before_katherine = FilterState {
        date_to: NaiveDate::from_ymd_opt(2025, 8, 31),
        ..FilterState::default()
    };
    assert_eq!(
        names(before_katherine.apply(&pool)),
        vec!["Katherine Johnson"]
    );
}

#[test]
fn tri_state_flags_require_or_exclude() {
    let pool = roster();

    let with_resume = FilterState {
        has_resume: Some(true),
        ..FilterState::default()
    };
    assert_eq!(names(with_resume.apply(&pool)), vec!["Ada Lovelace"]);

    let without_notes = FilterState {
        has_notes: Some(false),
        ..FilterState::default()
    };
    assert_eq!(without_notes.apply(&pool).len(), 7);

    let linked_and_portfolio = FilterState {
        has_linkedin: Some(true),
        has_portfolio: Some(true),
        ..FilterState::default()
    };
    assert!(linked_and_portfolio.apply(&pool).is_empty());
}

#[test]
fn applying_twice_yields_the_same_order() {
    let pool = roster();
    let filter = FilterState {
        rating_min: 2.0,
        positions: vec!["Software Engineer".to_string(), "Data Scientist".to_string()],
        ..FilterState::default()
    };

    let first: Vec<_> = filter.apply(&pool).into_iter().map(|c| c.id.clone()).collect();
    let second: Vec<_> = filter.apply(&pool).into_iter().map(|c| c.id.clone()).collect();

    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
}

#[test]
fn matches_agrees_with_apply() {
    let pool = roster();
    let filter = FilterState {
        stages: vec![Stage::New],
        ..FilterState::default()
    };

    let via_matches: Vec<&Candidate> = pool.iter().filter(|c| filter.matches(c)).collect();
    assert_eq!(via_matches, filter.apply(&pool));
}
