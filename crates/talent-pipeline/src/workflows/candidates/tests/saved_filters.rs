use super::common::*;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;

use crate::workflows::candidates::filter::FilterState;
use crate::workflows::candidates::saved_filters::{
    load_shared, SavedFilterError, SavedFilterId, SavedFilterRegistry, SavedFilterStore,
    ShareLink,
};
use crate::workflows::candidates::stage::Stage;

fn top_candidates() -> FilterState {
    FilterState {
        search_query: "engineer".to_string(),
        positions: vec!["Software Engineer".to_string()],
        stages: vec![Stage::InterviewScheduled, Stage::OfferPending],
        rating_min: 4.0,
        rating_max: 5.0,
        date_from: NaiveDate::from_ymd_opt(2025, 9, 1),
        date_to: None,
        has_resume: Some(true),
        has_notes: None,
        has_linkedin: Some(false),
        has_portfolio: None,
    }
}

fn registry() -> (SavedFilterRegistry<MemorySavedFilters>, Arc<MemorySavedFilters>) {
    let store = Arc::new(MemorySavedFilters::default());
    (
        SavedFilterRegistry::new(store.clone(), "/admin/candidates"),
        store,
    )
}

#[test]
fn shared_link_rebuilds_the_exact_filter_without_a_registry() {
    let (registry, store) = registry();
    let saved = registry
        .save("Top Candidates", top_candidates(), now())
        .expect("saved");

    let link = registry.share(&saved.id).expect("share link");
    assert!(link.as_str().starts_with("/admin/candidates?filter="));
    drop(registry);

    let rebuilt = load_shared(link.as_str()).expect("decodes");
    assert_eq!(rebuilt, top_candidates());

    let stored = store
        .fetch_saved(&saved.id)
        .expect("store reachable")
        .expect("entry kept");
    assert!(stored.is_shared);
}

#[test]
fn load_and_delete_round_trip_through_the_store() {
    let (registry, _) = registry();
    let filters = FilterState {
        stages: vec![Stage::Screening],
        ..FilterState::default()
    };
    let saved = registry
        .save("  Screening backlog ", filters, now())
        .expect("saved");
    assert_eq!(saved.name, "Screening backlog");
    assert!(!saved.is_shared);

    let loaded = registry.load(&saved.id).expect("loads");
    assert_eq!(loaded.stages, vec![Stage::Screening]);

    registry.delete(&saved.id).expect("deletes");
    assert!(matches!(
        registry.load(&saved.id),
        Err(SavedFilterError::NotFound(_))
    ));
}

#[test]
fn list_returns_creation_order() {
    let (registry, _) = registry();
    registry
        .save("second", FilterState::default(), now() + Duration::minutes(5))
        .expect("saved");
    registry
        .save("first", FilterState::default(), now())
        .expect("saved");

    let names: Vec<String> = registry
        .list()
        .expect("lists")
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(names, vec!["first".to_string(), "second".to_string()]);
}

#[test]
fn blank_names_and_unknown_ids_are_rejected() {
    let (registry, _) = registry();

    assert!(matches!(
        registry.save("   ", FilterState::default(), now()),
        Err(SavedFilterError::BlankName)
    ));

    let missing: SavedFilterId = "0b5c2f1e-8d7a-4c38-9f0e-2a1b3c4d5e6f"
        .parse()
        .expect("valid uuid");
    assert!(matches!(
        registry.share(&missing),
        Err(SavedFilterError::NotFound(_))
    ));
}

#[test]
fn malformed_links_are_reported() {
    assert!(matches!(
        load_shared("/admin/candidates?view=kanban"),
        Err(SavedFilterError::MissingParameter)
    ));
    assert!(matches!(
        load_shared("/admin/candidates?filter=***"),
        Err(SavedFilterError::Encoding(_))
    ));
    assert!(matches!(
        load_shared("/admin/candidates?filter=bm90LWpzb24"),
        Err(SavedFilterError::Payload(_))
    ));
}

#[test]
fn links_append_to_existing_query_strings() {
    let link = ShareLink::encode("/admin/candidates?tab=pipeline", &FilterState::default())
        .expect("encodes");

    assert!(link.as_str().starts_with("/admin/candidates?tab=pipeline&filter="));
    assert_eq!(
        load_shared(link.as_str()).expect("decodes"),
        FilterState::default()
    );
}
