use super::common::*;
use chrono::Duration;

use crate::workflows::candidates::domain::{NoteId, NoteType, NoteVisibility};
use crate::workflows::candidates::notes::{NoteDraft, NoteEdit, NoteError, NoteQuery, NotesPolicy};

fn policy() -> NotesPolicy {
    NotesPolicy::from_config(&config())
}

fn draft(content: &str, visibility: NoteVisibility) -> NoteDraft {
    NoteDraft {
        note_type: NoteType::Interview,
        content: content.to_string(),
        visibility,
        is_pinned: false,
    }
}

#[test]
fn listing_puts_pinned_first_then_newest() {
    let mut notes = vec![
        note("n-old", "riley", "old", NoteVisibility::Team, Duration::hours(30)),
        note("n-new", "riley", "new", NoteVisibility::Team, Duration::hours(1)),
        note("n-pinned", "morgan", "pinned", NoteVisibility::Team, Duration::hours(50)),
        note("n-mid", "morgan", "mid", NoteVisibility::Team, Duration::hours(10)),
    ];
    notes[2].is_pinned = true;

    let listed: Vec<&str> = policy()
        .list(&notes, &reviewer("riley"), &NoteQuery::default())
        .into_iter()
        .map(|note| note.id.0.as_str())
        .collect();

    assert_eq!(listed, vec!["n-pinned", "n-new", "n-mid", "n-old"]);
}

#[test]
fn private_notes_are_visible_only_to_their_author() {
    let notes = vec![
        note("n-private", "riley", "mine", NoteVisibility::Private, Duration::hours(1)),
        note("n-team", "riley", "ours", NoteVisibility::Team, Duration::hours(2)),
    ];

    assert_eq!(
        policy()
            .list(&notes, &reviewer("riley"), &NoteQuery::default())
            .len(),
        2
    );
    let for_morgan = policy().list(&notes, &reviewer("morgan"), &NoteQuery::default());
    assert_eq!(for_morgan.len(), 1);
    assert_eq!(for_morgan[0].id, NoteId("n-team".to_string()));
}

#[test]
fn type_and_author_filters_combine() {
    let mut notes = vec![
        note("n-1", "riley", "call", NoteVisibility::Team, Duration::hours(1)),
        note("n-2", "morgan", "call", NoteVisibility::Team, Duration::hours(2)),
        note("n-3", "riley", "onsite", NoteVisibility::Team, Duration::hours(3)),
    ];
    notes[0].note_type = NoteType::PhoneScreen;
    notes[1].note_type = NoteType::PhoneScreen;

    let query = NoteQuery {
        note_type: Some(NoteType::PhoneScreen),
        author: Some(reviewer("riley")),
    };
    let listed = policy().list(&notes, &reviewer("morgan"), &query);

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, NoteId("n-1".to_string()));
}

#[test]
fn author_can_edit_and_delete_inside_window_only() {
    let store = MemoryStore::seeded(roster());
    let mut grace = store.record("cand-2").expect("seeded");
    let policy = policy();

    let added = policy
        .add(
            &store,
            &mut grace,
            reviewer("riley"),
            draft("  Great systems answers  ", NoteVisibility::Team),
            now(),
        )
        .expect("note added");
    assert_eq!(added.content, "Great systems answers");
    assert_eq!(store.record("cand-2").expect("stored").notes.len(), 1);

    let not_author = policy.update(
        &store,
        &mut grace,
        &added.id,
        &reviewer("morgan"),
        NoteEdit {
            content: "hijack".to_string(),
            note_type: None,
            visibility: None,
        },
        now(),
    );
    assert!(matches!(not_author, Err(NoteError::NotAuthor)));

    let edited = policy
        .update(
            &store,
            &mut grace,
            &added.id,
            &reviewer("riley"),
            NoteEdit {
                content: "Great systems design answers".to_string(),
                note_type: Some(NoteType::Reference),
                visibility: None,
            },
            now() + Duration::hours(23),
        )
        .expect("inside window");
    assert_eq!(edited.note_type, NoteType::Reference);
    assert_eq!(edited.updated_at, Some(now() + Duration::hours(23)));

    let too_late = policy.delete(
        &store,
        &mut grace,
        &added.id,
        &reviewer("riley"),
        now() + Duration::hours(24),
    );
    assert!(matches!(
        too_late,
        Err(NoteError::EditWindowClosed { hours: 24 })
    ));

    policy
        .delete(
            &store,
            &mut grace,
            &added.id,
            &reviewer("riley"),
            now() + Duration::hours(2),
        )
        .expect("delete inside window");
    assert!(grace.notes.is_empty());
    assert!(store.record("cand-2").expect("stored").notes.is_empty());
}

#[test]
fn blank_note_is_rejected() {
    let store = MemoryStore::seeded(roster());
    let mut grace = store.record("cand-2").expect("seeded");

    let result = policy().add(
        &store,
        &mut grace,
        reviewer("riley"),
        draft("   ", NoteVisibility::Team),
        now(),
    );

    assert!(matches!(result, Err(NoteError::BlankContent)));
    assert_eq!(store.writes(), 0);
}

#[test]
fn any_viewer_can_pin_but_hidden_notes_stay_hidden() {
    let store = MemoryStore::seeded(roster());
    let mut katherine = store.record("cand-4").expect("seeded");
    let policy = policy();
    let note_id = katherine.notes[0].id.clone();

    let pinned = policy
        .toggle_pin(&store, &mut katherine, &note_id, &reviewer("riley"))
        .expect("team note visible");
    assert!(pinned.is_pinned);

    let private = policy
        .add(
            &store,
            &mut katherine,
            reviewer("morgan"),
            draft("comp expectations", NoteVisibility::Private),
            now(),
        )
        .expect("note added");
    let hidden = policy.toggle_pin(&store, &mut katherine, &private.id, &reviewer("riley"));
    assert!(matches!(hidden, Err(NoteError::NotFound(_))));
}

#[test]
fn edit_window_length_comes_from_configuration() {
    let policy = NotesPolicy::new(Duration::hours(1));
    let recent = note("n-1", "riley", "x", NoteVisibility::Team, Duration::minutes(30));
    let stale = note("n-2", "riley", "x", NoteVisibility::Team, Duration::minutes(90));

    assert!(policy.can_edit(&recent, &reviewer("riley"), now()));
    assert!(!policy.can_edit(&stale, &reviewer("riley"), now()));
    assert!(!policy.can_edit(&recent, &reviewer("morgan"), now()));
}

#[test]
fn note_can_be_created_pinned_with_a_fresh_id() {
    let store = MemoryStore::seeded(roster());
    let mut grace = store.record("cand-2").expect("seeded");
    let policy = policy();

    let mut pinned_draft = draft("Priority reference check", NoteVisibility::Team);
    pinned_draft.is_pinned = true;
    let pinned = policy
        .add(&store, &mut grace, reviewer("riley"), pinned_draft, now())
        .expect("note added");
    let plain = policy
        .add(
            &store,
            &mut grace,
            reviewer("riley"),
            draft("Second round booked", NoteVisibility::Team),
            now() + Duration::minutes(5),
        )
        .expect("note added");

    assert!(pinned.is_pinned);
    assert!(!plain.is_pinned);
    assert_ne!(pinned.id, plain.id);
    assert!(pinned.id.0.starts_with("note-"));
    let listed: Vec<&NoteId> = policy
        .list(&grace.notes, &reviewer("morgan"), &NoteQuery::default())
        .into_iter()
        .map(|note| &note.id)
        .collect();
    assert_eq!(listed, vec![&pinned.id, &plain.id]);
    assert!(store.record("cand-2").expect("stored").notes[0].is_pinned);
}

#[test]
fn missing_note_error_names_the_note() {
    let store = MemoryStore::seeded(roster());
    let mut grace = store.record("cand-2").expect("seeded");
    let missing = NoteId("note-missing".to_string());

    let err = policy()
        .toggle_pin(&store, &mut grace, &missing, &reviewer("riley"))
        .expect_err("no such note");

    assert_eq!(err.to_string(), "note note-missing not found");
}
