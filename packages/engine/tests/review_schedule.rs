//! Review scheduling through full sessions: tracking words, building the
//! spaced-repetition queue, and applying session results to the schedule.

mod common;

use chrono::{Duration, Utc};
use dictee_engine::session::{SessionPlan, SessionStart};
use dictee_engine::storage::ReviewState;
use dictee_engine::LearningEngine;

async fn start_custom(engine: &LearningEngine, user: &str, words: &[&str]) {
    let plan = SessionPlan::Custom {
        words: words.iter().map(|w| w.to_string()).collect(),
    };
    match engine
        .start_session(user, "fr", plan)
        .await
        .expect("start session")
    {
        SessionStart::Started(_) => {}
        SessionStart::NothingDue => panic!("custom start cannot be empty"),
    }
}

async fn start_spaced(
    engine: &LearningEngine,
    user: &str,
    limit: Option<usize>,
) -> SessionStart {
    engine
        .start_session(user, "fr", SessionPlan::SpacedRepetition { limit })
        .await
        .expect("start session")
}

/// Submits `answer` for the current word and returns the expected word the
/// engine reveals.
async fn answer(engine: &LearningEngine, user: &str, answer: &str) -> (String, bool) {
    engine.present_current_word(user).await.expect("present");
    let outcome = engine
        .submit_answer(user, answer, 1000)
        .await
        .expect("submit");
    (outcome.word, outcome.is_correct)
}

#[tokio::test]
async fn custom_sessions_track_words_without_rescheduling() {
    let engine = common::test_engine();
    start_custom(&engine, "rev-1", &["arbre", "fleur"]).await;
    answer(&engine, "rev-1", "arbre").await;
    answer(&engine, "rev-1", "flore").await;

    // Both words are tracked and immediately due; a custom session never
    // moves the schedule.
    let overview = engine.due_overview("rev-1", "fr").expect("overview");
    assert_eq!(overview.due_now, 2);
    assert!(overview.next_due_at.is_some());
}

#[tokio::test]
async fn spaced_completion_reschedules_reviewed_words() {
    let engine = common::test_engine();
    start_custom(&engine, "rev-2", &["arbre", "fleur"]).await;
    answer(&engine, "rev-2", "arbre").await;
    answer(&engine, "rev-2", "fleur").await;

    match start_spaced(&engine, "rev-2", None).await {
        SessionStart::Started(snapshot) => assert_eq!(snapshot.total_words, 2),
        SessionStart::NothingDue => panic!("two words are due"),
    }

    let (first, first_correct) = answer(&engine, "rev-2", "arbre").await;
    let (second, second_correct) = answer(&engine, "rev-2", "flore").await;
    assert_eq!(first, "arbre");
    assert!(first_correct);
    assert_eq!(second, "fleur");
    assert!(!second_correct);

    let words = engine
        .storage()
        .words()
        .find_or_create_all("fr", &["arbre".to_string(), "fleur".to_string()])
        .expect("words");

    let hit = engine
        .storage()
        .review_states()
        .get("rev-2", &words[0].id)
        .expect("state query")
        .expect("arbre tracked");
    assert_eq!(hit.repetitions, 1);
    assert_eq!(hit.interval_days, 1);
    assert!(hit.easiness_factor > 2.5);
    assert!(hit.next_review_at > Utc::now());
    assert!(hit.last_review_at.is_some());

    let miss = engine
        .storage()
        .review_states()
        .get("rev-2", &words[1].id)
        .expect("state query")
        .expect("fleur tracked");
    assert_eq!(miss.repetitions, 0);
    assert_eq!(miss.interval_days, 1);
    assert!(miss.easiness_factor < 2.0);

    // Everything was pushed to tomorrow, so the queue is empty now.
    let overview = engine.due_overview("rev-2", "fr").expect("overview");
    assert_eq!(overview.due_now, 0);
    assert!(overview.next_due_at.expect("tracked words") > Utc::now());

    assert!(matches!(
        start_spaced(&engine, "rev-2", None).await,
        SessionStart::NothingDue
    ));
}

#[tokio::test]
async fn spaced_queue_respects_the_limit() {
    let engine = common::test_engine();
    // Starting the spaced session implicitly completes this one; its words
    // stay tracked either way.
    start_custom(&engine, "rev-3", &["papa", "mama", "zaza"]).await;

    match start_spaced(&engine, "rev-3", Some(2)).await {
        SessionStart::Started(snapshot) => assert_eq!(snapshot.total_words, 2),
        SessionStart::NothingDue => panic!("three words are due"),
    }

    // The two oldest tracked words fill the queue; the last-tracked word
    // waits its turn.
    let (first, _) = answer(&engine, "rev-3", "").await;
    let (second, _) = answer(&engine, "rev-3", "").await;
    let mut picked = vec![first, second];
    picked.sort();
    assert_eq!(picked, vec!["mama".to_string(), "papa".to_string()]);
}

#[tokio::test]
async fn review_chain_advances_on_later_passes() {
    let engine = common::test_engine();
    start_custom(&engine, "rev-4", &["neige"]).await;
    answer(&engine, "rev-4", "neige").await;

    let words = engine
        .storage()
        .words()
        .find_or_create_all("fr", &["neige".to_string()])
        .expect("words");

    // Backdate the schedule to simulate a word reviewed successfully once,
    // due again yesterday.
    let now = Utc::now();
    let state = ReviewState {
        id: "rs-backdated".to_string(),
        user_id: "rev-4".to_string(),
        word_id: words[0].id.clone(),
        easiness_factor: 2.6,
        interval_days: 1,
        repetitions: 1,
        next_review_at: now - Duration::days(1),
        last_review_at: Some(now - Duration::days(2)),
        created_at: now - Duration::days(2),
        updated_at: now - Duration::days(2),
    };
    engine
        .storage()
        .review_states()
        .upsert(&state)
        .expect("backdate");

    match start_spaced(&engine, "rev-4", None).await {
        SessionStart::Started(snapshot) => assert_eq!(snapshot.total_words, 1),
        SessionStart::NothingDue => panic!("the backdated word is due"),
    }
    let (word, correct) = answer(&engine, "rev-4", "neige").await;
    assert_eq!(word, "neige");
    assert!(correct);

    let advanced = engine
        .storage()
        .review_states()
        .get("rev-4", &words[0].id)
        .expect("state query")
        .expect("still tracked");
    assert_eq!(advanced.repetitions, 2);
    assert_eq!(advanced.interval_days, 6);
    assert!(advanced.next_review_at > Utc::now() + Duration::days(5));
}
