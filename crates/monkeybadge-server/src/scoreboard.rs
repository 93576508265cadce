use axum::Json;
use axum::extract::State;
use serde::Serialize;

use monkeybadge_core::badge::{BadgeDocument, Challenge};

use crate::state::AppState;

/// Points for each completed challenge, in challenge order.
const CHALLENGE_POINTS: [u32; 3] = [1000, 2000, 3000];

#[derive(Debug, Serialize)]
pub struct ScoreEntry {
    pub handle: String,
    pub score: u32,
    pub current_challenge: Challenge,
    pub matches: usize,
}

/// Completed challenges are worth their fixed points; every friend adds one.
pub fn score(doc: &BadgeDocument) -> u32 {
    let completed = [
        doc.challenge1.complete,
        doc.challenge2.complete,
        doc.challenge3.complete,
    ];
    let challenge_points: u32 = completed
        .iter()
        .zip(CHALLENGE_POINTS)
        .filter(|(done, _)| **done)
        .map(|(_, points)| points)
        .sum();
    challenge_points + doc.challenge1.matches.len() as u32
}

/// Badges past the intro, best first. Ties break on handle so the order is
/// stable between requests.
pub fn ranking<'a>(docs: impl Iterator<Item = &'a BadgeDocument>) -> Vec<ScoreEntry> {
    let mut entries: Vec<ScoreEntry> = docs
        .filter(|doc| doc.intro.complete)
        .map(|doc| ScoreEntry {
            handle: doc.handle.clone(),
            score: score(doc),
            current_challenge: doc.current_challenge,
            matches: doc.challenge1.matches.len(),
        })
        .collect();
    entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.handle.cmp(&b.handle)));
    entries
}

/// GET /scoreboard
pub async fn scoreboard(State(state): State<AppState>) -> Json<Vec<ScoreEntry>> {
    let store = state.store.read().await;
    Json(ranking(store.documents()))
}
