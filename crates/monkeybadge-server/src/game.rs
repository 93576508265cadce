//! Challenge progression rules.
//!
//! Every operation runs against a `&mut BadgeStore`, i.e. under the store's
//! write lock, so claim-and-check sequences and the two-document friend write
//! are never interleaved with another mutation.

use rand::Rng;
use uuid::Uuid;

use monkeybadge_core::badge::{
    BadgeDocument, Challenge, HandleError, IrId, MatchEntry, validate_handle,
};
use monkeybadge_core::time::timestamp_now;
use monkeybadge_core::wire::RegisterRequest;

use crate::config::GameConfig;
use crate::handle::{generate_handle, generate_token};
use crate::store::{BadgeStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    InvalidRegistrationKey,
    InvalidHandle(HandleError),
    BadgeExists,
    DuplicateToken,
    /// Unknown badge or token mismatch; callers cannot tell which.
    NotFound,
    UnknownObject(IrId),
    SelfPairing,
    IntroNotStarted,
    ChallengeNotStarted,
    InvalidMonkeyId,
    /// Nothing to do; the state already reflects the request.
    AlreadyDone(&'static str),
    Store(StoreError),
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRegistrationKey => write!(f, "invalid registration key"),
            Self::InvalidHandle(e) => write!(f, "invalid handle: {e}"),
            Self::BadgeExists => write!(f, "badge already exists"),
            Self::DuplicateToken => write!(f, "duplicate token"),
            Self::NotFound => write!(f, "badge not found"),
            Self::UnknownObject(id) => write!(f, "unknown object {id}"),
            Self::SelfPairing => write!(f, "cannot pair with self"),
            Self::IntroNotStarted => write!(f, "intro not started"),
            Self::ChallengeNotStarted => write!(f, "challenge not started"),
            Self::InvalidMonkeyId => write!(f, "invalid monkey id"),
            Self::AlreadyDone(detail) => write!(f, "{detail}"),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for GameError {}

impl From<StoreError> for GameError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateToken => Self::DuplicateToken,
            other => Self::Store(other),
        }
    }
}

/// Copy of the caller's document if `token` is the one issued to `uuid`.
fn authorize(store: &BadgeStore, uuid: &Uuid, token: &str) -> Result<BadgeDocument, GameError> {
    match store.get(uuid) {
        Some(doc) if crate::auth::secrets_match(token, &doc.token) => Ok(doc.clone()),
        _ => Err(GameError::NotFound),
    }
}

pub fn register<R: Rng>(
    store: &mut BadgeStore,
    rules: &GameConfig,
    registration_key: &str,
    req: RegisterRequest,
    rng: &mut R,
) -> Result<BadgeDocument, GameError> {
    if !crate::auth::secrets_match(&req.key, registration_key) {
        return Err(GameError::InvalidRegistrationKey);
    }
    let handle = if req.handle.is_empty() {
        generate_handle(rng)
    } else {
        validate_handle(&req.handle).map_err(GameError::InvalidHandle)?;
        req.handle
    };
    if store.contains(&req.my_uuid) {
        return Err(GameError::BadgeExists);
    }

    let token = match req.token {
        Some(token) if !token.is_empty() => {
            if store.token_owner(&token).is_some() {
                return Err(GameError::DuplicateToken);
            }
            token
        },
        _ => loop {
            let candidate = generate_token(rng);
            if store.token_owner(&candidate).is_none() {
                break candidate;
            }
        },
    };

    let ir_id = store.allocate_ir_id(rng, &rules.reserved_ir_ids())?;
    let mut doc = BadgeDocument::new(req.my_uuid, handle, token);
    doc.ir_id = Some(ir_id);
    doc.intro.enabled = store.intro_started();
    store.insert(doc.clone())?;

    tracing::info!(uuid = %doc.uuid, handle = %doc.handle, ir_id, "badge registered");
    Ok(doc)
}

pub fn checkin(
    store: &mut BadgeStore,
    uuid: &Uuid,
    token: &str,
) -> Result<BadgeDocument, GameError> {
    let mut doc = authorize(store, uuid, token)?;
    doc.last_seen = Some(timestamp_now());
    doc.intro.enabled = store.intro_started();
    store.commit([doc.clone()]);
    tracing::debug!(%uuid, stage = %doc.current_challenge, "checkin");
    Ok(doc)
}

pub fn intro_complete(
    store: &mut BadgeStore,
    rules: &GameConfig,
    uuid: &Uuid,
    token: &str,
) -> Result<BadgeDocument, GameError> {
    let mut doc = authorize(store, uuid, token)?;
    if doc.intro.complete {
        return Err(GameError::AlreadyDone("intro already complete"));
    }
    if !store.intro_started() {
        return Err(GameError::IntroNotStarted);
    }
    doc.intro.enabled = true;
    doc.intro.complete = true;
    doc.settle(rules.friends_required);
    store.commit([doc.clone()]);
    tracing::info!(%uuid, stage = %doc.current_challenge, "intro complete");
    Ok(doc)
}

/// Rename a badge and rewrite the handle cached in its friends' match lists.
pub fn change_handle(
    store: &mut BadgeStore,
    uuid: &Uuid,
    token: &str,
    handle: String,
) -> Result<BadgeDocument, GameError> {
    validate_handle(&handle).map_err(GameError::InvalidHandle)?;
    let mut doc = authorize(store, uuid, token)?;
    if doc.handle == handle {
        return Err(GameError::AlreadyDone("handle unchanged"));
    }
    doc.handle = handle;

    let mut updates = Vec::with_capacity(doc.challenge1.matches.len() + 1);
    if let Some(own_ir) = doc.ir_id {
        for entry in doc.challenge1.matches.values() {
            let Some(mut friend) = store.get(&entry.uuid).cloned() else {
                continue;
            };
            if let Some(mine) = friend.challenge1.matches.get_mut(&own_ir) {
                mine.handle = doc.handle.clone();
                updates.push(friend);
            }
        }
    }
    updates.push(doc.clone());
    store.commit(updates);
    tracing::info!(%uuid, handle = %doc.handle, "handle changed");
    Ok(doc)
}

/// Record a pairing on both badges in one commit.
pub fn friend_request(
    store: &mut BadgeStore,
    rules: &GameConfig,
    uuid: &Uuid,
    token: &str,
    remote_ir_id: IrId,
) -> Result<BadgeDocument, GameError> {
    let mut mine = authorize(store, uuid, token)?;
    if mine.current_challenge == Challenge::Intro {
        return Err(GameError::ChallengeNotStarted);
    }
    let Some(own_ir) = mine.ir_id else {
        return Err(GameError::NotFound);
    };
    if own_ir == remote_ir_id {
        return Err(GameError::SelfPairing);
    }
    if mine.is_friend(remote_ir_id) {
        return Err(GameError::AlreadyDone("already friends"));
    }
    let mut peer = store
        .resolve_ir_id(remote_ir_id)
        .and_then(|peer_uuid| store.get(&peer_uuid))
        .cloned()
        .ok_or(GameError::NotFound)?;

    mine.challenge1.matches.insert(
        remote_ir_id,
        MatchEntry {
            handle: peer.handle.clone(),
            uuid: peer.uuid,
        },
    );
    peer.challenge1.matches.insert(
        own_ir,
        MatchEntry {
            handle: mine.handle.clone(),
            uuid: mine.uuid,
        },
    );
    mine.settle(rules.friends_required);
    peer.settle(rules.friends_required);

    tracing::info!(
        badge = %mine.uuid,
        peer = %peer.uuid,
        friends = mine.challenge1.matches.len(),
        "friends paired"
    );
    store.commit([mine.clone(), peer]);
    Ok(mine)
}

/// Gate shared by object claims: the badge must be exactly at `stage`.
fn require_stage(doc: &BadgeDocument, stage: Challenge) -> Result<(), GameError> {
    if doc.current_challenge == stage {
        Ok(())
    } else {
        Err(GameError::ChallengeNotStarted)
    }
}

pub fn claim_hidden_object(
    store: &mut BadgeStore,
    rules: &GameConfig,
    uuid: &Uuid,
    token: &str,
    object_id: IrId,
) -> Result<BadgeDocument, GameError> {
    let mut doc = authorize(store, uuid, token)?;
    let slot = rules
        .hidden_object_slot(object_id)
        .ok_or(GameError::UnknownObject(object_id))?;
    require_stage(&doc, Challenge::Challenge2)?;
    if doc.challenge2.status[slot] {
        return Err(GameError::AlreadyDone("hidden object already found"));
    }
    doc.challenge2.status[slot] = true;
    doc.settle(rules.friends_required);
    store.commit([doc.clone()]);
    tracing::info!(%uuid, object_id, slot, "hidden object found");
    Ok(doc)
}

pub fn claim_beacon(
    store: &mut BadgeStore,
    rules: &GameConfig,
    uuid: &Uuid,
    token: &str,
    object_id: IrId,
) -> Result<BadgeDocument, GameError> {
    let mut doc = authorize(store, uuid, token)?;
    let beacon = rules
        .beacons
        .lookup(object_id)
        .ok_or(GameError::UnknownObject(object_id))?;
    require_stage(&doc, Challenge::Challenge3)?;
    if doc.challenge3.flag(beacon) {
        return Err(GameError::AlreadyDone("monkey already seen"));
    }
    doc.challenge3.set_flag(beacon);
    doc.settle(rules.friends_required);
    store.commit([doc.clone()]);
    tracing::info!(%uuid, ?beacon, stage = %doc.current_challenge, "monkey seen");
    Ok(doc)
}

/// Delete a badge along with its IR_ID reservation and token. The badge is
/// also struck from its friends' matches, so a later holder of the same IR_ID
/// starts out as a stranger. Friends keep any stage they already reached.
pub fn delete_badge(
    store: &mut BadgeStore,
    uuid: &Uuid,
    token: &str,
) -> Result<BadgeDocument, GameError> {
    authorize(store, uuid, token)?;
    let doc = store.remove(uuid).ok_or(GameError::NotFound)?;
    if let Some(ir_id) = doc.ir_id {
        let friends: Vec<BadgeDocument> = doc
            .challenge1
            .matches
            .values()
            .filter_map(|entry| store.get(&entry.uuid))
            .filter(|friend| {
                friend
                    .challenge1
                    .matches
                    .get(&ir_id)
                    .is_some_and(|entry| entry.uuid == *uuid)
            })
            .cloned()
            .map(|mut friend| {
                friend.challenge1.matches.remove(&ir_id);
                friend
            })
            .collect();
        store.commit(friends);
    }
    tracing::info!(%uuid, "badge deleted");
    Ok(doc)
}

/// Flip the global intro switch, returning the new value.
pub fn toggle_intro(store: &mut BadgeStore) -> bool {
    let started = !store.intro_started();
    store.set_intro_started(started);
    tracing::info!(started, "intro switch toggled");
    started
}

/// Turn a badge into a monkey beacon, or back. `monkey_id` is required when
/// switching on and must be one of the configured beacon ids.
pub fn toggle_monkey(
    store: &mut BadgeStore,
    rules: &GameConfig,
    uuid: &Uuid,
    monkey_id: Option<IrId>,
) -> Result<BadgeDocument, GameError> {
    let mut doc = store.get(uuid).cloned().ok_or(GameError::NotFound)?;
    doc.monkey_id = match doc.monkey_id {
        Some(_) => None,
        None => {
            let id = monkey_id.ok_or(GameError::InvalidMonkeyId)?;
            if rules.beacons.lookup(id).is_none() {
                return Err(GameError::InvalidMonkeyId);
            }
            Some(id)
        },
    };
    store.commit([doc.clone()]);
    tracing::info!(%uuid, monkey_id = ?doc.monkey_id, "monkey mode toggled");
    Ok(doc)
}
