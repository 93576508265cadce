use std::collections::HashMap;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use monkeybadge_core::badge::{BadgeDocument, IrId};

/// Upper bound on rejection-sampling draws before IR id allocation gives up.
const MAX_IR_ID_DRAWS: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    DuplicateToken,
    DuplicateIrId(IrId),
    IrIdsExhausted,
    Encode(String),
    Decode(String),
    Io(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateToken => write!(f, "token already issued"),
            Self::DuplicateIrId(id) => write!(f, "IR_ID {id} already assigned"),
            Self::IrIdsExhausted => write!(f, "no free IR_ID available"),
            Self::Encode(e) => write!(f, "snapshot encode error: {e}"),
            Self::Decode(e) => write!(f, "snapshot decode error: {e}"),
            Self::Io(e) => write!(f, "snapshot io error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// On-disk form: documents plus the intro switch. The IR_ID and token
/// registries are rebuilt from the documents on load.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    intro_started: bool,
    documents: Vec<BadgeDocument>,
}

/// Keyed badge document store with the IR_ID and token registries.
///
/// Registries are only changed through `insert` and `remove`, so every
/// `IR_ID` and token resolves to at most one live badge.
#[derive(Debug, Default)]
pub struct BadgeStore {
    documents: HashMap<Uuid, BadgeDocument>,
    ir_ids: HashMap<IrId, Uuid>,
    tokens: HashMap<String, Uuid>,
    intro_started: bool,
}

impl BadgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&BadgeDocument> {
        self.documents.get(uuid)
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.documents.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &BadgeDocument> {
        self.documents.values()
    }

    pub fn resolve_ir_id(&self, ir_id: IrId) -> Option<Uuid> {
        self.ir_ids.get(&ir_id).copied()
    }

    pub fn token_owner(&self, token: &str) -> Option<Uuid> {
        self.tokens.get(token).copied()
    }

    pub fn intro_started(&self) -> bool {
        self.intro_started
    }

    pub fn set_intro_started(&mut self, started: bool) {
        self.intro_started = started;
    }

    /// Draw random non-zero IR ids until one is neither assigned nor in
    /// `reserved`.
    pub fn allocate_ir_id<R: Rng>(
        &self,
        rng: &mut R,
        reserved: &[IrId],
    ) -> Result<IrId, StoreError> {
        for _ in 0..MAX_IR_ID_DRAWS {
            let candidate: IrId = rng.random();
            if candidate != 0
                && !self.ir_ids.contains_key(&candidate)
                && !reserved.contains(&candidate)
            {
                return Ok(candidate);
            }
        }
        Err(StoreError::IrIdsExhausted)
    }

    /// Add a new badge, claiming its token and IR_ID.
    pub fn insert(&mut self, doc: BadgeDocument) -> Result<(), StoreError> {
        if self.tokens.contains_key(&doc.token) {
            return Err(StoreError::DuplicateToken);
        }
        if let Some(ir_id) = doc.ir_id
            && self.ir_ids.contains_key(&ir_id)
        {
            return Err(StoreError::DuplicateIrId(ir_id));
        }
        if let Some(ir_id) = doc.ir_id {
            self.ir_ids.insert(ir_id, doc.uuid);
        }
        self.tokens.insert(doc.token.clone(), doc.uuid);
        self.documents.insert(doc.uuid, doc);
        Ok(())
    }

    /// Write back updated copies of existing documents. All documents are
    /// replaced together; the caller holds the write lock so no reader sees a
    /// partial commit. Token and IR_ID are fixed at registration and are not
    /// taken from the updated copies.
    pub fn commit(&mut self, docs: impl IntoIterator<Item = BadgeDocument>) {
        for mut doc in docs {
            match self.documents.get_mut(&doc.uuid) {
                Some(existing) => {
                    doc.token = std::mem::take(&mut existing.token);
                    doc.ir_id = existing.ir_id;
                    *existing = doc;
                },
                None => {
                    tracing::warn!(uuid = %doc.uuid, "commit for unknown badge ignored");
                },
            }
        }
    }

    /// Delete a badge, releasing its IR_ID and invalidating its token.
    pub fn remove(&mut self, uuid: &Uuid) -> Option<BadgeDocument> {
        let doc = self.documents.remove(uuid)?;
        if let Some(ir_id) = doc.ir_id {
            self.ir_ids.remove(&ir_id);
        }
        self.tokens.remove(&doc.token);
        Some(doc)
    }

    pub fn to_snapshot(&self) -> Result<Vec<u8>, StoreError> {
        let snapshot = Snapshot {
            intro_started: self.intro_started,
            documents: self.documents.values().cloned().collect(),
        };
        rmp_serde::to_vec_named(&snapshot).map_err(|e| StoreError::Encode(e.to_string()))
    }

    /// Rebuild a store from snapshot bytes. Documents that would break
    /// registry uniqueness are skipped with a warning.
    pub fn from_snapshot(data: &[u8]) -> Result<Self, StoreError> {
        let snapshot: Snapshot =
            rmp_serde::from_slice(data).map_err(|e| StoreError::Decode(e.to_string()))?;
        let mut store = Self {
            intro_started: snapshot.intro_started,
            ..Self::default()
        };
        for doc in snapshot.documents {
            let uuid = doc.uuid;
            if let Err(e) = store.insert(doc) {
                tracing::warn!(%uuid, error = %e, "skipping badge from snapshot");
            }
        }
        Ok(store)
    }

    /// Load a snapshot. A missing file yields an empty store.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        match std::fs::read(path) {
            Ok(bytes) => Self::from_snapshot(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(StoreError::Io(e.to_string())),
        }
    }
}
