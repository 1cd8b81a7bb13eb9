//! Push/pull orchestration between local tracker state and the remote
//! document store.
//!
//! There is no merge: a push replaces the remote document wholesale and a
//! pull replaces local state wholesale (last writer wins). That is only
//! sound with one active device at a time, which is this tool's documented
//! usage model. Every push re-fetches the current sha; version tokens are
//! never cached across operations.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::remote::{RemoteDocument, RemoteError};
use crate::settings::{ConnectionSettings, SharedSettingsDoc};
use crate::tracker::{round2, TrackerState};

/// Seam between the engine and the remote store. The production
/// implementation is `GithubClient`; tests use an in-memory store.
pub trait DocumentStore {
    async fn get_document(
        &self,
        settings: &ConnectionSettings,
        path: &str,
    ) -> Result<Option<RemoteDocument>, RemoteError>;

    async fn put_document(
        &self,
        settings: &ConnectionSettings,
        path: &str,
        content: &str,
        expected_sha: Option<&str>,
    ) -> Result<RemoteDocument, RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// No remote document existed; this push created it.
    Created,
    /// An existing document was overwritten under its current sha.
    Updated,
}

/// Shape check for the pulled progress document; serde rejects anything
/// where `total` is not numeric or `history` is not a numeric sequence.
#[derive(Debug, Deserialize)]
struct ProgressDoc {
    total: f64,
    history: Vec<f64>,
}

pub struct SyncEngine<S> {
    store: S,
}

impl<S: DocumentStore> SyncEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Mirror local state to the remote progress document, creating it on
    /// first write. A failed push never touches local state.
    pub async fn push(
        &self,
        settings: &ConnectionSettings,
        state: &TrackerState,
    ) -> Result<PushOutcome, RemoteError> {
        let existing = self.store.get_document(settings, &settings.path).await?;
        let sha = existing.as_ref().map(|doc| doc.sha.as_str());

        let payload = serde_json::to_string(state)
            .map_err(|e| RemoteError::Decode(format!("failed to serialize state: {e}")))?;
        self.store
            .put_document(settings, &settings.path, &payload, sha)
            .await?;

        let outcome = if sha.is_some() {
            PushOutcome::Updated
        } else {
            PushOutcome::Created
        };
        info!("Pushed {} to {} ({:?})", payload, settings.path, outcome);
        Ok(outcome)
    }

    /// Fetch the remote progress document. `Ok(None)` means there is
    /// nothing remote to apply; the caller keeps local state as-is. When
    /// `seed_on_empty_pull` is set, an absent document is seeded with the
    /// local state instead.
    ///
    /// The returned state is rebuilt from the remote history so the
    /// total/sum invariant holds locally even if the remote total drifted.
    pub async fn pull(
        &self,
        settings: &ConnectionSettings,
        local: &TrackerState,
    ) -> Result<Option<TrackerState>, RemoteError> {
        let Some(doc) = self.store.get_document(settings, &settings.path).await? else {
            if settings.seed_on_empty_pull {
                info!("No remote document at {}; seeding it with local state", settings.path);
                self.push(settings, local).await?;
            } else {
                debug!("No remote document at {}; nothing to pull", settings.path);
            }
            return Ok(None);
        };

        let parsed: ProgressDoc = serde_json::from_str(&doc.content)
            .map_err(|e| RemoteError::Decode(format!("invalid progress document: {e}")))?;

        let state = TrackerState::from_history(parsed.history);
        if (state.total() - round2(parsed.total)).abs() > 0.005 {
            warn!(
                "Remote total {} disagrees with its history sum {}; using the sum",
                parsed.total,
                state.total()
            );
        }
        Ok(Some(state))
    }

    /// Fetch the shared settings document (tokenless reads are fine on
    /// public repositories). The caller applies the returned fields to its
    /// persisted settings with the fill-empty-only rule; found fields may
    /// thereby override heuristic defaults but never an explicit local
    /// value.
    pub async fn fetch_shared_settings(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<Option<SharedSettingsDoc>, RemoteError> {
        let Some(doc) = self
            .store
            .get_document(settings, &settings.settings_path)
            .await?
        else {
            debug!("No shared settings document at {}", settings.settings_path);
            return Ok(None);
        };

        let shared: SharedSettingsDoc = serde_json::from_str(&doc.content)
            .map_err(|e| RemoteError::Decode(format!("invalid settings document: {e}")))?;
        Ok(Some(shared))
    }

    /// Publish the token-free settings projection so a new device can
    /// auto-configure itself. Explicit user action; errors surface.
    pub async fn push_shared_settings(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<PushOutcome, RemoteError> {
        let existing = self
            .store
            .get_document(settings, &settings.settings_path)
            .await?;
        let sha = existing.as_ref().map(|doc| doc.sha.as_str());

        let payload = serde_json::to_string_pretty(&settings.shared_document())
            .map_err(|e| RemoteError::Decode(format!("failed to serialize settings: {e}")))?;
        self.store
            .put_document(settings, &settings.settings_path, &payload, sha)
            .await?;

        Ok(if sha.is_some() {
            PushOutcome::Updated
        } else {
            PushOutcome::Created
        })
    }
}
