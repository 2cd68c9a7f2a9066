use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

use super::{GraphError, GraphStore, ListEdit};
use crate::models::component::{created_at, STATE_KEY};
use crate::models::{decode_document, encode_document, ArchViewComponent, ComponentState, Loaded};
use crate::store::{Collection, StoreError, StoredDocument};

/// Outcome of one recovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    /// Pending components already listed by their view, marked committed
    pub committed: usize,
    /// Pending components absent from their view, deleted
    pub rolled_back: usize,
    /// Too young to judge, or changed while being settled
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "examined {}, committed {}, rolled back {}, skipped {}, failed {}",
            self.examined, self.committed, self.rolled_back, self.skipped, self.failed
        )
    }
}

enum Settled {
    Committed,
    RolledBack,
    Skipped,
}

impl GraphStore {
    /// Reconcile pending components with their views.
    ///
    /// Components younger than `grace` may still belong to an add in flight
    /// and are left alone. Older ones are committed when their view lists
    /// them and rolled back otherwise. A rollback first claims the component
    /// as `abandoned` with a compare-and-swap, so an add that is still running
    /// can no longer commit it, then takes it off the view and deletes it.
    pub async fn sweep_pending(&self, grace: Duration, now: DateTime<Utc>) -> Result<SweepReport, GraphError> {
        let mut unsettled = self
            .store
            .find_eq(Collection::Components, STATE_KEY, &json!(ComponentState::Pending.as_str()))
            .await?;
        // Claimed by an earlier sweep that did not finish the removal
        unsettled.extend(
            self.store
                .find_eq(Collection::Components, STATE_KEY, &json!(ComponentState::Abandoned.as_str()))
                .await?,
        );

        let mut report = SweepReport::default();
        for doc in unsettled {
            report.examined += 1;
            let id = doc.id.clone();
            match self.settle(doc, grace, now).await {
                Ok(Settled::Committed) => report.committed += 1,
                Ok(Settled::RolledBack) => report.rolled_back += 1,
                Ok(Settled::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::error!("Sweep could not settle component '{}': {}", id, e);
                    report.failed += 1;
                }
            }
        }

        if report.examined > 0 {
            tracing::info!("Sweep finished: {}", report);
        }
        Ok(report)
    }

    async fn settle(&self, doc: StoredDocument, grace: Duration, now: DateTime<Utc>) -> Result<Settled, GraphError> {
        let loaded: Loaded<ArchViewComponent> = decode_document(doc)?;
        let id = loaded.entity.id.clone();
        let view_id = loaded.entity.view_id.clone();

        if ComponentState::from_internal(&loaded.internal) == ComponentState::Pending {
            // A missing timestamp means the document predates the marker; treat it as old
            if let Some(written) = created_at(&loaded.internal) {
                if now - written < grace {
                    return Ok(Settled::Skipped);
                }
            }

            let listed = self.view_lists(&view_id, &id).await?;
            let state = if listed {
                ComponentState::Committed
            } else {
                ComponentState::Abandoned
            };

            let mut internal = loaded.internal;
            internal.insert(STATE_KEY.into(), Value::String(state.as_str().into()));
            let body = encode_document(&loaded.entity, &internal)?;
            match self.store.replace(Collection::Components, &id, loaded.version, body).await {
                Ok(_) => {}
                // Someone else settled or touched it first
                Err(StoreError::VersionMismatch { .. }) | Err(StoreError::Missing { .. }) => {
                    return Ok(Settled::Skipped)
                }
                Err(e) => return Err(e.into()),
            }

            if listed {
                tracing::info!("Sweep committed listed component '{}'", id);
                return Ok(Settled::Committed);
            }
        }

        // An append that was in flight when the view was read may have landed since
        if self.edit_view_list(&view_id, &id, ListEdit::Remove).await? {
            tracing::warn!("Sweep unlisted component '{}' from view '{}' during rollback", id, view_id);
        }
        self.store.delete(Collection::Components, &id).await?;
        tracing::info!("Sweep removed component '{}' not listed by view '{}'", id, view_id);
        Ok(Settled::RolledBack)
    }
}
