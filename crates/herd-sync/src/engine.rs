//! # Sync Engine
//!
//! Replays one client's offline job queue as a single batch.
//!
//! ## Batch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         apply_batch(jobs)                               │
//! │                                                                         │
//! │  BEGIN ─────────────────────────────────────────────────────────────┐  │
//! │   │                                                                  │  │
//! │   │  for job in jobs (array order, never reordered)                  │  │
//! │   │   ├── SAVEPOINT                                                  │  │
//! │   │   ├── resolve entityId / dam / sire / herd / cow via TempIdMap   │  │
//! │   │   ├── dispatch on action                                         │  │
//! │   │   │     create*  → insert, remember(tempId → realId)             │  │
//! │   │   │     update*  → temp target still unknown? merged             │  │
//! │   │   │     delete*  → archive (cow) or remove                       │  │
//! │   │   ├── ok     → RELEASE, outcome ok / merged                      │  │
//! │   │   ├── error  → ROLLBACK TO, outcome error, carry on              │  │
//! │   │   └── fatal  → return Err; dropped tx rolls back everything      │  │
//! │   │                                                                  │  │
//! │  COMMIT ◄────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failing job never undoes the jobs before it. Callers must read every
//! outcome to know what was stored.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use herd_core::{
    is_temp_id, ActionKind, CoreError, CowPatch, EventPatch, HerdPatch, Job, JobAction,
    JobOutcome, JobStatus, RecordId, TaskPatch, TempIdMap, ValidationError,
};
use herd_db::{savepoint, Database, DbError};

use crate::error::{SyncError, SyncResult};
use crate::mutation;

/// Default cap on jobs per batch.
pub const DEFAULT_MAX_JOBS: usize = 5000;

// =============================================================================
// Report
// =============================================================================

/// Everything a batch produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Correlation id, also recorded on the batch's tracing span.
    pub batch_id: Uuid,

    /// One per job, in job order.
    pub results: Vec<JobOutcome>,

    /// Every temp id minted in this batch.
    pub temp_ids: HashMap<RecordId, RecordId>,
}

impl SyncReport {
    pub fn count(&self, status: JobStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Applies job batches against the store.
///
/// ## Usage
/// ```rust,ignore
/// let engine = SyncEngine::new(db.clone()).with_max_jobs(config.sync_max_jobs);
/// let report = engine.apply_batch(jobs).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SyncEngine {
    db: Database,
    max_jobs: usize,
}

impl SyncEngine {
    pub fn new(db: Database) -> Self {
        SyncEngine {
            db,
            max_jobs: DEFAULT_MAX_JOBS,
        }
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    /// Runs every job inside one transaction.
    ///
    /// ## Returns
    /// * `Ok(SyncReport)` - Committed; per-job failures are in the outcomes
    /// * `Err(SyncError)` - Nothing was committed
    pub async fn apply_batch(&self, jobs: Vec<Job>) -> SyncResult<SyncReport> {
        if jobs.len() > self.max_jobs {
            return Err(SyncError::BatchTooLarge {
                count: jobs.len(),
                max: self.max_jobs,
            });
        }

        let batch_id = Uuid::new_v4();
        let span = info_span!("sync_batch", %batch_id, jobs = jobs.len());

        async move {
            let mut tx = self.db.begin().await?;
            let mut ids = TempIdMap::new();
            let mut results = Vec::with_capacity(jobs.len());

            for (index, job) in jobs.iter().enumerate() {
                let outcome = match apply_job(&mut tx, &mut ids, job).await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_fatal() => {
                        error!(index, action = %job.action, error = %e, "Aborting sync batch");
                        return Err(e);
                    }
                    Err(e) => {
                        warn!(index, action = %job.action, error = %e, "Sync job failed");
                        JobOutcome::failed(job, &e)
                    }
                };
                results.push(outcome);
            }

            tx.commit()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

            let report = SyncReport {
                batch_id,
                results,
                temp_ids: ids.to_map(),
            };
            info!(
                ok = report.count(JobStatus::Ok),
                merged = report.count(JobStatus::Merged),
                failed = report.count(JobStatus::Error),
                "Sync batch committed"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }
}

// =============================================================================
// Per-Job Processing
// =============================================================================

/// Runs one job in its own savepoint.
async fn apply_job(
    conn: &mut SqliteConnection,
    ids: &mut TempIdMap,
    job: &Job,
) -> SyncResult<JobOutcome> {
    let mut sp = savepoint(conn).await?;

    match dispatch(&mut sp, ids, job).await {
        Ok(outcome) => {
            sp.commit()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            Ok(outcome)
        }
        Err(e) => {
            sp.rollback()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            Err(e)
        }
    }
}

async fn dispatch(
    conn: &mut SqliteConnection,
    ids: &mut TempIdMap,
    job: &Job,
) -> SyncResult<JobOutcome> {
    let action = job.parsed_action()?;
    debug!(%action, temp_id = ?job.temp_id, entity_id = ?job.entity_id, "Applying job");

    match action.kind() {
        ActionKind::Create => apply_create(conn, ids, job, action).await,
        ActionKind::Update | ActionKind::Delete => apply_change(conn, ids, job, action).await,
    }
}

async fn apply_create(
    conn: &mut SqliteConnection,
    ids: &mut TempIdMap,
    job: &Job,
    action: JobAction,
) -> SyncResult<JobOutcome> {
    // The same create queued twice: the first one already minted the id.
    if let Some(real_id) = job.temp_id.and_then(|t| ids.lookup(&t)) {
        debug!(%action, real_id, "Duplicate create merged");
        return Ok(JobOutcome::merged(job, Some(real_id)));
    }

    let real_id = match action {
        JobAction::CreateHerd => {
            let patch: HerdPatch = job.payload_as()?;
            mutation::create_herd(conn, patch).await?.id
        }
        JobAction::CreateCow => {
            let mut patch: CowPatch = job.payload_as()?;
            reject_own_temp_id(job, &patch)?;
            patch.dam = resolve_nullable(ids, "dam", patch.dam)?;
            patch.sire = resolve_nullable(ids, "sire", patch.sire)?;
            patch.herd = resolve_nullable(ids, "herd", patch.herd)?;
            mutation::create_cow(conn, patch).await?.id
        }
        JobAction::CreateEvent => {
            let mut patch: EventPatch = job.payload_as()?;
            patch.cow = resolve_required(ids, "cow", patch.cow)?;
            mutation::create_event(conn, patch).await?.id
        }
        JobAction::CreateTask => {
            let mut patch: TaskPatch = job.payload_as()?;
            patch.cow = resolve_nullable(ids, "cow", patch.cow)?;
            mutation::create_task(conn, patch).await?.id
        }
        other => return Err(CoreError::UnknownAction(other.to_string()).into()),
    };

    match job.temp_id {
        Some(temp_id) if is_temp_id(temp_id) => ids.remember(temp_id, real_id),
        Some(temp_id) => warn!(temp_id, "Ignoring non-negative tempId"),
        None => {}
    }

    Ok(JobOutcome::ok(job, real_id))
}

async fn apply_change(
    conn: &mut SqliteConnection,
    ids: &TempIdMap,
    job: &Job,
    action: JobAction,
) -> SyncResult<JobOutcome> {
    let entity_id = job.entity_id.ok_or_else(|| ValidationError::Required {
        field: "entityId".to_string(),
    })?;

    let target = ids.resolve(entity_id);
    if is_temp_id(target) {
        // Its create never ran or failed; nothing on the server to change.
        debug!(%action, entity_id, "Unresolved temp target merged");
        return Ok(JobOutcome::merged(job, None));
    }

    match action {
        JobAction::UpdateCow => {
            let mut patch: CowPatch = job.payload_as()?;
            patch.dam = resolve_nullable(ids, "dam", patch.dam)?;
            patch.sire = resolve_nullable(ids, "sire", patch.sire)?;
            patch.herd = resolve_nullable(ids, "herd", patch.herd)?;
            mutation::update_cow(conn, target, &patch).await?;
        }
        JobAction::DeleteCow => mutation::archive_cow(conn, target).await?,
        JobAction::UpdateEvent => {
            let mut patch: EventPatch = job.payload_as()?;
            patch.cow = resolve_required(ids, "cow", patch.cow)?;
            mutation::update_event(conn, target, &patch).await?;
        }
        JobAction::DeleteEvent => mutation::delete_event(conn, target).await?,
        JobAction::UpdateTask => {
            let mut patch: TaskPatch = job.payload_as()?;
            patch.cow = resolve_nullable(ids, "cow", patch.cow)?;
            mutation::update_task(conn, target, &patch).await?;
        }
        JobAction::DeleteTask => mutation::delete_task(conn, target).await?,
        JobAction::DeleteDocument => mutation::delete_document(conn, target).await?,
        other => return Err(CoreError::UnknownAction(other.to_string()).into()),
    }

    Ok(JobOutcome::ok(job, target))
}

// =============================================================================
// Reference Resolution
// =============================================================================

fn resolve_required(
    ids: &TempIdMap,
    field: &str,
    reference: Option<RecordId>,
) -> SyncResult<Option<RecordId>> {
    match reference.map(|r| ids.resolve(r)) {
        Some(id) if is_temp_id(id) => Err(CoreError::UnresolvedReference {
            field: field.to_string(),
            temp_id: id,
        }
        .into()),
        resolved => Ok(resolved),
    }
}

fn resolve_nullable(
    ids: &TempIdMap,
    field: &str,
    reference: Option<Option<RecordId>>,
) -> SyncResult<Option<Option<RecordId>>> {
    match reference {
        Some(inner) => Ok(Some(resolve_required(ids, field, inner)?)),
        None => Ok(None),
    }
}

/// A new cow naming its own temp id as a parent.
fn reject_own_temp_id(job: &Job, patch: &CowPatch) -> SyncResult<()> {
    let Some(temp_id) = job.temp_id else {
        return Ok(());
    };
    for (field, value) in [("dam", patch.dam), ("sire", patch.sire)] {
        if value == Some(Some(temp_id)) {
            return Err(ValidationError::SelfReference {
                field: field.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
