//! # Sync Jobs
//!
//! Wire types for the offline mutation queue.
//!
//! A client records every mutation it makes while offline as a [`Job`]. On
//! reconnect it posts the whole queue; the server answers with one
//! [`JobOutcome`] per job, in order.
//!
//! ## Job Lifecycle
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Job (wire)  │────►│  JobAction   │────►│  JobOutcome  │
//! │  action: str │     │  parsed verb │     │  ok          │
//! │  tempId      │     │  + kind      │     │  merged      │
//! │  entityId    │     │              │     │  error       │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! `action` stays a string on the wire so that an unknown verb fails one job
//! instead of the whole request body.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};
use crate::types::RecordId;

// =============================================================================
// Job
// =============================================================================

/// One queued offline mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Client-side queue position, echoed back in the outcome.
    #[serde(default, rename = "id")]
    pub queue_id: Option<i64>,

    /// Provisional id the client minted for a create.
    #[serde(default)]
    pub temp_id: Option<RecordId>,

    /// Target of an update or delete; may itself be a temp id.
    #[serde(default)]
    pub entity_id: Option<RecordId>,

    pub action: String,

    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub payload: serde_json::Value,
}

impl Job {
    /// Parses the verb.
    pub fn parsed_action(&self) -> Result<JobAction, CoreError> {
        self.action.parse()
    }

    /// Deserialises the payload into a patch type. A missing payload reads as `{}`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        let value = match &self.payload {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| ValidationError::InvalidFormat {
            field: "payload".to_string(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Job Action
// =============================================================================

/// Whether a verb creates, updates or deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

/// Every verb the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    CreateHerd,
    CreateCow,
    UpdateCow,
    DeleteCow,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    CreateTask,
    UpdateTask,
    DeleteTask,
    DeleteDocument,
}

impl JobAction {
    pub fn kind(self) -> ActionKind {
        match self {
            JobAction::CreateHerd
            | JobAction::CreateCow
            | JobAction::CreateEvent
            | JobAction::CreateTask => ActionKind::Create,
            JobAction::UpdateCow | JobAction::UpdateEvent | JobAction::UpdateTask => {
                ActionKind::Update
            }
            JobAction::DeleteCow
            | JobAction::DeleteEvent
            | JobAction::DeleteTask
            | JobAction::DeleteDocument => ActionKind::Delete,
        }
    }

    /// Wire spelling of the verb.
    pub fn as_str(self) -> &'static str {
        match self {
            JobAction::CreateHerd => "createHerd",
            JobAction::CreateCow => "createCow",
            JobAction::UpdateCow => "updateCow",
            JobAction::DeleteCow => "deleteCow",
            JobAction::CreateEvent => "createEvent",
            JobAction::UpdateEvent => "updateEvent",
            JobAction::DeleteEvent => "deleteEvent",
            JobAction::CreateTask => "createTask",
            JobAction::UpdateTask => "updateTask",
            JobAction::DeleteTask => "deleteTask",
            JobAction::DeleteDocument => "deleteDocument",
        }
    }
}

impl FromStr for JobAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "createHerd" => JobAction::CreateHerd,
            "createCow" => JobAction::CreateCow,
            "updateCow" => JobAction::UpdateCow,
            "deleteCow" => JobAction::DeleteCow,
            "createEvent" => JobAction::CreateEvent,
            "updateEvent" => JobAction::UpdateEvent,
            "deleteEvent" => JobAction::DeleteEvent,
            "createTask" => JobAction::CreateTask,
            "updateTask" => JobAction::UpdateTask,
            "deleteTask" => JobAction::DeleteTask,
            "deleteDocument" => JobAction::DeleteDocument,
            other => return Err(CoreError::UnknownAction(other.to_string())),
        };
        Ok(action)
    }
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Job Outcome
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Applied.
    Ok,
    /// Nothing to do; the target was already in the requested state or
    /// never reached the server.
    Merged,
    /// Rejected; the rest of the batch carried on.
    Error,
}

/// Per-job result returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    #[serde(rename = "id", skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<RecordId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<RecordId>,

    pub action: String,

    pub status: JobStatus,

    /// Server id the job created or touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_id: Option<RecordId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobOutcome {
    fn from_job(job: &Job, status: JobStatus) -> Self {
        JobOutcome {
            queue_id: job.queue_id,
            temp_id: job.temp_id,
            entity_id: job.entity_id,
            action: job.action.clone(),
            status,
            real_id: None,
            error: None,
        }
    }

    pub fn ok(job: &Job, real_id: RecordId) -> Self {
        JobOutcome {
            real_id: Some(real_id),
            ..Self::from_job(job, JobStatus::Ok)
        }
    }

    pub fn merged(job: &Job, real_id: Option<RecordId>) -> Self {
        JobOutcome {
            real_id,
            ..Self::from_job(job, JobStatus::Merged)
        }
    }

    pub fn failed(job: &Job, error: impl ToString) -> Self {
        JobOutcome {
            error: Some(error.to_string()),
            ..Self::from_job(job, JobStatus::Error)
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
