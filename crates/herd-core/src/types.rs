//! # Domain Types
//!
//! Records kept by the herd book and the partial payloads that mutate them.
//!
//! ## Record Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Records                                  │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Herd       │◄──│       Cow       │──►│      Cow        │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  (dam / sire)   │       │
//! │  │  id             │   │  id (store)     │   └─────────────────┘       │
//! │  │  name (unique)  │   │  tag (business) │                             │
//! │  └─────────────────┘   │  status         │                             │
//! │                        └───────┬─────────┘                             │
//! │                                │                                        │
//! │         ┌──────────────────────┼──────────────────────┐                │
//! │  ┌──────┴──────┐        ┌──────┴──────┐        ┌──────┴──────┐         │
//! │  │    Event    │        │    Task     │        │  Document   │         │
//! │  └─────────────┘        └─────────────┘        └─────────────┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity
//! - `id`: integer assigned by the store, used for every relation
//! - `tag`: the ear tag, human-entered, what spreadsheets refer to
//!
//! ## Patches
//! Each `*Patch` is the payload of a create or update. A field left out of
//! the payload is `None` and leaves the stored value alone. Nullable fields
//! are `Option<Option<T>>` so an explicit `null` clears the value.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::DEFAULT_BREED;

/// Store-assigned identity. Negative values are client temp ids.
pub type RecordId = i64;

/// Distinguishes "field absent" from "field explicitly null".
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// =============================================================================
// Gender
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum Gender {
    #[serde(rename = "M")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "M"))]
    Male,
    #[default]
    #[serde(rename = "F")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "F"))]
    Female,
}

impl Gender {
    /// Coerces free text from a register into a gender.
    ///
    /// Anything mentioning a female token is `F`; every other non-empty
    /// value is `M`.
    ///
    /// ```rust
    /// use herd_core::Gender;
    ///
    /// assert_eq!(Gender::from_keyword("Heifer"), Gender::Female);
    /// assert_eq!(Gender::from_keyword("female"), Gender::Female);
    /// assert_eq!(Gender::from_keyword("bull"), Gender::Male);
    /// ```
    pub fn from_keyword(text: &str) -> Self {
        const FEMALE_TOKENS: [&str; 4] = ["female", "heifer", "cow", "dam"];

        let lowered = text.trim().to_lowercase();
        if lowered == "f" || FEMALE_TOKENS.iter().any(|t| lowered.contains(t)) {
            Gender::Female
        } else {
            Gender::Male
        }
    }
}

// =============================================================================
// Cow Status
// =============================================================================

/// Lifecycle state of a cow. Deleting a cow only ever moves it to `Archived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum CowStatus {
    #[default]
    Active,
    Sold,
    Archived,
}

impl CowStatus {
    /// Coerces free text from a register into a status, defaulting to
    /// `Active`.
    ///
    /// ```rust
    /// use herd_core::CowStatus;
    ///
    /// assert_eq!(CowStatus::from_keyword("Sold 2023"), CowStatus::Sold);
    /// assert_eq!(CowStatus::from_keyword("archived"), CowStatus::Archived);
    /// assert_eq!(CowStatus::from_keyword("in herd"), CowStatus::Active);
    /// assert_eq!(CowStatus::from_keyword("not for sale"), CowStatus::Active);
    /// ```
    pub fn from_keyword(text: &str) -> Self {
        const ARCHIVED_TOKENS: [&str; 5] = ["archiv", "dead", "deceased", "slaughter", "cull"];

        let lowered = text.trim().to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let negated = words.contains(&"not");
        let sold = words.iter().any(|w| w.starts_with("sold") || *w == "sale");

        if sold && !negated {
            CowStatus::Sold
        } else if ARCHIVED_TOKENS.iter().any(|t| lowered.contains(t)) {
            CowStatus::Archived
        } else {
            CowStatus::Active
        }
    }
}

// =============================================================================
// Herd
// =============================================================================

/// A named grouping of cows. The importer creates one per sheet prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Herd {
    pub id: RecordId,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Payload of `createHerd`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HerdPatch {
    #[serde(default)]
    pub name: Option<String>,
}

impl HerdPatch {
    /// Returns the trimmed herd name, or a validation error if missing.
    pub fn into_name(self) -> Result<String, ValidationError> {
        self.name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ValidationError::Required {
                field: "name".to_string(),
            })
    }
}

// =============================================================================
// Cow
// =============================================================================

/// One animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Cow {
    pub id: RecordId,

    /// Ear tag - unique across the whole store.
    pub tag: String,

    pub name: String,

    pub breed: String,

    #[ts(as = "Option<String>")]
    pub birth_date: Option<NaiveDate>,

    pub gender: Gender,

    pub status: CowStatus,

    pub passport_number: Option<String>,

    /// Mother. Never equal to `id`.
    #[serde(rename = "dam")]
    pub dam_id: Option<RecordId>,

    /// Father. Never equal to `id`.
    #[serde(rename = "sire")]
    pub sire_id: Option<RecordId>,

    #[serde(rename = "herd")]
    pub herd_id: Option<RecordId>,

    #[ts(as = "Option<String>")]
    pub exit_date: Option<NaiveDate>,

    pub exit_reason: Option<String>,

    /// Sale price in cents.
    pub sale_price_cents: Option<i64>,

    #[ts(as = "Option<String>")]
    pub meat_delivery_date: Option<NaiveDate>,

    pub notes: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cow {
    /// Returns the sale price as Money.
    pub fn sale_price(&self) -> Option<Money> {
        self.sale_price_cents.map(Money::from_cents)
    }
}

/// A cow that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCow {
    pub tag: String,
    pub name: String,
    pub breed: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Gender,
    pub status: CowStatus,
    pub passport_number: Option<String>,
    pub dam_id: Option<RecordId>,
    pub sire_id: Option<RecordId>,
    pub herd_id: Option<RecordId>,
    pub exit_date: Option<NaiveDate>,
    pub exit_reason: Option<String>,
    pub sale_price_cents: Option<i64>,
    pub meat_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl NewCow {
    /// A cow with only identity fields set and everything else defaulted.
    pub fn new(tag: impl Into<String>, name: impl Into<String>) -> Self {
        NewCow {
            tag: tag.into(),
            name: name.into(),
            breed: DEFAULT_BREED.to_string(),
            birth_date: None,
            gender: Gender::default(),
            status: CowStatus::default(),
            passport_number: None,
            dam_id: None,
            sire_id: None,
            herd_id: None,
            exit_date: None,
            exit_reason: None,
            sale_price_cents: None,
            meat_delivery_date: None,
            notes: None,
        }
    }
}

/// Payload of `createCow` / `updateCow` and of one imported register row.
///
/// Any client-supplied `id` is not part of this type and is dropped on
/// deserialisation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CowPatch {
    #[serde(default, alias = "tag_id")]
    pub tag: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub breed: Option<String>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub birth_date: Option<Option<NaiveDate>>,

    #[serde(default)]
    pub gender: Option<Gender>,

    #[serde(default)]
    pub status: Option<CowStatus>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub passport_number: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub dam: Option<Option<RecordId>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub sire: Option<Option<RecordId>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub herd: Option<Option<RecordId>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub exit_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub exit_reason: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub sale_price_cents: Option<Option<i64>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub meat_delivery_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
}

impl CowPatch {
    /// Overwrites every field present in the patch.
    pub fn apply(&self, cow: &mut Cow) {
        if let Some(tag) = &self.tag {
            cow.tag = tag.trim().to_string();
        }
        if let Some(name) = &self.name {
            cow.name = name.trim().to_string();
        }
        if let Some(breed) = &self.breed {
            cow.breed = breed.trim().to_string();
        }
        if let Some(gender) = self.gender {
            cow.gender = gender;
        }
        if let Some(status) = self.status {
            cow.status = status;
        }
        if let Some(v) = self.birth_date {
            cow.birth_date = v;
        }
        if let Some(v) = &self.passport_number {
            cow.passport_number = v.clone();
        }
        if let Some(v) = self.dam {
            cow.dam_id = v;
        }
        if let Some(v) = self.sire {
            cow.sire_id = v;
        }
        if let Some(v) = self.herd {
            cow.herd_id = v;
        }
        if let Some(v) = self.exit_date {
            cow.exit_date = v;
        }
        if let Some(v) = &self.exit_reason {
            cow.exit_reason = v.clone();
        }
        if let Some(v) = self.sale_price_cents {
            cow.sale_price_cents = v;
        }
        if let Some(v) = self.meat_delivery_date {
            cow.meat_delivery_date = v;
        }
        if let Some(v) = &self.notes {
            cow.notes = v.clone();
        }
    }

    /// Builds a new cow from the patch. `tag` and `name` are required.
    pub fn into_new_cow(self) -> Result<NewCow, ValidationError> {
        let tag = required(self.tag, "tag")?;
        let name = required(self.name, "name")?;

        let mut cow = NewCow::new(tag, name);
        if let Some(breed) = self.breed {
            cow.breed = breed.trim().to_string();
        }
        cow.gender = self.gender.unwrap_or_default();
        cow.status = self.status.unwrap_or_default();
        cow.birth_date = self.birth_date.flatten();
        cow.passport_number = self.passport_number.flatten();
        cow.dam_id = self.dam.flatten();
        cow.sire_id = self.sire.flatten();
        cow.herd_id = self.herd.flatten();
        cow.exit_date = self.exit_date.flatten();
        cow.exit_reason = self.exit_reason.flatten();
        cow.sale_price_cents = self.sale_price_cents.flatten();
        cow.meat_delivery_date = self.meat_delivery_date.flatten();
        cow.notes = self.notes.flatten();
        Ok(cow)
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ValidationError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::Required {
            field: field.to_string(),
        })
}

// =============================================================================
// Event
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Treatment,
    Vaccination,
    Calving,
    Checkup,
    #[default]
    Other,
}

/// Something that happened to a cow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Event {
    pub id: RecordId,
    #[serde(rename = "cow")]
    pub cow_id: RecordId,
    pub event_type: EventType,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub cow_id: RecordId,
    pub event_type: EventType,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

/// Payload of `createEvent` / `updateEvent`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventPatch {
    #[serde(default)]
    pub cow: Option<RecordId>,

    #[serde(default)]
    pub event_type: Option<EventType>,

    #[serde(default)]
    pub date: Option<NaiveDate>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
}

impl EventPatch {
    pub fn apply(&self, event: &mut Event) {
        if let Some(cow) = self.cow {
            event.cow_id = cow;
        }
        if let Some(event_type) = self.event_type {
            event.event_type = event_type;
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(notes) = &self.notes {
            event.notes = notes.clone();
        }
    }

    /// Builds a new event. `cow` and `date` are required.
    pub fn into_new_event(self) -> Result<NewEvent, ValidationError> {
        Ok(NewEvent {
            cow_id: self.cow.ok_or_else(|| ValidationError::Required {
                field: "cow".to_string(),
            })?,
            event_type: self.event_type.unwrap_or_default(),
            date: self.date.ok_or_else(|| ValidationError::Required {
                field: "date".to_string(),
            })?,
            notes: self.notes.flatten(),
        })
    }
}

// =============================================================================
// Task
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    VetVisit,
    Vaccination,
    Examination,
    Grooming,
    #[default]
    Other,
}

/// A scheduled chore, optionally about one cow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    pub task_type: TaskType,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    #[serde(rename = "cow")]
    pub cow_id: Option<RecordId>,
    pub is_completed: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub task_type: TaskType,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub cow_id: Option<RecordId>,
    pub is_completed: bool,
}

/// Payload of `createTask` / `updateTask`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub task_type: Option<TaskType>,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub cow: Option<Option<RecordId>>,

    #[serde(default)]
    pub is_completed: Option<bool>,
}

impl TaskPatch {
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(task_type) = self.task_type {
            task.task_type = task_type;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(notes) = &self.notes {
            task.notes = notes.clone();
        }
        if let Some(cow) = self.cow {
            task.cow_id = cow;
        }
        if let Some(done) = self.is_completed {
            task.is_completed = done;
        }
    }

    /// Builds a new task. `title` and `due_date` are required.
    pub fn into_new_task(self) -> Result<NewTask, ValidationError> {
        Ok(NewTask {
            title: required(self.title, "title")?,
            task_type: self.task_type.unwrap_or_default(),
            due_date: self.due_date.ok_or_else(|| ValidationError::Required {
                field: "due_date".to_string(),
            })?,
            notes: self.notes.flatten(),
            cow_id: self.cow.flatten(),
            is_completed: self.is_completed.unwrap_or(false),
        })
    }
}

// =============================================================================
// Document
// =============================================================================

/// Metadata of a file attached to a cow. The bytes live elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Document {
    pub id: RecordId,
    #[serde(rename = "cow")]
    pub cow_id: RecordId,
    pub title: String,
    pub file_name: String,
    #[ts(as = "String")]
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub cow_id: RecordId,
    pub title: String,
    pub file_name: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored_cow() -> Cow {
        let now = Utc::now();
        Cow {
            id: 5,
            tag: "PL-5".to_string(),
            name: "Morag".to_string(),
            breed: DEFAULT_BREED.to_string(),
            birth_date: None,
            gender: Gender::Female,
            status: CowStatus::Active,
            passport_number: Some("P-1".to_string()),
            dam_id: Some(2),
            sire_id: None,
            herd_id: None,
            exit_date: None,
            exit_reason: None,
            sale_price_cents: None,
            meat_delivery_date: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: CowPatch = serde_json::from_value(json!({
            "name": "Ealasaid",
            "dam": null,
        }))
        .unwrap();

        assert_eq!(patch.dam, Some(None));
        assert_eq!(patch.sire, None);

        let mut cow = stored_cow();
        patch.apply(&mut cow);
        assert_eq!(cow.name, "Ealasaid");
        assert_eq!(cow.dam_id, None);
        assert_eq!(cow.passport_number.as_deref(), Some("P-1"));
    }

    #[test]
    fn test_patch_accepts_tag_id_alias_and_drops_id() {
        let patch: CowPatch = serde_json::from_value(json!({
            "id": -4,
            "tag_id": "PL-9",
            "name": "Heather",
        }))
        .unwrap();

        let cow = patch.into_new_cow().unwrap();
        assert_eq!(cow.tag, "PL-9");
        assert_eq!(cow.breed, DEFAULT_BREED);
        assert_eq!(cow.status, CowStatus::Active);
    }

    #[test]
    fn test_new_cow_requires_tag_and_name() {
        let missing_tag = CowPatch {
            name: Some("Nameless".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            missing_tag.into_new_cow(),
            Err(ValidationError::Required { field }) if field == "tag"
        ));

        let blank_name = CowPatch {
            tag: Some("PL-1".to_string()),
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank_name.into_new_cow().is_err());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(CowStatus::Archived).unwrap(),
            json!("ARCHIVED")
        );
        assert_eq!(serde_json::to_value(Gender::Male).unwrap(), json!("M"));
        assert_eq!(
            serde_json::to_value(TaskType::VetVisit).unwrap(),
            json!("VET_VISIT")
        );
    }

    #[test]
    fn test_gender_keywords() {
        assert_eq!(Gender::from_keyword("F"), Gender::Female);
        assert_eq!(Gender::from_keyword("Female"), Gender::Female);
        assert_eq!(Gender::from_keyword("male"), Gender::Male);
        assert_eq!(Gender::from_keyword("Bullock"), Gender::Male);
    }

    #[test]
    fn test_status_keywords() {
        assert_eq!(CowStatus::from_keyword("SOLD"), CowStatus::Sold);
        assert_eq!(CowStatus::from_keyword("Sale 2023"), CowStatus::Sold);
        assert_eq!(CowStatus::from_keyword("sold-to-neighbour"), CowStatus::Sold);
        assert_eq!(CowStatus::from_keyword("not for sale"), CowStatus::Active);
        assert_eq!(CowStatus::from_keyword("not sold"), CowStatus::Active);
        assert_eq!(CowStatus::from_keyword("wholesale herd"), CowStatus::Active);
        assert_eq!(CowStatus::from_keyword("unsold"), CowStatus::Active);
        assert_eq!(CowStatus::from_keyword("Culled"), CowStatus::Archived);
        assert_eq!(CowStatus::from_keyword(""), CowStatus::Active);
    }

    #[test]
    fn test_task_patch_requires_title_and_due_date() {
        let patch: TaskPatch = serde_json::from_value(json!({
            "title": "Hoof trimming",
            "due_date": "2024-05-01",
            "cow": null,
        }))
        .unwrap();
        let task = patch.into_new_task().unwrap();
        assert_eq!(task.task_type, TaskType::Other);
        assert_eq!(task.cow_id, None);

        let patch: TaskPatch = serde_json::from_value(json!({ "title": "No date" })).unwrap();
        assert!(patch.into_new_task().is_err());
    }
}
