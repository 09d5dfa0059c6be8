// models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;

use crate::events::ChangeEvent;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PollDefinition {
    pub id: i64,
    pub poll_id: String,
    pub title: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PollOption {
    pub id: i64,
    pub poll_definition_id: i64,
    /// Stable option code, unique within its poll.
    pub option_id: String,
    pub text: String,
    pub display_order: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PollResponse {
    pub id: i64,
    pub poll_definition_id: i64,
    pub client_token: String,
    pub ip_hash: String,
    pub unique_id: String,
    /// Back-reference to a contact, null until linked.
    pub contact_unique_id: Option<String>,
    /// Free-form client context (user agent, screen size, slide id).
    /// Persisted, never interpreted.
    pub metadata: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

/// One row of a poll's tally, ordered by `display_order`. Options nobody has
/// voted for are present with `votes` = 0.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OptionTally {
    pub option_id: String,
    pub text: String,
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Contact {
    pub id: i64,
    pub unique_id: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub ip_hash: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Interaction {
    pub id: i64,
    pub contact_id: i64,
    pub kind: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// Seed shape for `polls::ensure_definition_exists`.
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub poll_id: String,
    pub title: String,
    pub description: String,
    pub options: Vec<NewPollOption>,
}

#[derive(Debug, Clone)]
pub struct NewPollOption {
    pub option_id: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub client_token: String,
    pub option_ids: Vec<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct VoteOutcome {
    pub already_voted: bool,
    pub tally: Vec<OptionTally>,
    /// Present only when a new response was recorded.
    pub event: Option<ChangeEvent>,
}

#[derive(Debug, Serialize)]
pub struct PollState {
    pub poll: PollDefinition,
    pub options: Vec<PollOption>,
    pub tally: Vec<OptionTally>,
    pub already_voted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    /// Lets the form correlate the sender with their earlier anonymous votes.
    pub client_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContactOutcome {
    pub contact: Contact,
    pub linked_responses: u64,
    pub event: Option<ChangeEvent>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusOutcome {
    pub poll_id: String,
    pub is_active: bool,
    pub changed: bool,
    pub event: Option<ChangeEvent>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub poll_id: String,
    pub deleted: u64,
    pub event: ChangeEvent,
}

#[derive(Debug, Deserialize)]
pub struct ContactStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub kind: String,
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct ContactWithTags {
    #[serde(flatten)]
    pub contact: Contact,
    pub tags: Vec<Tag>,
}
