// events.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    VoteRecorded,
    PollToggled,
    ResponsesCleared,
    ContactLinked,
}

/// Emitted after every successful mutating operation. The core only decides
/// "what changed"; relaying it to other viewers (WebSocket, SSE, polling) is
/// the caller's transport problem.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub event_id: Uuid,
    pub kind: ChangeKind,
    pub poll_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, poll_id: Option<&str>) -> Self {
        ChangeEvent {
            event_id: Uuid::new_v4(),
            kind,
            poll_id: poll_id.map(str::to_string),
            at: Utc::now(),
        }
    }
}
