// handlers.rs
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::admin::{self, ToggleOutcome};
use crate::contacts;
use crate::error::AppError;
use crate::events::{ChangeEvent, ChangeKind};
use crate::identity;
use crate::models::{
    ClearResponse, Contact, ContactOutcome, ContactRequest, ContactStatusRequest, ContactWithTags,
    Interaction, InteractionRequest, PollResponse, PollState, StatusOutcome, StatusRequest,
    VoteOutcome, VoteRequest,
};
use crate::polls;
use crate::votes;

#[derive(Debug, Deserialize)]
pub struct PollStateQuery {
    pub token: Option<String>,
}

/// First hop of X-Forwarded-For, then X-Real-IP. No header at all yields the
/// empty string, which hashes to the shared fallback identity.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Poll state for one viewer: definition, options, tally, and whether this
/// caller already voted (same query the recorder dedups with).
pub async fn get_poll(
    State(pool): State<SqlitePool>,
    Path(poll_id): Path<String>,
    Query(query): Query<PollStateQuery>,
    headers: HeaderMap,
) -> Result<Json<PollState>, AppError> {
    let poll = polls::get_definition(&pool, &poll_id)
        .await?
        .ok_or_else(|| AppError::PollNotFound(poll_id.clone()))?;
    let options = polls::get_options(&pool, poll.id).await?;
    let tally = polls::get_tally(&pool, &poll_id).await?;

    let voter = identity::resolve(&client_ip(&headers), query.token.as_deref().unwrap_or(""));
    let already_voted = votes::has_voted(&pool, poll.id, &voter).await?;

    Ok(Json(PollState {
        poll,
        options,
        tally,
        already_voted,
    }))
}

/// Record a vote. Duplicates come back as a normal 200 with
/// `already_voted: true` and the current tally.
pub async fn vote(
    State(pool): State<SqlitePool>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteOutcome>, AppError> {
    let voter = identity::resolve(&client_ip(&headers), &request.client_token);
    let outcome = votes::submit_vote(
        &pool,
        &poll_id,
        &voter,
        &request.option_ids,
        request.metadata,
    )
    .await?;
    Ok(Json(outcome))
}

/// Contact form submission: persist the lead, then best-effort link any
/// prior anonymous poll activity. Linking never fails the request.
pub async fn create_contact(
    State(pool): State<SqlitePool>,
    headers: HeaderMap,
    Json(request): Json<ContactRequest>,
) -> Result<Json<ContactOutcome>, AppError> {
    let ip_hash = identity::hash_ip(&client_ip(&headers));
    let contact = contacts::create_contact(&pool, &request, &ip_hash).await?;
    let linked = contacts::link_contact(&pool, &contact, request.client_token.as_deref()).await;
    let event = (linked > 0).then(|| ChangeEvent::new(ChangeKind::ContactLinked, None));

    Ok(Json(ContactOutcome {
        contact,
        linked_responses: linked,
        event,
    }))
}

/// Toggle a poll's active flag (admin).
pub async fn set_poll_status(
    State(pool): State<SqlitePool>,
    Path(poll_id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<StatusOutcome>, AppError> {
    match admin::toggle_poll(&pool, &poll_id, request.is_active).await? {
        ToggleOutcome::NotFound => Err(AppError::PollNotFound(poll_id)),
        ToggleOutcome::Unchanged { is_active } => Ok(Json(StatusOutcome {
            poll_id,
            is_active,
            changed: false,
            event: None,
        })),
        ToggleOutcome::Updated { is_active, event } => Ok(Json(StatusOutcome {
            poll_id,
            is_active,
            changed: true,
            event: Some(event),
        })),
    }
}

/// Raw response rows for a poll (admin results view).
pub async fn list_poll_responses(
    State(pool): State<SqlitePool>,
    Path(poll_id): Path<String>,
) -> Result<Json<Vec<PollResponse>>, AppError> {
    Ok(Json(votes::list_responses(&pool, &poll_id).await?))
}

/// Delete every response for a poll (admin). Zero deleted is a valid result.
pub async fn clear_poll(
    State(pool): State<SqlitePool>,
    Path(poll_id): Path<String>,
) -> Result<Json<ClearResponse>, AppError> {
    let outcome = admin::clear_poll(&pool, &poll_id).await?;
    Ok(Json(ClearResponse {
        poll_id,
        deleted: outcome.deleted,
        event: outcome.event,
    }))
}

/// Lead list for the dashboard, newest first.
pub async fn list_contacts(
    State(pool): State<SqlitePool>,
) -> Result<Json<Vec<ContactWithTags>>, AppError> {
    Ok(Json(contacts::list_contacts(&pool).await?))
}

pub async fn update_contact_status(
    State(pool): State<SqlitePool>,
    Path(unique_id): Path<String>,
    Json(request): Json<ContactStatusRequest>,
) -> Result<Json<Contact>, AppError> {
    Ok(Json(
        contacts::update_status(&pool, &unique_id, &request.status).await?,
    ))
}

pub async fn add_interaction(
    State(pool): State<SqlitePool>,
    Path(unique_id): Path<String>,
    Json(request): Json<InteractionRequest>,
) -> Result<Json<Interaction>, AppError> {
    Ok(Json(
        contacts::add_interaction(&pool, &unique_id, &request.kind, &request.note).await?,
    ))
}
