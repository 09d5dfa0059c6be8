// votes.rs
//
// The vote recorder. A voter gets exactly one response per poll, matched on
// either identity signal (client token or ip hash). The duplicate check here
// is layered: a fast-path read, a re-check inside the insert transaction,
// and finally the unique indexes on poll_responses, which are the source of
// truth when everything else races.
use chrono::Utc;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::events::{ChangeEvent, ChangeKind};
use crate::identity::{self, VoterIdentity};
use crate::models::{PollResponse, VoteOutcome};
use crate::polls;

async fn find_existing<'e, E>(
    executor: E,
    poll_definition_id: i64,
    voter: &VoterIdentity,
) -> Result<Option<i64>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_scalar(
        "SELECT id FROM poll_responses
         WHERE poll_definition_id = ? AND (client_token = ? OR ip_hash = ?)",
    )
    .bind(poll_definition_id)
    .bind(&voter.client_token)
    .bind(&voter.ip_hash)
    .fetch_optional(executor)
    .await
}

/// Same query the recorder uses for dedup, exposed for the poll-state read.
pub async fn has_voted(
    pool: &SqlitePool,
    poll_definition_id: i64,
    voter: &VoterIdentity,
) -> Result<bool, AppError> {
    Ok(find_existing(pool, poll_definition_id, voter)
        .await?
        .is_some())
}

/// Raw responses for a poll, oldest first, for the results view.
pub async fn list_responses(
    pool: &SqlitePool,
    poll_id: &str,
) -> Result<Vec<PollResponse>, AppError> {
    let definition = polls::get_definition(pool, poll_id)
        .await?
        .ok_or_else(|| AppError::PollNotFound(poll_id.to_string()))?;

    let responses = sqlx::query_as::<_, PollResponse>(
        "SELECT id, poll_definition_id, client_token, ip_hash, unique_id,
                contact_unique_id, metadata, created_at
         FROM poll_responses WHERE poll_definition_id = ? ORDER BY id",
    )
    .bind(definition.id)
    .fetch_all(pool)
    .await?;
    Ok(responses)
}

async fn duplicate_outcome(pool: &SqlitePool, poll_id: &str) -> Result<VoteOutcome, AppError> {
    Ok(VoteOutcome {
        already_voted: true,
        tally: polls::get_tally(pool, poll_id).await?,
        event: None,
    })
}

/// Records a vote, or reports `already_voted` with the current tally when
/// this voter has one on file. A missing poll is the only fatal condition;
/// duplicates and unknown option codes are normal outcomes.
pub async fn submit_vote(
    pool: &SqlitePool,
    poll_id: &str,
    voter: &VoterIdentity,
    option_ids: &[String],
    metadata: Option<Value>,
) -> Result<VoteOutcome, AppError> {
    let definition = polls::get_definition(pool, poll_id)
        .await?
        .ok_or_else(|| AppError::PollNotFound(poll_id.to_string()))?;

    if find_existing(pool, definition.id, voter).await?.is_some() {
        return duplicate_outcome(pool, poll_id).await;
    }

    let options = polls::get_options(pool, definition.id).await?;

    // If this person already filled in the contact form, stamp the response
    // with their contact up front so the linker has nothing left to do.
    let contact_unique_id: Option<String> = sqlx::query_scalar(
        "SELECT unique_id FROM contacts WHERE ip_hash = ?
         ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .bind(&voter.ip_hash)
    .fetch_optional(pool)
    .await?;

    let unique_id = identity::new_unique_id("PV");

    let mut tx = pool.begin().await?;

    // A concurrent submission may have committed between the fast path and
    // here; re-check before writing.
    if find_existing(&mut *tx, definition.id, voter).await?.is_some() {
        tx.rollback().await?;
        tracing::info!(poll_id, "duplicate vote caught by in-transaction re-check");
        return duplicate_outcome(pool, poll_id).await;
    }

    let inserted = sqlx::query(
        "INSERT INTO poll_responses
         (poll_definition_id, client_token, ip_hash, unique_id, contact_unique_id, metadata, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(definition.id)
    .bind(&voter.client_token)
    .bind(&voter.ip_hash)
    .bind(&unique_id)
    .bind(&contact_unique_id)
    .bind(metadata.map(Json))
    .bind(Utc::now())
    .execute(&mut *tx)
    .await;

    let response_id = match inserted {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if db::is_unique_violation(&e) => {
            drop(tx);
            tracing::info!(poll_id, "duplicate vote rejected by the storage constraint");
            return duplicate_outcome(pool, poll_id).await;
        }
        Err(e) => return Err(e.into()),
    };

    for code in option_ids {
        match options.iter().find(|o| &o.option_id == code) {
            Some(option) => {
                sqlx::query(
                    "INSERT INTO poll_response_options (poll_response_id, poll_option_id)
                     VALUES (?, ?)",
                )
                .bind(response_id)
                .bind(option.id)
                .execute(&mut *tx)
                .await?;
            }
            None => tracing::warn!(poll_id, option = %code, "skipping unknown option code"),
        }
    }

    tx.commit().await?;
    tracing::debug!(poll_id, unique_id = %unique_id, "vote recorded");

    Ok(VoteOutcome {
        already_voted: false,
        tally: polls::get_tally(pool, poll_id).await?,
        event: Some(ChangeEvent::new(ChangeKind::VoteRecorded, Some(poll_id))),
    })
}
