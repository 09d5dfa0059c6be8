// polls.rs
use chrono::Utc;
use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::models::{NewPoll, NewPollOption, OptionTally, PollDefinition, PollOption};

/// Idempotent create. An existing definition is returned untouched: its
/// option set is NOT re-synced from `def`, so a live poll's options cannot
/// drift out from under already-recorded responses. Changing a deployed
/// poll's options requires a new poll_id.
pub async fn ensure_definition_exists(
    pool: &SqlitePool,
    def: &NewPoll,
) -> Result<PollDefinition, AppError> {
    if let Some(existing) = get_definition(pool, &def.poll_id).await? {
        return Ok(existing);
    }

    let mut tx = pool.begin().await?;
    let inserted = sqlx::query(
        "INSERT INTO poll_definitions (poll_id, title, description, is_active, created_at)
         VALUES (?, ?, ?, 1, ?)",
    )
    .bind(&def.poll_id)
    .bind(&def.title)
    .bind(&def.description)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await;

    match inserted {
        Ok(done) => {
            let definition_id = done.last_insert_rowid();
            for (order, option) in def.options.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO poll_options (poll_definition_id, option_id, text, display_order)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(definition_id)
                .bind(&option.option_id)
                .bind(&option.text)
                .bind(order as i64)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            tracing::info!(poll_id = %def.poll_id, options = def.options.len(), "poll definition created");
        }
        // Lost a concurrent creation race on poll_id; the winner's row stands.
        Err(e) if db::is_unique_violation(&e) => drop(tx),
        Err(e) => return Err(e.into()),
    }

    get_definition(pool, &def.poll_id)
        .await?
        .ok_or_else(|| AppError::PollNotFound(def.poll_id.clone()))
}

pub async fn get_definition(
    pool: &SqlitePool,
    poll_id: &str,
) -> Result<Option<PollDefinition>, AppError> {
    let definition = sqlx::query_as::<_, PollDefinition>(
        "SELECT id, poll_id, title, description, is_active, created_at
         FROM poll_definitions WHERE poll_id = ?",
    )
    .bind(poll_id)
    .fetch_optional(pool)
    .await?;
    Ok(definition)
}

pub async fn get_options(
    pool: &SqlitePool,
    poll_definition_id: i64,
) -> Result<Vec<PollOption>, AppError> {
    let options = sqlx::query_as::<_, PollOption>(
        "SELECT id, poll_definition_id, option_id, text, display_order
         FROM poll_options WHERE poll_definition_id = ? ORDER BY display_order",
    )
    .bind(poll_definition_id)
    .fetch_all(pool)
    .await?;
    Ok(options)
}

/// Per-option vote counts in display order, zero-filled for options nobody
/// has picked. Always recomputed from the responses; no cached counts.
pub async fn get_tally(pool: &SqlitePool, poll_id: &str) -> Result<Vec<OptionTally>, AppError> {
    let definition_id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM poll_definitions WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_optional(pool)
            .await?;
    let definition_id = definition_id.ok_or_else(|| AppError::PollNotFound(poll_id.to_string()))?;

    let tally = sqlx::query_as::<_, OptionTally>(
        "SELECT o.option_id, o.text, COUNT(ro.id) AS votes
         FROM poll_options o
         LEFT JOIN poll_response_options ro ON ro.poll_option_id = o.id
         WHERE o.poll_definition_id = ?
         GROUP BY o.id
         ORDER BY o.display_order",
    )
    .bind(definition_id)
    .fetch_all(pool)
    .await?;
    Ok(tally)
}

/// Returns false when no such poll exists; the caller decides whether that
/// becomes a 404.
pub async fn set_active(
    pool: &SqlitePool,
    poll_id: &str,
    is_active: bool,
) -> Result<bool, AppError> {
    let updated = sqlx::query("UPDATE poll_definitions SET is_active = ? WHERE poll_id = ?")
        .bind(is_active)
        .bind(poll_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(updated > 0)
}

/// Deletes every response for the poll together with its option joins.
/// The definition itself survives. `None` means the poll does not exist.
pub async fn clear_responses(pool: &SqlitePool, poll_id: &str) -> Result<Option<u64>, AppError> {
    let mut tx = pool.begin().await?;

    let definition_id: Option<i64> =
        sqlx::query_scalar("SELECT id FROM poll_definitions WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(definition_id) = definition_id else {
        return Ok(None);
    };

    sqlx::query(
        "DELETE FROM poll_response_options WHERE poll_response_id IN
         (SELECT id FROM poll_responses WHERE poll_definition_id = ?)",
    )
    .bind(definition_id)
    .execute(&mut *tx)
    .await?;

    let deleted = sqlx::query("DELETE FROM poll_responses WHERE poll_definition_id = ?")
        .bind(definition_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    tracing::info!(poll_id, deleted, "poll responses cleared");
    Ok(Some(deleted))
}

/// Polls shipped with the deck. Safe to call on every startup; existing
/// definitions are left as they are.
pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), AppError> {
    for def in default_polls() {
        ensure_definition_exists(pool, &def).await?;
    }
    Ok(())
}

fn default_polls() -> Vec<NewPoll> {
    fn option(option_id: &str, text: &str) -> NewPollOption {
        NewPollOption {
            option_id: option_id.to_string(),
            text: text.to_string(),
        }
    }

    vec![
        NewPoll {
            poll_id: "biggest-challenge".to_string(),
            title: "What is your team's biggest challenge right now?".to_string(),
            description: "Pick the one that hurts the most.".to_string(),
            options: vec![
                option("hiring", "Hiring and onboarding"),
                option("legacy", "Legacy systems"),
                option("alignment", "Cross-team alignment"),
                option("tooling", "Developer tooling"),
            ],
        },
        NewPoll {
            poll_id: "team-size".to_string(),
            title: "How many people are on your team?".to_string(),
            description: String::new(),
            options: vec![
                option("solo", "Just me"),
                option("small", "2-5"),
                option("medium", "6-15"),
                option("large", "16+"),
            ],
        },
        NewPoll {
            poll_id: "followup-topics".to_string(),
            title: "Which topics should the follow-up session cover?".to_string(),
            description: "Multiple answers welcome.".to_string(),
            options: vec![
                option("deep-dive", "Architecture deep dive"),
                option("qa", "Open Q&A"),
                option("hands-on", "Hands-on workshop"),
                option("case-study", "Customer case study"),
            ],
        },
    ]
}
