// admin.rs
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::events::{ChangeEvent, ChangeKind};
use crate::polls;

/// Outcome of an activation toggle. The caller needs to tell a missing poll
/// apart from a toggle that was already in the requested state.
#[derive(Debug)]
pub enum ToggleOutcome {
    NotFound,
    Unchanged { is_active: bool },
    Updated { is_active: bool, event: ChangeEvent },
}

#[derive(Debug)]
pub struct ClearOutcome {
    pub deleted: u64,
    pub event: ChangeEvent,
}

pub async fn toggle_poll(
    pool: &SqlitePool,
    poll_id: &str,
    is_active: bool,
) -> Result<ToggleOutcome, AppError> {
    let Some(definition) = polls::get_definition(pool, poll_id).await? else {
        return Ok(ToggleOutcome::NotFound);
    };
    if definition.is_active == is_active {
        return Ok(ToggleOutcome::Unchanged { is_active });
    }

    if !polls::set_active(pool, poll_id, is_active).await? {
        // deleted out from under us between the read and the write
        return Ok(ToggleOutcome::NotFound);
    }
    tracing::info!(poll_id, is_active, "poll activation toggled");
    Ok(ToggleOutcome::Updated {
        is_active,
        event: ChangeEvent::new(ChangeKind::PollToggled, Some(poll_id)),
    })
}

/// Deleting zero responses is a normal result, not an error; a missing poll
/// is surfaced as not-found rather than a silent success.
pub async fn clear_poll(pool: &SqlitePool, poll_id: &str) -> Result<ClearOutcome, AppError> {
    match polls::clear_responses(pool, poll_id).await? {
        Some(deleted) => Ok(ClearOutcome {
            deleted,
            event: ChangeEvent::new(ChangeKind::ResponsesCleared, Some(poll_id)),
        }),
        None => Err(AppError::PollNotFound(poll_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::{NewPoll, NewPollOption};

    async fn seed(pool: &SqlitePool) {
        let def = NewPoll {
            poll_id: "lunch-pref".to_string(),
            title: "Lunch preference".to_string(),
            description: String::new(),
            options: vec![NewPollOption {
                option_id: "pizza".to_string(),
                text: "Pizza".to_string(),
            }],
        };
        polls::ensure_definition_exists(pool, &def).await.unwrap();
    }

    #[tokio::test]
    async fn toggle_distinguishes_its_three_outcomes() {
        let pool = test_pool().await;
        assert!(matches!(
            toggle_poll(&pool, "lunch-pref", false).await.unwrap(),
            ToggleOutcome::NotFound
        ));

        seed(&pool).await;
        // seeded active, so requesting active again is a no-op
        assert!(matches!(
            toggle_poll(&pool, "lunch-pref", true).await.unwrap(),
            ToggleOutcome::Unchanged { is_active: true }
        ));
        assert!(matches!(
            toggle_poll(&pool, "lunch-pref", false).await.unwrap(),
            ToggleOutcome::Updated {
                is_active: false,
                ..
            }
        ));
        // and back again
        assert!(matches!(
            toggle_poll(&pool, "lunch-pref", true).await.unwrap(),
            ToggleOutcome::Updated { is_active: true, .. }
        ));
    }

    #[tokio::test]
    async fn clear_reports_zero_and_not_found_differently() {
        let pool = test_pool().await;
        let err = clear_poll(&pool, "lunch-pref").await.unwrap_err();
        assert!(matches!(err, AppError::PollNotFound(_)));

        seed(&pool).await;
        let outcome = clear_poll(&pool, "lunch-pref").await.unwrap();
        assert_eq!(outcome.deleted, 0);
    }
}
