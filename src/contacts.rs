// contacts.rs
use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::identity;
use crate::models::{Contact, ContactRequest, ContactWithTags, Interaction, Tag};

/// Tag stamped on every contact that turns out to have voted.
const POLL_PARTICIPANT_TAG: &str = "poll-participant";

pub async fn create_contact(
    pool: &SqlitePool,
    request: &ContactRequest,
    ip_hash: &str,
) -> Result<Contact, AppError> {
    let unique_id = identity::new_unique_id("CT");
    let inserted = sqlx::query(
        "INSERT INTO contacts (unique_id, name, email, company, phone, notes, ip_hash, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, 'new', ?)",
    )
    .bind(&unique_id)
    .bind(&request.name)
    .bind(&request.email)
    .bind(&request.company)
    .bind(&request.phone)
    .bind(&request.notes)
    .bind(ip_hash)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    tracing::info!(contact = %unique_id, "contact created");
    fetch_by_id(pool, inserted.last_insert_rowid()).await
}

pub async fn get_contact(
    pool: &SqlitePool,
    unique_id: &str,
) -> Result<Option<Contact>, AppError> {
    let contact = sqlx::query_as::<_, Contact>(
        "SELECT id, unique_id, name, email, company, phone, notes, ip_hash, status, created_at
         FROM contacts WHERE unique_id = ?",
    )
    .bind(unique_id)
    .fetch_optional(pool)
    .await?;
    Ok(contact)
}

async fn fetch_by_id(pool: &SqlitePool, id: i64) -> Result<Contact, AppError> {
    let contact = sqlx::query_as::<_, Contact>(
        "SELECT id, unique_id, name, email, company, phone, notes, ip_hash, status, created_at
         FROM contacts WHERE id = ?",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(contact)
}

/// Attach prior anonymous poll activity to a freshly created contact.
/// Best-effort: the contact is already durable, so any failure here is
/// logged and swallowed rather than bubbled up to the form submission.
/// Returns how many responses were linked.
pub async fn link_contact(
    pool: &SqlitePool,
    contact: &Contact,
    client_token: Option<&str>,
) -> u64 {
    match try_link(pool, contact, client_token).await {
        Ok(linked) => {
            if linked > 0 {
                tracing::info!(contact = %contact.unique_id, linked, "linked prior poll activity");
            }
            linked
        }
        Err(e) => {
            tracing::warn!(contact = %contact.unique_id, error = %e, "contact linking failed");
            0
        }
    }
}

async fn try_link(
    pool: &SqlitePool,
    contact: &Contact,
    client_token: Option<&str>,
) -> Result<u64, AppError> {
    let token = client_token.unwrap_or("");
    let mut tx = pool.begin().await?;

    // Only responses nobody has claimed yet; an earlier link wins.
    let linked = sqlx::query(
        "UPDATE poll_responses SET contact_unique_id = ?
         WHERE contact_unique_id IS NULL
           AND (ip_hash = ? OR (? <> '' AND client_token = ?))",
    )
    .bind(&contact.unique_id)
    .bind(&contact.ip_hash)
    .bind(token)
    .bind(token)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if linked > 0 {
        sqlx::query("INSERT OR IGNORE INTO contact_tags (name) VALUES (?)")
            .bind(POLL_PARTICIPANT_TAG)
            .execute(&mut *tx)
            .await?;
        let tag_id: i64 = sqlx::query_scalar("SELECT id FROM contact_tags WHERE name = ?")
            .bind(POLL_PARTICIPANT_TAG)
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO contact_tag_mapping (contact_id, tag_id) VALUES (?, ?)")
            .bind(contact.id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO contact_interactions (contact_id, kind, note, created_at)
             VALUES (?, 'poll-link', ?, ?)",
        )
        .bind(contact.id)
        .bind(format!("Linked {linked} poll response(s) from earlier activity"))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(linked)
}

/// Newest first, each with its tag names.
pub async fn list_contacts(pool: &SqlitePool) -> Result<Vec<ContactWithTags>, AppError> {
    let contacts = sqlx::query_as::<_, Contact>(
        "SELECT id, unique_id, name, email, company, phone, notes, ip_hash, status, created_at
         FROM contacts ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(contacts.len());
    for contact in contacts {
        let tags = tags_for(pool, contact.id).await?;
        out.push(ContactWithTags { contact, tags });
    }
    Ok(out)
}

pub async fn tags_for(pool: &SqlitePool, contact_id: i64) -> Result<Vec<Tag>, AppError> {
    let tags = sqlx::query_as::<_, Tag>(
        "SELECT t.id, t.name FROM contact_tags t
         JOIN contact_tag_mapping m ON m.tag_id = t.id
         WHERE m.contact_id = ? ORDER BY t.name",
    )
    .bind(contact_id)
    .fetch_all(pool)
    .await?;
    Ok(tags)
}

/// Status lifecycle is free-form (new → contacted → qualified/closed by
/// convention); the admin picks the words.
pub async fn update_status(
    pool: &SqlitePool,
    unique_id: &str,
    status: &str,
) -> Result<Contact, AppError> {
    let updated = sqlx::query("UPDATE contacts SET status = ? WHERE unique_id = ?")
        .bind(status)
        .bind(unique_id)
        .execute(pool)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(AppError::ContactNotFound(unique_id.to_string()));
    }
    get_contact(pool, unique_id)
        .await?
        .ok_or_else(|| AppError::ContactNotFound(unique_id.to_string()))
}

pub async fn add_interaction(
    pool: &SqlitePool,
    unique_id: &str,
    kind: &str,
    note: &str,
) -> Result<Interaction, AppError> {
    let contact_id: Option<i64> = sqlx::query_scalar("SELECT id FROM contacts WHERE unique_id = ?")
        .bind(unique_id)
        .fetch_optional(pool)
        .await?;
    let contact_id = contact_id.ok_or_else(|| AppError::ContactNotFound(unique_id.to_string()))?;

    let inserted = sqlx::query(
        "INSERT INTO contact_interactions (contact_id, kind, note, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(contact_id)
    .bind(kind)
    .bind(note)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let interaction = sqlx::query_as::<_, Interaction>(
        "SELECT id, contact_id, kind, note, created_at FROM contact_interactions WHERE id = ?",
    )
    .bind(inserted.last_insert_rowid())
    .fetch_one(pool)
    .await?;
    Ok(interaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::{NewPoll, NewPollOption};
    use crate::polls;
    use crate::votes;

    fn request(name: &str, token: Option<&str>) -> ContactRequest {
        ContactRequest {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            company: Some("Acme".to_string()),
            phone: None,
            notes: None,
            client_token: token.map(str::to_string),
        }
    }

    async fn seed_poll_with_vote(pool: &SqlitePool, token: &str, ip: &str) {
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
        votes::submit_vote(
            pool,
            "lunch-pref",
            &identity::resolve(ip, token),
            &["pizza".to_string()],
            None,
        )
        .await
        .unwrap();
    }

    async fn interaction_notes(pool: &SqlitePool, contact_id: i64) -> Vec<String> {
        sqlx::query_scalar("SELECT note FROM contact_interactions WHERE contact_id = ?")
            .bind(contact_id)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn linking_stamps_tag_and_interaction() {
        let pool = test_pool().await;
        seed_poll_with_vote(&pool, "a1", "10.0.0.1").await;

        let contact = create_contact(&pool, &request("Dana", None), &identity::hash_ip("10.0.0.1"))
            .await
            .unwrap();
        let linked = link_contact(&pool, &contact, None).await;
        assert_eq!(linked, 1);

        let stamped: Option<String> =
            sqlx::query_scalar("SELECT contact_unique_id FROM poll_responses LIMIT 1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stamped.as_deref(), Some(contact.unique_id.as_str()));

        let tags = tags_for(&pool, contact.id).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "poll-participant");
        let notes = interaction_notes(&pool, contact.id).await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("1 poll response"));
    }

    #[tokio::test]
    async fn linking_matches_on_the_submitted_client_token_too() {
        let pool = test_pool().await;
        seed_poll_with_vote(&pool, "a1", "10.0.0.1").await;

        // form submitted from a different network, but the page passed along
        // the same client token the voting page stored
        let contact = create_contact(&pool, &request("Dana", Some("a1")), &identity::hash_ip("172.16.0.9"))
            .await
            .unwrap();
        assert_eq!(link_contact(&pool, &contact, Some("a1")).await, 1);
    }

    #[tokio::test]
    async fn linking_without_matches_is_a_quiet_noop() {
        let pool = test_pool().await;
        let contact = create_contact(&pool, &request("Dana", None), &identity::hash_ip("10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(link_contact(&pool, &contact, None).await, 0);
        assert!(tags_for(&pool, contact.id).await.unwrap().is_empty());
        assert!(interaction_notes(&pool, contact.id).await.is_empty());
    }

    #[tokio::test]
    async fn an_earlier_link_is_not_overwritten() {
        let pool = test_pool().await;
        seed_poll_with_vote(&pool, "a1", "10.0.0.1").await;

        let first = create_contact(&pool, &request("Dana", None), &identity::hash_ip("10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(link_contact(&pool, &first, None).await, 1);

        let second = create_contact(&pool, &request("Riley", None), &identity::hash_ip("10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(link_contact(&pool, &second, None).await, 0);

        let stamped: Option<String> =
            sqlx::query_scalar("SELECT contact_unique_id FROM poll_responses LIMIT 1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stamped.as_deref(), Some(first.unique_id.as_str()));
    }

    #[tokio::test]
    async fn status_updates_require_an_existing_contact() {
        let pool = test_pool().await;
        let err = update_status(&pool, "CT-unknown", "contacted")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ContactNotFound(_)));

        let contact = create_contact(&pool, &request("Dana", None), &identity::hash_ip("10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(contact.status, "new");
        let updated = update_status(&pool, &contact.unique_id, "qualified")
            .await
            .unwrap();
        assert_eq!(updated.status, "qualified");
    }

    #[tokio::test]
    async fn interactions_append_to_the_log() {
        let pool = test_pool().await;
        let contact = create_contact(&pool, &request("Dana", None), &identity::hash_ip("10.0.0.1"))
            .await
            .unwrap();

        add_interaction(&pool, &contact.unique_id, "call", "Left a voicemail")
            .await
            .unwrap();
        add_interaction(&pool, &contact.unique_id, "email", "Sent the deck")
            .await
            .unwrap();
        assert_eq!(interaction_notes(&pool, contact.id).await.len(), 2);

        let err = add_interaction(&pool, "CT-unknown", "call", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ContactNotFound(_)));
    }

    #[tokio::test]
    async fn list_includes_tags() {
        let pool = test_pool().await;
        seed_poll_with_vote(&pool, "a1", "10.0.0.1").await;
        let contact = create_contact(&pool, &request("Dana", None), &identity::hash_ip("10.0.0.1"))
            .await
            .unwrap();
        link_contact(&pool, &contact, None).await;

        let listed = list_contacts(&pool).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].tags.len(), 1);
        assert_eq!(listed[0].tags[0].name, "poll-participant");
    }
}
