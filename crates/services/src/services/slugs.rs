//! Picking free slugs for new rows.

use std::future::Future;

use utils::slug::{is_valid_slug, next_available, slugify};

use super::error::ServiceError;

/// Inserts are retried this many times when a concurrent insert takes the slug.
pub const MAX_SLUG_ATTEMPTS: u32 = 5;

/// Slug base for a new row: the requested slug if given, else one derived
/// from `name`.
pub fn base_slug(name: &str, requested: Option<&str>, fallback: &str) -> Result<String, ServiceError> {
    match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if is_valid_slug(slug) => Ok(slug.to_string()),
        Some(slug) => Err(ServiceError::bad_request(format!("invalid slug '{slug}'"))),
        None => Ok(slugify(name, fallback)),
    }
}

/// Runs `insert` with the first free slug derived from `base`, re-reading the
/// taken slugs and retrying when the insert loses a race on the unique index.
pub async fn insert_with_unique_slug<T, Taken, TakenFut, Insert, InsertFut>(
    base: &str,
    mut taken: Taken,
    mut insert: Insert,
) -> Result<T, ServiceError>
where
    Taken: FnMut() -> TakenFut,
    TakenFut: Future<Output = Result<Vec<String>, sqlx::Error>>,
    Insert: FnMut(String) -> InsertFut,
    InsertFut: Future<Output = Result<T, sqlx::Error>>,
{
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let slug = next_available(base, &taken().await?);
        match insert(slug.clone()).await {
            Ok(row) => return Ok(row),
            Err(e) if db::is_unique_violation(&e) => {
                tracing::debug!(%slug, attempt, "slug taken concurrently, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(ServiceError::conflict(format!(
        "could not allocate a unique slug for '{base}'"
    )))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn requested_slug_wins_over_name() {
        assert_eq!(base_slug("Acme", Some("custom"), "org").unwrap(), "custom");
        assert_eq!(base_slug("Acme Corp", None, "org").unwrap(), "acme-corp");
        assert_eq!(base_slug("Acme Corp", Some("  "), "org").unwrap(), "acme-corp");
        assert!(matches!(
            base_slug("Acme", Some("Not A Slug"), "org"),
            Err(ServiceError::BadRequest(_))
        ));
    }

    /// Any non unique-violation error; real unique violations are covered by
    /// the database flow tests.
    fn protocol_error() -> sqlx::Error {
        sqlx::Error::Protocol("connection reset".into())
    }

    #[tokio::test]
    async fn skips_taken_slugs() {
        let slug = insert_with_unique_slug(
            "acme",
            || async { Ok(vec!["acme".to_string(), "acme-1".to_string()]) },
            |slug| async move { Ok::<_, sqlx::Error>(slug) },
        )
        .await
        .unwrap();
        assert_eq!(slug, "acme-2");
    }

    #[tokio::test]
    async fn other_insert_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<String, _> = insert_with_unique_slug(
            "acme",
            || async { Ok(Vec::new()) },
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(protocol_error()) }
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Database(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
