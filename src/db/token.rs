use sqlx::sqlite::SqlitePool;

/// Authoritative record of which refresh tokens are currently valid.
/// Rows are removed on logout; expired rows are left in place and filtered
/// out at lookup time.
#[derive(Clone)]
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: i64,
    pub created_at: i64,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a newly issued refresh token. Returns the record ID.
    pub async fn insert(
        &self,
        user_id: i64,
        token: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expires_at, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Find a stored token that matches both the owning user and the exact
    /// token string, and has not expired. The user binding matters: the
    /// caller has already verified the token signature, and this lookup must
    /// not accept a token row belonging to a different user.
    pub async fn find_active(
        &self,
        user_id: i64,
        token: &str,
        now: i64,
    ) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        let row: Option<RefreshTokenRecord> = sqlx::query_as(
            "SELECT id, user_id, token, expires_at, created_at
             FROM refresh_tokens
             WHERE user_id = ? AND token = ? AND expires_at > ?
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All stored tokens for a user, newest first, including expired rows.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<RefreshTokenRecord>, sqlx::Error> {
        let rows: Vec<RefreshTokenRecord> = sqlx::query_as(
            "SELECT id, user_id, token, expires_at, created_at
             FROM refresh_tokens WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Delete a token row. Returns whether a row was deleted; a second
    /// delete of the same token reports not-found.
    pub async fn delete(&self, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pure expiry check, for distinguishing "not found" from "found but
    /// expired" in diagnostics.
    pub fn is_expired(expires_at: i64, now: i64) -> bool {
        expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, UserRole};

    async fn setup() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = db
            .users()
            .create("alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();
        (db, user_id)
    }

    #[tokio::test]
    async fn test_insert_and_find_active() {
        let (db, user_id) = setup().await;
        let now = 1_000;

        db.tokens()
            .insert(user_id, "tok-1", now + 100, now)
            .await
            .unwrap();

        let found = db
            .tokens()
            .find_active(user_id, "tok-1", now)
            .await
            .unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().user_id, user_id);
    }

    #[tokio::test]
    async fn test_find_active_requires_matching_user() {
        let (db, user_id) = setup().await;
        let other_id = db
            .users()
            .create("bob", "b@x.com", "hash", UserRole::User)
            .await
            .unwrap();
        let now = 1_000;

        db.tokens()
            .insert(user_id, "tok-1", now + 100, now)
            .await
            .unwrap();

        let found = db
            .tokens()
            .find_active(other_id, "tok-1", now)
            .await
            .unwrap();
        assert!(found.is_none(), "Token must be bound to its owner");
    }

    #[tokio::test]
    async fn test_find_active_filters_expired() {
        let (db, user_id) = setup().await;
        let now = 1_000;

        db.tokens()
            .insert(user_id, "tok-1", now + 100, now)
            .await
            .unwrap();

        let found = db
            .tokens()
            .find_active(user_id, "tok-1", now + 100)
            .await
            .unwrap();
        assert!(found.is_none(), "Expiry is exclusive: expires_at > now");
        assert!(RefreshTokenStore::is_expired(now + 100, now + 100));
        assert!(!RefreshTokenStore::is_expired(now + 100, now + 99));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_from_callers_view() {
        let (db, user_id) = setup().await;
        let now = 1_000;

        db.tokens()
            .insert(user_id, "tok-1", now + 100, now)
            .await
            .unwrap();

        assert!(db.tokens().delete("tok-1").await.unwrap());
        assert!(!db.tokens().delete("tok-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_multiple_tokens_per_user() {
        let (db, user_id) = setup().await;
        let now = 1_000;

        db.tokens()
            .insert(user_id, "tok-1", now + 100, now)
            .await
            .unwrap();
        db.tokens()
            .insert(user_id, "tok-2", now + 100, now + 1)
            .await
            .unwrap();

        let tokens = db.tokens().list_by_user(user_id).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token, "tok-2");
    }

    #[tokio::test]
    async fn test_duplicate_token_string_rejected() {
        let (db, user_id) = setup().await;
        let now = 1_000;

        db.tokens()
            .insert(user_id, "tok-1", now + 100, now)
            .await
            .unwrap();
        let result = db.tokens().insert(user_id, "tok-1", now + 200, now).await;

        assert!(matches!(&result, Err(e) if crate::db::is_unique_violation(e)));
    }
}
