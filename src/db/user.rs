use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }

    /// Strict parse used for request input, where an unknown role is a
    /// validation error rather than a silent downgrade.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// Full credential record. Only the session service sees this; everything
/// crossing the API boundary is a [`UserSummary`] without the hash.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: String,
    updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role: UserRole::from_str(&row.role),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Sanitized user view for listings and profiles.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct UserSummaryRow {
    id: i64,
    username: String,
    email: String,
    role: String,
    created_at: String,
    updated_at: String,
}

impl From<UserSummaryRow> for UserSummary {
    fn from(row: UserSummaryRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            role: UserRole::from_str(&row.role),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Partial profile update. Only these three fields are mutable; anything
/// else a client posts is dropped before it reaches the store.
#[derive(Debug, Default, serde::Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Returns the user ID. Fails with a UNIQUE violation
    /// if the username or email is already taken.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, password_hash, role, created_at, updated_at
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, password_hash, role, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Apply a partial profile update. Returns false when no mutable field
    /// was present or no row matched.
    pub async fn update(&self, id: i64, update: &UserUpdate) -> Result<bool, sqlx::Error> {
        let mut sets: Vec<&'static str> = Vec::new();
        if update.username.is_some() {
            sets.push("username = ?");
        }
        if update.email.is_some() {
            sets.push("email = ?");
        }
        if update.role.is_some() {
            sets.push("role = ?");
        }
        if sets.is_empty() {
            return Ok(false);
        }

        let sql = format!(
            "UPDATE users SET {}, updated_at = datetime('now') WHERE id = ?",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        if let Some(username) = &update.username {
            query = query.bind(username);
        }
        if let Some(email) = &update.email {
            query = query.bind(email);
        }
        if let Some(role) = &update.role {
            query = query.bind(role.as_str());
        }

        let result = query.bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Total number of users.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// List users in insertion order. `page` is 1-based; the caller clamps
    /// `limit` to a sane range.
    pub async fn list(&self, page: u32, limit: u32) -> Result<(Vec<UserSummary>, i64), sqlx::Error> {
        let offset = (page.saturating_sub(1)) as i64 * limit as i64;
        let rows: Vec<UserSummaryRow> = sqlx::query_as(
            "SELECT id, username, email, role, created_at, updated_at
             FROM users ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = self.count().await?;
        Ok((rows.into_iter().map(UserSummary::from).collect(), total))
    }
}
