mod codes;
mod encounter;
mod patient;
mod token;
mod user;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub use codes::{CptCode, CptCodeStore, IcdCode, IcdCodeStore, NewCptCode, NewIcdCode};
pub use encounter::{
    DiagnosisLink, Encounter, EncounterStatus, EncounterStore, EncounterUpdate, NewEncounter,
    ProcedureLink,
};
pub use patient::{NewPatient, Patient, PatientStore, PatientUpdate};
pub use token::{RefreshTokenRecord, RefreshTokenStore};
pub use user::{User, UserRole, UserStore, UserSummary, UserUpdate};

/// Whether an error is a UNIQUE constraint violation. The uniqueness checks
/// in the stores are check-then-insert for friendly messages; the constraint
/// is the actual correctness guarantee under concurrency.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(d) if d.is_unique_violation())
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        // An in-memory database lives inside a single connection; a larger
        // pool would hand each connection its own empty database.
        let (options, max_connections) = if path == ":memory:" {
            (SqliteConnectOptions::new().in_memory(true), 1)
        } else {
            (
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true),
                5,
            )
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options.foreign_keys(true))
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Users table. Uniqueness of username and email is enforced
                // here, not only by the pre-insert checks in the store.
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'user',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                // Refresh tokens. Rows are deleted on logout and otherwise go
                // stale past expires_at; staleness is checked at lookup time.
                "CREATE TABLE refresh_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    token TEXT NOT NULL UNIQUE,
                    expires_at INTEGER NOT NULL,
                    created_at INTEGER NOT NULL,
                    CHECK (expires_at > created_at)
                )",
                "CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id)",
                // Patients table
                "CREATE TABLE patients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    date_of_birth TEXT NOT NULL,
                    gender TEXT NOT NULL,
                    address TEXT,
                    phone_number TEXT,
                    email TEXT NOT NULL,
                    insurance_number INTEGER,
                    emergency_contact_name TEXT NOT NULL,
                    emergency_contact_phone TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_patients_name ON patients(name)",
                // Encounters table
                "CREATE TABLE encounters (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
                    date_of_service TEXT NOT NULL,
                    provider_name TEXT NOT NULL,
                    notes TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    discharge_date TEXT,
                    type_of_service TEXT NOT NULL,
                    location TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_encounters_patient_id ON encounters(patient_id)",
                "CREATE INDEX idx_encounters_status ON encounters(status)",
                // Diagnosis code catalog
                "CREATE TABLE icd_codes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    code TEXT NOT NULL UNIQUE,
                    description TEXT NOT NULL,
                    category TEXT NOT NULL,
                    sub_category TEXT NOT NULL
                )",
                // Procedure code catalog
                "CREATE TABLE cpt_codes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    code TEXT NOT NULL UNIQUE,
                    description TEXT NOT NULL,
                    category TEXT NOT NULL,
                    relative_value_unit REAL NOT NULL
                )",
                // Diagnoses attached to encounters
                "CREATE TABLE encounter_diagnoses (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    encounter_id INTEGER NOT NULL REFERENCES encounters(id) ON DELETE CASCADE,
                    icd_code_id INTEGER NOT NULL REFERENCES icd_codes(id),
                    diagnosis_order INTEGER
                )",
                "CREATE INDEX idx_encounter_diagnoses_encounter ON encounter_diagnoses(encounter_id)",
                // Procedures attached to encounters
                "CREATE TABLE encounter_procedures (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    encounter_id INTEGER NOT NULL REFERENCES encounters(id) ON DELETE CASCADE,
                    cpt_code_id INTEGER NOT NULL REFERENCES cpt_codes(id),
                    procedure_date TEXT
                )",
                "CREATE INDEX idx_encounter_procedures_encounter ON encounter_procedures(encounter_id)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the refresh token store.
    pub fn tokens(&self) -> RefreshTokenStore {
        RefreshTokenStore::new(self.pool.clone())
    }

    /// Get the patient store.
    pub fn patients(&self) -> PatientStore {
        PatientStore::new(self.pool.clone())
    }

    /// Get the encounter store.
    pub fn encounters(&self) -> EncounterStore {
        EncounterStore::new(self.pool.clone())
    }

    /// Get the ICD code catalog store.
    pub fn icd_codes(&self) -> IcdCodeStore {
        IcdCodeStore::new(self.pool.clone())
    }

    /// Get the CPT code catalog store.
    pub fn cpt_codes(&self) -> CptCodeStore {
        CptCodeStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap liveness check used by the health endpoint.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();

        let user = db.users().find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, UserRole::User);

        let user = db.users().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();
        let result = db
            .users()
            .create("bob", "a@x.com", "hash", UserRole::User)
            .await;

        assert!(matches!(&result, Err(e) if is_unique_violation(e)));
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create("alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();
        let result = db
            .users()
            .create("alice", "b@x.com", "hash", UserRole::User)
            .await;

        assert!(matches!(&result, Err(e) if is_unique_violation(e)));
    }

    #[tokio::test]
    async fn test_update_user_fields() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();

        let updated = db
            .users()
            .update(
                id,
                &UserUpdate {
                    username: None,
                    email: Some("alice@x.com".to_string()),
                    role: Some(UserRole::Admin),
                },
            )
            .await
            .unwrap();
        assert!(updated);

        let user = db.users().find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@x.com");
        assert_eq!(user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_empty_update_is_a_noop() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create("alice", "a@x.com", "hash", UserRole::User)
            .await
            .unwrap();

        let updated = db
            .users()
            .update(
                id,
                &UserUpdate {
                    username: None,
                    email: None,
                    role: None,
                },
            )
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_list_users_paginates_in_insertion_order() {
        let db = Database::open(":memory:").await.unwrap();

        for i in 0..5 {
            db.users()
                .create(
                    &format!("user{}", i),
                    &format!("u{}@x.com", i),
                    "hash",
                    UserRole::User,
                )
                .await
                .unwrap();
        }

        let (users, total) = db.users().list(1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "user0");

        let (users, _) = db.users().list(3, 2).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "user4");

        assert_eq!(db.users().count().await.unwrap(), 5);
    }
}
