//! Diagnosis (ICD) and procedure (CPT) code catalogs.

use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct IcdCode {
    pub id: i64,
    pub code: String,
    pub description: String,
    pub category: String,
    pub sub_category: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct NewIcdCode {
    pub code: String,
    pub description: String,
    pub category: String,
    pub sub_category: String,
}

#[derive(Clone)]
pub struct IcdCodeStore {
    pool: SqlitePool,
}

impl IcdCodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a catalog entry. Fails with a UNIQUE violation on a duplicate code.
    pub async fn create(&self, entry: &NewIcdCode) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO icd_codes (code, description, category, sub_category) VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.code)
        .bind(&entry.description)
        .bind(&entry.category)
        .bind(&entry.sub_category)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<IcdCode>, sqlx::Error> {
        let row: Option<IcdCode> = sqlx::query_as(
            "SELECT id, code, description, category, sub_category FROM icd_codes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list(&self, page: u32, limit: u32) -> Result<(Vec<IcdCode>, i64), sqlx::Error> {
        let offset = (page.saturating_sub(1)) as i64 * limit as i64;
        let rows: Vec<IcdCode> = sqlx::query_as(
            "SELECT id, code, description, category, sub_category
             FROM icd_codes ORDER BY code LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = self.count().await?;
        Ok((rows, total))
    }

    /// Search by code prefix or description substring.
    pub async fn search(&self, query: &str) -> Result<Vec<IcdCode>, sqlx::Error> {
        let code_pattern = format!("{}%", query);
        let text_pattern = format!("%{}%", query);
        let rows: Vec<IcdCode> = sqlx::query_as(
            "SELECT id, code, description, category, sub_category
             FROM icd_codes WHERE code LIKE ? OR description LIKE ?
             ORDER BY code LIMIT 50",
        )
        .bind(code_pattern)
        .bind(text_pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update(&self, id: i64, entry: &NewIcdCode) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE icd_codes SET code = ?, description = ?, category = ?, sub_category = ?
             WHERE id = ?",
        )
        .bind(&entry.code)
        .bind(&entry.description)
        .bind(&entry.category)
        .bind(&entry.sub_category)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM icd_codes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM icd_codes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CptCode {
    pub id: i64,
    pub code: String,
    pub description: String,
    pub category: String,
    pub relative_value_unit: f64,
}

#[derive(Debug, serde::Deserialize)]
pub struct NewCptCode {
    pub code: String,
    pub description: String,
    pub category: String,
    pub relative_value_unit: f64,
}

#[derive(Clone)]
pub struct CptCodeStore {
    pool: SqlitePool,
}

impl CptCodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a catalog entry. Fails with a UNIQUE violation on a duplicate code.
    pub async fn create(&self, entry: &NewCptCode) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO cpt_codes (code, description, category, relative_value_unit)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&entry.code)
        .bind(&entry.description)
        .bind(&entry.category)
        .bind(entry.relative_value_unit)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<CptCode>, sqlx::Error> {
        let row: Option<CptCode> = sqlx::query_as(
            "SELECT id, code, description, category, relative_value_unit
             FROM cpt_codes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list(&self, page: u32, limit: u32) -> Result<(Vec<CptCode>, i64), sqlx::Error> {
        let offset = (page.saturating_sub(1)) as i64 * limit as i64;
        let rows: Vec<CptCode> = sqlx::query_as(
            "SELECT id, code, description, category, relative_value_unit
             FROM cpt_codes ORDER BY code LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = self.count().await?;
        Ok((rows, total))
    }

    /// Search by code prefix or description substring.
    pub async fn search(&self, query: &str) -> Result<Vec<CptCode>, sqlx::Error> {
        let code_pattern = format!("{}%", query);
        let text_pattern = format!("%{}%", query);
        let rows: Vec<CptCode> = sqlx::query_as(
            "SELECT id, code, description, category, relative_value_unit
             FROM cpt_codes WHERE code LIKE ? OR description LIKE ?
             ORDER BY code LIMIT 50",
        )
        .bind(code_pattern)
        .bind(text_pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update(&self, id: i64, entry: &NewCptCode) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE cpt_codes SET code = ?, description = ?, category = ?, relative_value_unit = ?
             WHERE id = ?",
        )
        .bind(&entry.code)
        .bind(&entry.description)
        .bind(&entry.category)
        .bind(entry.relative_value_unit)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cpt_codes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cpt_codes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
