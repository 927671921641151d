use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct PatientStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub email: String,
    pub insurance_number: Option<i64>,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub email: String,
    pub insurance_number: Option<i64>,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
}

/// Partial patient update; absent fields are left untouched.
#[derive(Debug, Default, serde::Deserialize)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub insurance_number: Option<i64>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

const PATIENT_COLUMNS: &str = "id, name, date_of_birth, gender, address, phone_number, email,
    insurance_number, emergency_contact_name, emergency_contact_phone, created_at, updated_at";

impl PatientStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a patient record. Returns the patient ID.
    pub async fn create(&self, patient: &NewPatient) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO patients (name, date_of_birth, gender, address, phone_number, email,
                insurance_number, emergency_contact_name, emergency_contact_phone)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&patient.name)
        .bind(&patient.date_of_birth)
        .bind(&patient.gender)
        .bind(&patient.address)
        .bind(&patient.phone_number)
        .bind(&patient.email)
        .bind(patient.insurance_number)
        .bind(&patient.emergency_contact_name)
        .bind(&patient.emergency_contact_phone)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Patient>, sqlx::Error> {
        let row: Option<Patient> =
            sqlx::query_as(&format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    /// List patients in insertion order. `page` is 1-based.
    pub async fn list(&self, page: u32, limit: u32) -> Result<(Vec<Patient>, i64), sqlx::Error> {
        let offset = (page.saturating_sub(1)) as i64 * limit as i64;
        let rows: Vec<Patient> = sqlx::query_as(&format!(
            "SELECT {} FROM patients ORDER BY id LIMIT ? OFFSET ?",
            PATIENT_COLUMNS
        ))
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = self.count().await?;
        Ok((rows, total))
    }

    /// Case-insensitive name search.
    pub async fn search(&self, query: &str) -> Result<Vec<Patient>, sqlx::Error> {
        let pattern = format!("%{}%", query);
        let rows: Vec<Patient> = sqlx::query_as(&format!(
            "SELECT {} FROM patients WHERE name LIKE ? ORDER BY name LIMIT 50",
            PATIENT_COLUMNS
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update(&self, id: i64, update: &PatientUpdate) -> Result<bool, sqlx::Error> {
        let mut sets: Vec<&'static str> = Vec::new();
        if update.name.is_some() {
            sets.push("name = ?");
        }
        if update.date_of_birth.is_some() {
            sets.push("date_of_birth = ?");
        }
        if update.gender.is_some() {
            sets.push("gender = ?");
        }
        if update.address.is_some() {
            sets.push("address = ?");
        }
        if update.phone_number.is_some() {
            sets.push("phone_number = ?");
        }
        if update.email.is_some() {
            sets.push("email = ?");
        }
        if update.insurance_number.is_some() {
            sets.push("insurance_number = ?");
        }
        if update.emergency_contact_name.is_some() {
            sets.push("emergency_contact_name = ?");
        }
        if update.emergency_contact_phone.is_some() {
            sets.push("emergency_contact_phone = ?");
        }
        if sets.is_empty() {
            return Ok(false);
        }

        let sql = format!(
            "UPDATE patients SET {}, updated_at = datetime('now') WHERE id = ?",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        if let Some(v) = &update.name {
            query = query.bind(v);
        }
        if let Some(v) = &update.date_of_birth {
            query = query.bind(v);
        }
        if let Some(v) = &update.gender {
            query = query.bind(v);
        }
        if let Some(v) = &update.address {
            query = query.bind(v);
        }
        if let Some(v) = &update.phone_number {
            query = query.bind(v);
        }
        if let Some(v) = &update.email {
            query = query.bind(v);
        }
        if let Some(v) = update.insurance_number {
            query = query.bind(v);
        }
        if let Some(v) = &update.emergency_contact_name {
            query = query.bind(v);
        }
        if let Some(v) = &update.emergency_contact_phone {
            query = query.bind(v);
        }

        let result = query.bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM patients WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM patients")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
