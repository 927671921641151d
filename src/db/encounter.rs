use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct EncounterStore {
    pool: SqlitePool,
}

/// Billing workflow state of an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncounterStatus {
    Pending,
    Coded,
    Billed,
    Completed,
}

impl EncounterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncounterStatus::Pending => "pending",
            EncounterStatus::Coded => "coded",
            EncounterStatus::Billed => "billed",
            EncounterStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EncounterStatus::Pending),
            "coded" => Some(EncounterStatus::Coded),
            "billed" => Some(EncounterStatus::Billed),
            "completed" => Some(EncounterStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Encounter {
    pub id: i64,
    pub patient_id: i64,
    pub date_of_service: String,
    pub provider_name: String,
    pub notes: Option<String>,
    pub status: EncounterStatus,
    pub discharge_date: Option<String>,
    pub type_of_service: String,
    pub location: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct EncounterRow {
    id: i64,
    patient_id: i64,
    date_of_service: String,
    provider_name: String,
    notes: Option<String>,
    status: String,
    discharge_date: Option<String>,
    type_of_service: String,
    location: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<EncounterRow> for Encounter {
    fn from(row: EncounterRow) -> Self {
        Self {
            id: row.id,
            patient_id: row.patient_id,
            date_of_service: row.date_of_service,
            provider_name: row.provider_name,
            notes: row.notes,
            status: EncounterStatus::parse(&row.status).unwrap_or(EncounterStatus::Pending),
            discharge_date: row.discharge_date,
            type_of_service: row.type_of_service,
            location: row.location,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
pub struct NewEncounter {
    pub patient_id: i64,
    pub date_of_service: String,
    pub provider_name: String,
    pub notes: Option<String>,
    pub status: EncounterStatus,
    pub discharge_date: Option<String>,
    pub type_of_service: String,
    pub location: Option<String>,
}

/// Partial encounter update; absent fields are left untouched.
#[derive(Debug, Default)]
pub struct EncounterUpdate {
    pub date_of_service: Option<String>,
    pub provider_name: Option<String>,
    pub notes: Option<String>,
    pub status: Option<EncounterStatus>,
    pub discharge_date: Option<String>,
    pub type_of_service: Option<String>,
    pub location: Option<String>,
}

/// A diagnosis code attached to an encounter, joined with its catalog entry.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct DiagnosisLink {
    pub id: i64,
    pub encounter_id: i64,
    pub icd_code_id: i64,
    pub diagnosis_order: Option<i64>,
    pub code: String,
    pub description: String,
}

/// A procedure code attached to an encounter, joined with its catalog entry.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct ProcedureLink {
    pub id: i64,
    pub encounter_id: i64,
    pub cpt_code_id: i64,
    pub procedure_date: Option<String>,
    pub code: String,
    pub description: String,
    pub relative_value_unit: f64,
}

const ENCOUNTER_COLUMNS: &str = "id, patient_id, date_of_service, provider_name, notes, status,
    discharge_date, type_of_service, location, created_at, updated_at";

impl EncounterStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, encounter: &NewEncounter) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO encounters (patient_id, date_of_service, provider_name, notes, status,
                discharge_date, type_of_service, location)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(encounter.patient_id)
        .bind(&encounter.date_of_service)
        .bind(&encounter.provider_name)
        .bind(&encounter.notes)
        .bind(encounter.status.as_str())
        .bind(&encounter.discharge_date)
        .bind(&encounter.type_of_service)
        .bind(&encounter.location)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Encounter>, sqlx::Error> {
        let row: Option<EncounterRow> = sqlx::query_as(&format!(
            "SELECT {} FROM encounters WHERE id = ?",
            ENCOUNTER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Encounter::from))
    }

    /// List encounters newest first. `page` is 1-based.
    pub async fn list(&self, page: u32, limit: u32) -> Result<(Vec<Encounter>, i64), sqlx::Error> {
        let offset = (page.saturating_sub(1)) as i64 * limit as i64;
        let rows: Vec<EncounterRow> = sqlx::query_as(&format!(
            "SELECT {} FROM encounters ORDER BY date_of_service DESC, id DESC LIMIT ? OFFSET ?",
            ENCOUNTER_COLUMNS
        ))
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = self.count().await?;
        Ok((rows.into_iter().map(Encounter::from).collect(), total))
    }

    /// Encounters for one patient, newest first.
    pub async fn list_for_patient(&self, patient_id: i64) -> Result<Vec<Encounter>, sqlx::Error> {
        let rows: Vec<EncounterRow> = sqlx::query_as(&format!(
            "SELECT {} FROM encounters WHERE patient_id = ?
             ORDER BY date_of_service DESC, id DESC",
            ENCOUNTER_COLUMNS
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Encounter::from).collect())
    }

    /// Search by provider name, case-insensitive.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<Encounter>, sqlx::Error> {
        let pattern = format!("%{}%", query);
        let rows: Vec<EncounterRow> = sqlx::query_as(&format!(
            "SELECT {} FROM encounters WHERE provider_name LIKE ?
             ORDER BY date_of_service DESC LIMIT ?",
            ENCOUNTER_COLUMNS
        ))
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Encounter::from).collect())
    }

    pub async fn update(&self, id: i64, update: &EncounterUpdate) -> Result<bool, sqlx::Error> {
        let mut sets: Vec<&'static str> = Vec::new();
        if update.date_of_service.is_some() {
            sets.push("date_of_service = ?");
        }
        if update.provider_name.is_some() {
            sets.push("provider_name = ?");
        }
        if update.notes.is_some() {
            sets.push("notes = ?");
        }
        if update.status.is_some() {
            sets.push("status = ?");
        }
        if update.discharge_date.is_some() {
            sets.push("discharge_date = ?");
        }
        if update.type_of_service.is_some() {
            sets.push("type_of_service = ?");
        }
        if update.location.is_some() {
            sets.push("location = ?");
        }
        if sets.is_empty() {
            return Ok(false);
        }

        let sql = format!(
            "UPDATE encounters SET {}, updated_at = datetime('now') WHERE id = ?",
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        if let Some(v) = &update.date_of_service {
            query = query.bind(v);
        }
        if let Some(v) = &update.provider_name {
            query = query.bind(v);
        }
        if let Some(v) = &update.notes {
            query = query.bind(v);
        }
        if let Some(v) = update.status {
            query = query.bind(v.as_str());
        }
        if let Some(v) = &update.discharge_date {
            query = query.bind(v);
        }
        if let Some(v) = &update.type_of_service {
            query = query.bind(v);
        }
        if let Some(v) = &update.location {
            query = query.bind(v);
        }

        let result = query.bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM encounters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM encounters")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Encounters still in the billing pipeline (everything except completed).
    pub async fn count_active(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM encounters WHERE status != 'completed'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    /// Per-day encounter counts, most recent days first.
    pub async fn daily_counts(&self, days: u32) -> Result<Vec<(String, i64)>, sqlx::Error> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT date_of_service, COUNT(*) FROM encounters
             GROUP BY date_of_service ORDER BY date_of_service DESC LIMIT ?",
        )
        .bind(days as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Attach a diagnosis code to an encounter.
    pub async fn add_diagnosis(
        &self,
        encounter_id: i64,
        icd_code_id: i64,
        diagnosis_order: Option<i64>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO encounter_diagnoses (encounter_id, icd_code_id, diagnosis_order)
             VALUES (?, ?, ?)",
        )
        .bind(encounter_id)
        .bind(icd_code_id)
        .bind(diagnosis_order)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Diagnoses attached to an encounter, joined with their catalog entries.
    pub async fn diagnoses_for(&self, encounter_id: i64) -> Result<Vec<DiagnosisLink>, sqlx::Error> {
        let rows: Vec<DiagnosisLink> = sqlx::query_as(
            "SELECT d.id, d.encounter_id, d.icd_code_id, d.diagnosis_order,
                    c.code, c.description
             FROM encounter_diagnoses d
             JOIN icd_codes c ON c.id = d.icd_code_id
             WHERE d.encounter_id = ?
             ORDER BY d.diagnosis_order, d.id",
        )
        .bind(encounter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_diagnosis(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM encounter_diagnoses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Attach a procedure code to an encounter.
    pub async fn add_procedure(
        &self,
        encounter_id: i64,
        cpt_code_id: i64,
        procedure_date: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO encounter_procedures (encounter_id, cpt_code_id, procedure_date)
             VALUES (?, ?, ?)",
        )
        .bind(encounter_id)
        .bind(cpt_code_id)
        .bind(procedure_date)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Procedures attached to an encounter, joined with their catalog entries.
    pub async fn procedures_for(&self, encounter_id: i64) -> Result<Vec<ProcedureLink>, sqlx::Error> {
        let rows: Vec<ProcedureLink> = sqlx::query_as(
            "SELECT p.id, p.encounter_id, p.cpt_code_id, p.procedure_date,
                    c.code, c.description, c.relative_value_unit
             FROM encounter_procedures p
             JOIN cpt_codes c ON c.id = p.cpt_code_id
             WHERE p.encounter_id = ?
             ORDER BY p.id",
        )
        .bind(encounter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_procedure(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM encounter_procedures WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
