use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use crate::{
    error::{Result, VerifyError},
    storage::{
        models::{
            BookingStatus, PassRecord, ProviderRecord, ProviderRole, ProviderStats,
            VerificationEvent,
        },
        store::ProviderStore,
    },
};
use chrono::{DateTime, Utc};
use serde::Serialize;

const PROVIDER_COLUMNS: &str = "p.id, p.name, p.role, p.verified_at,
    (SELECT COUNT(*) FROM bookings b WHERE b.provider_id = p.id AND b.status = ?1),
    (SELECT AVG(r.rating) FROM reviews r WHERE r.provider_id = p.id)";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS providers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                role TEXT NOT NULL,
                verified_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (provider_id) REFERENCES providers(id)
            );

            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider_id TEXT NOT NULL,
                rating REAL NOT NULL CHECK (rating >= 0 AND rating <= 5),
                created_at TEXT NOT NULL,
                FOREIGN KEY (provider_id) REFERENCES providers(id)
            );

            CREATE TABLE IF NOT EXISTS verification_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider_id TEXT NOT NULL,
                role TEXT NOT NULL,
                action TEXT NOT NULL,
                completed_bookings INTEGER NOT NULL,
                average_rating REAL,
                source TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS verification_passes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                role TEXT NOT NULL,
                source TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                total INTEGER NOT NULL,
                verified INTEGER NOT NULL,
                revoked INTEGER NOT NULL,
                failed INTEGER NOT NULL,
                dry_run INTEGER NOT NULL,
                error TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_providers_role ON providers(role);
            CREATE INDEX IF NOT EXISTS idx_bookings_provider ON bookings(provider_id, status);
            CREATE INDEX IF NOT EXISTS idx_reviews_provider ON reviews(provider_id);",
        )?;

        Ok(())
    }

    pub fn add_provider(&self, id: &str, name: &str, role: ProviderRole) -> Result<()> {
        self.conn.execute(
            "INSERT INTO providers (id, name, role, verified_at, created_at)
             VALUES (?1, ?2, ?3, NULL, ?4)",
            params![id, name, role.as_db_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn add_booking(&self, provider_id: &str, status: BookingStatus) -> Result<()> {
        self.conn.execute(
            "INSERT INTO bookings (provider_id, status, created_at) VALUES (?1, ?2, ?3)",
            params![provider_id, status.as_db_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn add_review(&self, provider_id: &str, rating: f64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO reviews (provider_id, rating, created_at) VALUES (?1, ?2, ?3)",
            params![provider_id, rating, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn list_providers(&self, role: Option<ProviderRole>) -> Result<Vec<ProviderRecord>> {
        let completed = BookingStatus::Completed.as_db_str();

        let providers = match role {
            Some(role) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM providers p WHERE p.role = ?2 ORDER BY p.id",
                    PROVIDER_COLUMNS
                ))?;
                let rows = stmt.query_map(params![completed, role.as_db_str()], provider_from_row)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM providers p ORDER BY p.role, p.id",
                    PROVIDER_COLUMNS
                ))?;
                let rows = stmt.query_map(params![completed], provider_from_row)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        Ok(providers)
    }

    pub fn get_provider(&self, id: &str) -> Result<Option<ProviderRecord>> {
        let provider = self
            .conn
            .query_row(
                &format!("SELECT {} FROM providers p WHERE p.id = ?2", PROVIDER_COLUMNS),
                params![BookingStatus::Completed.as_db_str(), id],
                provider_from_row,
            )
            .optional()?;

        Ok(provider)
    }

    pub fn get_verification_history(&self, limit: Option<usize>) -> Result<Vec<VerificationEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, provider_id, role, action, completed_bookings, average_rating, source, timestamp
             FROM verification_events
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )?;

        let events = stmt
            .query_map(params![limit_param(limit)], |row| {
                Ok(VerificationEvent {
                    id: row.get(0)?,
                    provider_id: row.get(1)?,
                    role: role_column(row, 2)?,
                    action: parse_column(row, 3)?,
                    completed_bookings: row.get(4)?,
                    average_rating: row.get(5)?,
                    source: parse_column(row, 6)?,
                    timestamp: timestamp_column(row, 7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    pub fn get_pass_history(&self, limit: Option<usize>) -> Result<Vec<PassRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, role, source, started_at, finished_at, total, verified, revoked, failed, dry_run, error
             FROM verification_passes
             ORDER BY started_at DESC, id DESC
             LIMIT ?1",
        )?;

        let passes = stmt
            .query_map(params![limit_param(limit)], |row| {
                Ok(PassRecord {
                    id: row.get(0)?,
                    role: role_column(row, 1)?,
                    source: parse_column(row, 2)?,
                    started_at: timestamp_column(row, 3)?,
                    finished_at: timestamp_column(row, 4)?,
                    total: row.get::<_, i64>(5)? as usize,
                    verified: row.get::<_, i64>(6)? as usize,
                    revoked: row.get::<_, i64>(7)? as usize,
                    failed: row.get::<_, i64>(8)? as usize,
                    dry_run: row.get(9)?,
                    error: row.get(10)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(passes)
    }

    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let last_pass = self.get_pass_history(Some(1))?.into_iter().next();

        Ok(DatabaseStats {
            total_providers: count("SELECT COUNT(*) FROM providers")?,
            workers: count("SELECT COUNT(*) FROM providers WHERE role = 'WORKER'")?,
            companies: count("SELECT COUNT(*) FROM providers WHERE role = 'COMPANY'")?,
            verified_providers: count("SELECT COUNT(*) FROM providers WHERE verified_at IS NOT NULL")?,
            total_grants: count("SELECT COUNT(*) FROM verification_events WHERE action = 'Granted'")?,
            total_revocations: count("SELECT COUNT(*) FROM verification_events WHERE action = 'Revoked'")?,
            total_passes: count("SELECT COUNT(*) FROM verification_passes")?,
            last_pass_at: last_pass.map(|p| p.finished_at),
        })
    }
}

impl ProviderStore for Database {
    fn list_providers_with_completed_booking_counts(
        &self,
        role: ProviderRole,
    ) -> Result<Vec<ProviderStats>> {
        Ok(self
            .list_providers(Some(role))?
            .into_iter()
            .map(|record| record.stats)
            .collect())
    }

    fn set_verified_at(&self, provider_id: &str, verified_at: Option<DateTime<Utc>>) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE providers SET verified_at = ?1 WHERE id = ?2",
            params![verified_at.map(|dt| dt.to_rfc3339()), provider_id],
        )?;

        if changed == 0 {
            return Err(VerifyError::ProviderNotFound(provider_id.to_string()));
        }

        Ok(())
    }

    fn record_event(&self, event: &VerificationEvent) -> Result<()> {
        self.conn.execute(
            "INSERT INTO verification_events
             (provider_id, role, action, completed_bookings, average_rating, source, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.provider_id,
                event.role.as_db_str(),
                event.action.to_string(),
                event.completed_bookings,
                event.average_rating,
                event.source.to_string(),
                event.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn record_pass(&self, pass: &PassRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO verification_passes
             (role, source, started_at, finished_at, total, verified, revoked, failed, dry_run, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                pass.role.as_db_str(),
                pass.source.to_string(),
                pass.started_at.to_rfc3339(),
                pass.finished_at.to_rfc3339(),
                pass.total as i64,
                pass.verified as i64,
                pass.revoked as i64,
                pass.failed as i64,
                pass.dry_run,
                pass.error,
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_providers: usize,
    pub workers: usize,
    pub companies: usize,
    pub verified_providers: usize,
    pub total_grants: usize,
    pub total_revocations: usize,
    pub total_passes: usize,
    pub last_pass_at: Option<DateTime<Utc>>,
}

fn provider_from_row(row: &Row<'_>) -> rusqlite::Result<ProviderRecord> {
    let id: String = row.get(0)?;
    let verified_at = match row.get::<_, Option<String>>(3)? {
        Some(raw) => Some(parse_timestamp(3, &raw)?),
        None => None,
    };

    Ok(ProviderRecord {
        name: row.get(1)?,
        role: role_column(row, 2)?,
        stats: ProviderStats {
            id: id.clone(),
            completed_bookings: row.get(4)?,
            average_rating: row.get(5)?,
            verified_at,
        },
        id,
    })
}

// SQLite treats a negative LIMIT as unbounded
fn limit_param(limit: Option<usize>) -> i64 {
    limit.map(|l| l as i64).unwrap_or(-1)
}

fn role_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ProviderRole> {
    let raw: String = row.get(idx)?;
    ProviderRole::from_db_str(&raw).ok_or_else(|| conversion_error(idx, format!("unknown role {}", raw)))
}

fn parse_column<T: std::str::FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|_| conversion_error(idx, format!("unexpected value {}", raw)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(idx, &raw)
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{TriggerSource, VerificationAction};

    fn seeded() -> Database {
        let db = Database::in_memory().unwrap();
        db.add_provider("c1", "Acme Cleaning", ProviderRole::Company).unwrap();
        db.add_provider("c2", "Bright Movers", ProviderRole::Company).unwrap();
        db.add_provider("w1", "Sam Plumber", ProviderRole::Worker).unwrap();

        for _ in 0..3 {
            db.add_booking("c1", BookingStatus::Completed).unwrap();
        }
        db.add_booking("c1", BookingStatus::Cancelled).unwrap();
        db.add_booking("c1", BookingStatus::Pending).unwrap();
        db.add_review("c1", 4.0).unwrap();
        db.add_review("c1", 5.0).unwrap();
        db.add_booking("w1", BookingStatus::Completed).unwrap();
        db
    }

    #[test]
    fn test_aggregates_completed_bookings_and_ratings() {
        let db = seeded();
        let stats = db
            .list_providers_with_completed_booking_counts(ProviderRole::Company)
            .unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].id, "c1");
        assert_eq!(stats[0].completed_bookings, 3);
        assert_eq!(stats[0].average_rating, Some(4.5));
        assert_eq!(stats[1].id, "c2");
        assert_eq!(stats[1].completed_bookings, 0);
        assert_eq!(stats[1].average_rating, None);
        assert!(stats.iter().all(|s| s.verified_at.is_none()));
    }

    #[test]
    fn test_role_filter() {
        let db = seeded();
        let workers = db
            .list_providers_with_completed_booking_counts(ProviderRole::Worker)
            .unwrap();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].id, "w1");
        assert_eq!(db.list_providers(None).unwrap().len(), 3);
    }

    #[test]
    fn test_set_and_clear_verified_at() {
        let db = seeded();
        let now = Utc::now();

        db.set_verified_at("c1", Some(now)).unwrap();
        let provider = db.get_provider("c1").unwrap().unwrap();
        assert_eq!(
            provider.stats.verified_at.map(|dt| dt.timestamp()),
            Some(now.timestamp())
        );

        db.set_verified_at("c1", None).unwrap();
        let provider = db.get_provider("c1").unwrap().unwrap();
        assert!(provider.stats.verified_at.is_none());
    }

    #[test]
    fn test_set_verified_at_unknown_provider() {
        let db = seeded();
        let err = db.set_verified_at("missing", Some(Utc::now())).unwrap_err();
        assert!(matches!(err, VerifyError::ProviderNotFound(id) if id == "missing"));
    }

    #[test]
    fn test_event_and_pass_history() {
        let db = seeded();
        let now = Utc::now();

        db.record_event(&VerificationEvent {
            id: 0,
            provider_id: "c1".to_string(),
            role: ProviderRole::Company,
            action: VerificationAction::Granted,
            completed_bookings: 55,
            average_rating: Some(4.7),
            source: TriggerSource::Http,
            timestamp: now,
        })
        .unwrap();

        db.record_pass(&PassRecord {
            id: 0,
            role: ProviderRole::Company,
            source: TriggerSource::Http,
            started_at: now,
            finished_at: now,
            total: 2,
            verified: 1,
            revoked: 0,
            failed: 0,
            dry_run: false,
            error: None,
        })
        .unwrap();

        let events = db.get_verification_history(Some(10)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, VerificationAction::Granted);
        assert_eq!(events[0].source, TriggerSource::Http);

        let passes = db.get_pass_history(None).unwrap();
        assert_eq!(passes.len(), 1);
        assert_eq!(passes[0].verified, 1);
        assert!(passes[0].error.is_none());

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.total_providers, 3);
        assert_eq!(stats.companies, 2);
        assert_eq!(stats.workers, 1);
        assert_eq!(stats.total_grants, 1);
        assert_eq!(stats.total_passes, 1);
        assert!(stats.last_pass_at.is_some());
    }

    #[test]
    fn test_database_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verifier.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::new(path).unwrap();
            db.add_provider("c1", "Acme", ProviderRole::Company).unwrap();
        }

        let db = Database::new(path).unwrap();
        assert!(db.get_provider("c1").unwrap().is_some());
    }
}
