//! SQLite-backed [`LicenseStore`] and [`ActivationLedger`].
//!
//! Every mutation that reads before it writes runs in a `BEGIN IMMEDIATE`
//! transaction, which takes the database write lock up front. Together with
//! the partial unique index on live `(license_id, hardware_id)` pairs this
//! keeps the activation cap exact across threads and across processes
//! sharing one database file.

use crate::error::{Context, StoreError, StoreResult};
use crate::{ActivationLedger, ActivationOutcome, LicenseStore, NewLicense};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tessera_license::{Activation, ActivationRequest, License, LicenseStatus, Limit};
use tessera_types::{LicenseId, OwnerId};
use tracing::debug;

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const LICENSE_COLUMNS: &str =
    "id, owner_id, tier, status, issued_at, expires_at, max_activations";

const ACTIVATION_COLUMNS: &str = "id, license_id, hardware_id, hostname, platform, version, \
     activated_at, ip_address, deactivated_at";

/// License store and activation ledger backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).context("failed to open license database")?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("failed to set busy timeout")?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
            .context("failed to enable WAL journal")?;
        let store = Self::from_connection(conn)?;
        debug!(path = %path.display(), "opened license database");
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn =
            Connection::open_in_memory().context("failed to open in-memory license database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("failed to set busy timeout")?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS licenses (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                tier TEXT NOT NULL,
                status TEXT NOT NULL,
                issued_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                max_activations INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_licenses_owner ON licenses (owner_id);

            CREATE TABLE IF NOT EXISTS activations (
                id TEXT PRIMARY KEY,
                license_id TEXT NOT NULL REFERENCES licenses (id),
                hardware_id TEXT NOT NULL,
                hostname TEXT NOT NULL,
                platform TEXT NOT NULL,
                version TEXT NOT NULL,
                activated_at TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                deactivated_at TEXT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_activations_live
                ON activations (license_id, hardware_id)
                WHERE deactivated_at IS NULL;
            ",
        )
        .context("failed to init license schema")?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

// ── Licenses ─────────────────────────────────────────────────────

impl LicenseStore for SqliteStore {
    fn insert_license(&self, new: NewLicense<'_>) -> StoreResult<Vec<LicenseId>> {
        let license = new.license;
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin issuance")?;

        let mut superseded = Vec::new();
        if let Some(family) = new.supersede {
            for prior in load_owner_licenses(&tx, license.owner_id)? {
                if prior.id != license.id
                    && prior.status == LicenseStatus::Active
                    && prior.tier.family() == family
                    && prior.tier <= license.tier
                {
                    tx.execute(
                        "UPDATE licenses SET status = ?2 WHERE id = ?1",
                        params![prior.id.to_string(), LicenseStatus::Revoked.as_str()],
                    )
                    .context("failed to revoke superseded license")?;
                    superseded.push(prior.id);
                }
            }
        }

        tx.execute(
            &format!("INSERT INTO licenses ({LICENSE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                license.id.to_string(),
                license.owner_id.to_string(),
                license.tier.as_str(),
                license.status.as_str(),
                license.issued_at,
                license.expires_at,
                license.max_activations.get(),
            ],
        )
        .context("failed to insert license")?;

        if let Some(activation) = new.initial_activation {
            insert_activation(&tx, activation)?;
        }

        tx.commit().context("failed to commit issuance")?;
        Ok(superseded)
    }

    fn get_license(&self, id: LicenseId) -> StoreResult<Option<License>> {
        let conn = self.lock()?;
        load_license(&conn, id)
    }

    fn licenses_for_owner(&self, owner_id: OwnerId) -> StoreResult<Vec<License>> {
        let conn = self.lock()?;
        load_owner_licenses(&conn, owner_id)
    }

    fn set_status(&self, id: LicenseId, status: LicenseStatus) -> StoreResult<Option<License>> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE licenses SET status = ?2 WHERE id = ?1",
                params![id.to_string(), status.as_str()],
            )
            .context("failed to update license status")?;
        if changed == 0 {
            return Ok(None);
        }
        load_license(&conn, id)
    }

    fn mark_expired(&self, id: LicenseId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE licenses SET status = ?2 WHERE id = ?1 AND status = ?3",
                params![
                    id.to_string(),
                    LicenseStatus::Expired.as_str(),
                    LicenseStatus::Active.as_str(),
                ],
            )
            .context("failed to mark license expired")?;
        Ok(changed > 0)
    }
}

// ── Activations ──────────────────────────────────────────────────

impl ActivationLedger for SqliteStore {
    fn activate(
        &self,
        request: &ActivationRequest,
        limit: Limit,
        now: DateTime<Utc>,
    ) -> StoreResult<ActivationOutcome> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin activation")?;

        if let Some(existing) = load_live_activation(&tx, request.license_id, &request.hardware_id)? {
            tx.execute(
                "UPDATE activations
                 SET hostname = ?2, platform = ?3, version = ?4, ip_address = ?5, activated_at = ?6
                 WHERE id = ?1",
                params![
                    existing.id.to_string(),
                    request.hostname,
                    request.platform,
                    request.version,
                    request.ip_address,
                    now,
                ],
            )
            .context("failed to refresh activation")?;
            tx.commit().context("failed to commit activation")?;

            return Ok(ActivationOutcome::Refreshed(Activation {
                hostname: request.hostname.clone(),
                platform: request.platform.clone(),
                version: request.version.clone(),
                ip_address: request.ip_address.clone(),
                activated_at: now,
                ..existing
            }));
        }

        let active = count_live(&tx, request.license_id)?;
        if !limit.admits(active) {
            // dropping the transaction rolls it back
            return Ok(ActivationOutcome::LimitReached { active });
        }

        let activation = request.to_activation(now);
        insert_activation(&tx, &activation)?;
        tx.commit().context("failed to commit activation")?;
        Ok(ActivationOutcome::Created(activation))
    }

    fn deactivate(
        &self,
        license_id: LicenseId,
        hardware_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Activation>> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin deactivation")?;

        let Some(existing) = load_live_activation(&tx, license_id, hardware_id)? else {
            return Ok(None);
        };
        tx.execute(
            "UPDATE activations SET deactivated_at = ?2 WHERE id = ?1",
            params![existing.id.to_string(), now],
        )
        .context("failed to deactivate")?;
        tx.commit().context("failed to commit deactivation")?;

        Ok(Some(Activation {
            deactivated_at: Some(now),
            ..existing
        }))
    }

    fn find_active(
        &self,
        license_id: LicenseId,
        hardware_id: &str,
    ) -> StoreResult<Option<Activation>> {
        let conn = self.lock()?;
        load_live_activation(&conn, license_id, hardware_id)
    }

    fn activations(&self, license_id: LicenseId) -> StoreResult<Vec<Activation>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ACTIVATION_COLUMNS} FROM activations
                 WHERE license_id = ?1 ORDER BY activated_at, id"
            ))
            .context("failed to prepare activation query")?;
        let rows = stmt
            .query_map(params![license_id.to_string()], activation_from_row)
            .context("failed to query activations")?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read activation row")?;
        Ok(rows)
    }

    fn count_active(&self, license_id: LicenseId) -> StoreResult<u32> {
        let conn = self.lock()?;
        count_live(&conn, license_id)
    }
}

// ── Row helpers ──────────────────────────────────────────────────

fn load_license(conn: &Connection, id: LicenseId) -> StoreResult<Option<License>> {
    conn.query_row(
        &format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE id = ?1"),
        params![id.to_string()],
        license_from_row,
    )
    .optional()
    .context("failed to load license")
}

fn load_owner_licenses(conn: &Connection, owner_id: OwnerId) -> StoreResult<Vec<License>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses WHERE owner_id = ?1 ORDER BY issued_at, id"
        ))
        .context("failed to prepare owner query")?;
    let rows = stmt
        .query_map(params![owner_id.to_string()], license_from_row)
        .context("failed to query owner licenses")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to read license row")?;
    Ok(rows)
}

fn load_live_activation(
    conn: &Connection,
    license_id: LicenseId,
    hardware_id: &str,
) -> StoreResult<Option<Activation>> {
    conn.query_row(
        &format!(
            "SELECT {ACTIVATION_COLUMNS} FROM activations
             WHERE license_id = ?1 AND hardware_id = ?2 AND deactivated_at IS NULL"
        ),
        params![license_id.to_string(), hardware_id],
        activation_from_row,
    )
    .optional()
    .context("failed to load activation")
}

fn count_live(conn: &Connection, license_id: LicenseId) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM activations WHERE license_id = ?1 AND deactivated_at IS NULL",
        params![license_id.to_string()],
        |row| row.get::<_, u32>(0),
    )
    .context("failed to count activations")
}

fn insert_activation(conn: &Connection, activation: &Activation) -> StoreResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO activations ({ACTIVATION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            activation.id.to_string(),
            activation.license_id.to_string(),
            activation.hardware_id,
            activation.hostname,
            activation.platform,
            activation.version,
            activation.activated_at,
            activation.ip_address,
            activation.deactivated_at,
        ],
    )
    .context("failed to insert activation")?;
    Ok(())
}

fn license_from_row(row: &Row<'_>) -> rusqlite::Result<License> {
    Ok(License {
        id: parse_column(row, 0)?,
        owner_id: parse_column(row, 1)?,
        tier: parse_column(row, 2)?,
        status: parse_column(row, 3)?,
        issued_at: row.get(4)?,
        expires_at: row.get(5)?,
        max_activations: Limit::from(row.get::<_, Option<u32>>(6)?),
    })
}

fn activation_from_row(row: &Row<'_>) -> rusqlite::Result<Activation> {
    Ok(Activation {
        id: parse_column(row, 0)?,
        license_id: parse_column(row, 1)?,
        hardware_id: row.get(2)?,
        hostname: row.get(3)?,
        platform: row.get(4)?,
        version: row.get(5)?,
        activated_at: row.get(6)?,
        ip_address: row.get(7)?,
        deactivated_at: row.get(8)?,
    })
}

/// Reads a TEXT column and parses it with [`FromStr`].
fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
