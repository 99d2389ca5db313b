//! `SQLite` connection, migration runner, and token row I/O.
//!
//! Token metadata is stored in plain columns; the secret is sealed with
//! AES-256-GCM under the store key (see [`crate::seal`]) before it reaches
//! the database. Order within a section is kept in the `position` column,
//! rewritten in one transaction whenever a section is reordered.

use std::fmt;
use std::path::Path;

use authenticator_core::{CodeLength, Digest, TimeStep};
use rusqlite::{params, Connection};

use crate::error::StoreError;
use crate::seal::{self, StoreKey};
use crate::token::{Section, Token};

// ---------------------------------------------------------------------------
// Embedded migrations
// ---------------------------------------------------------------------------

/// Forward-only SQL migrations, embedded at compile time.
/// Index 0 → version 1, index 1 → version 2, etc.
const MIGRATIONS: &[&str] = &[
    include_str!("../migrations/001_create_tokens.sql"),
    include_str!("../migrations/002_add_last_accepted_step.sql"),
];

// ---------------------------------------------------------------------------
// TokenDb
// ---------------------------------------------------------------------------

/// Handle to an open, migrated token database.
pub struct TokenDb {
    conn: Connection,
}

impl fmt::Debug for TokenDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenDb(***)")
    }
}

impl TokenDb {
    /// Open (or create) the token database at `path`.
    ///
    /// Enables WAL journaling and runs any pending migrations.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Database`] if the file cannot be opened.
    /// - [`StoreError::Migration`] if a migration fails.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database. Nothing is written to disk.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let mut db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Returns a reference to the underlying [`rusqlite::Connection`].
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns the current schema version (`PRAGMA user_version`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pragma query fails.
    pub fn schema_version(&self) -> Result<i32, StoreError> {
        let v: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(v)
    }

    // -----------------------------------------------------------------------
    // Migration runner
    // -----------------------------------------------------------------------

    /// Apply all pending migrations sequentially, each in its own transaction.
    fn run_migrations(&mut self) -> Result<(), StoreError> {
        let current = self.schema_version()?;

        for (idx, sql) in MIGRATIONS.iter().enumerate() {
            let version = idx
                .checked_add(1)
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| StoreError::Migration("migration index overflow".into()))?;

            if version <= current {
                continue;
            }

            let tx = self.conn.transaction().map_err(|e| {
                StoreError::Migration(format!(
                    "failed to start transaction for migration {version}: {e}"
                ))
            })?;

            tx.execute_batch(sql)
                .map_err(|e| StoreError::Migration(format!("migration {version} failed: {e}")))?;

            tx.pragma_update(None, "user_version", version)
                .map_err(|e| {
                    StoreError::Migration(format!(
                        "failed to update user_version to {version}: {e}"
                    ))
                })?;

            tx.commit().map_err(|e| {
                StoreError::Migration(format!("failed to commit migration {version}: {e}"))
            })?;

            tracing::debug!(version, "applied token store migration");
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Token rows
    // -----------------------------------------------------------------------

    /// Insert `token` at `position` of its section with its sealed secret.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the INSERT fails (including a
    /// primary-key clash on the id).
    pub fn insert_token(
        &self,
        token: &Token,
        position: usize,
        sealed_secret: &[u8],
        created_at: u64,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO tokens (id, section, position, name, issuer, digest, digits, \
                 period, counter, last_accepted_step, sealed_secret, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    token.id(),
                    token.section().as_db_str(),
                    position_to_db(position)?,
                    token.name(),
                    token.issuer(),
                    token.digest().name(),
                    token.length().digits(),
                    token.period(),
                    u64_to_db(token.counter()),
                    token.last_accepted_step().map(u64_to_db),
                    sealed_secret,
                    u64_to_db(created_at),
                ],
            )
            .map_err(|e| StoreError::Database(format!("failed to insert token: {e}")))?;
        Ok(())
    }

    /// Delete the token `id` and renumber the rest of `section` as `remaining`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the transaction fails; nothing is
    /// changed in that case.
    pub fn delete_token(
        &mut self,
        id: &str,
        section: Section,
        remaining: &[&str],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM tokens WHERE id = ?1", params![id])
            .map_err(|e| StoreError::Database(format!("failed to delete token: {e}")))?;
        write_positions(&tx, section, remaining)?;
        tx.commit()?;
        Ok(())
    }

    /// Rewrite the positions of `section` to match the order of `ids`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the transaction fails.
    pub fn reorder(&mut self, section: Section, ids: &[&str]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        write_positions(&tx, section, ids)?;
        tx.commit()?;
        Ok(())
    }

    /// Store the next HOTP counter of token `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the UPDATE fails.
    pub fn update_counter(&self, id: &str, counter: u64) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE tokens SET counter = ?1 WHERE id = ?2",
                params![u64_to_db(counter), id],
            )
            .map_err(|e| StoreError::Database(format!("failed to update counter: {e}")))?;
        Ok(())
    }

    /// Record the last accepted TOTP step of token `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the UPDATE fails.
    pub fn update_last_accepted_step(&self, id: &str, step: u64) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE tokens SET last_accepted_step = ?1 WHERE id = ?2",
                params![u64_to_db(step), id],
            )
            .map_err(|e| StoreError::Database(format!("failed to update last step: {e}")))?;
        Ok(())
    }

    /// Load every token of `section` in stored order, opening each secret
    /// with `key`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Decryption`] if a secret does not open under `key`.
    /// - [`StoreError::Database`] if the query fails or a row is malformed.
    pub fn load_section(&self, section: Section, key: &StoreKey) -> Result<Vec<Token>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, issuer, digest, digits, period, counter, \
             last_accepted_step, sealed_secret \
             FROM tokens WHERE section = ?1 ORDER BY position, created_at",
        )?;

        let rows = stmt
            .query_map(params![section.as_db_str()], |row| {
                Ok(TokenRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    issuer: row.get(2)?,
                    digest: row.get(3)?,
                    digits: row.get(4)?,
                    period: row.get(5)?,
                    counter: row.get(6)?,
                    last_accepted_step: row.get(7)?,
                    sealed_secret: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| row.into_token(section, key))
            .collect()
    }

    /// Number of rows in `section`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub fn count_section(&self, section: Section) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tokens WHERE section = ?1",
            params![section.as_db_str()],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| StoreError::Database("negative row count".into()))
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Raw column values of one `tokens` row.
struct TokenRow {
    id: String,
    name: String,
    issuer: Option<String>,
    digest: String,
    digits: u8,
    period: u32,
    counter: i64,
    last_accepted_step: Option<i64>,
    sealed_secret: Vec<u8>,
}

impl TokenRow {
    fn into_token(self, section: Section, key: &StoreKey) -> Result<Token, StoreError> {
        let malformed = |e: &dyn fmt::Display| {
            StoreError::Database(format!("malformed token row {}: {e}", self.id))
        };
        let digest = Digest::from_name(&self.digest).map_err(|e| malformed(&e))?;
        let length = CodeLength::new(self.digits).map_err(|e| malformed(&e))?;
        let step = TimeStep::new(self.period, 0).map_err(|e| malformed(&e))?;

        let secret = seal::open(&self.sealed_secret, key, self.id.as_bytes()).map_err(|e| {
            tracing::warn!(token_id = %self.id, "failed to open sealed secret");
            e
        })?;

        Ok(Token::from_parts(
            self.id,
            self.name,
            self.issuer,
            section.kind(),
            digest,
            length,
            step,
            u64_from_db(self.counter),
            self.last_accepted_step.map(u64_from_db),
            secret,
        ))
    }
}

fn write_positions(
    tx: &rusqlite::Transaction<'_>,
    section: Section,
    ids: &[&str],
) -> Result<(), StoreError> {
    let mut stmt = tx.prepare("UPDATE tokens SET position = ?1 WHERE id = ?2 AND section = ?3")?;
    for (position, id) in ids.iter().enumerate() {
        stmt.execute(params![position_to_db(position)?, id, section.as_db_str()])
            .map_err(|e| StoreError::Database(format!("failed to update position: {e}")))?;
    }
    Ok(())
}

fn position_to_db(position: usize) -> Result<i64, StoreError> {
    i64::try_from(position).map_err(|_| StoreError::Database("position out of range".into()))
}

/// `SQLite` integers are signed; the cast is a lossless bit reinterpretation
/// undone by [`u64_from_db`].
#[allow(clippy::cast_possible_wrap)]
const fn u64_to_db(value: u64) -> i64 {
    value as i64
}

#[allow(clippy::cast_sign_loss)]
const fn u64_from_db(value: i64) -> u64 {
    value as u64
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
