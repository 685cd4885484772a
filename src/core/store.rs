//! Purpose: The key-value store: one engine connection plus its cached statements.
//! Exports: `Store`, `StoreOptions`, `JournalMode`.
//! Role: Every read, write, delete, and transaction funnels through `Store`.
//! Invariants: Statements are prepared lazily, reused via reset-and-rebind, and finalized
//! once when the store closes.
//! Invariants: `select` leaves the select statement stepped until `reset_select`; owned
//! reads (`try_get_*`, `has_key`) step, copy, and reset in one call.
//! Invariants: Writes reset their statement immediately after stepping.
//! Invariants: Not `Sync`; callers serialize access.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::ToSql;
use rusqlite::{CachedStatement, Connection, OpenFlags, Statement};
use tracing::{debug, trace, warn};

use crate::core::error::{Error, ErrorKind};
use crate::core::schema::{self, TextEncoding};
use crate::core::sql::{self, RowControl, SqlRow, SqlSummary};
use crate::core::statement::{StatementKind, StatementState, StatementTable};
use crate::core::value::{Value, ValueView};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl JournalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            JournalMode::Delete => "delete",
            JournalMode::Truncate => "truncate",
            JournalMode::Persist => "persist",
            JournalMode::Memory => "memory",
            JournalMode::Wal => "wal",
            JournalMode::Off => "off",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoreOptions {
    pub busy_timeout: Option<Duration>,
    pub journal_mode: Option<JournalMode>,
    pub text_encoding: TextEncoding,
    pub create_if_missing: bool,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self {
            busy_timeout: None,
            journal_mode: None,
            text_encoding: TextEncoding::default(),
            create_if_missing: true,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = Some(mode);
        self
    }

    pub fn with_text_encoding(mut self, encoding: TextEncoding) -> Self {
        self.text_encoding = encoding;
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Store {
    path: PathBuf,
    conn: Option<Connection>,
    statements: StatementTable,
    selected: Option<Value>,
    in_transaction: bool,
    pending_commit: bool,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with(path, &StoreOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &StoreOptions) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if options.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        let conn = Connection::open_with_flags(&path, flags)
            .map_err(|err| Error::from_engine(ErrorKind::Open, err).with_path(&path))?;
        Self::from_connection(conn, path, options)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn =
            Connection::open_in_memory().map_err(|err| Error::from_engine(ErrorKind::Open, err))?;
        Self::from_connection(conn, PathBuf::from(":memory:"), &StoreOptions::default())
    }

    fn from_connection(
        conn: Connection,
        path: PathBuf,
        options: &StoreOptions,
    ) -> Result<Self, Error> {
        if let Some(timeout) = options.busy_timeout {
            conn.busy_timeout(timeout).map_err(|err| {
                Error::from_engine(ErrorKind::Open, err)
                    .with_message("failed to set busy timeout")
                    .with_path(&path)
            })?;
        }
        // Encoding must be set before anything writes the file header.
        schema::create_table(&conn, options.text_encoding).map_err(|err| err.with_path(&path))?;
        if let Some(mode) = options.journal_mode {
            apply_journal_mode(&conn, mode).map_err(|err| err.with_path(&path))?;
        }
        debug!(path = %path.display(), "opened key-value store");
        Ok(Self {
            path,
            conn: Some(conn),
            statements: StatementTable::new(),
            selected: None,
            in_transaction: false,
            pending_commit: false,
        })
    }

    /// Finalizes every prepared statement and closes the connection. An open
    /// transaction is rolled back by the engine.
    pub fn close(mut self) -> Result<(), Error> {
        self.shutdown()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn is_pending_commit(&self) -> bool {
        self.pending_commit
    }

    pub fn statement_state(&self, kind: StatementKind) -> StatementState {
        self.statements.state(kind)
    }

    /// Rebinds the cached select to `key` and steps once. The statement stays stepped,
    /// holding the row, until `reset_select`; another select before that fails with
    /// `ErrorKind::Misuse`.
    pub fn select(&mut self, key: &str) -> Result<Option<ValueView<'_>>, Error> {
        self.step_select(key).map_err(|err| err.with_key(key))?;
        Ok(self.selected.as_ref().map(Value::view))
    }

    /// The row held by the stepped select, if any.
    pub fn selected(&self) -> Option<ValueView<'_>> {
        self.selected.as_ref().map(Value::view)
    }

    /// Releases the row held by the select statement.
    pub fn reset_select(&mut self) {
        self.selected = None;
        self.statements.mark_reset(StatementKind::Select);
    }

    pub fn try_get(&mut self, key: &str) -> Result<Option<Value>, Error> {
        self.read(key, |view| Ok(view.to_value()))
    }

    pub fn try_get_int(&mut self, key: &str) -> Result<Option<i64>, Error> {
        self.read(key, |view| view.int())
    }

    pub fn try_get_double(&mut self, key: &str) -> Result<Option<f64>, Error> {
        self.read(key, |view| view.double())
    }

    pub fn try_get_text(&mut self, key: &str) -> Result<Option<String>, Error> {
        self.read(key, |view| view.text().map(str::to_owned))
    }

    pub fn try_get_bytes(&mut self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        self.read(key, |view| view.bytes().map(<[u8]>::to_vec))
    }

    pub fn has_key(&mut self, key: &str) -> Result<bool, Error> {
        Ok(self.read(key, |_| Ok(()))?.is_some())
    }

    pub fn set(&mut self, key: &str, value: &Value) -> Result<(), Error> {
        self.upsert(key, value)
    }

    pub fn set_int(&mut self, key: &str, value: i64) -> Result<(), Error> {
        self.upsert(key, &value)
    }

    pub fn set_double(&mut self, key: &str, value: f64) -> Result<(), Error> {
        self.upsert(key, &value)
    }

    pub fn set_text(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.upsert(key, &value)
    }

    pub fn set_bytes(&mut self, key: &str, value: &[u8]) -> Result<(), Error> {
        self.upsert(key, &value)
    }

    /// Returns the number of rows removed; an absent key removes zero rows.
    pub fn delete_key(&mut self, key: &str) -> Result<usize, Error> {
        let removed = self
            .execute(StatementKind::DeleteKey, |stmt| {
                stmt.raw_bind_parameter(schema::DELETE_KEY_INDEX, key)
            })
            .map_err(|err| err.with_key(key))?;
        trace!(key, removed, "delete key");
        Ok(removed)
    }

    pub fn delete_all(&mut self) -> Result<usize, Error> {
        let removed = self.execute(StatementKind::DeleteAll, |_| Ok(()))?;
        debug!(removed, "delete all");
        Ok(removed)
    }

    /// Steps the cached `BEGIN`. Nesting is left to the engine, which rejects it.
    pub fn begin(&mut self) -> Result<(), Error> {
        let result = self.execute(StatementKind::Begin, |_| Ok(()));
        self.sync_transaction_state();
        result?;
        debug!("transaction started");
        Ok(())
    }

    pub fn commit(&mut self) -> Result<(), Error> {
        let result = self.execute(StatementKind::Commit, |_| Ok(()));
        self.sync_transaction_state();
        result?;
        self.pending_commit = false;
        debug!("transaction committed");
        Ok(())
    }

    /// Begins a transaction unless one is already open and marks a commit as pending.
    pub fn ensure_transaction(&mut self) -> Result<(), Error> {
        if !self.in_transaction {
            self.begin()?;
        }
        self.pending_commit = true;
        Ok(())
    }

    /// Commits the open transaction, if any. Returns whether a commit happened.
    pub fn flush(&mut self) -> Result<bool, Error> {
        if !self.in_transaction {
            self.pending_commit = false;
            return Ok(false);
        }
        self.commit()?;
        Ok(true)
    }

    /// Runs every statement in `sql` without caching, calling `on_row` for each result
    /// row. `RowControl::Abort` stops execution with an engine abort error.
    pub fn run_sql<F>(&mut self, sql: &str, on_row: F) -> Result<SqlSummary, Error>
    where
        F: FnMut(&SqlRow<'_>) -> RowControl,
    {
        let conn = live(&self.conn)?;
        let result = sql::run(conn, sql, on_row);
        self.sync_transaction_state();
        let summary = result?;
        trace!(
            statements = summary.statements,
            rows = summary.rows,
            "ran arbitrary sql"
        );
        Ok(summary)
    }

    pub fn exec_sql(&mut self, sql: &str) -> Result<(), Error> {
        self.run_sql(sql, |_| RowControl::Continue).map(drop)
    }

    /// Runs a single pragma and returns every value it produced, row by row.
    pub fn pragma(&mut self, pragma: &str) -> Result<Vec<Option<String>>, Error> {
        if pragma.contains(';') {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("pragma must not contain ';'")
                .with_hint("Pass a single pragma such as `user_version` or `page_size = 4096`."));
        }
        let trimmed = pragma.trim_start();
        let has_prefix = trimmed
            .get(..7)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("pragma "));
        let sql = if has_prefix {
            trimmed.to_string()
        } else {
            format!("PRAGMA {trimmed}")
        };
        let mut values = Vec::new();
        self.run_sql(&sql, |row| {
            values.extend(row.values().iter().cloned());
            RowControl::Continue
        })?;
        Ok(values)
    }

    /// Commits any open transaction, then rebuilds the database file.
    pub fn vacuum(&mut self) -> Result<(), Error> {
        self.flush()?;
        self.exec_sql("VACUUM")
    }

    fn read<T, F>(&mut self, key: &str, decode: F) -> Result<Option<T>, Error>
    where
        F: FnOnce(ValueView<'_>) -> Result<T, Error>,
    {
        self.statements
            .check_bindable(StatementKind::Select)
            .map_err(|err| err.with_key(key))?;
        let outcome = self.step_select(key).and_then(|()| {
            self.selected
                .as_ref()
                .map(|value| decode(value.view()))
                .transpose()
        });
        self.reset_select();
        outcome.map_err(|err| err.with_key(key))
    }

    fn step_select(&mut self, key: &str) -> Result<(), Error> {
        let kind = StatementKind::Select;
        self.statements.check_bindable(kind)?;
        let conn = live(&self.conn)?;
        let mut stmt = prepare(conn, &mut self.statements, kind)?;
        stmt.raw_bind_parameter(schema::SELECT_KEY_INDEX, key)
            .map_err(engine_error)?;
        self.statements.mark_stepped(kind)?;

        let mut rows = stmt.raw_query();
        let outcome = match rows.next() {
            Ok(Some(row)) => row
                .get_ref(0)
                .map_err(engine_error)
                .and_then(Value::from_engine)
                .map(Some),
            Ok(None) => Ok(None),
            Err(err) => Err(engine_error(err)),
        };
        self.selected = outcome?;
        trace!(key, found = self.selected.is_some(), "select stepped");
        Ok(())
    }

    fn upsert(&mut self, key: &str, value: &dyn ToSql) -> Result<(), Error> {
        self.execute(StatementKind::Upsert, |stmt| {
            stmt.raw_bind_parameter(schema::UPSERT_KEY_INDEX, key)?;
            stmt.raw_bind_parameter(schema::UPSERT_VALUE_INDEX, value)
        })
        .map_err(|err| err.with_key(key))?;
        trace!(key, "upsert");
        Ok(())
    }

    /// Binds, steps to completion, and resets `kind`.
    fn execute<F>(&mut self, kind: StatementKind, bind: F) -> Result<usize, Error>
    where
        F: FnOnce(&mut Statement<'_>) -> rusqlite::Result<()>,
    {
        self.statements.check_bindable(kind)?;
        let conn = live(&self.conn)?;
        let mut stmt = prepare(conn, &mut self.statements, kind)?;
        bind(&mut *stmt).map_err(engine_error)?;
        self.statements.mark_stepped(kind)?;
        let result = stmt.raw_execute();
        self.statements.mark_reset(kind);
        result.map_err(engine_error)
    }

    fn sync_transaction_state(&mut self) {
        if let Some(conn) = &self.conn {
            self.in_transaction = !conn.is_autocommit();
            if !self.in_transaction {
                self.pending_commit = false;
            }
        }
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.selected = None;
        self.in_transaction = false;
        self.pending_commit = false;
        let finalized = self.statements.finalize_all();
        conn.flush_prepared_statement_cache();
        conn.close().map_err(|(_, err)| {
            Error::from_engine(ErrorKind::Engine, err)
                .with_message("failed to close store")
                .with_path(&self.path)
        })?;
        debug!(path = %self.path.display(), finalized, "closed key-value store");
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "failed to close key-value store");
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("open", &self.conn.is_some())
            .field("statements", &self.statements)
            .field("in_transaction", &self.in_transaction)
            .field("pending_commit", &self.pending_commit)
            .finish()
    }
}

fn apply_journal_mode(conn: &Connection, mode: JournalMode) -> Result<(), Error> {
    let applied: String = conn
        .pragma_update_and_check(None, "journal_mode", mode.as_str(), |row| row.get(0))
        .map_err(|err| Error::from_engine(ErrorKind::Open, err))?;
    if !applied.eq_ignore_ascii_case(mode.as_str()) {
        debug!(requested = mode.as_str(), applied, "journal mode not applied");
    }
    Ok(())
}

fn live(conn: &Option<Connection>) -> Result<&Connection, Error> {
    conn.as_ref()
        .ok_or_else(|| Error::new(ErrorKind::Misuse).with_message("store is closed"))
}

fn prepare<'c>(
    conn: &'c Connection,
    statements: &mut StatementTable,
    kind: StatementKind,
) -> Result<CachedStatement<'c>, Error> {
    let stmt = conn.prepare_cached(kind.sql()).map_err(engine_error)?;
    if statements.mark_prepared(kind) {
        debug!(statement = kind.name(), "prepared statement");
    }
    Ok(stmt)
}

fn engine_error(err: rusqlite::Error) -> Error {
    Error::from_engine(ErrorKind::Engine, err)
}
