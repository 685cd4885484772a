// Fixed table layout and the SQL text of every cached statement.
use rusqlite::Connection;

use crate::core::error::{Error, ErrorKind};

pub const TABLE_NAME: &str = "KeyValueStore";

pub const SQL_CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS KeyValueStore (key TEXT NOT NULL PRIMARY KEY COLLATE BINARY, value BLOB)";
pub const SQL_SELECT: &str = "SELECT value FROM KeyValueStore WHERE key = ?1";
pub const SQL_UPSERT: &str = "INSERT INTO KeyValueStore(key, value) VALUES(?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2";
pub const SQL_DELETE_KEY: &str = "DELETE FROM KeyValueStore WHERE key = ?1";
pub const SQL_DELETE_ALL: &str = "DELETE FROM KeyValueStore";
pub const SQL_BEGIN: &str = "BEGIN";
pub const SQL_COMMIT: &str = "COMMIT";

pub const SELECT_KEY_INDEX: usize = 1;
pub const UPSERT_KEY_INDEX: usize = 1;
pub const UPSERT_VALUE_INDEX: usize = 2;
pub const DELETE_KEY_INDEX: usize = 1;

/// Text encoding of a newly created database file. Ignored by the engine once the
/// file holds any content.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TextEncoding {
    Utf8,
    #[default]
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    pub fn pragma_value(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16Le => "UTF-16le",
            TextEncoding::Utf16Be => "UTF-16be",
        }
    }
}

pub(crate) fn create_table(conn: &Connection, encoding: TextEncoding) -> Result<(), Error> {
    conn.pragma_update(None, "encoding", encoding.pragma_value())
        .map_err(|err| {
            Error::from_engine(ErrorKind::Schema, err).with_message("failed to set text encoding")
        })?;
    conn.execute(SQL_CREATE_TABLE, ()).map_err(|err| {
        Error::from_engine(ErrorKind::Schema, err)
            .with_hint("The file may not be a key-value store or may be read-only.")
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{TextEncoding, create_table};
    use rusqlite::Connection;

    #[test]
    fn create_table_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open");
        create_table(&conn, TextEncoding::Utf8).expect("first");
        create_table(&conn, TextEncoding::Utf8).expect("second");

        let sql: String = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [super::TABLE_NAME],
                |row| row.get(0),
            )
            .expect("table sql");
        assert!(sql.contains("COLLATE BINARY"));
    }

    #[test]
    fn new_files_use_requested_encoding() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("enc.db");
        let conn = Connection::open(&path).expect("open");
        create_table(&conn, TextEncoding::Utf16Le).expect("create");
        let encoding: String = conn
            .pragma_query_value(None, "encoding", |row| row.get(0))
            .expect("encoding");
        assert_eq!(encoding, "UTF-16le");
    }
}
