use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::AppError;
use crate::sheet::{self, Sheet};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sheet (
    id      TEXT PRIMARY KEY,
    title   TEXT NOT NULL,
    columns TEXT NOT NULL,
    data    TEXT NOT NULL
);
";

/// One `sheet` table row as stored: title plus the two JSON text blobs,
/// not yet parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRecord {
    pub id: String,
    pub title: String,
    pub columns: String,
    pub data: String,
}

impl SheetRecord {
    /// Decode the blobs into the in-memory model. Fails when a blob is
    /// not the expected JSON array shape.
    pub fn parse(&self) -> Result<Sheet, AppError> {
        Ok(Sheet {
            id: self.id.clone(),
            title: self.title.clone(),
            columns: sheet::parse_columns(&self.columns)?,
            rows: sheet::parse_rows(&self.data)?,
        })
    }
}

/// SQLite-backed sheet persistence. One connection behind a mutex; every
/// operation takes the lock, so request handling is serialized at the
/// store and a lookup-then-insert pair cannot interleave with another.
#[derive(Clone)]
pub struct SheetStore {
    conn: Arc<Mutex<Connection>>,
}

impl SheetStore {
    /// Open (or create) the database file at `path` and ensure the schema.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file, created if absent.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store, used by the test suites.
    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(SheetStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("sheet store mutex poisoned")
    }

    fn find_with(conn: &Connection, id: &str) -> Result<Option<SheetRecord>, AppError> {
        let record = conn
            .query_row(
                "SELECT id, title, columns, data FROM sheet WHERE id = ?1",
                params![id],
                |row| {
                    Ok(SheetRecord {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        columns: row.get(2)?,
                        data: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Fetch the raw stored record, if any.
    pub fn find(&self, id: &str) -> Result<Option<SheetRecord>, AppError> {
        Self::find_with(&self.lock(), id)
    }

    /// Load the sheet stored under `id`, materializing the default sheet
    /// on first visit. The lock is held across lookup and insert so two
    /// first visits to the same id cannot both insert.
    pub fn load_or_create(&self, id: &str) -> Result<Sheet, AppError> {
        let conn = self.lock();
        if let Some(record) = Self::find_with(&conn, id)? {
            return record.parse();
        }
        let created = Sheet::with_defaults(id);
        let columns = created.columns_blob()?;
        let data = created.rows_blob()?;
        conn.execute(
            "INSERT INTO sheet (id, title, columns, data) VALUES (?1, ?2, ?3, ?4)",
            params![created.id, created.title, columns, data],
        )?;
        log::info!("created sheet {id}");
        Ok(created)
    }

    /// Re-read the sheet under `id`, apply `edit` to the fresh copy, and
    /// write the whole record back. The edit lands on current rows, not
    /// on whatever snapshot rendered the submitting page; racing writers
    /// still resolve to last-writer-wins. Fails when no record exists
    /// under `id`.
    pub fn update_with<F, T>(&self, id: &str, edit: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Sheet) -> T,
    {
        let conn = self.lock();
        let record =
            Self::find_with(&conn, id)?.ok_or_else(|| AppError::NoSuchSheet(id.to_string()))?;
        let mut current = record.parse()?;
        let outcome = edit(&mut current);
        let columns = current.columns_blob()?;
        let data = current.rows_blob()?;
        conn.execute(
            "UPDATE sheet SET title = ?2, columns = ?3, data = ?4 WHERE id = ?1",
            params![current.id, current.title, columns, data],
        )?;
        Ok(outcome)
    }
}
