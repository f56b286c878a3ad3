//! Implements a SQLite backed annotation store.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    stores::{Annotation, AnnotationStore},
};

/// Create the annotation table in the database.
///
/// The view identifier is the primary key, so each view has at most one
/// annotation.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn create_annotation_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS annotation (
            view_id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Saves and retrieves view annotations to/from a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteAnnotationStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteAnnotationStore {
    /// Create a new annotation store, creating the annotation table if needed.
    ///
    /// # Errors
    /// Returns an error if the table cannot be created.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Result<Self, Error> {
        let store = Self { connection };
        let connection = store.lock()?;
        create_annotation_table(&connection)?;
        drop(connection);

        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)
    }

    fn map_row(row: &Row) -> Result<Annotation, rusqlite::Error> {
        Ok(Annotation {
            view_id: row.get(0)?,
            text: row.get(1)?,
            updated_at: row.get(2)?,
        })
    }
}

impl AnnotationStore for SQLiteAnnotationStore {
    fn get(&self, view_id: &str) -> Result<Annotation, Error> {
        self.lock()?
            .prepare("SELECT view_id, text, updated_at FROM annotation WHERE view_id = ?1")?
            .query_row([view_id], Self::map_row)
            .map_err(|error| error.into())
    }

    fn save(&self, view_id: &str, text: &str) -> Result<Annotation, Error> {
        let annotation = Annotation {
            view_id: view_id.to_owned(),
            text: text.to_owned(),
            updated_at: OffsetDateTime::now_utc(),
        };

        self.lock()?.execute(
            "INSERT INTO annotation (view_id, text, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(view_id) DO UPDATE SET text = excluded.text, updated_at = excluded.updated_at",
            (&annotation.view_id, &annotation.text, annotation.updated_at),
        )?;

        Ok(annotation)
    }

    fn delete(&self, view_id: &str) -> Result<(), Error> {
        let rows_affected = self
            .lock()?
            .execute("DELETE FROM annotation WHERE view_id = ?1", [view_id])?;

        if rows_affected == 0 {
            return Err(Error::NotFound);
        }

        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Annotation>, Error> {
        self.lock()?
            .prepare("SELECT view_id, text, updated_at FROM annotation ORDER BY view_id")?
            .query_map([], Self::map_row)?
            .map(|maybe_annotation| maybe_annotation.map_err(|error| error.into()))
            .collect()
    }
}
