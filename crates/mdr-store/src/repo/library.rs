//! Library registry table

use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::errors::{from_rusqlite, Result};
use mdr_core::errors::MdrError;
use mdr_core::model::Library;
use mdr_core::repository::LibraryRepository;

/// SQLite-backed [`LibraryRepository`]
#[derive(Clone)]
pub struct SqliteLibraryRepository {
    db: Database,
}

impl SqliteLibraryRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl LibraryRepository for SqliteLibraryRepository {
    fn find_library(&self, name: &str) -> Result<Option<Library>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT name, is_editable FROM libraries WHERE name = ?1",
                [name],
                |row| Ok(Library::new(row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()
            .map_err(from_rusqlite)
        })
    }

    fn create_library(&self, library: &Library) -> Result<()> {
        self.db.with_conn(|conn| {
            let inserted = conn
                .execute(
                    "INSERT INTO libraries (name, is_editable) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![library.name, library.is_editable],
                )
                .map_err(from_rusqlite)?;
            if inserted == 0 {
                return Err(MdrError::LibraryAlreadyExists {
                    library: library.name.clone(),
                }
                .into());
            }
            Ok(())
        })
    }

    fn list_libraries(&self) -> Result<Vec<Library>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT name, is_editable FROM libraries ORDER BY name")
                .map_err(from_rusqlite)?;
            let libraries = stmt
                .query_map([], |row| {
                    Ok(Library::new(row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
                })
                .map_err(from_rusqlite)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(from_rusqlite)?;
            Ok(libraries)
        })
    }

    fn set_editable(&self, name: &str, is_editable: bool) -> Result<()> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE libraries SET is_editable = ?2 WHERE name = ?1",
                    params![name, is_editable],
                )
                .map_err(from_rusqlite)?;
            if changed == 0 {
                return Err(MdrError::LibraryNotFound {
                    library: name.to_string(),
                }
                .into());
            }
            Ok(())
        })
    }
}
