pub mod migrations;
pub mod repository;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::AppError;

/// Opens (creating if needed) the navigation database and migrates it.
pub fn open_database(path: &Path) -> Result<Connection, AppError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state/drivepick.db");
        let conn = open_database(&path).unwrap();
        assert!(path.exists());
        assert!(repository::get_setting(&conn, "missing").unwrap().is_none());
    }
}
