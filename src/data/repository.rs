use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppError;
use crate::models::tree::Breadcrumb;

/// Last navigation position recorded for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRecord {
    pub connection_id: String,
    pub current_folder_id: Option<String>,
    pub breadcrumbs: Vec<Breadcrumb>,
}

pub fn save_navigation(conn: &Connection, record: &NavigationRecord) -> Result<(), AppError> {
    let breadcrumbs_json = serde_json::to_string(&record.breadcrumbs)?;
    conn.execute(
        "INSERT INTO navigation_state (connection_id, current_folder_id, breadcrumbs_json, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(connection_id) DO UPDATE SET
            current_folder_id = excluded.current_folder_id,
            breadcrumbs_json = excluded.breadcrumbs_json,
            updated_at = excluded.updated_at",
        params![
            record.connection_id,
            record.current_folder_id,
            breadcrumbs_json,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn load_navigation(
    conn: &Connection,
    connection_id: &str,
) -> Result<Option<NavigationRecord>, AppError> {
    let row = conn
        .query_row(
            "SELECT current_folder_id, breadcrumbs_json FROM navigation_state WHERE connection_id = ?1",
            params![connection_id],
            |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    let Some((current_folder_id, breadcrumbs_json)) = row else {
        return Ok(None);
    };
    Ok(Some(NavigationRecord {
        connection_id: connection_id.to_string(),
        current_folder_id,
        breadcrumbs: serde_json::from_str(&breadcrumbs_json).unwrap_or_default(),
    }))
}

pub fn clear_navigation(conn: &Connection, connection_id: &str) -> Result<usize, AppError> {
    let count = conn.execute(
        "DELETE FROM navigation_state WHERE connection_id = ?1",
        params![connection_id],
    )?;
    Ok(count)
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, AppError> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}
