#![forbid(unsafe_code)]

use bc_core::{RecordEntry, RecordStatus};
use rusqlite::{Connection, OptionalExtension, params};

use crate::StoreError;
use crate::validate::{from_sqlite_u64, to_sqlite_i64};

pub(super) fn put_record(conn: &Connection, record: &RecordEntry) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO records(token, version, status, timestamp) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(token, version) DO UPDATE SET status=excluded.status, timestamp=excluded.timestamp",
        params![
            record.token,
            to_sqlite_i64("version", record.version)?,
            record.status.code(),
            record.timestamp
        ],
    )?;
    Ok(())
}

pub(super) fn latest_record(
    conn: &Connection,
    token: &str,
) -> Result<Option<RecordEntry>, StoreError> {
    let row = conn
        .query_row(
            "SELECT version, status, timestamp FROM records WHERE token=?1 \
             ORDER BY version DESC LIMIT 1",
            params![token],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((version, status, timestamp)) = row else {
        return Ok(None);
    };
    Ok(Some(RecordEntry {
        token: token.to_string(),
        version: from_sqlite_u64("version", version)?,
        status: RecordStatus::from_code(status)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?,
        timestamp,
    }))
}
