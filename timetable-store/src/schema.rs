//! Snapshot schema.
//!
//! Table and column names are the ones download clients already read
//! (`Category`, `Bus`, `Station`, `BusTime`). `Category.kind` holds the
//! canonical transport kind the sync engine resolves categories by.

use rusqlite::Connection;

use crate::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS Category (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nameCategory TEXT NOT NULL,
    kind TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS Bus (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    nameCategory_id INTEGER NOT NULL,
    numBus INTEGER NOT NULL,
    FOREIGN KEY (nameCategory_id) REFERENCES Category(id) ON DELETE CASCADE
);
CREATE UNIQUE INDEX IF NOT EXISTS Bus_category_number ON Bus(nameCategory_id, numBus);
CREATE TABLE IF NOT EXISTS Station (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    station TEXT NOT NULL,
    path TEXT NOT NULL,
    link TEXT NOT NULL,
    Bus_id INTEGER NOT NULL,
    FOREIGN KEY (Bus_id) REFERENCES Bus(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS Station_bus ON Station(Bus_id);
CREATE TABLE IF NOT EXISTS BusTime (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hour TEXT NOT NULL,
    time TEXT NOT NULL,
    day TEXT NOT NULL,
    Station_id INTEGER NOT NULL,
    FOREIGN KEY (Station_id) REFERENCES Station(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS BusTime_station ON BusTime(Station_id);
";

/// Create all tables and indexes. Safe to run on an initialized database.
pub fn ensure(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Cascades are only honoured with this pragma set on the connection.
pub fn enable_foreign_keys(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}
