//! SQL schema for the Mercato SQLite store.
//!
//! Executed once at connection startup. The fact table is append-only and
//! carries the referential and range constraints of the data model.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS stores (
    store_id    INTEGER PRIMARY KEY CHECK (store_id > 0),
    name        TEXT    NOT NULL,
    region      TEXT    NOT NULL,
    size_sqft   INTEGER NOT NULL CHECK (size_sqft > 0),
    store_type  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS departments (
    dept_id     INTEGER PRIMARY KEY CHECK (dept_id > 0),
    name        TEXT    NOT NULL,
    category    TEXT    NOT NULL
);

-- One row per store x department x week. Never updated or deleted.
CREATE TABLE IF NOT EXISTS sales (
    sale_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    store_id      INTEGER NOT NULL REFERENCES stores(store_id),
    dept_id       INTEGER NOT NULL REFERENCES departments(dept_id),
    date          TEXT    NOT NULL,   -- YYYY-MM-DD
    weekly_sales  REAL    NOT NULL CHECK (weekly_sales >= 0),
    is_holiday    INTEGER NOT NULL DEFAULT 0 CHECK (is_holiday IN (0, 1)),
    temperature   REAL    NOT NULL DEFAULT 0,
    fuel_price    REAL    NOT NULL DEFAULT 0,
    markdown      REAL    NOT NULL DEFAULT 0 CHECK (markdown BETWEEN 0 AND 100),
    cpi           REAL    NOT NULL DEFAULT 0,
    unemployment  REAL    NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS sales_date_idx  ON sales(date);
CREATE INDEX IF NOT EXISTS sales_store_idx ON sales(store_id);
CREATE INDEX IF NOT EXISTS sales_dept_idx  ON sales(dept_id);

PRAGMA user_version = 1;
";
