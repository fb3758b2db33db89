//! [`SqliteStore`]: the SQLite implementation of [`FactStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, params_from_iter};
use tracing::{debug, info};

use mercato_core::{
  accessor::FactStore,
  entity::{Department, DeptId, Store, StoreId},
  filter::{DateRange, GroupAggregate, GroupKey, SalesFilter},
  sale::{Dataset, SaleRow, SalesFact},
};

use crate::{
  Error, Result,
  encode::{
    FACT_COLUMNS, RawFact, RawSaleRow, decode_bounds, department_from_row,
    encode_date, group_from_row, store_from_row,
  },
  query::Selection,
  schema::SCHEMA,
};

const STORE_COLUMNS: &str = "store_id, name, region, size_sqft, store_type";
const DEPARTMENT_COLUMNS: &str = "dept_id, name, category";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Mercato fact store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of sales facts currently stored.
  pub async fn fact_count(&self) -> Result<u64> {
    let n: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM sales", [], |r| r.get(0))?)
      })
      .await?;
    Ok(n.max(0) as u64)
  }
}

// ─── FactStore impl ──────────────────────────────────────────────────────────

impl FactStore for SqliteStore {
  type Error = Error;

  // ── Reference data ────────────────────────────────────────────────────

  async fn list_stores(&self) -> Result<Vec<Store>> {
    let stores = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {STORE_COLUMNS} FROM stores ORDER BY store_id"
        ))?;
        let rows = stmt
          .query_map([], store_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(stores)
  }

  async fn get_store(&self, id: StoreId) -> Result<Option<Store>> {
    let store = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {STORE_COLUMNS} FROM stores WHERE store_id = ?1"),
              rusqlite::params![id],
              store_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(store)
  }

  async fn list_departments(&self) -> Result<Vec<Department>> {
    let departments = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DEPARTMENT_COLUMNS} FROM departments ORDER BY dept_id"
        ))?;
        let rows = stmt
          .query_map([], department_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(departments)
  }

  async fn get_department(&self, id: DeptId) -> Result<Option<Department>> {
    let department = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE dept_id = ?1"
              ),
              rusqlite::params![id],
              department_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(department)
  }

  // ── Facts ─────────────────────────────────────────────────────────────

  async fn facts(&self, filter: SalesFilter) -> Result<Vec<SalesFact>> {
    let sel = Selection::new(&filter);
    let sql = sel.facts_sql(FACT_COLUMNS, "s.date, s.sale_id");
    debug!(%sql, "querying facts");

    let raws: Vec<RawFact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(sel.params()), RawFact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFact::into_fact).collect()
  }

  async fn date_bounds(&self, filter: SalesFilter) -> Result<Option<DateRange>> {
    let sel = Selection::new(&filter);
    let sql = sel.bounds_sql();
    debug!(%sql, "querying date bounds");

    let (min, max): (Option<String>, Option<String>) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, params_from_iter(sel.params()), |r| {
          Ok((r.get(0)?, r.get(1)?))
        })?)
      })
      .await?;

    decode_bounds(min, max)
  }

  async fn list_sales(&self, filter: SalesFilter, limit: usize) -> Result<Vec<SaleRow>> {
    let sel = Selection::new(&filter);
    let sql = format!(
      "{} LIMIT ?",
      sel.facts_sql(
        &format!("{FACT_COLUMNS}, st.name, d.name"),
        "s.date DESC, s.sale_id DESC",
      )
    );
    let params = sel.params_with_limit(limit);
    debug!(%sql, limit, "listing sales");

    let raws: Vec<RawSaleRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params), |row| {
            Ok(RawSaleRow {
              fact:       RawFact::from_row(row)?,
              store_name: row.get(11)?,
              dept_name:  row.get(12)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSaleRow::into_row).collect()
  }

  async fn aggregate(
    &self,
    filter: SalesFilter,
    key: GroupKey,
  ) -> Result<Vec<GroupAggregate>> {
    let sel = Selection::new(&filter);
    let sql = sel.aggregate_sql(key);
    debug!(%sql, ?key, "aggregating sales");

    let groups = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(sel.params()), group_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(groups)
  }

  // ── Loading ───────────────────────────────────────────────────────────

  async fn bulk_load(&self, dataset: Dataset) -> Result<usize> {
    dataset.validate()?;
    let existing = self.fact_count().await?;
    if existing > 0 {
      return Err(Error::NotEmpty(existing));
    }

    let Dataset { stores, departments, sales } = dataset;
    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut insert_store = tx.prepare(&format!(
            "INSERT INTO stores ({STORE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"
          ))?;
          for s in &stores {
            insert_store.execute(rusqlite::params![
              s.store_id,
              s.name,
              s.region,
              s.size_sqft,
              s.store_type,
            ])?;
          }

          let mut insert_dept = tx.prepare(&format!(
            "INSERT INTO departments ({DEPARTMENT_COLUMNS}) VALUES (?1, ?2, ?3)"
          ))?;
          for d in &departments {
            insert_dept.execute(rusqlite::params![d.dept_id, d.name, d.category])?;
          }

          let mut insert_sale = tx.prepare(
            "INSERT INTO sales (
               store_id, dept_id, date, weekly_sales, is_holiday,
               temperature, fuel_price, markdown, cpi, unemployment
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;
          for sale in &sales {
            insert_sale.execute(rusqlite::params![
              sale.store_id,
              sale.dept_id,
              encode_date(sale.date),
              sale.weekly_sales,
              sale.is_holiday,
              sale.temperature,
              sale.fuel_price,
              sale.markdown,
              sale.cpi,
              sale.unemployment,
            ])?;
          }
        }
        tx.commit()?;
        Ok(sales.len())
      })
      .await?;

    info!(facts = written, "bulk load complete");
    Ok(written)
  }
}
