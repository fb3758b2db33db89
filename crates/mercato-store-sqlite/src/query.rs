//! The single parametrised query builder.
//!
//! Every read goes through [`Selection`]: a [`SalesFilter`] turned into one
//! `WHERE` clause over `sales s` with positional parameters, plus the joins
//! every query shares. Grouped reads add a [`GroupKey`] projection.

use mercato_core::filter::{GroupKey, SalesFilter, TimePeriod};
use rusqlite::types::Value;

use crate::encode::encode_date;

/// Joins shared by every fact query.
const FROM: &str = "FROM sales s \
  JOIN stores st ON st.store_id = s.store_id \
  JOIN departments d ON d.dept_id = s.dept_id";

/// A filtered selection of `sales s`.
#[derive(Debug, Clone)]
pub struct Selection {
  clause: String,
  params: Vec<Value>,
}

impl Selection {
  pub fn new(filter: &SalesFilter) -> Self {
    let mut conds: Vec<&'static str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if let Some(start) = filter.start {
      conds.push("s.date >= ?");
      params.push(Value::Text(encode_date(start)));
    }
    if let Some(end) = filter.end {
      conds.push("s.date <= ?");
      params.push(Value::Text(encode_date(end)));
    }
    if let Some(id) = filter.store_id {
      conds.push("s.store_id = ?");
      params.push(Value::Integer(id));
    }
    if let Some(id) = filter.dept_id {
      conds.push("s.dept_id = ?");
      params.push(Value::Integer(id));
    }
    if let Some(year) = filter.year {
      conds.push("strftime('%Y', s.date) = ?");
      params.push(Value::Text(format!("{year:04}")));
    }

    let clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };
    Self { clause, params }
  }

  /// Parameters for a query ending in `LIMIT ?`.
  pub fn params_with_limit(&self, limit: usize) -> Vec<Value> {
    let mut params = self.params.clone();
    params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    params
  }

  pub fn facts_sql(&self, columns: &str, order: &str) -> String {
    format!("SELECT {columns} {FROM} {} ORDER BY {order}", self.clause)
  }

  pub fn bounds_sql(&self) -> String {
    format!("SELECT MIN(s.date), MAX(s.date) {FROM} {}", self.clause)
  }

  pub fn aggregate_sql(&self, key: GroupKey) -> String {
    let g = Grouping::of(key);
    format!(
      "SELECT {key} AS group_key, {id} AS group_id,
              SUM(s.weekly_sales), AVG(s.weekly_sales), COUNT(*),
              COUNT(DISTINCT strftime('%Y-%W', s.date))
       {FROM} {clause}
       GROUP BY {group}
       ORDER BY {order}",
      key = g.key,
      id = g.id,
      clause = self.clause,
      group = g.group,
      order = g.order,
    )
  }

  pub fn params(&self) -> &[Value] { &self.params }
}

/// SQL fragments for one [`GroupKey`].
struct Grouping {
  /// Text label of the group.
  key:   &'static str,
  /// Entity id, or `NULL`.
  id:    &'static str,
  group: &'static str,
  order: &'static str,
}

impl Grouping {
  fn of(key: GroupKey) -> Self {
    match key {
      GroupKey::Store => Self {
        key:   "st.name",
        id:    "s.store_id",
        group: "s.store_id",
        order: "st.name, s.store_id",
      },
      GroupKey::Department => Self {
        key:   "d.name",
        id:    "s.dept_id",
        group: "s.dept_id",
        order: "d.name, s.dept_id",
      },
      GroupKey::Date(period) => {
        let key = match period {
          TimePeriod::Day => "strftime('%Y-%m-%d', s.date)",
          TimePeriod::Week => "strftime('%Y-%W', s.date)",
          TimePeriod::Month => "strftime('%Y-%m', s.date)",
          TimePeriod::Year => "strftime('%Y', s.date)",
        };
        Self { key, id: "NULL", group: key, order: key }
      }
      GroupKey::StoreType => Self {
        key:   "st.store_type",
        id:    "NULL",
        group: "st.store_type",
        order: "st.store_type",
      },
      GroupKey::Region => Self {
        key:   "st.region",
        id:    "NULL",
        group: "st.region",
        order: "st.region",
      },
      GroupKey::Category => Self {
        key:   "d.category",
        id:    "NULL",
        group: "d.category",
        order: "d.category",
      },
      GroupKey::Weekday => Self {
        key:   "strftime('%w', s.date)",
        id:    "NULL",
        group: "strftime('%w', s.date)",
        order: "strftime('%w', s.date)",
      },
      GroupKey::Month => Self {
        key:   "CAST(CAST(strftime('%m', s.date) AS INTEGER) AS TEXT)",
        id:    "NULL",
        group: "strftime('%m', s.date)",
        order: "strftime('%m', s.date)",
      },
      GroupKey::Quarter => Self {
        key:   "CAST((CAST(strftime('%m', s.date) AS INTEGER) + 2) / 3 AS TEXT)",
        id:    "NULL",
        group: "(CAST(strftime('%m', s.date) AS INTEGER) + 2) / 3",
        order: "(CAST(strftime('%m', s.date) AS INTEGER) + 2) / 3",
      },
    }
  }
}
