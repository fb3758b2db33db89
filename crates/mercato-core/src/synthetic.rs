//! Seeded sample-data generator.
//!
//! Produces ten stores, ten departments and one fact per store × department
//! × week, shaped by fixed store and department baselines, monthly seasonal
//! factors, a December boost for toys, a holiday boost, and random
//! markdowns that lift sales. The same seed always yields the same dataset.

use chrono::{Datelike, Duration, NaiveDate};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
  entity::{Department, Store},
  sale::{Dataset, NewSale},
};

/// `(id, name, region, size_sqft, type, performance factor)`
const STORES: [(i64, &str, &str, i64, &str, f64); 10] = [
  (1, "Store A", "North", 150_000, "Supercenter", 1.2),
  (2, "Store B", "South", 120_000, "Discount", 0.9),
  (3, "Store C", "East", 100_000, "Neighborhood", 0.8),
  (4, "Store D", "West", 160_000, "Supercenter", 1.3),
  (5, "Store E", "North", 140_000, "Discount", 1.1),
  (6, "Store F", "South", 90_000, "Neighborhood", 0.7),
  (7, "Store G", "East", 180_000, "Supercenter", 1.25),
  (8, "Store H", "West", 110_000, "Discount", 0.85),
  (9, "Store I", "North", 95_000, "Neighborhood", 0.75),
  (10, "Store J", "South", 170_000, "Supercenter", 1.15),
];

/// `(id, name, category, baseline weekly sales)`
const DEPARTMENTS: [(i64, &str, &str, f64); 10] = [
  (1, "Grocery", "Food", 20_000.0),
  (2, "Dairy", "Food", 12_000.0),
  (3, "Bakery", "Food", 9_000.0),
  (4, "Meat", "Food", 14_000.0),
  (5, "Produce", "Food", 16_000.0),
  (6, "Electronics", "Technology", 18_000.0),
  (7, "Clothing", "Apparel", 15_000.0),
  (8, "Home Goods", "Home", 13_000.0),
  (9, "Health & Beauty", "Personal Care", 11_000.0),
  (10, "Toys", "Entertainment", 8_000.0),
];

const TOYS: i64 = 10;

/// Multiplier per calendar month, January first.
const SEASONAL: [f64; 12] =
  [0.8, 0.7, 0.9, 1.0, 1.1, 1.2, 1.3, 1.25, 1.1, 1.0, 1.2, 1.8];

/// `(month, day)` of the holidays; a week containing one is a holiday week.
const HOLIDAYS: [(u32, u32); 4] = [(1, 1), (7, 4), (11, 25), (12, 25)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
  /// Date of the first week.
  pub start: NaiveDate,
  pub weeks: usize,
  pub seed:  u64,
}

impl GeneratorConfig {
  /// `weeks` weeks ending no later than `end`.
  pub fn ending(end: NaiveDate, weeks: usize, seed: u64) -> Self {
    let start = end - Duration::weeks(weeks.saturating_sub(1) as i64);
    Self { start, weeks, seed }
  }
}

pub fn stores() -> Vec<Store> {
  STORES
    .iter()
    .map(|&(store_id, name, region, size_sqft, store_type, _)| Store {
      store_id,
      name: name.into(),
      region: region.into(),
      size_sqft,
      store_type: store_type.into(),
    })
    .collect()
}

pub fn departments() -> Vec<Department> {
  DEPARTMENTS
    .iter()
    .map(|&(dept_id, name, category, _)| Department {
      dept_id,
      name: name.into(),
      category: category.into(),
    })
    .collect()
}

fn is_holiday_week(start: NaiveDate) -> bool {
  (0..7).any(|d| {
    let day = start + Duration::days(d);
    HOLIDAYS.contains(&(day.month(), day.day()))
  })
}

fn round2(v: f64) -> f64 { (v * 100.0).round() / 100.0 }

pub fn generate(config: &GeneratorConfig) -> Dataset {
  let mut rng = StdRng::seed_from_u64(config.seed);
  let mut sales = Vec::with_capacity(config.weeks * STORES.len() * DEPARTMENTS.len());

  for week in 0..config.weeks {
    let date = config.start + Duration::weeks(week as i64);
    let is_holiday = is_holiday_week(date);

    let temperature = 70.0 + rng.random_range(-20.0..20.0);
    let fuel_price = 3.0 + rng.random_range(-0.5..1.0);
    let cpi = 260.0 + rng.random_range(-5.0..10.0);
    let unemployment = 5.0 + rng.random_range(-1.5..2.0);

    let month_factor = SEASONAL[date.month0() as usize];
    let holiday_boost = if is_holiday { 1.5 } else { 1.0 };

    for &(store_id, .., store_factor) in &STORES {
      for &(dept_id, _, _, baseline) in &DEPARTMENTS {
        let toy_boost = if dept_id == TOYS && date.month() == 12 { 2.0 } else { 1.0 };
        let mut weekly_sales =
          baseline * store_factor * month_factor * holiday_boost * toy_boost;
        weekly_sales *= rng.random_range(0.9..1.1);

        let mut markdown = 0.0;
        if rng.random_bool(0.3) {
          markdown = rng.random_range(5.0..30.0);
          weekly_sales *= 1.0 + markdown / 100.0 * 0.8;
        }

        sales.push(NewSale {
          store_id,
          dept_id,
          date,
          weekly_sales: round2(weekly_sales),
          is_holiday,
          temperature: round2(temperature),
          fuel_price: round2(fuel_price),
          markdown: round2(markdown),
          cpi: round2(cpi),
          unemployment: round2(unemployment),
        });
      }
    }
  }

  Dataset { stores: stores(), departments: departments(), sales }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(seed: u64) -> GeneratorConfig {
    GeneratorConfig {
      start: NaiveDate::from_ymd_opt(2023, 1, 6).unwrap(),
      weeks: 52,
      seed,
    }
  }

  #[test]
  fn same_seed_same_dataset() {
    let a = generate(&config(7));
    let b = generate(&config(7));
    assert_eq!(a.sales, b.sales);
    assert_ne!(a.sales, generate(&config(8)).sales);
  }

  #[test]
  fn output_satisfies_dataset_invariants() {
    let data = generate(&config(42));
    assert_eq!(data.stores.len(), 10);
    assert_eq!(data.departments.len(), 10);
    assert_eq!(data.sales.len(), 52 * 100);
    data.validate().unwrap();
    assert!(data.sales.iter().all(|s| s.markdown == 0.0 || s.markdown >= 5.0));
  }

  #[test]
  fn holiday_weeks_contain_a_holiday() {
    // Week of 2022-12-23 contains Christmas.
    assert!(is_holiday_week(NaiveDate::from_ymd_opt(2022, 12, 23).unwrap()));
    assert!(!is_holiday_week(NaiveDate::from_ymd_opt(2023, 3, 3).unwrap()));
  }

  #[test]
  fn december_toys_outsell_november_toys() {
    let data = generate(&GeneratorConfig {
      start: NaiveDate::from_ymd_opt(2023, 11, 3).unwrap(),
      weeks: 7,
      seed:  1,
    });
    let avg = |month: u32| {
      let v: Vec<f64> = data
        .sales
        .iter()
        .filter(|s| s.dept_id == TOYS && s.date.month() == month && !s.is_holiday)
        .map(|s| s.weekly_sales)
        .collect();
      v.iter().sum::<f64>() / v.len() as f64
    };
    assert!(avg(12) > avg(11) * 2.0);
  }

  #[test]
  fn ending_places_last_week_on_end_date() {
    let end = NaiveDate::from_ymd_opt(2024, 6, 28).unwrap();
    let cfg = GeneratorConfig::ending(end, 10, 0);
    assert_eq!(cfg.start + Duration::weeks(9), end);
  }
}
