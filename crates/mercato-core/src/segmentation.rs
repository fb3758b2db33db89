//! Performance-tier segmentation of stores or departments.
//!
//! Each entity becomes a feature vector (total sales, plus average
//! transaction value and sales per customer when every entity has them),
//! features are standardised, and the vectors are partitioned with seeded
//! k-means++ / Lloyd's algorithm. Cluster quality is reported as the mean
//! silhouette coefficient.

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
  entity::{Department, EntityKind, Store},
  error::ComputationError,
  sale::SalesFact,
  stats::{mean, population_std, round2, round4},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
  /// Requested number of clusters.
  pub k:              usize,
  pub seed:           u64,
  /// Upper bound on Lloyd's iterations per run.
  pub max_iterations: usize,
  /// Independent k-means++ restarts; the lowest-inertia run wins.
  pub n_init:         usize,
}

impl Default for SegmentationConfig {
  fn default() -> Self {
    Self { k: 4, seed: 42, max_iterations: 300, n_init: 10 }
  }
}

// ─── Features ────────────────────────────────────────────────────────────────

/// Aggregated inputs for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFeatures {
  pub entity_id:    i64,
  pub name:         String,
  pub total_sales:  f64,
  /// Distinct transactions, when transaction identifiers are known.
  pub transactions: Option<u64>,
  /// Customer count, when known.
  pub customers:    Option<f64>,
}

impl EntityFeatures {
  /// Aggregate facts per store or per department. Every fact carries a
  /// `sale_id`, so transaction counts are always present; customer counts
  /// are not part of the fact table.
  pub fn from_facts(
    kind: EntityKind,
    facts: &[SalesFact],
    stores: &[Store],
    departments: &[Department],
  ) -> Vec<Self> {
    let names: HashMap<i64, &str> = match kind {
      EntityKind::Store => {
        stores.iter().map(|s| (s.store_id, s.name.as_str())).collect()
      }
      EntityKind::Department => departments
        .iter()
        .map(|d| (d.dept_id, d.name.as_str()))
        .collect(),
    };

    let mut groups: BTreeMap<i64, (f64, HashSet<i64>)> = BTreeMap::new();
    for fact in facts {
      let id = match kind {
        EntityKind::Store => fact.store_id,
        EntityKind::Department => fact.dept_id,
      };
      let slot = groups.entry(id).or_default();
      slot.0 += fact.weekly_sales;
      slot.1.insert(fact.sale_id);
    }

    groups
      .into_iter()
      .map(|(id, (total, sales))| Self {
        entity_id:    id,
        name:         names.get(&id).copied().unwrap_or_default().to_string(),
        total_sales:  total,
        transactions: Some(sales.len() as u64),
        customers:    None,
      })
      .collect()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
  TotalSales,
  AvgTransactionValue,
  SalesPerCustomer,
}

impl Feature {
  fn extract(self, e: &EntityFeatures) -> f64 {
    match self {
      Self::TotalSales => e.total_sales,
      Self::AvgTransactionValue => {
        e.total_sales / e.transactions.unwrap_or(1).max(1) as f64
      }
      Self::SalesPerCustomer => {
        let c = e.customers.unwrap_or(1.0);
        if c > 0.0 { e.total_sales / c } else { 0.0 }
      }
    }
  }
}

/// The feature set is decided once for all entities: an optional feature is
/// used only if every entity has it.
fn feature_set(entities: &[EntityFeatures]) -> Vec<Feature> {
  let mut features = vec![Feature::TotalSales];
  if entities.iter().all(|e| e.transactions.is_some_and(|t| t > 0)) {
    features.push(Feature::AvgTransactionValue);
  }
  if entities.iter().all(|e| e.customers.is_some_and(|c| c > 0.0)) {
    features.push(Feature::SalesPerCustomer);
  }
  features
}

// ─── Output ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAssignment {
  pub entity_id:   i64,
  pub name:        String,
  /// 0 is the tier with the highest mean total sales.
  pub cluster:     usize,
  pub total_sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
  pub cluster:    usize,
  pub size:       usize,
  pub percentage: f64,
  /// Mean of each feature over the members, in original units and in
  /// [`Segmentation::features`] order.
  pub centroid:   Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
  pub requested_k: usize,
  /// Clusters actually formed; never more than `requested_k`.
  pub k:           usize,
  pub features:    Vec<Feature>,
  /// Mean silhouette coefficient; `None` when it is undefined
  /// (`k < 2` or every entity in its own cluster).
  pub silhouette:  Option<f64>,
  pub inertia:     f64,
  pub assignments: Vec<SegmentAssignment>,
  pub clusters:    Vec<ClusterSummary>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct SegmentationEngine {
  config: SegmentationConfig,
}

impl SegmentationEngine {
  pub fn new(config: SegmentationConfig) -> Self { Self { config } }

  pub fn segment(
    &self,
    entities: &[EntityFeatures],
  ) -> Result<Segmentation, ComputationError> {
    if entities.len() < 2 {
      return Err(ComputationError::InsufficientData {
        what:   "entities",
        needed: 2,
        got:    entities.len(),
      });
    }

    let candidates = feature_set(entities);
    let raw: Vec<Vec<f64>> = entities
      .iter()
      .map(|e| candidates.iter().map(|f| f.extract(e)).collect())
      .collect();

    // Standardise each column; drop the ones that carry no information.
    let mut features = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();
    for (j, feature) in candidates.iter().enumerate() {
      let col: Vec<f64> = raw.iter().map(|r| r[j]).collect();
      let (m, sd) = (mean(&col), population_std(&col));
      if sd <= f64::EPSILON * m.abs().max(1.0) {
        debug!(?feature, "dropping zero-variance feature");
        continue;
      }
      features.push((j, *feature));
      columns.push(col.iter().map(|v| (v - m) / sd).collect());
    }
    if features.is_empty() {
      return Err(ComputationError::ZeroVariance);
    }
    let points: Vec<Vec<f64>> = (0..entities.len())
      .map(|i| columns.iter().map(|c| c[i]).collect())
      .collect();

    let distinct = count_distinct(&points);
    let k = self.config.k.clamp(1, distinct);

    let mut best: Option<Lloyd> = None;
    for run in 0..self.config.n_init.max(1) {
      let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(run as u64));
      let result = lloyd(&points, k, self.config.max_iterations, &mut rng);
      if best.as_ref().is_none_or(|b| result.inertia < b.inertia) {
        best = Some(result);
      }
    }
    let Some(best) = best else {
      return Err(ComputationError::DegenerateSeries(
        "k-means produced no result".into(),
      ));
    };

    let (labels, k) = relabel_by_sales(&best.assignments, entities, k);
    let silhouette = silhouette_score(&points, &labels, k);

    let mut clusters = Vec::with_capacity(k);
    for c in 0..k {
      let members: Vec<usize> =
        (0..entities.len()).filter(|&i| labels[i] == c).collect();
      let centroid = features
        .iter()
        .map(|(j, _)| {
          round2(members.iter().map(|&i| raw[i][*j]).sum::<f64>()
            / members.len().max(1) as f64)
        })
        .collect();
      let percentage = members.len() as f64 / entities.len() as f64 * 100.0;
      info!(cluster = c, size = members.len(), percentage, "segment");
      clusters.push(ClusterSummary {
        cluster: c,
        size: members.len(),
        percentage: round2(percentage),
        centroid,
      });
    }

    info!(
      requested_k = self.config.k,
      k,
      silhouette = ?silhouette,
      entities = entities.len(),
      "segmentation complete"
    );

    Ok(Segmentation {
      requested_k: self.config.k,
      k,
      features: features.into_iter().map(|(_, f)| f).collect(),
      silhouette: silhouette.map(round4),
      inertia: round4(best.inertia),
      assignments: entities
        .iter()
        .zip(&labels)
        .map(|(e, &cluster)| SegmentAssignment {
          entity_id: e.entity_id,
          name: e.name.clone(),
          cluster,
          total_sales: round2(e.total_sales),
        })
        .collect(),
      clusters,
    })
  }
}

// ─── k-means ─────────────────────────────────────────────────────────────────

struct Lloyd {
  assignments: Vec<usize>,
  inertia:     f64,
}

fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 { squared_euclidean(a, b).sqrt() }

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
  let mut best = 0;
  let mut best_dist = f64::INFINITY;
  for (c, centroid) in centroids.iter().enumerate() {
    let dist = squared_euclidean(point, centroid);
    if dist < best_dist {
      best_dist = dist;
      best = c;
    }
  }
  best
}

fn count_distinct(points: &[Vec<f64>]) -> usize {
  points
    .iter()
    .map(|p| p.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
    .collect::<HashSet<_>>()
    .len()
}

/// k-means++: first centroid uniformly, the rest with probability
/// proportional to squared distance from the nearest chosen centroid.
fn kmeanspp_init(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
  let n = points.len();
  let mut centroids = Vec::with_capacity(k);
  centroids.push(points[rng.random_range(0..n)].clone());

  while centroids.len() < k {
    let d2: Vec<f64> = points
      .iter()
      .map(|p| {
        centroids
          .iter()
          .map(|c| squared_euclidean(p, c))
          .fold(f64::INFINITY, f64::min)
      })
      .collect();
    let total: f64 = d2.iter().sum();
    if total <= 0.0 {
      break;
    }

    let mut target = rng.random::<f64>() * total;
    let mut chosen = None;
    for (i, &d) in d2.iter().enumerate() {
      if target < d {
        chosen = Some(i);
        break;
      }
      target -= d;
    }
    // Rounding can walk past the end; fall back to the farthest point.
    let idx = chosen.unwrap_or_else(|| {
      d2.iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
    });
    centroids.push(points[idx].clone());
  }
  centroids
}

fn lloyd(
  points: &[Vec<f64>],
  k: usize,
  max_iterations: usize,
  rng: &mut StdRng,
) -> Lloyd {
  let dim = points[0].len();
  let mut centroids = kmeanspp_init(points, k, rng);
  let mut assignments = vec![usize::MAX; points.len()];

  for _ in 0..max_iterations.max(1) {
    let mut changed = false;
    for (i, point) in points.iter().enumerate() {
      let nearest = nearest_centroid(point, &centroids);
      if assignments[i] != nearest {
        assignments[i] = nearest;
        changed = true;
      }
    }
    if !changed {
      break;
    }

    let mut sums = vec![vec![0.0; dim]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];
    for (point, &c) in points.iter().zip(&assignments) {
      counts[c] += 1;
      for (s, v) in sums[c].iter_mut().zip(point) {
        *s += v;
      }
    }
    for (c, sum) in sums.into_iter().enumerate() {
      // Empty cluster: keep the previous centroid.
      if counts[c] > 0 {
        centroids[c] = sum.into_iter().map(|s| s / counts[c] as f64).collect();
      }
    }
  }

  let inertia = points
    .iter()
    .zip(&assignments)
    .map(|(p, &c)| squared_euclidean(p, &centroids[c]))
    .sum();
  Lloyd { assignments, inertia }
}

/// Renumber clusters so 0 has the highest mean total sales. Clusters left
/// empty by Lloyd's algorithm are dropped, keeping labels contiguous; the
/// second value is the number of non-empty clusters.
fn relabel_by_sales(
  assignments: &[usize],
  entities: &[EntityFeatures],
  k: usize,
) -> (Vec<usize>, usize) {
  let mut sums = vec![(0.0, 0usize); k];
  for (&c, e) in assignments.iter().zip(entities) {
    sums[c].0 += e.total_sales;
    sums[c].1 += 1;
  }
  let mut order: Vec<usize> = (0..k).filter(|&c| sums[c].1 > 0).collect();
  order.sort_by(|&a, &b| {
    let ma = sums[a].0 / sums[a].1 as f64;
    let mb = sums[b].0 / sums[b].1 as f64;
    mb.total_cmp(&ma).then(a.cmp(&b))
  });
  let mut mapping = vec![0; k];
  for (new, &old) in order.iter().enumerate() {
    mapping[old] = new;
  }
  (assignments.iter().map(|&c| mapping[c]).collect(), order.len())
}

/// Mean silhouette over all points. Members of singleton clusters score 0.
fn silhouette_score(points: &[Vec<f64>], labels: &[usize], k: usize) -> Option<f64> {
  let n = points.len();
  let used: HashSet<usize> = labels.iter().copied().collect();
  if used.len() < 2 || used.len() >= n {
    return None;
  }

  let mut members: Vec<Vec<usize>> = vec![Vec::new(); k];
  for (i, &c) in labels.iter().enumerate() {
    members[c].push(i);
  }

  let mut total = 0.0;
  for (i, point) in points.iter().enumerate() {
    let own = &members[labels[i]];
    if own.len() <= 1 {
      continue;
    }
    let a = own
      .iter()
      .filter(|&&j| j != i)
      .map(|&j| euclidean(point, &points[j]))
      .sum::<f64>()
      / (own.len() - 1) as f64;
    let b = members
      .iter()
      .enumerate()
      .filter(|(c, m)| *c != labels[i] && !m.is_empty())
      .map(|(_, m)| {
        m.iter().map(|&j| euclidean(point, &points[j])).sum::<f64>()
          / m.len() as f64
      })
      .fold(f64::INFINITY, f64::min);
    let max_ab = a.max(b);
    if max_ab > 0.0 {
      total += (b - a) / max_ab;
    }
  }
  Some(total / n as f64)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entity(id: i64, total: f64, transactions: u64) -> EntityFeatures {
    EntityFeatures {
      entity_id:    id,
      name:         format!("E{id}"),
      total_sales:  total,
      transactions: Some(transactions),
      customers:    None,
    }
  }

  fn engine(k: usize) -> SegmentationEngine {
    SegmentationEngine::new(SegmentationConfig { k, ..Default::default() })
  }

  fn tiers() -> Vec<EntityFeatures> {
    vec![
      entity(1, 1_000.0, 10),
      entity(2, 1_050.0, 10),
      entity(3, 980.0, 10),
      entity(4, 10_000.0, 20),
      entity(5, 10_200.0, 20),
      entity(6, 9_900.0, 20),
    ]
  }

  #[test]
  fn separated_tiers_split_cleanly() {
    let seg = engine(2).segment(&tiers()).unwrap();
    assert_eq!(seg.k, 2);
    let high: Vec<i64> = seg
      .assignments
      .iter()
      .filter(|a| a.cluster == 0)
      .map(|a| a.entity_id)
      .collect();
    assert_eq!(high, vec![4, 5, 6]);
    assert!(seg.silhouette.unwrap() > 0.8);
    assert_eq!(seg.features, vec![
      Feature::TotalSales,
      Feature::AvgTransactionValue
    ]);
  }

  #[test]
  fn every_entity_assigned_once_and_k_bounded() {
    let entities = tiers();
    for k in 1..=8 {
      let seg = engine(k).segment(&entities).unwrap();
      assert!(seg.k <= k);
      assert_eq!(seg.assignments.len(), entities.len());
      assert!(seg.assignments.iter().all(|a| a.cluster < seg.k));
      let sizes: usize = seg.clusters.iter().map(|c| c.size).sum();
      assert_eq!(sizes, entities.len());
    }
  }

  #[test]
  fn k_reduced_to_distinct_points() {
    let entities = vec![
      entity(1, 100.0, 1),
      entity(2, 100.0, 1),
      entity(3, 500.0, 1),
    ];
    let seg = engine(3).segment(&entities).unwrap();
    assert_eq!(seg.requested_k, 3);
    assert_eq!(seg.k, 2);
    assert_eq!(seg.assignments[0].cluster, seg.assignments[1].cluster);
  }

  #[test]
  fn same_seed_same_result() {
    let a = engine(3).segment(&tiers()).unwrap();
    let b = engine(3).segment(&tiers()).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn degenerate_input_is_reported() {
    assert_eq!(
      engine(2).segment(&[entity(1, 10.0, 1)]),
      Err(ComputationError::InsufficientData {
        what:   "entities",
        needed: 2,
        got:    1,
      })
    );
    let flat = vec![entity(1, 10.0, 1), entity(2, 10.0, 1)];
    assert_eq!(engine(2).segment(&flat), Err(ComputationError::ZeroVariance));
  }

  #[test]
  fn optional_features_used_only_when_universal() {
    let mut entities = tiers();
    entities[0].transactions = None;
    for (i, e) in entities.iter_mut().enumerate() {
      e.customers = Some(10.0 + i as f64);
    }
    let seg = engine(2).segment(&entities).unwrap();
    assert_eq!(seg.features, vec![
      Feature::TotalSales,
      Feature::SalesPerCustomer
    ]);
  }

  #[test]
  fn single_cluster_has_no_silhouette() {
    let seg = engine(1).segment(&tiers()).unwrap();
    assert_eq!(seg.k, 1);
    assert_eq!(seg.silhouette, None);
  }
}
