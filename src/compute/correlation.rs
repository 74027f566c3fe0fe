use crate::core::FeatureData;
use crate::error::{PipelineError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Symmetric `size x size` matrix of Pearson coefficients, row-major.
///
/// The diagonal is exactly 1 for a feature with non-zero variance and NaN
/// for a constant feature (or one with fewer than two valid rows). Any
/// pair involving such a feature is NaN as well.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    size: usize,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    fn filled(size: usize) -> Self {
        Self {
            size,
            values: vec![f64::NAN; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.size + col]
    }

    fn set_pair(&mut self, i: usize, j: usize, value: f64) {
        self.values[i * self.size + j] = value;
        self.values[j * self.size + i] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.size..(row + 1) * self.size]
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.size).map(|r| self.row(r).to_vec()).collect()
    }
}

/// Pairwise Pearson correlation over equal-length features.
///
/// Cost is O(N^2 * rows). A row is left out of pair (i, j) when either
/// value is NaN or `mask` excludes it; other pairs still use it.
pub fn compute_correlations(features: &[&FeatureData], mask: Option<&[bool]>) -> Result<CorrelationMatrix> {
    let rows = features.first().map(|f| f.len()).unwrap_or(0);
    if let Some((index, bad)) = features.iter().enumerate().find(|(_, f)| f.len() != rows) {
        return Err(PipelineError::data(
            "correlations",
            format!("feature {} has {} values, expected {}", index, bad.len(), rows),
        ));
    }
    if let Some(mask) = mask {
        if mask.len() != rows {
            return Err(PipelineError::data(
                "correlations",
                format!("exclusion mask has {} entries for {} rows", mask.len(), rows),
            ));
        }
    }

    let mut matrix = CorrelationMatrix::filled(features.len());
    for i in 0..features.len() {
        if pearson(features[i], features[i], mask).is_some() {
            matrix.set_pair(i, i, 1.0);
        }
        for j in (i + 1)..features.len() {
            if let Some(r) = pearson(features[i], features[j], mask) {
                matrix.set_pair(i, j, r);
            }
        }
    }

    Ok(matrix)
}

/// Two-pass Pearson coefficient; `None` when undefined
fn pearson(a: &FeatureData, b: &FeatureData, mask: Option<&[bool]>) -> Option<f64> {
    let valid = |row: usize| {
        let x = a.value_f64(row);
        let y = b.value_f64(row);
        let keep = !mask.map(|m| m[row]).unwrap_or(false) && !x.is_nan() && !y.is_nan();
        keep.then_some((x, y))
    };

    let mut count = 0usize;
    let (mut sum_x, mut sum_y) = (0.0, 0.0);
    for (x, y) in (0..a.len()).filter_map(&valid) {
        count += 1;
        sum_x += x;
        sum_y += y;
    }
    if count < 2 {
        return None;
    }
    let mean_x = sum_x / count as f64;
    let mean_y = sum_y / count as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in (0..a.len()).filter_map(&valid) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Identifies one correlation request: a dataset and an ordered feature list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub dataset: String,
    pub features: Vec<String>,
}

impl CorrelationKey {
    pub fn new(dataset: impl Into<String>, features: &[&str]) -> Self {
        Self {
            dataset: dataset.into(),
            features: features.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Bounded memo of computed matrices; the oldest entry goes first
pub struct CorrelationCache {
    entries: Mutex<CacheEntries>,
    capacity: usize,
}

#[derive(Default)]
struct CacheEntries {
    matrices: HashMap<CorrelationKey, Arc<CorrelationMatrix>>,
    order: VecDeque<CorrelationKey>,
}

impl CorrelationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(CacheEntries::default()),
            capacity,
        }
    }

    pub fn get(&self, key: &CorrelationKey) -> Option<Arc<CorrelationMatrix>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .matrices
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: CorrelationKey, matrix: Arc<CorrelationMatrix>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if entries.matrices.insert(key.clone(), matrix).is_none() {
            entries.order.push_back(key);
        }
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.matrices.remove(&oldest);
            }
        }
    }

    /// Drop every matrix computed for `dataset`
    pub fn evict_dataset(&self, dataset: &str) {
        let mut entries = self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.matrices.retain(|key, _| key.dataset != dataset);
        entries.order.retain(|key| key.dataset != dataset);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .matrices
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
