use crate::compute::{build_tracks, CorrelationCache, CorrelationKey, CorrelationMatrix, Positions};
use crate::core::{ElementType, FeatureData, FeatureRecord, TrackMap};
use crate::engine::{ComputeChannel, Job};
use crate::error::{PipelineError, Result};
use futures::future::try_join_all;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// A named per-object feature and where to fetch it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSource {
    pub key: String,
    pub url: String,
    #[serde(default)]
    pub element_type: ElementType,
}

/// Already-resolved URLs of a dataset's object tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSources {
    pub tracks: Option<String>,
    pub times: Option<String>,
    /// Interleaved x, y per object
    pub centroids: Option<String>,
    /// Bounding box per object as x min, y min, x max, y max
    pub bounds: Option<String>,
    pub outliers: Option<String>,
    pub features: Vec<FeatureSource>,
}

/// Object tables and feature cache of one loaded dataset.
///
/// Everything is immutable once loaded; replacing the dataset drops its
/// records and tracks with it.
pub struct Dataset {
    name: String,
    num_objects: usize,
    track_ids: Option<Arc<Vec<u32>>>,
    times: Option<Arc<Vec<u32>>>,
    centroids: Option<Arc<Vec<f32>>>,
    bounds: Option<Arc<Vec<f32>>>,
    outliers: Option<Arc<Vec<bool>>>,
    features: HashMap<String, Arc<FeatureRecord>>,
    tracks: OnceLock<Option<Arc<TrackMap>>>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, num_objects: usize) -> Self {
        Self {
            name: name.into(),
            num_objects,
            track_ids: None,
            times: None,
            centroids: None,
            bounds: None,
            outliers: None,
            features: HashMap::new(),
            tracks: OnceLock::new(),
        }
    }

    pub fn with_track_ids(mut self, track_ids: impl Into<Arc<Vec<u32>>>) -> Result<Self> {
        let track_ids = track_ids.into();
        self.check_len("track ids", track_ids.len(), self.num_objects)?;
        self.track_ids = Some(track_ids);
        self.tracks = OnceLock::new();
        Ok(self)
    }

    pub fn with_times(mut self, times: impl Into<Arc<Vec<u32>>>) -> Result<Self> {
        let times = times.into();
        self.check_len("times", times.len(), self.num_objects)?;
        self.times = Some(times);
        self.tracks = OnceLock::new();
        Ok(self)
    }

    pub fn with_centroids(mut self, centroids: impl Into<Arc<Vec<f32>>>) -> Result<Self> {
        let centroids = centroids.into();
        self.check_len("centroids", centroids.len(), 2 * self.num_objects)?;
        self.centroids = Some(centroids);
        self.tracks = OnceLock::new();
        Ok(self)
    }

    pub fn with_bounds(mut self, bounds: impl Into<Arc<Vec<f32>>>) -> Result<Self> {
        let bounds = bounds.into();
        self.check_len("bounds", bounds.len(), 4 * self.num_objects)?;
        self.bounds = Some(bounds);
        Ok(self)
    }

    pub fn with_outliers(mut self, outliers: Vec<bool>) -> Result<Self> {
        self.check_len("outliers", outliers.len(), self.num_objects)?;
        self.outliers = Some(Arc::new(outliers));
        Ok(self)
    }

    pub fn with_feature(mut self, key: impl Into<String>, record: FeatureRecord) -> Result<Self> {
        let key = key.into();
        self.check_len(&key, record.len(), self.num_objects)?;
        self.features.insert(key, Arc::new(record));
        Ok(self)
    }

    fn check_len(&self, table: &str, len: usize, expected: usize) -> Result<()> {
        if len == expected {
            Ok(())
        } else {
            Err(PipelineError::data(
                format!("dataset {}", self.name),
                format!("{} has {} values, expected {}", table, len, expected),
            ))
        }
    }

    /// Fetch every table through `channel`, all loads in flight at once
    pub async fn load(name: impl Into<String>, sources: &DatasetSources, channel: &ComputeChannel) -> Result<Self> {
        let name = name.into();
        let table = move |url: &Option<String>, element_type: ElementType| {
            let url = url.clone();
            async move {
                match url {
                    Some(url) => channel.load_url(&url, element_type).await.map(Some),
                    None => Ok(None),
                }
            }
        };

        let tables = futures::future::try_join5(
            table(&sources.tracks, ElementType::U32),
            table(&sources.times, ElementType::U32),
            table(&sources.centroids, ElementType::F32),
            table(&sources.bounds, ElementType::F32),
            table(&sources.outliers, ElementType::U8),
        );
        let features = try_join_all(
            sources
                .features
                .iter()
                .map(|source| channel.load_url(&source.url, source.element_type)),
        );
        let ((tracks, times, centroids, bounds, outliers), features) = futures::future::try_join(tables, features).await?;

        let num_objects = tracks
            .as_ref()
            .or(times.as_ref())
            .or(outliers.as_ref())
            .or(features.first())
            .map(|record| record.len())
            .or_else(|| centroids.as_ref().map(|c| c.len() / 2))
            .or_else(|| bounds.as_ref().map(|b| b.len() / 4))
            .unwrap_or(0);

        let mut dataset = Dataset::new(name.clone(), num_objects);
        if let Some(record) = tracks {
            dataset = dataset.with_track_ids(take_u32(&name, "tracks", record)?)?;
        }
        if let Some(record) = times {
            dataset = dataset.with_times(take_u32(&name, "times", record)?)?;
        }
        if let Some(record) = centroids {
            dataset = dataset.with_centroids(take_f32(&name, "centroids", record)?)?;
        }
        if let Some(record) = bounds {
            dataset = dataset.with_bounds(take_f32(&name, "bounds", record)?)?;
        }
        if let Some(record) = outliers {
            let flags = record
                .data
                .as_u8()
                .map(|v| v.iter().map(|&flag| flag != 0).collect())
                .unwrap_or_default();
            dataset = dataset.with_outliers(flags)?;
        }
        for (source, record) in sources.features.iter().zip(features) {
            dataset = dataset.with_feature(source.key.clone(), record)?;
        }

        info!(
            "loaded dataset {} with {} objects and {} features",
            dataset.name,
            dataset.num_objects,
            dataset.features.len()
        );
        Ok(dataset)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_objects(&self) -> usize {
        self.num_objects
    }

    pub fn feature(&self, key: &str) -> Option<Arc<FeatureRecord>> {
        self.features.get(key).cloned()
    }

    pub fn feature_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.features.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    pub fn centroids(&self) -> Option<&[f32]> {
        self.centroids.as_deref().map(Vec::as_slice)
    }

    /// Flat bounding boxes, four values per object
    pub fn bounds(&self) -> Option<&[f32]> {
        self.bounds.as_deref().map(Vec::as_slice)
    }

    /// `[x_min, y_min, x_max, y_max]` of object `index`
    pub fn bounds_of(&self, index: usize) -> Option<[f32; 4]> {
        let bounds = self.bounds.as_ref()?;
        let start = index.checked_mul(4)?;
        let b = bounds.get(start..start.checked_add(4)?)?;
        Some([b[0], b[1], b[2], b[3]])
    }

    pub fn outliers(&self) -> Option<&[bool]> {
        self.outliers.as_deref().map(Vec::as_slice)
    }

    /// Tracks rebuilt from the object tables on first use; `None` without
    /// track ids and times
    pub fn tracks(&self) -> Option<Arc<TrackMap>> {
        self.tracks
            .get_or_init(|| {
                let track_ids = self.track_ids.as_ref()?;
                let times = self.times.as_ref()?;
                let centroids = self.centroids.as_deref().map(|c| Positions::planar(c));
                Some(Arc::new(build_tracks(track_ids, times, centroids)))
            })
            .clone()
    }

    /// Motion-delta job over this dataset, excluding outliers and anything
    /// `filter` marks. `None` when positional data is missing.
    pub fn motion_deltas_job(&self, window_frames: u32, filter: Option<&[bool]>) -> Result<Option<Job>> {
        if self.centroids.is_none() {
            return Ok(None);
        }
        let Some(tracks) = self.tracks() else {
            return Ok(None);
        };
        let mask = self.exclusion_mask(filter)?;

        Ok(Some(Job::GetMotionDeltas {
            tracks,
            num_objects: self.num_objects,
            window_frames,
            mask,
        }))
    }

    /// Motion deltas computed on `channel`; `None` when positional data is
    /// missing
    pub async fn motion_deltas(
        &self,
        window_frames: u32,
        filter: Option<&[bool]>,
        channel: &ComputeChannel,
    ) -> Result<Option<Vec<f32>>> {
        let Some(Job::GetMotionDeltas {
            tracks,
            num_objects,
            window_frames,
            mask,
        }) = self.motion_deltas_job(window_frames, filter)?
        else {
            return Ok(None);
        };
        channel
            .get_motion_deltas(tracks, num_objects, window_frames, mask)
            .await
    }

    /// Correlation job over `keys`; `None` when any key is absent
    pub fn correlation_job(&self, keys: &[&str], filter: Option<&[bool]>) -> Result<Option<Job>> {
        let features: Option<Vec<FeatureData>> = keys
            .iter()
            .map(|key| self.features.get(*key).map(|record| record.data.clone()))
            .collect();
        let Some(features) = features else {
            return Ok(None);
        };

        Ok(Some(Job::GetCorrelations {
            features,
            mask: self.exclusion_mask(filter)?,
        }))
    }

    /// Correlations over the outlier-free rows, memoized in `cache`
    pub async fn correlations(
        &self,
        keys: &[&str],
        channel: &ComputeChannel,
        cache: &CorrelationCache,
    ) -> Result<Option<Arc<CorrelationMatrix>>> {
        let cache_key = CorrelationKey::new(self.name.clone(), keys);
        if let Some(matrix) = cache.get(&cache_key) {
            return Ok(Some(matrix));
        }
        let Some(Job::GetCorrelations { features, mask }) = self.correlation_job(keys, None)? else {
            return Ok(None);
        };

        let matrix = Arc::new(channel.get_correlations(features, mask).await?);
        cache.insert(cache_key, Arc::clone(&matrix));
        Ok(Some(matrix))
    }

    fn exclusion_mask(&self, filter: Option<&[bool]>) -> Result<Option<Arc<Vec<bool>>>> {
        if let Some(filter) = filter {
            self.check_len("filter mask", filter.len(), self.num_objects)?;
        }
        Ok(match (self.outliers.as_ref(), filter) {
            (None, None) => None,
            (Some(outliers), None) => Some(Arc::clone(outliers)),
            (None, Some(filter)) => Some(Arc::new(filter.to_vec())),
            (Some(outliers), Some(filter)) => Some(Arc::new(
                outliers.iter().zip(filter).map(|(&a, &b)| a || b).collect(),
            )),
        })
    }
}

fn take_u32(dataset: &str, table: &str, record: FeatureRecord) -> Result<Arc<Vec<u32>>> {
    match record.data {
        FeatureData::U32(values) => Ok(values),
        other => Err(PipelineError::data(
            format!("dataset {}", dataset),
            format!("{} loaded as {}, expected u32", table, other.element_type().name()),
        )),
    }
}

fn take_f32(dataset: &str, table: &str, record: FeatureRecord) -> Result<Arc<Vec<f32>>> {
    match record.data {
        FeatureData::F32(values) => Ok(values),
        other => Err(PipelineError::data(
            format!("dataset {}", dataset),
            format!("{} loaded as {}, expected f32", table, other.element_type().name()),
        )),
    }
}
