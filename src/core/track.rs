use std::collections::BTreeMap;

/// Tracks of one dataset keyed by track id
pub type TrackMap = BTreeMap<u32, Track>;

/// Ordered appearances of one tracked object across frames.
///
/// `times`, `object_ids` and `centroids` are index-aligned and sorted by
/// time; samples sharing a time keep their input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: u32,
    pub times: Vec<u32>,
    pub object_ids: Vec<u32>,
    /// Flat `dims` components per sample
    pub centroids: Option<Vec<f32>>,
    pub dims: usize,
}

impl Track {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn start_time(&self) -> Option<u32> {
        self.times.first().copied()
    }

    pub fn end_time(&self) -> Option<u32> {
        self.times.last().copied()
    }

    pub fn has_centroids(&self) -> bool {
        self.centroids.is_some()
    }

    /// Object id shown by this track at frame `t`.
    ///
    /// A one-sample track matches only its own time and nothing else.
    /// Otherwise this is the
    /// id of the first sample whose time is strictly greater than `t`.
    pub fn get_id_at_time(&self, t: u32) -> Option<u32> {
        if self.times.len() == 1 {
            return (self.times[0] == t).then(|| self.object_ids[0]);
        }

        let index = self.times.partition_point(|&time| time <= t);
        self.object_ids.get(index).copied()
    }

    /// Index of the first sample at exactly frame `t`
    pub fn first_index_at_time(&self, t: u32) -> Option<usize> {
        let index = self.times.partition_point(|&time| time < t);
        match self.times.get(index) {
            Some(&time) if time == t => Some(index),
            _ => None,
        }
    }

    pub fn centroid(&self, index: usize) -> Option<&[f32]> {
        let centroids = self.centroids.as_ref()?;
        let start = index * self.dims;
        centroids.get(start..start + self.dims)
    }

    pub fn position_at_time(&self, t: u32) -> Option<&[f32]> {
        self.first_index_at_time(t).and_then(|i| self.centroid(i))
    }
}
