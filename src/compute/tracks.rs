use crate::core::{Track, TrackMap};
use log::warn;
use std::collections::BTreeMap;

/// Flat per-object position table, `dims` components per object
#[derive(Debug, Clone, Copy)]
pub struct Positions<'a> {
    pub values: &'a [f32],
    pub dims: usize,
}

impl<'a> Positions<'a> {
    pub fn new(values: &'a [f32], dims: usize) -> Self {
        Self { values, dims }
    }

    /// Interleaved x, y pairs
    pub fn planar(values: &'a [f32]) -> Self {
        Self::new(values, 2)
    }

    fn covers(&self, num_objects: usize) -> bool {
        self.dims > 0 && self.values.len() >= num_objects * self.dims
    }
}

/// Group objects into tracks, using each object's index as its id
pub fn build_tracks(track_ids: &[u32], times: &[u32], centroids: Option<Positions<'_>>) -> TrackMap {
    let object_ids: Vec<u32> = (0..track_ids.len() as u32).collect();
    build_tracks_with_ids(&object_ids, track_ids, times, centroids)
}

pub fn build_tracks_with_ids(
    object_ids: &[u32],
    track_ids: &[u32],
    times: &[u32],
    centroids: Option<Positions<'_>>,
) -> TrackMap {
    let num_objects = object_ids.len().min(track_ids.len()).min(times.len());
    if num_objects != track_ids.len() || num_objects != times.len() || num_objects != object_ids.len() {
        warn!(
            "object tables disagree in length (ids {}, tracks {}, times {}); using the first {}",
            object_ids.len(),
            track_ids.len(),
            times.len(),
            num_objects
        );
    }

    let centroids = centroids.filter(|c| {
        let covered = c.covers(num_objects);
        if !covered {
            warn!(
                "centroid table holds {} values, {} needed; building tracks without positions",
                c.values.len(),
                num_objects * c.dims
            );
        }
        covered
    });

    // Object indices per track, in input order
    let mut members: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (object, &track_id) in track_ids.iter().take(num_objects).enumerate() {
        members.entry(track_id).or_default().push(object);
    }

    members
        .into_iter()
        .map(|(track_id, mut order)| {
            // Stable, so equal times keep input order. The same permutation
            // feeds every parallel column below.
            order.sort_by_key(|&object| times[object]);

            let track = Track {
                track_id,
                times: order.iter().map(|&o| times[o]).collect(),
                object_ids: order.iter().map(|&o| object_ids[o]).collect(),
                centroids: centroids.map(|c| {
                    order
                        .iter()
                        .flat_map(|&o| c.values[o * c.dims..(o + 1) * c.dims].iter().copied())
                        .collect()
                }),
                dims: centroids.map(|c| c.dims).unwrap_or(0),
            };
            (track_id, track)
        })
        .collect()
}
