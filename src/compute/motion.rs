use crate::core::{Track, TrackMap};
use crate::error::{PipelineError, Result};

/// Per-object averaged displacement over a trailing window of frames.
///
/// Returns a buffer of `2 * num_objects` values with object `i` at `2i` and
/// `2i + 1`. Slots stay NaN when the track has no sample exactly
/// `window_frames` earlier, or when either endpoint is excluded by `mask`.
/// `Ok(None)` means the tracks carry no positions to measure.
pub fn compute_motion_deltas(
    tracks: &TrackMap,
    num_objects: usize,
    window_frames: u32,
    mask: Option<&[bool]>,
) -> Result<Option<Vec<f32>>> {
    if window_frames == 0 {
        return Err(PipelineError::data(
            "motion deltas",
            "window length must be at least one frame",
        ));
    }
    if let Some(mask) = mask {
        if mask.len() != num_objects {
            return Err(PipelineError::data(
                "motion deltas",
                format!("exclusion mask has {} entries for {} objects", mask.len(), num_objects),
            ));
        }
    }
    if tracks.is_empty() || tracks.values().any(|t| !t.has_centroids() || t.dims < 2) {
        return Ok(None);
    }

    let mut deltas = vec![f32::NAN; 2 * num_objects];
    let excluded = |id: u32| mask.map(|m| m[id as usize]).unwrap_or(false);

    for track in tracks.values() {
        write_track_deltas(track, num_objects, window_frames, &excluded, &mut deltas);
    }

    Ok(Some(deltas))
}

fn write_track_deltas(
    track: &Track,
    num_objects: usize,
    window_frames: u32,
    excluded: &dyn Fn(u32) -> bool,
    deltas: &mut [f32],
) {
    let scale = 1.0 / window_frames as f32;

    for (k, (&time, &object_id)) in track.times.iter().zip(&track.object_ids).enumerate() {
        let Some(earlier_time) = time.checked_sub(window_frames) else {
            continue;
        };
        let Some(earlier) = track.first_index_at_time(earlier_time) else {
            continue;
        };
        let earlier_id = track.object_ids[earlier];
        if object_id as usize >= num_objects || earlier_id as usize >= num_objects {
            continue;
        }
        if excluded(object_id) || excluded(earlier_id) {
            continue;
        }

        let (Some(current), Some(previous)) = (track.centroid(k), track.centroid(earlier)) else {
            continue;
        };
        let slot = 2 * object_id as usize;
        deltas[slot] = (current[0] - previous[0]) * scale;
        deltas[slot + 1] = (current[1] - previous[1]) * scale;
    }
}
