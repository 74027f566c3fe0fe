use colorizer_engine::compute::{build_tracks, build_tracks_with_ids, Positions};

#[test]
fn test_rebuild_sorts_samples_by_time() {
    let tracks = build_tracks_with_ids(&[10, 11, 12], &[5, 5, 5], &[3, 1, 2], None);

    assert_eq!(tracks.len(), 1);
    let track = &tracks[&5];
    assert_eq!(track.track_id, 5);
    assert_eq!(track.times, vec![1, 2, 3]);
    assert_eq!(track.object_ids, vec![11, 12, 10]);
    assert!(!track.has_centroids());
}

#[test]
fn test_centroids_follow_the_time_permutation() {
    let centroids = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
    let tracks = build_tracks_with_ids(
        &[10, 11, 12],
        &[5, 5, 5],
        &[3, 1, 2],
        Some(Positions::planar(&centroids)),
    );

    let track = &tracks[&5];
    assert_eq!(track.dims, 2);
    assert_eq!(
        track.centroids.as_deref(),
        Some(&[1.0, 1.5, 2.0, 2.5, 0.0, 0.5][..])
    );
    // Every sample still points at its own object's position
    for (k, &id) in track.object_ids.iter().enumerate() {
        let object = (id - 10) as usize;
        assert_eq!(track.centroid(k), Some(&centroids[2 * object..2 * object + 2]));
    }
}

#[test]
fn test_object_index_is_the_default_id() {
    let tracks = build_tracks(&[0, 1, 0, 1], &[0, 0, 1, 1], None);

    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[&0].object_ids, vec![0, 2]);
    assert_eq!(tracks[&1].object_ids, vec![1, 3]);
}

#[test]
fn test_equal_times_keep_input_order() {
    let tracks = build_tracks(&[4, 4, 4, 4], &[2, 1, 2, 1], None);

    let track = &tracks[&4];
    assert_eq!(track.times, vec![1, 1, 2, 2]);
    assert_eq!(track.object_ids, vec![1, 3, 0, 2]);
}

#[test]
fn test_every_track_is_time_sorted() {
    let track_ids: Vec<u32> = (0..60).map(|i| i % 7).collect();
    let times: Vec<u32> = (0..60).map(|i| (i * 37 % 19) as u32).collect();
    let tracks = build_tracks(&track_ids, &times, None);

    let total: usize = tracks.values().map(|t| t.len()).sum();
    assert_eq!(total, 60);
    for track in tracks.values() {
        assert!(track.times.windows(2).all(|w| w[0] <= w[1]));
        for (&time, &id) in track.times.iter().zip(&track.object_ids) {
            assert_eq!(times[id as usize], time);
            assert_eq!(track_ids[id as usize], track.track_id);
        }
    }
}

#[test]
fn test_short_centroid_table_is_ignored() {
    let tracks = build_tracks(&[1, 1], &[0, 1], Some(Positions::planar(&[0.0, 0.0, 1.0])));
    assert!(!tracks[&1].has_centroids());
}

#[test]
fn test_mismatched_lengths_use_common_prefix() {
    let tracks = build_tracks(&[1, 1, 2], &[0, 1], None);
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[&1].len(), 2);
}

#[test]
fn test_empty_tables_give_no_tracks() {
    assert!(build_tracks(&[], &[], None).is_empty());
}
