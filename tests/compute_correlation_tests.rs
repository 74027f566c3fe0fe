use colorizer_engine::compute::{compute_correlations, CorrelationCache, CorrelationKey};
use colorizer_engine::core::FeatureData;
use colorizer_engine::error::ErrorKind;
use std::sync::Arc;

fn f32s(values: Vec<f32>) -> FeatureData {
    FeatureData::F32(Arc::new(values))
}

#[test]
fn test_constant_features_are_nan_everywhere() {
    let a = f32s(vec![3.0; 100]);
    let b = f32s(vec![-1.0; 100]);
    let matrix = compute_correlations(&[&a, &b], None).unwrap();

    assert_eq!(matrix.size(), 2);
    assert!(matrix.get(0, 0).is_nan());
    assert!(matrix.get(1, 1).is_nan());
    assert!(matrix.get(0, 1).is_nan());
    assert!(matrix.get(1, 0).is_nan());
}

#[test]
fn test_matrix_is_symmetric_with_unit_diagonal() {
    let a = f32s((0..50).map(|i| i as f32).collect());
    let b = f32s((0..50).map(|i| ((i * 13) % 7) as f32).collect());
    let c = FeatureData::U8(Arc::new((0..50).map(|i| (50 - i) as u8).collect()));
    let matrix = compute_correlations(&[&a, &b, &c], None).unwrap();

    for i in 0..3 {
        assert_eq!(matrix.get(i, i), 1.0);
        for j in 0..3 {
            assert_eq!(matrix.get(i, j), matrix.get(j, i));
            assert!(matrix.get(i, j).abs() <= 1.0);
        }
    }
    assert!((matrix.get(0, 2) + 1.0).abs() < 1e-12);
}

#[test]
fn test_perfect_linear_relation() {
    let a = f32s(vec![1.0, 2.0, 3.0, 4.0]);
    let b = f32s(vec![10.0, 20.0, 30.0, 40.0]);
    let matrix = compute_correlations(&[&a, &b], None).unwrap();
    assert!((matrix.get(0, 1) - 1.0).abs() < 1e-12);
}

#[test]
fn test_missing_values_drop_only_their_pair() {
    // Row 2 is missing in `b`; `a` and `c` still use it
    let a = f32s(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let b = f32s(vec![2.0, 4.0, f32::NAN, 8.0, 10.0]);
    let c = f32s(vec![5.0, 4.0, 100.0, 2.0, 1.0]);
    let matrix = compute_correlations(&[&a, &b, &c], None).unwrap();

    assert!((matrix.get(0, 1) - 1.0).abs() < 1e-12);
    // With row 2, a and c are far from a straight line
    assert!(matrix.get(0, 2) > -0.9);
}

#[test]
fn test_mask_removes_rows() {
    let a = f32s(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    let c = f32s(vec![5.0, 4.0, 100.0, 2.0, 1.0]);
    let mask = [false, false, true, false, false];
    let matrix = compute_correlations(&[&a, &c], Some(&mask[..])).unwrap();

    assert!((matrix.get(0, 1) + 1.0).abs() < 1e-12);
}

#[test]
fn test_too_few_rows_is_nan() {
    let a = f32s(vec![1.0]);
    let b = f32s(vec![2.0]);
    let matrix = compute_correlations(&[&a, &b], None).unwrap();
    assert!(matrix.get(0, 0).is_nan());
    assert!(matrix.get(0, 1).is_nan());
}

#[test]
fn test_length_mismatch_is_rejected() {
    let a = f32s(vec![1.0, 2.0, 3.0]);
    let b = f32s(vec![1.0, 2.0]);
    let err = compute_correlations(&[&a, &b], None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataShape);
}

#[test]
fn test_no_features_gives_empty_matrix() {
    let matrix = compute_correlations(&[], None).unwrap();
    assert_eq!(matrix.size(), 0);
    assert!(matrix.to_rows().is_empty());
}

#[test]
fn test_cache_evicts_oldest_first() {
    let a = f32s(vec![1.0, 2.0, 3.0]);
    let matrix = Arc::new(compute_correlations(&[&a], None).unwrap());
    let cache = CorrelationCache::new(2);

    let first = CorrelationKey::new("cells", &["area"]);
    let second = CorrelationKey::new("cells", &["area", "speed"]);
    let third = CorrelationKey::new("nuclei", &["area"]);
    cache.insert(first.clone(), Arc::clone(&matrix));
    cache.insert(second.clone(), Arc::clone(&matrix));
    cache.insert(third.clone(), Arc::clone(&matrix));

    assert_eq!(cache.len(), 2);
    assert!(cache.get(&first).is_none());
    assert!(cache.get(&second).is_some());
    assert!(cache.get(&third).is_some());
}

#[test]
fn test_cache_key_respects_feature_order() {
    let a = f32s(vec![1.0, 2.0, 3.0]);
    let cache = CorrelationCache::new(4);
    cache.insert(
        CorrelationKey::new("cells", &["area", "speed"]),
        Arc::new(compute_correlations(&[&a], None).unwrap()),
    );
    assert!(cache.get(&CorrelationKey::new("cells", &["speed", "area"])).is_none());
}

#[test]
fn test_cache_evicts_a_whole_dataset() {
    let a = f32s(vec![1.0, 2.0, 3.0]);
    let matrix = Arc::new(compute_correlations(&[&a], None).unwrap());
    let cache = CorrelationCache::new(8);
    cache.insert(CorrelationKey::new("cells", &["area"]), Arc::clone(&matrix));
    cache.insert(CorrelationKey::new("cells", &["speed"]), Arc::clone(&matrix));
    cache.insert(CorrelationKey::new("nuclei", &["area"]), matrix);

    cache.evict_dataset("cells");
    assert_eq!(cache.len(), 1);
}
