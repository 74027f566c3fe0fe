use anyhow::Context;
use colorizer_engine::compute::CorrelationCache;
use colorizer_engine::loader::MemorySource;
use colorizer_engine::observability::ChannelMonitor;
use colorizer_engine::{
    ComputeChannel, Dataset, DatasetSources, EngineConfig, FeatureSource, FormatLoader,
    RequestArbiter, RequestKey, SlotOutcome,
};
use log::info;
use serde_json::json;
use std::sync::Arc;

const OBJECTS_PER_FRAME: usize = 4;
const FRAMES: usize = 12;

/// Writes a small synthetic dataset into `source` and returns its sources
fn synthetic_dataset(source: &MemorySource) -> DatasetSources {
    let num_objects = OBJECTS_PER_FRAME * FRAMES;
    let mut tracks = Vec::with_capacity(num_objects);
    let mut times = Vec::with_capacity(num_objects);
    let mut centroids = Vec::with_capacity(2 * num_objects);
    let mut bounds = Vec::with_capacity(4 * num_objects);
    let mut area = Vec::with_capacity(num_objects);
    let mut speed = Vec::with_capacity(num_objects);

    for frame in 0..FRAMES {
        for track in 0..OBJECTS_PER_FRAME {
            let t = frame as f32;
            tracks.push(track as u32);
            times.push(frame as u32);
            let (x, y) = (10.0 * track as f32 + t * (track + 1) as f32, 5.0 * track as f32 + 0.5 * t);
            centroids.extend([x, y]);
            bounds.extend([x - 2.0, y - 2.0, x + 2.0, y + 2.0]);
            area.push(100.0 + 3.0 * t + track as f32);
            speed.push((track + 1) as f32);
        }
    }

    source.insert("tracks.json", json!({ "data": tracks }).to_string());
    source.insert("times.json", json!({ "data": times }).to_string());
    source.insert("centroids.json", json!({ "data": centroids }).to_string());
    source.insert("bounds.json", json!({ "data": bounds }).to_string());
    source.insert("area.json", json!({ "data": area, "units": "px²" }).to_string());
    source.insert("speed.json", json!({ "data": speed, "units": "px/frame" }).to_string());

    DatasetSources {
        tracks: Some("tracks.json".to_string()),
        times: Some("times.json".to_string()),
        centroids: Some("centroids.json".to_string()),
        bounds: Some("bounds.json".to_string()),
        outliers: None,
        features: vec![
            FeatureSource {
                key: "area".to_string(),
                url: "area.json".to_string(),
                element_type: Default::default(),
            },
            FeatureSource {
                key: "speed".to_string(),
                url: "speed.json".to_string(),
                element_type: Default::default(),
            },
        ],
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };
    info!("engine config: {:?}", config);

    let source = Arc::new(MemorySource::new());
    let sources = synthetic_dataset(&source);
    let loader = Arc::new(FormatLoader::new(source, config.max_texture_width));
    let channel = ComputeChannel::new(&config, loader)?;

    let dataset = Arc::new(
        Dataset::load("synthetic", &sources, &channel)
            .await
            .context("Failed to load synthetic dataset")?,
    );

    // Two overlapping requests for the same slot; the first is superseded
    // before it finishes
    let deltas: RequestArbiter<RequestKey, Option<Vec<f32>>> = RequestArbiter::new();
    let observer = deltas.subscribe();
    let request = |window: u32| {
        let window = Arc::new(window);
        let key = RequestKey::of(&dataset, &window);
        let deltas = &deltas;
        let channel = &channel;
        let dataset = &dataset;
        async move {
            let outcome = deltas
                .run(key, || dataset.motion_deltas(*window, None, channel))
                .await;
            (*window, outcome)
        }
    };
    let (first, second) = futures::join!(request(config.motion_window_frames), request(2));

    for (window, outcome) in [first, second] {
        match outcome {
            SlotOutcome::Delivered(result) => {
                let computed = result
                    .as_deref()
                    .map_or(0, |d| d.iter().filter(|v| !v.is_nan()).count());
                info!("window {}: {} objects have a motion delta", window, computed);
            }
            SlotOutcome::Failed(e) => info!("window {}: motion deltas failed: {}", window, e),
            SlotOutcome::Discarded => info!("window {}: superseded", window),
        }
    }
    info!(
        "observers saw {} result(s), {} discarded",
        deltas.delivered_count(),
        deltas.discarded_count()
    );
    if let Some(latest) = observer.borrow().as_ref() {
        info!("latest delivered deltas cover {} objects", latest.as_deref().map_or(0, <[f32]>::len));
    }

    let cache = CorrelationCache::new(config.correlation_cache_capacity);
    if let Some(matrix) = dataset.correlations(&["area", "speed"], &channel, &cache).await? {
        for (key, row) in ["area", "speed"].iter().zip(matrix.to_rows()) {
            info!("{:>6}: {:?}", key, row);
        }
    }

    ChannelMonitor::new(channel.metrics().clone()).log_report();
    channel.terminate();
    Ok(())
}
