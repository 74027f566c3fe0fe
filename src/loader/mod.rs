pub mod columnar;
pub mod fetch;
pub mod json;
mod values;

pub use fetch::{ByteSource, MemorySource, UrlSource};

use crate::config::EngineConfig;
use crate::core::{ElementType, FeatureData, FeatureRecord, TextureLayout};
use crate::engine::JobName;
use crate::error::{ErrorKind, PipelineError, Result};
use bytes::Bytes;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Container formats the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFormat {
    Json,
    Parquet,
}

impl ContainerFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ContainerFormat::Json => "JSON",
            ContainerFormat::Parquet => "Parquet",
        }
    }

    /// Format implied by the URL's path extension, ignoring query and fragment
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (_, extension) = file_name.rsplit_once('.')?;

        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(ContainerFormat::Json),
            "parquet" | "pq" => Some(ContainerFormat::Parquet),
            _ => None,
        }
    }
}

/// Decoder output before min/max and layout are settled
pub(crate) struct DecodedFeature {
    pub data: FeatureData,
    pub unit: Option<String>,
    pub categories: Option<Vec<String>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Fetches feature files and decodes them into typed records
pub struct FormatLoader {
    source: Arc<dyn ByteSource>,
    max_texture_width: usize,
}

impl FormatLoader {
    pub fn new(source: Arc<dyn ByteSource>, max_texture_width: usize) -> Self {
        Self {
            source,
            max_texture_width,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let source = UrlSource::new(Duration::from_millis(config.fetch_timeout_ms))
            .with_max_bytes(config.max_fetch_bytes);
        Self::new(Arc::new(source), config.max_texture_width)
    }

    /// Fetch and decode on a blocking thread, leaving the caller's task free
    pub async fn load(self: &Arc<Self>, url: &str, element_type: ElementType) -> Result<FeatureRecord> {
        let loader = Arc::clone(self);
        let url = url.to_string();
        tokio::task::spawn_blocking(move || loader.load_blocking(&url, element_type))
            .await
            .map_err(|e| PipelineError::JobPanicked {
                job: JobName::LoadUrl,
                message: e.to_string(),
            })?
    }

    pub fn load_blocking(&self, url: &str, element_type: ElementType) -> Result<FeatureRecord> {
        let bytes = self.source.fetch(url)?;
        debug!("fetched {} bytes from {}", bytes.len(), url);
        self.decode(url, bytes, element_type)
    }

    /// Decode already-fetched bytes, choosing the container by extension and
    /// probing JSON then Parquet when the extension says nothing
    pub fn decode(&self, url: &str, bytes: Bytes, element_type: ElementType) -> Result<FeatureRecord> {
        let decoded = match ContainerFormat::from_url(url) {
            Some(ContainerFormat::Json) => json::decode(url, &bytes, element_type)?,
            Some(ContainerFormat::Parquet) => columnar::decode(url, bytes, element_type)?,
            None => decode_any(url, bytes, element_type)?,
        };
        finish_record(url, decoded, self.max_texture_width)
    }
}

fn decode_any(url: &str, bytes: Bytes, element_type: ElementType) -> Result<DecodedFeature> {
    let json_error = match json::decode(url, &bytes, element_type) {
        Ok(decoded) => return Ok(decoded),
        Err(e) if e.kind() != ErrorKind::Parse => return Err(e),
        Err(e) => e,
    };
    debug!("{} is not JSON, trying Parquet", url);

    match columnar::decode(url, bytes, element_type) {
        Ok(decoded) => Ok(decoded),
        Err(e) if e.kind() != ErrorKind::Parse => Err(e),
        Err(parquet_error) => Err(PipelineError::Parse {
            url: url.to_string(),
            attempted: vec![ContainerFormat::Json, ContainerFormat::Parquet],
            message: format!("{}; {}", json_error, parquet_error),
        }),
    }
}

fn finish_record(url: &str, decoded: DecodedFeature, max_texture_width: usize) -> Result<FeatureRecord> {
    let DecodedFeature {
        data,
        unit,
        categories,
        min,
        max,
    } = decoded;

    if let Some(categories) = &categories {
        check_category_indices(url, &data, categories.len())?;
    }

    let (min, max) = match (min, max) {
        (Some(min), Some(max)) => (min, max),
        (min, max) => {
            let (scanned_min, scanned_max) = data.min_max();
            (min.unwrap_or(scanned_min), max.unwrap_or(scanned_max))
        }
    };

    let texture = TextureLayout::for_len(data.len(), max_texture_width);
    debug!(
        "{}: {} values packed into {} texels ({}x{})",
        url,
        data.len(),
        texture.texel_count(),
        texture.width,
        texture.height
    );

    Ok(FeatureRecord {
        texture,
        data,
        unit,
        categories,
        min,
        max,
    })
}

fn check_category_indices(url: &str, data: &FeatureData, count: usize) -> Result<()> {
    for i in 0..data.len() {
        let value = data.value_f64(i);
        if value.is_nan() {
            continue;
        }
        if value < 0.0 || value.fract() != 0.0 || value >= count as f64 {
            return Err(PipelineError::data(
                url,
                format!(
                    "value {} at index {} is not a valid index into {} categories",
                    value, i, count
                ),
            ));
        }
    }
    Ok(())
}
