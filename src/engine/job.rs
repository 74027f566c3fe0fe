use crate::compute::CorrelationMatrix;
use crate::core::{ElementType, FeatureData, FeatureRecord, TrackMap};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Job kinds the compute channel accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobName {
    LoadUrl,
    GetCorrelations,
    GetMotionDeltas,
}

impl JobName {
    pub const ALL: [JobName; 3] = [JobName::LoadUrl, JobName::GetCorrelations, JobName::GetMotionDeltas];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::LoadUrl => "load-url",
            JobName::GetCorrelations => "get-correlations",
            JobName::GetMotionDeltas => "get-motion-deltas",
        }
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dispatched unit of work with its arguments.
///
/// Buffers are passed as shared `Arc`s, so dispatching never copies
/// feature data.
#[derive(Debug, Clone)]
pub enum Job {
    LoadUrl {
        url: String,
        element_type: ElementType,
    },
    GetCorrelations {
        features: Vec<FeatureData>,
        mask: Option<Arc<Vec<bool>>>,
    },
    GetMotionDeltas {
        tracks: Arc<TrackMap>,
        num_objects: usize,
        window_frames: u32,
        mask: Option<Arc<Vec<bool>>>,
    },
}

impl Job {
    pub fn name(&self) -> JobName {
        match self {
            Job::LoadUrl { .. } => JobName::LoadUrl,
            Job::GetCorrelations { .. } => JobName::GetCorrelations,
            Job::GetMotionDeltas { .. } => JobName::GetMotionDeltas,
        }
    }
}

/// Result payload, moved back to the caller
#[derive(Debug)]
pub enum JobOutput {
    Feature(FeatureRecord),
    Correlations(CorrelationMatrix),
    /// `None` when the tracks carry no positions
    MotionDeltas(Option<Vec<f32>>),
}

impl JobOutput {
    pub fn name(&self) -> JobName {
        match self {
            JobOutput::Feature(_) => JobName::LoadUrl,
            JobOutput::Correlations(_) => JobName::GetCorrelations,
            JobOutput::MotionDeltas(_) => JobName::GetMotionDeltas,
        }
    }
}
