pub mod correlation;
pub mod motion;
pub mod tracks;

pub use correlation::{compute_correlations, CorrelationCache, CorrelationKey, CorrelationMatrix};
pub use motion::compute_motion_deltas;
pub use tracks::{build_tracks, build_tracks_with_ids, Positions};
