pub mod feature;
pub mod texture;
pub mod track;

pub use feature::{ElementType, FeatureData, FeatureRecord};
pub use texture::TextureLayout;
pub use track::{Track, TrackMap};
