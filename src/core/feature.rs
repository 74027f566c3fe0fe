use super::texture::TextureLayout;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Element type a caller requests for a feature buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    F32, // 32-bit float, NaN = missing
    U8,  // 8-bit unsigned
    U16, // 16-bit unsigned
    U32, // 32-bit unsigned
}

impl ElementType {
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::F32 => "f32",
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::U32 => "u32",
        }
    }

    /// Largest value an integer element can hold; `None` for floats
    pub fn integer_max(&self) -> Option<u64> {
        match self {
            ElementType::F32 => None,
            ElementType::U8 => Some(u8::MAX as u64),
            ElementType::U16 => Some(u16::MAX as u64),
            ElementType::U32 => Some(u32::MAX as u64),
        }
    }
}

impl Default for ElementType {
    fn default() -> Self {
        ElementType::F32
    }
}

/// Feature values in their requested element type.
///
/// Buffers sit behind `Arc` so a loaded feature can be handed to any
/// number of jobs and readers without copying.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureData {
    F32(Arc<Vec<f32>>),
    U8(Arc<Vec<u8>>),
    U16(Arc<Vec<u16>>),
    U32(Arc<Vec<u32>>),
}

impl FeatureData {
    pub fn element_type(&self) -> ElementType {
        match self {
            FeatureData::F32(_) => ElementType::F32,
            FeatureData::U8(_) => ElementType::U8,
            FeatureData::U16(_) => ElementType::U16,
            FeatureData::U32(_) => ElementType::U32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FeatureData::F32(v) => v.len(),
            FeatureData::U8(v) => v.len(),
            FeatureData::U16(v) => v.len(),
            FeatureData::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index` widened to f64; NaN marks a missing value
    pub fn value_f64(&self, index: usize) -> f64 {
        match self {
            FeatureData::F32(v) => v[index] as f64,
            FeatureData::U8(v) => v[index] as f64,
            FeatureData::U16(v) => v[index] as f64,
            FeatureData::U32(v) => v[index] as f64,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            FeatureData::F32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match self {
            FeatureData::U8(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match self {
            FeatureData::U32(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Extrema over every non-missing value, or `(NaN, NaN)` when there are none
    pub fn min_max(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for i in 0..self.len() {
            let value = self.value_f64(i);
            if value.is_nan() {
                continue;
            }
            min = min.min(value);
            max = max.max(value);
        }

        if min > max {
            (f64::NAN, f64::NAN)
        } else {
            (min, max)
        }
    }
}

/// One loaded feature array, immutable once built
#[derive(Debug, Clone)]
pub struct FeatureRecord {
    pub data: FeatureData,
    pub unit: Option<String>,
    pub categories: Option<Vec<String>>,
    pub min: f64,
    pub max: f64,
    pub texture: TextureLayout,
}

impl FeatureRecord {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn is_categorical(&self) -> bool {
        self.categories.is_some()
    }

    /// Category label for the object at `index`, if the feature is categorical
    pub fn category_of(&self, index: usize) -> Option<&str> {
        let categories = self.categories.as_ref()?;
        let value = self.data.value_f64(index);
        if value.is_nan() || value < 0.0 {
            return None;
        }
        categories.get(value as usize).map(|s| s.as_str())
    }
}
