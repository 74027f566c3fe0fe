use crate::core::{ElementType, FeatureData};
use std::sync::Arc;

/// Typed output buffer that decoders write into value by value.
///
/// Every push checks the value against the requested element type; a
/// rejected value yields a message naming its index.
pub(crate) enum ValueSink {
    F32(Vec<f32>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

type PushResult = std::result::Result<(), String>;

impl ValueSink {
    pub fn with_capacity(element_type: ElementType, capacity: usize) -> Self {
        match element_type {
            ElementType::F32 => ValueSink::F32(Vec::with_capacity(capacity)),
            ElementType::U8 => ValueSink::U8(Vec::with_capacity(capacity)),
            ElementType::U16 => ValueSink::U16(Vec::with_capacity(capacity)),
            ElementType::U32 => ValueSink::U32(Vec::with_capacity(capacity)),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ValueSink::F32(_) => ElementType::F32,
            ValueSink::U8(_) => ElementType::U8,
            ValueSink::U16(_) => ElementType::U16,
            ValueSink::U32(_) => ElementType::U32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ValueSink::F32(v) => v.len(),
            ValueSink::U8(v) => v.len(),
            ValueSink::U16(v) => v.len(),
            ValueSink::U32(v) => v.len(),
        }
    }

    pub fn push_float(&mut self, value: f64) -> PushResult {
        if let ValueSink::F32(v) = self {
            let narrowed = value as f32;
            if value.is_finite() && !narrowed.is_finite() {
                return Err(format!(
                    "value {} at index {} overflows f32",
                    value,
                    v.len()
                ));
            }
            v.push(narrowed);
            return Ok(());
        }
        if value.is_nan() {
            return self.push_missing();
        }
        if value.fract() != 0.0 {
            return Err(format!(
                "value {} at index {} is not an integer but {} was requested",
                value,
                self.len(),
                self.element_type().name()
            ));
        }
        self.push_integer(value as i128)
    }

    pub fn push_integer(&mut self, value: i128) -> PushResult {
        let index = self.len();
        let element_type = self.element_type();
        let out_of_range = || {
            format!(
                "value {} at index {} does not fit in {}",
                value,
                index,
                element_type.name()
            )
        };

        if let Some(max) = element_type.integer_max() {
            if value < 0 || value > i128::from(max) {
                return Err(out_of_range());
            }
        }

        // Range was checked above, so the integer casts are exact
        match self {
            ValueSink::F32(v) => {
                let narrowed = value as f32;
                if narrowed as i128 != value {
                    return Err(format!(
                        "value {} at index {} has no exact f32 representation",
                        value, index
                    ));
                }
                v.push(narrowed);
            }
            ValueSink::U8(v) => v.push(value as u8),
            ValueSink::U16(v) => v.push(value as u16),
            ValueSink::U32(v) => v.push(value as u32),
        }
        Ok(())
    }

    pub fn push_bool(&mut self, value: bool) -> PushResult {
        if let ValueSink::F32(_) = self {
            return Err(format!(
                "boolean at index {} cannot be stored as f32",
                self.len()
            ));
        }
        self.push_integer(value as i128)
    }

    pub fn push_missing(&mut self) -> PushResult {
        match self {
            ValueSink::F32(v) => {
                v.push(f32::NAN);
                Ok(())
            }
            other => Err(format!(
                "missing value at index {} has no {} representation",
                other.len(),
                other.element_type().name()
            )),
        }
    }

    /// Bulk append for float columns that are already in the target type
    pub fn extend_f32(&mut self, values: &[f32]) -> bool {
        match self {
            ValueSink::F32(v) => {
                v.extend_from_slice(values);
                true
            }
            _ => false,
        }
    }

    pub fn finish(self) -> FeatureData {
        match self {
            ValueSink::F32(v) => FeatureData::F32(Arc::new(v)),
            ValueSink::U8(v) => FeatureData::U8(Arc::new(v)),
            ValueSink::U16(v) => FeatureData::U16(Arc::new(v)),
            ValueSink::U32(v) => FeatureData::U32(Arc::new(v)),
        }
    }
}
