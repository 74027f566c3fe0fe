use super::values::ValueSink;
use super::{ContainerFormat, DecodedFeature};
use crate::core::ElementType;
use crate::error::{PipelineError, Result};
use serde::de::{self, DeserializeSeed, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use std::borrow::Cow;
use std::fmt;

/// Row-oriented feature file: `{"data": [...], "min": .., "max": .., ...}`
#[derive(Deserialize)]
struct JsonFeature<'a> {
    #[serde(borrow)]
    data: &'a RawValue,
    #[serde(default)]
    min: Option<JsonBound>,
    #[serde(default)]
    max: Option<JsonBound>,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default, alias = "unit")]
    units: Option<String>,
}

/// Precomputed extrema; outlier files store them as booleans
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonBound {
    Number(f64),
    Flag(bool),
}

impl JsonBound {
    fn value(&self) -> f64 {
        match self {
            JsonBound::Number(v) => *v,
            JsonBound::Flag(b) => *b as u8 as f64,
        }
    }
}

pub(crate) fn decode(url: &str, bytes: &[u8], element_type: ElementType) -> Result<DecodedFeature> {
    let text = normalize_non_finite(bytes);
    let parse_error = |e: serde_json::Error| PipelineError::parse(url, ContainerFormat::Json, e);

    let feature: JsonFeature = serde_json::from_slice(&text).map_err(parse_error)?;

    let mut rejected = None;
    let seed = DataSeed {
        sink: ValueSink::with_capacity(element_type, 0),
        rejected: &mut rejected,
    };
    let mut deserializer = serde_json::Deserializer::from_str(feature.data.get());
    let sink = match seed.deserialize(&mut deserializer) {
        Ok(sink) => sink,
        Err(e) => {
            return Err(match rejected {
                Some(message) => PipelineError::data(url, message),
                None => parse_error(e),
            })
        }
    };

    Ok(DecodedFeature {
        data: sink.finish(),
        unit: feature.units,
        categories: feature.categories,
        min: feature.min.map(|b| b.value()),
        max: feature.max.map(|b| b.value()),
    })
}

/// Streams the `data` array straight into a typed sink
struct DataSeed<'r> {
    sink: ValueSink,
    rejected: &'r mut Option<String>,
}

impl<'de, 'r> DeserializeSeed<'de> for DataSeed<'r> {
    type Value = ValueSink;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<ValueSink, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 'r> Visitor<'de> for DataSeed<'r> {
    type Value = ValueSink;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of numbers, booleans or nulls")
    }

    fn visit_seq<A: SeqAccess<'de>>(mut self, mut seq: A) -> std::result::Result<ValueSink, A::Error> {
        if let Some(hint) = seq.size_hint() {
            self.sink = ValueSink::with_capacity(self.sink.element_type(), hint);
        }
        while let Some(cell) = seq.next_element::<Cell>()? {
            let pushed = match cell {
                Cell::Float(v) => self.sink.push_float(v),
                Cell::Integer(v) => self.sink.push_integer(v),
                Cell::Bool(b) => self.sink.push_bool(b),
                Cell::Missing => self.sink.push_missing(),
            };
            if let Err(message) = pushed {
                let error = <A::Error as de::Error>::custom(&message);
                *self.rejected = Some(message);
                return Err(error);
            }
        }
        Ok(self.sink)
    }
}

/// One entry of the `data` array
enum Cell {
    Float(f64),
    Integer(i128),
    Bool(bool),
    Missing,
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(CellVisitor)
    }
}

struct CellVisitor;

impl<'de> Visitor<'de> for CellVisitor {
    type Value = Cell;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, boolean or null")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Cell, E> {
        Ok(Cell::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Cell, E> {
        Ok(Cell::Integer(v as i128))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Cell, E> {
        Ok(Cell::Integer(v as i128))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Cell, E> {
        Ok(Cell::Float(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Cell, E> {
        Ok(Cell::Missing)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Cell, E> {
        Ok(Cell::Missing)
    }
}

/// Rewrite bare `NaN`, `Infinity` and `-Infinity` tokens (as emitted by
/// Python's json module) to `null`. String contents are left alone.
fn normalize_non_finite(bytes: &[u8]) -> Cow<'_, [u8]> {
    const TOKENS: [&[u8]; 3] = [b"-Infinity", b"Infinity", b"NaN"];

    let has_token = TOKENS
        .iter()
        .any(|token| bytes.windows(token.len()).any(|w| w == *token));
    if !has_token {
        return Cow::Borrowed(bytes);
    }

    let mut out = Vec::with_capacity(bytes.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    'scan: while i < bytes.len() {
        let byte = bytes[i];
        if in_string {
            match (escaped, byte) {
                (true, _) => escaped = false,
                (false, b'\\') => escaped = true,
                (false, b'"') => in_string = false,
                _ => {}
            }
        } else if byte == b'"' {
            in_string = true;
        } else {
            for token in TOKENS {
                if bytes[i..].starts_with(token) {
                    out.extend_from_slice(b"null");
                    i += token.len();
                    continue 'scan;
                }
            }
        }
        out.push(byte);
        i += 1;
    }
    Cow::Owned(out)
}
