//! A duration wrapper accepting either a plain integer-seconds value or a
//! `jiff`-style span string (`"1h"`, `"24h"`, `"10m 30s"`) when
//! deserializing, matching the texture of the teacher's `TimeSpan` in
//! `common/datetime.rs`.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A duration, stored internally as whole seconds (the unit every
/// `SignConf` duration field is defined in).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DurationSpec(pub u32);

impl DurationSpec {
    pub fn from_secs(secs: u32) -> DurationSpec {
        DurationSpec(secs)
    }

    pub fn as_secs(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DurationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl Serialize for DurationSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for DurationSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl de::Visitor<'_> for Visitor {
            type Value = DurationSpec;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer number of seconds or a span string like \"24h\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(DurationSpec(v as u32))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(DurationSpec(v.max(0) as u32))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                let span: jiff::Span = v.parse().map_err(de::Error::custom)?;
                let secs = span
                    .to_duration(jiff::Zoned::now().date())
                    .map_err(de::Error::custom)?
                    .as_secs();
                Ok(DurationSpec(secs as u32))
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_seconds_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            d: DurationSpec,
        }
        let doc: Doc = toml::from_str("d = 300").unwrap();
        assert_eq!(doc.d.as_secs(), 300);
    }

    #[test]
    fn parses_span_string_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            d: DurationSpec,
        }
        let doc: Doc = toml::from_str(r#"d = "1h""#).unwrap();
        assert_eq!(doc.d.as_secs(), 3600);
    }
}
