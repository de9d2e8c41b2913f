//! The tri-valued protocol symbol `{0, 1, ?}` and its heterogeneous wire encoding.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A value exchanged during the protocol: a concrete bit, or `Unknown` ("no
/// majority observed"), which only ever appears as the *result* of an
/// inconclusive phase-1 tally and as a phase-2 message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Zero,
    One,
    Unknown,
}

impl Value {
    pub fn from_bit(bit: u8) -> Self {
        match bit {
            0 => Value::Zero,
            1 => Value::One,
            other => panic!("initial value must be 0 or 1, got {other}"),
        }
    }

    pub fn as_bit(self) -> Option<u8> {
        match self {
            Value::Zero => Some(0),
            Value::One => Some(1),
            Value::Unknown => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Zero => write!(f, "0"),
            Value::One => write!(f, "1"),
            Value::Unknown => write!(f, "?"),
        }
    }
}

// Wire encoding (spec.md §6): 0 and 1 are JSON numbers, `?` is the JSON
// string "?". Neither serde's default enum representation nor
// `#[serde(untagged)]` produces this heterogeneous shape on its own, so
// both directions are implemented by hand.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Zero => serializer.serialize_u8(0),
            Value::One => serializer.serialize_u8(1),
            Value::Unknown => serializer.serialize_str("?"),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0, 1, or the string \"?\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        match v {
            0 => Ok(Value::Zero),
            1 => Ok(Value::One),
            other => Err(E::custom(format!("value must be 0 or 1, got {other}"))),
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        match v {
            0 => Ok(Value::Zero),
            1 => Ok(Value::One),
            other => Err(E::custom(format!("value must be 0 or 1, got {other}"))),
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        if v == "?" {
            Ok(Value::Unknown)
        } else {
            Err(E::custom(format!("expected \"?\", got {v:?}")))
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        assert_eq!(serde_json::to_string(&Value::Zero).unwrap(), "0");
        assert_eq!(serde_json::to_string(&Value::One).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Value::Unknown).unwrap(), "\"?\"");

        assert_eq!(serde_json::from_str::<Value>("0").unwrap(), Value::Zero);
        assert_eq!(serde_json::from_str::<Value>("1").unwrap(), Value::One);
        assert_eq!(
            serde_json::from_str::<Value>("\"?\"").unwrap(),
            Value::Unknown
        );
    }

    #[test]
    fn rejects_other_numbers_and_strings() {
        assert!(serde_json::from_str::<Value>("2").is_err());
        assert!(serde_json::from_str::<Value>("\"x\"").is_err());
    }
}
