//! Device-class decoders.
//!
//! Each device class reads a fixed number of positions from a [`RawSample`]
//! and builds a fixed-shape record. Position `i` of the sample corresponds to
//! OID `i` of the target's configured list, so the OID order in the
//! configuration defines the meaning of every field.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mibridge_common::serialization::big_number;

use crate::sample::{RawSample, SampleValue};

/// Selects the decoder applied to a target's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Three interface status strings.
    Interfaces,
    /// Celsius and Fahrenheit readings plus a sensor label.
    Temperature,
}

impl DeviceClass {
    /// Number of OIDs this class reads, in order.
    pub fn expected_width(self) -> usize {
        match self {
            DeviceClass::Interfaces => 3,
            DeviceClass::Temperature => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Interfaces => "interfaces",
            DeviceClass::Temperature => "temperature",
        }
    }

    /// Decode a sample into this class's record.
    ///
    /// Values past [`expected_width`](Self::expected_width) are ignored.
    pub fn decode(self, sample: &RawSample) -> Result<DecodedRecord, DecodeError> {
        match self {
            DeviceClass::Interfaces => Ok(DecodedRecord::Interfaces(InterfaceRecord {
                intf1: text_at(sample, 0)?,
                intf2: text_at(sample, 1)?,
                intf3: text_at(sample, 2)?,
            })),
            DeviceClass::Temperature => Ok(DecodedRecord::Temperature(TemperatureRecord {
                celsius: integer_at(sample, 0)?,
                fahrenheit: integer_at(sample, 1)?,
                label: text_at(sample, 2)?,
            })),
        }
    }
}

/// Status strings of three interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    #[serde(rename = "Intf1")]
    pub intf1: String,
    #[serde(rename = "Intf2")]
    pub intf2: String,
    #[serde(rename = "Intf3")]
    pub intf3: String,
}

/// One temperature reading in two scales.
///
/// The `Celcius` spelling is part of the published payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureRecord {
    #[serde(rename = "Celcius", with = "big_number")]
    pub celsius: BigInt,
    #[serde(rename = "Fahrenheit", with = "big_number")]
    pub fahrenheit: BigInt,
    #[serde(rename = "Label")]
    pub label: String,
}

/// A decoded poll result. Serializes as the bare record, without a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DecodedRecord {
    Interfaces(InterfaceRecord),
    Temperature(TemperatureRecord),
}

impl DecodedRecord {
    pub fn class(&self) -> DeviceClass {
        match self {
            DecodedRecord::Interfaces(_) => DeviceClass::Interfaces,
            DecodedRecord::Temperature(_) => DeviceClass::Temperature,
        }
    }

    /// Serialize to the JSON payload that gets published.
    pub fn to_payload(&self) -> mibridge_common::Result<Vec<u8>> {
        mibridge_common::encode(self)
    }
}

/// Why a sample does not fit a device class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("no value at position {index}: sample has {len} values")]
    MissingValue { index: usize, len: usize },

    #[error("position {index} ({oid}): expected {expected}, got {found}")]
    TypeMismatch {
        index: usize,
        oid: String,
        expected: &'static str,
        found: &'static str,
    },
}

fn value_at(sample: &RawSample, index: usize) -> Result<(&str, &SampleValue), DecodeError> {
    sample
        .get(index)
        .map(|vb| (vb.oid.as_str(), &vb.value))
        .ok_or(DecodeError::MissingValue {
            index,
            len: sample.len(),
        })
}

/// Read an octet string as text. Invalid UTF-8 is replaced, not rejected.
fn text_at(sample: &RawSample, index: usize) -> Result<String, DecodeError> {
    match value_at(sample, index)? {
        (_, SampleValue::OctetString(bytes)) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        (oid, other) => Err(DecodeError::TypeMismatch {
            index,
            oid: oid.to_string(),
            expected: "octet string",
            found: other.kind(),
        }),
    }
}

fn integer_at(sample: &RawSample, index: usize) -> Result<BigInt, DecodeError> {
    match value_at(sample, index)? {
        (_, SampleValue::Integer(n)) => Ok(n.clone()),
        (oid, other) => Err(DecodeError::TypeMismatch {
            index,
            oid: oid.to_string(),
            expected: "integer",
            found: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn interfaces_sample(a: &str, b: &str, c: &str) -> RawSample {
        RawSample::default()
            .with("o1", SampleValue::text(a))
            .with("o2", SampleValue::text(b))
            .with("o3", SampleValue::text(c))
    }

    fn temperature_sample(c: impl Into<BigInt>, f: impl Into<BigInt>, label: &str) -> RawSample {
        RawSample::default()
            .with("t1", SampleValue::integer(c))
            .with("t2", SampleValue::integer(f))
            .with("t3", SampleValue::text(label))
    }

    fn payload(record: &DecodedRecord) -> String {
        String::from_utf8(record.to_payload().unwrap()).unwrap()
    }

    #[test]
    fn test_interfaces_positional_decode() {
        let record = DeviceClass::Interfaces
            .decode(&interfaces_sample("up", "down", "up"))
            .unwrap();

        assert_eq!(
            record,
            DecodedRecord::Interfaces(InterfaceRecord {
                intf1: "up".to_string(),
                intf2: "down".to_string(),
                intf3: "up".to_string(),
            })
        );
        assert_eq!(
            payload(&record),
            r#"{"Intf1":"up","Intf2":"down","Intf3":"up"}"#
        );
    }

    #[test]
    fn test_temperature_decode() {
        let record = DeviceClass::Temperature
            .decode(&temperature_sample(250, 770, "SensorA"))
            .unwrap();

        assert_eq!(record.class(), DeviceClass::Temperature);
        assert_eq!(
            payload(&record),
            r#"{"Celcius":250,"Fahrenheit":770,"Label":"SensorA"}"#
        );
    }

    #[test]
    fn test_temperature_beyond_64_bits() {
        let huge = BigInt::from_str("-123456789012345678901234567890").unwrap();
        let record = DeviceClass::Temperature
            .decode(&temperature_sample(huge, u64::MAX, "Rack"))
            .unwrap();

        assert_eq!(
            payload(&record),
            r#"{"Celcius":-123456789012345678901234567890,"Fahrenheit":18446744073709551615,"Label":"Rack"}"#
        );
    }

    #[test]
    fn test_binary_octets_are_read_as_text() {
        let sample = RawSample::default()
            .with("o1", SampleValue::OctetString(vec![0x75, 0x70]))
            .with("o2", SampleValue::OctetString(vec![0xff]))
            .with("o3", SampleValue::OctetString(Vec::new()));

        let record = DeviceClass::Interfaces.decode(&sample).unwrap();
        assert_eq!(
            payload(&record),
            "{\"Intf1\":\"up\",\"Intf2\":\"\u{fffd}\",\"Intf3\":\"\"}"
        );
    }

    #[test]
    fn test_short_sample_is_rejected() {
        let sample = RawSample::default()
            .with("o1", SampleValue::text("up"))
            .with("o2", SampleValue::text("down"));

        assert_eq!(
            DeviceClass::Interfaces.decode(&sample),
            Err(DecodeError::MissingValue { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let sample = RawSample::default()
            .with("t1", SampleValue::text("25"))
            .with("t2", SampleValue::integer(77))
            .with("t3", SampleValue::text("Rack"));

        assert_eq!(
            DeviceClass::Temperature.decode(&sample),
            Err(DecodeError::TypeMismatch {
                index: 0,
                oid: "t1".to_string(),
                expected: "integer",
                found: "octet string",
            })
        );

        let sample = interfaces_sample("up", "up", "up").with("o4", SampleValue::Null);
        assert!(DeviceClass::Interfaces.decode(&sample).is_ok());

        let mut sample = interfaces_sample("up", "up", "up");
        sample.varbinds[1].value = SampleValue::Null;
        assert!(matches!(
            DeviceClass::Interfaces.decode(&sample),
            Err(DecodeError::TypeMismatch { index: 1, found: "null", .. })
        ));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let sample = temperature_sample(21, 69, "Rack 4");
        let first = DeviceClass::Temperature.decode(&sample).unwrap().to_payload().unwrap();

        for _ in 0..10 {
            let again = DeviceClass::Temperature.decode(&sample).unwrap().to_payload().unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_record_deserializes_from_payload() {
        let record = TemperatureRecord {
            celsius: BigInt::from(250),
            fahrenheit: BigInt::from(770),
            label: "SensorA".to_string(),
        };
        let bytes = DecodedRecord::Temperature(record.clone()).to_payload().unwrap();

        let parsed: TemperatureRecord = mibridge_common::decode(&bytes).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_class_from_config_string() {
        let class: DeviceClass = serde_json::from_str("\"temperature\"").unwrap();
        assert_eq!(class, DeviceClass::Temperature);
        assert_eq!(class.as_str(), "temperature");
        assert_eq!(DeviceClass::Interfaces.expected_width(), 3);
    }
}
