use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Encode a value to JSON bytes.
///
/// Struct fields are written in declaration order, so the same value always
/// produces the same bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(Error::from)
}

/// Decode JSON bytes to a value.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(Error::from)
}

/// Serde adapter writing a [`num_bigint::BigInt`] as a plain JSON number.
///
/// Digits are carried verbatim, so values wider than 64 bits keep their
/// precision. Use with `#[serde(with = "mibridge_common::serialization::big_number")]`.
pub mod big_number {
    use std::str::FromStr;

    use num_bigint::BigInt;
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser};

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        let number: serde_json::Number =
            serde_json::from_str(&value.to_string()).map_err(ser::Error::custom)?;
        number.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let number = serde_json::Number::deserialize(deserializer)?;
        BigInt::from_str(&number.to_string())
            .map_err(|_| de::Error::custom(format!("not an integer: {}", number)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use serde::Deserialize;
    use std::str::FromStr;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reading {
        #[serde(with = "big_number")]
        value: BigInt,
        unit: String,
    }

    #[test]
    fn test_json_roundtrip() {
        let reading = Reading {
            value: BigInt::from(-42),
            unit: "C".to_string(),
        };

        let encoded = encode(&reading).unwrap();
        assert_eq!(encoded, br#"{"value":-42,"unit":"C"}"#);

        let decoded: Reading = decode(&encoded).unwrap();
        assert_eq!(decoded, reading);
    }

    #[test]
    fn test_big_number_beyond_64_bits() {
        let digits = "340282366920938463463374607431768211457";
        let reading = Reading {
            value: BigInt::from_str(digits).unwrap(),
            unit: "raw".to_string(),
        };

        let encoded = String::from_utf8(encode(&reading).unwrap()).unwrap();
        assert_eq!(encoded, format!(r#"{{"value":{},"unit":"raw"}}"#, digits));

        let decoded: Reading = decode(encoded.as_bytes()).unwrap();
        assert_eq!(decoded.value.to_string(), digits);
    }

    #[test]
    fn test_big_number_rejects_fraction() {
        let result: Result<Reading> = decode(br#"{"value":1.5,"unit":"C"}"#);
        assert!(result.is_err());
    }
}
