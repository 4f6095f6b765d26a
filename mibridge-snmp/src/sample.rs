//! Raw poll results, as returned by the session before decoding.

use std::fmt;

use num_bigint::BigInt;

/// A typed SNMP value, reduced to the shapes the decoders understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleValue {
    /// Octet string; may hold text or binary data.
    OctetString(Vec<u8>),
    /// Any integer-like SNMP type, at full precision.
    Integer(BigInt),
    /// NULL, an exception (noSuchObject, noSuchInstance, endOfMibView) or
    /// a type no decoder reads.
    Null,
}

impl SampleValue {
    /// Short name of the value type, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SampleValue::OctetString(_) => "octet string",
            SampleValue::Integer(_) => "integer",
            SampleValue::Null => "null",
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        SampleValue::OctetString(value.into().into_bytes())
    }

    pub fn integer(value: impl Into<BigInt>) -> Self {
        SampleValue::Integer(value.into())
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::OctetString(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            SampleValue::Integer(n) => write!(f, "{}", n),
            SampleValue::Null => write!(f, "null"),
        }
    }
}

/// One (OID, value) pair of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varbind {
    pub oid: String,
    pub value: SampleValue,
}

impl Varbind {
    pub fn new(oid: impl Into<String>, value: SampleValue) -> Self {
        Self {
            oid: oid.into(),
            value,
        }
    }
}

/// The ordered response to one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSample {
    pub varbinds: Vec<Varbind>,
}

impl RawSample {
    pub fn new(varbinds: Vec<Varbind>) -> Self {
        Self { varbinds }
    }

    /// Append a varbind.
    pub fn with(mut self, oid: impl Into<String>, value: SampleValue) -> Self {
        self.varbinds.push(Varbind::new(oid, value));
        self
    }

    pub fn len(&self) -> usize {
        self.varbinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.varbinds.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Varbind> {
        self.varbinds.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Varbind> {
        self.varbinds.iter()
    }
}
