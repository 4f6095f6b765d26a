use snmp2::Oid;
use thiserror::Error;

/// An OID string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse OID '{oid}': {reason}")]
pub struct OidParseError {
    pub oid: String,
    pub reason: String,
}

/// Parse an OID string (e.g., "1.3.6.1.2.1.1.3.0") into an snmp2::Oid.
pub fn parse_oid(oid_str: &str) -> Result<Oid<'static>, OidParseError> {
    let trimmed = oid_str.trim().trim_start_matches('.');

    trimmed
        .parse::<Oid>()
        .map(|oid| oid.to_owned())
        .map_err(|e| OidParseError {
            oid: oid_str.to_string(),
            reason: format!("{:?}", e),
        })
}

/// Parse an ordered list of OID strings, keeping the order.
pub fn parse_oids<S: AsRef<str>>(oids: &[S]) -> Result<Vec<Oid<'static>>, OidParseError> {
    oids.iter().map(|oid| parse_oid(oid.as_ref())).collect()
}

/// Convert an snmp2::Oid back to a dotted string representation.
pub fn oid_to_string(oid: &Oid) -> String {
    oid.to_id_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_oid() {
        let oid = parse_oid("1.3.6.1.4.1.20916.1.9.1.1.1.1.0").unwrap();
        assert_eq!(oid_to_string(&oid), "1.3.6.1.4.1.20916.1.9.1.1.1.1.0");
    }

    #[test]
    fn test_parse_oid_leading_dot() {
        let oid = parse_oid(".1.3.6.1.2.1.1.3.0").unwrap();
        assert_eq!(oid_to_string(&oid), "1.3.6.1.2.1.1.3.0");
    }

    #[test]
    fn test_parse_oid_invalid() {
        let err = parse_oid("1.3.six.1").unwrap_err();
        assert_eq!(err.oid, "1.3.six.1");
    }

    #[test]
    fn test_parse_oids_keeps_order() {
        let oids = parse_oids(&[
            "1.3.6.1.4.1.12325.1.200.1.8.2.1.2.3",
            "1.3.6.1.4.1.12325.1.200.1.8.2.1.2.1",
        ])
        .unwrap();

        let rendered: Vec<String> = oids.iter().map(oid_to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "1.3.6.1.4.1.12325.1.200.1.8.2.1.2.3",
                "1.3.6.1.4.1.12325.1.200.1.8.2.1.2.1",
            ]
        );
    }
}
