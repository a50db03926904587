use snmp2::Oid;

use crate::error::{Result, SnmpError};

/// Normalize a dotted OID: trims whitespace and the leading dot
/// (".1.3.6.1" and "1.3.6.1" name the same object).
pub fn normalize_oid(oid_str: &str) -> Result<String> {
    let trimmed = oid_str.trim();
    let body = trimmed.strip_prefix('.').unwrap_or(trimmed);

    let invalid = |reason: &str| SnmpError::InvalidOid {
        oid: oid_str.to_string(),
        reason: reason.to_string(),
    };

    if body.is_empty() {
        return Err(invalid("empty"));
    }

    let mut arcs = 0;
    for arc in body.split('.') {
        if arc.is_empty() || arc.parse::<u64>().is_err() {
            return Err(invalid("arcs must be non-negative integers"));
        }
        arcs += 1;
    }
    if arcs < 2 {
        return Err(invalid("at least two arcs required"));
    }

    Ok(body.to_string())
}

/// Parse an OID string (e.g., "1.3.6.1.2.1.1.3.0") into an snmp2::Oid.
pub fn parse_oid(oid_str: &str) -> Result<Oid<'static>> {
    let normalized = normalize_oid(oid_str)?;
    normalized
        .parse::<Oid>()
        .map(|oid| oid.to_owned())
        .map_err(|e| SnmpError::InvalidOid {
            oid: oid_str.to_string(),
            reason: format!("{:?}", e),
        })
}

/// Convert an snmp2::Oid back to a dotted string representation.
pub fn oid_to_string(oid: &Oid) -> String {
    oid.to_id_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_leading_dot() {
        assert_eq!(
            normalize_oid(".1.3.6.1.2.1.33.1.2.5.0").unwrap(),
            "1.3.6.1.2.1.33.1.2.5.0"
        );
        assert_eq!(normalize_oid(" 1.3.6.1 ").unwrap(), "1.3.6.1");
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_oid("").is_err());
        assert!(normalize_oid(".").is_err());
        assert!(normalize_oid("1").is_err());
        assert!(normalize_oid("1.3..6").is_err());
        assert!(normalize_oid("1.3.six.1").is_err());
    }

    #[test]
    fn test_parse_oid() {
        let oid = parse_oid(".1.3.6.1.2.1.1.3.0").unwrap();
        assert_eq!(oid_to_string(&oid), "1.3.6.1.2.1.1.3.0");
    }
}
