//! UUID helpers.

/// Generate a random UUID version 4.
pub fn new_v4() -> uuid::Uuid {
    let mut bytes = rand::random::<[u8; 16]>();

    bytes[6] = (4 << 4) | (bytes[6] & 0x0f); // 4 bit version
    bytes[8] = (0b10 << 6) | (bytes[8] & 0b11_1111); // variant

    uuid::Uuid::from_bytes(bytes)
}

/// Format a UUID as a `urn:uuid:` URN in lowercase hex.
pub fn format_urn(uuid: &uuid::Uuid) -> String {
    uuid.urn().to_string()
}

/// Parse a `urn:uuid:` URN, tolerating an angle-bracketed form.
pub fn parse_urn(value: &str) -> Result<uuid::Uuid, uuid::Error> {
    let value = value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value);

    uuid::Uuid::parse_str(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_uuidv4() {
        let uuid1 = new_v4();
        let uuid2 = new_v4();

        assert!(!uuid1.is_nil());
        assert_eq!(uuid1.get_version_num(), 4);
        assert_eq!(uuid1.get_variant(), uuid::Variant::RFC4122);

        assert!(!uuid2.is_nil());
        assert_eq!(uuid2.get_version_num(), 4);

        assert_ne!(uuid1, uuid2);
    }

    #[test]
    fn test_urn_roundtrip() {
        let uuid = new_v4();
        let urn = format_urn(&uuid);

        assert!(urn.starts_with("urn:uuid:"));
        assert_eq!(urn, urn.to_ascii_lowercase());
        assert_eq!(parse_urn(&urn).unwrap(), uuid);
        assert_eq!(parse_urn(&format!("<{}>", urn)).unwrap(), uuid);
    }

    #[test]
    fn test_urn_invalid() {
        assert!(parse_urn("rthdfswf").is_err());
    }
}
