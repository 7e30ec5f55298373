//! # IEEE-1284 Device ID Parsing
//!
//! USB printer-class devices describe themselves with an IEEE-1284 device
//! ID string: a 2-byte length followed by ASCII `KEY: value;` pairs.
//!
//! ## Wire Format
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 2 | body length, excluding this header |
//! | 2 | n | ASCII `KEY: value;` pairs |
//!
//! ## The Length Heuristic
//!
//! The length field's byte order is ambiguous in the wild: the standard
//! says big-endian, a sizable population of firmware ships little-endian.
//! Big-endian is tried first, little-endian second, and when neither value
//! is plausible the body is clamped to whatever was actually read. This
//! ambiguity reflects observed devices and is deliberately not "fixed".
//!
//! ## Dictionary Semantics
//!
//! Keys are case-sensitive (`MFG` and `mfg` are different keys, as in the
//! standard); values are whitespace-trimmed. Well-known fields have several
//! historical spellings, so lookups go through alternative-key lists.

/// Alternative spellings for the manufacturer field.
pub const MANUFACTURER_KEYS: &[&str] = &["MANUFACTURER", "MFG", "MFR"];
/// Alternative spellings for the model field.
pub const MODEL_KEYS: &[&str] = &["MODEL", "MDL"];
/// Alternative spellings for the description field.
pub const DESCRIPTION_KEYS: &[&str] = &["DESCRIPTION", "DES"];
/// Alternative spellings for the serial-number field.
pub const SERIAL_KEYS: &[&str] = &["SERIALNUMBER", "SN", "SER", "SERN"];

/// A parsed IEEE-1284 device ID.
#[derive(Debug, Clone)]
pub struct DeviceId {
    /// The raw ASCII body, kept verbatim for discovery output.
    raw: String,
    fields: Vec<(String, String)>,
}

impl DeviceId {
    /// Parse a raw device-ID buffer (2-byte length header included).
    ///
    /// Returns `None` only when the buffer cannot hold even the header.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 2 {
            return None;
        }
        let body_avail = buf.len() - 2;
        let be = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        let le = u16::from_le_bytes([buf[0], buf[1]]) as usize;

        // Try big-endian, then little-endian, then clamp.
        let body_len = if be > 0 && be <= body_avail {
            be
        } else if le > 0 && le <= body_avail {
            le
        } else {
            body_avail
        };

        let raw = String::from_utf8_lossy(&buf[2..2 + body_len]).to_string();
        let fields = raw
            .split(';')
            .filter_map(|pair| {
                let (key, value) = pair.split_once(':')?;
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((key.to_string(), value.trim().to_string()))
            })
            .collect();

        Some(Self { raw, fields })
    }

    /// The raw ASCII body.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Look up one exact (case-sensitive) key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up the first present key from an alternatives list.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.get_any(MANUFACTURER_KEYS)
    }

    pub fn model(&self) -> Option<&str> {
        self.get_any(MODEL_KEYS)
    }

    pub fn description(&self) -> Option<&str> {
        self.get_any(DESCRIPTION_KEYS)
    }

    pub fn serial(&self) -> Option<&str> {
        self.get_any(SERIAL_KEYS)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BODY: &str = "MFG:Sinfonia;MDL:CHC-S6145;DES:Sinfonia CHC-S6145;SN: Q12345 ;CMD:SinfoniaRaster;";

    fn with_length(body: &str, big_endian: bool) -> Vec<u8> {
        let len = body.len() as u16;
        let mut buf = if big_endian {
            len.to_be_bytes().to_vec()
        } else {
            len.to_le_bytes().to_vec()
        };
        buf.extend_from_slice(body.as_bytes());
        buf
    }

    #[test]
    fn test_parse_big_endian_length() {
        let id = DeviceId::parse(&with_length(BODY, true)).unwrap();
        assert_eq!(id.get("MFG"), Some("Sinfonia"));
        assert_eq!(id.get("MDL"), Some("CHC-S6145"));
    }

    #[test]
    fn test_parse_length_byte_swapped() {
        // A little-endian length field must decode to the same dictionary.
        let id = DeviceId::parse(&with_length(BODY, false)).unwrap();
        assert_eq!(id.get("MFG"), Some("Sinfonia"));
        assert_eq!(id.serial(), Some("Q12345"));
    }

    #[test]
    fn test_values_whitespace_trimmed() {
        let id = DeviceId::parse(&with_length(BODY, true)).unwrap();
        // "SN: Q12345 ;" -> exact substring between the delimiters, trimmed
        assert_eq!(id.get("SN"), Some("Q12345"));
    }

    #[test]
    fn test_keys_case_sensitive() {
        let id = DeviceId::parse(&with_length("MFG:Big;mfg:small;", true)).unwrap();
        assert_eq!(id.get("MFG"), Some("Big"));
        assert_eq!(id.get("mfg"), Some("small"));
    }

    #[test]
    fn test_alternative_keys() {
        let id =
            DeviceId::parse(&with_length("MANUFACTURER:Acme;SERN:XYZ;", true)).unwrap();
        assert_eq!(id.manufacturer(), Some("Acme"));
        assert_eq!(id.serial(), Some("XYZ"));
        assert_eq!(id.model(), None);
    }

    #[test]
    fn test_implausible_length_clamps_to_buffer() {
        // Length field claims far more than was read in either byte order.
        let mut buf = 0xFFFFu16.to_be_bytes().to_vec();
        buf.extend_from_slice(b"MDL:Clamped;");
        let id = DeviceId::parse(&buf).unwrap();
        assert_eq!(id.model(), Some("Clamped"));
    }

    #[test]
    fn test_zero_length_clamps_to_buffer() {
        let mut buf = vec![0, 0];
        buf.extend_from_slice(b"MDL:Zero;");
        let id = DeviceId::parse(&buf).unwrap();
        assert_eq!(id.model(), Some("Zero"));
    }

    #[test]
    fn test_header_only_and_garbage() {
        assert!(DeviceId::parse(&[]).is_none());
        assert!(DeviceId::parse(&[0x00]).is_none());
        // Header with empty body parses to an empty dictionary
        let id = DeviceId::parse(&[0x00, 0x00]).unwrap();
        assert_eq!(id.manufacturer(), None);
        // Pairs without a colon are skipped
        let id = DeviceId::parse(&with_length("garbage;MDL:Ok;", true)).unwrap();
        assert_eq!(id.model(), Some("Ok"));
    }

    #[test]
    fn test_raw_preserved() {
        let id = DeviceId::parse(&with_length(BODY, true)).unwrap();
        assert_eq!(id.raw(), BODY);
    }
}
