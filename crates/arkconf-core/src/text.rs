//! Text encodings of flat files
//!
//! Game servers write some INI files as UTF-16LE with a byte order mark.
//! Decoding honors any BOM present; encoding uses the configured form,
//! with or without a BOM.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Encoding of a flat file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "utf-16", alias = "utf16")]
    Utf16,
}

impl TextEncoding {
    /// Decode bytes into text
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
            return decode_utf8(rest);
        }
        if let Some(rest) = bytes.strip_prefix(UTF16LE_BOM) {
            return decode_utf16(rest, u16::from_le_bytes);
        }
        if let Some(rest) = bytes.strip_prefix(UTF16BE_BOM) {
            return decode_utf16(rest, u16::from_be_bytes);
        }

        match self {
            TextEncoding::Utf8 => decode_utf8(bytes),
            TextEncoding::Utf16 => decode_utf16(bytes, u16::from_le_bytes),
        }
    }

    /// Encode text in the default form: UTF-8 without a BOM, UTF-16
    /// little-endian with one
    pub fn encode(&self, text: &str) -> Vec<u8> {
        self.encode_with_bom(text, self.default_bom())
    }

    /// Encode text, writing a byte order mark when `bom` is set
    pub fn encode_with_bom(&self, text: &str, bom: bool) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => {
                let mut out = Vec::with_capacity(3 + text.len());
                if bom {
                    out.extend_from_slice(UTF8_BOM);
                }
                out.extend_from_slice(text.as_bytes());
                out
            }
            TextEncoding::Utf16 => {
                let mut out = Vec::with_capacity(2 + text.len() * 2);
                if bom {
                    out.extend_from_slice(UTF16LE_BOM);
                }
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
                out
            }
        }
    }

    /// Whether [`TextEncoding::encode`] writes a byte order mark
    pub fn default_bom(&self) -> bool {
        matches!(self, TextEncoding::Utf16)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16 => "utf-16",
        }
    }
}

/// Check whether `bytes` start with a UTF-8 or UTF-16 byte order mark
pub fn has_bom(bytes: &[u8]) -> bool {
    bytes.starts_with(UTF8_BOM) || bytes.starts_with(UTF16LE_BOM) || bytes.starts_with(UTF16BE_BOM)
}

fn decode_utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| Error::parse(format!("Invalid UTF-8: {}", e)))
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::parse("Invalid UTF-16: odd number of bytes"));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| Error::parse(format!("Invalid UTF-16: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_encode_has_bom_and_le_units() {
        let bytes = TextEncoding::Utf16.encode("[A]");
        assert_eq!(bytes, vec![0xFF, 0xFE, b'[', 0, b'A', 0, b']', 0]);
        assert_eq!(TextEncoding::Utf16.decode(&bytes).unwrap(), "[A]");
    }

    #[test]
    fn test_utf16_big_endian_bom() {
        let bytes = [0xFE, 0xFF, 0, b'X', 0, b'='];
        assert_eq!(TextEncoding::Utf16.decode(&bytes).unwrap(), "X=");
    }

    #[test]
    fn test_bom_overrides_configured_encoding() {
        let utf16 = TextEncoding::Utf16.encode("Key=Ünïcode");
        assert_eq!(TextEncoding::Utf8.decode(&utf16).unwrap(), "Key=Ünïcode");

        let mut utf8 = UTF8_BOM.to_vec();
        utf8.extend_from_slice("[S]".as_bytes());
        assert_eq!(TextEncoding::Utf16.decode(&utf8).unwrap(), "[S]");
    }

    #[test]
    fn test_explicit_bom_choice() {
        let with = TextEncoding::Utf8.encode_with_bom("[S]", true);
        assert_eq!(with, vec![0xEF, 0xBB, 0xBF, b'[', b'S', b']']);
        assert!(has_bom(&with));
        assert_eq!(TextEncoding::Utf8.decode(&with).unwrap(), "[S]");

        let without = TextEncoding::Utf16.encode_with_bom("A", false);
        assert_eq!(without, vec![b'A', 0]);
        assert!(!has_bom(&without));
        assert_eq!(TextEncoding::Utf16.decode(&without).unwrap(), "A");
    }

    #[test]
    fn test_invalid_input_is_parse_error() {
        assert!(TextEncoding::Utf8.decode(&[0xC3, 0x28]).is_err());
        assert!(TextEncoding::Utf16.decode(&[0xFF, 0xFE, b'A']).is_err());
    }

    #[test]
    fn test_serde_names() {
        let enc: TextEncoding = serde_yaml::from_str("utf-16").unwrap();
        assert_eq!(enc, TextEncoding::Utf16);
        assert_eq!(serde_yaml::to_string(&TextEncoding::Utf8).unwrap().trim(), "utf-8");
    }
}
