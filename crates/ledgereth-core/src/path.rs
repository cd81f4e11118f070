//! BIP-32/44 derivation paths.
//!
//! The Ethereum app addresses keys by a derivation path sent as a one byte
//! element count followed by one big-endian `u32` per element, with the top
//! bit set for hardened elements.
//!
//! Only the two shapes the app is used with are accepted when parsing:
//!
//! - `44'/60'/N'/M/L`: BIP-44 (the default, `44'/60'/0'/0/0`)
//! - `44'/60'/N'/M`: legacy Ledger Live derivation
//!
//! # Example
//!
//! ```
//! use ledgereth_core::DerivationPath;
//!
//! let path: DerivationPath = "44'/60'/0'/0/0".parse().unwrap();
//! assert_eq!(path.encode().len(), 20);
//! assert_eq!(path.to_string(), "44'/60'/0'/0/0");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::{Error, Result};

/// Bit marking a hardened derivation element.
pub const HARDENED_BIT: u32 = 0x8000_0000;

/// Marker suffix for hardened elements in the string form.
const HARDENED_MARKER: char = '\'';

/// Default BIP-44 Ethereum path.
pub const DEFAULT_PATH: &str = "44'/60'/0'/0/0";

/// Default legacy Ledger Live path.
pub const DEFAULT_LEGACY_PATH: &str = "44'/60'/0'/0";

/// Deepest path the app accepts.
pub const MAX_DEPTH: usize = 10;

/// One element of a derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildIndex {
    /// Index without the hardened bit.
    pub index: u32,

    /// Whether the element is hardened.
    pub hardened: bool,
}

impl ChildIndex {
    /// Creates a normal (non-hardened) element.
    #[must_use]
    pub const fn normal(index: u32) -> Self {
        Self {
            index,
            hardened: false,
        }
    }

    /// Creates a hardened element.
    #[must_use]
    pub const fn hardened(index: u32) -> Self {
        Self {
            index,
            hardened: true,
        }
    }

    /// The wire value of this element.
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        if self.hardened {
            self.index | HARDENED_BIT
        } else {
            self.index
        }
    }

    /// Splits a wire value into index and hardened flag.
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self {
            index: value & !HARDENED_BIT,
            hardened: value & HARDENED_BIT != 0,
        }
    }
}

impl fmt::Display for ChildIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}{HARDENED_MARKER}", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// A derivation path, as understood by the Ethereum app.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    elements: Vec<ChildIndex>,
}

impl DerivationPath {
    /// Parses a derivation path string such as `44'/60'/0'/0/0`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPath`] if a segment is not a non-negative
    /// integer below `2^31`, or the path is not one of the accepted
    /// Ethereum shapes.
    pub fn parse(path: &str) -> Result<Self> {
        let elements = path
            .split('/')
            .map(parse_element)
            .collect::<Result<Vec<_>>>()?;

        let shape_ok = matches!(
            elements.as_slice(),
            [
                ChildIndex { index: 44, hardened: true },
                ChildIndex { index: 60, hardened: true },
                ChildIndex { hardened: true, .. },
                ChildIndex { hardened: false, .. },
                rest @ ..
            ] if rest.len() <= 1 && rest.iter().all(|e| !e.hardened)
        );

        if !shape_ok {
            return Err(Error::MalformedPath(format!(
                "{path} does not match 44'/60'/N'/M/L or 44'/60'/N'/M"
            )));
        }

        Ok(Self { elements })
    }

    /// Builds a path from raw elements without checking its shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPath`] if there are more than [`MAX_DEPTH`]
    /// elements.
    pub fn from_elements(elements: Vec<ChildIndex>) -> Result<Self> {
        check_depth(elements.len())?;
        Ok(Self { elements })
    }

    /// The default BIP-44 path `44'/60'/0'/0/0`.
    #[must_use]
    pub fn default_path() -> Self {
        Self {
            elements: vec![
                ChildIndex::hardened(44),
                ChildIndex::hardened(60),
                ChildIndex::hardened(0),
                ChildIndex::normal(0),
                ChildIndex::normal(0),
            ],
        }
    }

    /// The default legacy Ledger Live path `44'/60'/0'/0`.
    #[must_use]
    pub fn default_legacy_path() -> Self {
        Self {
            elements: vec![
                ChildIndex::hardened(44),
                ChildIndex::hardened(60),
                ChildIndex::hardened(0),
                ChildIndex::normal(0),
            ],
        }
    }

    /// Path elements in order.
    #[must_use]
    pub fn elements(&self) -> &[ChildIndex] {
        &self.elements
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the path has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Encodes the path as 4 big-endian bytes per element.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        self.elements
            .iter()
            .flat_map(|e| e.to_u32().to_be_bytes())
            .collect()
    }

    /// Decodes a path from its binary form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPath`] if the length is not a multiple of 4
    /// or the path is deeper than [`MAX_DEPTH`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(Error::MalformedPath(format!(
                "encoded path length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        check_depth(bytes.len() / 4)?;

        let elements = bytes
            .chunks_exact(4)
            .map(|c| ChildIndex::from_u32(u32::from_be_bytes([c[0], c[1], c[2], c[3]])))
            .collect();

        Ok(Self { elements })
    }

    /// The path as the device expects it: element count followed by
    /// [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPath`] if the element count does not fit the
    /// count byte.
    pub fn to_device_payload(&self) -> Result<Vec<u8>> {
        let count = u8::try_from(self.elements.len()).map_err(|_| {
            Error::MalformedPath(format!("{} elements do not fit a count byte", self.len()))
        })?;

        let mut payload = Vec::with_capacity(1 + 4 * self.elements.len());
        payload.push(count);
        payload.extend(self.encode());
        Ok(payload)
    }
}

impl Default for DerivationPath {
    fn default() -> Self {
        Self::default_path()
    }
}

fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::MalformedPath(format!(
            "path has {depth} elements, at most {MAX_DEPTH} are allowed"
        )));
    }
    Ok(())
}

fn parse_element(segment: &str) -> Result<ChildIndex> {
    let (digits, hardened) = match segment.strip_suffix(HARDENED_MARKER) {
        Some(digits) => (digits, true),
        None => (segment, false),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::MalformedPath(format!(
            "segment {segment:?} is not a non-negative integer"
        )));
    }

    let index: u32 = digits
        .parse()
        .map_err(|_| Error::MalformedPath(format!("segment {segment:?} is out of range")))?;

    if index & HARDENED_BIT != 0 {
        return Err(Error::MalformedPath(format!(
            "segment {segment:?} is out of range"
        )));
    }

    Ok(ChildIndex { index, hardened })
}

impl FromStr for DerivationPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

impl Serialize for DerivationPath {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_encoding() {
        let path = DerivationPath::parse(DEFAULT_PATH).unwrap();
        assert_eq!(
            hex::encode(path.encode()),
            "8000002c8000003c800000000000000000000000"
        );
        assert_eq!(path, DerivationPath::default_path());
    }

    #[test]
    fn legacy_path() {
        let path = DerivationPath::parse(DEFAULT_LEGACY_PATH).unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path, DerivationPath::default_legacy_path());
    }

    #[test]
    fn device_payload_has_count_prefix() {
        let path = DerivationPath::parse("44'/60'/1'/0/7").unwrap();
        let payload = path.to_device_payload().unwrap();
        assert_eq!(payload[0], 5);
        assert_eq!(&payload[1..], path.encode().as_slice());
        assert_eq!(&payload[17..], &[0, 0, 0, 7]);
    }

    #[test]
    fn round_trip() {
        for s in [
            "44'/60'/0'/0/0",
            "44'/60'/12'/1/99",
            "44'/60'/0'/5",
            "44'/60'/2147483647'/0/2147483647",
        ] {
            let path = DerivationPath::parse(s).unwrap();
            let decoded = DerivationPath::decode(&path.encode()).unwrap();
            assert_eq!(decoded, path);
            assert_eq!(decoded.to_string(), s);
        }
    }

    #[test]
    fn rejects_bad_grammar() {
        for s in [
            "",
            "m/44'/60'/0'/0/0",
            "44/60'/0'/0/0",
            "44'/61'/0'/0/0",
            "44'/60'/0/0/0",
            "44'/60'/0'/0'/0",
            "44'/60'/0'/0/0'",
            "44'/60'/0'",
            "44'/60'/0'/0/0/0",
            "44'/60'/x'/0/0",
            "44'/60'/-1'/0/0",
            "44'/60'/0''/0/0",
            "44'/60'/2147483648'/0/0",
        ] {
            assert!(
                matches!(DerivationPath::parse(s), Err(Error::MalformedPath(_))),
                "{s:?} should be rejected"
            );
        }
    }

    #[test]
    fn decode_rejects_partial_element() {
        let result = DerivationPath::decode(&[0x80, 0, 0]);
        assert!(matches!(result, Err(Error::MalformedPath(_))));
    }

    #[test]
    fn depth_is_bounded() {
        assert!(matches!(
            DerivationPath::decode(&[0u8; 1024]),
            Err(Error::MalformedPath(_))
        ));
        assert!(DerivationPath::decode(&[0u8; 4 * (MAX_DEPTH + 1)]).is_err());
        assert!(DerivationPath::from_elements(vec![ChildIndex::normal(0); 256]).is_err());

        let deepest =
            DerivationPath::from_elements(vec![ChildIndex::normal(1); MAX_DEPTH]).unwrap();
        let payload = deepest.to_device_payload().unwrap();
        assert_eq!(usize::from(payload[0]), MAX_DEPTH);
        assert_eq!(payload.len(), 1 + 4 * MAX_DEPTH);
        assert_eq!(DerivationPath::decode(&payload[1..]).unwrap(), deepest);
    }

    #[test]
    fn decode_uses_top_bit() {
        let path = DerivationPath::decode(&[0x80, 0, 0x01, 0x00, 0, 0, 0x01, 0x00]).unwrap();
        assert_eq!(
            path.elements(),
            &[ChildIndex::hardened(256), ChildIndex::normal(256)]
        );
    }

    #[test]
    fn serde_as_string() {
        let path = DerivationPath::default_path();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"44'/60'/0'/0/0\"");
        let back: DerivationPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<DerivationPath>("\"1/2/3\"").is_err());
    }
}
