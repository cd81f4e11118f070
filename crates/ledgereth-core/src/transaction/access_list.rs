//! EIP-2930 access lists.
//!
//! [`AccessListEntry`] is the canonical form used in transactions. Callers
//! usually hold looser input (hex strings, integers) and convert it with
//! [`coerce_access_list`], which validates every item and builds a new list
//! without touching the input.

use alloy_primitives::{Address, B256, U256};
use alloy_rlp::{RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An access list entry for EIP-2930/EIP-1559 transactions.
///
/// Access lists specify which addresses and storage keys will be accessed
/// during transaction execution. Encoded as `[address, [key, ...]]` with each
/// key as a 32 byte string.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, RlpEncodable, RlpDecodable,
)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    /// The address being accessed.
    pub address: Address,

    /// The storage keys being accessed at this address.
    pub storage_keys: Vec<B256>,
}

/// A storage key as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StorageKeyInput {
    /// A hex string, with or without `0x`, of at most 32 bytes.
    Hex(String),
    /// An integer slot number.
    Integer(U256),
}

impl From<&str> for StorageKeyInput {
    fn from(value: &str) -> Self {
        Self::Hex(value.to_string())
    }
}

impl From<U256> for StorageKeyInput {
    fn from(value: U256) -> Self {
        Self::Integer(value)
    }
}

impl From<u64> for StorageKeyInput {
    fn from(value: u64) -> Self {
        Self::Integer(U256::from(value))
    }
}

impl From<B256> for StorageKeyInput {
    fn from(value: B256) -> Self {
        Self::Integer(U256::from_be_bytes(value.0))
    }
}

/// An access list item as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItemInput {
    /// Hex encoded 20 byte address.
    pub address: String,

    /// Storage keys of the address.
    #[serde(default)]
    pub storage_keys: Vec<StorageKeyInput>,
}

impl AccessListItemInput {
    /// Creates an item from an address string and keys.
    pub fn new<K>(address: impl Into<String>, storage_keys: impl IntoIterator<Item = K>) -> Self
    where
        K: Into<StorageKeyInput>,
    {
        Self {
            address: address.into(),
            storage_keys: storage_keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&AccessListEntry> for AccessListItemInput {
    fn from(entry: &AccessListEntry) -> Self {
        Self::new(entry.address.to_string(), entry.storage_keys.iter().copied())
    }
}

/// Validates caller input and converts it into canonical entries.
///
/// # Errors
///
/// Returns [`Error::InvalidAccessList`] naming the offending item if an
/// address is not 20 bytes of hex, or a storage key is not hex of at most 32
/// bytes.
///
/// # Example
///
/// ```
/// use ledgereth_core::transaction::{AccessListItemInput, StorageKeyInput, coerce_access_list};
///
/// let input = vec![AccessListItemInput::new(
///     "0xf0155486a14539f784739be1c02e93f28eb8e960",
///     [StorageKeyInput::from("0x01"), StorageKeyInput::from(2u64)],
/// )];
/// let entries = coerce_access_list(&input).unwrap();
/// assert_eq!(entries[0].storage_keys.len(), 2);
/// ```
pub fn coerce_access_list(input: &[AccessListItemInput]) -> Result<Vec<AccessListEntry>> {
    input
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let address = parse_address(&item.address).ok_or_else(|| {
                Error::InvalidAccessList(format!(
                    "address {:?} at index {i} is not a 20 byte hex string",
                    item.address
                ))
            })?;

            let storage_keys = item
                .storage_keys
                .iter()
                .enumerate()
                .map(|(j, key)| {
                    parse_storage_key(key).ok_or_else(|| {
                        Error::InvalidAccessList(format!(
                            "storage key {j} of item {i} is not a 32 byte word"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(AccessListEntry {
                address,
                storage_keys,
            })
        })
        .collect()
}

fn parse_address(s: &str) -> Option<Address> {
    let bytes = hex::decode(strip_0x(s)).ok()?;
    (bytes.len() == 20).then(|| Address::from_slice(&bytes))
}

fn parse_storage_key(key: &StorageKeyInput) -> Option<B256> {
    match key {
        StorageKeyInput::Integer(value) => Some(B256::from(value.to_be_bytes::<32>())),
        StorageKeyInput::Hex(s) => {
            let digits = strip_0x(s);
            if digits.is_empty() {
                return None;
            }
            // Odd length hex is a number like "0x1", pad it.
            let padded;
            let digits = if digits.len() % 2 == 1 {
                padded = format!("0{digits}");
                padded.as_str()
            } else {
                digits
            };
            let bytes = hex::decode(digits).ok()?;
            if bytes.len() > 32 {
                return None;
            }
            let mut word = [0u8; 32];
            word[32 - bytes.len()..].copy_from_slice(&bytes);
            Some(B256::from(word))
        }
    }
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
