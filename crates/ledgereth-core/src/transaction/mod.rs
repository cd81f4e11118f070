//! Ethereum transaction types and their binary encoding.
//!
//! This module provides the unsigned transaction records the Ethereum app
//! signs, and their signed counterparts. It supports:
//!
//! - **Legacy Transactions**: pre-EIP-155 and EIP-155 replay protected
//! - **EIP-2930 Transactions**: type 1, with an access list
//! - **EIP-1559 Transactions**: type 2, with priority fees and max fees
//!
//! # Signing Flow
//!
//! 1. Describe the transaction with a [`TransactionRequest`] and
//!    [`build`](TransactionRequest::build) it, or construct a record directly
//! 2. [`Transaction::encode_unsigned`] produces the bytes sent to the device
//! 3. The device answers with a recovery byte, `r` and `s`
//! 4. [`SignedTransaction::from_device_response`] recovers `v` and assembles
//!    the signed transaction
//!
//! # Example
//!
//! ```
//! use ledgereth_core::transaction::{Transaction, TransactionRequest, TransactionType};
//! use alloy_primitives::U256;
//!
//! let tx = TransactionRequest {
//!     to: Some("0xf0155486a14539f784739be1c02e93f28eb8e960".parse().unwrap()),
//!     value: U256::from(100_000_000_000_000_000u64),
//!     gas: 1_000_000,
//!     gas_price: Some(U256::from(1_000_000_000u64)),
//!     chain_id: Some(1),
//!     ..Default::default()
//! }
//! .build()
//! .unwrap();
//!
//! assert_eq!(tx.transaction_type(), TransactionType::Legacy);
//! let unsigned = tx.encode_unsigned();
//! assert_eq!(Transaction::decode(&unsigned).unwrap(), tx);
//! ```

mod access_list;
mod codec;
mod signed;

pub use access_list::{AccessListEntry, AccessListItemInput, StorageKeyInput, coerce_access_list};
pub use codec::{Decoded, decode};
pub use signed::SignedTransaction;

use std::fmt;

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_rlp::Encodable;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use codec::{encode_optional_address, encode_rlp_list};

/// Highest chain ID a legacy transaction may use, so that the EIP-155 `v`
/// fits in 32 bits.
pub const MAX_LEGACY_CHAIN_ID: u64 = 0xFFFF_FFFF / 2 - 36;

/// Highest chain ID a typed transaction may use.
pub const MAX_CHAIN_ID: u64 = 999_999_999_999_999;

/// EIP-2718 transaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionType {
    /// Original and EIP-155 transactions.
    Legacy = 0,
    /// EIP-2930 access list transactions.
    AccessList = 1,
    /// EIP-1559 fee market transactions.
    FeeMarket = 2,
}

impl TransactionType {
    /// The type byte prefixed to typed transactions.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Whether the encoding carries a type prefix.
    #[must_use]
    pub const fn is_typed(self) -> bool {
        !matches!(self, Self::Legacy)
    }
}

impl TryFrom<u8> for TransactionType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Legacy),
            1 => Ok(Self::AccessList),
            2 => Ok(Self::FeeMarket),
            other => Err(Error::UnsupportedTransactionType(other)),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::AccessList => f.write_str("EIP-2930"),
            Self::FeeMarket => f.write_str("EIP-1559"),
        }
    }
}

/// A legacy transaction.
///
/// With a chain ID this is an [EIP-155] transaction; without one it is an
/// unprotected pre-EIP-155 transaction.
///
/// [EIP-155]: https://eips.ethereum.org/EIPS/eip-155
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTransaction {
    /// The chain ID for replay protection.
    pub chain_id: Option<u64>,

    /// The transaction nonce.
    pub nonce: u64,

    /// The gas price in wei.
    pub gas_price: U256,

    /// The gas limit.
    pub gas_limit: u64,

    /// The recipient address, or `None` for contract creation.
    pub to: Option<Address>,

    /// The value to transfer in wei.
    pub value: U256,

    /// The transaction input data.
    pub data: Bytes,
}

impl LegacyTransaction {
    /// Fields shared by the unsigned and signed encodings.
    pub(crate) fn encode_fields(&self, out: &mut Vec<u8>) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        encode_optional_address(self.to.as_ref(), out);
        self.value.encode(out);
        self.data.encode(out);
    }

    /// Encodes the transaction for signing.
    ///
    /// `rlp([nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0])`, or
    /// the first six fields only when there is no chain ID.
    #[must_use]
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        encode_rlp_list(&mut buf, |buf| {
            self.encode_fields(buf);
            if let Some(chain_id) = self.chain_id {
                chain_id.encode(buf);
                0u8.encode(buf);
                0u8.encode(buf);
            }
        });

        buf
    }
}

/// An [EIP-2930] (Type 1) transaction.
///
/// [EIP-2930]: https://eips.ethereum.org/EIPS/eip-2930
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListTransaction {
    /// The chain ID.
    pub chain_id: u64,

    /// The transaction nonce.
    pub nonce: u64,

    /// The gas price in wei.
    pub gas_price: U256,

    /// The gas limit.
    pub gas_limit: u64,

    /// The recipient address, or `None` for contract creation.
    pub to: Option<Address>,

    /// The value to transfer in wei.
    pub value: U256,

    /// The transaction input data.
    pub data: Bytes,

    /// The access list.
    pub access_list: Vec<AccessListEntry>,
}

impl AccessListTransaction {
    /// The transaction type identifier for EIP-2930.
    pub const TX_TYPE: u8 = 0x01;

    pub(crate) fn encode_fields(&self, out: &mut Vec<u8>) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        encode_optional_address(self.to.as_ref(), out);
        self.value.encode(out);
        self.data.encode(out);
        self.access_list.encode(out);
    }

    /// Encodes the transaction for signing.
    ///
    /// `0x01 || rlp([chainId, nonce, gasPrice, gasLimit, to, value, data,
    /// accessList])`
    #[must_use]
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.push(Self::TX_TYPE);
        encode_rlp_list(&mut buf, |buf| self.encode_fields(buf));
        buf
    }
}

/// An EIP-1559 (Type 2) transaction.
///
/// This transaction type introduces:
///
/// - Base fee burning
/// - Priority fee (tip) for validators
/// - More predictable gas pricing
///
/// See [EIP-1559] for details.
///
/// [EIP-1559]: https://eips.ethereum.org/EIPS/eip-1559
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeMarketTransaction {
    /// The chain ID.
    pub chain_id: u64,

    /// The transaction nonce.
    pub nonce: u64,

    /// The maximum priority fee per gas (tip).
    pub max_priority_fee_per_gas: U256,

    /// The maximum total fee per gas.
    pub max_fee_per_gas: U256,

    /// The gas limit.
    pub gas_limit: u64,

    /// The recipient address, or `None` for contract creation.
    pub to: Option<Address>,

    /// The value to transfer in wei.
    pub value: U256,

    /// The transaction input data.
    pub data: Bytes,

    /// The access list.
    pub access_list: Vec<AccessListEntry>,
}

impl FeeMarketTransaction {
    /// The transaction type identifier for EIP-1559.
    pub const TX_TYPE: u8 = 0x02;

    pub(crate) fn encode_fields(&self, out: &mut Vec<u8>) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
        self.gas_limit.encode(out);
        encode_optional_address(self.to.as_ref(), out);
        self.value.encode(out);
        self.data.encode(out);
        self.access_list.encode(out);
    }

    /// Encodes the transaction for signing.
    ///
    /// `0x02 || rlp([chainId, nonce, maxPriorityFeePerGas, maxFeePerGas,
    /// gasLimit, to, value, data, accessList])`
    #[must_use]
    pub fn encode_unsigned(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.push(Self::TX_TYPE);
        encode_rlp_list(&mut buf, |buf| self.encode_fields(buf));
        buf
    }
}

/// An unsigned transaction of any supported type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Transaction {
    /// Legacy or EIP-155 transaction.
    #[serde(rename = "legacy")]
    Legacy(LegacyTransaction),
    /// EIP-2930 (Type 1) transaction.
    #[serde(rename = "eip2930")]
    AccessList(AccessListTransaction),
    /// EIP-1559 (Type 2) transaction.
    #[serde(rename = "eip1559")]
    FeeMarket(FeeMarketTransaction),
}

impl Transaction {
    /// Returns the EIP-2718 type of this transaction.
    #[must_use]
    pub const fn transaction_type(&self) -> TransactionType {
        match self {
            Self::Legacy(_) => TransactionType::Legacy,
            Self::AccessList(_) => TransactionType::AccessList,
            Self::FeeMarket(_) => TransactionType::FeeMarket,
        }
    }

    /// Returns the chain ID, if any.
    #[must_use]
    pub const fn chain_id(&self) -> Option<u64> {
        match self {
            Self::Legacy(tx) => tx.chain_id,
            Self::AccessList(tx) => Some(tx.chain_id),
            Self::FeeMarket(tx) => Some(tx.chain_id),
        }
    }

    /// Returns the nonce.
    #[must_use]
    pub const fn nonce(&self) -> u64 {
        match self {
            Self::Legacy(tx) => tx.nonce,
            Self::AccessList(tx) => tx.nonce,
            Self::FeeMarket(tx) => tx.nonce,
        }
    }

    /// Returns the recipient, `None` for contract creation.
    #[must_use]
    pub const fn to(&self) -> Option<Address> {
        match self {
            Self::Legacy(tx) => tx.to,
            Self::AccessList(tx) => tx.to,
            Self::FeeMarket(tx) => tx.to,
        }
    }

    /// Returns the value in wei.
    #[must_use]
    pub const fn value(&self) -> U256 {
        match self {
            Self::Legacy(tx) => tx.value,
            Self::AccessList(tx) => tx.value,
            Self::FeeMarket(tx) => tx.value,
        }
    }

    /// Returns the access list; empty for legacy transactions.
    #[must_use]
    pub fn access_list(&self) -> &[AccessListEntry] {
        match self {
            Self::Legacy(_) => &[],
            Self::AccessList(tx) => &tx.access_list,
            Self::FeeMarket(tx) => &tx.access_list,
        }
    }

    /// Encodes the transaction as sent to the device for signing.
    #[must_use]
    pub fn encode_unsigned(&self) -> Vec<u8> {
        match self {
            Self::Legacy(tx) => tx.encode_unsigned(),
            Self::AccessList(tx) => tx.encode_unsigned(),
            Self::FeeMarket(tx) => tx.encode_unsigned(),
        }
    }

    /// Returns the signing hash: keccak-256 of the unsigned encoding.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        keccak256(self.encode_unsigned())
    }

    /// Checks the chain ID bounds of the transaction type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransaction`] if a legacy chain ID exceeds
    /// [`MAX_LEGACY_CHAIN_ID`] or a typed chain ID exceeds [`MAX_CHAIN_ID`].
    pub fn validate(&self) -> Result<()> {
        match self.chain_id() {
            Some(id) if !self.transaction_type().is_typed() && id > MAX_LEGACY_CHAIN_ID => {
                Err(Error::InvalidTransaction(
                    "chain_id must be a 32-bit integer for type 0 transactions".to_string(),
                ))
            }
            Some(id) if id > MAX_CHAIN_ID => Err(Error::InvalidTransaction(format!(
                "chain_id must not be above {MAX_CHAIN_ID}"
            ))),
            _ => Ok(()),
        }
    }

    /// Decodes an unsigned transaction.
    ///
    /// # Errors
    ///
    /// See [`decode`].
    pub fn decode(raw: &[u8]) -> Result<Self> {
        match decode(raw, false)? {
            Decoded::Unsigned(tx) => Ok(tx),
            Decoded::Signed(signed) => Ok(signed.transaction),
        }
    }

    /// Parses a transaction from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if parsing fails.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the transaction to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<LegacyTransaction> for Transaction {
    fn from(tx: LegacyTransaction) -> Self {
        Self::Legacy(tx)
    }
}

impl From<AccessListTransaction> for Transaction {
    fn from(tx: AccessListTransaction) -> Self {
        Self::AccessList(tx)
    }
}

impl From<FeeMarketTransaction> for Transaction {
    fn from(tx: FeeMarketTransaction) -> Self {
        Self::FeeMarket(tx)
    }
}

/// Loosely typed transaction fields, shaped like a JSON-RPC request.
///
/// [`build`](Self::build) picks the transaction type:
///
/// - `max_fee_per_gas` set: [`FeeMarketTransaction`]
/// - `access_list` set: [`AccessListTransaction`]
/// - otherwise: [`LegacyTransaction`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Recipient, `None` for contract creation.
    #[serde(default)]
    pub to: Option<Address>,

    /// Value in wei.
    #[serde(default)]
    pub value: U256,

    /// Gas limit.
    #[serde(alias = "gasLimit")]
    pub gas: u64,

    /// Nonce.
    #[serde(default)]
    pub nonce: u64,

    /// Input data.
    #[serde(default, alias = "input")]
    pub data: Bytes,

    /// Legacy and EIP-2930 gas price.
    #[serde(default)]
    pub gas_price: Option<U256>,

    /// EIP-1559 priority fee.
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<U256>,

    /// EIP-1559 max fee.
    #[serde(default)]
    pub max_fee_per_gas: Option<U256>,

    /// Chain ID. Required for typed transactions.
    #[serde(default)]
    pub chain_id: Option<u64>,

    /// Access list, in any accepted input form.
    #[serde(default)]
    pub access_list: Option<Vec<AccessListItemInput>>,
}

impl TransactionRequest {
    /// Builds the unsigned transaction.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransaction`] if `gas_price` is mixed with the
    ///   EIP-1559 fee fields, if neither `gas_price` nor `max_fee_per_gas` is
    ///   given, if a typed transaction has no chain ID, or the chain ID is
    ///   out of bounds
    /// - [`Error::InvalidAccessList`] if the access list cannot be coerced
    pub fn build(&self) -> Result<Transaction> {
        if self.gas_price.is_some()
            && (self.max_priority_fee_per_gas.is_some() || self.max_fee_per_gas.is_some())
        {
            return Err(Error::InvalidTransaction(
                "gas_price is incompatible with max_priority_fee_per_gas and max_fee_per_gas"
                    .to_string(),
            ));
        }

        let access_list = self
            .access_list
            .as_deref()
            .map(coerce_access_list)
            .transpose()?;

        let tx = match (self.gas_price, self.max_fee_per_gas) {
            (None, Some(max_fee_per_gas)) => Transaction::FeeMarket(FeeMarketTransaction {
                chain_id: self.typed_chain_id()?,
                nonce: self.nonce,
                max_priority_fee_per_gas: self.max_priority_fee_per_gas.unwrap_or_default(),
                max_fee_per_gas,
                gas_limit: self.gas,
                to: self.to,
                value: self.value,
                data: self.data.clone(),
                access_list: access_list.unwrap_or_default(),
            }),
            (Some(gas_price), None) => match access_list {
                Some(access_list) => Transaction::AccessList(AccessListTransaction {
                    chain_id: self.typed_chain_id()?,
                    nonce: self.nonce,
                    gas_price,
                    gas_limit: self.gas,
                    to: self.to,
                    value: self.value,
                    data: self.data.clone(),
                    access_list,
                }),
                None => Transaction::Legacy(LegacyTransaction {
                    chain_id: self.chain_id,
                    nonce: self.nonce,
                    gas_price,
                    gas_limit: self.gas,
                    to: self.to,
                    value: self.value,
                    data: self.data.clone(),
                }),
            },
            _ => {
                return Err(Error::InvalidTransaction(
                    "gas_price or max_fee_per_gas must be provided".to_string(),
                ));
            }
        };

        tx.validate()?;
        Ok(tx)
    }

    fn typed_chain_id(&self) -> Result<u64> {
        self.chain_id.ok_or_else(|| {
            Error::InvalidTransaction("chain_id is required for typed transactions".to_string())
        })
    }

    /// Parses a request from JSON-RPC style JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if parsing fails.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Address {
        "0xf0155486a14539f784739be1c02e93f28eb8e960".parse().unwrap()
    }

    fn legacy(chain_id: Option<u64>) -> LegacyTransaction {
        LegacyTransaction {
            chain_id,
            nonce: 0,
            gas_price: U256::from(1_000_000_000u64),
            gas_limit: 1_000_000,
            to: Some(target()),
            value: U256::from(100_000_000_000_000_000u64),
            data: Bytes::new(),
        }
    }

    #[test]
    fn legacy_unsigned_encoding() {
        let encoded = legacy(Some(1)).encode_unsigned();
        assert_eq!(
            hex::encode(&encoded),
            concat!(
                "ec",
                "80",
                "843b9aca00",
                "830f4240",
                "94f0155486a14539f784739be1c02e93f28eb8e960",
                "88016345785d8a0000",
                "80",
                "01",
                "80",
                "80"
            )
        );
    }

    #[test]
    fn legacy_without_chain_id_has_six_fields() {
        let with = legacy(Some(1)).encode_unsigned();
        let without = legacy(None).encode_unsigned();
        assert_eq!(without.len() + 3, with.len());
        assert_eq!(without[0], 0xc0 + (without.len() as u8 - 1));
    }

    #[test]
    fn contract_creation_encodes_empty_to() {
        let mut tx = legacy(Some(1));
        tx.to = None;
        tx.data = Bytes::from(vec![0x60, 0x80, 0x60, 0x40]);
        let encoded = tx.encode_unsigned();
        // nonce, gas price, gas limit, then the empty `to`
        assert_eq!(encoded[1 + 1 + 5 + 4], 0x80);
    }

    #[test]
    fn typed_prefixes() {
        let access = AccessListTransaction {
            chain_id: 1,
            nonce: 0,
            gas_price: U256::from(1u64),
            gas_limit: 21000,
            to: Some(target()),
            value: U256::ZERO,
            data: Bytes::new(),
            access_list: vec![],
        };
        let fee = FeeMarketTransaction {
            chain_id: 1,
            nonce: 0,
            max_priority_fee_per_gas: U256::from(1u64),
            max_fee_per_gas: U256::from(2u64),
            gas_limit: 21000,
            to: Some(target()),
            value: U256::ZERO,
            data: Bytes::new(),
            access_list: vec![],
        };

        assert_eq!(access.encode_unsigned()[0], 0x01);
        assert_eq!(fee.encode_unsigned()[0], 0x02);
        // empty access list is the last field: 0xc0
        assert_eq!(*fee.encode_unsigned().last().unwrap(), 0xc0);
    }

    #[test]
    fn access_list_item_layout() {
        let tx = AccessListTransaction {
            chain_id: 1,
            nonce: 0,
            gas_price: U256::ZERO,
            gas_limit: 0,
            to: None,
            value: U256::ZERO,
            data: Bytes::new(),
            access_list: vec![AccessListEntry {
                address: target(),
                storage_keys: vec![B256::with_last_byte(1)],
            }],
        };

        let encoded = hex::encode(tx.encode_unsigned());
        let item = format!(
            "f7{}{}e1a0{}",
            "94",
            "f0155486a14539f784739be1c02e93f28eb8e960",
            "00".repeat(31) + "01"
        );
        assert!(encoded.ends_with(&format!("f838{item}")));
    }

    #[test]
    fn signing_hashes_differ_by_type() {
        let legacy = Transaction::Legacy(legacy(Some(1)));
        let fee = TransactionRequest {
            to: Some(target()),
            gas: 21000,
            max_fee_per_gas: Some(U256::from(10u64)),
            chain_id: Some(1),
            ..Default::default()
        }
        .build()
        .unwrap();

        assert!(!legacy.signing_hash().is_zero());
        assert_ne!(legacy.signing_hash(), fee.signing_hash());
    }

    #[test]
    fn build_selects_type() {
        let base = TransactionRequest {
            to: Some(target()),
            gas: 21000,
            chain_id: Some(1),
            ..Default::default()
        };

        let tx = TransactionRequest {
            gas_price: Some(U256::from(1u64)),
            ..base.clone()
        }
        .build()
        .unwrap();
        assert_eq!(tx.transaction_type(), TransactionType::Legacy);

        let tx = TransactionRequest {
            gas_price: Some(U256::from(1u64)),
            access_list: Some(vec![]),
            ..base.clone()
        }
        .build()
        .unwrap();
        assert_eq!(tx.transaction_type(), TransactionType::AccessList);

        let tx = TransactionRequest {
            max_priority_fee_per_gas: Some(U256::from(1u64)),
            max_fee_per_gas: Some(U256::from(2u64)),
            ..base
        }
        .build()
        .unwrap();
        assert_eq!(tx.transaction_type(), TransactionType::FeeMarket);
    }

    #[test]
    fn build_rejects_mixed_fees() {
        let request = TransactionRequest {
            gas: 21000,
            gas_price: Some(U256::from(1u64)),
            max_fee_per_gas: Some(U256::from(2u64)),
            chain_id: Some(1),
            ..Default::default()
        };
        let err = request.build().unwrap_err();
        assert!(
            err.to_string()
                .contains("gas_price is incompatible with max_priority_fee_per_gas")
        );

        let request = TransactionRequest {
            gas: 21000,
            gas_price: Some(U256::from(1u64)),
            max_priority_fee_per_gas: Some(U256::from(2u64)),
            chain_id: Some(1),
            ..Default::default()
        };
        assert!(matches!(request.build(), Err(Error::InvalidTransaction(_))));
    }

    #[test]
    fn build_requires_a_fee() {
        let request = TransactionRequest {
            gas: 21000,
            max_priority_fee_per_gas: Some(U256::from(2u64)),
            chain_id: Some(1),
            ..Default::default()
        };
        let err = request.build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid transaction: gas_price or max_fee_per_gas must be provided"
        );
    }

    #[test]
    fn typed_transactions_need_chain_id() {
        let request = TransactionRequest {
            gas: 21000,
            max_fee_per_gas: Some(U256::from(2u64)),
            ..Default::default()
        };
        assert!(matches!(request.build(), Err(Error::InvalidTransaction(_))));
    }

    #[test]
    fn chain_id_bounds() {
        let legacy_request = |chain_id| TransactionRequest {
            gas: 21000,
            gas_price: Some(U256::from(1u64)),
            chain_id: Some(chain_id),
            ..Default::default()
        };
        assert!(legacy_request(MAX_LEGACY_CHAIN_ID).build().is_ok());
        let err = legacy_request(MAX_LEGACY_CHAIN_ID + 1).build().unwrap_err();
        assert!(err.to_string().contains("32-bit integer for type 0"));

        let typed_request = |chain_id| TransactionRequest {
            gas: 21000,
            max_fee_per_gas: Some(U256::from(1u64)),
            chain_id: Some(chain_id),
            ..Default::default()
        };
        assert!(typed_request(MAX_CHAIN_ID).build().is_ok());
        let err = typed_request(MAX_CHAIN_ID + 1).build().unwrap_err();
        assert!(err.to_string().contains("must not be above 999999999999999"));

        let access_request = TransactionRequest {
            gas_price: Some(U256::from(1u64)),
            access_list: Some(vec![]),
            chain_id: Some(MAX_CHAIN_ID),
            ..Default::default()
        };
        assert!(access_request.build().is_ok());
    }

    #[test]
    fn request_from_json() {
        let json = r#"{
            "to": "0xf0155486a14539f784739be1c02e93f28eb8e960",
            "value": "0x16345785d8a0000",
            "gas": 21000,
            "nonce": 3,
            "maxFeePerGas": "0x2540be400",
            "maxPriorityFeePerGas": "0x3b9aca00",
            "chainId": 5,
            "accessList": [
                {"address": "0xf0155486a14539f784739be1c02e93f28eb8e960", "storageKeys": ["0x01"]}
            ]
        }"#;

        let tx = TransactionRequest::from_json(json).unwrap().build().unwrap();
        let Transaction::FeeMarket(tx) = tx else {
            panic!("expected an EIP-1559 transaction");
        };
        assert_eq!(tx.chain_id, 5);
        assert_eq!(tx.nonce, 3);
        assert_eq!(tx.max_fee_per_gas, U256::from(10_000_000_000u64));
        assert_eq!(tx.access_list[0].storage_keys, vec![B256::with_last_byte(1)]);
    }

    #[test]
    fn transaction_json_roundtrip() {
        let original = Transaction::FeeMarket(FeeMarketTransaction {
            chain_id: 1,
            nonce: 42,
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
            max_fee_per_gas: U256::from(100_000_000_000u64),
            gas_limit: 21000,
            to: Some(target()),
            value: U256::from(1_000_000_000_000_000_000u128),
            data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
            access_list: vec![],
        });

        let json = original.to_json().unwrap();
        assert!(json.contains("\"type\":\"eip1559\""));
        let recovered = Transaction::from_json(&json).unwrap();

        assert_eq!(original, recovered);
    }

    #[test]
    fn transaction_type_bytes() {
        assert_eq!(TransactionType::try_from(2).unwrap(), TransactionType::FeeMarket);
        assert!(matches!(
            TransactionType::try_from(3),
            Err(Error::UnsupportedTransactionType(3))
        ));
        assert!(!TransactionType::Legacy.is_typed());
    }
}
