//! Signed transactions.

use alloy_primitives::{B256, keccak256};
use alloy_rlp::Encodable;
use serde::{Deserialize, Serialize};

use super::codec::{Decoded, decode, encode_rlp_list};
use super::{AccessListTransaction, FeeMarketTransaction, Transaction};
use crate::error::{Error, Result};
use crate::signature::{DeviceSignature, Signature, recover_v};

/// A transaction with its signature, ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// The unsigned transaction.
    pub transaction: Transaction,

    /// The signature. `v` is the EIP-155 or classic value for legacy
    /// transactions and the `y_parity` for typed ones.
    pub signature: Signature,
}

impl SignedTransaction {
    /// Assembles a signed transaction from the device's
    /// `[recovery, r, s]` answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeviceResponse`] if the response is short or
    /// its recovery byte does not fit the transaction.
    pub fn from_device_response(transaction: Transaction, response: &[u8]) -> Result<Self> {
        let device = DeviceSignature::parse(response)?;
        let v = recover_v(
            transaction.transaction_type(),
            transaction.chain_id(),
            device.recovery,
        )?;

        Ok(Self {
            transaction,
            signature: Signature::new(v, device.r, device.s),
        })
    }

    /// Encodes the signed transaction as broadcast to the network.
    ///
    /// Legacy: `rlp([nonce, gasPrice, gasLimit, to, value, data, v, r, s])`.
    /// Typed: the type byte, then the unsigned fields followed by
    /// `y_parity, r, s`.
    #[must_use]
    pub fn raw_transaction(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);

        match &self.transaction {
            Transaction::Legacy(tx) => {
                encode_rlp_list(&mut buf, |buf| {
                    tx.encode_fields(buf);
                    self.encode_signature(buf);
                });
            }
            Transaction::AccessList(tx) => {
                buf.push(AccessListTransaction::TX_TYPE);
                encode_rlp_list(&mut buf, |buf| {
                    tx.encode_fields(buf);
                    self.encode_signature(buf);
                });
            }
            Transaction::FeeMarket(tx) => {
                buf.push(FeeMarketTransaction::TX_TYPE);
                encode_rlp_list(&mut buf, |buf| {
                    tx.encode_fields(buf);
                    self.encode_signature(buf);
                });
            }
        }

        buf
    }

    fn encode_signature(&self, out: &mut Vec<u8>) {
        self.signature.v.encode(out);
        self.signature.r.encode(out);
        self.signature.s.encode(out);
    }

    /// Returns the raw transaction as a `0x` prefixed hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.raw_transaction()))
    }

    /// Returns the transaction hash: keccak-256 of the raw transaction.
    #[must_use]
    pub fn hash(&self) -> B256 {
        keccak256(self.raw_transaction())
    }

    /// Decodes a signed raw transaction.
    ///
    /// # Errors
    ///
    /// See [`decode`].
    pub fn decode(raw: &[u8]) -> Result<Self> {
        match decode(raw, true)? {
            Decoded::Signed(signed) => Ok(signed),
            Decoded::Unsigned(_) => Err(Error::InvalidTransactionEncoding(
                "expected a signed transaction".to_string(),
            )),
        }
    }

    /// Decodes a signed raw transaction from hex, with or without `0x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HexDecodeFailed`] for invalid hex, otherwise see
    /// [`decode`].
    pub fn from_hex(raw: &str) -> Result<Self> {
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        Self::decode(&hex::decode(raw)?)
    }
}
