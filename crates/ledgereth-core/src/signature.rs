//! Ethereum secp256k1 signatures and `v` recovery.
//!
//! The Ethereum app answers every signing request with
//! `[recovery(1), r(32), s(32)]`. The recovery byte is not always the final
//! `v`:
//!
//! - Legacy transactions without a chain ID use the classic `27`/`28`.
//! - EIP-155 transactions use `v = chain_id * 2 + 35 + parity`. The app only
//!   has one byte, so for large chain IDs it returns `v mod 256` and the
//!   parity has to be recovered on the host.
//! - Typed (EIP-2930, EIP-1559) transactions use `y_parity` (`0` or `1`).
//!
//! # Example
//!
//! ```
//! use ledgereth_core::signature::recover_v;
//! use ledgereth_core::transaction::TransactionType;
//!
//! // chain 1: base 37, the byte is v itself
//! assert_eq!(recover_v(TransactionType::Legacy, Some(1), 38).unwrap(), 38);
//!
//! // chain 1337: base 2709, the app sends (2709 + 1) mod 256
//! assert_eq!(recover_v(TransactionType::Legacy, Some(1337), 150).unwrap(), 2710);
//! ```

use core::fmt;

use alloy_primitives::{B256, Bytes, U256, eip191_hash_message, keccak256};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transaction::TransactionType;

/// Length of a device signature response, `[recovery, r, s]`.
pub const DEVICE_SIGNATURE_LEN: usize = 65;

/// An Ethereum ECDSA signature.
///
/// `v` is the classic or EIP-155 value for legacy transactions and personal
/// messages, and the `y_parity` for typed transactions.
///
/// # Wire Format
///
/// [`to_bytes`](Self::to_bytes) encodes `r (32 bytes) || s (32 bytes) || v`
/// with `v` in minimal big-endian form, which is the usual 65 bytes for any
/// `v` below 256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// The recovery value.
    pub v: u64,

    /// The R component of the signature.
    pub r: U256,

    /// The S component of the signature.
    pub s: U256,
}

impl Signature {
    /// Creates a new signature from its components.
    #[must_use]
    pub const fn new(v: u64, r: U256, s: U256) -> Self {
        Self { v, r, s }
    }

    /// Returns the y-parity bit encoded in `v`.
    ///
    /// Accepts `0`/`1`, `27`/`28` and EIP-155 values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] for `v` in `2..=26` or `29..=34`.
    pub fn parity(&self) -> Result<u8> {
        match self.v {
            0 | 1 => Ok(self.v as u8),
            27 | 28 => Ok((self.v - 27) as u8),
            v if v >= 35 => Ok(((v - 35) % 2) as u8),
            v => Err(Error::InvalidSignature(format!("v {v} encodes no parity"))),
        }
    }

    /// Returns the EIP-155 `v` of this signature for `chain_id`.
    ///
    /// Lets a typed transaction signature be expressed the legacy way, e.g.
    /// `y_parity` 0 on chain 1 gives 37.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSignature`] if `v` encodes no parity
    /// - [`Error::InvalidTransaction`] if `chain_id` is too large to form a `v`
    pub fn legacy_v(&self, chain_id: u64) -> Result<u64> {
        let parity = u64::from(self.parity()?);
        chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + parity))
            .ok_or_else(|| Error::InvalidTransaction(format!("chain_id {chain_id} is too large")))
    }

    /// Serializes the signature as `r || s || v`.
    ///
    /// # Example
    ///
    /// ```
    /// use alloy_primitives::U256;
    /// use ledgereth_core::Signature;
    ///
    /// let sig = Signature::new(27, U256::from(1), U256::from(2));
    /// let bytes = sig.to_bytes();
    /// assert_eq!(bytes.len(), 65);
    /// assert_eq!(bytes[64], 27);
    /// ```
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(DEVICE_SIGNATURE_LEN);
        bytes.extend_from_slice(&self.r.to_be_bytes::<32>());
        bytes.extend_from_slice(&self.s.to_be_bytes::<32>());

        let v = self.v.to_be_bytes();
        let start = v.iter().position(|&b| b != 0).unwrap_or(v.len() - 1);
        bytes.extend_from_slice(&v[start..]);
        bytes
    }

    /// Parses `r || s || v`, with `v` of one to eight bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if the input is shorter than 65
    /// or longer than 72 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if !(65..=72).contains(&bytes.len()) {
            return Err(Error::InvalidSignature(format!(
                "expected 65 to 72 bytes, got {}",
                bytes.len()
            )));
        }

        let r = U256::from_be_slice(&bytes[0..32]);
        let s = U256::from_be_slice(&bytes[32..64]);
        let v = bytes[64..]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));

        Ok(Self { v, r, s })
    }

    /// Encodes the signature as a hex string with `0x` prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Parses a signature from a hex string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HexDecodeFailed`] if the hex string is invalid, or
    /// [`Error::InvalidSignature`] if the decoded bytes have the wrong length.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The raw `[recovery, r, s]` answer of a signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSignature {
    /// Recovery byte as sent by the device.
    pub recovery: u8,

    /// The R component.
    pub r: U256,

    /// The S component.
    pub s: U256,
}

impl DeviceSignature {
    /// Parses a device signature response. Bytes past the first 65 are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeviceResponse`] if the response is shorter
    /// than 65 bytes.
    pub fn parse(response: &[u8]) -> Result<Self> {
        if response.len() < DEVICE_SIGNATURE_LEN {
            return Err(Error::InvalidDeviceResponse(format!(
                "signature response has {} bytes, expected {DEVICE_SIGNATURE_LEN}",
                response.len()
            )));
        }

        Ok(Self {
            recovery: response[0],
            r: U256::from_be_slice(&response[1..33]),
            s: U256::from_be_slice(&response[33..65]),
        })
    }

    /// A signature keeping the recovery byte as `v`, as used for messages.
    #[must_use]
    pub fn into_raw_signature(self) -> Signature {
        Signature::new(u64::from(self.recovery), self.r, self.s)
    }
}

/// Recovers the final `v` (or `y_parity`) from a device recovery byte.
///
/// # Errors
///
/// Returns [`Error::InvalidDeviceResponse`] if the byte does not encode a
/// parity of 0 or 1 for the given transaction, or
/// [`Error::InvalidTransaction`] if `chain_id` is too large to form a `v`.
pub fn recover_v(tx_type: TransactionType, chain_id: Option<u64>, recovery: u8) -> Result<u64> {
    match (tx_type, chain_id) {
        (TransactionType::Legacy, None) => match recovery {
            0 | 1 => Ok(u64::from(recovery) + 27),
            27 | 28 => Ok(u64::from(recovery)),
            other => Err(Error::InvalidDeviceResponse(format!(
                "recovery byte {other} is not a classic v"
            ))),
        },
        (TransactionType::Legacy, Some(chain_id)) => {
            let base = chain_id
                .checked_mul(2)
                .and_then(|v| v.checked_add(35))
                .filter(|base| *base < u64::MAX)
                .ok_or_else(|| {
                    Error::InvalidTransaction(format!("chain_id {chain_id} is too large"))
                })?;

            if base + 1 > 255 {
                let parity = recovery.wrapping_sub((base % 256) as u8);
                if parity > 1 {
                    return Err(Error::InvalidDeviceResponse(format!(
                        "recovery byte {recovery} does not match chain {chain_id}"
                    )));
                }
                Ok(base + u64::from(parity))
            } else {
                let v = u64::from(recovery);
                if v != base && v != base + 1 {
                    return Err(Error::InvalidDeviceResponse(format!(
                        "v {v} does not match chain {chain_id}"
                    )));
                }
                Ok(v)
            }
        }
        (TransactionType::AccessList | TransactionType::FeeMarket, _) => match recovery {
            0 | 1 => Ok(u64::from(recovery)),
            other => Err(Error::InvalidDeviceResponse(format!(
                "y_parity must be 0 or 1, got {other}"
            ))),
        },
    }
}

/// A signed EIP-191 personal message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    /// The message as signed.
    pub message: Bytes,

    /// Signature, with `v` as returned by the device.
    pub signature: Signature,
}

impl SignedMessage {
    /// The EIP-191 hash the device signed.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        eip191_hash_message(&self.message)
    }
}

/// A signed EIP-712 message, identified by its two hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTypedMessage {
    /// EIP-712 domain separator hash.
    pub domain_hash: B256,

    /// EIP-712 struct hash of the message.
    pub message_hash: B256,

    /// Signature, with `v` as returned by the device.
    pub signature: Signature,
}

impl SignedTypedMessage {
    /// `keccak256(0x19 || 0x01 || domain_hash || message_hash)`
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        let mut buf = [0u8; 66];
        buf[0] = 0x19;
        buf[1] = 0x01;
        buf[2..34].copy_from_slice(self.domain_hash.as_slice());
        buf[34..66].copy_from_slice(self.message_hash.as_slice());
        keccak256(buf)
    }
}
