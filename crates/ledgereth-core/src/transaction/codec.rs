//! RLP helpers and the raw transaction decoder.

use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{Decodable, Encodable, Header};

use super::{
    AccessListEntry, AccessListTransaction, FeeMarketTransaction, LegacyTransaction,
    SignedTransaction, Transaction, TransactionType,
};
use crate::error::{Error, Result};
use crate::signature::Signature;

/// A decoded raw transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// An unsigned transaction, as sent to the device.
    Unsigned(Transaction),
    /// A signed transaction, as broadcast to the network.
    Signed(SignedTransaction),
}

/// Decodes a raw transaction.
///
/// The first byte selects the type: `>= 0xc0` is a legacy RLP list, `0x01`
/// and `0x02` are EIP-2718 typed envelopes.
///
/// Unsigned legacy input may carry the six pre-EIP-155 fields or the nine
/// EIP-155 fields (with zero placeholders). Signed legacy input derives the
/// chain ID back from `v`.
///
/// # Errors
///
/// - [`Error::UnsupportedTransactionType`] for any other leading byte
/// - [`Error::InvalidTransactionEncoding`] if the fields do not match the
///   schema of the type, integers are not canonical, or bytes trail the
///   transaction
pub fn decode(raw: &[u8], signed: bool) -> Result<Decoded> {
    let (tx_type, mut body) = match raw.first() {
        None => {
            return Err(Error::InvalidTransactionEncoding(
                "empty transaction".to_string(),
            ));
        }
        Some(&b) if b >= 0xc0 => (TransactionType::Legacy, raw),
        Some(&b) if b == AccessListTransaction::TX_TYPE || b == FeeMarketTransaction::TX_TYPE => {
            (TransactionType::try_from(b)?, &raw[1..])
        }
        Some(&b) => return Err(Error::UnsupportedTransactionType(b)),
    };

    let decoded = decode_list(&mut body, |fields| {
        let tx = match tx_type {
            TransactionType::Legacy => Transaction::Legacy(decode_legacy(fields)?),
            TransactionType::AccessList => Transaction::AccessList(decode_access_list(fields)?),
            TransactionType::FeeMarket => Transaction::FeeMarket(decode_fee_market(fields)?),
        };

        if !signed {
            let tx = match tx {
                Transaction::Legacy(mut legacy) => {
                    legacy.chain_id = decode_eip155_placeholders(fields)?;
                    Transaction::Legacy(legacy)
                }
                typed => typed,
            };
            return Ok(Decoded::Unsigned(tx));
        }

        let v = decode_u64(fields, "v")?;
        let r = decode_uint(fields, "r")?;
        let s = decode_uint(fields, "s")?;

        let tx = match tx {
            Transaction::Legacy(mut legacy) => {
                legacy.chain_id = chain_id_from_v(v)?;
                Transaction::Legacy(legacy)
            }
            typed => {
                if v > 1 {
                    return Err(Error::InvalidTransactionEncoding(format!(
                        "y_parity must be 0 or 1, got {v}"
                    )));
                }
                typed
            }
        };

        Ok(Decoded::Signed(SignedTransaction {
            transaction: tx,
            signature: Signature { v, r, s },
        }))
    })?;

    if !body.is_empty() {
        return Err(Error::InvalidTransactionEncoding(format!(
            "{} trailing bytes after transaction",
            body.len()
        )));
    }

    Ok(decoded)
}

fn decode_legacy(fields: &mut &[u8]) -> Result<LegacyTransaction> {
    Ok(LegacyTransaction {
        chain_id: None,
        nonce: decode_u64(fields, "nonce")?,
        gas_price: decode_uint(fields, "gas_price")?,
        gas_limit: decode_u64(fields, "gas_limit")?,
        to: decode_optional_address(fields)?,
        value: decode_uint(fields, "value")?,
        data: decode_data(fields)?,
    })
}

fn decode_access_list(fields: &mut &[u8]) -> Result<AccessListTransaction> {
    Ok(AccessListTransaction {
        chain_id: decode_u64(fields, "chain_id")?,
        nonce: decode_u64(fields, "nonce")?,
        gas_price: decode_uint(fields, "gas_price")?,
        gas_limit: decode_u64(fields, "gas_limit")?,
        to: decode_optional_address(fields)?,
        value: decode_uint(fields, "value")?,
        data: decode_data(fields)?,
        access_list: Vec::<AccessListEntry>::decode(fields)?,
    })
}

fn decode_fee_market(fields: &mut &[u8]) -> Result<FeeMarketTransaction> {
    Ok(FeeMarketTransaction {
        chain_id: decode_u64(fields, "chain_id")?,
        nonce: decode_u64(fields, "nonce")?,
        max_priority_fee_per_gas: decode_uint(fields, "max_priority_fee_per_gas")?,
        max_fee_per_gas: decode_uint(fields, "max_fee_per_gas")?,
        gas_limit: decode_u64(fields, "gas_limit")?,
        to: decode_optional_address(fields)?,
        value: decode_uint(fields, "value")?,
        data: decode_data(fields)?,
        access_list: Vec::<AccessListEntry>::decode(fields)?,
    })
}

/// Reads the optional `[chain_id, 0, 0]` tail of an unsigned legacy
/// transaction.
fn decode_eip155_placeholders(fields: &mut &[u8]) -> Result<Option<u64>> {
    if fields.is_empty() {
        return Ok(None);
    }

    let chain_id = decode_u64(fields, "chain_id")?;
    let zero_r = decode_uint(fields, "r placeholder")?;
    let zero_s = decode_uint(fields, "s placeholder")?;
    if !zero_r.is_zero() || !zero_s.is_zero() {
        return Err(Error::InvalidTransactionEncoding(
            "EIP-155 placeholders must be zero".to_string(),
        ));
    }

    Ok(Some(chain_id))
}

/// Inverts `v = chain_id * 2 + 35 + parity`; classic `27`/`28` has no chain
/// ID.
fn chain_id_from_v(v: u64) -> Result<Option<u64>> {
    match v {
        27 | 28 => Ok(None),
        v if v >= 35 => Ok(Some((v - 35) / 2)),
        v => Err(Error::InvalidTransactionEncoding(format!(
            "invalid legacy signature v {v}"
        ))),
    }
}

/// Encodes an RLP list using a closure to write elements.
pub(crate) fn encode_rlp_list<F>(out: &mut Vec<u8>, f: F)
where
    F: FnOnce(&mut Vec<u8>),
{
    let mut content = Vec::new();
    f(&mut content);

    let header = Header {
        list: true,
        payload_length: content.len(),
    };
    header.encode(out);
    out.extend_from_slice(&content);
}

/// Encodes an optional address, the empty string for contract creation.
pub(crate) fn encode_optional_address(addr: Option<&Address>, out: &mut Vec<u8>) {
    match addr {
        Some(a) => a.encode(out),
        None => out.push(alloy_rlp::EMPTY_STRING_CODE),
    }
}

/// Decodes one list from the front of `buf`, handing its payload to `f`.
///
/// `f` must consume every field of the payload.
fn decode_list<T, F>(buf: &mut &[u8], f: F) -> Result<T>
where
    F: FnOnce(&mut &[u8]) -> Result<T>,
{
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(Error::InvalidTransactionEncoding(
            "expected a list of fields".to_string(),
        ));
    }
    if header.payload_length > buf.len() {
        return Err(Error::InvalidTransactionEncoding(
            "list is longer than the input".to_string(),
        ));
    }

    let input: &[u8] = *buf;
    let (mut payload, rest) = input.split_at(header.payload_length);
    let value = f(&mut payload)?;
    if !payload.is_empty() {
        return Err(Error::InvalidTransactionEncoding(
            "unexpected extra fields".to_string(),
        ));
    }

    *buf = rest;
    Ok(value)
}

/// Decodes a canonical big-endian integer of at most 32 bytes.
fn decode_uint(buf: &mut &[u8], field: &str) -> Result<U256> {
    if buf.is_empty() {
        return Err(Error::InvalidTransactionEncoding(format!(
            "missing field {field}"
        )));
    }

    let bytes = Header::decode_bytes(buf, false)
        .map_err(|e| Error::InvalidTransactionEncoding(format!("{field}: {e}")))?;

    if bytes.first() == Some(&0) {
        return Err(Error::InvalidTransactionEncoding(format!(
            "{field} is not a canonical integer"
        )));
    }
    if bytes.len() > 32 {
        return Err(Error::InvalidTransactionEncoding(format!(
            "{field} is wider than 256 bits"
        )));
    }

    Ok(U256::from_be_slice(bytes))
}

fn decode_u64(buf: &mut &[u8], field: &str) -> Result<u64> {
    let value = decode_uint(buf, field)?;
    u64::try_from(value)
        .map_err(|_| Error::InvalidTransactionEncoding(format!("{field} does not fit in 64 bits")))
}

fn decode_optional_address(buf: &mut &[u8]) -> Result<Option<Address>> {
    let bytes = Header::decode_bytes(buf, false)
        .map_err(|e| Error::InvalidTransactionEncoding(format!("to: {e}")))?;

    match bytes.len() {
        0 => Ok(None),
        20 => Ok(Some(Address::from_slice(bytes))),
        n => Err(Error::InvalidTransactionEncoding(format!(
            "to must be 0 or 20 bytes, got {n}"
        ))),
    }
}

fn decode_data(buf: &mut &[u8]) -> Result<Bytes> {
    let bytes = Header::decode_bytes(buf, false)
        .map_err(|e| Error::InvalidTransactionEncoding(format!("data: {e}")))?;
    Ok(Bytes::copy_from_slice(bytes))
}
