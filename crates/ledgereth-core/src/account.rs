//! Accounts derived on the device.
//!
//! The Ethereum app answers GET_ADDRESS with
//! `[pk_len, public_key, addr_len, address_ascii, (chain_code)]`, where the
//! address is hex text without a `0x` prefix and the 32 byte chain code is
//! only present when requested.

use std::fmt;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path::DerivationPath;

/// Length of the chain code appended when requested.
pub const CHAIN_CODE_LEN: usize = 32;

/// A decoded GET_ADDRESS answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressResponse {
    /// Uncompressed secp256k1 public key as sent by the device.
    pub public_key: Vec<u8>,

    /// The account address.
    pub address: Address,

    /// BIP32 chain code, when it was requested.
    pub chain_code: Option<B256>,
}

impl AddressResponse {
    /// Decodes the response data of a GET_ADDRESS command.
    ///
    /// # Arguments
    ///
    /// * `data` - Response data, status word removed
    /// * `with_chain_code` - Whether the command asked for the chain code
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeviceResponse`] if a length prefix runs past
    /// the data or the address is not 40 hex characters.
    pub fn parse(data: &[u8], with_chain_code: bool) -> Result<Self> {
        let (public_key, rest) = take_prefixed(data, "public key")?;
        let (address_text, rest) = take_prefixed(rest, "address")?;

        let address = parse_ascii_address(address_text)?;

        let chain_code = if with_chain_code {
            let code = rest.get(..CHAIN_CODE_LEN).ok_or_else(|| {
                Error::InvalidDeviceResponse(format!(
                    "chain code needs {CHAIN_CODE_LEN} bytes, got {}",
                    rest.len()
                ))
            })?;
            Some(B256::from_slice(code))
        } else {
            None
        };

        Ok(Self {
            public_key: public_key.to_vec(),
            address,
            chain_code,
        })
    }
}

fn take_prefixed<'a>(data: &'a [u8], what: &str) -> Result<(&'a [u8], &'a [u8])> {
    let (&len, rest) = data
        .split_first()
        .ok_or_else(|| Error::InvalidDeviceResponse(format!("missing {what} length")))?;
    let len = usize::from(len);

    if rest.len() < len {
        return Err(Error::InvalidDeviceResponse(format!(
            "{what} needs {len} bytes, got {}",
            rest.len()
        )));
    }

    Ok(rest.split_at(len))
}

fn parse_ascii_address(text: &[u8]) -> Result<Address> {
    let invalid = || {
        Error::InvalidDeviceResponse(format!(
            "address {:?} is not 40 hex characters",
            String::from_utf8_lossy(text)
        ))
    };

    let text = text.strip_prefix(b"0x").unwrap_or(text);
    if text.len() != 40 {
        return Err(invalid());
    }

    let bytes = hex::decode(text).map_err(|_| invalid())?;
    Ok(Address::from_slice(&bytes))
}

/// An account: a derivation path and the address the device derived for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerAccount {
    /// Derivation path of the account.
    pub path: DerivationPath,

    /// Address of the account.
    pub address: Address,
}

impl LedgerAccount {
    /// Creates an account.
    #[must_use]
    pub const fn new(path: DerivationPath, address: Address) -> Self {
        Self { path, address }
    }

    /// Returns the EIP-55 checksummed address.
    ///
    /// # Example
    ///
    /// ```
    /// use alloy_primitives::address;
    /// use ledgereth_core::{DerivationPath, LedgerAccount};
    ///
    /// let account = LedgerAccount::new(
    ///     DerivationPath::default_path(),
    ///     address!("f0155486a14539f784739be1c02e93f28eb8e960"),
    /// );
    /// assert_eq!(account.checksum_address(), "0xF0155486A14539F784739Be1C02E93F28eB8e960");
    /// ```
    #[must_use]
    pub fn checksum_address(&self) -> String {
        self.address.to_checksum(None)
    }
}

impl fmt::Display for LedgerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.checksum_address(), self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "f0155486a14539f784739be1c02e93f28eb8e960";

    fn response(address: &[u8], chain_code: Option<[u8; 32]>) -> Vec<u8> {
        let mut data = vec![65];
        data.push(0x04);
        data.extend_from_slice(&[0x11; 64]);
        data.push(address.len() as u8);
        data.extend_from_slice(address);
        if let Some(code) = chain_code {
            data.extend_from_slice(&code);
        }
        data
    }

    #[test]
    fn parses_address_response() {
        let parsed = AddressResponse::parse(&response(ADDRESS.as_bytes(), None), false).unwrap();
        assert_eq!(parsed.public_key.len(), 65);
        assert_eq!(parsed.public_key[0], 0x04);
        assert_eq!(parsed.address, Address::from_slice(&hex::decode(ADDRESS).unwrap()));
        assert_eq!(parsed.chain_code, None);
    }

    #[test]
    fn accepts_checksummed_ascii() {
        let text = "F0155486A14539F784739Be1C02E93F28eB8e960";
        let parsed = AddressResponse::parse(&response(text.as_bytes(), None), false).unwrap();
        assert_eq!(parsed.address.to_checksum(None), format!("0x{text}"));
    }

    #[test]
    fn parses_chain_code() {
        let data = response(ADDRESS.as_bytes(), Some([0x22; 32]));
        let parsed = AddressResponse::parse(&data, true).unwrap();
        assert_eq!(parsed.chain_code, Some(B256::repeat_byte(0x22)));
    }

    #[test]
    fn missing_chain_code() {
        let data = response(ADDRESS.as_bytes(), None);
        assert!(matches!(
            AddressResponse::parse(&data, true),
            Err(Error::InvalidDeviceResponse(_))
        ));
    }

    #[test]
    fn truncated_response() {
        let data = response(ADDRESS.as_bytes(), None);
        for len in [0, 1, 40, data.len() - 1] {
            assert!(
                AddressResponse::parse(&data[..len], false).is_err(),
                "len {len}"
            );
        }
    }

    #[test]
    fn rejects_non_hex_address() {
        let text = "zz155486a14539f784739be1c02e93f28eb8e960";
        assert!(AddressResponse::parse(&response(text.as_bytes(), None), false).is_err());
    }

    #[test]
    fn account_display_and_serde() {
        let account = LedgerAccount::new(
            DerivationPath::default_path(),
            Address::from_slice(&hex::decode(ADDRESS).unwrap()),
        );
        assert_eq!(
            account.to_string(),
            "0xF0155486A14539F784739Be1C02E93F28eB8e960 (44'/60'/0'/0/0)"
        );

        let json = serde_json::to_string(&account).unwrap();
        assert!(json.contains("\"44'/60'/0'/0/0\""));
        let back: LedgerAccount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
    }
}
