//! Ledger Ethereum Signer Core Library
//!
//! This crate talks to a Ledger hardware wallet running the Ethereum app to
//! derive addresses and sign transactions, personal messages and EIP-712
//! typed data. Private keys never leave the device.
//!
//! # Overview
//!
//! This library provides:
//!
//! - **Paths**: BIP32 derivation path parsing and encoding
//! - **APDU**: Command templates and response parsing for the Ethereum app
//! - **Chunking**: Splitting large payloads into consecutive frames
//! - **Transactions**: Legacy, EIP-2930 and EIP-1559 RLP encoding and decoding
//! - **Signatures**: Turning the device's recovery byte into `v` or `y_parity`
//! - **Errors**: Translation of device status words into [`Error`] variants
//! - **Sessions**: A caller-owned [`DeviceSession`] over any byte [`Channel`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Transaction  │  Signature   │   Account    │     Path      │
//! │    Codec      │  Recovery    │   Decoding   │    Codec      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      Device Layer                           │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────────────┐ │
//! │  │ Status  │  │  APDU   │  │ Chunked │  │     Session     │ │
//! │  │  Words  │  │ Builder │  │ Transfer│  │                 │ │
//! │  └─────────┘  └─────────┘  └─────────┘  └─────────────────┘ │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 Channel (USB HID / mock)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Building a Transaction
//!
//! ```rust
//! use ledgereth_core::{Transaction, TransactionRequest, TransactionType};
//!
//! let tx = TransactionRequest::from_json(r#"{
//!     "to": "0xf0155486a14539f784739be1c02e93f28eb8e960",
//!     "value": "0x16345785d8a0000",
//!     "gas": 1000000,
//!     "gasPrice": "0x3b9aca00",
//!     "nonce": 0,
//!     "chainId": 1
//! }"#)
//! .unwrap()
//! .build()
//! .unwrap();
//!
//! assert_eq!(tx.transaction_type(), TransactionType::Legacy);
//! let unsigned = tx.encode_unsigned();
//! assert_eq!(Transaction::decode(&unsigned).unwrap(), tx);
//! ```
//!
//! ## Derivation Paths
//!
//! ```rust
//! use ledgereth_core::DerivationPath;
//!
//! let path: DerivationPath = "44'/60'/0'/0/0".parse().unwrap();
//! assert_eq!(path.encode().len(), 20);
//! assert!("m/44'/60'/0'/0/0".parse::<DerivationPath>().is_err());
//! ```
//!
//! ## Signing
//!
//! ```ignore
//! use ledgereth_core::device::{DeviceSession, HidChannel};
//!
//! let mut session = DeviceSession::new(HidChannel::opener);
//! let signed = session.sign_transaction(&tx, None)?;
//! println!("{}", signed.to_hex());
//! ```
//!
//! # Feature Flags
//!
//! - `hid`: [`device::HidChannel`], a USB HID channel built on
//!   `ledger-transport-hid`
//!
//! # Logging
//!
//! Every frame is logged at `debug` level and every operation at `info`
//! through [`tracing`]. No subscriber is installed by this crate.

// Modules
pub mod account;
pub mod apdu;
pub mod chunk;
pub mod config;
pub mod device;
pub mod error;
pub mod path;
pub mod signature;
pub mod transaction;

// Re-exports for convenience
pub use account::{AddressResponse, LedgerAccount};
pub use apdu::{ApduCommand, ApduResponse, Command};
pub use config::Config;
pub use device::{Channel, ChannelOpener, DeviceSession, FirmwareVersion};
pub use error::{Error, Result, StatusWord, translate_status_word};
pub use path::DerivationPath;
pub use signature::{Signature, SignedMessage, SignedTypedMessage};
pub use transaction::{
    AccessListEntry, AccessListTransaction, FeeMarketTransaction, LegacyTransaction,
    SignedTransaction, Transaction, TransactionRequest, TransactionType,
};

// Re-export commonly used alloy types
pub use alloy_primitives::{Address, B256, Bytes, U256};
