//! APDU (Application Protocol Data Unit) command and response types.
//!
//! This module provides the ISO 7816-4 frames spoken by the Ethereum app on a
//! Ledger device, and the named command templates used by the rest of the
//! crate.
//!
//! # APDU Command Structure
//!
//! ```text
//! | CLA | INS | P1 | P2 | Lc | Data | Le |
//! |-----|-----|----|----|----|------|----|
//! | 1B  | 1B  | 1B | 1B | 1B | Var  | 1B |
//! ```
//!
//! Only short frames are used: `Data` never exceeds 255 bytes, larger payloads
//! are split by [`crate::chunk`].
//!
//! # APDU Response Structure
//!
//! ```text
//! | Data | SW1 | SW2 |
//! |------|-----|-----|
//! | Var  | 1B  | 1B  |
//! ```
//!
//! # Example
//!
//! ```
//! use ledgereth_core::apdu::Command;
//!
//! let frame = Command::SignTxFirstData.build(Some(&[0x01, 0x02]), None, None).unwrap();
//! assert_eq!(frame, vec![0xE0, 0x04, 0x00, 0x00, 0x02, 0x01, 0x02]);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result, translate_status_word};

/// Class byte of every Ethereum app command.
pub const CLA: u8 = 0xE0;

/// Maximum data length of a short APDU.
pub const MAX_DATA_LEN: usize = 255;

/// Instruction bytes understood by the Ethereum app.
pub mod ins {
    /// Get the public key and address for a path.
    pub const GET_ADDRESS: u8 = 0x02;
    /// Sign a transaction.
    pub const SIGN_TX: u8 = 0x04;
    /// Get the app configuration and version.
    pub const GET_CONFIGURATION: u8 = 0x06;
    /// Sign an EIP-191 personal message.
    pub const SIGN_MESSAGE: u8 = 0x08;
    /// Sign EIP-712 hashed typed data.
    pub const SIGN_TYPED_DATA: u8 = 0x0C;
}

/// `P1` of the first frame of a chunked payload.
pub const P1_FIRST_CHUNK: u8 = 0x00;

/// `P1` of every following frame.
pub const P1_SUBSEQUENT_CHUNK: u8 = 0x80;

/// `P1` for GET_ADDRESS: return without confirmation.
pub const P1_NO_CONFIRM: u8 = 0x00;

/// `P1` for GET_ADDRESS: show the address and wait for confirmation.
pub const P1_CONFIRM: u8 = 0x01;

/// `P2` for GET_ADDRESS: request the chain code as well.
pub const P2_CHAIN_CODE: u8 = 0x01;

/// Device payload of the default path `44'/60'/0'/0/0`.
const DEFAULT_PATH_PAYLOAD: [u8; 21] = [
    0x05, 0x80, 0x00, 0x00, 0x2C, 0x80, 0x00, 0x00, 0x3C, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// An APDU command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    /// Class byte.
    cla: u8,

    /// Instruction byte.
    ins: u8,

    /// Parameter 1.
    p1: u8,

    /// Parameter 2.
    p2: u8,

    /// Length byte. Equals `data.len()` unless overridden.
    lc: u8,

    /// Command data.
    data: Vec<u8>,

    /// Expected response length.
    le: Option<u8>,
}

impl ApduCommand {
    /// Creates a new APDU command.
    ///
    /// # Arguments
    ///
    /// * `ins` - Instruction byte
    /// * `p1` - Parameter 1
    /// * `p2` - Parameter 2
    /// * `data` - Command data
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if `data` is longer than
    /// [`MAX_DATA_LEN`].
    pub fn new(ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Result<Self> {
        if data.len() > MAX_DATA_LEN {
            return Err(Error::PayloadTooLarge {
                len: data.len(),
                max: MAX_DATA_LEN,
            });
        }

        Ok(Self {
            cla: CLA,
            ins,
            p1,
            p2,
            lc: data.len() as u8,
            data,
            le: None,
        })
    }

    /// Sets the expected response length.
    #[must_use]
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Replaces parameter 2.
    #[must_use]
    pub const fn with_p2(mut self, p2: u8) -> Self {
        self.p2 = p2;
        self
    }

    /// Replaces the length byte.
    #[must_use]
    pub const fn with_lc(mut self, lc: u8) -> Self {
        self.lc = lc;
        self
    }

    /// Returns the class byte.
    #[must_use]
    pub const fn cla(&self) -> u8 {
        self.cla
    }

    /// Returns the instruction byte.
    #[must_use]
    pub const fn ins(&self) -> u8 {
        self.ins
    }

    /// Returns parameter 1.
    #[must_use]
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Returns parameter 2.
    #[must_use]
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Returns the length byte.
    #[must_use]
    pub const fn lc(&self) -> u8 {
        self.lc
    }

    /// Returns the command data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the expected response length.
    #[must_use]
    pub const fn le(&self) -> Option<u8> {
        self.le
    }

    /// Serializes the APDU to bytes.
    ///
    /// The length byte is always emitted, as a lone `0x00` when there is no
    /// data. `Le` follows only when set.
    ///
    /// # Example
    ///
    /// ```
    /// use ledgereth_core::apdu::{ApduCommand, ins};
    ///
    /// let apdu = ApduCommand::new(ins::GET_CONFIGURATION, 0, 0, vec![]).unwrap().with_le(4);
    /// assert_eq!(apdu.to_bytes(), vec![0xE0, 0x06, 0x00, 0x00, 0x00, 0x04]);
    /// ```
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(6 + self.data.len());

        bytes.push(self.cla);
        bytes.push(self.ins);
        bytes.push(self.p1);
        bytes.push(self.p2);
        bytes.push(self.lc);
        bytes.extend_from_slice(&self.data);

        if let Some(le) = self.le {
            bytes.push(le);
        }

        bytes
    }
}

/// Named command templates of the Ethereum app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `GET_CONFIGURATION`: 4 byte reply `[flags, major, minor, patch]`.
    GetConfiguration,
    /// `GET_DEFAULT_ADDRESS_NO_CONFIRM`: address of `44'/60'/0'/0/0`.
    GetDefaultAddressNoConfirm,
    /// `GET_ADDRESS_NO_CONFIRM`
    GetAddressNoConfirm,
    /// `GET_ADDRESS_CONFIRM`
    GetAddressConfirm,
    /// `SIGN_TX_FIRST_DATA`
    SignTxFirstData,
    /// `SIGN_TX_SECONDARY_DATA`
    SignTxSecondaryData,
    /// `SIGN_MESSAGE_FIRST_DATA`
    SignMessageFirstData,
    /// `SIGN_MESSAGE_SECONDARY_DATA`
    SignMessageSecondaryData,
    /// `SIGN_TYPED_DATA`
    SignTypedData,
}

impl Command {
    /// Every template, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::GetConfiguration,
        Self::GetDefaultAddressNoConfirm,
        Self::GetAddressNoConfirm,
        Self::GetAddressConfirm,
        Self::SignTxFirstData,
        Self::SignTxSecondaryData,
        Self::SignMessageFirstData,
        Self::SignMessageSecondaryData,
        Self::SignTypedData,
    ];

    /// The protocol name of the template.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetConfiguration => "GET_CONFIGURATION",
            Self::GetDefaultAddressNoConfirm => "GET_DEFAULT_ADDRESS_NO_CONFIRM",
            Self::GetAddressNoConfirm => "GET_ADDRESS_NO_CONFIRM",
            Self::GetAddressConfirm => "GET_ADDRESS_CONFIRM",
            Self::SignTxFirstData => "SIGN_TX_FIRST_DATA",
            Self::SignTxSecondaryData => "SIGN_TX_SECONDARY_DATA",
            Self::SignMessageFirstData => "SIGN_MESSAGE_FIRST_DATA",
            Self::SignMessageSecondaryData => "SIGN_MESSAGE_SECONDARY_DATA",
            Self::SignTypedData => "SIGN_TYPED_DATA",
        }
    }

    /// `(INS, P1, P2)` of the template.
    #[must_use]
    pub const fn header(self) -> (u8, u8, u8) {
        match self {
            Self::GetConfiguration => (ins::GET_CONFIGURATION, 0x00, 0x00),
            Self::GetDefaultAddressNoConfirm | Self::GetAddressNoConfirm => {
                (ins::GET_ADDRESS, P1_NO_CONFIRM, 0x00)
            }
            Self::GetAddressConfirm => (ins::GET_ADDRESS, P1_CONFIRM, 0x00),
            Self::SignTxFirstData => (ins::SIGN_TX, P1_FIRST_CHUNK, 0x00),
            Self::SignTxSecondaryData => (ins::SIGN_TX, P1_SUBSEQUENT_CHUNK, 0x00),
            Self::SignMessageFirstData => (ins::SIGN_MESSAGE, P1_FIRST_CHUNK, 0x00),
            Self::SignMessageSecondaryData => (ins::SIGN_MESSAGE, P1_SUBSEQUENT_CHUNK, 0x00),
            Self::SignTypedData => (ins::SIGN_TYPED_DATA, 0x00, 0x00),
        }
    }

    /// Builds the template into an [`ApduCommand`].
    ///
    /// # Arguments
    ///
    /// * `data` - Command data. `None` keeps the payload baked into the
    ///   template, if any.
    /// * `length_override` - Replaces the computed length byte.
    /// * `response_length` - Replaces the template's `Le`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if `data` exceeds [`MAX_DATA_LEN`].
    pub fn command(
        self,
        data: Option<&[u8]>,
        length_override: Option<u8>,
        response_length: Option<u8>,
    ) -> Result<ApduCommand> {
        let (ins, p1, p2) = self.header();

        let payload = match (data, self) {
            (Some(data), _) => data.to_vec(),
            (None, Self::GetDefaultAddressNoConfirm) => DEFAULT_PATH_PAYLOAD.to_vec(),
            (None, _) => Vec::new(),
        };

        let mut apdu = ApduCommand::new(ins, p1, p2, payload)?;

        if let Some(lc) = length_override {
            apdu = apdu.with_lc(lc);
        }

        let le = match self {
            Self::GetConfiguration => response_length.or(Some(4)),
            _ => response_length,
        };
        if let Some(le) = le {
            apdu = apdu.with_le(le);
        }

        Ok(apdu)
    }

    /// Builds the template straight into wire bytes.
    ///
    /// See [`command`](Self::command).
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if `data` exceeds [`MAX_DATA_LEN`].
    pub fn build(
        self,
        data: Option<&[u8]>,
        length_override: Option<u8>,
        response_length: Option<u8>,
    ) -> Result<Vec<u8>> {
        Ok(self
            .command(data, length_override, response_length)?
            .to_bytes())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}

/// An APDU response from the device.
///
/// Contains the response data and status word indicating success or failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data.
    data: Vec<u8>,

    /// Status word 1.
    sw1: u8,

    /// Status word 2.
    sw2: u8,
}

impl ApduResponse {
    /// Success status word (0x9000).
    pub const SW_SUCCESS: u16 = 0x9000;

    /// Creates a new APDU response from raw bytes.
    ///
    /// # Arguments
    ///
    /// * `bytes` - The raw response bytes (data + SW1 + SW2)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the response is less than 2 bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use ledgereth_core::apdu::ApduResponse;
    ///
    /// let response = ApduResponse::new(vec![0x01, 0x02, 0x90, 0x00]).unwrap();
    /// assert!(response.is_success());
    /// assert_eq!(response.data(), &[0x01, 0x02]);
    /// ```
    pub fn new(mut bytes: Vec<u8>) -> Result<Self> {
        let len = bytes.len();
        if len < 2 {
            return Err(Error::Protocol(format!(
                "response of {len} bytes has no status word"
            )));
        }

        let sw2 = bytes[len - 1];
        let sw1 = bytes[len - 2];
        bytes.truncate(len - 2);

        Ok(Self {
            data: bytes,
            sw1,
            sw2,
        })
    }

    /// Returns the response data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the response and returns the data.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns status word 1.
    #[must_use]
    pub const fn sw1(&self) -> u8 {
        self.sw1
    }

    /// Returns status word 2.
    #[must_use]
    pub const fn sw2(&self) -> u8 {
        self.sw2
    }

    /// Returns the full status word as a [`u16`].
    #[must_use]
    pub const fn status_word(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Checks if the response indicates success (`SW = 0x9000`).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_word() == Self::SW_SUCCESS
    }

    /// Checks the response status and returns an error if not successful.
    ///
    /// # Errors
    ///
    /// Returns the translation of the status word, see
    /// [`translate_status_word`].
    pub fn check(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(translate_status_word(self.status_word()))
        }
    }

    /// Checks the status and returns the data.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn into_checked_data(self) -> Result<Vec<u8>> {
        self.check()?;
        Ok(self.data)
    }
}
