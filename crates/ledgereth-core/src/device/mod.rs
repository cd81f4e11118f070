//! Communication with a device running the Ethereum app.
//!
//! This module sits on top of an opaque byte [`Channel`] and provides:
//!
//! - the firmware gate ([`verify_compatibility`])
//! - the four device operations as free functions over a borrowed channel
//! - [`DeviceSession`], which owns a channel and caches the firmware check
//!
//! # Channel Abstraction
//!
//! A [`Channel`] moves raw APDU frames. Its answer is the response data
//! followed by the two status word bytes. The USB HID implementation lives in the
//! `hid` module behind the `hid` feature. Tests and simulators provide their own.
//!
//! The free functions never cache anything and never close the channel they
//! are given. Each of them validates its input, checks the firmware, and only
//! then sends the request.
//!
//! # Example
//!
//! ```ignore
//! use ledgereth_core::device::{self, Channel};
//! use ledgereth_core::DerivationPath;
//!
//! let mut channel: Box<dyn Channel> = /* ... */;
//! let path = DerivationPath::default_path();
//! let address = device::get_address(channel.as_mut(), &path, false, false)?;
//! ```

pub mod session;

#[cfg(feature = "hid")]
pub mod hid;

pub use session::DeviceSession;

#[cfg(feature = "hid")]
pub use hid::HidChannel;

use std::fmt;

use alloy_primitives::{B256, Bytes};
use tracing::{debug, info};

use crate::account::AddressResponse;
use crate::apdu::{ApduCommand, ApduResponse, Command, P2_CHAIN_CODE};
use crate::chunk::send_framed;
use crate::error::{Error, Result};
use crate::path::DerivationPath;
use crate::signature::{DEVICE_SIGNATURE_LEN, DeviceSignature, SignedMessage, SignedTypedMessage};
use crate::transaction::{SignedTransaction, Transaction};

/// A byte channel to a device.
pub trait Channel {
    /// Sends one APDU frame and waits for the answer.
    ///
    /// May block for as long as the device waits for the user.
    ///
    /// # Arguments
    ///
    /// * `apdu` - The encoded command
    ///
    /// # Returns
    ///
    /// The response data followed by `sw1` and `sw2`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the transport fails.
    fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>>;

    /// Releases the underlying transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to close.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens channels for a [`DeviceSession`].
pub trait ChannelOpener {
    /// Opens a new channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if no device is connected.
    fn open(&self) -> Result<Box<dyn Channel>>;
}

impl<F> ChannelOpener for F
where
    F: Fn() -> Result<Box<dyn Channel>>,
{
    fn open(&self) -> Result<Box<dyn Channel>> {
        self()
    }
}

/// Sends one command and parses the raw answer.
///
/// The status word is not checked.
///
/// # Errors
///
/// - Any error of [`Channel::exchange`]
/// - [`Error::Protocol`] if the answer has no status word
pub fn transmit(channel: &mut dyn Channel, apdu: &ApduCommand) -> Result<ApduResponse> {
    let frame = apdu.to_bytes();
    debug!(apdu = %hex::encode(&frame), "=>");

    let raw = channel.exchange(&frame)?;
    debug!(response = %hex::encode(&raw), "<=");

    ApduResponse::new(raw)
}

/// Ethereum app version from GET_CONFIGURATION.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion {
    /// App flags, such as whether arbitrary data signing is enabled.
    pub flags: u8,

    /// Major version.
    pub major: u8,

    /// Minor version.
    pub minor: u8,

    /// Patch version.
    pub patch: u8,
}

impl FirmwareVersion {
    /// Parses a `[flags, major, minor, patch]` reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeviceResponse`] if the reply is shorter than
    /// 4 bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        match *data {
            [flags, major, minor, patch, ..] => Ok(Self {
                flags,
                major,
                minor,
                patch,
            }),
            _ => Err(Error::InvalidDeviceResponse(format!(
                "configuration has {} bytes, expected 4",
                data.len()
            ))),
        }
    }

    /// Returns `true` for 1.2.4 and later 1.x apps, and for the 9.x.x
    /// version reported by simulators.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.major == 9
            || (self.major == 1 && self.minor >= 2 && (self.minor > 2 || self.patch >= 4))
    }

    /// Returns `true` if the app allows signing arbitrary contract data.
    #[must_use]
    pub const fn arbitrary_data_enabled(&self) -> bool {
        self.flags & 0x01 != 0
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Reads the app version and rejects unsupported ones.
///
/// # Errors
///
/// - [`Error::UnsupportedFirmware`] if the version is not supported
/// - [`Error::InvalidDeviceResponse`] if the reply is malformed
/// - The translated status word if the device rejects the command
pub fn verify_compatibility(channel: &mut dyn Channel) -> Result<FirmwareVersion> {
    let apdu = Command::GetConfiguration.command(None, None, None)?;
    let data = transmit(channel, &apdu)?.into_checked_data()?;
    let version = FirmwareVersion::parse(&data)?;

    if !version.is_supported() {
        return Err(Error::UnsupportedFirmware {
            major: version.major,
            minor: version.minor,
            patch: version.patch,
        });
    }

    debug!(%version, "firmware accepted");
    Ok(version)
}

/// Asks the device for the address at `path`.
///
/// # Arguments
///
/// * `channel` - Open channel to the device
/// * `path` - Derivation path of the account
/// * `confirm` - Show the address on screen and wait for approval
/// * `chain_code` - Also return the BIP32 chain code
///
/// # Errors
///
/// - [`Error::UnsupportedFirmware`] if the app is too old
/// - [`Error::UserCancelled`] if the user rejects the address
/// - [`Error::InvalidDeviceResponse`] if the answer cannot be decoded
pub fn get_address(
    channel: &mut dyn Channel,
    path: &DerivationPath,
    confirm: bool,
    chain_code: bool,
) -> Result<AddressResponse> {
    verify_compatibility(channel)?;
    request_address(channel, path, confirm, chain_code)
}

pub(crate) fn request_address(
    channel: &mut dyn Channel,
    path: &DerivationPath,
    confirm: bool,
    chain_code: bool,
) -> Result<AddressResponse> {
    info!(%path, confirm, chain_code, "requesting address");

    let template = if confirm {
        Command::GetAddressConfirm
    } else {
        Command::GetAddressNoConfirm
    };
    let mut apdu = template.command(Some(&path.to_device_payload()?), None, None)?;
    if chain_code {
        apdu = apdu.with_p2(P2_CHAIN_CODE);
    }

    let data = transmit(channel, &apdu)?.into_checked_data()?;
    AddressResponse::parse(&data, chain_code)
}

/// Signs a transaction with the key at `path`.
///
/// The unsigned encoding is streamed in frames of at most `chunk_size` bytes
/// and the answer is turned into the final `v` (or `y_parity`).
///
/// # Errors
///
/// - [`Error::InvalidTransaction`] if the transaction is out of bounds, before
///   anything is sent
/// - [`Error::UserCancelled`] if the user rejects it
/// - [`Error::InvalidData`] if the app refuses the data, for example when
///   blind signing is disabled
/// - [`Error::InvalidDeviceResponse`] if the signature cannot be decoded
pub fn sign_transaction(
    channel: &mut dyn Channel,
    transaction: &Transaction,
    path: &DerivationPath,
    chunk_size: usize,
) -> Result<SignedTransaction> {
    transaction.validate()?;
    verify_compatibility(channel)?;
    request_transaction_signature(channel, transaction, path, chunk_size)
}

pub(crate) fn request_transaction_signature(
    channel: &mut dyn Channel,
    transaction: &Transaction,
    path: &DerivationPath,
    chunk_size: usize,
) -> Result<SignedTransaction> {
    info!(
        %path,
        tx_type = %transaction.transaction_type(),
        chain_id = ?transaction.chain_id(),
        "signing transaction"
    );

    let body = transaction.encode_unsigned();
    let response = send_framed(
        channel,
        Command::SignTxFirstData,
        Command::SignTxSecondaryData,
        path,
        &body,
        chunk_size,
        DEVICE_SIGNATURE_LEN,
    )?;

    SignedTransaction::from_device_response(transaction.clone(), &response)
}

/// Signs an EIP-191 personal message with the key at `path`.
///
/// The device adds the `\x19Ethereum Signed Message:\n` prefix itself. The
/// returned `v` is the device's byte, untouched.
///
/// # Errors
///
/// - [`Error::PayloadTooLarge`] if the message length does not fit 32 bits
/// - [`Error::UserCancelled`] if the user rejects it
/// - [`Error::InvalidDeviceResponse`] if the signature cannot be decoded
pub fn sign_message(
    channel: &mut dyn Channel,
    message: &[u8],
    path: &DerivationPath,
    chunk_size: usize,
) -> Result<SignedMessage> {
    let body = message_body(message)?;
    verify_compatibility(channel)?;
    request_message_signature(channel, message, &body, path, chunk_size)
}

pub(crate) fn message_body(message: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(message.len()).map_err(|_| Error::PayloadTooLarge {
        len: message.len(),
        max: u32::MAX as usize,
    })?;

    let mut body = Vec::with_capacity(4 + message.len());
    body.extend_from_slice(&len.to_be_bytes());
    body.extend_from_slice(message);
    Ok(body)
}

pub(crate) fn request_message_signature(
    channel: &mut dyn Channel,
    message: &[u8],
    body: &[u8],
    path: &DerivationPath,
    chunk_size: usize,
) -> Result<SignedMessage> {
    info!(%path, len = message.len(), "signing message");

    let response = send_framed(
        channel,
        Command::SignMessageFirstData,
        Command::SignMessageSecondaryData,
        path,
        body,
        chunk_size,
        DEVICE_SIGNATURE_LEN,
    )?;

    Ok(SignedMessage {
        message: Bytes::copy_from_slice(message),
        signature: DeviceSignature::parse(&response)?.into_raw_signature(),
    })
}

/// Signs EIP-712 typed data, given as its two hashes, with the key at `path`.
///
/// # Errors
///
/// - [`Error::UserCancelled`] if the user rejects it
/// - [`Error::InvalidData`] if the app refuses the hashes
/// - [`Error::InvalidDeviceResponse`] if the signature cannot be decoded
pub fn sign_typed_data(
    channel: &mut dyn Channel,
    domain_hash: &B256,
    message_hash: &B256,
    path: &DerivationPath,
) -> Result<SignedTypedMessage> {
    verify_compatibility(channel)?;
    request_typed_data_signature(channel, domain_hash, message_hash, path)
}

pub(crate) fn request_typed_data_signature(
    channel: &mut dyn Channel,
    domain_hash: &B256,
    message_hash: &B256,
    path: &DerivationPath,
) -> Result<SignedTypedMessage> {
    info!(%path, %domain_hash, %message_hash, "signing typed data");

    let mut payload = path.to_device_payload()?;
    payload.extend_from_slice(domain_hash.as_slice());
    payload.extend_from_slice(message_hash.as_slice());

    let apdu = Command::SignTypedData.command(Some(&payload), None, None)?;
    let response = transmit(channel, &apdu)?.into_checked_data()?;

    Ok(SignedTypedMessage {
        domain_hash: *domain_hash,
        message_hash: *message_hash,
        signature: DeviceSignature::parse(&response)?.into_raw_signature(),
    })
}
