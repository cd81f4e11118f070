//! Error types for the Ledger Ethereum signer library.
//!
//! This module provides a single error type [`enum@Error`] covering every
//! failure mode of talking to the Ethereum app on a Ledger device, and the
//! status word translator that turns device status words into it.
//!
//! # Error Categories
//!
//! - **Device conditions**: locked device, closed app, user declined. These are
//!   actionable by the person holding the device, see [`Error::is_actionable`].
//! - **Protocol errors**: malformed frames, short responses, unknown status words
//! - **Construction errors**: bad derivation paths, mixed fee fields, oversized
//!   payloads. These are raised before any byte is sent to the device.
//!
//! # Example
//!
//! ```
//! use ledgereth_core::error::{Error, translate_status_word};
//!
//! let err = translate_status_word(0x6985);
//! assert!(matches!(err, Error::UserCancelled));
//! assert!(err.is_actionable());
//! ```

use alloy_rlp::Error as AlloyRlpError;
use core::result::Result as CoreResult;
use hex::FromHexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// The main error type for the Ledger Ethereum signer library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Device Conditions
    // =========================================================================
    /// No Ledger device was found.
    #[error("unable to find Ledger device")]
    DeviceNotFound,

    /// The device is locked and must be unlocked with its PIN.
    #[error("Ledger appears to be locked, unlock it and retry")]
    DeviceLocked,

    /// The Ethereum app is not open (or the device went to sleep).
    #[error("expected Ledger Ethereum app not open, open it and retry")]
    AppNotOpened,

    /// The user declined the request on the device.
    #[error("action cancelled by the user")]
    UserCancelled,

    /// The device rejected the frame itself (size mismatch, malformed APDU).
    #[error("internal error: invalid data unit sent to Ledger")]
    InvalidApdu,

    /// The device rejected the payload, or blind signing is disabled.
    #[error("invalid data sent to Ledger or \"blind signing\" is not enabled")]
    InvalidData,

    /// The Ethereum app firmware is too old for this library.
    #[error("unsupported Ethereum app version {major}.{minor}.{patch}")]
    UnsupportedFirmware {
        /// Major version reported by the device.
        major: u8,
        /// Minor version reported by the device.
        minor: u8,
        /// Patch version reported by the device.
        patch: u8,
    },

    /// A status word that has no entry in the translation table.
    #[error("unexpected Ledger error: {status_word:#06x} {name}")]
    UnexpectedDeviceError {
        /// The raw status word.
        status_word: u16,
        /// Best-effort symbolic name of the status word.
        name: &'static str,
    },

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// The named APDU command template does not exist.
    #[error("unknown APDU command: {0}")]
    UnknownCommand(String),

    /// A single APDU frame was asked to carry more data than allowed.
    #[error("payload of {len} bytes exceeds the {max} byte APDU limit")]
    PayloadTooLarge {
        /// Length of the offending payload.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// The device answered with a response that cannot be interpreted.
    #[error("invalid response from Ledger: {0}")]
    InvalidDeviceResponse(String),

    /// The channel failed, or the framed exchange did not complete.
    #[error("protocol error: {0}")]
    Protocol(String),

    // =========================================================================
    // Construction Errors
    // =========================================================================
    /// The derivation path string or bytes are not acceptable.
    #[error("malformed BIP32 path: {0}")]
    MalformedPath(String),

    /// The transaction fields are inconsistent or out of range.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// The access list input could not be coerced.
    #[error("invalid access list: {0}")]
    InvalidAccessList(String),

    // =========================================================================
    // Codec Errors
    // =========================================================================
    /// The leading transaction type byte is not supported.
    #[error("unsupported transaction type: {0:#04x}")]
    UnsupportedTransactionType(u8),

    /// The raw transaction does not match the schema of its type.
    #[error("invalid transaction encoding: {0}")]
    InvalidTransactionEncoding(String),

    /// Signature bytes are malformed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Failed to parse hex data.
    #[error("hex decoding failed: {0}")]
    HexDecodeFailed(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(String),
}

impl Error {
    /// Returns `true` for conditions the user resolves on the device itself
    /// (unlock it, open the app, approve again), as opposed to programming
    /// errors in the request.
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound
                | Self::DeviceLocked
                | Self::AppNotOpened
                | Self::UserCancelled
                | Self::InvalidData
                | Self::UnsupportedFirmware { .. }
        )
    }
}

impl From<FromHexError> for Error {
    fn from(err: FromHexError) -> Self {
        Error::HexDecodeFailed(err.to_string())
    }
}

impl From<SerdeJsonError> for Error {
    fn from(err: SerdeJsonError) -> Self {
        Error::JsonError(err.to_string())
    }
}

impl From<AlloyRlpError> for Error {
    fn from(err: AlloyRlpError) -> Self {
        Error::InvalidTransactionEncoding(err.to_string())
    }
}

/// A specialized [`Result`] type for Ledger operations.
pub type Result<T> = CoreResult<T, Error>;

/// Known status words returned by the Ethereum app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusWord {
    /// Success.
    Ok = 0x9000,
    /// The transaction type is not supported by the app.
    TxTypeUnsupported = 0x6501,
    /// Internal app buffer too small for the output.
    OutputBufferTooSmall = 0x6502,
    /// A contract plugin failed.
    PluginError = 0x6503,
    /// Internal integer conversion failure.
    IntConversionError = 0x6504,
    /// Wrong `Lc` for the instruction.
    IncorrectLength = 0x6700,
    /// The app went to sleep.
    AppSleep = 0x6804,
    /// The user cancelled, also returned for an empty APDU.
    CanceledByUser = 0x6982,
    /// `Lc` does not match the data length.
    ApduSizeMismatch = 0x6983,
    /// The contract plugin needed for clear signing is not installed.
    PluginNotPresent = 0x6984,
    /// The user declined, or the parser was not initialized.
    Declined = 0x6985,
    /// Invalid data, transaction or path.
    InvalidData = 0x6A80,
    /// Chunks out of order or unexpected `P1`/`P2`.
    InvalidTxChunks = 0x6B00,
    /// The device is locked.
    DeviceLocked = 0x6B0C,
    /// The Ethereum app is not started.
    AppNotStarted = 0x6D00,
    /// No app answered the class/instruction.
    AppNotFound = 0x6D02,
    /// Generic failure reported by the transport.
    Unknown = 0x6F00,
}

impl StatusWord {
    /// Looks up a status word in the table of known codes.
    #[must_use]
    pub const fn from_u16(sw: u16) -> Option<Self> {
        Some(match sw {
            0x9000 => Self::Ok,
            0x6501 => Self::TxTypeUnsupported,
            0x6502 => Self::OutputBufferTooSmall,
            0x6503 => Self::PluginError,
            0x6504 => Self::IntConversionError,
            0x6700 => Self::IncorrectLength,
            0x6804 => Self::AppSleep,
            0x6982 => Self::CanceledByUser,
            0x6983 => Self::ApduSizeMismatch,
            0x6984 => Self::PluginNotPresent,
            0x6985 => Self::Declined,
            0x6A80 => Self::InvalidData,
            0x6B00 => Self::InvalidTxChunks,
            0x6B0C => Self::DeviceLocked,
            0x6D00 => Self::AppNotStarted,
            0x6D02 => Self::AppNotFound,
            0x6F00 => Self::Unknown,
            _ => return None,
        })
    }

    /// Symbolic name of the status word.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::TxTypeUnsupported => "TX_TYPE_UNSUPPORTED",
            Self::OutputBufferTooSmall => "OUTPUT_BUFFER_TOO_SMALL",
            Self::PluginError => "PLUGIN_ERROR",
            Self::IntConversionError => "INT_CONVERSION_ERROR",
            Self::IncorrectLength => "INCORRECT_LENGTH",
            Self::AppSleep => "APP_SLEEP",
            Self::CanceledByUser => "CANCELED_BY_USER",
            Self::ApduSizeMismatch => "APDU_SIZE_MISMATCH",
            Self::PluginNotPresent => "PLUGIN_NOT_PRESENT",
            Self::Declined => "DECLINED",
            Self::InvalidData => "INVALID_DATA",
            Self::InvalidTxChunks => "INVALID_TX_CHUNKS",
            Self::DeviceLocked => "DEVICE_LOCKED",
            Self::AppNotStarted => "APP_NOT_STARTED",
            Self::AppNotFound => "APP_NOT_FOUND",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Translates a device status word into an [`enum@Error`].
///
/// Unmapped codes (including known codes without a dedicated kind) become
/// [`Error::UnexpectedDeviceError`] carrying the raw word and its name.
#[must_use]
pub fn translate_status_word(sw: u16) -> Error {
    let known = StatusWord::from_u16(sw);

    match known {
        Some(StatusWord::CanceledByUser | StatusWord::Declined) => Error::UserCancelled,
        Some(StatusWord::DeviceLocked) => Error::DeviceLocked,
        Some(StatusWord::AppSleep | StatusWord::AppNotStarted | StatusWord::AppNotFound) => {
            Error::AppNotOpened
        }
        Some(StatusWord::ApduSizeMismatch) => Error::InvalidApdu,
        Some(StatusWord::InvalidData) => Error::InvalidData,
        Some(StatusWord::Unknown) => Error::DeviceNotFound,
        _ => Error::UnexpectedDeviceError {
            status_word: sw,
            name: known.map_or("UNKNOWN", StatusWord::name),
        },
    }
}
