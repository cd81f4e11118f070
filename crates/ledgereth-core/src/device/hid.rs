//! USB HID channel for native Ledger communication.
//!
//! # Example
//!
//! ```ignore
//! use ledgereth_core::device::{DeviceSession, HidChannel};
//!
//! // Connect to the first Ledger found on USB
//! let mut session = DeviceSession::new(HidChannel::opener);
//! let version = session.version()?;
//! ```

use std::fmt;

use ledger_transport::APDUCommand;
use ledger_transport_hid::hidapi::HidApi;
use ledger_transport_hid::{LedgerHIDError, TransportNativeHID};

use super::Channel;
use crate::error::{Error, Result};

/// A channel to a Ledger over USB HID.
pub struct HidChannel {
    transport: TransportNativeHID,
}

impl fmt::Debug for HidChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HidChannel").finish_non_exhaustive()
    }
}

impl HidChannel {
    /// Connects to the first available Ledger.
    ///
    /// # Errors
    ///
    /// - [`Error::DeviceNotFound`] if no Ledger is connected
    /// - [`Error::Protocol`] if the HID layer fails
    pub fn connect() -> Result<Self> {
        let api = HidApi::new()
            .map_err(|e| Error::Protocol(format!("failed to initialise hidapi: {e}")))?;
        let transport = TransportNativeHID::new(&api).map_err(hid_error)?;

        Ok(Self { transport })
    }

    /// [`connect`](Self::connect) as a [`ChannelOpener`](super::ChannelOpener).
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub fn opener() -> Result<Box<dyn Channel>> {
        Ok(Box::new(Self::connect()?))
    }
}

fn hid_error(e: LedgerHIDError) -> Error {
    match e {
        LedgerHIDError::DeviceNotFound => Error::DeviceNotFound,
        other => Error::Protocol(format!("hid transport: {other}")),
    }
}

impl Channel for HidChannel {
    fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>> {
        let command = parse_frame(apdu)?;

        let answer = self.transport.exchange(&command).map_err(hid_error)?;

        let mut raw = answer.data().to_vec();
        raw.extend_from_slice(&answer.retcode().to_be_bytes());
        Ok(raw)
    }
}

/// Splits an encoded frame back into the transport's command type. The HID
/// framing carries no `Le`, so a trailing one is dropped. Anything else after
/// the declared data is rejected.
fn parse_frame(apdu: &[u8]) -> Result<APDUCommand<Vec<u8>>> {
    let [cla, ins, p1, p2, ref rest @ ..] = *apdu else {
        return Err(Error::Protocol(format!(
            "frame has {} bytes, shorter than a header",
            apdu.len()
        )));
    };

    let data = match rest.split_first() {
        Some((&lc, body)) => {
            let lc = usize::from(lc);
            if body.len() != lc && body.len() != lc + 1 {
                return Err(Error::Protocol(format!(
                    "frame declares {lc} data bytes, has {}",
                    body.len()
                )));
            }
            body[..lc].to_vec()
        }
        None => Vec::new(),
    };

    Ok(APDUCommand {
        cla,
        ins,
        p1,
        p2,
        data,
    })
}
