//! Caller-owned device sessions.
//!
//! A [`DeviceSession`] opens its channel on first use, checks the firmware
//! once per opened channel, and closes the channel on [`close`] or drop.
//!
//! [`close`]: DeviceSession::close

use std::fmt;

use alloy_primitives::B256;
use tracing::{info, warn};

use super::{
    Channel, ChannelOpener, FirmwareVersion, message_body, request_address,
    request_message_signature, request_transaction_signature, request_typed_data_signature,
    verify_compatibility,
};
use crate::account::{AddressResponse, LedgerAccount};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::path::DerivationPath;
use crate::signature::{SignedMessage, SignedTypedMessage};
use crate::transaction::{SignedTransaction, Transaction};

/// A session with one device.
///
/// Operations taking an `Option<&DerivationPath>` fall back to
/// [`Config::path`] when given `None`.
///
/// # Example
///
/// ```ignore
/// use ledgereth_core::device::{DeviceSession, HidChannel};
///
/// let mut session = DeviceSession::new(HidChannel::opener);
/// let account = session.get_account(None)?;
/// println!("{account}");
/// ```
pub struct DeviceSession {
    opener: Box<dyn ChannelOpener>,
    channel: Option<Box<dyn Channel>>,
    firmware: Option<FirmwareVersion>,
    config: Config,
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("open", &self.is_open())
            .field("firmware", &self.firmware)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// Creates a session with the default configuration. Nothing is opened
    /// yet.
    pub fn new(opener: impl ChannelOpener + 'static) -> Self {
        Self::with_config(opener, Config::default())
    }

    /// Creates a session with the given configuration.
    pub fn with_config(opener: impl ChannelOpener + 'static, config: Config) -> Self {
        Self {
            opener: Box::new(opener),
            channel: None,
            firmware: None,
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns `true` while a channel is held.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Returns the firmware version, if the current channel was checked.
    #[must_use]
    pub const fn firmware(&self) -> Option<FirmwareVersion> {
        self.firmware
    }

    /// Opens the channel, or returns the one already open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] or any other error of the opener.
    pub fn open(&mut self) -> Result<&mut (dyn Channel + 'static)> {
        if self.channel.is_none() {
            let channel = self.opener.open()?;
            info!("device channel opened");
            self.firmware = None;
            self.channel = Some(channel);
        }

        self.channel.as_deref_mut().ok_or(Error::DeviceNotFound)
    }

    /// Closes the channel. A later operation opens a new one.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Channel::close`]. The channel is released
    /// either way.
    pub fn close(&mut self) -> Result<()> {
        self.firmware = None;
        match self.channel.take() {
            Some(mut channel) => {
                info!("device channel closed");
                channel.close()
            }
            None => Ok(()),
        }
    }

    /// Opens the channel and checks the firmware unless already done.
    fn ready(&mut self) -> Result<&mut (dyn Channel + 'static)> {
        self.open()?;

        if self.firmware.is_none() {
            let channel = self.channel.as_deref_mut().ok_or(Error::DeviceNotFound)?;
            self.firmware = Some(verify_compatibility(channel)?);
        }

        self.channel.as_deref_mut().ok_or(Error::DeviceNotFound)
    }

    /// Opens the channel if needed and returns the app version.
    ///
    /// # Errors
    ///
    /// See [`verify_compatibility`].
    pub fn version(&mut self) -> Result<FirmwareVersion> {
        self.ready()?;
        self.firmware.ok_or(Error::DeviceNotFound)
    }

    fn resolve(&self, path: Option<&DerivationPath>) -> DerivationPath {
        path.cloned().unwrap_or_else(|| self.config.path())
    }

    /// Asks the device for the address at `path`.
    ///
    /// # Errors
    ///
    /// See [`get_address`](super::get_address).
    pub fn get_address(
        &mut self,
        path: Option<&DerivationPath>,
        confirm: bool,
        chain_code: bool,
    ) -> Result<AddressResponse> {
        let path = self.resolve(path);
        let channel = self.ready()?;
        request_address(channel, &path, confirm, chain_code)
    }

    /// Returns the account at `path` without asking for confirmation.
    ///
    /// # Errors
    ///
    /// See [`get_address`](super::get_address).
    pub fn get_account(&mut self, path: Option<&DerivationPath>) -> Result<LedgerAccount> {
        let path = self.resolve(path);
        let response = self.get_address(Some(&path), false, false)?;
        Ok(LedgerAccount::new(path, response.address))
    }

    /// Signs a transaction.
    ///
    /// # Errors
    ///
    /// See [`sign_transaction`](super::sign_transaction).
    pub fn sign_transaction(
        &mut self,
        transaction: &Transaction,
        path: Option<&DerivationPath>,
    ) -> Result<SignedTransaction> {
        transaction.validate()?;
        let path = self.resolve(path);
        let chunk_size = self.config.chunk_size();
        let channel = self.ready()?;
        request_transaction_signature(channel, transaction, &path, chunk_size)
    }

    /// Signs an EIP-191 personal message.
    ///
    /// # Errors
    ///
    /// See [`sign_message`](super::sign_message).
    pub fn sign_message(
        &mut self,
        message: impl AsRef<[u8]>,
        path: Option<&DerivationPath>,
    ) -> Result<SignedMessage> {
        let message = message.as_ref();
        let body = message_body(message)?;
        let path = self.resolve(path);
        let chunk_size = self.config.chunk_size();
        let channel = self.ready()?;
        request_message_signature(channel, message, &body, &path, chunk_size)
    }

    /// Signs EIP-712 typed data given as its domain and message hashes.
    ///
    /// # Errors
    ///
    /// See [`sign_typed_data`](super::sign_typed_data).
    pub fn sign_typed_data(
        &mut self,
        domain_hash: &B256,
        message_hash: &B256,
        path: Option<&DerivationPath>,
    ) -> Result<SignedTypedMessage> {
        let path = self.resolve(path);
        let channel = self.ready()?;
        request_typed_data_signature(channel, domain_hash, message_hash, &path)
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(mut channel) = self.channel.take()
            && let Err(e) = channel.close()
        {
            warn!(error = %e, "failed to close device channel");
        }
    }
}
