//! Session configuration.
//!
//! ```
//! use ledgereth_core::Config;
//!
//! let config = Config::from_json(r#"{"legacy_accounts": true, "chunk_size": 128}"#).unwrap();
//! assert_eq!(config.path().to_string(), "44'/60'/0'/0");
//! assert_eq!(config.chunk_size(), 128);
//! ```

use serde::{Deserialize, Serialize};

use crate::apdu::MAX_DATA_LEN;
use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::error::Result;
use crate::path::DerivationPath;

/// Environment variable selecting the legacy `44'/60'/0'/N` derivation.
pub const LEGACY_ACCOUNTS_ENV: &str = "LEDGER_LEGACY_ACCOUNTS";

/// Defaults applied by a [`DeviceSession`](crate::device::session::DeviceSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path used when an operation is not given one. Falls back to the
    /// standard or legacy default depending on `legacy_accounts`.
    pub default_path: Option<DerivationPath>,

    /// Use the Ledger Live legacy derivation as the default path.
    pub legacy_accounts: bool,

    /// Maximum data bytes per frame. Clamped to `1..=255` when used.
    pub chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_path: None,
            legacy_accounts: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Parses a configuration from JSON. Missing fields take their default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`](crate::Error::JsonError) if the JSON is
    /// invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds the default configuration, honouring `LEDGER_LEGACY_ACCOUNTS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let legacy_accounts = lookup(LEGACY_ACCOUNTS_ENV).is_some_and(|value| {
            !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false")
        });

        Self {
            legacy_accounts,
            ..Self::default()
        }
    }

    /// Sets the default path.
    #[must_use]
    pub fn with_default_path(mut self, path: DerivationPath) -> Self {
        self.default_path = Some(path);
        self
    }

    /// Sets the frame size.
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// The path operations use when none is given.
    #[must_use]
    pub fn path(&self) -> DerivationPath {
        match &self.default_path {
            Some(path) => path.clone(),
            None if self.legacy_accounts => DerivationPath::default_legacy_path(),
            None => DerivationPath::default_path(),
        }
    }

    /// The frame size, clamped to what one APDU can carry.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_DATA_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.path(), DerivationPath::default_path());
        assert_eq!(config.chunk_size(), 255);
    }

    #[test]
    fn chunk_size_is_clamped() {
        assert_eq!(Config::default().with_chunk_size(0).chunk_size(), 1);
        assert_eq!(Config::default().with_chunk_size(4096).chunk_size(), 255);
        assert_eq!(Config::default().with_chunk_size(64).chunk_size(), 64);
    }

    #[test]
    fn explicit_path_wins() {
        let path: DerivationPath = "44'/60'/3'/0/1".parse().unwrap();
        let config = Config {
            legacy_accounts: true,
            ..Config::default()
        }
        .with_default_path(path.clone());
        assert_eq!(config.path(), path);
    }

    #[test]
    fn from_json_partial() {
        let config = Config::from_json(r#"{"default_path": "44'/60'/1'/0/0"}"#).unwrap();
        assert_eq!(config.path().to_string(), "44'/60'/1'/0/0");
        assert!(!config.legacy_accounts);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn from_json_rejects_bad_path() {
        assert!(matches!(
            Config::from_json(r#"{"default_path": "m/44'/60'"}"#),
            Err(Error::JsonError(_))
        ));
    }

    #[test]
    fn env_switch() {
        let set = |value: &'static str| {
            move |key: &str| (key == LEGACY_ACCOUNTS_ENV).then(|| value.to_string())
        };

        assert!(Config::from_lookup(set("1")).legacy_accounts);
        assert!(Config::from_lookup(set("yes")).legacy_accounts);
        assert!(!Config::from_lookup(set("0")).legacy_accounts);
        assert!(!Config::from_lookup(set("false")).legacy_accounts);
        assert!(!Config::from_lookup(|_: &str| None).legacy_accounts);

        assert_eq!(
            Config::from_lookup(set("1")).path(),
            DerivationPath::default_legacy_path()
        );
    }
}
