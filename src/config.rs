//! Controller configuration - passed from higher layers or read from the environment.

use crate::error::{WalletError, WalletResult};
use crate::wallet::WalletBackend;
use bitcoin::Network;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use zeroize::Zeroizing;

/// RPC endpoint of the wallet backend.
#[derive(Clone, Default)]
pub struct WalletRpcConfig {
    /// `host:port`
    pub host: String,
    pub user: String,
    pub pass: Zeroizing<String>,
    pub disable_tls: bool,
    /// Hex-encoded certificate material; takes precedence over `cert_path`.
    pub raw_cert: Option<String>,
    pub cert_path: Option<PathBuf>,
}

impl fmt::Debug for WalletRpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRpcConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("disable_tls", &self.disable_tls)
            .field("raw_cert", &self.raw_cert.as_ref().map(|c| c.len()))
            .field("cert_path", &self.cert_path)
            .finish()
    }
}

impl WalletRpcConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into(), ..Default::default() }
    }
    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.user = user.into();
        self.pass = Zeroizing::new(pass.into());
        self
    }
    pub fn with_disable_tls(mut self, disable: bool) -> Self { self.disable_tls = disable; self }
    pub fn with_raw_cert(mut self, hex_cert: impl Into<String>) -> Self { self.raw_cert = Some(hex_cert.into()); self }
    pub fn with_cert_path(mut self, path: impl Into<PathBuf>) -> Self { self.cert_path = Some(path.into()); self }

    pub fn url(&self) -> String {
        if self.host.contains("://") { self.host.clone() } else { format!("http://{}", self.host) }
    }

    /// Certificate bytes: decoded `raw_cert` if set, otherwise the contents of `cert_path`.
    pub fn read_cert(&self) -> WalletResult<Vec<u8>> {
        if let Some(raw) = self.raw_cert.as_deref().filter(|r| !r.is_empty()) {
            return hex::decode(raw.trim()).map_err(|e| WalletError::Config(format!("raw_cert is not hex: {e}")));
        }
        match &self.cert_path {
            Some(path) => std::fs::read(path)
                .map_err(|e| WalletError::Config(format!("cannot read cert {}: {e}", path.display()))),
            None => Err(WalletError::Config("no rpc certificate configured".into())),
        }
    }
}

#[derive(Clone)]
pub struct WalletControllerConfig {
    pub rpc: WalletRpcConfig,
    pub network: Network,
    pub wallet_passphrase: Zeroizing<String>,
    pub backend: Option<WalletBackend>,
}

impl Default for WalletControllerConfig {
    fn default() -> Self {
        Self {
            rpc: WalletRpcConfig::default(),
            network: Network::Regtest,
            wallet_passphrase: Zeroizing::new(String::new()),
            backend: None,
        }
    }
}

impl fmt::Debug for WalletControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletControllerConfig")
            .field("rpc", &self.rpc)
            .field("network", &self.network)
            .field("wallet_passphrase", &"<redacted>")
            .field("backend", &self.backend)
            .finish()
    }
}

impl WalletControllerConfig {
    pub fn new(rpc: WalletRpcConfig, network: Network) -> Self {
        Self { rpc, network, ..Default::default() }
    }
    pub fn with_passphrase(mut self, pass: impl Into<String>) -> Self { self.wallet_passphrase = Zeroizing::new(pass.into()); self }
    pub fn with_backend(mut self, backend: WalletBackend) -> Self { self.backend = Some(backend); self }

    /// Reads `WALLETCTL_*` variables. Unset variables keep their defaults.
    pub fn from_env() -> WalletResult<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let mut rpc = WalletRpcConfig::new(var("WALLETCTL_RPC_HOST").unwrap_or_else(|| "localhost:18443".into()))
            .with_credentials(var("WALLETCTL_RPC_USER").unwrap_or_default(), var("WALLETCTL_RPC_PASS").unwrap_or_default())
            .with_disable_tls(var("WALLETCTL_DISABLE_TLS").map(|v| parse_flag(&v)).unwrap_or(false));
        if let Some(cert) = var("WALLETCTL_RPC_CERT") {
            rpc = rpc.with_raw_cert(cert);
        }
        if let Some(path) = var("WALLETCTL_RPC_CERT_PATH") {
            rpc = rpc.with_cert_path(path);
        }

        let network = match var("WALLETCTL_NETWORK") {
            Some(name) => parse_network(&name)?,
            None => Network::Regtest,
        };
        let mut config = Self::new(rpc, network).with_passphrase(var("WALLETCTL_WALLET_PASS").unwrap_or_default());
        if let Some(name) = var("WALLETCTL_BACKEND") {
            config = config.with_backend(WalletBackend::from_str(&name)?);
        }
        Ok(config)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Accepts rust-bitcoin names (`bitcoin`, `testnet`) and bitcoind chain names (`main`, `test`).
pub fn parse_network(name: &str) -> WalletResult<Network> {
    let name = name.trim().to_ascii_lowercase();
    Network::from_str(&name)
        .or_else(|_| Network::from_core_arg(&name))
        .map_err(|_| WalletError::Config(format!("unknown network {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_names() {
        assert_eq!(parse_network("bitcoin").unwrap(), Network::Bitcoin);
        assert_eq!(parse_network("main").unwrap(), Network::Bitcoin);
        assert_eq!(parse_network("Regtest").unwrap(), Network::Regtest);
        assert_eq!(parse_network("test").unwrap(), Network::Testnet);
        assert!(matches!(parse_network("moonnet"), Err(WalletError::Config(_))));
    }

    #[test]
    fn url_adds_scheme_once() {
        assert_eq!(WalletRpcConfig::new("127.0.0.1:8332").url(), "http://127.0.0.1:8332");
        assert_eq!(WalletRpcConfig::new("http://node:8332").url(), "http://node:8332");
    }

    #[test]
    fn raw_cert_is_hex_decoded() {
        let cfg = WalletRpcConfig::new("h").with_raw_cert("deadbeef");
        assert_eq!(cfg.read_cert().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        let cfg = WalletRpcConfig::new("h").with_raw_cert("zz");
        assert!(matches!(cfg.read_cert(), Err(WalletError::Config(_))));
        assert!(matches!(WalletRpcConfig::new("h").read_cert(), Err(WalletError::Config(_))));
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = WalletControllerConfig::new(WalletRpcConfig::new("h").with_credentials("u", "hunter2"), Network::Regtest)
            .with_passphrase("s3cret");
        let out = format!("{cfg:?}");
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("s3cret"));
    }
}
