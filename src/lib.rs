//! walletctl: wallet controller over a bitcoind / btcwallet RPC session.
//!
//! # Architecture
//!
//! ```text
//! caller (staking service, CLI)
//!   │
//!   └── WalletController
//!         │
//!         ├── config   (WalletControllerConfig, env)
//!         ├── wallet   (builder, dialect, status mapper, bip322)
//!         └── WalletRpc session ──► bitcoind | btcwallet
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use walletctl::{RpcWalletController, WalletController, WalletControllerConfig};
//!
//! let controller = RpcWalletController::connect(&WalletControllerConfig::from_env()?)?;
//! controller.unlock_wallet(60)?;
//! let tx = controller.build_and_sign_transaction(outputs, fee_rate, &change)?;
//! let txid = controller.broadcast(&tx, false)?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod wallet;

pub use bitcoin::Network;
pub use config::{WalletControllerConfig, WalletRpcConfig};
pub use error::{RpcError, RpcResult, WalletError, WalletResult};
pub use wallet::{
    FundedTx, RpcWalletController, SignDialect, TxConfStatus, TxConfirmation, TxStatus, Utxo, WalletBackend,
    WalletController, WalletRpc,
};
