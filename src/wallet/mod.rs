//! Wallet module - fund, sign, broadcast and prove ownership over a wallet RPC session
//!
//! The controller owns no keys and keeps no state between calls. Every operation is
//! a fresh round trip to the backend wallet (bitcoind or btcwallet).
//!
//! # Architecture
//!
//! ```text
//! RpcWalletController (WalletController trait)
//!     │
//!     ├── build:   listunspent → utxo (filter, largest-first) → builder (fee loop, change)
//!     │
//!     ├── sign:    backend dialect ─┬─ WalletKeyStore → signrawtransactionwithwallet
//!     │                             └─ ExplicitHints  → signrawtransaction + prevout hints
//!     │
//!     ├── status:  rpc::tx_conf_details → TxConfStatus → status::map_conf_status → TxStatus
//!     │
//!     └── prove:   bip322 (to_spend / to_sign, key-store signing with a zero-amount hint)
//!                                │
//!                                ▼
//!                        WalletRpc (bitcoincore_rpc::Client or caller session)
//! ```
//!
//! # Operations
//!
//! | Operation | Backend calls | Notes |
//! |-----------|---------------|-------|
//! | `unlock_wallet` | walletpassphrase | |
//! | `resolve_public_key` | getaddressinfo | watch-only → KeyNotAvailable |
//! | `export_private_key` / `import_private_key` | dumpprivkey / importprivkey | |
//! | `build_transaction` | listunspent | unsigned, nothing locked |
//! | `sign_transaction` | sign* (+ listunspent for btcwallet) | partial is not an error |
//! | `build_and_sign_transaction` | all of the above | partial is an error |
//! | `broadcast` | sendrawtransaction | |
//! | `query_confirmation` | getrawtransaction, getblock | needs txindex |
//! | `sign_ownership_proof` | signrawtransactionwithwallet | p2wpkh only |

mod backend;
pub mod bip322;
mod builder;
mod controller;
mod rpc;
mod status;
mod utxo;

pub use backend::{SignDialect, WalletBackend};
pub use builder::{
    build_tx_from_outputs, dust_threshold, estimate_virtual_size, fee_for_size, is_dust, FundedTx,
    DEFAULT_RELAY_FEE_PER_KB,
};
pub use controller::{RpcWalletController, WalletController};
pub use rpc::{index_conf_details, AddressInfo, BlockInfo, RawTxInfo, SignInputHint, SignedTx, WalletRpc};
pub use status::{map_conf_status, ConfRequest, TxConfStatus, TxConfirmation, TxStatus};
pub use utxo::{largest_first, results_to_utxos, InputType, ListUnspentEntry, Utxo};
