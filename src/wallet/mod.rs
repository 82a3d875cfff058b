//! User wallets and their transaction ledger

mod model;
mod service;

pub use model::{TransactionStatus, TransactionType, Wallet, WalletSummary, WalletTransaction};
pub use service::{credit, debit, lock_wallet, WalletError, WalletService};
