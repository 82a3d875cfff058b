//! Wallet ledger operations
//!
//! `debit` and `credit` run on a caller-supplied connection so they can join
//! the caller's transaction. The wallet row is locked before the balance is
//! read, and every balance change is paired with a ledger entry.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use uuid::Uuid;

use super::model::{TransactionType, Wallet, WalletSummary, WalletTransaction};

const RECENT_TRANSACTIONS: i64 = 10;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Insufficient wallet balance: available {available}, required {required}")]
    InsufficientBalance {
        available: Decimal,
        required: Decimal,
    },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Lock the user's wallet row, creating the wallet first if needed
pub async fn lock_wallet(conn: &mut PgConnection, user_id: i64) -> Result<Wallet, sqlx::Error> {
    sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
}

/// Remove `amount` from the user's wallet and record a completed debit
pub async fn debit(
    conn: &mut PgConnection,
    user_id: i64,
    amount: Decimal,
    description: &str,
) -> Result<(Wallet, WalletTransaction), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount);
    }

    let wallet = lock_wallet(conn, user_id).await?;
    if wallet.balance < amount {
        return Err(WalletError::InsufficientBalance {
            available: wallet.balance,
            required: amount,
        });
    }

    apply(conn, wallet, amount, TransactionType::Debit, description).await
}

/// Add `amount` to the user's wallet and record a completed credit
pub async fn credit(
    conn: &mut PgConnection,
    user_id: i64,
    amount: Decimal,
    description: &str,
) -> Result<(Wallet, WalletTransaction), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount);
    }

    let wallet = lock_wallet(conn, user_id).await?;
    apply(conn, wallet, amount, TransactionType::Credit, description).await
}

async fn apply(
    conn: &mut PgConnection,
    wallet: Wallet,
    amount: Decimal,
    transaction_type: TransactionType,
    description: &str,
) -> Result<(Wallet, WalletTransaction), WalletError> {
    let delta = match transaction_type {
        TransactionType::Credit => amount,
        TransactionType::Debit => -amount,
    };

    let wallet = sqlx::query_as::<_, Wallet>(
        "UPDATE wallets SET balance = balance + $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(delta)
    .bind(wallet.id)
    .fetch_one(&mut *conn)
    .await?;

    let entry = sqlx::query_as::<_, WalletTransaction>(
        r#"
        INSERT INTO wallet_transactions
            (wallet_id, transaction_id, amount, transaction_type, status, description)
        VALUES ($1, $2, $3, $4, 'completed', $5)
        RETURNING *
        "#,
    )
    .bind(wallet.id)
    .bind(Uuid::new_v4())
    .bind(amount)
    .bind(transaction_type)
    .bind(description)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        wallet_id = wallet.id,
        user_id = wallet.user_id,
        amount = %amount,
        kind = ?transaction_type,
        balance = %wallet.balance,
        "Wallet transaction recorded"
    );

    Ok((wallet, entry))
}

/// Owner-facing wallet queries
#[derive(Clone)]
pub struct WalletService {
    db_pool: PgPool,
}

impl WalletService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Balance and most recent transactions, creating the wallet on first access
    pub async fn summary(&self, user_id: i64) -> Result<WalletSummary, WalletError> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;

        let recent_transactions = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT * FROM wallet_transactions
            WHERE wallet_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(wallet.id)
        .bind(RECENT_TRANSACTIONS)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(WalletSummary {
            id: wallet.id,
            balance: wallet.balance,
            recent_transactions,
        })
    }
}
