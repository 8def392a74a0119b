//! Wallet capability.

pub mod rpc;

use anyhow::Result;
use async_trait::async_trait;

pub use rpc::JsonRpcWallet;

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Spendable balance in whole currency units (ether).
    async fn balance(&self) -> Result<f64>;

    /// Send `amount` to `target`, returning a transaction reference.
    async fn transfer(&self, target: &str, amount: f64) -> Result<String>;

    /// Our receiving address, if there is one.
    fn address(&self) -> Option<&str>;
}

/// Stand-in used when no wallet is configured: always empty.
pub struct DisabledWallet;

#[async_trait]
impl Wallet for DisabledWallet {
    async fn balance(&self) -> Result<f64> {
        Ok(0.0)
    }

    async fn transfer(&self, target: &str, _amount: f64) -> Result<String> {
        anyhow::bail!("wallet is disabled; not sending to {target}")
    }

    fn address(&self) -> Option<&str> {
        None
    }
}
