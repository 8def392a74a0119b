//! Ethereum JSON-RPC wallet. The node holds and signs for the account.

use super::Wallet;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

const WEI_PER_ETHER: f64 = 1e18;

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

pub struct JsonRpcWallet {
    rpc_url: String,
    address: String,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcWallet {
    pub fn new(rpc_url: &str, address: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            rpc_url: rpc_url.to_string(),
            address: address.to_string(),
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("{method} returned {status}: {text}");
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {method} response"))?;

        if let Some(err) = parsed.error {
            anyhow::bail!("{method} error {}: {}", err.code, err.message);
        }
        parsed
            .result
            .with_context(|| format!("{method} response has no result"))
    }
}

/// Parse a `0x`-prefixed hex quantity of wei into ether.
pub fn wei_hex_to_ether(hex: &str) -> Result<f64> {
    let digits = hex
        .strip_prefix("0x")
        .with_context(|| format!("quantity '{hex}' is not 0x-prefixed"))?;
    if digits.is_empty() {
        return Ok(0.0);
    }
    let wei = u128::from_str_radix(digits, 16)
        .with_context(|| format!("quantity '{hex}' is not valid hex"))?;
    Ok(wei as f64 / WEI_PER_ETHER)
}

/// Convert an ether amount into a `0x`-prefixed hex quantity of wei.
pub fn ether_to_wei_hex(amount: f64) -> Result<String> {
    if !amount.is_finite() || amount <= 0.0 {
        anyhow::bail!("transfer amount must be positive, got {amount}");
    }
    let wei = (amount * WEI_PER_ETHER).round();
    if wei < 1.0 || wei >= u128::MAX as f64 {
        anyhow::bail!("transfer amount {amount} is out of range");
    }
    Ok(format!("{:#x}", wei as u128))
}

fn is_hex_address(s: &str) -> bool {
    s.len() == 42
        && s.starts_with("0x")
        && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl Wallet for JsonRpcWallet {
    async fn balance(&self) -> Result<f64> {
        let result = self
            .call("eth_getBalance", json!([self.address, "latest"]))
            .await?;
        let hex = result
            .as_str()
            .context("eth_getBalance result is not a string")?;
        wei_hex_to_ether(hex)
    }

    async fn transfer(&self, target: &str, amount: f64) -> Result<String> {
        if !is_hex_address(target) {
            // ENS names need a resolver the node does not provide.
            anyhow::bail!("'{target}' is not a hex address");
        }
        let value = ether_to_wei_hex(amount)?;
        let result = self
            .call(
                "eth_sendTransaction",
                json!([{"from": self.address, "to": target, "value": value}]),
            )
            .await?;
        let tx = result
            .as_str()
            .context("eth_sendTransaction result is not a string")?
            .to_string();
        info!(to = %target, amount, tx = %tx, "Transfer submitted");
        Ok(tx)
    }

    fn address(&self) -> Option<&str> {
        Some(&self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FROM: &str = "0x1111111111111111111111111111111111111111";
    const TO: &str = "0x2222222222222222222222222222222222222222";

    #[test]
    fn wei_conversions() {
        assert_eq!(wei_hex_to_ether("0xde0b6b3a7640000").unwrap(), 1.0);
        assert_eq!(wei_hex_to_ether("0x0").unwrap(), 0.0);
        assert!(wei_hex_to_ether("123").is_err());
        assert_eq!(ether_to_wei_hex(1.0).unwrap(), "0xde0b6b3a7640000");
        assert!(ether_to_wei_hex(0.0).is_err());
        assert!(ether_to_wei_hex(-1.0).is_err());
        assert!(ether_to_wei_hex(f64::NAN).is_err());
    }

    #[tokio::test]
    async fn balance_reads_latest_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_getBalance",
                "params": [FROM, "latest"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": "0x6f05b59d3b20000"
            })))
            .mount(&server)
            .await;

        let wallet = JsonRpcWallet::new(&server.uri(), FROM).unwrap();
        let balance = wallet.balance().await.unwrap();
        assert!((balance - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn transfer_sends_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_sendTransaction",
                "params": [{"from": FROM, "to": TO, "value": "0xde0b6b3a7640000"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": "0xabc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let wallet = JsonRpcWallet::new(&server.uri(), FROM).unwrap();
        assert_eq!(wallet.transfer(TO, 1.0).await.unwrap(), "0xabc");
    }

    #[tokio::test]
    async fn rpc_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": {"code": -32000, "message": "insufficient funds"}
            })))
            .mount(&server)
            .await;

        let wallet = JsonRpcWallet::new(&server.uri(), FROM).unwrap();
        let err = wallet.transfer(TO, 1.0).await.unwrap_err();
        assert!(err.to_string().contains("insufficient funds"));
    }

    #[tokio::test]
    async fn ens_names_are_rejected_before_any_call() {
        let server = MockServer::start().await;
        let wallet = JsonRpcWallet::new(&server.uri(), FROM).unwrap();
        assert!(wallet.transfer("vitalik.eth", 0.1).await.is_err());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_wallet_is_empty() {
        let wallet = super::super::DisabledWallet;
        assert_eq!(wallet.balance().await.unwrap(), 0.0);
        assert!(wallet.transfer(TO, 1.0).await.is_err());
        assert!(wallet.address().is_none());
    }
}
