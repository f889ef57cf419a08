//! Morpho Blue market lookup through the public GraphQL indexer.

use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::chain::abi::MarketParams;
use crate::error::{DefiError, Result};
use crate::provider::http_client;

/// Immutable parameters of a Morpho Blue market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphoMarket {
    pub loan_token: Address,
    pub collateral_token: Address,
    pub oracle: Address,
    pub irm: Address,
    pub lltv: U256,
}

impl MorphoMarket {
    pub fn to_params(&self) -> MarketParams {
        MarketParams {
            loanToken: self.loan_token,
            collateralToken: self.collateral_token,
            oracle: self.oracle,
            irm: self.irm,
            lltv: self.lltv,
        }
    }
}

#[async_trait]
pub trait MorphoIndexer: Send + Sync {
    async fn market_params(&self, chain_id: u64, market_id: B256) -> Result<MorphoMarket>;
}

// ---------------------------------------------------------------------------
// GraphQL client
// ---------------------------------------------------------------------------

const MARKET_QUERY: &str = "query MarketByKey($key: String!, $chainId: Int!) { \
    marketByUniqueKey(uniqueKey: $key, chainId: $chainId) { \
      uniqueKey lltv oracleAddress irmAddress \
      loanAsset { address } \
      collateralAsset { address } \
    } \
  }";

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<MarketData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketData {
    market_by_unique_key: Option<MarketNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketNode {
    lltv: serde_json::Value,
    oracle_address: Option<Address>,
    irm_address: Option<Address>,
    loan_asset: Option<AssetNode>,
    collateral_asset: Option<AssetNode>,
}

#[derive(Debug, Deserialize)]
struct AssetNode {
    address: Address,
}

#[derive(Debug, Clone)]
pub struct MorphoApi {
    client: reqwest::Client,
    url: String,
}

impl MorphoApi {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MorphoIndexer for MorphoApi {
    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn market_params(&self, chain_id: u64, market_id: B256) -> Result<MorphoMarket> {
        let body = json!({
            "query": MARKET_QUERY,
            "variables": { "key": market_id.to_string(), "chainId": chain_id },
        });
        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DefiError::unavailable(format!("morpho indexer request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DefiError::unavailable(format!(
                "morpho indexer returned HTTP {status}"
            )));
        }
        let parsed: GraphQlResponse = resp.json().await.map_err(|e| {
            DefiError::unavailable(format!("morpho indexer returned malformed JSON: {e}"))
        })?;
        if let Some(err) = parsed.errors.first() {
            return Err(DefiError::unavailable(format!(
                "morpho indexer error: {}",
                err.message
            )));
        }
        let node = parsed
            .data
            .and_then(|d| d.market_by_unique_key)
            .ok_or_else(|| {
                DefiError::unavailable(format!(
                    "morpho market {market_id} not found on chain {chain_id}"
                ))
            })?;
        debug!(%market_id, "morpho market resolved");
        market_from_node(market_id, node)
    }
}

fn market_from_node(market_id: B256, node: MarketNode) -> Result<MorphoMarket> {
    let loan_token = node
        .loan_asset
        .map(|a| a.address)
        .filter(|a| !a.is_zero())
        .ok_or_else(|| {
            DefiError::unavailable(format!("morpho market {market_id} has no loan token"))
        })?;
    let lltv = match &node.lltv {
        serde_json::Value::String(s) => U256::from_str_radix(s.trim(), 10).ok(),
        serde_json::Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    }
    .ok_or_else(|| DefiError::unavailable(format!("morpho market {market_id} has no lltv")))?;

    Ok(MorphoMarket {
        loan_token,
        collateral_token: node.collateral_asset.map(|a| a.address).unwrap_or_default(),
        oracle: node.oracle_address.unwrap_or_default(),
        irm: node.irm_address.unwrap_or_default(),
        lltv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use mockito::Server;

    const MARKET_ID: &str = "0xb323495f7e4148be5643a4ea4a8221eef163e4bccfdedc2a6f4696baacbc86cc";

    const MARKET_RESP: &str = r#"{
        "data": {
            "marketByUniqueKey": {
                "uniqueKey": "0xb323495f7e4148be5643a4ea4a8221eef163e4bccfdedc2a6f4696baacbc86cc",
                "lltv": "860000000000000000",
                "oracleAddress": "0x48F7E36EB6B826B2dF4B2E630B62Cd25e89E40e2",
                "irmAddress": "0x870aC11D48B15DB9a138Cf899d20F13F79Ba00BC",
                "loanAsset": { "address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48" },
                "collateralAsset": { "address": "0x7f39C581F595B53c5cb19bD0b3f8dA6c935E2Ca0" }
            }
        }
    }"#;

    #[tokio::test]
    async fn resolves_market_params() {
        let mut server = Server::new_async().await;
        let mocked = server
            .mock("POST", "/")
            .expect(1)
            .with_header("content-type", "application/json")
            .with_body(MARKET_RESP)
            .create_async()
            .await;

        let api = MorphoApi::new(&server.url(), Duration::from_secs(5)).unwrap();
        let market = api
            .market_params(1, MARKET_ID.parse().unwrap())
            .await
            .unwrap();

        mocked.assert_async().await;
        assert_eq!(
            market.loan_token,
            address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48")
        );
        assert_eq!(market.lltv, U256::from(860_000_000_000_000_000u64));
    }

    #[tokio::test]
    async fn missing_market_is_unavailable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"marketByUniqueKey":null},"errors":[{"message":"No results matching given parameters"}]}"#)
            .create_async()
            .await;

        let api = MorphoApi::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = api
            .market_params(1, MARKET_ID.parse().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unavailable);
        assert!(err.to_string().contains("No results"));
    }

    #[tokio::test]
    async fn http_failure_is_unavailable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/")
            .with_status(502)
            .create_async()
            .await;

        let api = MorphoApi::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = api
            .market_params(1, MARKET_ID.parse().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unavailable);
    }
}
