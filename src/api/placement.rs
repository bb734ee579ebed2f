use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PlacementError;

/// One bet as sent to the placement service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRequest {
    pub market_id: String,
    pub round_id: String,
    pub label: String,
    /// Requested price; the service decides whether it is still honored
    pub price: Decimal,
    pub stake: Decimal,
}

/// Accepted bet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlacementReceipt {
    pub bet_id: Option<String>,
}

/// The bet placement service: one selection per call.
#[async_trait]
pub trait BetPlacer: Send + Sync {
    async fn place_bet(&self, request: &PlacementRequest) -> Result<PlacementReceipt, PlacementError>;
}

// Response body from POST /games/{game}/bets
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceBetResponse {
    accepted: bool,
    bet_id: Option<String>,
    reason: Option<String>,
}

/// Placement over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpPlacer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPlacer {
    pub fn new(base_url: &str, game_id: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}/games/{}/bets", base_url.trim_end_matches('/'), game_id);
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BetPlacer for HttpPlacer {
    async fn place_bet(&self, request: &PlacementRequest) -> Result<PlacementReceipt, PlacementError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| PlacementError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = body_reason(&body)
                .unwrap_or_else(|| format!("rejected with status {}", status.as_u16()));
            return Err(PlacementError::Rejected(reason));
        }

        let body: PlaceBetResponse = response
            .json()
            .await
            .map_err(|e| PlacementError::transport(e.to_string()))?;
        into_receipt(body)
    }
}

fn into_receipt(body: PlaceBetResponse) -> Result<PlacementReceipt, PlacementError> {
    if body.accepted {
        Ok(PlacementReceipt {
            bet_id: body.bet_id,
        })
    } else {
        Err(PlacementError::Rejected(
            body.reason.unwrap_or_else(|| "rejected".to_string()),
        ))
    }
}

/// Pull a "reason" out of an error body, if it is JSON that has one.
fn body_reason(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("reason")?
        .as_str()
        .map(str::to_string)
}
