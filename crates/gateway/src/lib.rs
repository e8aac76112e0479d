use crate::auth::sign_request;
use crate::error::GatewayError;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use configuration::settings::ApiConfig;
use core_types::{
    AccountBalance, Direction, OpenOrder, OrderAck, OrderRequest, OrderStatus, PositionSnapshot,
    PriceSample,
};
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

mod auth;
pub mod error;
pub mod responses;

// --- Public API ---
pub use responses::{ApiErrorResponse, BalanceResponse, OpenOrderResponse, OrderResponse,
    PositionResponse};

/// The abstract market/account gateway contract the engine consumes.
///
/// The engine only ever talks to this trait, so the live exchange client can
/// be swapped for a mock in tests. Every method is a single best-effort call;
/// the engine treats failures as a skipped tick, never as fatal.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Places a new order. (Authenticated)
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, GatewayError>;

    /// Cancels a resting order. Returns true if the exchange accepted the
    /// cancel. (Authenticated)
    async fn cancel_order(&self, instrument: &str, order_id: i64) -> Result<bool, GatewayError>;

    /// Fetches all resting orders for one instrument. (Authenticated)
    async fn get_open_orders(&self, instrument: &str) -> Result<Vec<OpenOrder>, GatewayError>;

    /// Fetches all non-zero open positions. (Authenticated)
    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>, GatewayError>;

    /// Fetches the USDT margin balance. (Authenticated)
    async fn get_balance(&self) -> Result<AccountBalance, GatewayError>;

    /// Best-effort last traded price for one instrument.
    async fn get_last_price(&self, instrument: &str) -> Result<Decimal, GatewayError>;

    /// Fetches the most recent `limit` klines, oldest first.
    async fn fetch_recent_samples(
        &self,
        instrument: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<PriceSample>, GatewayError>;

    /// Sets the leverage for one instrument. (Authenticated)
    async fn set_leverage(&self, instrument: &str, leverage: u8) -> Result<(), GatewayError>;
}

/// A concrete implementation of the `Gateway` for Binance USDⓈ-M futures.
#[derive(Clone)]
pub struct BinanceFuturesGateway {
    client: reqwest::Client,
    base_url: String,
    api_secret: String,
}

impl BinanceFuturesGateway {
    pub fn new(live_mode: bool, api_config: &ApiConfig) -> Self {
        let (base_url, keys) = if live_mode {
            ("https://fapi.binance.com".to_string(), &api_config.production)
        } else {
            ("https://testnet.binancefuture.com".to_string(), &api_config.testnet)
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            "X-MBX-APIKEY",
            HeaderValue::from_str(&keys.key).expect("Invalid API Key"),
        );

        Self {
            client: reqwest::Client::builder()
                .default_headers(headers)
                .build()
                .expect("Failed to build reqwest client"),
            base_url,
            api_secret: keys.secret.clone(),
        }
    }

    fn signed_url(&self, path: &str, params: &mut BTreeMap<&str, String>) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis();
        params.insert("timestamp", timestamp.to_string());

        let query_string = serde_qs::to_string(params).expect("query params serialize");
        let signature = sign_request(&self.api_secret, &query_string);
        format!("{}{}?{}&signature={}", self.base_url, path, query_string, signature)
    }

    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str::<T>(&text).map_err(|e| GatewayError::Deserialization(e.to_string()))
        } else {
            let api_error: ApiErrorResponse = serde_json::from_str(&text).map_err(|e| {
                GatewayError::Deserialization(format!(
                    "Failed to deserialize error response: {e}. Original text: {text}"
                ))
            })?;
            Err(GatewayError::Exchange(api_error.code, api_error.msg))
        }
    }

    async fn _get_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &mut BTreeMap<&str, String>,
    ) -> Result<T, GatewayError> {
        let url = self.signed_url(path, params);
        Self::read_response(self.client.get(&url).send().await?).await
    }

    async fn _post_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &mut BTreeMap<&str, String>,
    ) -> Result<T, GatewayError> {
        let url = self.signed_url(path, params);
        Self::read_response(self.client.post(&url).send().await?).await
    }

    async fn _delete_signed<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &mut BTreeMap<&str, String>,
    ) -> Result<T, GatewayError> {
        let url = self.signed_url(path, params);
        Self::read_response(self.client.delete(&url).send().await?).await
    }
}

// Intermediate struct for deserializing klines from the exchange.
#[derive(Deserialize)]
struct RawKline(
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    i64,
    String,
    String,
    String,
);

fn decimal_field(raw: &str) -> Result<Decimal, GatewayError> {
    Decimal::from_str(raw).map_err(|e| GatewayError::Deserialization(e.to_string()))
}

#[async_trait]
impl Gateway for BinanceFuturesGateway {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", order.instrument.clone());
        params.insert("side", format!("{:?}", order.side).to_uppercase());
        params.insert("type", format!("{:?}", order.order_type).to_uppercase());
        params.insert("quantity", order.quantity.to_string());
        params.insert("newClientOrderId", order.client_order_id.to_string());
        if let Some(price) = order.price {
            params.insert("price", price.to_string());
            params.insert("timeInForce", "GTC".to_string());
        }
        if order.reduce_only {
            params.insert("reduceOnly", "true".to_string());
        }

        let response: OrderResponse = self._post_signed("/fapi/v1/order", &mut params).await?;
        Ok(OrderAck {
            order_id: response.order_id,
            client_order_id: Uuid::parse_str(&response.client_order_id)
                .unwrap_or(order.client_order_id),
            instrument: response.symbol,
            status: OrderStatus::from_exchange(&response.status),
            executed_qty: response.executed_qty,
            avg_price: response.avg_price,
        })
    }

    async fn cancel_order(&self, instrument: &str, order_id: i64) -> Result<bool, GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", instrument.to_string());
        params.insert("orderId", order_id.to_string());

        let response: OrderResponse = self._delete_signed("/fapi/v1/order", &mut params).await?;
        Ok(matches!(
            OrderStatus::from_exchange(&response.status),
            OrderStatus::Canceled | OrderStatus::Expired
        ))
    }

    async fn get_open_orders(&self, instrument: &str) -> Result<Vec<OpenOrder>, GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", instrument.to_string());

        let response: Vec<OpenOrderResponse> =
            self._get_signed("/fapi/v1/openOrders", &mut params).await?;
        response
            .into_iter()
            .map(|o| {
                let placed_at = Utc
                    .timestamp_millis_opt(o.time)
                    .single()
                    .ok_or_else(|| GatewayError::InvalidData(format!("invalid order time: {}", o.time)))?;
                Ok(OpenOrder {
                    order_id: o.order_id,
                    instrument: o.symbol,
                    side: o.side,
                    price: o.price,
                    quantity: o.orig_qty,
                    reduce_only: o.reduce_only,
                    status: OrderStatus::from_exchange(&o.status),
                    placed_at,
                })
            })
            .collect()
    }

    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>, GatewayError> {
        let mut params = BTreeMap::new();
        let response: Vec<PositionResponse> =
            self._get_signed("/fapi/v2/positionRisk", &mut params).await?;

        Ok(response
            .into_iter()
            .filter(|p| !p.position_amt.is_zero())
            .map(|p| {
                let direction = if p.position_amt.is_sign_positive() {
                    Direction::Long
                } else {
                    Direction::Short
                };
                PositionSnapshot {
                    instrument: p.symbol,
                    direction,
                    quantity: p.position_amt.abs(),
                    entry_price: p.entry_price,
                    mark_price: p.mark_price,
                    unrealized_pnl: p.un_realized_profit,
                }
            })
            .collect())
    }

    async fn get_balance(&self) -> Result<AccountBalance, GatewayError> {
        let mut params = BTreeMap::new();
        let response: Vec<BalanceResponse> =
            self._get_signed("/fapi/v2/balance", &mut params).await?;

        let usdt = response
            .iter()
            .find(|b| b.asset == "USDT")
            .ok_or_else(|| GatewayError::InvalidData("no USDT balance in account".to_string()))?;
        Ok(AccountBalance {
            available: usdt.available_balance,
            locked: usdt.balance - usdt.available_balance,
            total: usdt.balance,
        })
    }

    async fn get_last_price(&self, instrument: &str) -> Result<Decimal, GatewayError> {
        let url = format!("{}/fapi/v1/ticker/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", instrument)])
            .send()
            .await?;
        let ticker: responses::TickerPriceResponse = Self::read_response(response)
            .await
            .map_err(|_| GatewayError::NoData(instrument.to_string()))?;
        Ok(ticker.price)
    }

    async fn fetch_recent_samples(
        &self,
        instrument: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<PriceSample>, GatewayError> {
        let url = format!("{}/fapi/v1/klines", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", instrument),
                ("interval", interval),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await?
            .json::<Vec<RawKline>>()
            .await?;

        response
            .into_iter()
            .map(|raw| {
                Ok(PriceSample {
                    open_time: Utc.timestamp_millis_opt(raw.0).single().ok_or_else(|| {
                        GatewayError::InvalidData(format!("Invalid open_time: {}", raw.0))
                    })?,
                    high: decimal_field(&raw.2)?,
                    low: decimal_field(&raw.3)?,
                    close: decimal_field(&raw.4)?,
                    volume: decimal_field(&raw.5)?,
                    close_time: Utc.timestamp_millis_opt(raw.6).single().ok_or_else(|| {
                        GatewayError::InvalidData(format!("Invalid close_time: {}", raw.6))
                    })?,
                })
            })
            .collect()
    }

    async fn set_leverage(&self, instrument: &str, leverage: u8) -> Result<(), GatewayError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", instrument.to_string());
        params.insert("leverage", leverage.to_string());

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        #[allow(dead_code)]
        struct LeverageResponse {
            leverage: u8,
            symbol: String,
        }
        self._post_signed::<LeverageResponse>("/fapi/v1/leverage", &mut params).await?;
        Ok(())
    }
}
