use core_types::OrderSide;
use rust_decimal::Decimal;
use serde::Deserialize;

// `#[serde(rename_all = "camelCase")]` maps the exchange's JSON camelCase
// onto Rust snake_case.

/// The response from a successful `POST /fapi/v1/order` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub client_order_id: String,
    pub executed_qty: Decimal,
    pub order_id: i64,
    pub avg_price: Decimal,
    pub orig_qty: Decimal,
    pub price: Decimal,
    pub reduce_only: bool,
    pub side: OrderSide,
    pub status: String,
    pub symbol: String,
}

/// A resting order from `GET /fapi/v1/openOrders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderResponse {
    pub order_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub orig_qty: Decimal,
    pub reduce_only: bool,
    pub status: String,
    /// Placement time in epoch milliseconds.
    pub time: i64,
}

/// A single asset's balance from `GET /fapi/v2/balance`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub asset: String,
    pub balance: Decimal,
    pub available_balance: Decimal,
}

/// A single open position from `GET /fapi/v2/positionRisk`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub position_amt: Decimal,
    pub symbol: String,
    pub un_realized_profit: Decimal,
}

/// The response from `GET /fapi/v1/ticker/price`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerPriceResponse {
    pub symbol: String,
    pub price: Decimal,
}

/// Represents an error response from the exchange API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i32,
    pub msg: String,
}
