//! Trading Gateway Integration
//!
//! Everything that reaches the local trading gateway goes through the
//! [`TradingGateway`] trait. The watcher and the trader helpers are generic
//! over it, so tests drive them with a scripted gateway while the binary uses
//! the HTTP bridge client.
//!
//! # Components
//!
//! - [`client`] - HTTP bridge client scoped to one market/account session
//! - [`models`] - Typed records returned by the gateway
//! - [`error`] - Query, connection and decode failures
//!
//! # Environment Variables
//!
//! - `FUTU_TRADING_ADDR` (optional) - Gateway host, defaults to `127.0.0.1`
//! - `FUTU_TRADING_PORT` (optional) - Gateway port, defaults to `11111`
//! - `FUTU_TRADING_MARKET` (optional) - Market filter, defaults to `HK`
//! - `FUTU_TRADING_ENV` (optional) - `REAL` or `SIMULATE`, defaults to `REAL`
//! - `FUTU_TRADING_PSWD` (optional) - Trade unlock password
//!
//! # Endpoints Used
//!
//! - `GET /global_state` - Connectivity check
//! - `GET /trade/acc_list` - Trading accounts
//! - `POST /trade/unlock` - Unlock trading
//! - `GET /trade/accinfo` - Account funds
//! - `GET /trade/position_list` - Positions
//! - `GET /quote/market_snapshot` - Market snapshot and trading rules
//! - `GET /quote/order_book` - Order book
//! - `GET /trade/acctradinginfo` - Maximum tradable quantities
//! - `POST /trade/place_order` - Place orders

use std::future::Future;
use std::sync::Arc;

pub mod client;
pub mod error;
pub mod models;

#[cfg(test)]
pub(crate) mod scripted;

// Re-export commonly used types
pub use client::GatewayClient;
pub use error::{GatewayError, GatewayResult};
pub use models::{
    AccountInfo, BookLevel, MarketSnapshot, MaxTradeQuantities, OrderBook, OrderType,
    PlaceOrderRequest, PlacedOrder, PositionRecord, PositionSide, SecurityFirm, TradeAccount,
    TradingInfoQuery, TrdEnv, TrdMarket, TrdSide,
};

/// Operations offered by the trading gateway for one session.
///
/// A session is already scoped to a market, trading environment and
/// (optionally) an account, so none of the calls take those as arguments.
pub trait TradingGateway: Send + Sync {
    /// Funds and margin of the session's account.
    fn query_account_info(&self) -> impl Future<Output = GatewayResult<AccountInfo>> + Send;

    /// Positions, optionally filtered to a single security code.
    fn query_position_list(
        &self,
        code: Option<&str>,
    ) -> impl Future<Output = GatewayResult<Vec<PositionRecord>>> + Send;

    /// Trading accounts visible to the gateway login.
    fn list_accounts(&self) -> impl Future<Output = GatewayResult<Vec<TradeAccount>>> + Send;

    /// Unlock trading with the trade password.
    fn unlock_trade(&self, password: &str) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Market snapshot (price and trading rules) for each code.
    fn get_market_snapshot(
        &self,
        codes: &[String],
    ) -> impl Future<Output = GatewayResult<Vec<MarketSnapshot>>> + Send;

    /// Order book for a code, `depth` levels per side.
    fn get_order_book(
        &self,
        code: &str,
        depth: u32,
    ) -> impl Future<Output = GatewayResult<OrderBook>> + Send;

    /// Maximum buy/sell quantities for an order at a price.
    fn query_trading_info(
        &self,
        query: &TradingInfoQuery,
    ) -> impl Future<Output = GatewayResult<MaxTradeQuantities>> + Send;

    /// Place an order.
    fn place_order(
        &self,
        request: &PlaceOrderRequest,
    ) -> impl Future<Output = GatewayResult<PlacedOrder>> + Send;
}

/// A shared gateway, e.g. one connection used by both the watcher and the
/// trader helpers
impl<T: TradingGateway> TradingGateway for Arc<T> {
    fn query_account_info(&self) -> impl Future<Output = GatewayResult<AccountInfo>> + Send {
        (**self).query_account_info()
    }

    fn query_position_list(
        &self,
        code: Option<&str>,
    ) -> impl Future<Output = GatewayResult<Vec<PositionRecord>>> + Send {
        (**self).query_position_list(code)
    }

    fn list_accounts(&self) -> impl Future<Output = GatewayResult<Vec<TradeAccount>>> + Send {
        (**self).list_accounts()
    }

    fn unlock_trade(&self, password: &str) -> impl Future<Output = GatewayResult<()>> + Send {
        (**self).unlock_trade(password)
    }

    fn get_market_snapshot(
        &self,
        codes: &[String],
    ) -> impl Future<Output = GatewayResult<Vec<MarketSnapshot>>> + Send {
        (**self).get_market_snapshot(codes)
    }

    fn get_order_book(
        &self,
        code: &str,
        depth: u32,
    ) -> impl Future<Output = GatewayResult<OrderBook>> + Send {
        (**self).get_order_book(code, depth)
    }

    fn query_trading_info(
        &self,
        query: &TradingInfoQuery,
    ) -> impl Future<Output = GatewayResult<MaxTradeQuantities>> + Send {
        (**self).query_trading_info(query)
    }

    fn place_order(
        &self,
        request: &PlaceOrderRequest,
    ) -> impl Future<Output = GatewayResult<PlacedOrder>> + Send {
        (**self).place_order(request)
    }
}
