//! Scripted in-memory gateway for tests
//!
//! Account and position queries pop pre-recorded results in order; once a
//! script runs dry the query fails. Quote and order calls answer from fixed
//! fixtures and record what they were asked.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::error::{GatewayError, GatewayResult};
use super::models::*;
use super::TradingGateway;

#[derive(Default)]
pub(crate) struct ScriptedGateway {
    accounts: Mutex<VecDeque<GatewayResult<AccountInfo>>>,
    positions: Mutex<VecDeque<GatewayResult<Vec<PositionRecord>>>>,
    account_calls: AtomicUsize,
    position_calls: AtomicUsize,
    trade_accounts: Mutex<Vec<TradeAccount>>,
    snapshots: Mutex<HashMap<String, MarketSnapshot>>,
    order_books: Mutex<HashMap<String, OrderBook>>,
    trading_info: Mutex<Option<MaxTradeQuantities>>,
    unlock_result: Mutex<Option<GatewayError>>,
    unlocks: Mutex<Vec<String>>,
    orders: Mutex<Vec<PlaceOrderRequest>>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_account(&self, result: GatewayResult<AccountInfo>) {
        self.accounts.lock().unwrap().push_back(result);
    }

    pub(crate) fn push_positions(&self, result: GatewayResult<Vec<PositionRecord>>) {
        self.positions.lock().unwrap().push_back(result);
    }

    pub(crate) fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn position_calls(&self) -> usize {
        self.position_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn set_trade_accounts(&self, accounts: Vec<TradeAccount>) {
        *self.trade_accounts.lock().unwrap() = accounts;
    }

    pub(crate) fn set_snapshot(&self, snapshot: MarketSnapshot) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.code.clone(), snapshot);
    }

    pub(crate) fn set_order_book(&self, book: OrderBook) {
        self.order_books
            .lock()
            .unwrap()
            .insert(book.code.clone(), book);
    }

    pub(crate) fn set_trading_info(&self, info: MaxTradeQuantities) {
        *self.trading_info.lock().unwrap() = Some(info);
    }

    pub(crate) fn fail_unlock(&self, err: GatewayError) {
        *self.unlock_result.lock().unwrap() = Some(err);
    }

    pub(crate) fn unlocks(&self) -> Vec<String> {
        self.unlocks.lock().unwrap().clone()
    }

    pub(crate) fn orders(&self) -> Vec<PlaceOrderRequest> {
        self.orders.lock().unwrap().clone()
    }
}

impl TradingGateway for ScriptedGateway {
    async fn query_account_info(&self) -> GatewayResult<AccountInfo> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.accounts.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(GatewayError::query("accinfo_query", "script exhausted")))
    }

    async fn query_position_list(&self, code: Option<&str>) -> GatewayResult<Vec<PositionRecord>> {
        self.position_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.positions.lock().unwrap().pop_front();
        let rows = next.unwrap_or_else(|| {
            Err(GatewayError::query("position_list_query", "script exhausted"))
        })?;
        Ok(match code {
            Some(code) => rows.into_iter().filter(|r| r.code == code).collect(),
            None => rows,
        })
    }

    async fn list_accounts(&self) -> GatewayResult<Vec<TradeAccount>> {
        Ok(self.trade_accounts.lock().unwrap().clone())
    }

    async fn unlock_trade(&self, password: &str) -> GatewayResult<()> {
        self.unlocks.lock().unwrap().push(password.to_string());
        match self.unlock_result.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn get_market_snapshot(&self, codes: &[String]) -> GatewayResult<Vec<MarketSnapshot>> {
        let snapshots = self.snapshots.lock().unwrap();
        codes
            .iter()
            .map(|code| {
                snapshots
                    .get(code)
                    .cloned()
                    .ok_or_else(|| {
                        GatewayError::query("get_market_snapshot", format!("unknown code {}", code))
                    })
            })
            .collect()
    }

    async fn get_order_book(&self, code: &str, depth: u32) -> GatewayResult<OrderBook> {
        let mut book = self
            .order_books
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| GatewayError::query("get_order_book", format!("no L1 for {}", code)))?;
        book.asks.truncate(depth as usize);
        book.bids.truncate(depth as usize);
        Ok(book)
    }

    async fn query_trading_info(
        &self,
        _query: &TradingInfoQuery,
    ) -> GatewayResult<MaxTradeQuantities> {
        self.trading_info
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GatewayError::query("acctradinginfo_query", "no trading info"))
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> GatewayResult<PlacedOrder> {
        let mut orders = self.orders.lock().unwrap();
        orders.push(request.clone());
        Ok(PlacedOrder {
            order_id: format!("SCRIPTED-{}", orders.len()),
            code: request.code.clone(),
            price: request.price,
            qty: request.qty,
            trd_side: request.trd_side,
            order_status: Some("SUBMITTED".to_string()),
        })
    }
}
