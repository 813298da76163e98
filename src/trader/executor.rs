//! Trader helpers
//!
//! One-shot account, quote and order operations on top of a gateway session,
//! plus the sell-down loop that closes a position in whole lots.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::gateway::{
    AccountInfo, OrderType, PlaceOrderRequest, PlacedOrder, PositionRecord, TradingGateway,
    TradingInfoQuery, TrdEnv, TrdSide,
};
use crate::watch::table;

/// Lot size and minimum price increment for a security
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingRule {
    pub lot_size: u32,
    pub price_step: f64,
}

/// Best ask and bid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub ask: f64,
    pub bid: f64,
}

/// Account, quote and order helpers for one gateway session
pub struct Trader<G> {
    gateway: G,
    env: TrdEnv,
}

impl<G: TradingGateway> Trader<G> {
    pub fn new(gateway: G, env: TrdEnv) -> Self {
        Self { gateway, env }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Account ids visible to the login; the first one is the real account
    pub async fn list_accounts(&self) -> Result<Vec<u64>> {
        let accounts = self
            .gateway
            .list_accounts()
            .await
            .context("get_acc_list failed")?;
        info!("<-- Account list\n{}", table::render_rows(&accounts));
        Ok(accounts.iter().map(|a| a.acc_id).collect())
    }

    /// Unlock trading.
    ///
    /// Returns `false` when no password is configured or the gateway refuses.
    /// Simulated trading needs no unlock.
    pub async fn unlock_trade(&self, password: Option<&str>) -> Result<bool> {
        let Some(password) = password else {
            warn!("No FUTU_TRADING_PSWD set in environment");
            return Ok(false);
        };
        if self.env == TrdEnv::Simulate {
            return Ok(true);
        }
        match self.gateway.unlock_trade(password).await {
            Ok(()) => {
                info!("<-- Trade unlocked");
                Ok(true)
            }
            Err(e) => {
                error!("<-- failed in unlock_trade(): {}", e);
                Ok(false)
            }
        }
    }

    pub async fn account_info(&self) -> Result<AccountInfo> {
        let info = self
            .gateway
            .query_account_info()
            .await
            .context("accinfo_query failed")?;
        info!("<-- Account info\n{}", table::render_record(&info));
        Ok(info)
    }

    pub async fn list_positions(&self) -> Result<Vec<PositionRecord>> {
        let rows = self
            .gateway
            .query_position_list(None)
            .await
            .context("position_list_query failed")?;
        info!("<-- Position list\n{}", table::render_rows(&rows));
        Ok(rows)
    }

    // ========================================================================
    // Quotes & rules
    // ========================================================================

    /// Lot size and price step from the market snapshot
    pub async fn price_step(&self, code: &str) -> Result<TradingRule> {
        let snapshots = self
            .gateway
            .get_market_snapshot(&[code.to_string()])
            .await
            .with_context(|| format!("Failed to get market snapshot for {}", code))?;
        let snapshot = snapshots
            .into_iter()
            .find(|s| s.code == code)
            .ok_or_else(|| anyhow!("No market snapshot returned for {}", code))?;

        info!(
            "<-- Trading rule & market snapshot {}\n{}",
            code,
            table::render_record(&snapshot)
        );
        let rule = TradingRule {
            lot_size: snapshot.lot_size,
            price_step: snapshot.price_spread,
        };
        info!("<-- {} qty {} price_step {}", code, rule.lot_size, rule.price_step);
        Ok(rule)
    }

    /// Held quantity of `code`, 0 when there is no position
    pub async fn holding_position(&self, code: &str) -> Result<f64> {
        let rows = self
            .gateway
            .query_position_list(Some(code))
            .await
            .with_context(|| format!("Failed in getting position {}", code))?;
        let qty = rows.first().map(|r| r.qty).unwrap_or(0.0);
        info!("Position {} {}", code, qty);
        Ok(qty)
    }

    /// Best ask and bid from the top of the order book
    pub async fn best_quote(&self, code: &str) -> Result<Quote> {
        let book = self
            .gateway
            .get_order_book(code, 1)
            .await
            .with_context(|| format!("No L1 for {}", code))?;
        match (book.best_ask(), book.best_bid()) {
            (Some(ask), Some(bid)) => Ok(Quote { ask, bid }),
            _ => Err(anyhow!("Order book for {} has an empty side", code)),
        }
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Whether the account can trade `qty` (positive buys, negative sells) at `price`
    pub async fn is_valid_quantity(&self, code: &str, qty: f64, price: f64) -> Result<bool> {
        if qty == 0.0 {
            return Ok(false);
        }
        let query = TradingInfoQuery {
            order_type: OrderType::Normal,
            code: code.to_string(),
            price,
        };
        let limits = self
            .gateway
            .query_trading_info(&query)
            .await
            .with_context(|| format!("Failed in getting valid qty for {}", code))?;

        Ok(if qty > 0.0 {
            qty < limits.max_cash_buy
        } else {
            qty.abs() < limits.max_position_sell
        })
    }

    /// Limit buy at the current ask, `None` when the quantity is not tradable
    pub async fn buy_at_ask(
        &self,
        code: &str,
        qty: f64,
        remark: Option<String>,
    ) -> Result<Option<PlacedOrder>> {
        let quote = self.best_quote(code).await?;
        if !self.is_valid_quantity(code, qty, quote.ask).await? {
            warn!("Order quantity {} for {} beyond valid amount", qty, code);
            return Ok(None);
        }

        let order = self
            .gateway
            .place_order(&PlaceOrderRequest {
                code: code.to_string(),
                price: quote.ask,
                qty,
                trd_side: TrdSide::Buy,
                order_type: OrderType::Normal,
                remark,
            })
            .await
            .with_context(|| format!("Failed in placing buy order for {}", code))?;
        info!("{}", order);
        Ok(Some(order))
    }

    /// Sell the sellable quantity of `code` rounded down to whole lots, at the bid.
    ///
    /// Does nothing unless the sellable quantity exceeds one lot.
    pub async fn sell_down_step(&self, code: &str, lot: u32) -> Result<Option<PlacedOrder>> {
        let lot = f64::from(lot.max(1));
        let rows = self
            .gateway
            .query_position_list(Some(code))
            .await
            .with_context(|| format!("Failed in getting position {}", code))?;

        let Some(position) = rows.first().filter(|r| r.code == code) else {
            return Ok(None);
        };
        if position.can_sell_qty <= lot {
            return Ok(None);
        }

        let close_qty = (position.can_sell_qty / lot).floor() * lot;
        let quote = self.best_quote(code).await?;
        if !self.is_valid_quantity(code, -close_qty, quote.bid).await? {
            warn!("Sell quantity {} for {} beyond valid amount", close_qty, code);
            return Ok(None);
        }

        let order = self
            .gateway
            .place_order(&PlaceOrderRequest {
                code: code.to_string(),
                price: quote.bid,
                qty: close_qty,
                trd_side: TrdSide::Sell,
                order_type: OrderType::Normal,
                remark: Some(format!("Sell {}", close_qty)),
            })
            .await
            .with_context(|| format!("Failed in placing sell order for {}", code))?;
        info!("{}", order);
        Ok(Some(order))
    }

    /// Repeat [`Self::sell_down_step`] every `interval` until shutdown
    pub async fn sell_down(
        &self,
        code: &str,
        lot: u32,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!("Start selling {} in lots of {}", code, lot);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.recv() => {
                    info!("Sell-down for {} stopped", code);
                    return Ok(());
                }
            }

            if let Err(e) = self.sell_down_step(code, lot).await {
                error!("Sell-down step for {} failed: {:#}", code, e);
            }
        }
    }
}
