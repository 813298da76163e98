//! Field-level view of gateway records
//!
//! Diffing and table rendering work on `(name, FieldValue)` pairs so every
//! record kind shares one notion of "this field carries no information".

use std::fmt;

use crate::gateway::{
    AccountInfo, MarketSnapshot, MaxTradeQuantities, PositionRecord, TradeAccount,
};

/// Value of a single record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Missing,
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// True when the value is semantically absent: missing, empty, `N/A`,
    /// zero or not a finite number.
    pub fn is_placeholder(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Number(v) => *v == 0.0 || !v.is_finite(),
            FieldValue::Text(s) => {
                let s = s.trim();
                s.is_empty() || s.eq_ignore_ascii_case("N/A")
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Missing => write!(f, "N/A"),
            FieldValue::Number(v) => write!(f, "{}", v),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(FieldValue::Missing, FieldValue::Number)
    }
}

impl From<&Option<String>> for FieldValue {
    fn from(v: &Option<String>) -> Self {
        v.as_ref()
            .map_or(FieldValue::Missing, |s| FieldValue::Text(s.clone()))
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// A record that can be listed field by field
///
/// Implementations must return the same field names in the same order for
/// every value of the type.
pub trait Record {
    fn fields(&self) -> Vec<(&'static str, FieldValue)>;
}

impl Record for AccountInfo {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("power", self.power.into()),
            ("max_power_short", self.max_power_short.into()),
            ("net_cash_power", self.net_cash_power.into()),
            ("total_assets", self.total_assets.into()),
            ("cash", self.cash.into()),
            ("market_val", self.market_val.into()),
            ("long_mv", self.long_mv.into()),
            ("short_mv", self.short_mv.into()),
            ("pending_asset", self.pending_asset.into()),
            ("frozen_cash", self.frozen_cash.into()),
            ("avl_withdrawal_cash", self.avl_withdrawal_cash.into()),
            ("max_withdrawal", self.max_withdrawal.into()),
            ("interest_charged_amount", self.interest_charged_amount.into()),
            ("initial_margin", self.initial_margin.into()),
            ("maintenance_margin", self.maintenance_margin.into()),
            ("unrealized_pl", self.unrealized_pl.into()),
            ("realized_pl", self.realized_pl.into()),
            ("risk_status", (&self.risk_status).into()),
            ("currency", (&self.currency).into()),
        ]
    }
}

impl Record for PositionRecord {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("code", self.code.as_str().into()),
            ("stock_name", (&self.stock_name).into()),
            ("position_side", self.position_side.to_string().as_str().into()),
            ("qty", self.qty.into()),
            ("can_sell_qty", self.can_sell_qty.into()),
            ("cost_price", self.cost_price.into()),
            ("average_cost", self.average_cost.into()),
            ("nominal_price", self.nominal_price.into()),
            ("market_val", self.market_val.into()),
            ("pl_ratio", self.pl_ratio.into()),
            ("pl_val", self.pl_val.into()),
            ("today_pl_val", self.today_pl_val.into()),
            ("currency", (&self.currency).into()),
        ]
    }
}

impl Record for TradeAccount {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("acc_id", self.acc_id.to_string().as_str().into()),
            ("trd_env", self.trd_env.to_string().as_str().into()),
            ("acc_type", (&self.acc_type).into()),
            ("card_num", (&self.card_num).into()),
            ("trdmarket_auth", self.trdmarket_auth.join(",").as_str().into()),
            ("acc_status", (&self.acc_status).into()),
        ]
    }
}

impl Record for MarketSnapshot {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("code", self.code.as_str().into()),
            ("name", (&self.name).into()),
            ("last_price", self.last_price.into()),
            ("prev_close_price", self.prev_close_price.into()),
            ("open_price", self.open_price.into()),
            ("high_price", self.high_price.into()),
            ("low_price", self.low_price.into()),
            ("volume", self.volume.into()),
            ("lot_size", f64::from(self.lot_size).into()),
            ("price_spread", self.price_spread.into()),
            ("update_time", (&self.update_time).into()),
        ]
    }
}

impl Record for MaxTradeQuantities {
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("max_cash_buy", self.max_cash_buy.into()),
            ("max_cash_and_margin_buy", self.max_cash_and_margin_buy.into()),
            ("max_position_sell", self.max_position_sell.into()),
            ("max_sell_short", self.max_sell_short.into()),
            ("max_buy_back", self.max_buy_back.into()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_predicate() {
        assert!(FieldValue::Missing.is_placeholder());
        assert!(FieldValue::Number(0.0).is_placeholder());
        assert!(FieldValue::Number(f64::NAN).is_placeholder());
        assert!(FieldValue::from("N/A").is_placeholder());
        assert!(FieldValue::from("  ").is_placeholder());

        assert!(!FieldValue::Number(-3.5).is_placeholder());
        assert!(!FieldValue::from("HKD").is_placeholder());
    }

    #[test]
    fn test_field_order_is_stable() {
        let a = AccountInfo::default();
        let b = AccountInfo {
            cash: Some(1000.0),
            ..Default::default()
        };
        let names_a: Vec<_> = a.fields().into_iter().map(|(n, _)| n).collect();
        let names_b: Vec<_> = b.fields().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_number_display() {
        assert_eq!(FieldValue::Number(1500.0).to_string(), "1500");
        assert_eq!(FieldValue::Number(12.25).to_string(), "12.25");
        assert_eq!(FieldValue::Missing.to_string(), "N/A");
    }
}
