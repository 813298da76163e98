//! Trading Gateway Data Models
//!
//! Typed records for the gateway bridge. The gateway reports unknown numbers
//! as `"N/A"`, `null` or non-finite floats; those decode to `None` here so the
//! rest of the crate never compares against sentinel values.

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Envelope
// ============================================================================

/// Return code for a successful gateway call
pub const RET_OK: i32 = 0;

/// Response envelope shared by every bridge endpoint
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// `RET_OK` on success, negative otherwise
    pub ret: i32,
    /// Payload, present on success
    pub data: Option<T>,
    /// Error message on failure
    #[serde(default)]
    pub msg: Option<String>,
}

// ============================================================================
// Lenient decoding
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Text(String),
}

/// Decode a number that may arrive as `"N/A"`, a numeric string or `null`
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<RawValue>::deserialize(deserializer)? {
        Some(RawValue::Number(v)) if v.is_finite() => Some(v),
        Some(RawValue::Text(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}

/// Decode a required quantity, treating placeholders as zero
fn lenient_qty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(lenient_f64(deserializer)?.unwrap_or(0.0))
}

/// Decode text where `"N/A"` and empty strings mean absent
fn lenient_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "N/A"))
}

// ============================================================================
// Session scope
// ============================================================================

/// Trading market a session is filtered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TrdMarket {
    #[default]
    HK,
    US,
    CN,
    HKCC,
    SG,
    JP,
}

impl std::fmt::Display for TrdMarket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrdMarket::HK => write!(f, "HK"),
            TrdMarket::US => write!(f, "US"),
            TrdMarket::CN => write!(f, "CN"),
            TrdMarket::HKCC => write!(f, "HKCC"),
            TrdMarket::SG => write!(f, "SG"),
            TrdMarket::JP => write!(f, "JP"),
        }
    }
}

impl std::str::FromStr for TrdMarket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HK" => Ok(TrdMarket::HK),
            "US" => Ok(TrdMarket::US),
            "CN" => Ok(TrdMarket::CN),
            "HKCC" => Ok(TrdMarket::HKCC),
            "SG" => Ok(TrdMarket::SG),
            "JP" => Ok(TrdMarket::JP),
            other => Err(format!("unknown trading market '{}'", other)),
        }
    }
}

/// Real or simulated trading environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrdEnv {
    #[default]
    Real,
    Simulate,
}

impl std::fmt::Display for TrdEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrdEnv::Real => write!(f, "REAL"),
            TrdEnv::Simulate => write!(f, "SIMULATE"),
        }
    }
}

impl std::str::FromStr for TrdEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "REAL" => Ok(TrdEnv::Real),
            "SIMULATE" | "SIM" => Ok(TrdEnv::Simulate),
            other => Err(format!("unknown trading environment '{}'", other)),
        }
    }
}

/// Broker entity the gateway login belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityFirm {
    #[default]
    FutuSecurities,
    FutuInc,
    FutuSg,
}

impl std::fmt::Display for SecurityFirm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityFirm::FutuSecurities => write!(f, "FUTUSECURITIES"),
            SecurityFirm::FutuInc => write!(f, "FUTUINC"),
            SecurityFirm::FutuSg => write!(f, "FUTUSG"),
        }
    }
}

impl std::str::FromStr for SecurityFirm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('_', "").as_str() {
            "FUTUSECURITIES" => Ok(SecurityFirm::FutuSecurities),
            "FUTUINC" => Ok(SecurityFirm::FutuInc),
            "FUTUSG" => Ok(SecurityFirm::FutuSg),
            other => Err(format!("unknown security firm '{}'", other)),
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// Trading account visible to the gateway login
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradeAccount {
    /// Account ID
    pub acc_id: u64,
    /// Environment the account trades in
    #[serde(default)]
    pub trd_env: TrdEnv,
    /// Account type (e.g. "CASH", "MARGIN")
    #[serde(default, deserialize_with = "lenient_text")]
    pub acc_type: Option<String>,
    /// Card number
    #[serde(default, deserialize_with = "lenient_text")]
    pub card_num: Option<String>,
    /// Markets the account is authorized for
    #[serde(default)]
    pub trdmarket_auth: Vec<String>,
    /// Account status (e.g. "ACTIVE")
    #[serde(default, deserialize_with = "lenient_text")]
    pub acc_status: Option<String>,
}

/// Funds and margin of a trading account
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AccountInfo {
    /// Maximum buying power
    #[serde(default, deserialize_with = "lenient_f64")]
    pub power: Option<f64>,
    /// Short-selling buying power
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_power_short: Option<f64>,
    /// Buying power in cash
    #[serde(default, deserialize_with = "lenient_f64")]
    pub net_cash_power: Option<f64>,
    /// Total net assets
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_assets: Option<f64>,
    /// Cash balance
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cash: Option<f64>,
    /// Securities market value
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_val: Option<f64>,
    /// Long market value
    #[serde(default, deserialize_with = "lenient_f64")]
    pub long_mv: Option<f64>,
    /// Short market value
    #[serde(default, deserialize_with = "lenient_f64")]
    pub short_mv: Option<f64>,
    /// Value of pending assets
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pending_asset: Option<f64>,
    /// Cash frozen by working orders
    #[serde(default, deserialize_with = "lenient_f64")]
    pub frozen_cash: Option<f64>,
    /// Cash available for withdrawal
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avl_withdrawal_cash: Option<f64>,
    /// Maximum withdrawal
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_withdrawal: Option<f64>,
    /// Interest charged so far
    #[serde(default, deserialize_with = "lenient_f64")]
    pub interest_charged_amount: Option<f64>,
    /// Initial margin requirement
    #[serde(default, deserialize_with = "lenient_f64")]
    pub initial_margin: Option<f64>,
    /// Maintenance margin requirement
    #[serde(default, deserialize_with = "lenient_f64")]
    pub maintenance_margin: Option<f64>,
    /// Unrealized profit and loss
    #[serde(default, deserialize_with = "lenient_f64")]
    pub unrealized_pl: Option<f64>,
    /// Realized profit and loss
    #[serde(default, deserialize_with = "lenient_f64")]
    pub realized_pl: Option<f64>,
    /// Risk level reported by the broker
    #[serde(default, deserialize_with = "lenient_text")]
    pub risk_status: Option<String>,
    /// Account currency
    #[serde(default, deserialize_with = "lenient_text")]
    pub currency: Option<String>,
}

// ============================================================================
// Positions
// ============================================================================

/// Direction of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    #[default]
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// One row of the position list
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PositionRecord {
    /// Security code (e.g. "HK.00700")
    pub code: String,
    /// Security name
    #[serde(default, deserialize_with = "lenient_text")]
    pub stock_name: Option<String>,
    /// Long or short
    #[serde(default)]
    pub position_side: PositionSide,
    /// Held quantity
    #[serde(default, deserialize_with = "lenient_qty")]
    pub qty: f64,
    /// Quantity that can be sold now
    #[serde(default, deserialize_with = "lenient_qty")]
    pub can_sell_qty: f64,
    /// Diluted cost price
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cost_price: Option<f64>,
    /// Average cost price
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_cost: Option<f64>,
    /// Current market price
    #[serde(default, deserialize_with = "lenient_f64")]
    pub nominal_price: Option<f64>,
    /// Market value
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_val: Option<f64>,
    /// Profit/loss ratio in percent
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pl_ratio: Option<f64>,
    /// Profit/loss amount
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pl_val: Option<f64>,
    /// Today's profit/loss
    #[serde(default, deserialize_with = "lenient_f64")]
    pub today_pl_val: Option<f64>,
    /// Position currency
    #[serde(default, deserialize_with = "lenient_text")]
    pub currency: Option<String>,
}

// ============================================================================
// Quotes
// ============================================================================

/// Market snapshot for a security, including its trading rules
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarketSnapshot {
    /// Security code
    pub code: String,
    /// Security name
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    /// Last traded price
    #[serde(default, deserialize_with = "lenient_f64")]
    pub last_price: Option<f64>,
    /// Previous close
    #[serde(default, deserialize_with = "lenient_f64")]
    pub prev_close_price: Option<f64>,
    /// Session open
    #[serde(default, deserialize_with = "lenient_f64")]
    pub open_price: Option<f64>,
    /// Session high
    #[serde(default, deserialize_with = "lenient_f64")]
    pub high_price: Option<f64>,
    /// Session low
    #[serde(default, deserialize_with = "lenient_f64")]
    pub low_price: Option<f64>,
    /// Traded volume
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
    /// Shares per lot (quantity step)
    pub lot_size: u32,
    /// Minimum price increment at the current price
    pub price_spread: f64,
    /// Snapshot time as reported by the gateway
    #[serde(default, deserialize_with = "lenient_text")]
    pub update_time: Option<String>,
}

/// One price level of an order book
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub volume: f64,
    #[serde(default)]
    pub order_count: u32,
}

/// Order book for a security, best levels first
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderBook {
    pub code: String,
    #[serde(rename = "Ask", alias = "ask", default)]
    pub asks: Vec<BookLevel>,
    #[serde(rename = "Bid", alias = "bid", default)]
    pub bids: Vec<BookLevel>,
}

impl OrderBook {
    /// Best ask price
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    /// Best bid price
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrdSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TrdSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrdSide::Buy => write!(f, "BUY"),
            TrdSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Enhanced limit order
    #[default]
    Normal,
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Normal => write!(f, "NORMAL"),
            OrderType::Market => write!(f, "MARKET"),
        }
    }
}

/// Query for maximum tradable quantities
#[derive(Debug, Clone, Serialize)]
pub struct TradingInfoQuery {
    pub order_type: OrderType,
    pub code: String,
    pub price: f64,
}

/// Maximum tradable quantities for an order
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MaxTradeQuantities {
    /// Maximum quantity buyable with cash
    #[serde(default, deserialize_with = "lenient_qty")]
    pub max_cash_buy: f64,
    /// Maximum quantity buyable with cash and margin
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_cash_and_margin_buy: Option<f64>,
    /// Maximum quantity sellable from the position
    #[serde(default, deserialize_with = "lenient_qty")]
    pub max_position_sell: f64,
    /// Maximum short-sell quantity
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_sell_short: Option<f64>,
    /// Maximum buy-back quantity for a short
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max_buy_back: Option<f64>,
}

/// Request body for order placement
#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderRequest {
    pub code: String,
    pub price: f64,
    pub qty: f64,
    pub trd_side: TrdSide,
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

/// Order acknowledged by the gateway
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlacedOrder {
    pub order_id: String,
    pub code: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub qty: f64,
    pub trd_side: TrdSide,
    #[serde(default, deserialize_with = "lenient_text")]
    pub order_status: Option<String>,
}

impl std::fmt::Display for PlacedOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "order {} status {} | {} {} {} @ {}",
            self.order_id,
            self.order_status.as_deref().unwrap_or("UNKNOWN"),
            self.trd_side,
            self.qty,
            self.code,
            self.price
        )
    }
}
