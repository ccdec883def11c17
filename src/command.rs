use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Messages pushed to the UI by collaborators outside the panel.
#[derive(Debug, Clone)]
pub enum Command {
    LeverageSide(PositionSide),
    FuturesType(FuturesType),
    OrderType(OrderType),
    PricesConnectionError(bool),
    AckOrdersWarning(bool),
    OrderForm(OrderForm),
    Error(String),
    Exit,
}

/// Account and order-entry values shown by the child widgets. Published as
/// a whole by whoever owns the order form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrderForm {
    pub available_margin: f64,
    pub leverage: f64,
    pub margin_delta: f64,
    pub order_price: Option<f64>,
    pub order_size: f64,
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    pub position_size: f64,
    pub fee_rate: f64,
}

impl Default for OrderForm {
    fn default() -> Self {
        OrderForm {
            available_margin: 0.0,
            leverage: 1.0,
            margin_delta: 0.0,
            order_price: None,
            order_size: 0.0,
            stop_loss_price: None,
            take_profit_price: None,
            position_size: 0.0,
            fee_rate: 0.0005,
        }
    }
}

impl OrderForm {
    pub fn estimated_fee(&self) -> f64 {
        (self.margin_delta * self.leverage).abs() * self.fee_rate
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    #[default]
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PositionSide::Long => "Long",
            PositionSide::Short => "Short",
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FuturesType {
    #[default]
    CrossMargin,
    IsolatedMargin,
}

impl FuturesType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuturesType::CrossMargin => "cross_margin",
            FuturesType::IsolatedMargin => "isolated_margin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FuturesType::CrossMargin => "Cross margin",
            FuturesType::IsolatedMargin => "Isolated margin",
        }
    }

    pub fn is_cross_margin(&self) -> bool {
        matches!(self, FuturesType::CrossMargin)
    }

    pub fn toggled(&self) -> FuturesType {
        match self {
            FuturesType::CrossMargin => FuturesType::IsolatedMargin,
            FuturesType::IsolatedMargin => FuturesType::CrossMargin,
        }
    }
}

impl fmt::Display for FuturesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuturesType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cross_margin" | "cross" => Ok(FuturesType::CrossMargin),
            "isolated_margin" | "isolated" => Ok(FuturesType::IsolatedMargin),
            other => Err(format!(
                "unsupported futures type `{other}` (use cross_margin or isolated_margin)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
    StopMarket,
}

impl OrderType {
    pub const ALL: [OrderType; 3] = [OrderType::Market, OrderType::Limit, OrderType::StopMarket];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::StopMarket => "stop_market",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderType::Market => "Market",
            OrderType::Limit => "Limit",
            OrderType::StopMarket => "Stop",
        }
    }

    pub fn is_market(&self) -> bool {
        matches!(self, OrderType::Market)
    }

    /// Next entry in selector order, wrapping in both directions.
    pub fn cycled(&self, reverse: bool) -> OrderType {
        let len = Self::ALL.len();
        let idx = Self::ALL.iter().position(|t| t == self).unwrap_or(0);
        let next = if reverse {
            (idx + len - 1) % len
        } else {
            (idx + 1) % len
        };
        Self::ALL[next]
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            "stop_market" | "stop" => Ok(OrderType::StopMarket),
            other => Err(format!(
                "unsupported order type `{other}` (use market, limit, or stop_market)"
            )),
        }
    }
}
