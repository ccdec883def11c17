pub mod command;
pub mod config;
pub mod logging;
pub mod panel;
pub mod store;
pub mod tui;
pub mod widgets;

pub use panel::{PanelWidget, TradePanel};
pub use store::{FuturesStore, TradeActions, TradeStateReader};
