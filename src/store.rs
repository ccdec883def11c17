use anyhow::Result as AnyResult;
use tracing::{debug, info, warn};

use crate::command::{Command, FuturesType, OrderForm, OrderType, PositionSide};
use crate::config::{PanelPrefs, PanelPrefsStore};

/// Read side of the futures state the panel observes.
pub trait TradeStateReader {
    fn leverage_side(&self) -> PositionSide;
    fn futures_type(&self) -> FuturesType;
    fn order_type(&self) -> OrderType;
    fn prices_connection_error(&self) -> bool;
    fn acked_orders_warning(&self) -> bool;
}

/// Actions the panel dispatches back to the store.
pub trait TradeActions {
    fn change_leverage_side(&mut self, side: PositionSide);
    fn set_order_type(&mut self, order_type: OrderType);
}

#[derive(Clone, Debug)]
pub struct FuturesState {
    pub market_asset: String,
    pub leverage_side: PositionSide,
    pub futures_type: FuturesType,
    pub order_type: OrderType,
    pub prices_connection_error: bool,
    pub acked_orders_warning: bool,
    pub form: OrderForm,
}

impl FuturesState {
    pub fn new(market_asset: impl Into<String>) -> Self {
        FuturesState {
            market_asset: market_asset.into(),
            leverage_side: PositionSide::default(),
            futures_type: FuturesType::default(),
            order_type: OrderType::default(),
            prices_connection_error: false,
            acked_orders_warning: false,
            form: OrderForm::default(),
        }
    }
}

pub struct FuturesStore {
    state: FuturesState,
    prefs: Option<PanelPrefsStore>,
}

impl FuturesStore {
    pub fn new(state: FuturesState, prefs: Option<PanelPrefsStore>) -> Self {
        FuturesStore { state, prefs }
    }

    /// Seeds the acknowledgement flag from the preferences file, if any.
    pub fn load_prefs(&mut self) -> AnyResult<()> {
        let Some(store) = &self.prefs else {
            return Ok(());
        };
        let prefs = store.load()?;
        self.state.acked_orders_warning = prefs.acked_orders_warning;
        debug!(
            path = %store.path().display(),
            acked = prefs.acked_orders_warning,
            "loaded panel preferences"
        );
        Ok(())
    }

    pub fn state(&self) -> &FuturesState {
        &self.state
    }

    pub fn set_futures_type(&mut self, futures_type: FuturesType) -> bool {
        if self.state.futures_type == futures_type {
            return false;
        }
        info!(from = %self.state.futures_type, to = %futures_type, "futures type changed");
        self.state.futures_type = futures_type;
        true
    }

    pub fn set_prices_connection_error(&mut self, error: bool) -> bool {
        if self.state.prices_connection_error == error {
            return false;
        }
        if error {
            warn!("price feed connection lost");
        } else {
            info!("price feed connection restored");
        }
        self.state.prices_connection_error = error;
        true
    }

    /// Sets the global "don't show again" flag. The in-memory flag is kept
    /// even when persisting it fails.
    pub fn acknowledge_orders_warning(&mut self, acked: bool) -> AnyResult<bool> {
        if self.state.acked_orders_warning == acked {
            return Ok(false);
        }
        self.state.acked_orders_warning = acked;
        info!(acked, "order warning acknowledgement changed");
        if let Some(store) = &self.prefs {
            let prefs = if acked {
                PanelPrefs::acknowledged_now()
            } else {
                PanelPrefs::default()
            };
            store.save(&prefs)?;
        }
        Ok(true)
    }

    /// Replaces the values the child widgets display.
    pub fn set_order_form(&mut self, form: OrderForm) -> bool {
        if self.state.form == form {
            return false;
        }
        debug!(
            available_margin = form.available_margin,
            order_size = form.order_size,
            position_size = form.position_size,
            "order form updated"
        );
        self.state.form = form;
        true
    }

    /// Routes a message from an external collaborator. Returns whether any
    /// observed state changed.
    pub fn apply(&mut self, command: Command) -> AnyResult<bool> {
        let changed = match command {
            Command::LeverageSide(side) => self.update_leverage_side(side),
            Command::FuturesType(futures_type) => self.set_futures_type(futures_type),
            Command::OrderType(order_type) => self.update_order_type(order_type),
            Command::PricesConnectionError(error) => self.set_prices_connection_error(error),
            Command::AckOrdersWarning(acked) => self.acknowledge_orders_warning(acked)?,
            Command::OrderForm(form) => self.set_order_form(form),
            Command::Error(_) | Command::Exit => false,
        };
        Ok(changed)
    }

    fn update_leverage_side(&mut self, side: PositionSide) -> bool {
        if self.state.leverage_side == side {
            return false;
        }
        info!(from = %self.state.leverage_side, to = %side, "leverage side changed");
        self.state.leverage_side = side;
        true
    }

    fn update_order_type(&mut self, order_type: OrderType) -> bool {
        if self.state.order_type == order_type {
            return false;
        }
        info!(from = %self.state.order_type, to = %order_type, "order type changed");
        self.state.order_type = order_type;
        true
    }
}

impl TradeStateReader for FuturesStore {
    fn leverage_side(&self) -> PositionSide {
        self.state.leverage_side
    }

    fn futures_type(&self) -> FuturesType {
        self.state.futures_type
    }

    fn order_type(&self) -> OrderType {
        self.state.order_type
    }

    fn prices_connection_error(&self) -> bool {
        self.state.prices_connection_error
    }

    fn acked_orders_warning(&self) -> bool {
        self.state.acked_orders_warning
    }
}

impl TradeActions for FuturesStore {
    fn change_leverage_side(&mut self, side: PositionSide) {
        self.update_leverage_side(side);
    }

    fn set_order_type(&mut self, order_type: OrderType) {
        self.update_order_type(order_type);
    }
}
