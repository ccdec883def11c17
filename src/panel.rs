use tracing::debug;

use crate::command::{FuturesType, OrderType, PositionSide};
use crate::store::{TradeActions, TradeStateReader};

pub const PRICE_FEED_ERROR_MESSAGE: &str =
    "Failed to connect to price feed. Please try disabling any ad blockers and refresh.";

/// Children the panel can compose, in the order they may appear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelWidget {
    CloseOnlyPrompt,
    MarketsDropdown,
    TradeBalance,
    PositionButtons,
    PriceFeedError,
    OrderTypeSelector,
    Spacer,
    OrderAcknowledgement,
    MarginInput,
    OrderPriceInput,
    OrderSizing,
    LeverageInput,
    SltpInputs,
    ManagePosition,
    FeeInfo,
}

/// Everything a composition rule may look at.
#[derive(Clone, Copy, Debug)]
struct RuleContext {
    mobile: bool,
    futures_type: FuturesType,
    order_type: OrderType,
    prices_connection_error: bool,
    show_order_warning: bool,
}

impl RuleContext {
    fn cross_margin(&self) -> bool {
        self.futures_type.is_cross_margin()
    }
}

struct Rule {
    widget: PanelWidget,
    when: fn(&RuleContext) -> bool,
}

const COMPOSITION: &[Rule] = &[
    Rule {
        widget: PanelWidget::MarketsDropdown,
        when: |_| true,
    },
    Rule {
        widget: PanelWidget::TradeBalance,
        when: |ctx| !ctx.mobile,
    },
    Rule {
        widget: PanelWidget::PositionButtons,
        when: |_| true,
    },
    Rule {
        widget: PanelWidget::PriceFeedError,
        when: |ctx| ctx.prices_connection_error,
    },
    Rule {
        widget: PanelWidget::OrderTypeSelector,
        when: |ctx| ctx.cross_margin(),
    },
    // warning branch
    Rule {
        widget: PanelWidget::Spacer,
        when: |ctx| ctx.show_order_warning,
    },
    Rule {
        widget: PanelWidget::OrderAcknowledgement,
        when: |ctx| ctx.show_order_warning,
    },
    // input branch
    Rule {
        widget: PanelWidget::MarginInput,
        when: |ctx| !ctx.show_order_warning && ctx.cross_margin(),
    },
    Rule {
        widget: PanelWidget::OrderPriceInput,
        when: |ctx| !ctx.show_order_warning && ctx.cross_margin() && !ctx.order_type.is_market(),
    },
    Rule {
        widget: PanelWidget::Spacer,
        when: |ctx| !ctx.show_order_warning && ctx.cross_margin() && !ctx.order_type.is_market(),
    },
    Rule {
        widget: PanelWidget::OrderSizing,
        when: |ctx| !ctx.show_order_warning,
    },
    Rule {
        widget: PanelWidget::LeverageInput,
        when: |ctx| !ctx.show_order_warning,
    },
    Rule {
        widget: PanelWidget::SltpInputs,
        when: |ctx| !ctx.show_order_warning && ctx.cross_margin(),
    },
    Rule {
        widget: PanelWidget::ManagePosition,
        when: |ctx| !ctx.show_order_warning,
    },
    Rule {
        widget: PanelWidget::FeeInfo,
        when: |ctx| !ctx.show_order_warning,
    },
];

/// The order-type warning is due for non-market orders until the user has
/// acknowledged it globally.
pub fn order_warning_due(order_type: OrderType, acked_orders_warning: bool) -> bool {
    !acked_orders_warning && !order_type.is_market()
}

#[derive(Clone, Debug)]
pub struct TradePanel {
    close_only: bool,
    mobile: bool,
    show_order_warning: bool,
    observed: Option<(OrderType, bool)>,
}

impl TradePanel {
    pub fn new(close_only: bool, mobile: bool) -> Self {
        TradePanel {
            close_only,
            mobile,
            show_order_warning: false,
            observed: None,
        }
    }

    pub fn is_close_only(&self) -> bool {
        self.close_only
    }

    pub fn is_mobile(&self) -> bool {
        self.mobile
    }

    pub fn show_order_warning(&self) -> bool {
        self.show_order_warning
    }

    /// Re-derives the warning flag when the order type or the acknowledgement
    /// flag differs from the last observed pair. Returns whether it re-ran.
    pub fn sync(&mut self, state: &impl TradeStateReader) -> bool {
        let inputs = (state.order_type(), state.acked_orders_warning());
        if self.observed == Some(inputs) {
            return false;
        }
        self.observed = Some(inputs);
        let (order_type, acked) = inputs;
        self.show_order_warning = order_warning_due(order_type, acked);
        debug!(
            order_type = %order_type,
            acked,
            show_order_warning = self.show_order_warning,
            "order warning recomputed"
        );
        true
    }

    pub fn compose(&self, state: &impl TradeStateReader) -> Vec<PanelWidget> {
        if self.close_only {
            return vec![PanelWidget::CloseOnlyPrompt];
        }
        let ctx = RuleContext {
            mobile: self.mobile,
            futures_type: state.futures_type(),
            order_type: state.order_type(),
            prices_connection_error: state.prices_connection_error(),
            show_order_warning: self.show_order_warning,
        };
        COMPOSITION
            .iter()
            .filter(|rule| (rule.when)(&ctx))
            .map(|rule| rule.widget)
            .collect()
    }

    pub fn select_side(&self, side: PositionSide, actions: &mut impl TradeActions) {
        if self.close_only {
            return;
        }
        actions.change_leverage_side(side);
    }

    /// Forwards to the store only while the order-type selector is on screen.
    pub fn select_order_type<S>(&self, order_type: OrderType, store: &mut S) -> bool
    where
        S: TradeStateReader + TradeActions,
    {
        if self.close_only || !store.futures_type().is_cross_margin() {
            return false;
        }
        store.set_order_type(order_type);
        true
    }

    /// Click on the acknowledgement prompt. Flips the local flag only; the
    /// global acknowledgement stays untouched.
    pub fn click_order_acknowledgement(&mut self) -> bool {
        if self.close_only || !self.show_order_warning {
            return false;
        }
        self.show_order_warning = !self.show_order_warning;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    struct FakeState {
        side: PositionSide,
        futures_type: FuturesType,
        order_type: OrderType,
        prices_error: bool,
        acked: bool,
        side_changes: Vec<PositionSide>,
        order_type_changes: Vec<OrderType>,
    }

    impl FakeState {
        fn new(futures_type: FuturesType, order_type: OrderType, acked: bool) -> Self {
            FakeState {
                side: PositionSide::Long,
                futures_type,
                order_type,
                prices_error: false,
                acked,
                side_changes: Vec::new(),
                order_type_changes: Vec::new(),
            }
        }
    }

    impl TradeStateReader for FakeState {
        fn leverage_side(&self) -> PositionSide {
            self.side
        }
        fn futures_type(&self) -> FuturesType {
            self.futures_type
        }
        fn order_type(&self) -> OrderType {
            self.order_type
        }
        fn prices_connection_error(&self) -> bool {
            self.prices_error
        }
        fn acked_orders_warning(&self) -> bool {
            self.acked
        }
    }

    impl TradeActions for FakeState {
        fn change_leverage_side(&mut self, side: PositionSide) {
            self.side = side;
            self.side_changes.push(side);
        }
        fn set_order_type(&mut self, order_type: OrderType) {
            self.order_type = order_type;
            self.order_type_changes.push(order_type);
        }
    }

    const MAIN_INPUTS: [PanelWidget; 7] = [
        PanelWidget::MarginInput,
        PanelWidget::OrderPriceInput,
        PanelWidget::OrderSizing,
        PanelWidget::LeverageInput,
        PanelWidget::SltpInputs,
        PanelWidget::ManagePosition,
        PanelWidget::FeeInfo,
    ];

    fn synced(state: &FakeState, close_only: bool, mobile: bool) -> TradePanel {
        let mut panel = TradePanel::new(close_only, mobile);
        panel.sync(state);
        panel
    }

    #[test]
    fn close_only_renders_only_the_prompt() {
        for futures_type in [FuturesType::CrossMargin, FuturesType::IsolatedMargin] {
            for order_type in OrderType::ALL {
                for acked in [false, true] {
                    for mobile in [false, true] {
                        let mut state = FakeState::new(futures_type, order_type, acked);
                        state.prices_error = true;
                        let panel = synced(&state, true, mobile);
                        assert_eq!(panel.compose(&state), vec![PanelWidget::CloseOnlyPrompt]);
                    }
                }
            }
        }
    }

    #[test]
    fn warning_is_due_only_for_unacked_non_market_orders() {
        for order_type in OrderType::ALL {
            for acked in [false, true] {
                let state = FakeState::new(FuturesType::CrossMargin, order_type, acked);
                let panel = synced(&state, false, false);
                let expected = order_type != OrderType::Market && !acked;
                assert_eq!(panel.show_order_warning(), expected, "{order_type} acked={acked}");
            }
        }
    }

    #[test]
    fn limit_order_shows_warning_instead_of_inputs() {
        let state = FakeState::new(FuturesType::CrossMargin, OrderType::Limit, false);
        let panel = synced(&state, false, false);
        assert_eq!(
            panel.compose(&state),
            vec![
                PanelWidget::MarketsDropdown,
                PanelWidget::TradeBalance,
                PanelWidget::PositionButtons,
                PanelWidget::OrderTypeSelector,
                PanelWidget::Spacer,
                PanelWidget::OrderAcknowledgement,
            ]
        );
    }

    #[test]
    fn market_order_shows_full_input_set() {
        let state = FakeState::new(FuturesType::CrossMargin, OrderType::Market, false);
        let panel = synced(&state, false, false);
        assert_eq!(
            panel.compose(&state),
            vec![
                PanelWidget::MarketsDropdown,
                PanelWidget::TradeBalance,
                PanelWidget::PositionButtons,
                PanelWidget::OrderTypeSelector,
                PanelWidget::MarginInput,
                PanelWidget::OrderSizing,
                PanelWidget::LeverageInput,
                PanelWidget::SltpInputs,
                PanelWidget::ManagePosition,
                PanelWidget::FeeInfo,
            ]
        );
    }

    #[test]
    fn acked_limit_order_includes_price_input_and_spacer() {
        let state = FakeState::new(FuturesType::CrossMargin, OrderType::Limit, true);
        let panel = synced(&state, false, false);
        let widgets = panel.compose(&state);
        let price_idx = widgets
            .iter()
            .position(|w| *w == PanelWidget::OrderPriceInput)
            .expect("price input present");
        assert_eq!(widgets[price_idx - 1], PanelWidget::MarginInput);
        assert_eq!(widgets[price_idx + 1], PanelWidget::Spacer);
        assert_eq!(widgets[price_idx + 2], PanelWidget::OrderSizing);
    }

    #[test]
    fn isolated_margin_omits_cross_only_widgets() {
        for order_type in OrderType::ALL {
            let state = FakeState::new(FuturesType::IsolatedMargin, order_type, true);
            let panel = synced(&state, false, false);
            let widgets = panel.compose(&state);
            for omitted in [
                PanelWidget::OrderTypeSelector,
                PanelWidget::MarginInput,
                PanelWidget::OrderPriceInput,
                PanelWidget::SltpInputs,
            ] {
                assert!(!widgets.contains(&omitted), "{omitted:?} for {order_type}");
            }
            for present in [
                PanelWidget::OrderSizing,
                PanelWidget::LeverageInput,
                PanelWidget::ManagePosition,
                PanelWidget::FeeInfo,
            ] {
                assert!(widgets.contains(&present), "{present:?} for {order_type}");
            }
        }
    }

    #[test]
    fn price_feed_error_adds_banner_without_hiding_content() {
        let mut state = FakeState::new(FuturesType::CrossMargin, OrderType::Market, false);
        state.prices_error = true;
        let panel = synced(&state, false, false);
        let widgets = panel.compose(&state);
        assert_eq!(widgets[3], PanelWidget::PriceFeedError);
        assert!(widgets.contains(&PanelWidget::OrderSizing));
        assert!(widgets.contains(&PanelWidget::FeeInfo));
    }

    #[test]
    fn mobile_hides_balance_summary() {
        let state = FakeState::new(FuturesType::CrossMargin, OrderType::Market, false);
        let panel = synced(&state, false, true);
        assert!(!panel.compose(&state).contains(&PanelWidget::TradeBalance));
    }

    #[test]
    fn clicking_acknowledgement_reveals_inputs_without_global_ack() {
        let state = FakeState::new(FuturesType::CrossMargin, OrderType::Limit, false);
        let mut panel = synced(&state, false, false);
        assert!(panel.show_order_warning());

        assert!(panel.click_order_acknowledgement());
        assert!(!panel.show_order_warning());
        assert!(!state.acked_orders_warning());
        let widgets = panel.compose(&state);
        for widget in MAIN_INPUTS {
            assert!(widgets.contains(&widget), "{widget:?} missing");
        }
        assert!(!widgets.contains(&PanelWidget::OrderAcknowledgement));
    }

    #[test]
    fn click_is_ignored_when_prompt_hidden() {
        let state = FakeState::new(FuturesType::CrossMargin, OrderType::Market, false);
        let mut panel = synced(&state, false, false);
        assert!(!panel.click_order_acknowledgement());
        assert!(!panel.show_order_warning());
    }

    #[test]
    fn effect_reruns_only_on_input_change() {
        let mut state = FakeState::new(FuturesType::CrossMargin, OrderType::Limit, false);
        let mut panel = TradePanel::new(false, false);
        assert!(!panel.show_order_warning());
        assert!(panel.sync(&state));
        assert!(panel.show_order_warning());

        panel.click_order_acknowledgement();
        assert!(!panel.sync(&state));
        assert!(!panel.show_order_warning());

        state.order_type = OrderType::StopMarket;
        assert!(panel.sync(&state));
        assert!(panel.show_order_warning());

        state.order_type = OrderType::Market;
        assert!(panel.sync(&state));
        assert!(!panel.show_order_warning());
    }

    #[test]
    fn global_ack_clears_visible_warning() {
        let mut state = FakeState::new(FuturesType::CrossMargin, OrderType::Limit, false);
        let mut panel = synced(&state, false, false);
        assert!(panel.show_order_warning());
        state.acked = true;
        assert!(panel.sync(&state));
        assert!(!panel.show_order_warning());
    }

    #[test]
    fn selecting_side_dispatches_change() {
        let mut state = FakeState::new(FuturesType::CrossMargin, OrderType::Market, false);
        let panel = synced(&state, false, false);
        panel.select_side(PositionSide::Short, &mut state);
        assert_eq!(state.side_changes, vec![PositionSide::Short]);
        assert_eq!(state.leverage_side(), PositionSide::Short);
    }

    #[test]
    fn close_only_swallows_actions() {
        let mut state = FakeState::new(FuturesType::CrossMargin, OrderType::Market, false);
        let panel = synced(&state, true, false);
        panel.select_side(PositionSide::Short, &mut state);
        assert!(!panel.select_order_type(OrderType::Limit, &mut state));
        assert!(state.side_changes.is_empty());
        assert!(state.order_type_changes.is_empty());
    }

    #[test]
    fn order_type_setter_requires_visible_selector() {
        let mut state = FakeState::new(FuturesType::IsolatedMargin, OrderType::Market, false);
        let panel = synced(&state, false, false);
        assert!(!panel.select_order_type(OrderType::Limit, &mut state));
        state.futures_type = FuturesType::CrossMargin;
        assert!(panel.select_order_type(OrderType::Limit, &mut state));
        assert_eq!(state.order_type_changes, vec![OrderType::Limit]);
    }
}
