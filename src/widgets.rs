use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Wrap};
use unicode_width::UnicodeWidthStr;

use crate::command::{OrderType, PositionSide};
use crate::panel::{PRICE_FEED_ERROR_MESSAGE, PanelWidget};
use crate::store::FuturesState;

const CLOSE_ONLY_MESSAGE: &str =
    "This market is in close-only mode. Open positions can be closed, but no new orders can be placed.";
pub const MOBILE_PANEL_WIDTH: u16 = 40;
const ORDER_ACK_MESSAGE: &str = "Limit and stop orders are executed by keepers once the trigger price is reached and may fill at a different price.";
const ACK_CONFIRM_HINT: &str = "Enter  I understand";
const ACK_DISMISS_HINT: &str = "a      don't show again";

pub struct PanelView<'a> {
    pub state: &'a FuturesState,
    pub mobile: bool,
}

impl PanelWidget {
    /// Rows the widget needs at `width` columns, borders included, with its
    /// text word-wrapped the way the rendered paragraph wraps it.
    pub fn height(&self, view: &PanelView, width: u16) -> u16 {
        match widget_content(*self, view) {
            Some((lines, _)) => wrapped_line_count(&lines, width.saturating_sub(2)) + 2,
            None => 1,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PanelWidget::CloseOnlyPrompt => "Close only",
            PanelWidget::MarketsDropdown => "Market",
            PanelWidget::TradeBalance => "Balance",
            PanelWidget::PositionButtons => "Side",
            PanelWidget::PriceFeedError => "Price feed",
            PanelWidget::OrderTypeSelector => "Order type",
            PanelWidget::Spacer => "",
            PanelWidget::OrderAcknowledgement => "Before you continue",
            PanelWidget::MarginInput => "Margin",
            PanelWidget::OrderPriceInput => "Price",
            PanelWidget::OrderSizing => "Size",
            PanelWidget::LeverageInput => "Leverage",
            PanelWidget::SltpInputs => "Stop loss / Take profit",
            PanelWidget::ManagePosition => "Manage position",
            PanelWidget::FeeInfo => "Fees",
        }
    }
}

/// Where the column ended up after clamping the requested offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PanelScroll {
    pub offset: usize,
    pub max_offset: usize,
    pub visible: usize,
}

impl PanelScroll {
    pub fn more_above(&self) -> bool {
        self.offset > 0
    }

    pub fn more_below(&self) -> bool {
        self.offset < self.max_offset
    }
}

/// Lays the composed widgets out top to bottom inside a bordered column,
/// starting at widget `scroll`. The offset is clamped so the last widget
/// stays at the bottom edge once everything below has been scrolled in.
pub fn render_panel(
    frame: &mut Frame,
    area: Rect,
    widgets: &[PanelWidget],
    view: &PanelView,
    scroll: usize,
) -> PanelScroll {
    if area.width < 12 || area.height < 3 {
        return PanelScroll::default();
    }
    let mut container = Block::bordered().title(format!(" Trade · {} ", view.state.market_asset));
    let inner = container.inner(area);
    let heights: Vec<u16> = widgets
        .iter()
        .map(|widget| widget.height(view, inner.width))
        .collect();
    let max_offset = max_scroll(&heights, inner.height);
    let offset = scroll.min(max_offset);

    let mut y = inner.y;
    let bottom = inner.y + inner.height;
    let mut visible = 0;
    for (widget, height) in widgets.iter().zip(&heights).skip(offset) {
        if y >= bottom {
            break;
        }
        // a widget cut by the bottom edge keeps its title row on screen
        let rows = (*height).min(bottom - y);
        render_widget(frame, Rect::new(inner.x, y, inner.width, rows), *widget, view);
        if rows < *height {
            break;
        }
        visible += 1;
        y += rows;
    }

    let outcome = PanelScroll {
        offset,
        max_offset,
        visible,
    };
    let marker = Style::default().fg(Color::DarkGray);
    if outcome.more_above() {
        container = container.title_top(
            Line::styled(" ▲ more above ", marker).alignment(Alignment::Right),
        );
    }
    if outcome.more_below() {
        container = container.title_bottom(
            Line::styled(" ▼ more below ", marker).alignment(Alignment::Right),
        );
    }
    frame.render_widget(container, area);
    outcome
}

/// First widget index at which the remaining widgets fit in `rows`.
fn max_scroll(heights: &[u16], rows: u16) -> usize {
    let mut used = 0u32;
    let mut first = heights.len();
    for (idx, height) in heights.iter().enumerate().rev() {
        used += u32::from(*height);
        if used > u32::from(rows) {
            break;
        }
        first = idx;
    }
    first.min(heights.len().saturating_sub(1))
}

fn wrapped_line_count(lines: &[Line], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| {
            let text: String = line.spans.iter().map(|span| span.content.as_ref()).collect();
            wrapped_rows(&text, width)
        })
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX - 2)
}

/// Greedy word wrap; words wider than the row are broken across rows.
fn wrapped_rows(text: &str, width: usize) -> usize {
    let mut rows = 1;
    let mut used = 0;
    for word in text.split_whitespace() {
        let word_width = word.width();
        let needed = if used == 0 {
            word_width
        } else {
            used + 1 + word_width
        };
        if needed <= width {
            used = needed;
            continue;
        }
        if used > 0 {
            rows += 1;
        }
        let extra = word_width.saturating_sub(1) / width;
        rows += extra;
        used = word_width - extra * width;
    }
    rows
}

fn render_widget(frame: &mut Frame, area: Rect, widget: PanelWidget, view: &PanelView) {
    // blank row between sections
    let Some((lines, style)) = widget_content(widget, view) else {
        return;
    };
    let paragraph = Paragraph::new(lines)
        .style(style)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true })
        .block(Block::bordered().title(widget.title()));
    frame.render_widget(paragraph, area);
}

fn widget_content(widget: PanelWidget, view: &PanelView) -> Option<(Vec<Line<'static>>, Style)> {
    let state = view.state;
    let form = &state.form;
    let content = match widget {
        PanelWidget::CloseOnlyPrompt => (
            vec![Line::from(CLOSE_ONLY_MESSAGE)],
            Style::default().fg(Color::Yellow),
        ),
        PanelWidget::MarketsDropdown => (
            vec![Line::from(vec![
                Span::styled(
                    format!("{}-PERP", state.market_asset),
                    Style::default()
                        .fg(Color::LightCyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" ▾"),
            ])],
            Style::default(),
        ),
        PanelWidget::TradeBalance => (
            vec![Line::from(format!(
                "Available margin {} sUSD",
                format_amount(form.available_margin)
            ))],
            Style::default(),
        ),
        PanelWidget::PositionButtons => (
            vec![position_buttons_line(state.leverage_side)],
            Style::default(),
        ),
        PanelWidget::PriceFeedError => (
            vec![Line::from(PRICE_FEED_ERROR_MESSAGE)],
            Style::default().fg(Color::LightRed),
        ),
        PanelWidget::OrderTypeSelector => {
            (vec![order_type_line(state.order_type)], Style::default())
        }
        PanelWidget::OrderAcknowledgement => {
            let hint = Style::default().fg(Color::Yellow);
            (
                vec![
                    Line::from(ORDER_ACK_MESSAGE),
                    Line::from(Span::styled(ACK_CONFIRM_HINT, hint)),
                    Line::from(Span::styled(ACK_DISMISS_HINT, hint)),
                ],
                Style::default(),
            )
        }
        PanelWidget::MarginInput => (
            vec![Line::from(format!(
                "{} sUSD",
                format_amount(form.margin_delta)
            ))],
            Style::default(),
        ),
        PanelWidget::OrderPriceInput => (
            vec![Line::from(format!(
                "{} {}",
                state.order_type.label(),
                format_optional_price(form.order_price)
            ))],
            Style::default(),
        ),
        PanelWidget::OrderSizing => (
            vec![Line::from(format!(
                "{} {}",
                format_amount(form.order_size),
                state.market_asset
            ))],
            Style::default(),
        ),
        PanelWidget::LeverageInput => (
            vec![Line::from(format!("{}x", format_amount(form.leverage)))],
            Style::default(),
        ),
        PanelWidget::SltpInputs => (
            vec![
                Line::from(format!(
                    "Stop loss   {}",
                    format_optional_price(form.stop_loss_price)
                )),
                Line::from(format!(
                    "Take profit {}",
                    format_optional_price(form.take_profit_price)
                )),
            ],
            Style::default(),
        ),
        PanelWidget::ManagePosition => (
            vec![Line::from(if form.position_size == 0.0 {
                "No open position".to_string()
            } else {
                format!(
                    "Position {} {} · close / edit",
                    format_amount(form.position_size),
                    state.market_asset
                )
            })],
            Style::default(),
        ),
        PanelWidget::FeeInfo => (
            vec![
                Line::from(format!("Fee rate {:.3}%", form.fee_rate * 100.0)),
                Line::from(format!(
                    "Est. fee {} sUSD",
                    format_amount(form.estimated_fee())
                )),
            ],
            Style::default(),
        ),
        PanelWidget::Spacer => return None,
    };
    Some(content)
}

fn position_buttons_line(selected: PositionSide) -> Line<'static> {
    let spans = [PositionSide::Long, PositionSide::Short]
        .into_iter()
        .flat_map(|side| {
            let color = match side {
                PositionSide::Long => Color::Green,
                PositionSide::Short => Color::Red,
            };
            let style = if side == selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(color)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(color)
            };
            [
                Span::styled(format!(" {} ", side.label()), style),
                Span::raw("  "),
            ]
        })
        .collect::<Vec<_>>();
    Line::from(spans)
}

fn order_type_line(current: OrderType) -> Line<'static> {
    let spans = OrderType::ALL
        .into_iter()
        .flat_map(|order_type| {
            let style = if order_type == current {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default().fg(Color::Gray)
            };
            [
                Span::styled(format!(" {} ", order_type.label()), style),
                Span::raw(" "),
            ]
        })
        .collect::<Vec<_>>();
    Line::from(spans)
}

fn format_optional_price(value: Option<f64>) -> String {
    match value {
        Some(price) => format_amount(price),
        None => "--".to_string(),
    }
}

fn format_amount(value: f64) -> String {
    let mut formatted = format!("{value:.4}");
    if let Some(dot_pos) = formatted.find('.') {
        let mut trim_idx = formatted.len();
        while trim_idx > dot_pos + 1 && formatted.as_bytes()[trim_idx - 1] == b'0' {
            trim_idx -= 1;
        }
        if trim_idx == dot_pos + 1 {
            trim_idx -= 1;
        }
        formatted.truncate(trim_idx);
    }
    if formatted == "-0" {
        formatted = "0".to_string();
    }
    formatted
}

/// Desktop columns fit the price-feed banner on one line.
pub fn preferred_width(view: &PanelView) -> u16 {
    if view.mobile {
        return MOBILE_PANEL_WIDTH;
    }
    let banner = PRICE_FEED_ERROR_MESSAGE.width() as u16 + 6;
    let market = view.state.market_asset.width() as u16 + 16;
    banner.max(market)
}
