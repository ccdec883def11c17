use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Wrap};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::command::{Command, PositionSide};
use crate::panel::TradePanel;
use crate::store::{FuturesStore, TradeStateReader};
use crate::widgets::{PanelScroll, PanelView, preferred_width, render_panel};

pub struct TuiApp {
    store: FuturesStore,
    panel: TradePanel,
    last_draw: Instant,
    min_redraw_gap: Duration,
    status_message: Option<String>,
    status_visible_until: Option<Instant>,
    status_is_error: bool,
    exit_confirmation: bool,
    panel_scroll: usize,
    panel_view: PanelScroll,
}

impl TuiApp {
    fn is_exit_key(key: &KeyEvent) -> bool {
        matches!(
            key.code,
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc
        ) || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
    }

    pub fn new(store: FuturesStore, panel: TradePanel) -> TuiApp {
        let min_redraw_gap = Duration::from_millis(100);
        let mut app = TuiApp {
            store,
            panel,
            last_draw: Instant::now() - min_redraw_gap,
            min_redraw_gap,
            status_message: None,
            status_visible_until: None,
            status_is_error: false,
            exit_confirmation: false,
            panel_scroll: 0,
            panel_view: PanelScroll::default(),
        };
        app.sync_panel();
        app
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = Some(Instant::now() + Duration::from_secs(3));
        self.status_is_error = false;
    }

    fn set_error_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_visible_until = Some(Instant::now() + Duration::from_secs(5));
        self.status_is_error = true;
    }

    fn clear_status_if_allowed(&mut self) {
        if let Some(visible_until) = self.status_visible_until {
            if Instant::now() < visible_until {
                return;
            }
        }
        self.status_message = None;
        self.status_visible_until = None;
        self.status_is_error = false;
    }

    /// Applies the panel's derived effect after a state change has been
    /// committed, ahead of the next draw.
    fn sync_panel(&mut self) {
        self.panel.sync(&self.store);
    }

    /// Records where the last draw left the column so key handling can clamp
    /// against it.
    fn update_panel_view(&mut self, view: PanelScroll) {
        self.panel_view = view;
        self.panel_scroll = view.offset;
    }

    fn scroll_panel(&mut self, delta: isize) {
        if delta == 0 {
            return;
        }
        let max_scroll = self.panel_view.max_offset as isize;
        let mut next = self.panel_scroll as isize + delta;
        if next < 0 {
            next = 0;
        } else if next > max_scroll {
            next = max_scroll;
        }
        self.panel_scroll = next as usize;
    }

    fn page_scroll_panel(&mut self, pages: isize) {
        let page = self.panel_view.visible.max(1) as isize;
        self.scroll_panel(page * pages);
    }

    pub fn dispose(&self) {
        ratatui::restore();
    }

    pub async fn run(&mut self, rx: &mut broadcast::Receiver<Command>) -> Result<()> {
        color_eyre::install()?;
        let mut terminal = ratatui::init();
        let mut input_tick = tokio::time::interval(self.min_redraw_gap);
        terminal.draw(|frame| self.render(frame))?;
        self.last_draw = Instant::now();
        loop {
            tokio::select! {
                biased;
                _ = input_tick.tick() => {
                    let had_status = self.status_message.is_some();
                    self.clear_status_if_allowed();
                    let (exit, handled) = self.poll_input()?;
                    if exit {
                        return Ok(());
                    }
                    let status_expired = had_status && self.status_message.is_none();
                    if (handled || status_expired) && self.last_draw.elapsed() >= self.min_redraw_gap {
                        terminal.draw(|frame| self.render(frame))?;
                        self.last_draw = Instant::now();
                    }
                }
                result = rx.recv() => {
                    match result {
                        Ok(Command::Exit) => return Ok(()),
                        Ok(Command::Error(message)) => {
                            self.set_error_status_message(message);
                        }
                        Ok(command) => {
                            if let Err(err) = self.store.apply(command) {
                                error!(error = %err, "failed to apply store command");
                                self.set_error_status_message(format!("update failed: {err}"));
                            }
                            self.sync_panel();
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                    terminal.draw(|frame| self.render(frame))?;
                    self.last_draw = Instant::now();
                }
            }
        }
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let has_status = self.status_message.is_some() && area.height >= 8;
        let (main_area, status_area) = if has_status {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(5), Constraint::Length(3)])
                .split(area);
            (chunks[0], Some(chunks[1]))
        } else {
            (area, None)
        };

        let view = PanelView {
            state: self.store.state(),
            mobile: self.panel.is_mobile(),
        };
        let panel_width = preferred_width(&view).min(main_area.width);
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(panel_width), Constraint::Min(0)])
            .split(main_area);
        let widgets = self.panel.compose(&self.store);
        let outcome = render_panel(frame, chunks[0], &widgets, &view, self.panel_scroll);
        self.update_panel_view(outcome);
        if chunks[1].width >= 20 {
            self.render_help(frame, chunks[1]);
        }

        if let Some(status_area) = status_area {
            self.render_status(frame, status_area);
        }
        if self.exit_confirmation {
            self.render_exit_confirmation(frame);
        }
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = if self.panel.is_close_only() {
            vec![
                Line::from("↑↓/PgUp/PgDn scroll"),
                Line::from("q/Esc exit"),
            ]
        } else {
            vec![
                Line::from("l/s      long / short"),
                Line::from("o/Tab    next order type (Shift+Tab back)"),
                Line::from("Enter    dismiss order warning"),
                Line::from("a        toggle don't-show-again"),
                Line::from("m        toggle cross / isolated margin"),
                Line::from("e        toggle price feed outage"),
                Line::from("↑↓ j/k   scroll panel"),
                Line::from("PgUp/Dn  page · Home/End top / bottom"),
                Line::from("q/Esc    exit"),
                Line::from(""),
                Line::from(Span::styled(
                    format!(
                        "{} · {} · {}",
                        self.store.futures_type().label(),
                        self.store.order_type().label(),
                        self.store.leverage_side().label()
                    ),
                    Style::default().fg(Color::DarkGray),
                )),
            ]
        };
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true })
            .block(Block::bordered().title("Keys"));
        frame.render_widget(paragraph, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if let Some(message) = &self.status_message {
            let color = if self.status_is_error {
                Color::Red
            } else {
                Color::Yellow
            };
            let status = Paragraph::new(message.as_str())
                .style(Style::default().fg(color))
                .alignment(Alignment::Left)
                .block(Block::bordered().title("Status"));
            frame.render_widget(status, area);
        }
    }

    fn render_exit_confirmation(&self, frame: &mut Frame) {
        let area = frame.area();
        if area.width < 24 || area.height < 4 {
            return;
        }
        let popup_width = area.width.saturating_sub(20).clamp(28, 50);
        let popup_height = 4;
        let left = area.x + (area.width.saturating_sub(popup_width)) / 2;
        let top = area.y + (area.height.saturating_sub(popup_height)) / 2;
        let popup = Rect::new(left, top, popup_width, popup_height);
        let lines = vec![
            Line::from(Span::styled(
                "Exit the trade panel?",
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from("Y/Enter confirm · N/Esc cancel"),
        ];
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .block(Block::bordered().title("Confirm exit"));
        frame.render_widget(Clear, popup);
        frame.render_widget(paragraph, popup);
    }

    fn poll_input(&mut self) -> Result<(bool, bool)> {
        let mut handled = false;
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    handled = true;
                    if self.handle_key_event(key)? {
                        return Ok((true, handled));
                    }
                }
                Event::Resize(_, _) => handled = true,
                _ => {}
            }
        }
        Ok((false, handled))
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Result<bool> {
        if self.exit_confirmation {
            return self.handle_exit_confirmation_key(key);
        }
        if Self::is_exit_key(&key) {
            self.prompt_exit_confirmation();
            return Ok(false);
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => {
                self.scroll_panel(-1);
                return Ok(false);
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => {
                self.scroll_panel(1);
                return Ok(false);
            }
            KeyCode::PageUp => {
                self.page_scroll_panel(-1);
                return Ok(false);
            }
            KeyCode::PageDown => {
                self.page_scroll_panel(1);
                return Ok(false);
            }
            KeyCode::Home => {
                self.panel_scroll = 0;
                return Ok(false);
            }
            KeyCode::End => {
                self.panel_scroll = self.panel_view.max_offset;
                return Ok(false);
            }
            _ => {}
        }
        if self.panel.is_close_only() {
            self.set_status_message("Close-only mode: new orders are disabled");
            return Ok(false);
        }
        match key.code {
            KeyCode::Char('l') | KeyCode::Char('L') => self.select_side(PositionSide::Long),
            KeyCode::Char('s') | KeyCode::Char('S') => self.select_side(PositionSide::Short),
            KeyCode::Char('o') | KeyCode::Char('O') | KeyCode::Tab => self.cycle_order_type(false),
            KeyCode::BackTab => self.cycle_order_type(true),
            KeyCode::Enter => {
                if self.panel.click_order_acknowledgement() {
                    self.set_status_message("Order warning dismissed for this session");
                }
            }
            KeyCode::Char('a') | KeyCode::Char('A') => self.toggle_global_ack(),
            KeyCode::Char('m') | KeyCode::Char('M') => {
                let next = self.store.futures_type().toggled();
                self.store.set_futures_type(next);
                self.set_status_message(format!("Account type: {}", next.label()));
            }
            KeyCode::Char('e') | KeyCode::Char('E') => {
                let next = !self.store.prices_connection_error();
                self.store.set_prices_connection_error(next);
                self.set_status_message(if next {
                    "Simulating price feed outage"
                } else {
                    "Price feed restored"
                });
            }
            _ => {}
        }
        self.sync_panel();
        Ok(false)
    }

    fn select_side(&mut self, side: PositionSide) {
        self.panel.select_side(side, &mut self.store);
        self.set_status_message(format!("Side: {}", side.label()));
    }

    fn cycle_order_type(&mut self, reverse: bool) {
        let next = self.store.order_type().cycled(reverse);
        if self.panel.select_order_type(next, &mut self.store) {
            self.set_status_message(format!("Order type: {}", next.label()));
        } else {
            self.set_error_status_message("Order type selection requires cross margin");
        }
    }

    fn toggle_global_ack(&mut self) {
        let next = !self.store.acked_orders_warning();
        match self.store.acknowledge_orders_warning(next) {
            Ok(_) if next => self.set_status_message("Order warning will not be shown again"),
            Ok(_) => self.set_status_message("Order warning re-enabled"),
            Err(err) => {
                error!(error = %err, "failed to persist order warning acknowledgement");
                self.set_error_status_message(format!("Failed to save preference: {err}"));
            }
        }
    }

    fn prompt_exit_confirmation(&mut self) {
        if self.exit_confirmation {
            return;
        }
        self.exit_confirmation = true;
        self.set_status_message("Exit? Y/Enter confirm · N/Esc cancel");
    }

    fn handle_exit_confirmation_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char('c') = key.code {
                self.exit_confirmation = false;
                return Ok(true);
            }
        }
        match key.code {
            KeyCode::Char('y')
            | KeyCode::Char('Y')
            | KeyCode::Char('q')
            | KeyCode::Char('Q')
            | KeyCode::Enter => {
                self.exit_confirmation = false;
                info!("exit confirmed");
                Ok(true)
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.exit_confirmation = false;
                self.set_status_message("Exit cancelled");
                Ok(false)
            }
            _ => Ok(false),
        }
    }
}
