use anyhow::anyhow;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, warn};

use trade_panel::command::Command;
use trade_panel::config::{CliParams, PanelPrefsStore};
use trade_panel::logging;
use trade_panel::store::FuturesState;
use trade_panel::tui::TuiApp;
use trade_panel::{FuturesStore, TradePanel};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let param = CliParams::parse();
    let _log_guard = logging::init_tracing(&param.log_file, &param.log_level)?;
    info!(
        close_only = param.close_only(),
        mobile = param.mobile,
        market = %param.market,
        "starting trade panel"
    );

    // Collaborators outside the panel (price feed, account sync) publish here.
    let (tx, mut rx) = broadcast::channel::<Command>(16);

    let mut state = FuturesState::new(param.market.clone());
    state.futures_type = param.futures_type;
    state.order_type = param.order_type;
    let mut store = FuturesStore::new(state, Some(PanelPrefsStore::new(&param.prefs_path)));
    if let Err(err) = store.load_prefs() {
        warn!(error = %err, "ignoring unreadable panel preferences");
        let _ = tx.send(Command::Error(format!("preferences not loaded: {err}")));
    }

    let panel = TradePanel::new(param.close_only(), param.mobile);
    let mut app = TuiApp::new(store, panel);
    let app_result = tokio::select! {
        result = app.run(&mut rx) => result,
        _ = tokio::signal::ctrl_c() => Ok(()),
    };
    let _ = tx.send(Command::Exit);
    app.dispose();
    info!("trade panel stopped");
    app_result.map_err(|err| anyhow!(err.to_string()))?;
    Ok(())
}
