use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result as AnyResult, anyhow};
use chrono::Local;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::command::{FuturesType, OrderType};

#[derive(Parser, Clone, Debug)]
#[clap(name = "trade-panel", version, about = "Futures trade panel")]
pub struct CliParams {
    /// Restrict the panel to closing positions; only the exact value `true` enables it
    #[clap(
        long = "close-only",
        env = "TRADE_PANEL_CLOSE_ONLY",
        value_name = "BOOL",
        default_value = "false"
    )]
    pub close_only: CloseOnlyFlag,

    /// Compact layout for narrow terminals (hides the balance summary)
    #[clap(long = "mobile")]
    pub mobile: bool,

    /// Market asset shown in the market selector
    #[clap(long = "market", default_value = "sETH")]
    pub market: String,

    /// Initial account type (cross_margin or isolated_margin)
    #[clap(long = "futures-type", default_value = "cross_margin")]
    pub futures_type: FuturesType,

    /// Initial order type (market, limit, or stop_market)
    #[clap(long = "order-type", default_value = "market")]
    pub order_type: OrderType,

    /// File holding persisted panel preferences
    #[clap(long = "prefs", value_name = "PATH", default_value = "trade_panel_prefs.json")]
    pub prefs_path: PathBuf,

    /// Log file; the terminal itself is owned by the UI
    #[clap(long = "log-file", value_name = "PATH", default_value = "trade_panel.log")]
    pub log_file: PathBuf,

    /// Tracing filter directive (e.g. info, trade_panel=debug)
    #[clap(
        long = "log-level",
        env = "TRADE_PANEL_LOG",
        value_name = "LEVEL",
        default_value = "info"
    )]
    pub log_level: String,
}

impl CliParams {
    pub fn close_only(&self) -> bool {
        self.close_only.enabled()
    }
}

/// Deployment switch; anything other than the literal `true` leaves it off.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CloseOnlyFlag(bool);

impl CloseOnlyFlag {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

impl FromStr for CloseOnlyFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CloseOnlyFlag(s == "true"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelPrefs {
    #[serde(default)]
    pub acked_orders_warning: bool,
    #[serde(default)]
    pub acked_at_ms: Option<i64>,
}

impl PanelPrefs {
    pub fn acknowledged_now() -> Self {
        PanelPrefs {
            acked_orders_warning: true,
            acked_at_ms: Some(Local::now().timestamp_millis()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PanelPrefsStore {
    path: PathBuf,
}

impl PanelPrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PanelPrefsStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AnyResult<PanelPrefs> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                if contents.trim().is_empty() {
                    return Ok(PanelPrefs::default());
                }
                serde_json::from_str::<PanelPrefs>(&contents)
                    .with_context(|| format!("failed to parse {}", self.path.display()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(PanelPrefs::default()),
            Err(err) => Err(anyhow!("failed to read {}: {}", self.path.display(), err)),
        }
    }

    pub fn save(&self, prefs: &PanelPrefs) -> AnyResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let payload = serde_json::to_string_pretty(prefs)?;
        fs::write(&self.path, payload)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_prefs_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("trade-panel-{}-{}", std::process::id(), name))
            .join("prefs.json")
    }

    #[test]
    fn close_only_requires_exact_true() {
        assert!("true".parse::<CloseOnlyFlag>().unwrap().enabled());
        assert!(!"false".parse::<CloseOnlyFlag>().unwrap().enabled());
        assert!(!"TRUE".parse::<CloseOnlyFlag>().unwrap().enabled());
        assert!(!"1".parse::<CloseOnlyFlag>().unwrap().enabled());
        assert!(!"".parse::<CloseOnlyFlag>().unwrap().enabled());
    }

    #[test]
    fn cli_defaults() {
        let params = CliParams::try_parse_from(["trade-panel"]).expect("defaults parse");
        assert!(!params.mobile);
        assert_eq!(params.market, "sETH");
        assert_eq!(params.futures_type, FuturesType::CrossMargin);
        assert_eq!(params.order_type, OrderType::Market);
        assert_eq!(params.log_level, "info");
    }

    #[test]
    fn cli_parses_panel_flags() {
        let params = CliParams::try_parse_from([
            "trade-panel",
            "--close-only",
            "true",
            "--mobile",
            "--futures-type",
            "isolated_margin",
            "--order-type",
            "limit",
        ])
        .expect("flags parse");
        assert!(params.close_only());
        assert!(params.mobile);
        assert_eq!(params.futures_type, FuturesType::IsolatedMargin);
        assert_eq!(params.order_type, OrderType::Limit);
    }

    #[test]
    fn missing_prefs_file_yields_defaults() {
        let store = PanelPrefsStore::new(temp_prefs_path("missing"));
        let prefs = store.load().expect("load defaults");
        assert_eq!(prefs, PanelPrefs::default());
    }

    #[test]
    fn prefs_round_trip_through_file() {
        let path = temp_prefs_path("round-trip");
        let store = PanelPrefsStore::new(&path);
        let prefs = PanelPrefs::acknowledged_now();
        store.save(&prefs).expect("save prefs");
        let loaded = store.load().expect("load prefs");
        assert_eq!(loaded, prefs);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn malformed_prefs_report_path() {
        let path = temp_prefs_path("malformed");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        let err = PanelPrefsStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("prefs.json"));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
