//! Ledger configuration.

use std::fmt;
use std::str::FromStr;

use fundsline_fx::GatewayConfig;
use fundsline_notify::DispatcherConfig;

/// Where a cross-currency transfer calls the conversion gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionScope {
    /// Convert before taking account locks, then re-validate under them.
    #[default]
    BeforeUnit,
    /// Convert while both account locks are held.
    InsideUnit,
}

impl FromStr for ConversionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" | "before-unit" => Ok(ConversionScope::BeforeUnit),
            "inside" | "inside-unit" => Ok(ConversionScope::InsideUnit),
            other => Err(format!("unknown conversion scope '{other}'")),
        }
    }
}

impl fmt::Display for ConversionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionScope::BeforeUnit => write!(f, "before"),
            ConversionScope::InsideUnit => write!(f, "inside"),
        }
    }
}

/// Main ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Conversion placement for cross-currency transfers.
    pub conversion_scope: ConversionScope,
    /// Conversion gateway configuration.
    pub gateway: GatewayConfig,
    /// Outbox dispatcher configuration.
    pub dispatcher: DispatcherConfig,
    /// Log level.
    pub log_level: String,
    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            conversion_scope: ConversionScope::default(),
            gateway: GatewayConfig::default(),
            dispatcher: DispatcherConfig::default(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            gateway: GatewayConfig::from_env(),
            dispatcher: DispatcherConfig::from_env(),
            ..Self::default()
        };

        if let Ok(scope) = std::env::var("LEDGER_CONVERSION_SCOPE") {
            if let Ok(scope) = scope.parse() {
                config.conversion_scope = scope;
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            config.log_json = format.trim().eq_ignore_ascii_case("json");
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.gateway.validate()?;
        self.dispatcher.validate()?;

        if self.log_level.is_empty() {
            return Err("Log level cannot be empty".to_string());
        }

        Ok(())
    }
}
