// =============================================================================
// Shared types for the signal bridge
// =============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Long or short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Entry order type requested by the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Market,
    Limit,
}

/// One take-profit level. `perc` is named for "percentage" in the wire
/// format but carries an absolute child size in base units (see DESIGN.md
/// open questions — this is intentional, not a bug).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TakeProfitLevel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perc: Option<Decimal>,
}

impl TakeProfitLevel {
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.perc.is_none()
    }
}

/// Inbound webhook payload describing one intended trade. The wire form is
/// flat (`tp1_price`, `tp1_perc`, `tp2_price`, ...); `Signal::from_raw`
/// below assembles it into the `tps` array used internally.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSignal {
    pub symbol: String,
    pub side: Side,
    pub entry: EntryType,
    pub quantity: Decimal,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stop: Option<Decimal>,
    #[serde(default)]
    pub tp1_price: Option<Decimal>,
    #[serde(default)]
    pub tp1_perc: Option<Decimal>,
    #[serde(default)]
    pub tp2_price: Option<Decimal>,
    #[serde(default)]
    pub tp2_perc: Option<Decimal>,
    #[serde(default)]
    pub tp3_price: Option<Decimal>,
    #[serde(default)]
    pub tp3_perc: Option<Decimal>,
    #[serde(default)]
    pub tp4_price: Option<Decimal>,
    #[serde(default)]
    pub tp4_perc: Option<Decimal>,
    #[serde(default)]
    pub strategy_id: Option<String>,
}

/// Validated, internally-shaped signal. Produced from `RawSignal` by
/// `ingress::validate`.
#[derive(Debug, Clone)]
pub struct Signal {
    pub symbol: String,
    pub side: Side,
    pub entry: EntryType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop: Option<Decimal>,
    pub tps: [TakeProfitLevel; 4],
    pub strategy_id: Option<String>,
}

impl From<RawSignal> for Signal {
    fn from(raw: RawSignal) -> Self {
        Signal {
            symbol: raw.symbol,
            side: raw.side,
            entry: raw.entry,
            quantity: raw.quantity,
            price: raw.price,
            stop: raw.stop,
            tps: [
                TakeProfitLevel { price: raw.tp1_price, perc: raw.tp1_perc },
                TakeProfitLevel { price: raw.tp2_price, perc: raw.tp2_perc },
                TakeProfitLevel { price: raw.tp3_price, perc: raw.tp3_perc },
                TakeProfitLevel { price: raw.tp4_price, perc: raw.tp4_perc },
            ],
            strategy_id: raw.strategy_id,
        }
    }
}

impl Signal {
    /// Strategy id this signal binds to, defaulting to the reserved `OTHERS`.
    pub fn strategy_id_or_default(&self) -> String {
        self.strategy_id.clone().unwrap_or_else(|| "OTHERS".to_string())
    }
}

/// A position snapshot as reported by the venue, fetched fresh per decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Signed size: positive long, negative short.
    pub size: Decimal,
    pub entry_px: Decimal,
}

impl PositionSnapshot {
    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    pub fn side(&self) -> Option<Side> {
        if self.size.is_sign_positive() && !self.size.is_zero() {
            Some(Side::Buy)
        } else if self.size.is_sign_negative() {
            Some(Side::Sell)
        } else {
            None
        }
    }
}

/// Venue-imposed precision rules for a symbol, cached on first use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SymbolMeta {
    pub sz_decimals: u32,
    pub tick_size: Decimal,
}

/// Resolution of a configured key to the trading account it signs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRole {
    Master,
    Agent { master_addr: String },
}

/// Which network the process is configured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Testnet,
    Mainnet,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Testnet => write!(f, "testnet"),
            Environment::Mainnet => write!(f, "mainnet"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "testnet" => Ok(Environment::Testnet),
            "mainnet" => Ok(Environment::Mainnet),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// A spot balance entry, summed into the Balance Cache's equity figure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}
