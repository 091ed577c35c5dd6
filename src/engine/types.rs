use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Deserializer};

/// Which family a venue belongs to. Selects the default rate limit and the
/// counter an identity charges a request to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VenueClass {
    /// Centralized exchange, quoted from its order book
    Cex,
    /// On-chain swap aggregator
    Dex,
}

impl Display for VenueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cex => write!(f, "CEX"),
            Self::Dex => write!(f, "DEX"),
        }
    }
}

/// Token leg of a DEX descriptor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenInfo {
    /// Display symbol, only used in step traces and alerts
    #[serde(default)]
    pub symbol: Option<String>,
    /// Contract address (or mint)
    pub address: String,
    /// Token decimals
    #[serde(default)]
    pub decimals: u8,
}

impl TokenInfo {
    /// Symbol for display, falling back to the address
    #[must_use]
    pub fn label(&self) -> &str {
        self.symbol.as_deref().unwrap_or(&self.address)
    }
}

/// A DEX (aggregator) venue as configured in a scenario.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexVenue {
    /// Registry tag of the adapter, e.g. `Odos`
    pub name: String,
    /// Chain the swap is quoted on
    #[serde(default)]
    pub network: String,
    /// Token sold into the swap
    pub input_token: TokenInfo,
    /// Token received from the swap
    pub output_token: TokenInfo,
    /// Commission in percent
    #[serde(default, alias = "Fee", deserialize_with = "deserialize_percent")]
    pub fee: f64,
    /// Fixed conversion ratio, only meaningful for `Migration` steps
    #[serde(default)]
    pub multiplier: Option<f64>,
}

impl DexVenue {
    /// Commission as a fraction of the input
    #[must_use]
    pub fn fee_rate(&self) -> f64 {
        if self.fee.is_finite() && self.fee > 0.0 {
            self.fee / 100.0
        } else {
            0.0
        }
    }
}

/// Reference to a venue inside a scenario: a bare CEX name or a DEX descriptor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged, expecting = "an exchange name or a DEX object with name, inputToken and outputToken")]
pub enum VenueRef {
    /// Centralized exchange by name
    Cex(String),
    /// Aggregator with explicit token pair
    Dex(DexVenue),
}

impl VenueRef {
    /// Registry tag and rate-limit key
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Cex(name) => name,
            Self::Dex(dex) => &dex.name,
        }
    }

    /// Venue family
    #[must_use]
    pub const fn class(&self) -> VenueClass {
        match self {
            Self::Cex(_) => VenueClass::Cex,
            Self::Dex(_) => VenueClass::Dex,
        }
    }

    /// Engine-level commission. CEX commissions are applied by the adapter.
    #[must_use]
    pub fn fee_rate(&self) -> f64 {
        match self {
            Self::Cex(_) => 0.0,
            Self::Dex(dex) => dex.fee_rate(),
        }
    }

    /// Human label, `Name (network)` for DEX venues
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Cex(name) => name.clone(),
            Self::Dex(dex) if dex.network.is_empty() => dex.name.clone(),
            Self::Dex(dex) => format!("{} ({})", dex.name, dex.network),
        }
    }

    /// Whether this is a DEX descriptor
    #[must_use]
    pub const fn is_dex(&self) -> bool {
        matches!(self, Self::Dex(_))
    }
}

impl Display for VenueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One trade size of a scenario together with its alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountTier {
    /// USDT spent on the buy leg
    pub amount: f64,
    /// Minimum profit percent worth reporting
    #[serde(alias = "notificationThreshold")]
    pub threshold_percent: f64,
}

/// A link button attached to alerts (bridges, explorers).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinkButton {
    /// Button caption
    pub text: String,
    /// Target URL
    pub url: String,
}

/// A named configuration: one token, its candidate venues and trade sizes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    /// Token symbol being arbitraged
    pub token: String,
    /// Candidate venues for the buy leg
    #[serde(rename = "buyExchange")]
    pub buy_venues: Vec<VenueRef>,
    /// Candidate venues for the sell leg
    #[serde(rename = "sellExchange")]
    pub sell_venues: Vec<VenueRef>,
    /// Trade sizes, each evaluated independently
    #[serde(rename = "buyAmounts", default)]
    pub amounts: Vec<AmountTier>,
    /// Ordered intermediate conversions between buy and sell
    #[serde(rename = "stepSwaps", default)]
    pub step_swaps: Vec<VenueRef>,
    /// Network shown in alerts
    #[serde(default)]
    pub network: Option<String>,
    /// Bridge links rendered as alert buttons
    #[serde(rename = "Bridge", default, deserialize_with = "deserialize_links")]
    pub bridge: Vec<LinkButton>,
    /// Transaction checking links, `label -> url`
    #[serde(rename = "CHECK", default)]
    pub check: Vec<BTreeMap<String, String>>,
}

impl Scenario {
    /// Number of DEX descriptors in both legs
    #[must_use]
    pub fn dex_venue_count(&self) -> usize {
        self.buy_venues
            .iter()
            .chain(&self.sell_venues)
            .filter(|venue| venue.is_dex())
            .count()
    }

    /// Number of CEX names in both legs
    #[must_use]
    pub fn cex_venue_count(&self) -> usize {
        self.buy_venues
            .iter()
            .chain(&self.sell_venues)
            .filter(|venue| !venue.is_dex())
            .count()
    }
}

/// One executed step of a step-swap chain.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTrace {
    /// Adapter name
    pub venue: String,
    /// Chain of the step
    pub network: String,
    /// Quantity fed into the step
    pub qty_in: f64,
    /// Symbol fed into the step
    pub symbol_in: String,
    /// Quantity received
    pub qty_out: f64,
    /// Symbol received
    pub symbol_out: String,
    /// Address of the received token
    pub out_contract: String,
}

/// Best quote of one leg.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResult {
    /// Winning venue
    pub venue: VenueRef,
    /// Amount the venue returns
    pub amount_out: f64,
    /// Identity the winning call went through, `None` when direct
    pub identity_used: Option<String>,
}

/// A confirmed profitable cycle, pushed to the notification sink.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// Scenario key
    pub scenario: String,
    /// Token symbol
    pub token: String,
    /// Scenario network, if any
    pub network: Option<String>,
    /// USDT spent
    pub amount_in: f64,
    /// Tokens received on the buy leg
    pub tokens_acquired: f64,
    /// Tokens left after the step chain (equals `tokens_acquired` without steps)
    pub tokens_after_steps: f64,
    /// USDT received on the sell leg
    pub usdt_received: f64,
    /// `usdt_received - amount_in`
    pub profit: f64,
    /// Confirmed profit percent
    pub profit_percent: f64,
    /// Percent seen on the first pass
    pub first_pass_percent: f64,
    /// Winning buy venue
    pub buy_venue: VenueRef,
    /// Winning sell venue
    pub sell_venue: VenueRef,
    /// Executed step chain
    pub step_trace: Vec<StepTrace>,
    /// Bridge buttons copied from the scenario
    pub bridge: Vec<LinkButton>,
    /// Check links copied from the scenario
    pub check: Vec<BTreeMap<String, String>>,
}

/// Accepts a number or a numeric string; anything unparseable becomes 0.
fn deserialize_percent<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(value) => value,
        Raw::Text(text) => text.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        Raw::Other(_) => 0.0,
    })
}

/// `Bridge` may be a single URL, a list of URLs or a list of buttons.
fn deserialize_links<'de, D>(deserializer: D) -> Result<Vec<LinkButton>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Item {
        Url(String),
        Button(LinkButton),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(Item),
        Many(Vec<Item>),
    }

    let to_button = |item: Item| match item {
        Item::Url(url) => LinkButton {
            text: "Bridge".to_string(),
            url,
        },
        Item::Button(button) => button,
    };

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Raw::One(item)) => vec![to_button(item)],
        Some(Raw::Many(items)) => items.into_iter().map(to_button).collect(),
    })
}
