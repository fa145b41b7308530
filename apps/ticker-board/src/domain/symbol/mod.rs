//! Symbol Normalization
//!
//! Converts exchange-native symbols (`BTCUSDT`, `1000SHIBUSDT`,
//! `BTCUSD_PERP`, `BTC-27DEC24-100000-C`) into an [`Instrument`] with a
//! display form `QUANTITY?BASE/QUOTE(-SUFFIX)?`.
//!
//! # Matching
//!
//! Patterns are tried in order and the first match wins:
//!
//! | Pattern | Example | Display |
//! |---------|---------|---------|
//! | quantity + base + quote + date | `1000PEPEUSDT-27DEC24` | `1000PEPE/USDT-27DEC24` |
//! | quantity + base + quote | `1000SHIBUSDT` | `1000SHIB/USDT` |
//! | base + quantity + quote | `SHIB1000USDT` | `1000SHIB/USDT` |
//! | base + quote + date | `BTCUSDT_250328`, `BTCUSDZ24` | `BTC/USDT-250328` |
//! | base + quote + `_PERP` | `BTCUSD_PERP` | `BTC/USD` |
//! | base + quote | `BTCUSDT` | `BTC/USDT` |
//! | base + separator + quote | `BTC_KRW` | `BTC/KRW` |
//! | base + `PERP` | `BTCPERP` | `BTC/USDC` |
//! | base + date | `BTC-27DEC24` | `BTC/USDC-27DEC24` |
//! | option | `BTC-27DEC24-100000-C` | `BTC/USDC-27DEC24-100000-C` |
//!
//! Anything else is returned unchanged as its own display form.
//!
//! A leading number is only a quantity multiplier when it is a power of ten
//! of at least 100 (or the `1M` shorthand) and is followed by a known quote
//! code, so coins such as `1INCH` keep their digits in the base.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::domain::market::Category;

/// Known quote codes, longest first so alternation prefers `USDT` over `USD`.
pub const QUOTE_CODES: &[&str] = &[
    "FDUSD", "USDT", "USDC", "BUSD", "TUSD", "USDE", "USD", "BTC", "ETH", "BNB", "EUR", "TRY",
    "BRL", "KRW", "JPY", "DAI",
];

/// Quote used by Bybit USDC contracts and options when the symbol omits it.
const USDC: &str = "USDC";

/// Suffix that marks a perpetual on Binance COIN-M; not shown in display.
const PERPETUAL_SUFFIX: &str = "PERP";

// =============================================================================
// Instrument
// =============================================================================

/// A normalized instrument.
///
/// `integrated_symbol` is always derived from `raw_symbol` and `category`;
/// it is recomputed on every normalization and never stored as authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    /// Exchange-native symbol.
    pub raw_symbol: String,
    /// Display form, `QUANTITY?BASE/QUOTE(-SUFFIX)?`.
    pub integrated_symbol: String,
    /// Base asset code (without quantity multiplier).
    pub base_code: String,
    /// Quote asset code (empty when the symbol could not be parsed).
    pub quote_code: String,
    /// Unit multiplier, 1 unless the symbol carries one (`1000SHIB`).
    pub quantity: u64,
    /// Settlement asset code.
    pub settlement_code: String,
    /// Remainder after base and quote (expiry, strike, `PERP`).
    pub rest_of_symbol: Option<String>,
    /// Market category.
    pub category: Category,
}

impl Instrument {
    /// Whether the raw symbol matched one of the known patterns.
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        !self.quote_code.is_empty()
    }

    fn unparsed(raw: &str, category: Category) -> Self {
        Self {
            raw_symbol: raw.to_string(),
            integrated_symbol: raw.to_string(),
            base_code: raw.to_string(),
            quote_code: String::new(),
            quantity: 1,
            settlement_code: String::new(),
            rest_of_symbol: None,
            category,
        }
    }
}

// =============================================================================
// Patterns
// =============================================================================

/// Which pattern produced a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// `1000PEPEUSDT-27DEC24`
    QuantityDated,
    /// `1000SHIBUSDT`
    Quantity,
    /// `SHIB1000USDT`
    TrailingQuantity,
    /// `BTCUSDT_250328`, `BTCUSDT-27DEC24`, `BTCUSDZ24`
    Dated,
    /// `BTCUSD_PERP`
    Perpetual,
    /// `BTCUSDT`
    Pair,
    /// `BTC_KRW`, `BTC-USDT`, `BTC/USDT`
    Separated,
    /// `BTCPERP`
    UsdcPerpetual,
    /// `BTC-27DEC24`
    UsdcDated,
    /// `BTC-27DEC24-100000-C`, `BTC-27DEC24-100000-C-USDT`
    Option,
}

/// Result of matching a raw symbol against the pattern list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSymbol {
    /// Pattern that matched.
    pub pattern: PatternKind,
    /// Base code.
    pub base: String,
    /// Quote code.
    pub quote: String,
    /// Quantity multiplier as written in the symbol (`1000`, `1M`).
    pub quantity_token: Option<String>,
    /// Quantity multiplier value.
    pub quantity: u64,
    /// Remainder after base and quote.
    pub suffix: Option<String>,
    /// Whether the suffix appears in the display form.
    pub show_suffix: bool,
}

impl ParsedSymbol {
    /// Display form, `QUANTITY?BASE/QUOTE(-SUFFIX)?`.
    #[must_use]
    pub fn display(&self) -> String {
        let mut out = String::with_capacity(self.base.len() + self.quote.len() + 16);
        if let Some(token) = &self.quantity_token {
            out.push_str(token);
        }
        out.push_str(&self.base);
        out.push('/');
        out.push_str(&self.quote);
        if self.show_suffix
            && let Some(suffix) = &self.suffix
        {
            out.push('-');
            out.push_str(suffix);
        }
        out
    }
}

struct SymbolPattern {
    kind: PatternKind,
    regex: Regex,
    default_quote: Option<&'static str>,
    show_suffix: bool,
}

#[allow(clippy::expect_used)] // Patterns are compile-time constants; expect() is safe here
fn patterns() -> &'static [SymbolPattern] {
    static PATTERNS: OnceLock<Vec<SymbolPattern>> = OnceLock::new();

    PATTERNS.get_or_init(|| {
        let quote = format!("(?P<quote>{})", QUOTE_CODES.join("|"));
        let qty = r"(?P<qty>1M|10{2,})";
        let date = r"(?P<date>\d{6}|\d{1,2}[A-Z]{3}\d{2})";
        let month = r"(?P<month>[FGHJKMNQUVXZ]\d{2})";

        let specs: Vec<(PatternKind, String, Option<&'static str>, bool)> = vec![
            (
                PatternKind::QuantityDated,
                format!(r"^{qty}(?P<base>[A-Z][A-Z0-9]*?){quote}[-_]{date}$"),
                None,
                true,
            ),
            (
                PatternKind::Quantity,
                format!(r"^{qty}(?P<base>[A-Z][A-Z0-9]*?){quote}$"),
                None,
                true,
            ),
            (
                PatternKind::TrailingQuantity,
                format!(r"^(?P<base>[A-Z][A-Z0-9]*?[A-Z]){qty}{quote}$"),
                None,
                true,
            ),
            (
                PatternKind::Dated,
                format!(r"^(?P<base>[A-Z0-9]+?){quote}(?:[-_]{date}|{month})$"),
                None,
                true,
            ),
            (
                PatternKind::Perpetual,
                format!(r"^(?P<base>[A-Z0-9]+?){quote}_(?P<suffix>{PERPETUAL_SUFFIX})$"),
                None,
                false,
            ),
            (
                PatternKind::Pair,
                format!(r"^(?P<base>[A-Z0-9]+?){quote}$"),
                None,
                true,
            ),
            (
                PatternKind::Separated,
                format!(r"^(?P<base>[A-Z0-9]+)[-_/]{quote}$"),
                None,
                true,
            ),
            (
                PatternKind::UsdcPerpetual,
                format!(r"^(?P<base>[A-Z0-9]+?){PERPETUAL_SUFFIX}$"),
                Some(USDC),
                true,
            ),
            (
                PatternKind::UsdcDated,
                format!(r"^(?P<base>[A-Z0-9]+)-{date}$"),
                Some(USDC),
                true,
            ),
            (
                PatternKind::Option,
                r"^(?P<base>[A-Z0-9]+)-(?P<suffix>\d{1,2}[A-Z]{3}\d{2}-\d+(?:\.\d+)?-[CP])(?:-(?P<quote>USDT|USDC))?$"
                    .to_string(),
                Some(USDC),
                true,
            ),
        ];

        specs
            .into_iter()
            .map(|(kind, source, default_quote, show_suffix)| SymbolPattern {
                kind,
                regex: Regex::new(&source).expect("symbol pattern is valid"),
                default_quote,
                show_suffix,
            })
            .collect()
    })
}

fn parse_quantity(token: &str) -> Option<u64> {
    if token == "1M" {
        return Some(1_000_000);
    }
    token.parse().ok()
}

fn extract(pattern: &SymbolPattern, caps: &Captures<'_>) -> Option<ParsedSymbol> {
    let base = caps.name("base")?.as_str().to_string();
    let quote = caps
        .name("quote")
        .map(|m| m.as_str())
        .or(pattern.default_quote)?
        .to_string();

    let quantity_token = caps.name("qty").map(|m| m.as_str().to_string());
    let quantity = match &quantity_token {
        Some(token) => parse_quantity(token)?,
        None => 1,
    };

    let suffix = caps
        .name("suffix")
        .or_else(|| caps.name("date"))
        .or_else(|| caps.name("month"))
        .map(|m| m.as_str().to_string());

    Some(ParsedSymbol {
        pattern: pattern.kind,
        base,
        quote,
        quantity_token,
        quantity,
        suffix,
        show_suffix: pattern.show_suffix,
    })
}

// =============================================================================
// Normalization
// =============================================================================

/// Match a raw symbol against the ordered pattern list.
///
/// Returns `None` when no pattern matches.
#[must_use]
pub fn parse(raw: &str) -> Option<ParsedSymbol> {
    let candidate = raw.trim().to_uppercase();
    patterns().iter().find_map(|pattern| {
        pattern
            .regex
            .captures(&candidate)
            .and_then(|caps| extract(pattern, &caps))
    })
}

/// Normalize a raw symbol in the context of its category.
///
/// Never fails: an unparseable symbol becomes an instrument whose display
/// form is the raw symbol itself.
#[must_use]
pub fn normalize(raw: &str, category: Category) -> Instrument {
    let Some(parsed) = parse(raw) else {
        return Instrument::unparsed(raw, category);
    };

    let settlement_code = match category {
        Category::Inverse => parsed.base.clone(),
        Category::Spot | Category::Linear | Category::Option => parsed.quote.clone(),
    };

    Instrument {
        raw_symbol: raw.to_string(),
        integrated_symbol: parsed.display(),
        base_code: parsed.base,
        quote_code: parsed.quote,
        quantity: parsed.quantity,
        settlement_code,
        rest_of_symbol: parsed.suffix,
        category,
    }
}

/// Display form only, see [`normalize`].
#[must_use]
pub fn display_symbol(raw: &str) -> String {
    parse(raw).map_or_else(|| raw.to_string(), |parsed| parsed.display())
}
