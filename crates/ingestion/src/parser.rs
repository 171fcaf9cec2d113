//! Trade message normalization.
//!
//! Parses raw trade-stream payloads into [`Tick`]s. Payloads follow the
//! Binance `<symbol>@trade` schema; combined-stream envelopes are unwrapped.

use pairs_core::{Error, Result, Tick};
use serde::Deserialize;
use serde_json::Value;

/// Raw trade event as sent by the exchange.
#[derive(Debug, Deserialize)]
struct TradeEvent {
    /// Event time (ms).
    #[serde(rename = "E")]
    event_time: i64,
    #[serde(rename = "s")]
    symbol: String,
    /// Price as a decimal string.
    #[serde(rename = "p")]
    price: StringOrNumber,
    /// Quantity as a decimal string.
    #[serde(rename = "q")]
    quantity: StringOrNumber,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(f64),
}

impl StringOrNumber {
    fn to_f64(&self, field: &str) -> Result<f64> {
        match self {
            StringOrNumber::Num(v) => Ok(*v),
            StringOrNumber::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::data(format!("invalid {field}: {s:?}"))),
        }
    }
}

/// Parse one raw feed message into a tick.
///
/// Any payload that is not a well-formed trade event is rejected with
/// [`Error::Data`]; callers drop it.
pub fn parse_trade(raw: &str) -> Result<Tick> {
    let mut value: Value = serde_json::from_str(raw)?;

    // Combined stream: {"stream": "btcusdt@trade", "data": {...}}
    if let Some(data) = value.get_mut("data") {
        value = data.take();
    }

    let event: TradeEvent = serde_json::from_value(value)?;

    let symbol = event.symbol.trim().to_ascii_uppercase();
    if symbol.is_empty() {
        return Err(Error::data("empty symbol"));
    }

    let price = event.price.to_f64("price")?;
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::data(format!("non-positive price {price}")));
    }

    let quantity = event.quantity.to_f64("quantity")?;
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(Error::data(format!("negative quantity {quantity}")));
    }

    Ok(Tick {
        timestamp: event.event_time,
        symbol,
        price,
        quantity,
    })
}
