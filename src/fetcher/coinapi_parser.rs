//! CoinAPI response parser
//!
//! Stateless conversion of the historical order book JSON payload into
//! [`OrderBookSnapshot`]s. Prices and sizes are read from their textual JSON
//! form straight into [`Decimal`], so no binary floating point is ever involved.

use crate::fetcher::{FetcherError, FetcherResult};
use crate::{OrderBookSnapshot, Page, PriceLevel};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

/// Stateless parser for CoinAPI responses
pub struct CoinApiParser;

impl CoinApiParser {
    /// Parse the `/v1/orderbooks/{symbol}/history` array into a page
    ///
    /// # Format
    /// `[{"symbol_id", "time_exchange", "time_coinapi", "asks": [{"price", "size"}], "bids": [...]}]`
    ///
    /// The returned page is ordered by exchange time. A snapshot that parses
    /// but fails [`OrderBookSnapshot::validate`] rejects the whole page as
    /// [`FetcherError::InvalidResponse`].
    pub fn parse_history(items: Vec<Value>) -> FetcherResult<Page> {
        let mut page = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let snapshot = Self::parse_snapshot(item)?;
            snapshot.validate().map_err(|reason| {
                FetcherError::InvalidResponse(format!("Snapshot {index}: {reason}"))
            })?;
            page.push(snapshot);
        }

        if !page
            .windows(2)
            .all(|w| w[0].exchange_time <= w[1].exchange_time)
        {
            debug!("Provider page out of exchange-time order, sorting");
            page.sort_by_key(|s| s.exchange_time);
        }

        Ok(page)
    }

    /// Parse a single snapshot object
    pub fn parse_snapshot(item: &Value) -> FetcherResult<OrderBookSnapshot> {
        let obj = item
            .as_object()
            .ok_or_else(|| FetcherError::ParseError("Snapshot is not an object".to_string()))?;

        let symbol_id = obj
            .get("symbol_id")
            .and_then(Value::as_str)
            .ok_or_else(|| FetcherError::ParseError("Missing symbol_id".to_string()))?
            .to_string();

        let exchange_time = Self::parse_time(obj.get("time_exchange"), "time_exchange")?;
        let provider_time = Self::parse_time(obj.get("time_coinapi"), "time_coinapi")?;
        let asks = Self::parse_levels(obj.get("asks"), "asks")?;
        let bids = Self::parse_levels(obj.get("bids"), "bids")?;

        Ok(OrderBookSnapshot {
            symbol_id,
            exchange_time,
            provider_time,
            asks,
            bids,
        })
    }

    fn parse_time(value: Option<&Value>, field: &str) -> FetcherResult<DateTime<Utc>> {
        let text = value
            .and_then(Value::as_str)
            .ok_or_else(|| FetcherError::ParseError(format!("Missing {field}")))?;

        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| FetcherError::ParseError(format!("Invalid {field} '{text}': {e}")))
    }

    fn parse_levels(value: Option<&Value>, field: &str) -> FetcherResult<Vec<PriceLevel>> {
        // A side may be absent or null on an empty book
        let arr = match value {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(v) => v
                .as_array()
                .ok_or_else(|| FetcherError::ParseError(format!("{field} is not an array")))?,
        };

        arr.iter()
            .map(|level| {
                let price = Self::parse_decimal(level.get("price"), field, "price")?;
                let size = Self::parse_decimal(level.get("size"), field, "size")?;
                Ok(PriceLevel { price, size })
            })
            .collect()
    }

    /// Parse a decimal from either a JSON string or a JSON number
    ///
    /// Numbers are converted through their literal text, which accepts
    /// scientific notation such as `1e-8`. `serde_json` keeps that text
    /// verbatim (`arbitrary_precision`), so digits past f64 range survive.
    pub fn parse_decimal(value: Option<&Value>, side: &str, field: &str) -> FetcherResult<Decimal> {
        let text = match value {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(FetcherError::ParseError(format!(
                    "Missing or invalid {side}.{field}"
                )))
            }
        };

        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|e| FetcherError::ParseError(format!("Invalid {side}.{field} '{text}': {e}")))
    }
}
