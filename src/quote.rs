//! Quote domain model.
//!
//! A [`Quote`] is the single value produced per processed request: the
//! requested item echoed back verbatim plus a freshly generated price.
//! Serializes to the `{ "requestedItem": ..., "quoteValue": ... }` wire shape
//! published on the quotes exchange.

use serde::{Deserialize, Serialize};

/// Priced response for a single quote request.
///
/// `requested_item` always carries the inbound request payload unchanged.
/// `quote_value` is generated fresh per invocation and lies in `[0, 100)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub requested_item: String,
    pub quote_value: u8,
}

impl Quote {
    pub fn new<S: Into<String>>(requested_item: S, quote_value: u8) -> Self {
        Self {
            requested_item: requested_item.into(),
            quote_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_serializes_to_camel_case() {
        let quote = Quote::new("silver", 42);
        let json = serde_json::to_value(&quote).unwrap();

        assert_eq!(json["requestedItem"], "silver");
        assert_eq!(json["quoteValue"], 42);
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_quote_round_trips_through_json() {
        let json = r#"{"requestedItem":"gold","quoteValue":7}"#;
        let quote: Quote = serde_json::from_str(json).unwrap();

        assert_eq!(quote.requested_item, "gold");
        assert_eq!(quote.quote_value, 7);
    }

    #[test]
    fn test_quote_preserves_request_verbatim() {
        let raw = "  weird \t payload \u{1F4B0} ";
        let quote = Quote::new(raw, 0);
        assert_eq!(quote.requested_item, raw);
    }
}
