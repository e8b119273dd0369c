//! Turns raw, string-typed request fields into a strongly-typed,
//! exchange-compliant [`OrderRequest`], or rejects them with field-level
//! errors.
//!
//! Validation is all-or-nothing per request: every offending field is
//! collected before returning, so a caller fixing a form sees the whole
//! picture at once. Unknown symbols are deliberately NOT rejected here; the
//! exchange is the authority on listed instruments and a local allow-list
//! would go stale.

use core_types::{OrderRequest, OrderSide, OrderType, TimeInForce};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

pub mod error;
pub mod filters;

pub use error::{FieldError, ValidationError};
pub use filters::{filters_for, SymbolFilters};

/// The raw, untyped fields of an order request as they arrive from a form,
/// JSON body, or command line. Everything is carried as optional text;
/// `validate` decides what is required for the given order type.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderFields {
    pub symbol: Option<String>,
    pub side: Option<String>,
    #[serde(default, deserialize_with = "de_scalar")]
    pub quantity: Option<String>,
    #[serde(default, deserialize_with = "de_scalar")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "de_scalar")]
    pub stop_price: Option<String>,
    pub time_in_force: Option<String>,
    #[serde(default, deserialize_with = "de_scalar")]
    pub reduce_only: Option<String>,
}

/// Accepts a JSON string, number, or bool and carries it as text. Form
/// clients quote everything while JSON dashboards send raw scalars; both
/// arrive at the same validation rules.
fn de_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_json::Number),
        Flag(bool),
    }

    Ok(
        Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
            Scalar::Text(t) => t,
            Scalar::Number(n) => n.to_string(),
            Scalar::Flag(b) => b.to_string(),
        }),
    )
}

/// Validates the raw fields against the rules for `order_type` and builds the
/// order request. Fields the order type does not use are ignored; `reduceOnly`
/// applies to every type.
pub fn validate(
    raw: &RawOrderFields,
    order_type: OrderType,
) -> Result<OrderRequest, ValidationError> {
    let mut errors: Vec<FieldError> = Vec::new();

    let symbol = validate_symbol(raw.symbol.as_deref(), &mut errors);
    let filters = filters_for(symbol.as_deref().unwrap_or_default());

    let side = match raw.side.as_deref() {
        None | Some("") => {
            errors.push(FieldError::new("side", "required"));
            None
        }
        Some(s) => match OrderSide::from_str(s) {
            Ok(side) => Some(side),
            Err(_) => {
                errors.push(FieldError::new("side", "must be BUY or SELL"));
                None
            }
        },
    };

    let quantity = match parse_positive(raw.quantity.as_deref(), "quantity", &mut errors) {
        Some(qty) => {
            if qty < filters.min_qty {
                errors.push(FieldError::new("quantity", "below minimum"));
                None
            } else if !filters::on_grid(qty, filters.step_size) {
                errors.push(FieldError::new("quantity", "precision"));
                None
            } else {
                Some(qty)
            }
        }
        None => None,
    };

    let price = if order_type.requires_price() {
        match parse_positive(raw.price.as_deref(), "price", &mut errors) {
            Some(p) if !filters::on_grid(p, filters.tick_size) => {
                errors.push(FieldError::new("price", "precision"));
                None
            }
            other => other,
        }
    } else {
        None
    };

    let stop_price = if order_type.requires_stop_price() {
        match parse_positive(raw.stop_price.as_deref(), "stopPrice", &mut errors) {
            Some(p) if !filters::on_grid(p, filters.tick_size) => {
                errors.push(FieldError::new("stopPrice", "precision"));
                None
            }
            other => other,
        }
    } else {
        None
    };

    // Stop-limit orders always rest until triggered, so their TIF is pinned;
    // types without a limit price carry no TIF on the wire, so whatever the
    // caller sent is ignored rather than validated.
    let time_in_force = if order_type == OrderType::StopLimit {
        TimeInForce::Gtc
    } else if !order_type.requires_price() {
        TimeInForce::default()
    } else {
        match raw.time_in_force.as_deref() {
            None | Some("") => TimeInForce::default(),
            Some(s) => match TimeInForce::from_str(s) {
                Ok(tif) => tif,
                Err(_) => {
                    errors.push(FieldError::new("timeInForce", "must be GTC, IOC or FOK"));
                    TimeInForce::default()
                }
            },
        }
    };

    let reduce_only = match raw.reduce_only.as_deref() {
        None | Some("") => false,
        Some(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => {
                errors.push(FieldError::new("reduceOnly", "must be true or false"));
                false
            }
        },
    };

    if !errors.is_empty() {
        return Err(ValidationError { fields: errors });
    }

    // All required fields validated above; the unwraps cannot fire.
    Ok(OrderRequest {
        symbol: symbol.unwrap(),
        side: side.unwrap(),
        order_type,
        quantity: quantity.unwrap(),
        price,
        stop_price,
        time_in_force,
        reduce_only,
        client_order_id: Uuid::new_v4(),
    })
}

/// Validates a leverage value against the exchange's 1..=125 range.
pub fn validate_leverage(leverage: i64) -> Result<u8, ValidationError> {
    if (1..=125).contains(&leverage) {
        Ok(leverage as u8)
    } else {
        Err(ValidationError::single(
            "leverage",
            "must be between 1 and 125",
        ))
    }
}

/// Normalizes and checks a symbol: trimmed, upper-cased, alphanumeric, with
/// the USDT quote suffix appended when a bare base asset is given.
fn validate_symbol(raw: Option<&str>, errors: &mut Vec<FieldError>) -> Option<String> {
    let raw = match raw {
        None | Some("") => {
            errors.push(FieldError::new("symbol", "required"));
            return None;
        }
        Some(s) => s,
    };

    let mut symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        errors.push(FieldError::new("symbol", "required"));
        return None;
    }
    if !symbol.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        errors.push(FieldError::new("symbol", "must be alphanumeric"));
        return None;
    }
    if !symbol.ends_with("USDT") {
        symbol.push_str("USDT");
    }
    Some(symbol)
}

fn parse_positive(
    raw: Option<&str>,
    field: &str,
    errors: &mut Vec<FieldError>,
) -> Option<Decimal> {
    let raw = match raw {
        None | Some("") => {
            errors.push(FieldError::new(field, "required"));
            return None;
        }
        Some(s) => s,
    };

    match Decimal::from_str(raw.trim()) {
        Ok(value) if value > Decimal::ZERO => Some(value),
        Ok(_) => {
            errors.push(FieldError::new(field, "must be positive"));
            None
        }
        Err(_) => {
            errors.push(FieldError::new(field, "not a valid number"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(symbol: &str, side: &str, quantity: &str) -> RawOrderFields {
        RawOrderFields {
            symbol: Some(symbol.to_string()),
            side: Some(side.to_string()),
            quantity: Some(quantity.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn market_order_with_minimal_fields_validates() {
        let request = validate(&raw("BTCUSDT", "BUY", "0.001"), OrderType::Market).unwrap();
        assert_eq!(request.symbol, "BTCUSDT");
        assert_eq!(request.side, OrderSide::Buy);
        assert_eq!(request.order_type, OrderType::Market);
        assert_eq!(request.quantity, dec!(0.001));
        assert_eq!(request.price, None);
        assert_eq!(request.stop_price, None);
        assert!(!request.reduce_only);
    }

    #[test]
    fn limit_order_without_price_reports_price_required() {
        let err = validate(&raw("BTCUSDT", "SELL", "0.001"), OrderType::Limit).unwrap_err();
        assert_eq!(err.fields.len(), 1);
        assert_eq!(err.fields[0].field, "price");
        assert_eq!(err.fields[0].reason, "required");
    }

    #[test]
    fn all_missing_fields_are_reported_together() {
        let err = validate(&RawOrderFields::default(), OrderType::StopLimit).unwrap_err();
        let fields: Vec<&str> = err.fields.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["symbol", "side", "quantity", "price", "stopPrice"]);
        assert!(err.fields.iter().all(|e| e.reason == "required"));
    }

    #[test]
    fn stop_market_requires_stop_price() {
        let err = validate(&raw("BTCUSDT", "BUY", "0.01"), OrderType::StopMarket).unwrap_err();
        assert_eq!(err.fields[0].field, "stopPrice");
    }

    #[test]
    fn raw_fields_accept_json_numbers_and_bools() {
        let raw: RawOrderFields = serde_json::from_value(serde_json::json!({
            "symbol": "BTCUSDT",
            "side": "BUY",
            "quantity": 0.001,
            "reduceOnly": true,
        }))
        .unwrap();
        let request = validate(&raw, OrderType::Market).unwrap();
        assert_eq!(request.quantity, dec!(0.001));
        assert!(request.reduce_only);
    }

    #[test]
    fn market_order_ignores_an_irrelevant_time_in_force() {
        let mut fields = raw("BTCUSDT", "BUY", "0.001");
        fields.time_in_force = Some("XX".to_string());
        let request = validate(&fields, OrderType::Market).unwrap();
        assert_eq!(request.time_in_force, TimeInForce::Gtc);
    }

    #[test]
    fn limit_order_still_validates_time_in_force() {
        let mut fields = raw("BTCUSDT", "BUY", "0.001");
        fields.price = Some("30000.1".to_string());
        fields.time_in_force = Some("XX".to_string());
        let err = validate(&fields, OrderType::Limit).unwrap_err();
        assert_eq!(err.fields[0].field, "timeInForce");
    }

    #[test]
    fn stop_limit_forces_gtc() {
        let mut fields = raw("BTCUSDT", "BUY", "0.01");
        fields.price = Some("30000.1".to_string());
        fields.stop_price = Some("29000.5".to_string());
        fields.time_in_force = Some("IOC".to_string());
        let request = validate(&fields, OrderType::StopLimit).unwrap();
        assert_eq!(request.time_in_force, TimeInForce::Gtc);
    }

    #[test]
    fn quantity_below_minimum_is_rejected() {
        let err = validate(&raw("BTCUSDT", "BUY", "0.0001"), OrderType::Market).unwrap_err();
        assert_eq!(err.fields[0].field, "quantity");
        assert_eq!(err.fields[0].reason, "below minimum");
    }

    #[test]
    fn quantity_off_the_step_grid_is_a_precision_error() {
        let err = validate(&raw("BTCUSDT", "BUY", "0.0015"), OrderType::Market).unwrap_err();
        assert_eq!(err.fields[0].reason, "precision");
    }

    #[test]
    fn price_off_the_tick_grid_is_a_precision_error() {
        let mut fields = raw("BTCUSDT", "BUY", "0.001");
        fields.price = Some("30000.05".to_string());
        let err = validate(&fields, OrderType::Limit).unwrap_err();
        assert_eq!(err.fields[0].field, "price");
        assert_eq!(err.fields[0].reason, "precision");
    }

    #[test]
    fn zero_and_negative_quantities_are_rejected() {
        for quantity in ["0", "-0.5"] {
            let err = validate(&raw("BTCUSDT", "BUY", quantity), OrderType::Market).unwrap_err();
            assert_eq!(err.fields[0].reason, "must be positive");
        }
    }

    #[test]
    fn symbol_is_normalized_and_suffixed() {
        let request = validate(&raw(" eth ", "buy", "0.01"), OrderType::Market).unwrap();
        assert_eq!(request.symbol, "ETHUSDT");
    }

    #[test]
    fn garbage_symbol_is_rejected_but_unknown_symbol_is_not() {
        let err = validate(&raw("BTC/USDT", "BUY", "0.001"), OrderType::Market).unwrap_err();
        assert_eq!(err.fields[0].field, "symbol");

        // Unknown-but-well-formed symbols pass through; the exchange decides.
        let request = validate(&raw("XYZUSDT", "BUY", "0.001"), OrderType::Market).unwrap();
        assert_eq!(request.symbol, "XYZUSDT");
    }

    #[test]
    fn leverage_bounds_are_enforced() {
        assert!(validate_leverage(1).is_ok());
        assert!(validate_leverage(125).is_ok());
        assert!(validate_leverage(0).is_err());
        assert!(validate_leverage(126).is_err());
    }
}
