use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Exchange trading filters for a symbol: the minimum order quantity and the
/// grids that quantities and prices must sit on.
///
/// This is a static table for the common symbols; in production these values
/// would be refreshed from the exchange-info endpoint.
#[derive(Debug, Clone, Copy)]
pub struct SymbolFilters {
    pub min_qty: Decimal,
    pub step_size: Decimal,
    pub tick_size: Decimal,
}

pub fn filters_for(symbol: &str) -> SymbolFilters {
    match symbol {
        "BTCUSDT" => SymbolFilters {
            min_qty: dec!(0.001),
            step_size: dec!(0.001),
            tick_size: dec!(0.1),
        },
        "ETHUSDT" => SymbolFilters {
            min_qty: dec!(0.001),
            step_size: dec!(0.001),
            tick_size: dec!(0.01),
        },
        _ => SymbolFilters {
            min_qty: dec!(0.001),
            step_size: dec!(0.001),
            tick_size: dec!(0.01),
        },
    }
}

/// True when `value` is representable on a grid of `step` increments.
pub fn on_grid(value: Decimal, step: Decimal) -> bool {
    if step.is_zero() {
        return true;
    }
    (value % step).is_zero()
}
