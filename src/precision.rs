// =============================================================================
// Precision Formatter — truncate sizes and snap prices to venue precision
// =============================================================================
//
// The venue rejects sizes or prices carrying more precision than its metadata
// allows. Rounding away from zero could silently enlarge a user's intended
// risk, so truncation toward zero is the only safe default for sizes.
// =============================================================================

use rust_decimal::Decimal;

use crate::types::{Side, SymbolMeta};

/// Direction to snap a price that doesn't land exactly on a tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickBias {
    Floor,
    Ceil,
}

/// Round `raw` toward zero to `sz_decimals` places. Zero is returned as-is;
/// callers decide whether a zero result is actionable.
pub fn truncate_size(meta: &SymbolMeta, raw: Decimal) -> Decimal {
    raw.trunc_with_scale(meta.sz_decimals)
}

/// Snap `raw` to the nearest multiple of `tick_size`, biased per `bias`.
fn snap_to_tick(meta: &SymbolMeta, raw: Decimal, bias: TickBias) -> Decimal {
    if meta.tick_size.is_zero() {
        return raw;
    }
    let units = raw / meta.tick_size;
    let snapped_units = match bias {
        TickBias::Floor => units.floor(),
        TickBias::Ceil => units.ceil(),
    };
    snapped_units * meta.tick_size
}

/// Default price formatting for entry/limit orders: floor-to-tick.
pub fn format_price(meta: &SymbolMeta, raw: Decimal) -> Decimal {
    snap_to_tick(meta, raw, TickBias::Floor)
}

/// Format a protective trigger price (stop-loss or take-profit) for a
/// position held on `position_side`.
///
/// A stop must never be snapped looser than requested — for a long position
/// that means rounding toward the market (up), so the stop cannot drift
/// further away and tolerate more loss than intended. A take-profit must
/// never trigger earlier than requested — for a long position that also
/// means rounding up, so the target is never reached before the requested
/// price. Both reduce to the same rule: long positions round up, short
/// positions round down.
pub fn format_trigger_price(meta: &SymbolMeta, raw: Decimal, position_side: Side) -> Decimal {
    match position_side {
        Side::Buy => snap_to_tick(meta, raw, TickBias::Ceil),
        Side::Sell => snap_to_tick(meta, raw, TickBias::Floor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn meta(sz_decimals: u32, tick_size: Decimal) -> SymbolMeta {
        SymbolMeta { sz_decimals, tick_size }
    }

    #[test]
    fn truncate_size_rounds_toward_zero() {
        let m = meta(2, dec!(0.01));
        assert_eq!(truncate_size(&m, dec!(0.2071)), dec!(0.20));
    }

    #[test]
    fn truncate_size_never_enlarges() {
        let m = meta(0, dec!(1));
        let out = truncate_size(&m, dec!(10.73));
        assert!(out <= dec!(10.73));
        assert_eq!(out, dec!(10));
    }

    #[test]
    fn truncate_size_zero_stays_zero() {
        let m = meta(2, dec!(0.01));
        assert_eq!(truncate_size(&m, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn format_price_floors_by_default() {
        let m = meta(2, dec!(0.5));
        assert_eq!(format_price(&m, dec!(170.3)), dec!(170.0));
    }

    #[test]
    fn trigger_price_long_stop_rounds_up_toward_market() {
        let m = meta(2, dec!(0.5));
        // requested stop at 170.3, long position: round up to 170.5, never looser (lower).
        let out = format_trigger_price(&m, dec!(170.3), Side::Buy);
        assert_eq!(out, dec!(170.5));
    }

    #[test]
    fn trigger_price_short_stop_rounds_down_toward_market() {
        let m = meta(2, dec!(0.5));
        let out = format_trigger_price(&m, dec!(170.3), Side::Sell);
        assert_eq!(out, dec!(170.0));
    }

    #[test]
    fn trigger_price_exact_tick_is_unchanged() {
        let m = meta(2, dec!(0.5));
        assert_eq!(format_trigger_price(&m, dec!(170.5), Side::Buy), dec!(170.5));
        assert_eq!(format_trigger_price(&m, dec!(170.5), Side::Sell), dec!(170.5));
    }
}
