/// Job pricing and settlement amounts.
///
/// Every amount shown to a client and every amount charged through a payment
/// provider comes from this module. Money is kept as `NUMERIC(_, 2)` in the
/// database and handled in minor units (cents / paisa) when compared or sent
/// to a provider.
use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::ToPrimitive;
use serde::Serialize;
use std::str::FromStr;

/// Surcharge added on top of the job amount at payment time.
pub const SERVICE_FEE_PERCENT: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub amount: BigDecimal,
    pub service_fee: BigDecimal,
    pub total: BigDecimal,
    pub total_minor: i64,
    pub service_fee_percent: i64,
}

/// Round to two decimal places, half away from zero.
pub fn round_money(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

pub fn to_minor_units(value: &BigDecimal) -> Option<i64> {
    (value * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
}

pub fn from_minor_units(minor: i64) -> BigDecimal {
    (BigDecimal::from(minor) / BigDecimal::from(100)).with_scale(2)
}

/// Request bodies carry money and hours as JSON numbers; keep two decimals.
pub fn decimal_from_f64(value: f64) -> Option<BigDecimal> {
    if !value.is_finite() {
        return None;
    }
    BigDecimal::from_str(&format!("{:.2}", value)).ok()
}

/// `hourly_rate × duration`, the amount stored on the job.
pub fn job_total(hourly_rate: &BigDecimal, duration_hours: &BigDecimal) -> BigDecimal {
    round_money(&(hourly_rate * duration_hours))
}

/// Settlement quote for a job amount. `None` when the amount does not fit in minor units.
pub fn quote(amount: &BigDecimal) -> Option<Quote> {
    let amount_minor = to_minor_units(amount)?;
    let fee_minor = (amount_minor * SERVICE_FEE_PERCENT + 50) / 100;
    let total_minor = amount_minor.checked_add(fee_minor)?;

    Some(Quote {
        amount: from_minor_units(amount_minor),
        service_fee: from_minor_units(fee_minor),
        total: from_minor_units(total_minor),
        total_minor,
        service_fee_percent: SERVICE_FEE_PERCENT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_job_total() {
        assert_eq!(job_total(&dec("25.00"), &dec("3")), dec("75.00"));
        assert_eq!(job_total(&dec("18.50"), &dec("2.5")), dec("46.25"));
        assert_eq!(job_total(&dec("10.01"), &dec("0.5")), dec("5.01"));
    }

    #[test]
    fn test_quote_adds_ten_percent() {
        let q = quote(&dec("75.00")).unwrap();
        assert_eq!(q.amount, dec("75.00"));
        assert_eq!(q.service_fee, dec("7.50"));
        assert_eq!(q.total, dec("82.50"));
        assert_eq!(q.total_minor, 8250);
        assert_eq!(q.service_fee_percent, 10);
    }

    #[test]
    fn test_quote_rounds_fee_half_up() {
        let q = quote(&dec("33.33")).unwrap();
        assert_eq!(q.service_fee, dec("3.33"));
        assert_eq!(q.total, dec("36.66"));

        let q = quote(&dec("0.05")).unwrap();
        assert_eq!(q.service_fee, dec("0.01"));
        assert_eq!(q.total_minor, 6);
    }

    #[test]
    fn test_display_and_settlement_agree() {
        // The stored job total and the charged amount come from the same inputs.
        let total = job_total(&dec("42.75"), &dec("4"));
        let q = quote(&total).unwrap();
        assert_eq!(q.amount, total);
        assert_eq!(to_minor_units(&q.total), Some(q.total_minor));
    }

    #[test]
    fn test_decimal_from_f64() {
        assert_eq!(decimal_from_f64(25.0), Some(dec("25.00")));
        assert_eq!(decimal_from_f64(2.5), Some(dec("2.50")));
        assert_eq!(decimal_from_f64(f64::NAN), None);
        assert_eq!(decimal_from_f64(f64::INFINITY), None);
    }

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(to_minor_units(&dec("123.45")), Some(12345));
        assert_eq!(to_minor_units(&dec("0.005")), Some(1));
        assert_eq!(from_minor_units(12345), dec("123.45"));
        assert_eq!(from_minor_units(50).to_string(), "0.50");
    }
}
