use rust_decimal::{Decimal, RoundingStrategy};

/// Round to cents, half away from zero.
pub fn round_cents(val: Decimal) -> Decimal {
    val.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Plain German decimal: 1234,50
pub fn de_amount(val: Decimal) -> String {
    let mut cents = round_cents(val);
    cents.rescale(2);
    cents.to_string().replace('.', ",")
}

/// German display amount with digit grouping: 1.234,56 €
pub fn euro(val: Decimal) -> String {
    let plain = de_amount(val);
    let negative = plain.starts_with('-');
    let unsigned = plain.trim_start_matches('-');
    let (int_part, dec_part) = unsigned.split_once(',').unwrap_or((unsigned, "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-{grouped},{dec_part} €")
    } else {
        format!("{grouped},{dec_part} €")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_cents_half_away_from_zero() {
        assert_eq!(round_cents(dec!(0.125)), dec!(0.13));
        assert_eq!(round_cents(dec!(-0.125)), dec!(-0.13));
        assert_eq!(round_cents(dec!(2.674)), dec!(2.67));
    }

    #[test]
    fn test_de_amount() {
        assert_eq!(de_amount(dec!(1234.5)), "1234,50");
        assert_eq!(de_amount(dec!(0)), "0,00");
        assert_eq!(de_amount(dec!(-12.3)), "-12,30");
        assert_eq!(de_amount(dec!(7.005)), "7,01");
    }

    #[test]
    fn test_euro_formatting() {
        assert_eq!(euro(dec!(1234.56)), "1.234,56 €");
        assert_eq!(euro(dec!(-500)), "-500,00 €");
        assert_eq!(euro(dec!(0)), "0,00 €");
        assert_eq!(euro(dec!(1000000.99)), "1.000.000,99 €");
    }
}
