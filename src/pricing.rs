//! Price and discount reconciliation for the product form.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("price must be greater than 0")]
    NonPositivePrice,
    #[error("discount percent must be between 1 and 99")]
    PercentOutOfRange,
    #[error("a discounted product needs an original price greater than its price")]
    OriginalNotGreater,
    #[error("price cannot exceed 1000000000")]
    PriceTooLarge,
}

/// Upper bound for any stored price, in whole pesos.
pub const MAX_PRICE: i64 = 1_000_000_000;

#[derive(Debug, Clone, Default)]
pub struct PriceInput {
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub discount_percent: Option<i32>,
    pub on_sale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pricing {
    pub price: i64,
    pub original_price: Option<i64>,
    pub discount_percent: Option<i32>,
    pub on_sale: bool,
}

/// Rounded percentage off `original`, or `None` when there is no discount.
pub fn discount_percent(original: i64, price: i64) -> Option<i32> {
    if price <= 0 || original <= price {
        return None;
    }
    let (original, price) = (i128::from(original), i128::from(price));
    let off = ((original - price) * 100 + original / 2) / original;
    Some(off.clamp(1, 99) as i32)
}

/// Price after taking `percent` off `original`, rounded to the nearest peso.
pub fn price_for_discount(original: i64, percent: i32) -> Result<i64, PricingError> {
    if !(1..=99).contains(&percent) {
        return Err(PricingError::PercentOutOfRange);
    }
    original
        .checked_mul(i64::from(100 - percent))
        .and_then(|scaled| scaled.checked_add(50))
        .map(|scaled| scaled / 100)
        .ok_or(PricingError::PriceTooLarge)
}

fn check_bounds(amount: i64) -> Result<i64, PricingError> {
    if amount <= 0 {
        return Err(PricingError::NonPositivePrice);
    }
    if amount > MAX_PRICE {
        return Err(PricingError::PriceTooLarge);
    }
    Ok(amount)
}

/// Resolve the stored price fields from what the operator submitted.
///
/// A percent given alongside the original price derives the price. Without
/// a percent, the submitted price is kept and the percent recomputed from it.
pub fn reconcile(input: PriceInput) -> Result<Pricing, PricingError> {
    if let Some(percent) = input.discount_percent {
        if !(1..=99).contains(&percent) {
            return Err(PricingError::PercentOutOfRange);
        }
    }

    if !input.on_sale {
        let price = check_bounds(input.price.ok_or(PricingError::NonPositivePrice)?)?;
        return Ok(Pricing {
            price,
            original_price: None,
            discount_percent: None,
            on_sale: false,
        });
    }

    let original = check_bounds(
        input
            .original_price
            .ok_or(PricingError::OriginalNotGreater)?,
    )?;
    let (price, percent) = match (input.discount_percent, input.price) {
        (Some(percent), _) => (price_for_discount(original, percent)?, Some(percent)),
        (None, Some(price)) => (price, None),
        (None, None) => return Err(PricingError::NonPositivePrice),
    };
    let price = check_bounds(price)?;
    if original <= price {
        return Err(PricingError::OriginalNotGreater);
    }

    Ok(Pricing {
        price,
        original_price: Some(original),
        discount_percent: percent.or_else(|| discount_percent(original, price)),
        on_sale: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(discount_percent(10_000, 7_500), Some(25));
        assert_eq!(discount_percent(3_000, 1_999), Some(33));
        assert_eq!(discount_percent(1_000, 999), Some(1));
        assert_eq!(discount_percent(1_000, 1_000), None);
        assert_eq!(discount_percent(1_000, 1_200), None);
    }

    #[test]
    fn derives_price_from_percent() {
        let pricing = reconcile(PriceInput {
            price: None,
            original_price: Some(20_000),
            discount_percent: Some(30),
            on_sale: true,
        })
        .unwrap();
        assert_eq!(pricing.price, 14_000);
        assert_eq!(pricing.discount_percent, Some(30));
    }

    #[test]
    fn percent_overrides_submitted_price() {
        let pricing = reconcile(PriceInput {
            price: Some(15_000),
            original_price: Some(24_000),
            discount_percent: Some(25),
            on_sale: true,
        })
        .unwrap();
        assert_eq!(pricing.price, 18_000);
        assert_eq!(pricing.discount_percent, Some(25));
    }

    #[test]
    fn explicit_price_without_percent_recomputes_it() {
        let pricing = reconcile(PriceInput {
            price: Some(15_000),
            original_price: Some(20_000),
            discount_percent: None,
            on_sale: true,
        })
        .unwrap();
        assert_eq!(pricing.price, 15_000);
        assert_eq!(pricing.discount_percent, Some(25));
    }

    #[test]
    fn huge_prices_are_rejected_instead_of_overflowing() {
        assert_eq!(
            reconcile(PriceInput {
                price: None,
                original_price: Some(i64::MAX),
                discount_percent: Some(10),
                on_sale: true,
            }),
            Err(PricingError::PriceTooLarge)
        );
        assert_eq!(
            reconcile(PriceInput {
                price: Some(i64::MAX),
                ..Default::default()
            }),
            Err(PricingError::PriceTooLarge)
        );
        assert_eq!(
            price_for_discount(i64::MAX, 10),
            Err(PricingError::PriceTooLarge)
        );
        assert_eq!(discount_percent(i64::MAX, 1), Some(99));
    }

    #[test]
    fn discount_requires_greater_original() {
        let err = reconcile(PriceInput {
            price: Some(20_000),
            original_price: Some(20_000),
            discount_percent: None,
            on_sale: true,
        })
        .unwrap_err();
        assert_eq!(err, PricingError::OriginalNotGreater);

        let err = reconcile(PriceInput {
            price: Some(20_000),
            original_price: None,
            discount_percent: None,
            on_sale: true,
        })
        .unwrap_err();
        assert_eq!(err, PricingError::OriginalNotGreater);
    }

    #[test]
    fn not_on_sale_clears_discount_fields() {
        let pricing = reconcile(PriceInput {
            price: Some(9_900),
            original_price: Some(12_000),
            discount_percent: None,
            on_sale: false,
        })
        .unwrap();
        assert_eq!(pricing.original_price, None);
        assert_eq!(pricing.discount_percent, None);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            reconcile(PriceInput {
                price: Some(0),
                ..Default::default()
            }),
            Err(PricingError::NonPositivePrice)
        );
        assert_eq!(
            reconcile(PriceInput {
                price: None,
                original_price: Some(1_000),
                discount_percent: Some(100),
                on_sale: true,
            }),
            Err(PricingError::PercentOutOfRange)
        );
    }
}
