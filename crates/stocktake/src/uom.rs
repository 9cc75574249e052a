//! UOM resolution: how a category converts containers into servings.
//!
//! A [`UomRule`] is resolved once per line from the catalog and cached on the
//! line, so later catalog edits never rewrite figures that were already counted.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use cellarbook_core::{DomainError, DomainResult};

use crate::item::StockCategory;
use crate::limits::{MAX_QUANTITY, MAX_SIZE, ensure_at_most, overflow};

/// How the partial part of a physical count is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingMode {
    /// Partial is already in servings: `full × uom + partial`.
    PartialServings,
    /// Partial is a fraction of a container: `full × uom + partial × uom`.
    PartialContainers,
}

/// Precision allowed for counted partials and for valued quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    WholeUnits,
    TwoDecimals,
}

impl RoundingPolicy {
    pub fn decimal_places(self) -> u32 {
        match self {
            RoundingPolicy::WholeUnits => 0,
            RoundingPolicy::TwoDecimals => 2,
        }
    }

    pub fn round(self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.decimal_places(), RoundingStrategy::MidpointAwayFromZero)
    }

    /// Whether `value` is already representable under this policy.
    pub fn admits(self, value: Decimal) -> bool {
        value.normalize().scale() <= self.decimal_places()
    }
}

/// Full/partial split of a servings quantity, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayUnits {
    pub full_units: Decimal,
    pub partial_units: Decimal,
}

/// Resolved conversion rule for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UomRule {
    pub category: StockCategory,
    /// Servings per container.
    pub factor: Decimal,
    pub counting: CountingMode,
    pub rounding: RoundingPolicy,
}

/// Resolve the UOM rule for a category and its container/serving sizes.
///
/// Fails with `Configuration` when a size is missing, not positive or above
/// [`MAX_SIZE`], and with `CategoryMismatch` when the sizes cannot belong to
/// the category.
pub fn resolve(
    category: StockCategory,
    container_size: Option<Decimal>,
    serving_size: Option<Decimal>,
) -> DomainResult<UomRule> {
    let serving = match serving_size {
        Some(s) if s > Decimal::ZERO => s,
        Some(_) => {
            return Err(DomainError::configuration(format!(
                "{category}: serving size must be positive"
            )));
        }
        None => {
            return Err(DomainError::configuration(format!(
                "{category}: serving size is missing"
            )));
        }
    };
    let container = match container_size {
        Some(c) if c > Decimal::ZERO => c,
        Some(_) => {
            return Err(DomainError::configuration(format!(
                "{category}: container size must be positive"
            )));
        }
        None => {
            return Err(DomainError::configuration(format!(
                "{category}: container size is missing"
            )));
        }
    };

    if container > MAX_SIZE || serving > MAX_SIZE {
        return Err(DomainError::configuration(format!(
            "{category}: container and serving sizes cannot exceed {MAX_SIZE}"
        )));
    }

    let factor = container
        .checked_div(serving)
        .map(|f| f.round_dp(2))
        .filter(|f| *f <= MAX_SIZE)
        .ok_or_else(|| {
            DomainError::configuration(format!(
                "{category}: {container} / {serving} servings per container exceeds {MAX_SIZE}"
            ))
        })?;
    if factor < Decimal::ONE {
        return Err(DomainError::category_mismatch(format!(
            "{category}: serving size {serving} exceeds container size {container}"
        )));
    }

    let rounding = category.rounding_policy();
    if rounding == RoundingPolicy::WholeUnits && !factor.fract().is_zero() {
        return Err(DomainError::category_mismatch(format!(
            "{category}: containers must hold a whole number of servings (got {factor})"
        )));
    }

    Ok(UomRule {
        category,
        factor,
        counting: category.counting_mode(),
        rounding,
    })
}

impl UomRule {
    /// Reject counts that the category's policy cannot represent.
    pub fn validate_count(&self, full_units: Decimal, partial_units: Decimal) -> DomainResult<()> {
        if full_units < Decimal::ZERO || partial_units < Decimal::ZERO {
            return Err(DomainError::validation("counted units cannot be negative"));
        }
        if !full_units.fract().is_zero() {
            return Err(DomainError::validation("full units must be a whole number"));
        }
        ensure_at_most("full units", full_units, MAX_QUANTITY)?;
        ensure_at_most("partial units", partial_units, MAX_QUANTITY)?;
        if !self.rounding.admits(partial_units) {
            return Err(DomainError::validation(format!(
                "{}: partial units allow at most {} decimal places",
                self.category,
                self.rounding.decimal_places()
            )));
        }
        Ok(())
    }

    /// Counted servings for a physical count.
    pub fn counted_servings(
        &self,
        full_units: Decimal,
        partial_units: Decimal,
    ) -> DomainResult<Decimal> {
        let partial = match self.counting {
            CountingMode::PartialServings => Some(partial_units),
            CountingMode::PartialContainers => partial_units.checked_mul(self.factor),
        };
        full_units
            .checked_mul(self.factor)
            .zip(partial)
            .and_then(|(full, partial)| full.checked_add(partial))
            .ok_or_else(|| overflow("counted quantity"))
    }

    /// Quantity as valued: servings rounded to the category's precision.
    pub fn normalize(&self, servings: Decimal) -> Decimal {
        self.rounding.round(servings)
    }

    /// Split servings into full containers plus a partial (floor/mod), the
    /// partial expressed the same way a count would enter it.
    pub fn decompose(&self, servings: Decimal) -> DisplayUnits {
        let mut full = (servings / self.factor).floor();
        let remainder = servings - full * self.factor;

        let (mut partial, carry_at) = match self.counting {
            CountingMode::PartialServings => (self.rounding.round(remainder), self.factor),
            CountingMode::PartialContainers => {
                (self.rounding.round(remainder / self.factor), Decimal::ONE)
            }
        };
        if partial >= carry_at {
            full += Decimal::ONE;
            partial = Decimal::ZERO;
        }

        DisplayUnits {
            full_units: full,
            partial_units: partial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn missing_serving_size_is_a_configuration_error() {
        let err = resolve(StockCategory::Spirit, Some(dec!(700)), None).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));

        let err = resolve(StockCategory::Spirit, Some(dec!(700)), Some(dec!(0))).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn serving_larger_than_container_is_a_mismatch() {
        let err = resolve(StockCategory::Wine, Some(dec!(175)), Some(dec!(750))).unwrap_err();
        assert!(matches!(err, DomainError::CategoryMismatch(_)));
    }

    #[test]
    fn whole_unit_categories_need_whole_factors() {
        let err =
            resolve(StockCategory::BottledBeer, Some(dec!(12.5)), Some(dec!(1))).unwrap_err();
        assert!(matches!(err, DomainError::CategoryMismatch(_)));

        let ok = resolve(StockCategory::DozenMineral, Some(dec!(12)), Some(dec!(1))).unwrap();
        assert_eq!(ok.factor, dec!(12));
        assert_eq!(ok.rounding, RoundingPolicy::WholeUnits);
    }

    #[test]
    fn draught_factor_rounds_to_two_places() {
        // 50 litre keg, 0.568 litre pint.
        let rule = resolve(StockCategory::Draught, Some(dec!(50)), Some(dec!(0.568))).unwrap();
        assert_eq!(rule.factor, dec!(88.03));
        assert_eq!(rule.counting, CountingMode::PartialServings);
    }

    #[test]
    fn resolution_is_deterministic() {
        let a = resolve(StockCategory::Spirit, Some(dec!(700)), Some(dec!(35))).unwrap();
        let b = resolve(StockCategory::Spirit, Some(dec!(700)), Some(dec!(35))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn counted_servings_follow_the_counting_mode() {
        let beer = resolve(StockCategory::BottledBeer, Some(dec!(12)), Some(dec!(1))).unwrap();
        assert_eq!(beer.counted_servings(dec!(1), dec!(2)).unwrap(), dec!(14));

        let spirit = resolve(StockCategory::Spirit, Some(dec!(700)), Some(dec!(35))).unwrap();
        assert_eq!(spirit.counted_servings(dec!(3), dec!(0.5)).unwrap(), dec!(70));
    }

    #[test]
    fn whole_unit_partials_reject_fractions() {
        let beer = resolve(StockCategory::BottledBeer, Some(dec!(12)), Some(dec!(1))).unwrap();
        assert!(beer.validate_count(dec!(1), dec!(2.5)).is_err());
        assert!(beer.validate_count(dec!(1), dec!(2.0)).is_ok());
        assert!(beer.validate_count(dec!(-1), dec!(2)).is_err());
    }

    #[test]
    fn two_decimal_partials_reject_extra_precision() {
        let draught = resolve(StockCategory::Draught, Some(dec!(88)), Some(dec!(1))).unwrap();
        assert!(draught.validate_count(dec!(2), dec!(15.57)).is_ok());
        assert!(draught.validate_count(dec!(2), dec!(15.575)).is_err());
        assert!(draught.validate_count(dec!(2.5), dec!(1)).is_err());
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let beer = resolve(StockCategory::BottledBeer, Some(dec!(12)), Some(dec!(1))).unwrap();
        let huge = "70000000000000000000000000000".parse::<Decimal>().unwrap();
        let err = beer.validate_count(huge, dec!(0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(beer.validate_count(dec!(0), MAX_QUANTITY + dec!(1)).is_err());
        assert!(beer.validate_count(MAX_QUANTITY, dec!(0)).is_ok());
    }

    #[test]
    fn counted_servings_report_overflow_instead_of_panicking() {
        let beer = resolve(StockCategory::BottledBeer, Some(dec!(12)), Some(dec!(1))).unwrap();
        let huge = "70000000000000000000000000000".parse::<Decimal>().unwrap();
        let err = beer.counted_servings(huge, dec!(0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn extreme_sizes_are_configuration_errors() {
        let err = resolve(StockCategory::Other, Some(MAX_SIZE + dec!(1)), Some(dec!(1))).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));

        // A tiny serving size would otherwise divide out to an enormous factor.
        let tiny = "0.0000000000000000000000001".parse::<Decimal>().unwrap();
        let err = resolve(StockCategory::Other, Some(dec!(1000)), Some(tiny)).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn decompose_carries_a_partial_that_rounds_up_to_a_full_container() {
        let beer = resolve(StockCategory::BottledBeer, Some(dec!(12)), Some(dec!(1))).unwrap();
        let units = beer.decompose(dec!(23.6));
        assert_eq!(units.full_units, dec!(2));
        assert_eq!(units.partial_units, dec!(0));
    }

    fn categories() -> impl Strategy<Value = StockCategory> {
        prop::sample::select(StockCategory::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for canonical counts (partial below one container), splitting
        /// the counted servings back into full/partial reproduces the count.
        #[test]
        fn decompose_inverts_counted_servings(
            category in categories(),
            factor in 2u32..120,
            full in 0u32..500,
            partial_hundredths in 0u32..100_000,
        ) {
            let rule = resolve(category, Some(Decimal::from(factor)), Some(Decimal::ONE)).unwrap();
            let full = Decimal::from(full);
            let partial = match (rule.counting, rule.rounding) {
                (CountingMode::PartialServings, RoundingPolicy::WholeUnits) => {
                    Decimal::from(partial_hundredths % factor)
                }
                (CountingMode::PartialServings, RoundingPolicy::TwoDecimals) => {
                    Decimal::new((partial_hundredths % (factor * 100)) as i64, 2)
                }
                (CountingMode::PartialContainers, _) => {
                    Decimal::new((partial_hundredths % 100) as i64, 2)
                }
            };

            prop_assert!(rule.validate_count(full, partial).is_ok());
            let servings = rule.counted_servings(full, partial).unwrap();
            let units = rule.decompose(servings);

            prop_assert_eq!(units.full_units, full);
            prop_assert_eq!(units.partial_units, partial);
        }
    }
}
