use super::CustomizationCombination;
use crate::catalog::{CompatibilityRule, OptionKind, Product};
use crate::error::{CommerceError, FieldError};
use crate::ids::OptionId;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Why a combination was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum InvalidReason {
    /// The id does not resolve to an available option of its kind.
    OptionUnavailable { kind: OptionKind, option_id: OptionId },
    /// Two selected options are disallowed together.
    IncompatibleCombination { first: OptionId, second: OptionId },
}

impl InvalidReason {
    /// Client field the failure relates to.
    pub fn field(&self) -> String {
        match self {
            InvalidReason::OptionUnavailable { kind, .. } => format!("{}Id", kind.as_str()),
            InvalidReason::IncompatibleCombination { .. } => "customization".to_string(),
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::OptionUnavailable { .. } => write!(f, "option unavailable"),
            InvalidReason::IncompatibleCombination { .. } => write!(f, "incompatible combination"),
        }
    }
}

/// Result of checking a combination against a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub reason: Option<InvalidReason>,
    /// Sum of the selected options' surcharges; zero when invalid.
    pub additional_price: Decimal,
}

impl ValidationOutcome {
    fn valid(additional_price: Decimal) -> Self {
        Self {
            is_valid: true,
            reason: None,
            additional_price,
        }
    }

    fn invalid(reason: InvalidReason) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
            additional_price: Decimal::ZERO,
        }
    }

    /// Convert into a `Result`, mapping rejection to a validation error.
    pub fn into_result(self) -> Result<Decimal, CommerceError> {
        match self.reason {
            None => Ok(self.additional_price),
            Some(reason) => Err(CommerceError::invalid_fields(
                reason.to_string(),
                vec![FieldError::new(reason.field(), reason.to_string())],
            )),
        }
    }
}

/// Pure checks of a customization combination against a product's catalog.
pub struct CustomizationValidator;

impl CustomizationValidator {
    /// Validate against the product's own table of disallowed pairs.
    pub fn validate(product: &Product, combination: &CustomizationCombination) -> ValidationOutcome {
        Self::validate_with(product, combination, &product.customization.incompatible)
    }

    /// Validate with an injected compatibility rule.
    pub fn validate_with<R>(
        product: &Product,
        combination: &CustomizationCombination,
        rule: &R,
    ) -> ValidationOutcome
    where
        R: CompatibilityRule + ?Sized,
    {
        let mut additional = Decimal::ZERO;
        for (kind, id) in combination.selections() {
            match product.customization.find(kind, id) {
                Some(option) if option.is_available() => {
                    additional += option.additional_price();
                }
                _ => {
                    return ValidationOutcome::invalid(InvalidReason::OptionUnavailable {
                        kind,
                        option_id: id.clone(),
                    });
                }
            }
        }

        let selected: Vec<&OptionId> = combination.selections().map(|(_, id)| id).collect();
        for (i, first) in selected.iter().enumerate() {
            for second in &selected[i + 1..] {
                if !rule.allows(first, second) || !rule.allows(second, first) {
                    return ValidationOutcome::invalid(InvalidReason::IncompatibleCombination {
                        first: (*first).clone(),
                        second: (*second).clone(),
                    });
                }
            }
        }

        ValidationOutcome::valid(additional)
    }

    /// Validate and return the surcharge, or a validation error.
    pub fn require_valid(
        product: &Product,
        combination: &CustomizationCombination,
    ) -> Result<Decimal, CommerceError> {
        Self::validate(product, combination).into_result()
    }

    /// Human-readable labels such as `Scent: Vanilla Bean`.
    ///
    /// Ids that no longer resolve are rendered verbatim.
    pub fn describe(product: &Product, combination: &CustomizationCombination) -> Vec<String> {
        combination
            .selections()
            .map(|(kind, id)| {
                let name = product
                    .customization
                    .find(kind, id)
                    .map(|option| option.name().to_string())
                    .unwrap_or_else(|| id.to_string());
                format!("{}: {}", kind.display_name(), name)
            })
            .collect()
    }
}
