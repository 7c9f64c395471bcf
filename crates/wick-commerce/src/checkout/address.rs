//! Address types and contact validation.

use crate::error::{CommerceError, FieldError};
use crate::pricing::Jurisdiction;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{5}(-[0-9]{4})?$").expect("postal code pattern compiles")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

/// A postal address.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    /// Street line.
    pub street: String,
    /// Apartment, suite, unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,
    pub city: String,
    /// State or region code (e.g. "CA").
    pub state: String,
    /// ZIP code, `12345` or `12345-6789`.
    pub postal_code: String,
    /// Country code (e.g. "US").
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Format as single line.
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.street.clone()];
        if let Some(ref apartment) = self.apartment {
            parts.push(apartment.clone());
        }
        parts.push(self.city.clone());
        parts.push(format!("{} {}", self.state, self.postal_code));
        parts.push(self.country.clone());
        parts.join(", ")
    }

    /// Every failing field, empty when the address is shippable.
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.push(FieldError::new(field, "is required"));
            }
        }
        if !POSTAL_CODE.is_match(self.postal_code.trim()) {
            errors.push(FieldError::new("postalCode", "must be a 5-digit ZIP or ZIP+4"));
        }
        errors
    }

    pub fn validate(&self) -> Result<(), CommerceError> {
        let errors = self.field_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CommerceError::invalid_fields("invalid shipping address", errors))
        }
    }

    pub fn jurisdiction(&self) -> Jurisdiction {
        Jurisdiction::new(self.country.trim(), Some(self.state.trim().to_string()))
    }
}

/// Whether `email` looks deliverable.
pub fn is_plausible_email(email: &str) -> bool {
    EMAIL.is_match(email.trim())
}
