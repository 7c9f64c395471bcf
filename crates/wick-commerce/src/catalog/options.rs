//! Customization option types: scents, colors and sizes.

use crate::error::{CommerceError, FieldError};
use crate::ids::OptionId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The three customization groups a candle can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Scent,
    Color,
    Size,
}

impl OptionKind {
    pub const ALL: [OptionKind; 3] = [OptionKind::Scent, OptionKind::Color, OptionKind::Size];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKind::Scent => "scent",
            OptionKind::Color => "color",
            OptionKind::Size => "size",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OptionKind::Scent => "Scent",
            OptionKind::Color => "Color",
            OptionKind::Size => "Size",
        }
    }
}

/// How strong a scent throws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScentIntensity {
    Light,
    #[default]
    Medium,
    Strong,
}

/// Fields every option kind shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDetails {
    /// Option identifier, unique within its product.
    pub id: OptionId,
    /// Display name (e.g. "Vanilla Bean").
    pub name: String,
    /// Price added on top of the product's base price.
    pub additional_price: Decimal,
    /// Whether the option can currently be selected.
    pub available: bool,
}

/// Kind-specific attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum OptionAttributes {
    Scent {
        intensity: ScentIntensity,
        #[serde(default)]
        notes: Vec<String>,
    },
    Color {
        hex_code: String,
    },
    Size {
        dimensions: Option<String>,
        weight_grams: Option<u32>,
        burn_time_hours: Option<u32>,
    },
}

impl OptionAttributes {
    pub fn kind(&self) -> OptionKind {
        match self {
            OptionAttributes::Scent { .. } => OptionKind::Scent,
            OptionAttributes::Color { .. } => OptionKind::Color,
            OptionAttributes::Size { .. } => OptionKind::Size,
        }
    }
}

/// A selectable customization option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomizationOption {
    #[serde(flatten)]
    pub details: OptionDetails,
    #[serde(flatten)]
    pub attributes: OptionAttributes,
}

impl CustomizationOption {
    fn available(
        id: impl Into<OptionId>,
        name: impl Into<String>,
        additional_price: Decimal,
        attributes: OptionAttributes,
    ) -> Self {
        Self {
            details: OptionDetails {
                id: id.into(),
                name: name.into(),
                additional_price,
                available: true,
            },
            attributes,
        }
    }

    /// Create an available scent option.
    pub fn scent(
        id: impl Into<OptionId>,
        name: impl Into<String>,
        additional_price: Decimal,
        intensity: ScentIntensity,
    ) -> Self {
        Self::available(
            id,
            name,
            additional_price,
            OptionAttributes::Scent {
                intensity,
                notes: Vec::new(),
            },
        )
    }

    /// Create an available color option.
    pub fn color(
        id: impl Into<OptionId>,
        name: impl Into<String>,
        additional_price: Decimal,
        hex_code: impl Into<String>,
    ) -> Self {
        Self::available(
            id,
            name,
            additional_price,
            OptionAttributes::Color {
                hex_code: hex_code.into(),
            },
        )
    }

    /// Create an available size option.
    pub fn size(
        id: impl Into<OptionId>,
        name: impl Into<String>,
        additional_price: Decimal,
        burn_time_hours: Option<u32>,
    ) -> Self {
        Self::available(
            id,
            name,
            additional_price,
            OptionAttributes::Size {
                dimensions: None,
                weight_grams: None,
                burn_time_hours,
            },
        )
    }

    /// Mark the option as not selectable.
    pub fn unavailable(mut self) -> Self {
        self.details.available = false;
        self
    }

    /// Add scent notes (ignored for other kinds).
    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        if let OptionAttributes::Scent { notes: ref mut n, .. } = self.attributes {
            *n = notes;
        }
        self
    }

    pub fn id(&self) -> &OptionId {
        &self.details.id
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn kind(&self) -> OptionKind {
        self.attributes.kind()
    }

    pub fn additional_price(&self) -> Decimal {
        self.details.additional_price
    }

    pub fn is_available(&self) -> bool {
        self.details.available
    }
}

/// Decides whether two selected options may be combined.
///
/// Callers check both argument orders, so an implementation does not need to
/// be symmetric itself.
pub trait CompatibilityRule {
    fn allows(&self, first: &OptionId, second: &OptionId) -> bool;
}

impl<F> CompatibilityRule for F
where
    F: Fn(&OptionId, &OptionId) -> bool,
{
    fn allows(&self, first: &OptionId, second: &OptionId) -> bool {
        self(first, second)
    }
}

/// Two options that may not be selected together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncompatiblePair {
    pub first: OptionId,
    pub second: OptionId,
}

impl IncompatiblePair {
    /// Whether this pair covers `a` and `b` in either order.
    pub fn matches(&self, a: &OptionId, b: &OptionId) -> bool {
        (&self.first == a && &self.second == b) || (&self.first == b && &self.second == a)
    }
}

/// Data-driven table of disallowed option pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompatibilityTable {
    pairs: Vec<IncompatiblePair>,
}

impl CompatibilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disallow selecting `first` together with `second`.
    pub fn disallow(mut self, first: impl Into<OptionId>, second: impl Into<OptionId>) -> Self {
        self.pairs.push(IncompatiblePair {
            first: first.into(),
            second: second.into(),
        });
        self
    }

    pub fn is_disallowed(&self, a: &OptionId, b: &OptionId) -> bool {
        self.pairs.iter().any(|pair| pair.matches(a, b))
    }

    pub fn pairs(&self) -> &[IncompatiblePair] {
        &self.pairs
    }
}

impl CompatibilityRule for CompatibilityTable {
    fn allows(&self, first: &OptionId, second: &OptionId) -> bool {
        !self.is_disallowed(first, second)
    }
}

/// A product's customization option groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomizationCatalog {
    #[serde(default)]
    pub scents: Vec<CustomizationOption>,
    #[serde(default)]
    pub colors: Vec<CustomizationOption>,
    #[serde(default)]
    pub sizes: Vec<CustomizationOption>,
    /// Disallowed option pairs.
    #[serde(default)]
    pub incompatible: CompatibilityTable,
}

impl CustomizationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scent(mut self, option: CustomizationOption) -> Self {
        self.scents.push(option);
        self
    }

    pub fn with_color(mut self, option: CustomizationOption) -> Self {
        self.colors.push(option);
        self
    }

    pub fn with_size(mut self, option: CustomizationOption) -> Self {
        self.sizes.push(option);
        self
    }

    pub fn with_incompatible(
        mut self,
        first: impl Into<OptionId>,
        second: impl Into<OptionId>,
    ) -> Self {
        self.incompatible = self.incompatible.disallow(first, second);
        self
    }

    /// All options of one kind.
    pub fn group(&self, kind: OptionKind) -> &[CustomizationOption] {
        match kind {
            OptionKind::Scent => &self.scents,
            OptionKind::Color => &self.colors,
            OptionKind::Size => &self.sizes,
        }
    }

    /// Look up an option within its group.
    pub fn find(&self, kind: OptionKind, id: &OptionId) -> Option<&CustomizationOption> {
        self.group(kind).iter().find(|option| option.id() == id)
    }

    /// Options of one kind that can currently be selected.
    pub fn available(&self, kind: OptionKind) -> impl Iterator<Item = &CustomizationOption> {
        self.group(kind).iter().filter(|option| option.is_available())
    }

    pub fn is_empty(&self) -> bool {
        self.scents.is_empty() && self.colors.is_empty() && self.sizes.is_empty()
    }

    /// Check catalog invariants: options sit in the group matching their kind,
    /// prices are non-negative and ids are unique per group.
    pub fn check(&self) -> Result<(), CommerceError> {
        let mut fields = Vec::new();
        for kind in OptionKind::ALL {
            let mut seen = HashSet::new();
            for option in self.group(kind) {
                let field = format!("{}s.{}", kind.as_str(), option.id());
                if option.kind() != kind {
                    fields.push(FieldError::new(
                        field.clone(),
                        format!("{} option listed under {}s", option.kind().as_str(), kind.as_str()),
                    ));
                }
                if option.additional_price().is_sign_negative() && !option.additional_price().is_zero() {
                    fields.push(FieldError::new(field.clone(), "additional price must not be negative"));
                }
                if !seen.insert(option.id().clone()) {
                    fields.push(FieldError::new(field, "duplicate option id"));
                }
            }
        }
        if fields.is_empty() {
            Ok(())
        } else {
            Err(CommerceError::invalid_fields("invalid customization catalog", fields))
        }
    }
}
