//! Customization combinations and their validation.

mod combination;
mod validator;

pub use combination::CustomizationCombination;
pub use validator::{CustomizationValidator, InvalidReason, ValidationOutcome};
