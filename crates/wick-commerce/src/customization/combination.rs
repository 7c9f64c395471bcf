use crate::catalog::OptionKind;
use crate::ids::OptionId;
use serde::{Deserialize, Serialize};

/// A customer's pick of scent, color and size. Any subset may be absent.
///
/// Two combinations are the same line-item identity when every slot matches,
/// so equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationCombination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scent_id: Option<OptionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<OptionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_id: Option<OptionId>,
}

impl CustomizationCombination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scent(mut self, id: impl Into<OptionId>) -> Self {
        self.scent_id = Some(id.into());
        self
    }

    pub fn with_color(mut self, id: impl Into<OptionId>) -> Self {
        self.color_id = Some(id.into());
        self
    }

    pub fn with_size(mut self, id: impl Into<OptionId>) -> Self {
        self.size_id = Some(id.into());
        self
    }

    pub fn get(&self, kind: OptionKind) -> Option<&OptionId> {
        match kind {
            OptionKind::Scent => self.scent_id.as_ref(),
            OptionKind::Color => self.color_id.as_ref(),
            OptionKind::Size => self.size_id.as_ref(),
        }
    }

    /// Present selections in scent, color, size order.
    pub fn selections(&self) -> impl Iterator<Item = (OptionKind, &OptionId)> {
        OptionKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|id| (kind, id)))
    }

    pub fn is_empty(&self) -> bool {
        self.scent_id.is_none() && self.color_id.is_none() && self.size_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selections_skip_absent_slots() {
        let combo = CustomizationCombination::new().with_scent("vanilla").with_size("large");
        let picked: Vec<_> = combo.selections().map(|(kind, id)| (kind, id.as_str())).collect();
        assert_eq!(
            picked,
            vec![(OptionKind::Scent, "vanilla"), (OptionKind::Size, "large")]
        );
    }

    #[test]
    fn test_identity_is_structural() {
        let a = CustomizationCombination::new().with_scent("vanilla");
        let b = CustomizationCombination::new().with_scent("vanilla");
        let c = CustomizationCombination::new().with_scent("vanilla").with_color("ivory");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_camel_case_wire_shape() {
        let combo: CustomizationCombination =
            serde_json::from_str(r#"{"scentId":"s1","sizeId":"l"}"#).unwrap();
        assert_eq!(combo.scent_id, Some(OptionId::new("s1")));
        assert_eq!(combo.color_id, None);
        assert!(!combo.is_empty());
    }
}
