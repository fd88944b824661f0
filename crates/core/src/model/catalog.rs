//! The fixed set of course modules.

use crate::model::ids::ModuleId;

/// Number of modules in the course. The aggregate percentage is always taken
/// over this denominator, even if state carries entries for other module ids.
pub const MODULE_COUNT: usize = 6;

/// Known modules in course order, paired with their display titles.
pub const KNOWN_MODULES: [(&str, &str); MODULE_COUNT] = [
    ("pm-basics", "PM Basics"),
    ("discovery", "Discovery"),
    ("product-sense", "Product Sense"),
    ("metrics", "Metrics"),
    ("ai-era", "AI Era"),
    ("tools", "Tools"),
];

/// Ids of the known modules, in course order.
pub fn known_module_ids() -> impl Iterator<Item = ModuleId> {
    KNOWN_MODULES
        .iter()
        .filter_map(|(id, _)| ModuleId::new(*id).ok())
}

#[must_use]
pub fn is_known_module(id: &ModuleId) -> bool {
    KNOWN_MODULES.iter().any(|(known, _)| *known == id.as_str())
}

#[must_use]
pub fn module_title(id: &ModuleId) -> Option<&'static str> {
    KNOWN_MODULES
        .iter()
        .find(|(known, _)| *known == id.as_str())
        .map(|(_, title)| *title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_six_modules() {
        assert_eq!(known_module_ids().count(), MODULE_COUNT);
    }

    #[test]
    fn lookups_by_id() {
        let metrics = ModuleId::new("metrics").unwrap();
        assert!(is_known_module(&metrics));
        assert_eq!(module_title(&metrics), Some("Metrics"));

        let extra = ModuleId::new("bonus-track").unwrap();
        assert!(!is_known_module(&extra));
        assert_eq!(module_title(&extra), None);
    }
}
