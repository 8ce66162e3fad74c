use std::collections::HashSet;

use tracing::debug;

use crate::model::FieldValue;
use crate::store::ExclusionSet;

/// Whether `value` (trimmed) contains an exclusion string or the text of a
/// rule targeting `field_name`.
pub fn is_excluded(field_name: &str, value: &str, exclusions: &ExclusionSet) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    exclusions
        .strings
        .iter()
        .any(|s| !s.is_empty() && trimmed.contains(s.as_str()))
        || exclusions
            .rules
            .iter()
            .any(|r| r.target_field == field_name && trimmed.contains(r.exclude_text.as_str()))
}

/// Filter one value in isolation: empty when excluded, unchanged otherwise.
pub fn filter_value(field_name: &str, value: &str, exclusions: &ExclusionSet) -> String {
    if is_excluded(field_name, value, exclusions) {
        String::new()
    } else {
        value.to_string()
    }
}

/// Apply exclusions to all values recognized on one page.
///
/// Single fields are matched first against their original values; a matching
/// rule then also blanks its linked single fields. Table values are filtered
/// cell by cell and neither trigger nor receive linked blanking.
pub fn filter_page(values: &mut [(String, FieldValue)], exclusions: &ExclusionSet) {
    if exclusions.is_empty() {
        return;
    }

    let mut blank: HashSet<String> = HashSet::new();
    for (name, value) in values.iter() {
        let FieldValue::Single(text) = value else {
            continue;
        };
        if !is_excluded(name, text, exclusions) {
            continue;
        }
        blank.insert(name.clone());

        let trimmed = text.trim();
        for rule in exclusions
            .rules
            .iter()
            .filter(|r| &r.target_field == name && trimmed.contains(r.exclude_text.as_str()))
        {
            blank.extend(rule.linked_fields.iter().cloned());
        }
    }

    for (name, value) in values.iter_mut() {
        match value {
            FieldValue::Single(text) => {
                if blank.contains(name.as_str()) && !text.is_empty() {
                    debug!(field = %name, "excluded value blanked");
                    text.clear();
                }
            }
            FieldValue::Table(rows) => {
                if blank.contains(name.as_str()) {
                    debug!(field = %name, "linked exclusion ignored for table field");
                }
                for cell in rows.iter_mut().flatten() {
                    if is_excluded(name, cell, exclusions) {
                        cell.clear();
                    }
                }
            }
        }
    }
}
