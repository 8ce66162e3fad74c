use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{load_document, persist_document};
use crate::error::FieldscanError;
use crate::model::ExclusionRule;

/// Snapshot of the exclusion configuration used by one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSet {
    /// Strings blanking any field that contains them.
    #[serde(rename = "exclude", default)]
    pub strings: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ExclusionRule>,
}

impl ExclusionSet {
    pub fn from_strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = ExclusionSet::default();
        set.insert_all(items);
        set
    }

    pub fn with_rule(mut self, rule: ExclusionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.rules.is_empty()
    }

    fn insert_all<I, S>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for item in items {
            let trimmed = item.as_ref().trim();
            if !trimmed.is_empty() && self.strings.insert(trimmed.to_string()) {
                added += 1;
            }
        }
        added
    }
}

/// Process-wide exclusion strings and linked-field rules, persisted as
/// `{ "exclude": [...], "rules": [...] }` with strings sorted.
pub struct ExclusionStore {
    path: PathBuf,
    record: Mutex<ExclusionSet>,
}

impl ExclusionStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<ExclusionStore, FieldscanError> {
        let path = path.into();
        let record: ExclusionSet = load_document(&path)?;
        validate_rules(&record.rules)?;
        Ok(ExclusionStore {
            path,
            record: Mutex::new(record),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All exclusion strings, sorted.
    pub fn list_all(&self) -> Vec<String> {
        self.lock().strings.iter().cloned().collect()
    }

    pub fn rules(&self) -> Vec<ExclusionRule> {
        self.lock().rules.clone()
    }

    pub fn snapshot(&self) -> ExclusionSet {
        self.lock().clone()
    }

    /// Add trimmed, non-empty strings. Returns how many were new.
    pub fn add_many<I, S>(&self, items: I) -> Result<usize, FieldscanError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        self.modify(|record| {
            added = record.insert_all(items);
            added > 0
        })?;
        Ok(added)
    }

    /// Remove a string; surrounding whitespace is ignored as it is on add.
    pub fn remove(&self, item: &str) -> Result<bool, FieldscanError> {
        let item = item.trim();
        let mut removed = false;
        self.modify(|record| {
            removed = record.strings.remove(item);
            removed
        })?;
        Ok(removed)
    }

    /// Add a linked-field rule, replacing any rule with the same target and text.
    /// Field names and text are stored trimmed.
    pub fn upsert_rule(&self, rule: ExclusionRule) -> Result<(), FieldscanError> {
        let rule = trimmed_rule(rule);
        validate_rules(std::slice::from_ref(&rule))?;
        self.modify(|record| {
            match record.rules.iter_mut().find(|r| {
                r.target_field == rule.target_field && r.exclude_text == rule.exclude_text
            }) {
                Some(existing) => *existing = rule,
                None => record.rules.push(rule),
            }
            true
        })
    }

    pub fn remove_rule(&self, target_field: &str, exclude_text: &str) -> Result<bool, FieldscanError> {
        let (target_field, exclude_text) = (target_field.trim(), exclude_text.trim());
        let mut removed = false;
        self.modify(|record| {
            let before = record.rules.len();
            record
                .rules
                .retain(|r| !(r.target_field == target_field && r.exclude_text == exclude_text));
            removed = record.rules.len() != before;
            removed
        })?;
        Ok(removed)
    }

    /// Add every non-empty cell in column A of the first sheet of a workbook.
    /// Returns how many strings were new.
    pub fn import_xlsx(&self, workbook: &Path) -> Result<usize, FieldscanError> {
        let texts = read_first_column(workbook)?;
        self.add_many(texts)
    }

    fn modify<F>(&self, change: F) -> Result<(), FieldscanError>
    where
        F: FnOnce(&mut ExclusionSet) -> bool,
    {
        let mut guard = self.lock();
        let mut next = guard.clone();
        if !change(&mut next) {
            return Ok(());
        }
        persist_document(&self.path, &next)?;
        *guard = next;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ExclusionSet> {
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn trimmed_rule(rule: ExclusionRule) -> ExclusionRule {
    ExclusionRule {
        target_field: rule.target_field.trim().to_string(),
        exclude_text: rule.exclude_text.trim().to_string(),
        linked_fields: rule
            .linked_fields
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn validate_rules(rules: &[ExclusionRule]) -> Result<(), FieldscanError> {
    for rule in rules {
        if rule.target_field.trim().is_empty() {
            return Err(FieldscanError::Config(
                "exclusion rule target_field must not be empty".into(),
            ));
        }
        if rule.exclude_text.trim().is_empty() {
            return Err(FieldscanError::Config(format!(
                "exclusion rule for '{}' has empty exclude_text",
                rule.target_field
            )));
        }
    }
    Ok(())
}

fn read_first_column(path: &Path) -> Result<Vec<String>, FieldscanError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| FieldscanError::Workbook(format!("failed to open {}: {e}", path.display())))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| FieldscanError::Workbook(format!("{} has no sheets", path.display())))?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| FieldscanError::Workbook(format!("failed to read sheet '{first}': {e}")))?;

    // Column A is absolute column 0; the range may start further right.
    let start_col = range.start().map(|(_, c)| c).unwrap_or(0);
    if start_col > 0 {
        return Ok(Vec::new());
    }

    let texts = range
        .rows()
        .filter_map(|row| row.first())
        .filter_map(cell_text)
        .collect();
    Ok(texts)
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
