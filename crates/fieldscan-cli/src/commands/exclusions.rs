use fieldscan_core::error::FieldscanError;
use fieldscan_core::model::ExclusionRule;
use fieldscan_core::store::{ExclusionStore, EXCLUSION_STORE_FILE};
use std::path::Path;

fn open(store_dir: &Path) -> Result<ExclusionStore, FieldscanError> {
    ExclusionStore::open(store_dir.join(EXCLUSION_STORE_FILE))
}

pub fn list(store_dir: &Path) -> Result<(), FieldscanError> {
    let store = open(store_dir)?;
    let strings = store.list_all();
    let rules = store.rules();

    println!("Exclusion strings ({}):", strings.len());
    for s in &strings {
        println!("  {s}");
    }

    if !rules.is_empty() {
        println!("\nLinked-field rules ({}):", rules.len());
        for rule in &rules {
            let linked = if rule.linked_fields.is_empty() {
                "-".to_string()
            } else {
                rule.linked_fields.join(", ")
            };
            println!(
                "  {} contains '{}' -> also blank {}",
                rule.target_field, rule.exclude_text, linked
            );
        }
    }
    Ok(())
}

pub fn add(store_dir: &Path, texts: &[String]) -> Result<(), FieldscanError> {
    let added = open(store_dir)?.add_many(texts)?;
    println!("Added {added} new exclusion string(s)");
    Ok(())
}

pub fn remove(store_dir: &Path, text: &str) -> Result<(), FieldscanError> {
    if open(store_dir)?.remove(text)? {
        println!("Removed '{text}'");
    } else {
        println!("'{text}' was not in the exclusion list");
    }
    Ok(())
}

pub fn import_xlsx(store_dir: &Path, file: &Path) -> Result<(), FieldscanError> {
    let added = open(store_dir)?.import_xlsx(file)?;
    println!("Imported {added} new exclusion string(s) from {}", file.display());
    Ok(())
}

pub fn link(
    store_dir: &Path,
    field: String,
    text: String,
    linked: Vec<String>,
) -> Result<(), FieldscanError> {
    let rule = ExclusionRule {
        target_field: field,
        exclude_text: text,
        linked_fields: linked,
    };
    open(store_dir)?.upsert_rule(rule.clone())?;
    println!(
        "Rule saved: {} contains '{}' blanks {} linked field(s)",
        rule.target_field,
        rule.exclude_text,
        rule.linked_fields.len()
    );
    Ok(())
}

pub fn unlink(store_dir: &Path, field: &str, text: &str) -> Result<(), FieldscanError> {
    if open(store_dir)?.remove_rule(field, text)? {
        println!("Removed rule for {field} / '{text}'");
    } else {
        println!("No rule for {field} / '{text}'");
    }
    Ok(())
}
