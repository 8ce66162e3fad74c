use fieldscan_core::error::FieldscanError;
use fieldscan_core::store::regions::read_sets;
use fieldscan_core::store::{RegionStore, REGION_STORE_FILE};
use std::path::Path;

use crate::output;

fn open(store_dir: &Path) -> Result<RegionStore, FieldscanError> {
    RegionStore::open(store_dir.join(REGION_STORE_FILE))
}

pub fn list(store_dir: &Path) -> Result<(), FieldscanError> {
    let store = open(store_dir)?;
    let names = store.list_sets();
    if names.is_empty() {
        println!("No region sets in {}", store.path().display());
        return Ok(());
    }

    println!("Region sets in {}:\n", store.path().display());
    for name in names {
        if let Some(set) = store.get_set(&name) {
            let tables = set.regions.iter().filter(|r| r.is_table()).count();
            println!(
                "  {:<24} {} region(s), {} table(s)",
                set.set_name,
                set.regions.len(),
                tables
            );
        }
    }
    Ok(())
}

pub fn show(store_dir: &Path, name: &str, output_format: &str) -> Result<(), FieldscanError> {
    let set = open(store_dir)?.require_set(name)?;
    match output_format {
        "json" => output::json::print(&set)?,
        _ => print!("{}", output::table::format_region_set(&set)),
    }
    Ok(())
}

pub fn import(store_dir: &Path, file: &Path) -> Result<(), FieldscanError> {
    let store = open(store_dir)?;
    let names = store.import_sets(file)?;
    println!(
        "Imported {} set(s) into {}: {}",
        names.len(),
        store.path().display(),
        names.join(", ")
    );
    Ok(())
}

pub fn delete(store_dir: &Path, name: &str) -> Result<(), FieldscanError> {
    if open(store_dir)?.delete_set(name)? {
        println!("Deleted region set '{name}'");
        Ok(())
    } else {
        Err(FieldscanError::UnknownRegionSet(name.to_string()))
    }
}

pub fn validate(file: &Path) -> Result<(), FieldscanError> {
    let sets = read_sets(file)?;
    println!("OK: {} region set(s)", sets.len());
    for set in &sets {
        println!("  {} ({} regions)", set.set_name, set.regions.len());
    }
    Ok(())
}
