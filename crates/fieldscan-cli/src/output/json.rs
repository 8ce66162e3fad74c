use fieldscan_core::error::FieldscanError;
use serde::Serialize;

pub fn print<T: Serialize>(value: &T) -> Result<(), FieldscanError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
