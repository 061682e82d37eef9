//! Node host bridge. JSON in, JSON out.

use napi_derive::napi;

use crate::generate::generate_from_json;

#[napi]
pub fn generate_bindings_native(
    module_json: String,
    rules_json: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let report = generate_from_json(
        &module_json,
        &rules_json,
        options_json.as_deref().unwrap_or(""),
    )
    .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::from_str(&report).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[napi]
pub fn bindgen_bridge() -> String {
    format!("bindgen-core {} native bridge connected", env!("CARGO_PKG_VERSION"))
}
