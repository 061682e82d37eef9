use serde::{Deserialize, Serialize};

/// Per-run generator settings. Every field has a default so a partial JSON
/// object (or `{}`) is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorOptions {
    /// Name of the produced target assembly.
    pub assembly_name: String,
    /// Largest `ref-in` value (in bytes) passed as a direct value pointer.
    pub pass_by_value_threshold: u32,
    /// Native pointer width in bytes.
    pub pointer_size: u32,
    /// Static class that collects free functions of a namespace.
    pub functions_class_name: String,
    /// Static class that collects tagged defines of a namespace.
    pub constants_class_name: String,
    /// Arrays of interface pointers go through a native collection wrapper.
    pub interface_array_wrapper: bool,
    /// Interop thunks are declared in the generated module instead of a shared one.
    pub local_interop: bool,
    pub report_unused_rules: bool,
    /// Any error diagnostic fails the run, not only unresolved types.
    pub strict: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions {
            assembly_name: "Bindings".to_string(),
            pass_by_value_threshold: 16,
            pointer_size: 8,
            functions_class_name: "Functions".to_string(),
            constants_class_name: "Constants".to_string(),
            interface_array_wrapper: true,
            local_interop: false,
            report_unused_rules: true,
            strict: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_options_keep_defaults() {
        let options: GeneratorOptions =
            serde_json::from_str(r#"{ "assemblyName": "Gfx", "pointerSize": 4 }"#).unwrap();
        assert_eq!(options.assembly_name, "Gfx");
        assert_eq!(options.pointer_size, 4);
        assert_eq!(options.pass_by_value_threshold, 16);
        assert!(options.interface_array_wrapper);
        assert!(!options.strict);
    }
}
