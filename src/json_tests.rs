//! JSON entry point tests, using the same shapes a host would send.

#[cfg(test)]
mod tests {
    use crate::generate::generate_from_json;
    use serde_json::{json, Value};

    fn point_module() -> Value {
        json!({
            "name": "gfx",
            "declarations": [
                {
                    "name": "Point",
                    "path": "Lib::Point",
                    "kind": "struct",
                    "children": [
                        { "name": "X", "path": "Lib::Point::X", "kind": "field", "declaredType": { "name": "float" } },
                        { "name": "Y", "path": "Lib::Point::Y", "kind": "field", "declaredType": { "name": "float" } }
                    ]
                },
                {
                    "name": "Translate",
                    "path": "Lib::Translate",
                    "kind": "method",
                    "declaredType": { "name": "void" },
                    "children": [
                        {
                            "name": "point",
                            "path": "Lib::Translate::point",
                            "kind": "parameter",
                            "declaredType": { "name": "Point", "pointerDepth": 1, "isConst": true }
                        }
                    ]
                }
            ]
        })
    }

    fn run(module: &Value, rules: &Value, options: &str) -> Value {
        let report = generate_from_json(&module.to_string(), &rules.to_string(), options)
            .expect("generation should accept the input");
        serde_json::from_str(&report).unwrap()
    }

    fn find<'v>(nodes: &'v Value, qualified: &str) -> Option<&'v Value> {
        for node in nodes.as_array()? {
            if node["qualifiedName"] == qualified {
                return Some(node);
            }
            if let Some(found) = find(&node["children"], qualified) {
                return Some(found);
            }
        }
        None
    }

    #[test]
    fn test_point_report_shape() {
        let report = run(&point_module(), &json!([]), r#"{ "assemblyName": "Gfx" }"#);

        assert_eq!(report["success"], true);
        assert_eq!(report["assembly"]["name"], "Gfx");
        let namespaces = &report["assembly"]["namespaces"];

        let point = find(namespaces, "Lib.Point").unwrap();
        assert_eq!(point["kind"], "struct");
        assert_eq!(point["hasNativeShadow"], false);
        assert_eq!(point["size"], 8);

        let x = find(namespaces, "Lib.Point.X").unwrap();
        assert_eq!(x["kind"], "field");
        assert_eq!(x["visibility"], "public");
        assert_eq!(x["ty"], json!({ "kind": "primitive", "primitive": "f32" }));
        assert_eq!(x["marshalling"]["isArray"], false);
        assert_eq!(x["marshalling"]["isReference"], false);
        assert_eq!(x["marshalling"]["passByValueSizeBytes"], 4);

        let point_param = find(namespaces, "Lib.Functions.Translate.point").unwrap();
        assert_eq!(point_param["passing"], "ref-in");
        assert_eq!(point_param["marshalling"]["strategy"], "value-pointer");
    }

    #[test]
    fn test_shadow_rule_from_json() {
        let rules = json!([
            { "target": "struct", "pattern": "Lib::Point", "structHasNativeShadow": true }
        ]);
        let report = run(&point_module(), &rules, "");
        let namespaces = &report["assembly"]["namespaces"];

        assert_eq!(find(namespaces, "Lib.Point").unwrap()["hasNativeShadow"], true);
        let point_param = find(namespaces, "Lib.Functions.Translate.point").unwrap();
        assert_eq!(point_param["marshalling"]["strategy"], "shadow-temporary");
    }

    #[test]
    fn test_signatures_are_reported() {
        let report = run(&point_module(), &json!([]), "");
        let signatures = report["signatures"].as_array().unwrap();

        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[0]["method"], "Lib.Functions.Translate");
        assert_eq!(signatures[0]["signature"]["returnKind"], "void");
        assert_eq!(signatures[0]["signature"]["paramKinds"], json!(["pointer"]));
        assert_eq!(signatures[0]["signature"]["isFunctionPointer"], false);
        assert!(signatures[0]["thunk"].as_str().unwrap().starts_with("CallI_"));
    }

    #[test]
    fn test_unresolved_type_report() {
        let module = json!({
            "name": "gfx",
            "declarations": [
                {
                    "name": "Desc",
                    "path": "Lib::Desc",
                    "kind": "struct",
                    "children": [
                        { "name": "Format", "path": "Lib::Desc::Format", "kind": "field", "declaredType": { "name": "DXGI_FORMAT" } }
                    ]
                }
            ]
        });
        let rules = json!([
            { "target": "field", "pattern": "Lib::Nothing::*", "visibility": "internal" }
        ]);
        let report = run(&module, &rules, "");

        assert_eq!(report["success"], false);
        let items = report["diagnostics"]["items"].as_array().unwrap();
        let unresolved = items
            .iter()
            .find(|d| d["code"] == "BG-ERR-UNRESOLVED-TYPE")
            .unwrap();
        assert_eq!(unresolved["path"], "Lib::Desc::Format");
        assert_eq!(unresolved["severity"], "error");
        let unused = items
            .iter()
            .find(|d| d["code"] == "BG-WARN-UNUSED-RULE")
            .unwrap();
        assert_eq!(unused["ruleIndex"], 0);
        assert_eq!(unused["severity"], "warning");
    }

    #[test]
    fn test_parameter_direction_from_json() {
        let module = json!({
            "name": "gfx",
            "declarations": [
                { "name": "IBuffer", "path": "Lib::IBuffer", "kind": "interface" },
                {
                    "name": "CreateBuffer",
                    "path": "Lib::CreateBuffer",
                    "kind": "method",
                    "declaredType": { "name": "HRESULT" },
                    "children": [
                        {
                            "name": "enabled",
                            "path": "Lib::CreateBuffer::enabled",
                            "kind": "parameter",
                            "declaredType": { "name": "BOOL" }
                        },
                        {
                            "name": "buffer",
                            "path": "Lib::CreateBuffer::buffer",
                            "kind": "parameter",
                            "declaredType": { "name": "IBuffer", "pointerDepth": 2 },
                            "attributes": { "direction": "out" }
                        }
                    ]
                }
            ]
        });
        let rules = json!([
            { "target": "method", "pattern": "Lib::CreateBuffer" },
            { "target": "parameter", "pattern": "enabled", "typeName": "bool" },
            { "target": "parameter", "pattern": "buffer", "paramReturn": true }
        ]);
        let report = run(&module, &rules, "");
        assert_eq!(report["success"], true);
        let namespaces = &report["assembly"]["namespaces"];

        let enabled = find(namespaces, "Lib.Functions.CreateBuffer.enabled").unwrap();
        assert_eq!(enabled["marshalling"]["strategy"], "bool-temporary");
        assert_eq!(enabled["marshalling"]["isBoolAsInt"], true);

        let buffer = find(namespaces, "Lib.Functions.CreateBuffer.buffer").unwrap();
        assert_eq!(buffer["passing"], "out");
        assert_eq!(buffer["marshalling"]["strategy"], "out-handle-slot");

        let create = find(namespaces, "Lib.Functions.CreateBuffer").unwrap();
        assert_eq!(create["returnParam"], "buffer");
        assert_eq!(create["dllName"], "CreateBuffer");
    }
}
