use serde_json::Value;

/// Empty-string sentinel used by the CSV writer for SQL NULL: `csv`
/// leaves a bare comma for an empty field and Postgres' `COPY ... CSV`
/// reads that back as NULL by default.
const NULL_SENTINEL: &str = "";

/// Coerces a lookup into a staged CSV field, treating JSON `null`,
/// missing keys, and "typed-zero" upstream placeholders (`0`, `""`,
/// `"0000-00-00"`) the same way the original mapper rules do: as SQL
/// NULL rather than a literal zero/empty string.
pub fn nullify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NULL_SENTINEL.to_string(),
        Some(Value::String(s)) if is_placeholder_string(s) => NULL_SENTINEL.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn is_placeholder_string(s: &str) -> bool {
    s.is_empty() || s == "0000-00-00"
}

pub fn get<'a>(obj: &'a Value, key: &str) -> Option<&'a Value> {
    obj.get(key)
}

pub fn field(obj: &Value, key: &str) -> String {
    nullify(get(obj, key))
}

pub fn nested_id(obj: &Value, key: &str) -> String {
    match obj.get(key) {
        Some(Value::Object(map)) => nullify(map.get("id")),
        _ => String::new(),
    }
}

/// Formats a Postgres array literal (`{a,b,c}`) from plain values,
/// quoting each element. Used for the array-typed columns upstream
/// otherwise exposes as JSON arrays (e.g. spoken language codes).
pub fn array_literal(values: &[String]) -> String {
    if values.is_empty() {
        return "{}".to_string();
    }
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
        .collect();
    format!("{{{}}}", quoted.join(","))
}

pub fn bool_field(obj: &Value, key: &str) -> String {
    match obj.get(key) {
        Some(Value::Bool(b)) => b.to_string(),
        _ => "false".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nullify_treats_placeholders_as_null() {
        assert_eq!(nullify(None), "");
        assert_eq!(nullify(Some(&Value::Null)), "");
        assert_eq!(nullify(Some(&json!(""))), "");
        assert_eq!(nullify(Some(&json!("0000-00-00"))), "");
        assert_eq!(nullify(Some(&json!("hello"))), "hello");
        assert_eq!(nullify(Some(&json!(42))), "42");
    }

    #[test]
    fn nested_id_pulls_child_id_or_empty() {
        let obj = json!({"belongs_to_collection": {"id": 10}});
        assert_eq!(nested_id(&obj, "belongs_to_collection"), "10");
        let obj = json!({"belongs_to_collection": null});
        assert_eq!(nested_id(&obj, "belongs_to_collection"), "");
    }

    #[test]
    fn array_literal_quotes_elements() {
        assert_eq!(array_literal(&[]), "{}");
        assert_eq!(
            array_literal(&["fr".to_string(), "en".to_string()]),
            "{\"fr\",\"en\"}"
        );
    }
}
