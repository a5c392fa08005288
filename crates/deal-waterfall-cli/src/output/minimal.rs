use serde_json::Value;

/// Headline figure per command, in lookup order. Nested sections
/// (`returns`, `waterfall`) are searched after the top level.
const PRIORITY_KEYS: [&str; 9] = [
    "irr",
    "lp_irr",
    "total_lp",
    "value_created",
    "terminal_cash_to_equity",
    "total_cash_flow_to_equity",
    "base_case_value",
    "exit_value",
    "total_equity_irr",
];

/// Print just the key answer from the output.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        if let Some(val) = find_priority(map) {
            println!("{}", format_minimal(val));
            return;
        }
        for section in ["returns", "waterfall"] {
            if let Some(Value::Object(inner)) = map.get(section) {
                if let Some(val) = find_priority(inner) {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn find_priority(map: &serde_json::Map<String, Value>) -> Option<&Value> {
    PRIORITY_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|val| !val.is_null())
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "n/a".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
