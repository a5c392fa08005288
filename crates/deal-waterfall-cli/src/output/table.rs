use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Format output as tables using the tabled crate.
///
/// Scalar result fields go into one Field/Value table. Arrays of objects
/// (tiers, annual years, pro forma rows) and nested sections each get their
/// own titled table; a sensitivity matrix is drawn as a grid.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_section(None, map);
            }
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) if res_map.contains_key("matrix") => print_matrix(res_map),
        Value::Object(res_map) => print_section(None, res_map),
        other => println!("{}", format_value(other)),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Print scalars first, then recurse into nested objects and arrays.
fn print_section(title: Option<&str>, map: &Map<String, Value>) {
    let scalars: Vec<(&String, &Value)> = map
        .iter()
        .filter(|(_, v)| !is_tabular(v) && !v.is_object())
        .collect();

    if let Some(t) = title {
        println!("\n{}", t);
    }
    if !scalars.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in scalars {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", Table::from(builder));
    }

    for (key, val) in map {
        match val {
            Value::Object(inner) => print_section(Some(key.as_str()), inner),
            Value::Array(arr) if is_tabular(val) => {
                println!("\n{}", key);
                print_array_table(arr);
            }
            _ => {}
        }
    }
}

fn is_tabular(value: &Value) -> bool {
    matches!(value, Value::Array(arr) if matches!(arr.first(), Some(Value::Object(_))))
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn print_matrix(res: &Map<String, Value>) {
    let v1_name = res
        .get("variable_1_name")
        .and_then(Value::as_str)
        .unwrap_or("variable_1");
    let v2_values = res
        .get("variable_2_values")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let metric = res
        .get("output_metric")
        .and_then(Value::as_str)
        .unwrap_or("value");

    let mut header = vec![v1_name.to_string()];
    if v2_values.is_empty() {
        header.push(metric.to_string());
    } else {
        header.extend(v2_values.iter().map(format_value));
    }

    let mut builder = Builder::default();
    builder.push_record(header);

    let v1_values = res.get("variable_1_values").and_then(Value::as_array);
    let rows = res.get("matrix").and_then(Value::as_array);
    if let (Some(v1_values), Some(rows)) = (v1_values, rows) {
        for (v1, row) in v1_values.iter().zip(rows) {
            let mut record = vec![format_value(v1)];
            if let Value::Array(cells) = row {
                record.extend(cells.iter().map(format_value));
            }
            builder.push_record(record);
        }
    }

    if let Some(Value::String(v2_name)) = res.get("variable_2_name") {
        println!("{} (rows) x {} (columns): {}", v1_name, v2_name, metric);
    }
    println!("{}", Table::from(builder));

    if let Some(base) = res.get("base_case_value") {
        println!("Base case: {}", format_value(base));
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "n/a".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
