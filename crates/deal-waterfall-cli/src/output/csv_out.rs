use serde_json::{Map, Value};
use std::io;

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Keys holding the main row set of a result, in lookup order.
const ROW_KEYS: [&str; 3] = ["tiers", "years", "rows"];

/// Write output as CSV to stdout.
///
/// Results with a row set (waterfall tiers, annual cash flows, pro forma
/// rows) or a sensitivity matrix are written as that table; anything else
/// becomes a two-column field/value listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => write_result(&mut wtr, result),
            Some(Value::Array(arr)) => write_array_csv(&mut wtr, arr),
            _ => write_fields(&mut wtr, map),
        },
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_result(wtr: &mut StdoutWriter<'_>, result: &Map<String, Value>) {
    if result.contains_key("matrix") {
        write_matrix(wtr, result);
        return;
    }
    if let Some(rows) = find_rows(result) {
        write_array_csv(wtr, rows);
        return;
    }
    write_fields(wtr, result);
}

/// Locate the row set, looking one level into nested sections
/// (e.g. `cash_flows.years` in a deal analysis).
fn find_rows(result: &Map<String, Value>) -> Option<&Vec<Value>> {
    for key in ROW_KEYS {
        if let Some(Value::Array(rows)) = result.get(key) {
            return Some(rows);
        }
    }
    result.values().find_map(|v| match v {
        Value::Object(inner) => ROW_KEYS.iter().find_map(|k| inner.get(*k)?.as_array()),
        _ => None,
    })
}

fn write_fields(wtr: &mut StdoutWriter<'_>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
    }
}

fn write_matrix(wtr: &mut StdoutWriter<'_>, result: &Map<String, Value>) {
    let v1_name = result
        .get("variable_1_name")
        .and_then(Value::as_str)
        .unwrap_or("variable_1");
    let metric = result
        .get("output_metric")
        .and_then(Value::as_str)
        .unwrap_or("value");
    let v2_values = result
        .get("variable_2_values")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut header = vec![v1_name.to_string()];
    if v2_values.is_empty() {
        header.push(metric.to_string());
    } else {
        header.extend(v2_values.iter().map(format_csv_value));
    }
    let _ = wtr.write_record(&header);

    let v1_values = result.get("variable_1_values").and_then(Value::as_array);
    let rows = result.get("matrix").and_then(Value::as_array);
    if let (Some(v1_values), Some(rows)) = (v1_values, rows) {
        for (v1, row) in v1_values.iter().zip(rows) {
            let mut record = vec![format_csv_value(v1)];
            if let Value::Array(cells) = row {
                record.extend(cells.iter().map(format_csv_value));
            }
            let _ = wtr.write_record(&record);
        }
    }
}

fn write_array_csv(wtr: &mut StdoutWriter<'_>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
