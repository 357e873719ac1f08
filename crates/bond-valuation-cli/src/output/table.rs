use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::cell;

/// Format output as tables using the tabled crate.
///
/// A valuation envelope prints one table per result section (parameters,
/// metrics, summary) followed by the period schedule.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => print_envelope(result, map),
            _ => print_fields(map),
        },
        Value::Array(rows) => print_rows(rows),
        _ => println!("{}", value),
    }
}

fn print_envelope(result: &Map<String, Value>, envelope: &Map<String, Value>) {
    let mut scalars = Map::new();
    for (key, val) in result {
        match val {
            Value::Object(section) => {
                println!("\n{}", heading(key));
                print_fields(section);
            }
            Value::Array(rows) => {
                println!("\n{}", heading(key));
                print_rows(rows);
            }
            _ => {
                scalars.insert(key.clone(), val.clone());
            }
        }
    }
    if !scalars.is_empty() {
        print_fields(&scalars);
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Two-column field/value table. Nested yield estimates flatten to
/// `name.field` rows.
fn print_fields(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        match val {
            Value::Object(inner) => {
                for (sub, v) in inner {
                    builder.push_record([format!("{key}.{sub}"), cell(v)]);
                }
            }
            _ => builder.push_record([key.clone(), cell(val)]),
        }
    }
    println!("{}", Table::from(builder));
}

fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            println!("{}", cell(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.iter().map(|h| h.as_str()));
    for item in rows {
        if let Value::Object(map) = item {
            builder.push_record(
                headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(cell).unwrap_or_default()),
            );
        }
    }
    println!("{}", Table::from(builder));
}

fn heading(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
