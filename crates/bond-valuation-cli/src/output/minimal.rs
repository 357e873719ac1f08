use serde_json::Value;

use super::cell;

/// Metrics printed by `--output minimal`, most important first.
const HEADLINE_METRICS: [&str; 3] = ["present_value", "duration", "convexity"];

/// Print just the key answers.
///
/// Valuations print the headline metrics and the three annual yields, one per
/// line; schedules print the period count; validation prints `valid`.
pub fn print_minimal(value: &Value) {
    if let Value::Array(rows) = value {
        println!("{}", rows.len());
        return;
    }

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(Value::Object(metrics)) = result.get("metrics") {
        for key in HEADLINE_METRICS {
            if let Some(v) = metrics.get(key) {
                println!("{}: {}", key, cell(v));
            }
        }
        for (key, v) in metrics {
            if let Some(rate) = v.get("annual_rate") {
                println!("{}: {}", key, cell(rate));
            }
        }
        return;
    }

    match result.get("valid") {
        Some(v) => println!("{}", cell(v)),
        None => println!("{}", cell(result)),
    }
}
