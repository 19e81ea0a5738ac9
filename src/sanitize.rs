use serde_json::Value;

/// HTML-escape a string: `& < > " '` become entities.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sanitize an inbound JSON body in place:
/// - every string value is HTML-escaped
/// - any object key beginning with `$` is dropped (and warned) so document
///   store operators can never ride in on a payload
/// - arrays and nested objects are traversed
pub fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            *s = escape_html(s);
        }
        Value::Array(items) => {
            for item in items {
                sanitize_value(item);
            }
        }
        Value::Object(map) => {
            let dropped: Vec<String> = map
                .keys()
                .filter(|k| k.starts_with('$'))
                .cloned()
                .collect();
            for key in dropped {
                eprintln!("⚠️ Dropped operator-prefixed key from request body: {key}");
                map.remove(&key);
            }
            for (_, v) in map.iter_mut() {
                sanitize_value(v);
            }
        }
        _ => {}
    }
}
