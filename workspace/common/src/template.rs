//! `[placeholder]` templating.
//!
//! A placeholder is the text between a `[` and the next `]` on the same line.

use std::collections::HashMap;

/// Yields `(start, end, name)` for each placeholder, `end` exclusive of the
/// closing bracket.
fn placeholders(text: &str) -> impl Iterator<Item = (usize, usize, &str)> + '_ {
    let mut cursor = 0;
    std::iter::from_fn(move || {
        while let Some(rel) = text[cursor..].find('[') {
            let start = cursor + rel;
            let rest = &text[start + 1..];
            match rest.find(|c: char| c == ']' || c == '\n') {
                Some(close) if rest.as_bytes()[close] == b']' => {
                    let name = &rest[..close];
                    let end = start + 1 + close + 1;
                    cursor = end;
                    return Some((start, end, name));
                }
                _ => cursor = start + 1,
            }
        }
        None
    })
}

/// Distinct non-empty placeholder names in first-seen order.
pub fn extract_placeholders(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (_, _, name) in placeholders(text) {
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Substitutes every `[key]` with its value. Keys without a value are left
/// in place untouched.
pub fn render(text: &str, values: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    for (start, end, name) in placeholders(text) {
        if let Some(value) = values.get(name) {
            out.push_str(&text[copied..start]);
            out.push_str(value);
            copied = end;
        }
    }
    out.push_str(&text[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_extract_placeholders() {
        let text = "Hi [name], the [role] audition. Bring [name]'s [portfolio]!";
        assert_eq!(extract_placeholders(text), vec!["name", "role", "portfolio"]);
        assert!(extract_placeholders("no markers here").is_empty());
        assert!(extract_placeholders("[] and [unclosed").is_empty());
    }

    #[test]
    fn test_placeholder_does_not_span_lines() {
        assert_eq!(extract_placeholders("[broken\nline] [ok]"), vec!["ok"]);
    }

    #[test]
    fn test_render_substitutes_known_keys() {
        let rendered = render(
            "Dear [name], fee is [fee].",
            &values(&[("name", "Mina"), ("fee", "$300")]),
        );
        assert_eq!(rendered, "Dear Mina, fee is $300.");
    }

    #[test]
    fn test_render_leaves_unresolved_placeholders() {
        let rendered = render("Dear [name], see [link]", &values(&[("link", "https://x.test")]));
        assert_eq!(rendered, "Dear [name], see https://x.test");
        assert_eq!(render("Hello [name]", &HashMap::new()), "Hello [name]");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let rendered = render("[a] [b]", &values(&[("a", "[b]"), ("b", "two")]));
        assert_eq!(rendered, "[b] two");
    }

    #[test]
    fn test_multibyte_text() {
        let rendered = render("안녕하세요 [이름]님", &values(&[("이름", "민아")]));
        assert_eq!(rendered, "안녕하세요 민아님");
    }
}
