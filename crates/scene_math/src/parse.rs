//! Tolerant number-list parsing shared by the vector-like attribute types.
//!
//! Scene documents produced by different exporters separate components with
//! commas, semicolons or plain whitespace, and sometimes wrap the list in
//! parentheses. Parsing accepts all of these; formatting always emits the
//! canonical separator chosen by the caller.

/// Splits `s` into float components, accepting `,`, `;`, whitespace and
/// surrounding parentheses. Components that fail to parse are skipped.
pub fn parse_floats(s: &str) -> Vec<f32> {
    split_components(s)
        .filter_map(|tok| tok.parse::<f32>().ok())
        .collect()
}

/// Splits `s` into integer components with the same separator rules as
/// [`parse_floats`].
pub fn parse_ints(s: &str) -> Vec<i32> {
    split_components(s)
        .filter_map(|tok| tok.parse::<i32>().ok())
        .collect()
}

/// Joins float components with `sep`, using shortest round-trip formatting.
pub fn format_floats(values: &[f32], sep: char) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(sep);
        }
        out.push_str(&v.to_string());
    }
    out
}

fn split_components(s: &str) -> impl Iterator<Item = &str> {
    s.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|tok| !tok.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_floats_separators() {
        assert_eq!(parse_floats("1,2,3"), vec![1.0, 2.0, 3.0]);
        assert_eq!(parse_floats("1 2 3"), vec![1.0, 2.0, 3.0]);
        assert_eq!(parse_floats("(1;2;3)"), vec![1.0, 2.0, 3.0]);
        assert_eq!(parse_floats("  1.5,  -2 "), vec![1.5, -2.0]);
    }

    #[test]
    fn test_parse_floats_empty() {
        assert!(parse_floats("").is_empty());
        assert!(parse_floats("()").is_empty());
    }

    #[test]
    fn test_format_roundtrip_exact() {
        let values = [0.1f32, 1.0 / 3.0, -12345.678];
        let text = format_floats(&values, ' ');
        assert_eq!(parse_floats(&text), values.to_vec());
    }
}
