//! Identifier quoting for InfluxQL.
//!
//! Every user-controlled name interpolated into a statement goes through
//! [`quote_identifier`]. Keywords never do.

/// Wraps `ident` in double quotes, backslash-escaping embedded quotes and backslashes.
///
/// # Examples
/// ```
/// use common::utils::quote_identifier;
/// assert_eq!(quote_identifier(r#"foo"bar"#), r#""foo\"bar""#);
/// ```
pub fn quote_identifier(ident: &str) -> String {
    let mut quoted = String::with_capacity(ident.len() + 2);
    quoted.push('"');
    for c in ident.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Reads one quoted identifier from the start of `input`.
///
/// Returns the decoded identifier and the unconsumed remainder, or `None` when
/// `input` does not start with a complete quoted identifier.
pub fn unquote_identifier(input: &str) -> Option<(String, &str)> {
    let rest = input.strip_prefix('"')?;
    let mut ident = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                ident.push(escaped);
            }
            '"' => return Some((ident, &rest[i + 1..])),
            _ => ident.push(c),
        }
    }
    None
}
