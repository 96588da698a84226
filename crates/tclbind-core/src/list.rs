//! List string codec.
//!
//! Lists are whitespace-separated words. A word may be wrapped in braces
//! (taken literally, nesting counted) or double quotes (backslash escapes
//! applied). [`format`] produces the canonical form that [`parse`] reads back
//! element for element.

use crate::error::ConversionError;

/// Split a list string into its element strings.
pub fn parse(input: &str) -> Result<Vec<String>, ConversionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;

    loop {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        match chars[i] {
            '{' => {
                let (word, next) = parse_braced(&chars, i)?;
                expect_separator(&chars, next, "braces")?;
                out.push(word);
                i = next;
            }
            '"' => {
                let (word, next) = parse_quoted(&chars, i)?;
                expect_separator(&chars, next, "quotes")?;
                out.push(word);
                i = next;
            }
            _ => {
                let mut word = String::new();
                while i < chars.len() && !chars[i].is_whitespace() {
                    if chars[i] == '\\' {
                        i = backslash(&chars, i, &mut word);
                    } else {
                        word.push(chars[i]);
                        i += 1;
                    }
                }
                out.push(word);
            }
        }
    }

    Ok(out)
}

fn expect_separator(chars: &[char], at: usize, what: &str) -> Result<(), ConversionError> {
    match chars.get(at) {
        None => Ok(()),
        Some(c) if c.is_whitespace() => Ok(()),
        Some(_) => {
            let rest: String = chars[at..].iter().take_while(|c| !c.is_whitespace()).collect();
            Err(ConversionError::ListSyntax {
                message: format!("list element in {what} followed by \"{rest}\" instead of space"),
            })
        }
    }
}

/// Parse a braced word starting at `start` (which holds `{`).
/// Returns the literal contents and the index just past the closing brace.
pub(crate) fn parse_braced(chars: &[char], start: usize) -> Result<(String, usize), ConversionError> {
    let mut depth = 1usize;
    let mut i = start + 1;
    let mut word = String::new();

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                if chars[i + 1] == '\n' {
                    // backslash-newline collapses even inside braces
                    word.push(' ');
                    i += 2;
                    while i < chars.len() && matches!(chars[i], ' ' | '\t') {
                        i += 1;
                    }
                    continue;
                }
                word.push('\\');
                word.push(chars[i + 1]);
                i += 2;
                continue;
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((word, i + 1));
                }
            }
            _ => {}
        }
        word.push(chars[i]);
        i += 1;
    }

    Err(ConversionError::ListSyntax {
        message: "unmatched open brace in list".to_string(),
    })
}

fn parse_quoted(chars: &[char], start: usize) -> Result<(String, usize), ConversionError> {
    let mut i = start + 1;
    let mut word = String::new();

    while i < chars.len() {
        match chars[i] {
            '"' => return Ok((word, i + 1)),
            '\\' => i = backslash(chars, i, &mut word),
            c => {
                word.push(c);
                i += 1;
            }
        }
    }

    Err(ConversionError::ListSyntax {
        message: "unmatched open quote in list".to_string(),
    })
}

/// Apply one backslash sequence at `at`, appending the substitution to `out`.
/// Returns the index after the sequence.
pub(crate) fn backslash(chars: &[char], at: usize, out: &mut String) -> usize {
    let Some(&c) = chars.get(at + 1) else {
        out.push('\\');
        return at + 1;
    };

    match c {
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        'a' => out.push('\x07'),
        'b' => out.push('\x08'),
        'f' => out.push('\x0c'),
        'v' => out.push('\x0b'),
        '\n' => {
            out.push(' ');
            let mut i = at + 2;
            while i < chars.len() && matches!(chars[i], ' ' | '\t') {
                i += 1;
            }
            return i;
        }
        'x' => {
            let digits: String = chars[at + 2..]
                .iter()
                .take(2)
                .take_while(|c| c.is_ascii_hexdigit())
                .collect();
            if digits.is_empty() {
                out.push('x');
            } else if let Some(ch) = u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
            {
                out.push(ch);
                return at + 2 + digits.len();
            }
        }
        other => out.push(other),
    }
    at + 2
}

/// Join element strings into a canonical list string.
pub fn format<S: AsRef<str>>(elements: &[S]) -> String {
    let mut out = String::new();
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        quote_element(element.as_ref(), &mut out);
    }
    out
}

/// Append one element in list-safe form.
pub fn quote_element(element: &str, out: &mut String) {
    if element.is_empty() {
        out.push_str("{}");
        return;
    }

    if !needs_quoting(element) {
        out.push_str(element);
        return;
    }

    if can_brace(element) {
        out.push('{');
        out.push_str(element);
        out.push('}');
        return;
    }

    for c in element.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            '{' | '}' | '[' | ']' | '$' | '"' | ';' | '\\' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_whitespace() => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

fn needs_quoting(element: &str) -> bool {
    element.starts_with('#')
        || element
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | '$' | '"' | ';' | '\\'))
}

fn can_brace(element: &str) -> bool {
    let chars: Vec<char> = element.chars().collect();
    let mut depth: i64 = 0;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                // a trailing backslash would escape the closing brace
                if i + 1 >= chars.len() || chars[i + 1] == '\n' {
                    return false;
                }
                i += 2;
                continue;
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            c if c.is_whitespace() && c != ' ' && c != '\t' && c != '\n' => return false,
            _ => {}
        }
        i += 1;
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(elements: &[&str]) {
        let s = format(elements);
        let back = parse(&s).unwrap();
        assert_eq!(back, elements, "via {s:?}");
    }

    #[test]
    fn parse_simple() {
        assert_eq!(parse("a b  c").unwrap(), vec!["a", "b", "c"]);
        assert!(parse("   ").unwrap().is_empty());
    }

    #[test]
    fn parse_braced_nested() {
        assert_eq!(parse("{a {b c}} d").unwrap(), vec!["a {b c}", "d"]);
    }

    #[test]
    fn parse_quoted_escapes() {
        assert_eq!(parse("\"a\\tb\" c").unwrap(), vec!["a\tb", "c"]);
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(parse("{a b"), Err(ConversionError::ListSyntax { .. })));
        assert!(matches!(parse("\"a b"), Err(ConversionError::ListSyntax { .. })));
        let err = parse("{a}b").unwrap_err();
        assert!(err.to_string().contains("followed by \"b\""));
    }

    #[test]
    fn format_quotes_when_needed() {
        assert_eq!(format(&["a", "b c", ""]), "a {b c} {}");
        assert_eq!(format(&["#x"]), "{#x}");
    }

    #[test]
    fn unbalanced_braces_use_backslashes() {
        assert_eq!(format(&["a{"]), "a\\{");
        roundtrip(&["a{", "}b", "\\"]);
    }

    #[test]
    fn roundtrips() {
        roundtrip(&["plain", "with space", "{nested {braces}}", "q\"uote", "$x", "[cmd]"]);
        roundtrip(&["tab\there", "line\nbreak", ";"]);
    }
}
