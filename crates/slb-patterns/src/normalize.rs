//! Command normalization and top-level segmentation.

/// Normalize a command for matching: collapse whitespace runs to single
/// spaces, trim, and strip one pair of matching outer quotes wrapping the
/// whole command.
#[must_use]
pub fn normalize(command: &str) -> String {
    let collapsed = command.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_outer_quotes(&collapsed).to_string()
}

fn strip_outer_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Marker error for a command whose quoting never closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnbalancedQuotes;

impl std::fmt::Display for UnbalancedQuotes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("unbalanced quotes")
    }
}

impl std::error::Error for UnbalancedQuotes {}

/// Split a command at top-level shell separators: `;`, `&&`, `||`, `|`.
///
/// Quote-aware: separators inside single or double quotes do not split.
/// Empty segments (e.g. from `;;` or a trailing `;`) are dropped.
///
/// # Errors
///
/// Returns [`UnbalancedQuotes`] when a quote is left open; callers treat
/// this as a parse error and assume the safest non-SAFE tier.
pub fn split_segments(command: &str) -> Result<Vec<String>, UnbalancedQuotes> {
    #[derive(PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote = Quote::None;
    let chars: Vec<char> = command.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match quote {
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    current.push(c);
                }
                '"' => {
                    quote = Quote::Double;
                    current.push(c);
                }
                '\\' => {
                    current.push(c);
                    if i + 1 < chars.len() {
                        current.push(chars[i + 1]);
                        i += 1;
                    }
                }
                ';' => {
                    push_segment(&mut segments, &mut current);
                }
                '&' if chars.get(i + 1) == Some(&'&') => {
                    push_segment(&mut segments, &mut current);
                    i += 1;
                }
                '|' => {
                    // Both `|` and `||` separate segments.
                    if chars.get(i + 1) == Some(&'|') {
                        i += 1;
                    }
                    push_segment(&mut segments, &mut current);
                }
                c => current.push(c),
            },
            Quote::Single => {
                current.push(c);
                if c == '\'' {
                    quote = Quote::None;
                }
            }
            Quote::Double => {
                current.push(c);
                if c == '\\' {
                    if i + 1 < chars.len() {
                        current.push(chars[i + 1]);
                        i += 1;
                    }
                } else if c == '"' {
                    quote = Quote::None;
                }
            }
        }
        i += 1;
    }

    if quote != Quote::None {
        return Err(UnbalancedQuotes);
    }
    push_segment(&mut segments, &mut current);
    Ok(segments)
}

fn push_segment(segments: &mut Vec<String>, current: &mut String) {
    let segment = current.trim();
    if !segment.is_empty() {
        segments.push(segment.to_string());
    }
    current.clear();
}
