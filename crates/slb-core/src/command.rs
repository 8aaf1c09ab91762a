//! Command specification: the exact command a request wants to run.

use serde::{Deserialize, Serialize};
use slb_crypto::ContentHash;

use crate::error::{CoreError, CoreResult};

/// Placeholder substituted for redacted spans.
const REDACTED: &str = "[REDACTED]";

/// The command a request asks to execute, with enough context to reproduce
/// the classification and to audit exactly what was approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// The command exactly as typed.
    pub raw: String,
    /// `raw` with caller-supplied sensitive spans masked, when any matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_redacted: Option<String>,
    /// Tokenized argv when the command is exec'd directly (`shell == false`).
    /// Empty when a shell interprets `raw`.
    #[serde(default)]
    pub argv: Vec<String>,
    /// Working directory the command runs in.
    pub cwd: String,
    /// Whether a shell interprets `raw` (true) or `argv` is exec'd (false).
    pub shell: bool,
    /// Content hash of `(raw, cwd, shell, argv)`.
    pub hash: ContentHash,
    /// Whether any redaction pattern fired.
    pub contains_sensitive: bool,
}

impl CommandSpec {
    /// Build a command spec from the raw command line.
    ///
    /// When `shell` is false, `raw` is tokenized shell-style to produce the
    /// argv that will be exec'd. Redaction patterns are regexes applied to
    /// `raw` for display purposes only; the stored `raw` is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyCommand`] for a blank command,
    /// [`CoreError::UnbalancedQuotes`] when `shell == false` and the command
    /// cannot be tokenized, and [`CoreError::BadRedactPattern`] for an
    /// invalid redaction regex.
    pub fn build(
        raw: &str,
        cwd: &str,
        shell: bool,
        redact_patterns: &[String],
    ) -> CoreResult<Self> {
        if raw.trim().is_empty() {
            return Err(CoreError::EmptyCommand);
        }

        let argv = if shell {
            Vec::new()
        } else {
            shell_tokenize(raw)?
        };

        let (display_redacted, contains_sensitive) = apply_redaction(raw, redact_patterns)?;

        let hash = command_hash(raw, cwd, shell, &argv);

        Ok(Self {
            raw: raw.to_string(),
            display_redacted,
            argv,
            cwd: cwd.to_string(),
            shell,
            hash,
            contains_sensitive,
        })
    }

    /// The command text safe to show in listings and events: the redacted
    /// form when one exists, otherwise the raw command.
    #[must_use]
    pub fn display(&self) -> &str {
        self.display_redacted.as_deref().unwrap_or(&self.raw)
    }
}

/// Content hash of the full command tuple. The digest's field encoding
/// keeps `(raw, cwd, shell, argv...)` boundaries unambiguous.
fn command_hash(raw: &str, cwd: &str, shell: bool, argv: &[String]) -> ContentHash {
    let shell_byte = [u8::from(shell)];
    let mut fields: Vec<&[u8]> = vec![raw.as_bytes(), cwd.as_bytes(), &shell_byte];
    for arg in argv {
        fields.push(arg.as_bytes());
    }
    ContentHash::digest("slb-command", &fields)
}

fn apply_redaction(
    raw: &str,
    patterns: &[String],
) -> CoreResult<(Option<String>, bool)> {
    if patterns.is_empty() {
        return Ok((None, false));
    }
    let mut redacted = raw.to_string();
    let mut fired = false;
    for pattern in patterns {
        let re = regex::Regex::new(pattern)
            .map_err(|e| CoreError::BadRedactPattern(format!("{pattern}: {e}")))?;
        if re.is_match(&redacted) {
            fired = true;
            redacted = re.replace_all(&redacted, REDACTED).into_owned();
        }
    }
    if fired {
        Ok((Some(redacted), true))
    } else {
        Ok((None, false))
    }
}

/// Tokenize a command line the way a POSIX shell splits words.
///
/// Handles single quotes (literal), double quotes (backslash escapes `"` and
/// `\`), and unquoted backslash escapes. This is a word splitter, not an
/// evaluator: no expansion, substitution, or globbing.
///
/// # Errors
///
/// Returns [`CoreError::UnbalancedQuotes`] when a quote or trailing escape
/// is left open.
pub fn shell_tokenize(raw: &str) -> CoreResult<Vec<String>> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Single,
        Double,
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut has_token = false;
    let mut state = State::Normal;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '\'' => {
                    state = State::Single;
                    has_token = true;
                }
                '"' => {
                    state = State::Double;
                    has_token = true;
                }
                '\\' => match chars.next() {
                    Some(escaped) => {
                        current.push(escaped);
                        has_token = true;
                    }
                    None => return Err(CoreError::UnbalancedQuotes),
                },
                c if c.is_whitespace() => {
                    if has_token {
                        tokens.push(std::mem::take(&mut current));
                        has_token = false;
                    }
                }
                c => {
                    current.push(c);
                    has_token = true;
                }
            },
            State::Single => match c {
                '\'' => state = State::Normal,
                c => current.push(c),
            },
            State::Double => match c {
                '"' => state = State::Normal,
                '\\' => match chars.next() {
                    Some(escaped @ ('"' | '\\')) => current.push(escaped),
                    Some(other) => {
                        current.push('\\');
                        current.push(other);
                    }
                    None => return Err(CoreError::UnbalancedQuotes),
                },
                c => current.push(c),
            },
        }
    }

    if state != State::Normal {
        return Err(CoreError::UnbalancedQuotes);
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}
