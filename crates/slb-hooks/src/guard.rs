//! Guard-script generation.
//!
//! The script is plain POSIX `sh` so it runs with no Rust runtime present.
//! Its decision order: hard block list, daemon `hook_query` (short
//! timeout over `nc -U`), then local classification over the patterns
//! embedded at generation time with the engine's bucket order and
//! normalization.

use std::path::Path;

use slb_patterns::{PatternExport, normalize};

/// Patterns blocked even when the daemon is gone and the embedded set is
/// stale. Portable ERE only (`[[:space:]]`, no perl classes).
const HARD_BLOCK_LIST: &[&str] = &[
    r"^rm (-[a-zA-Z]+ )*(/|~)/?[[:space:]]*$",
    r"^dd .*of=/dev/",
    r":\(\)[[:space:]]*\{[[:space:]]*:\|:",
    r"^mkfs(\.| )",
    r">[[:space:]]*/dev/(sd|nvme|hd)",
];

/// A generated guard script.
#[derive(Debug, Clone)]
pub struct GuardScript {
    /// The script text, ready to write with the executable bit.
    pub text: String,
    /// Version embedded in the header.
    pub version: String,
    /// Pattern hash embedded in the header, for drift detection.
    pub pattern_hash: String,
}

const TEMPLATE: &str = r#"#!/bin/sh
# slb-guard {{VERSION}} patterns:{{HASH}}
# Reads an editor hook payload on stdin and prints {"action": ...}.
# Decision order: hard block list, daemon query, embedded classification.
# Command extraction is best-effort sed over the JSON payload; the
# embedded pattern set assumes GNU-compatible grep -E.

SOCKET="{{SOCKET}}"

payload=$(cat)
cmd=$(printf '%s' "$payload" | sed -n 's/.*"command"[[:space:]]*:[[:space:]]*"\([^"]*\)".*/\1/p')

emit() {
    if [ -n "$2" ]; then
        printf '{"action":"%s","message":"%s"}\n' "$1" "$2"
    else
        printf '{"action":"%s"}\n' "$1"
    fi
    exit 0
}

[ -z "$cmd" ] && emit allow ""

normalized=$(printf '%s' "$cmd" | tr '\t' ' ' | sed 's/  */ /g; s/^ *//; s/ *$//')

# Irrecoverable commands never reach the daemon or the pattern walk.
while read -r regex; do
    [ -z "$regex" ] && continue
    if printf '%s' "$normalized" | grep -qE -- "$regex"; then
        emit block "irrecoverable command blocked by slb guard"
    fi
done <<'SLB_HARD_BLOCK'
{{BLOCKLIST}}
SLB_HARD_BLOCK

# Daemon fast path: one JSON-RPC line with a short timeout; any failure
# falls through to the embedded classifier.
if [ -S "$SOCKET" ] && command -v nc >/dev/null 2>&1; then
    escaped=$(printf '%s' "$cmd" | sed 's/\\/\\\\/g; s/"/\\"/g')
    request=$(printf '{"jsonrpc":"2.0","id":1,"method":"hook_query","params":{"command":"%s"}}' "$escaped")
    response=$(printf '%s\n' "$request" | nc -U -w 1 "$SOCKET" 2>/dev/null | head -n 1)
    action=$(printf '%s' "$response" | sed -n 's/.*"action"[[:space:]]*:[[:space:]]*"\([^"]*\)".*/\1/p')
    case "$action" in
        allow|ask|block) emit "$action" "decided by slb daemon" ;;
    esac
fi

# Local classification: bucket order safe, critical, dangerous, caution;
# first match wins per segment; the worst segment wins overall.
rank() {
    case "$1" in
        safe) printf '0' ;;
        caution) printf '1' ;;
        dangerous) printf '2' ;;
        critical) printf '3' ;;
        *) printf '1' ;;
    esac
}

classify_segment() {
    seg="$1"
    while IFS='{{TAB}}' read -r tier flags regex; do
        [ -z "$tier" ] && continue
        if [ "$flags" = "i" ]; then
            printf '%s' "$seg" | grep -iqE -- "$regex" && { printf '%s' "$tier"; return; }
        else
            printf '%s' "$seg" | grep -qE -- "$regex" && { printf '%s' "$tier"; return; }
        fi
    done <<'SLB_PATTERNS'
{{PATTERNS}}
SLB_PATTERNS
    printf 'safe'
}

worst=safe
worst_rank=0
segments=$(printf '%s' "$normalized" | awk '{ gsub(/&&|\|\||;|\|/, "\n"); print }')
oldifs=$IFS
IFS='
'
for seg in $segments; do
    IFS=$oldifs
    seg=$(printf '%s' "$seg" | sed 's/^ *//; s/ *$//')
    [ -z "$seg" ] && continue
    tier=$(classify_segment "$seg")
    r=$(rank "$tier")
    if [ "$r" -gt "$worst_rank" ]; then
        worst=$tier
        worst_rank=$r
    fi
    IFS='
'
done
IFS=$oldifs

case "$worst" in
    safe) emit allow "" ;;
    caution) emit ask "caution tier: requires approval" ;;
    *) emit block "$worst tier: create an slb approval request" ;;
esac
"#;

/// Render the guard script for a pattern export and daemon socket.
#[must_use]
pub fn generate_guard_script(export: &PatternExport, socket: &Path) -> GuardScript {
    let mut pattern_lines = String::new();
    for pattern in &export.patterns {
        let (flags, regex) = match pattern.pattern.strip_prefix("(?i)") {
            Some(rest) => ("i", rest),
            None => ("-", pattern.pattern.as_str()),
        };
        pattern_lines.push_str(pattern.tier.as_str());
        pattern_lines.push('\t');
        pattern_lines.push_str(flags);
        pattern_lines.push('\t');
        pattern_lines.push_str(regex);
        pattern_lines.push('\n');
    }
    // Trailing newline is supplied by the heredoc terminator line.
    let pattern_lines = pattern_lines.trim_end_matches('\n');

    let text = TEMPLATE
        .replace("{{VERSION}}", &export.version)
        .replace("{{HASH}}", &export.pattern_hash)
        .replace("{{SOCKET}}", &socket.display().to_string())
        .replace("{{BLOCKLIST}}", &HARD_BLOCK_LIST.join("\n"))
        .replace("{{PATTERNS}}", pattern_lines)
        .replace("{{TAB}}", "\t");

    GuardScript {
        text,
        version: export.version.clone(),
        pattern_hash: export.pattern_hash.clone(),
    }
}

/// Parse the `(version, pattern_hash)` pair out of a generated script.
///
/// Returns `None` when the text does not carry an slb-guard header.
#[must_use]
pub fn parse_script_header(text: &str) -> Option<(String, String)> {
    for line in text.lines().take(5) {
        if let Some(rest) = line.strip_prefix("# slb-guard ") {
            let normalized = normalize(rest);
            let mut parts = normalized.split(' ');
            let version = parts.next()?.to_string();
            let hash = parts
                .find_map(|part| part.strip_prefix("patterns:"))?
                .to_string();
            return Some((version, hash));
        }
    }
    None
}
