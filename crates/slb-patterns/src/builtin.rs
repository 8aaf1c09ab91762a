//! Builtin pattern set.
//!
//! The engine is a deny list: a command nothing matches is SAFE. The SAFE
//! bucket exists to short-circuit commands whose arguments would otherwise
//! trip a lower bucket (e.g. `echo "rm -rf /"`), since SAFE is consulted
//! first. All regexes avoid lookaround; the `regex` crate does not support
//! it, and neither does the grep-based guard script fallback.

use slb_core::RiskTier;

pub(crate) const BUILTIN_PATTERNS: &[(RiskTier, &str, &str)] = &[
    // -- SAFE: read-only and inert commands ------------------------------
    (RiskTier::Safe, r"^(ls|pwd|whoami|id|date|uptime|hostname|uname)\b", "inert system queries"),
    (RiskTier::Safe, r"^echo\b", "echo prints its arguments"),
    (RiskTier::Safe, r"^(cat|head|tail|less|more|wc|file|stat|du|df)\b", "read-only file inspection"),
    (RiskTier::Safe, r"^(grep|rg|egrep|fgrep)\b", "read-only search"),
    (RiskTier::Safe, r"^(env|printenv)\b", "environment inspection"),
    (RiskTier::Safe, r"^(which|type)\b", "binary lookup"),
    (RiskTier::Safe, r"^git (status|log|diff|show|branch|remote|describe|blame)\b", "read-only git"),
    (RiskTier::Safe, r"^cargo (check|build|test|fmt|clippy|doc|tree|metadata)\b", "local cargo workflow"),
    (RiskTier::Safe, r"^(npm|pnpm|yarn) (run|test|ls|list)\b", "local npm workflow"),
    (RiskTier::Safe, r"^(sleep|true|false)\b", "inert"),

    // -- CRITICAL: irrecoverable or shared-state-destroying --------------
    (RiskTier::Critical, r"^rm (-[a-zA-Z]+ )*(/|~)/?\s*$", "delete filesystem root or home"),
    (RiskTier::Critical, r"^git push\b.*( --force\b| -f\b)", "force push rewrites shared history"),
    (RiskTier::Critical, r"^dd\b.*\bof=/dev/", "raw write to a block device"),
    (RiskTier::Critical, r">\s*/dev/(sd|nvme|hd)", "redirect onto a block device"),
    (RiskTier::Critical, r":\(\)\s*\{\s*:\|:", "fork bomb"),
    (RiskTier::Critical, r"^mkfs(\.| )", "filesystem format"),
    (RiskTier::Critical, r"^(shutdown|reboot|halt|poweroff)\b", "host shutdown"),
    (RiskTier::Critical, r"(?i)\bdrop\s+database\b", "drop an entire database"),
    (RiskTier::Critical, r"^chmod (-[a-zA-Z]+ )*777 /\s*$", "world-writable root"),

    // -- DANGEROUS: destructive but scoped -------------------------------
    (RiskTier::Dangerous, r"^rm (-[a-zA-Z]+ )*-[a-zA-Z]*r", "recursive delete"),
    (RiskTier::Dangerous, r"^rm (-[a-zA-Z]+ )*-[a-zA-Z]*f", "forced delete"),
    (RiskTier::Dangerous, r"^git reset --hard\b", "discard local changes"),
    (RiskTier::Dangerous, r"^git clean (-[a-zA-Z]+ )*-[a-zA-Z]*f", "delete untracked files"),
    (RiskTier::Dangerous, r"(?i)\bdrop\s+table\b", "drop a table"),
    (RiskTier::Dangerous, r"(?i)\btruncate\s+table\b", "truncate a table"),
    (RiskTier::Dangerous, r"^kubectl delete\b", "delete cluster resources"),
    (RiskTier::Dangerous, r"^terraform (destroy|apply)\b", "mutate infrastructure"),
    (RiskTier::Dangerous, r"^docker (system prune|rm|rmi|volume rm)\b", "delete docker state"),
    (RiskTier::Dangerous, r"^find\b.*(-delete\b|-exec\b)", "find with side effects"),
    (RiskTier::Dangerous, r"^curl\b.*\|\s*(ba|z|da)?sh\b", "pipe remote content to a shell"),
    (RiskTier::Dangerous, r"^sudo\b", "privilege escalation"),

    // -- CAUTION: routine but state-changing -----------------------------
    (RiskTier::Caution, r"^(npm|pnpm|yarn) (install|add|remove|uninstall|update)\b", "node dependency change"),
    (RiskTier::Caution, r"^pip3? install\b", "python dependency change"),
    (RiskTier::Caution, r"^cargo (install|add|remove|update)\b", "rust dependency change"),
    (RiskTier::Caution, r"^(apt|apt-get|brew|dnf|yum|pacman) (install|remove|upgrade|update)\b", "system package change"),
    (RiskTier::Caution, r"^git (checkout|switch|rebase|merge|stash|cherry-pick)\b", "git history movement"),
    (RiskTier::Caution, r"^git push\b", "push to a remote"),
    (RiskTier::Caution, r"^(chmod|chown)\b", "permission change"),
    (RiskTier::Caution, r"^(mv|ln)\b", "file relocation"),
    (RiskTier::Caution, r"^kill(all)?\b", "signal a process"),
    (RiskTier::Caution, r"^docker (run|build|compose)\b", "start containers"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_compile() {
        for (_, pattern, _) in BUILTIN_PATTERNS {
            regex::Regex::new(pattern)
                .unwrap_or_else(|e| panic!("builtin pattern {pattern:?} failed to compile: {e}"));
        }
    }

    #[test]
    fn test_every_tier_represented() {
        for tier in RiskTier::all() {
            assert!(
                BUILTIN_PATTERNS.iter().any(|(t, _, _)| *t == tier),
                "no builtin patterns for tier {tier}"
            );
        }
    }
}
