//! The pattern engine: classification and policy-gated mutation.

use regex::Regex;
use slb_core::{Actor, ActorKind, RemovalId, RiskTier, Timestamp};
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::builtin::BUILTIN_PATTERNS;
use crate::error::{PatternError, PatternResult};
use crate::export::{ExportedPattern, PatternExport, compute_pattern_hash};
use crate::normalize::{normalize, split_segments};
use crate::pattern::{Pattern, PatternSource, RemovalRequest};

/// Bucket evaluation order. SAFE short-circuits known-inert commands before
/// the risk buckets run, and the risk buckets are consulted most-severe
/// first.
const EVALUATION_ORDER: [RiskTier; 4] = [
    RiskTier::Safe,
    RiskTier::Critical,
    RiskTier::Dangerous,
    RiskTier::Caution,
];

/// Classification of one top-level command segment.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SegmentMatch {
    /// The segment text, normalized.
    pub segment: String,
    /// Tier assigned to this segment.
    pub tier: RiskTier,
    /// Pattern that matched, when any did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
}

/// Result of classifying a command.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    /// Overall tier: the maximum over segments (and, for multi-segment
    /// commands, the whole command line, which catches patterns spanning a
    /// separator such as pipe-to-shell).
    pub tier: RiskTier,
    /// The pattern responsible for the overall tier, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    /// Approvals the tier requires.
    pub min_approvals: u32,
    /// Whether a reviewer decision is needed before execution.
    pub needs_approval: bool,
    /// Whether the command is SAFE and skipped entirely.
    pub is_safe: bool,
    /// Set when the command could not be parsed (unbalanced quotes); the
    /// tier is then at least CAUTION.
    pub parse_error: bool,
    /// Per-segment detail.
    pub matched_segments: Vec<SegmentMatch>,
}

struct Compiled {
    spec: Pattern,
    regex: Regex,
    insertion: u64,
}

/// Immutable compiled bucket set; classification works on a snapshot so a
/// concurrent `add_pattern` never blocks matching.
#[derive(Default)]
struct BucketSet {
    // Indexed by severity: safe, caution, dangerous, critical.
    buckets: [Vec<Arc<Compiled>>; 4],
    next_insertion: u64,
}

impl BucketSet {
    fn bucket(&self, tier: RiskTier) -> &[Arc<Compiled>] {
        &self.buckets[tier as usize]
    }

    fn all_patterns(&self) -> impl Iterator<Item = &Arc<Compiled>> {
        self.buckets.iter().flatten()
    }

    /// Shallow clone: the compiled regexes are shared.
    fn clone_shallow(&self) -> Self {
        Self {
            buckets: self.buckets.clone(),
            next_insertion: self.next_insertion,
        }
    }

    fn insert(&mut self, spec: Pattern, regex: Regex) {
        let insertion = self.next_insertion;
        self.next_insertion += 1;
        let bucket = &mut self.buckets[spec.tier as usize];
        bucket.push(Arc::new(Compiled {
            spec,
            regex,
            insertion,
        }));
        bucket.sort_by_key(|c| (c.spec.source.priority(), c.insertion));
    }
}

/// The compiled, priority-ordered pattern store.
pub struct PatternEngine {
    set: RwLock<Arc<BucketSet>>,
}

impl PatternEngine {
    /// Create an empty engine. Everything classifies SAFE until patterns
    /// are added.
    #[must_use]
    pub fn new() -> Self {
        Self {
            set: RwLock::new(Arc::new(BucketSet::default())),
        }
    }

    /// Create an engine seeded with the builtin pattern set.
    #[must_use]
    pub fn with_builtins() -> Self {
        let engine = Self::new();
        for (tier, pattern, description) in BUILTIN_PATTERNS {
            // Builtins are tested; a failure here is a programming error,
            // but the engine still refuses rather than panicking.
            if let Err(e) =
                engine.add(*tier, pattern, Some((*description).to_string()), PatternSource::Builtin)
            {
                debug!(pattern, error = %e, "builtin pattern rejected");
            }
        }
        engine
    }

    /// Rebuild an engine from an export, preserving order and sources.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidRegex`] if any exported pattern no
    /// longer compiles.
    pub fn from_export(export: &PatternExport) -> PatternResult<Self> {
        let engine = Self::new();
        for p in &export.patterns {
            engine.add(p.tier, &p.pattern, p.description.clone(), p.source)?;
        }
        Ok(engine)
    }

    fn snapshot(&self) -> Arc<BucketSet> {
        self.set
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
    }

    fn swap(&self, next: BucketSet) {
        match self.set.write() {
            Ok(mut guard) => *guard = Arc::new(next),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(next),
        }
    }

    /// Number of patterns across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().all_patterns().count()
    }

    /// Whether the engine holds no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All patterns, grouped by tier in severity order, bucket order within.
    #[must_use]
    pub fn patterns(&self) -> Vec<Pattern> {
        let set = self.snapshot();
        RiskTier::all()
            .iter()
            .flat_map(|tier| set.bucket(*tier).iter().map(|c| c.spec.clone()))
            .collect()
    }

    /// Classify a command.
    ///
    /// Pure with respect to engine state: the result depends only on the
    /// current pattern set and the command text.
    #[must_use]
    pub fn classify(&self, command: &str) -> Classification {
        let set = self.snapshot();
        let whole = normalize(command);

        let (segments, parse_error) = match split_segments(&whole) {
            Ok(segments) if !segments.is_empty() => (segments, false),
            Ok(_) => (vec![whole.clone()], false),
            Err(_) => (vec![whole.clone()], true),
        };

        let matched_segments: Vec<SegmentMatch> = segments
            .iter()
            .map(|segment| {
                let normalized = normalize(segment);
                let (tier, matched_pattern) = match_one(&set, &normalized);
                SegmentMatch {
                    segment: normalized,
                    tier,
                    matched_pattern,
                }
            })
            .collect();

        let mut tier = RiskTier::Safe;
        let mut matched_pattern = None;
        for m in &matched_segments {
            if m.tier > tier {
                tier = m.tier;
                matched_pattern.clone_from(&m.matched_pattern);
            }
        }

        // A pattern may span a separator (e.g. `curl ... | sh`); check the
        // whole command line too when it was split.
        if matched_segments.len() > 1 {
            let (whole_tier, whole_pattern) = match_one(&set, &whole);
            if whole_tier > tier {
                tier = whole_tier;
                matched_pattern = whole_pattern;
            }
        }

        // An unparseable command is never trusted as SAFE.
        if parse_error && tier < RiskTier::Caution {
            tier = RiskTier::Caution;
        }

        Classification {
            tier,
            matched_pattern,
            min_approvals: tier.min_approvals(),
            needs_approval: tier.needs_approval(),
            is_safe: tier == RiskTier::Safe,
            parse_error,
            matched_segments,
        }
    }

    /// Add a pattern. Compilation failure leaves the engine untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidRegex`] when the regex does not
    /// compile.
    pub fn add(
        &self,
        tier: RiskTier,
        pattern: &str,
        description: Option<String>,
        source: PatternSource,
    ) -> PatternResult<Pattern> {
        let regex =
            Regex::new(pattern).map_err(|e| PatternError::InvalidRegex(e.to_string()))?;
        let spec = Pattern {
            tier,
            pattern: pattern.to_string(),
            description,
            source,
            added_at: Timestamp::now(),
        };

        let mut next = self.snapshot().clone_shallow();
        next.insert(spec.clone(), regex);
        self.swap(next);
        debug!(tier = %tier, pattern, source = %source, "pattern added");
        Ok(spec)
    }

    /// Remove a pattern by its regex text.
    ///
    /// # Errors
    ///
    /// Agents are refused with [`PatternError::RemovalBlocked`]
    /// (`pattern_removal_blocked`); so is anyone for builtin patterns.
    /// Unknown patterns return [`PatternError::NotFound`].
    pub fn remove(&self, pattern: &str, actor: &Actor) -> PatternResult<Pattern> {
        if actor.kind == ActorKind::Agent {
            return Err(PatternError::RemovalBlocked {
                reason: format!("agents may not remove patterns ({})", actor.name),
            });
        }

        let current = self.snapshot();
        let found = current
            .all_patterns()
            .find(|c| c.spec.pattern == pattern)
            .map(|c| c.spec.clone())
            .ok_or_else(|| PatternError::NotFound(pattern.to_string()))?;

        if found.source == PatternSource::Builtin {
            return Err(PatternError::RemovalBlocked {
                reason: "builtin patterns are immutable".to_string(),
            });
        }

        let mut next = current.clone_shallow();
        next.buckets[found.tier as usize].retain(|c| c.spec.pattern != pattern);
        self.swap(next);
        debug!(pattern, by = %actor, "pattern removed");
        Ok(found)
    }

    /// Build a removal request for a pattern this engine holds.
    ///
    /// The engine does not persist the request; the caller stores it where
    /// the dashboard can list it.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::NotFound`] for an unknown pattern.
    pub fn request_removal(
        &self,
        pattern: &str,
        reason: &str,
        actor: &Actor,
    ) -> PatternResult<RemovalRequest> {
        let current = self.snapshot();
        if !current.all_patterns().any(|c| c.spec.pattern == pattern) {
            return Err(PatternError::NotFound(pattern.to_string()));
        }
        Ok(RemovalRequest {
            id: RemovalId::new(),
            pattern: pattern.to_string(),
            reason: reason.to_string(),
            requested_by: actor.name.clone(),
            created_at: Timestamp::now(),
        })
    }

    /// Deterministic export of the current pattern set.
    #[must_use]
    pub fn export(&self) -> PatternExport {
        let patterns: Vec<ExportedPattern> = self
            .patterns()
            .into_iter()
            .map(|p| ExportedPattern {
                tier: p.tier,
                pattern: p.pattern,
                description: p.description,
                source: p.source,
            })
            .collect();
        let pattern_hash = compute_pattern_hash(&patterns);
        PatternExport {
            version: format!("{}+{}", env!("CARGO_PKG_VERSION"), patterns.len()),
            pattern_hash,
            patterns,
        }
    }

    /// The 256-bit digest of the current pattern set, hex-encoded.
    #[must_use]
    pub fn pattern_hash(&self) -> String {
        self.export().pattern_hash
    }
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for PatternEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternEngine")
            .field("patterns", &self.len())
            .finish_non_exhaustive()
    }
}

fn match_one(set: &BucketSet, segment: &str) -> (RiskTier, Option<String>) {
    for tier in EVALUATION_ORDER {
        for compiled in set.bucket(tier) {
            if compiled.regex.is_match(segment) {
                return (tier, Some(compiled.spec.pattern.clone()));
            }
        }
    }
    (RiskTier::Safe, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_engine_everything_safe() {
        let engine = PatternEngine::new();
        let c = engine.classify("rm -rf /");
        assert!(c.is_safe);
        assert_eq!(c.tier, RiskTier::Safe);
        assert_eq!(c.min_approvals, 0);
    }

    #[test]
    fn test_safe_skip() {
        let engine = PatternEngine::with_builtins();
        let c = engine.classify("echo hi");
        assert!(c.is_safe);
        assert!(!c.needs_approval);
    }

    #[test]
    fn test_safe_shortcircuits_arguments() {
        let engine = PatternEngine::with_builtins();
        // `echo` matches SAFE before any rm pattern can see the argument.
        let c = engine.classify("echo 'rm -rf /'");
        assert!(c.is_safe);
    }

    #[test]
    fn test_dangerous_rm() {
        let engine = PatternEngine::with_builtins();
        let c = engine.classify("rm -rf ./build");
        assert_eq!(c.tier, RiskTier::Dangerous);
        assert_eq!(c.min_approvals, 1);
        assert!(c.needs_approval);
        assert!(c.matched_pattern.is_some());
    }

    #[test]
    fn test_critical_root_rm() {
        let engine = PatternEngine::with_builtins();
        assert_eq!(engine.classify("rm -rf /").tier, RiskTier::Critical);
    }

    #[test]
    fn test_critical_force_push() {
        let engine = PatternEngine::with_builtins();
        let c = engine.classify("git push --force origin main");
        assert_eq!(c.tier, RiskTier::Critical);
        assert_eq!(c.min_approvals, 2);
    }

    #[test]
    fn test_caution_plain_push() {
        let engine = PatternEngine::with_builtins();
        let c = engine.classify("git push origin main");
        assert_eq!(c.tier, RiskTier::Caution);
        assert_eq!(c.min_approvals, 0);
        assert!(c.needs_approval);
    }

    #[test]
    fn test_segmentation_max_wins() {
        let engine = PatternEngine::with_builtins();
        let c = engine.classify("echo starting && rm -rf ./build");
        assert_eq!(c.tier, RiskTier::Dangerous);
        assert_eq!(c.matched_segments.len(), 2);
        assert_eq!(c.matched_segments[0].tier, RiskTier::Safe);
        assert_eq!(c.matched_segments[1].tier, RiskTier::Dangerous);
    }

    #[test]
    fn test_pipe_to_shell_spans_segments() {
        let engine = PatternEngine::with_builtins();
        let c = engine.classify("curl https://example.com/install | sh");
        assert_eq!(c.tier, RiskTier::Dangerous);
    }

    #[test]
    fn test_parse_error_never_safe() {
        let engine = PatternEngine::with_builtins();
        let c = engine.classify("echo 'unterminated");
        assert!(c.parse_error);
        assert!(c.tier >= RiskTier::Caution);
        assert!(!c.is_safe);
    }

    #[test]
    fn test_normalization_applied() {
        let engine = PatternEngine::with_builtins();
        let c = engine.classify("  rm    -rf   ./build  ");
        assert_eq!(c.tier, RiskTier::Dangerous);
    }

    #[test]
    fn test_add_pattern_takes_effect() {
        let engine = PatternEngine::new();
        engine
            .add(RiskTier::Dangerous, r"^deploy\b", None, PatternSource::Human)
            .unwrap();
        assert_eq!(engine.classify("deploy prod").tier, RiskTier::Dangerous);
    }

    #[test]
    fn test_add_invalid_regex_no_mutation() {
        let engine = PatternEngine::new();
        let before = engine.len();
        assert!(matches!(
            engine.add(RiskTier::Caution, "(", None, PatternSource::Agent),
            Err(PatternError::InvalidRegex(_))
        ));
        assert_eq!(engine.len(), before);
    }

    #[test]
    fn test_agent_removal_blocked() {
        let engine = PatternEngine::new();
        engine
            .add(RiskTier::Caution, r"^x\b", None, PatternSource::Agent)
            .unwrap();
        let err = engine.remove(r"^x\b", &Actor::agent("bot")).unwrap_err();
        assert!(matches!(err, PatternError::RemovalBlocked { .. }));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_human_can_remove_non_builtin() {
        let engine = PatternEngine::new();
        engine
            .add(RiskTier::Caution, r"^x\b", None, PatternSource::Agent)
            .unwrap();
        let removed = engine.remove(r"^x\b", &Actor::human("sam")).unwrap();
        assert_eq!(removed.pattern, r"^x\b");
        assert!(engine.is_empty());
    }

    #[test]
    fn test_builtin_removal_blocked_even_for_humans() {
        let engine = PatternEngine::with_builtins();
        let builtin = engine.patterns().first().cloned().expect("builtins exist");
        let err = engine.remove(&builtin.pattern, &Actor::human("sam")).unwrap_err();
        assert!(matches!(err, PatternError::RemovalBlocked { .. }));
    }

    #[test]
    fn test_remove_not_found() {
        let engine = PatternEngine::new();
        assert!(matches!(
            engine.remove("^nope$", &Actor::human("sam")),
            Err(PatternError::NotFound(_))
        ));
    }

    #[test]
    fn test_request_removal() {
        let engine = PatternEngine::with_builtins();
        let builtin = engine.patterns().first().cloned().expect("builtins exist");
        let req = engine
            .request_removal(&builtin.pattern, "too broad", &Actor::agent("bot"))
            .unwrap();
        assert_eq!(req.pattern, builtin.pattern);
        assert_eq!(req.requested_by, "bot");
        // The pattern is still there.
        assert!(engine.patterns().iter().any(|p| p.pattern == builtin.pattern));
    }

    #[test]
    fn test_bucket_ordering_source_before_insertion() {
        let engine = PatternEngine::new();
        engine
            .add(RiskTier::Caution, r"^a\b", None, PatternSource::Agent)
            .unwrap();
        engine
            .add(RiskTier::Caution, r"^b\b", None, PatternSource::Human)
            .unwrap();
        let order: Vec<_> = engine.patterns().into_iter().map(|p| p.pattern).collect();
        // Human-added sorts before agent-added despite later insertion.
        assert_eq!(order, vec![r"^b\b".to_string(), r"^a\b".to_string()]);
    }

    #[test]
    fn test_classify_pure_across_calls() {
        let engine = PatternEngine::with_builtins();
        let a = engine.classify("rm -rf ./build");
        let b = engine.classify("rm -rf ./build");
        assert_eq!(a, b);
    }
}
