//! SLB Patterns - the command risk classifier.
//!
//! A [`PatternEngine`] holds four priority buckets of compiled regexes, one
//! per [`RiskTier`](slb_core::RiskTier). Classification normalizes the
//! command, splits it into top-level shell segments, and matches each
//! segment against the buckets in the fixed evaluation order
//! **SAFE → CRITICAL → DANGEROUS → CAUTION**; the first matching bucket
//! wins for that segment, and the overall tier is the maximum over
//! segments. A command no pattern matches is SAFE; the engine is a deny
//! list, and an empty engine allows everything.
//!
//! Patterns carry a source (`builtin`, `human`, `agent`). Agents may add
//! patterns but never remove them; removal attempts are policy-blocked and
//! can only be turned into a persisted removal request.
//!
//! The export is deterministic: patterns grouped by tier, ordered by
//! `(source priority, insertion index)`, hashed with BLAKE3 over canonical
//! JSON. The hash is the drift detector between a running daemon and an
//! installed guard script.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod builtin;
mod engine;
mod error;
mod export;
mod normalize;
mod pattern;

pub use engine::{Classification, PatternEngine, SegmentMatch};
pub use error::{PatternError, PatternResult};
pub use export::{ExportedPattern, PatternExport};
pub use normalize::{UnbalancedQuotes, normalize, split_segments};
pub use pattern::{Pattern, PatternSource, RemovalRequest};
