// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Domain models for the toolgate pipeline.
//!
//! This module contains pure data structures representing invocations,
//! verification records, and violation reports. It is designed to be free
//! of I/O side effects.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine_core::constants::report;

/// Newtype wrapper around Uuid for type-safe invocation identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(Uuid);

impl InvocationId {
    /// Generate a new random InvocationId
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying Uuid
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gate enforcement policy: fail-closed or fail-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum EnforcementMode {
    /// Violations raise a blocking failure
    Strict,
    /// Violations are logged, execution continues
    Warning,
}

impl EnforcementMode {
    /// Lenient parser for config values. Unknown strings fall back to
    /// Warning (fail-open), matching the gate's default posture.
    pub fn parse_safe(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "strict" | "block" | "enforce" => EnforcementMode::Strict,
            _ => EnforcementMode::Warning,
        }
    }
}

/// Cached proof that a symbol was verified against its source.
///
/// `expires_at` is always `verified_at + TTL`; a record past `expires_at`
/// must be treated as absent by every reader (lazy expiry, no sweeper).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub symbol_name: String,
    pub members: HashSet<String>,
    pub verified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_mod_time: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
}

/// Outcome of verifying one symbol (and optionally one member) reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum VerificationOutcome {
    /// Symbol (and member, if requested) verified
    Verified,
    /// Symbol has no live verification record
    Unverified,
    /// Symbol verified, but the referenced member is unknown
    MemberUnknown { available_members: Vec<String> },
}

/// A type or member mention extracted from a code-modification payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SymbolReference {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
}

impl SymbolReference {
    pub fn type_only(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            member: None,
        }
    }

    pub fn with_member(symbol: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            member: Some(member.into()),
        }
    }
}

/// One unknown-member finding inside a violation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberIssue {
    pub symbol: String,
    pub member: String,
    pub available_members: Vec<String>,
}

/// Everything the gate found wrong with one code-modification request.
/// Serializable so Warning mode can log it as structured fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViolationReport {
    pub tool_name: String,
    pub unverified_symbols: Vec<String>,
    pub member_issues: Vec<MemberIssue>,
}

impl ViolationReport {
    pub fn is_empty(&self) -> bool {
        self.unverified_symbols.is_empty() && self.member_issues.is_empty()
    }

    /// Render the actionable multi-line message shown on a Strict block and
    /// logged in Warning mode. Enumerates at most 5 unverified symbols and
    /// 3 member issues (5 available members each), truncating with "+N more".
    pub fn render(&self) -> String {
        let mut out = format!(
            "Code modification blocked by verification gate (tool '{}'):",
            self.tool_name
        );

        if !self.unverified_symbols.is_empty() {
            let shown: Vec<&str> = self
                .unverified_symbols
                .iter()
                .take(report::MAX_SYMBOLS_LISTED)
                .map(String::as_str)
                .collect();
            let hidden = self.unverified_symbols.len().saturating_sub(shown.len());
            out.push_str("\nUnverified symbols: ");
            out.push_str(&shown.join(", "));
            if hidden > 0 {
                out.push_str(&format!(" (+{} more)", hidden));
            }
        }

        if !self.member_issues.is_empty() {
            out.push_str("\nUnknown members:");
            for issue in self.member_issues.iter().take(report::MAX_MEMBER_ISSUES) {
                let shown: Vec<&str> = issue
                    .available_members
                    .iter()
                    .take(report::MAX_MEMBERS_LISTED)
                    .map(String::as_str)
                    .collect();
                let hidden = issue.available_members.len().saturating_sub(shown.len());
                out.push_str(&format!(
                    "\n  - {}.{} (available: {}",
                    issue.symbol,
                    issue.member,
                    shown.join(", ")
                ));
                if hidden > 0 {
                    out.push_str(&format!(", +{} more", hidden));
                }
                out.push(')');
            }
            let hidden_issues = self
                .member_issues
                .len()
                .saturating_sub(report::MAX_MEMBER_ISSUES);
            if hidden_issues > 0 {
                out.push_str(&format!("\n  (+{} more member issues)", hidden_issues));
            }
        }

        out.push('\n');
        out.push_str(report::REMEDIATION_GUIDANCE);
        out
    }
}

/// Snapshot of the verification cache counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage in `[0, 100]`; 0 when no lookups have happened yet
    pub hit_rate: f64,
    pub approximate_memory_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(symbols: &[&str], issues: Vec<MemberIssue>) -> ViolationReport {
        ViolationReport {
            tool_name: "edit_file".to_string(),
            unverified_symbols: symbols.iter().map(|s| s.to_string()).collect(),
            member_issues: issues,
        }
    }

    #[test]
    fn render_names_every_symbol_up_to_limit() {
        let report = report_with(&["Widget", "Gadget"], vec![]);
        let text = report.render();
        assert!(text.contains("Widget"));
        assert!(text.contains("Gadget"));
        assert!(!text.contains("more"));
    }

    #[test]
    fn render_truncates_beyond_five_symbols() {
        let report = report_with(&["A", "B", "C", "D", "E", "F", "G"], vec![]);
        let text = report.render();
        assert!(text.contains("A, B, C, D, E"));
        assert!(text.contains("(+2 more)"));
        assert!(!text.contains("F,"));
    }

    #[test]
    fn render_truncates_member_lists() {
        let issue = MemberIssue {
            symbol: "Widget".to_string(),
            member: "frobnicate".to_string(),
            available_members: (0..8).map(|i| format!("m{}", i)).collect(),
        };
        let text = report_with(&[], vec![issue]).render();
        assert!(text.contains("Widget.frobnicate"));
        assert!(text.contains("m0, m1, m2, m3, m4"));
        assert!(text.contains("+3 more"));
    }

    #[test]
    fn render_always_carries_guidance() {
        let text = report_with(&["Widget"], vec![]).render();
        assert!(text.contains("verify each symbol"));
    }

    #[test]
    fn parse_safe_defaults_to_warning() {
        assert_eq!(EnforcementMode::parse_safe("strict"), EnforcementMode::Strict);
        assert_eq!(EnforcementMode::parse_safe("BLOCK"), EnforcementMode::Strict);
        assert_eq!(EnforcementMode::parse_safe("warning"), EnforcementMode::Warning);
        assert_eq!(EnforcementMode::parse_safe("nonsense"), EnforcementMode::Warning);
    }
}
