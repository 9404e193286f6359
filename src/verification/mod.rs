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

//! Symbol verification subsystem.
//!
//! The gate middleware extracts symbol references from code-modification
//! payloads and checks them against a verification source. The source seam
//! is the `SymbolVerifier` trait so lookups may be backed by the in-process
//! TTL cache or by something slower (an index service, a language server).

pub mod cache;
pub mod extractor;
pub mod gate;
pub mod payload;

use async_trait::async_trait;

use crate::engine_core::models::VerificationOutcome;

/// Source of truth the gate checks symbol references against.
///
/// Lookups are fallible: a backend outage is an internal gate error, which
/// Strict mode turns into a block and Warning mode logs past.
#[async_trait]
pub trait SymbolVerifier: Send + Sync {
    /// Whether the symbol has a live verification record.
    async fn is_verified(&self, symbol: &str) -> anyhow::Result<bool>;

    /// Member-level check; `MemberUnknown` carries the type's available
    /// members so violation reports can be actionable.
    async fn member_outcome(&self, symbol: &str, member: &str)
        -> anyhow::Result<VerificationOutcome>;

    /// Bump access bookkeeping for symbols that passed verification.
    async fn record_access(&self, symbols: &[String]);
}
