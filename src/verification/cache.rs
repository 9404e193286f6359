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

//! TTL-bounded verification cache.
//!
//! Backed by a sharded concurrent map so the gate's fan-out of lookups
//! stays parallel; one global lock here would serialize exactly the work
//! `Executor::run_all` exists to overlap. Expiry is lazy: a record past its
//! TTL is treated as absent by every reader, no background sweeper runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;

use crate::config::Config;
use crate::engine_core::models::{CacheStatistics, VerificationOutcome, VerificationRecord};
use crate::verification::SymbolVerifier;

/// Rough per-member bookkeeping overhead used by the memory estimate.
const MEMBER_OVERHEAD_BYTES: usize = 48;

pub struct VerificationCache {
    entries: DashMap<String, VerificationRecord>,
    ttl: TimeDelta,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl VerificationCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_ttl(), config.max_cache_entries)
    }

    /// Whether `symbol` has a live (non-expired) verification record.
    /// Counts exactly one hit or miss per call; never errors for unknowns.
    pub fn is_verified(&self, symbol: &str) -> bool {
        if symbol.is_empty() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let now = Utc::now();
        // Lazy expiry: drop a dead record on the read path. The subsequent
        // read re-checks expiry under the shard lock, so a record past its
        // TTL is never reported verified even if another writer races us.
        self.entries.remove_if(symbol, |_, rec| rec.expires_at <= now);
        let verified = self
            .entries
            .get(symbol)
            .map_or(false, |rec| rec.expires_at > now);

        if verified {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        verified
    }

    /// Upsert a verification record. The TTL countdown restarts from this
    /// write's timestamp; concurrent writes to the same symbol converge to
    /// the last applied write, distinct symbols proceed independently.
    pub fn mark_verified(
        &self,
        symbol: &str,
        members: impl IntoIterator<Item = String>,
        source_file: Option<PathBuf>,
        file_mod_time: Option<DateTime<Utc>>,
    ) {
        if symbol.is_empty() {
            return;
        }

        let now = Utc::now();
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(symbol) {
            self.make_room();
        }

        let record = VerificationRecord {
            symbol_name: symbol.to_string(),
            members: members.into_iter().collect(),
            verified_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            source_file,
            file_mod_time,
            access_count: 0,
            last_accessed_at: now,
        };
        self.entries.insert(symbol.to_string(), record);
    }

    /// Whether the symbol is verified AND its member set contains
    /// `member` (case-sensitive). Counts one hit or miss per call; the
    /// hit/miss reflects the symbol lookup, not the member detail.
    pub fn has_verified_member(&self, symbol: &str, member: &str) -> bool {
        if symbol.is_empty() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let now = Utc::now();
        self.entries.remove_if(symbol, |_, rec| rec.expires_at <= now);
        match self.entries.get(symbol) {
            Some(rec) if rec.expires_at > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                rec.members.contains(member)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Member names of a live record, sorted for stable report rendering.
    /// Typed absence for unknown or expired symbols; no counter traffic.
    pub fn available_members(&self, symbol: &str) -> Option<Vec<String>> {
        let now = Utc::now();
        let rec = self.entries.get(symbol)?;
        if rec.expires_at <= now {
            return None;
        }
        let mut members: Vec<String> = rec.members.iter().cloned().collect();
        members.sort();
        Some(members)
    }

    /// Remove entries. `None` clears everything; a pattern is a
    /// case-insensitive glob (`*`, `?`) over symbol names. A pattern
    /// matching nothing is a no-op, never an error.
    pub fn invalidate(&self, pattern: Option<&str>) {
        match pattern {
            None => self.entries.clear(),
            Some(raw) => {
                let pattern = raw.to_lowercase();
                self.entries
                    .retain(|name, _| !glob_match(&pattern, &name.to_lowercase()));
            }
        }
    }

    /// Remove every record whose `source_file` is `path`.
    pub fn invalidate_for_file(&self, path: &Path) {
        self.entries
            .retain(|_, rec| rec.source_file.as_deref() != Some(path));
    }

    /// Bump `access_count`/`last_accessed_at` for records that still exist;
    /// names with no live record are silently skipped.
    pub fn record_access(&self, symbols: &[String]) {
        let now = Utc::now();
        for name in symbols {
            if let Some(mut rec) = self.entries.get_mut(name) {
                if rec.expires_at > now {
                    rec.access_count += 1;
                    rec.last_accessed_at = now;
                }
            }
        }
    }

    /// Counter snapshot plus a rough memory estimate. Purges expired
    /// entries first so `total_entries` reflects live records only.
    pub fn statistics(&self) -> CacheStatistics {
        self.purge_expired();

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64 * 100.0
        };

        let mut approximate_memory_bytes = 0u64;
        for entry in self.entries.iter() {
            approximate_memory_bytes += approximate_record_bytes(entry.key(), entry.value());
        }

        CacheStatistics {
            total_entries: self.entries.len(),
            hits,
            misses,
            hit_rate,
            approximate_memory_bytes,
        }
    }

    /// Drop every expired record now instead of waiting for reads to
    /// trip over them.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.entries.retain(|_, rec| rec.expires_at > now);
    }

    fn make_room(&self) {
        self.purge_expired();
        while self.entries.len() >= self.max_entries {
            let victim = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().last_accessed_at)
                .map(|entry| entry.key().clone());
            match victim {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl SymbolVerifier for VerificationCache {
    async fn is_verified(&self, symbol: &str) -> anyhow::Result<bool> {
        Ok(VerificationCache::is_verified(self, symbol))
    }

    async fn member_outcome(
        &self,
        symbol: &str,
        member: &str,
    ) -> anyhow::Result<VerificationOutcome> {
        if self.has_verified_member(symbol, member) {
            return Ok(VerificationOutcome::Verified);
        }
        Ok(match self.available_members(symbol) {
            Some(available_members) => VerificationOutcome::MemberUnknown { available_members },
            None => VerificationOutcome::Unverified,
        })
    }

    async fn record_access(&self, symbols: &[String]) {
        VerificationCache::record_access(self, symbols);
    }
}

fn approximate_record_bytes(key: &str, rec: &VerificationRecord) -> u64 {
    let mut bytes = std::mem::size_of::<VerificationRecord>() + key.len() + rec.symbol_name.len();
    for member in &rec.members {
        bytes += member.len() + MEMBER_OVERHEAD_BYTES;
    }
    if let Some(path) = &rec.source_file {
        bytes += path.as_os_str().len();
    }
    bytes as u64
}

/// Iterative `*`/`?` wildcard match with backtracking. Both sides are
/// expected pre-lowercased by the caller for case-insensitive semantics.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(star_at) = star {
            pi = star_at + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
