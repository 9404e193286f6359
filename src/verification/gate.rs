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

//! Verification gate middleware.
//!
//! Decides whether a code-modification request may proceed based on which
//! referenced symbols are verified. Strict mode fails closed (violations
//! and internal errors block); Warning mode fails open (both are logged,
//! the operation proceeds).
//!
//! All per-symbol and per-member checks go through `Executor::run_all`:
//! N lookups cost about one lookup's latency, never N of them.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::engine::executor::Executor;
use crate::engine_core::constants::{gate, whitelist};
use crate::engine_core::errors::{GateError, PipelineError};
use crate::engine_core::models::{
    EnforcementMode, MemberIssue, SymbolReference, VerificationOutcome, ViolationReport,
};
use crate::pipeline::{InvocationContext, ToolMiddleware};
use crate::verification::extractor::{SourceDialect, SymbolExtractor};
use crate::verification::payload;
use crate::verification::SymbolVerifier;

pub struct VerificationGate {
    enabled: bool,
    mode: EnforcementMode,
    require_member_verification: bool,
    extra_whitelist: HashSet<String>,
    max_lookup_concurrency: usize,
    verifier: Arc<dyn SymbolVerifier>,
    extractor: SymbolExtractor,
}

impl VerificationGate {
    pub fn new(
        config: &Config,
        verifier: Arc<dyn SymbolVerifier>,
    ) -> Result<Self, PipelineError> {
        let extractor = SymbolExtractor::new().map_err(|e| {
            PipelineError::Configuration(format!("invalid extraction pattern: {}", e))
        })?;
        Ok(Self {
            enabled: config.enabled,
            mode: config.mode,
            require_member_verification: config.require_member_verification,
            extra_whitelist: config.extra_whitelist.clone(),
            max_lookup_concurrency: config.max_lookup_concurrency,
            verifier,
            extractor,
        })
    }

    fn is_content_modifying(tool_name: &str) -> bool {
        let name = tool_name.to_lowercase();
        gate::MODIFYING_TOOLS.contains(&name.as_str())
    }

    fn is_whitelisted(&self, symbol: &str) -> bool {
        whitelist::BUILTIN.contains(&symbol) || self.extra_whitelist.contains(symbol)
    }

    /// Extract, filter, and verify. `Ok(None)` means the modification is
    /// clean; `Ok(Some)` carries the violations; `Err` is an internal
    /// failure for the caller to apply fail-open/fail-closed policy to.
    async fn evaluate(
        &self,
        tool_name: &str,
        file_path: Option<&str>,
        code: &str,
    ) -> anyhow::Result<Option<ViolationReport>> {
        let dialect = SourceDialect::detect(file_path, code);
        let references: Vec<SymbolReference> = self
            .extractor
            .extract(dialect, code)
            .into_iter()
            .filter(|reference| !self.is_whitelisted(&reference.symbol))
            .collect();
        if references.is_empty() {
            return Ok(None);
        }

        // Distinct symbols in first-seen order.
        let mut symbols = Vec::new();
        let mut seen = HashSet::new();
        for reference in &references {
            if seen.insert(reference.symbol.clone()) {
                symbols.push(reference.symbol.clone());
            }
        }
        debug!(
            tool = tool_name,
            dialect = ?dialect,
            symbols = symbols.len(),
            "verifying extracted symbol references"
        );

        let cancel = CancellationToken::new();
        let verifier = self.verifier.clone();
        let type_checks = Executor::run_all(
            symbols.clone(),
            |symbol| {
                let verifier = verifier.clone();
                async move {
                    let verified = verifier.is_verified(&symbol).await?;
                    Ok::<_, anyhow::Error>((symbol, verified))
                }
            },
            self.max_lookup_concurrency,
            &cancel,
        )
        .await
        .context("symbol verification fan-out failed")?;

        let verified: HashSet<String> = type_checks
            .iter()
            .filter(|(_, ok)| *ok)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        let unverified_symbols: Vec<String> = symbols
            .iter()
            .filter(|symbol| !verified.contains(*symbol))
            .cloned()
            .collect();

        let mut member_issues = Vec::new();
        if self.require_member_verification {
            let member_refs: Vec<(String, String)> = references
                .iter()
                .filter(|reference| verified.contains(&reference.symbol))
                .filter_map(|reference| {
                    reference
                        .member
                        .clone()
                        .map(|member| (reference.symbol.clone(), member))
                })
                .collect();

            let outcomes = Executor::run_all(
                member_refs,
                |(symbol, member)| {
                    let verifier = verifier.clone();
                    async move {
                        let outcome = verifier.member_outcome(&symbol, &member).await?;
                        Ok::<_, anyhow::Error>((symbol, member, outcome))
                    }
                },
                self.max_lookup_concurrency,
                &cancel,
            )
            .await
            .context("member verification fan-out failed")?;

            for (symbol, member, outcome) in outcomes {
                if let VerificationOutcome::MemberUnknown { available_members } = outcome {
                    member_issues.push(MemberIssue {
                        symbol,
                        member,
                        available_members,
                    });
                }
            }
        }

        if unverified_symbols.is_empty() && member_issues.is_empty() {
            self.verifier.record_access(&symbols).await;
            return Ok(None);
        }

        Ok(Some(ViolationReport {
            tool_name: tool_name.to_string(),
            unverified_symbols,
            member_issues,
        }))
    }
}

#[async_trait]
impl ToolMiddleware for VerificationGate {
    fn name(&self) -> &str {
        "verification_gate"
    }

    fn order(&self) -> i32 {
        10
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn on_before(&self, ctx: &InvocationContext) -> Result<(), PipelineError> {
        if !Self::is_content_modifying(&ctx.tool_name) {
            return Ok(());
        }
        let Some(code) = payload::modification_text(ctx.payload.as_ref()) else {
            return Ok(());
        };
        if code.trim().is_empty() {
            return Ok(());
        }
        let file_path = payload::file_path(ctx.payload.as_ref());

        match self.evaluate(&ctx.tool_name, file_path.as_deref(), &code).await {
            Ok(None) => Ok(()),
            Ok(Some(report)) => match self.mode {
                EnforcementMode::Strict => Err(GateError::Violation(report).into()),
                EnforcementMode::Warning => {
                    warn!(
                        tool = %ctx.tool_name,
                        invocation = %ctx.id,
                        report = %report.render(),
                        "verification violations; proceeding in warning mode"
                    );
                    Ok(())
                }
            },
            Err(cause) => match self.mode {
                EnforcementMode::Strict => Err(GateError::Internal(cause).into()),
                EnforcementMode::Warning => {
                    warn!(
                        tool = %ctx.tool_name,
                        invocation = %ctx.id,
                        error = %cause,
                        "verification gate internal error; proceeding"
                    );
                    Ok(())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::payload::JsonPayload;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Test double with configurable knowledge and a per-lookup delay.
    struct FakeVerifier {
        known: HashSet<String>,
        members: HashSet<(String, String)>,
        available: Vec<String>,
        delay: Duration,
        accessed: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeVerifier {
        fn new(known: &[&str]) -> Self {
            Self {
                known: known.iter().map(|s| s.to_string()).collect(),
                members: HashSet::new(),
                available: Vec::new(),
                delay: Duration::ZERO,
                accessed: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn with_member(mut self, symbol: &str, member: &str) -> Self {
            self.members
                .insert((symbol.to_string(), member.to_string()));
            self
        }

        fn with_available(mut self, members: &[&str]) -> Self {
            self.available = members.iter().map(|m| m.to_string()).collect();
            self
        }
    }

    #[async_trait]
    impl SymbolVerifier for FakeVerifier {
        async fn is_verified(&self, symbol: &str) -> anyhow::Result<bool> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                anyhow::bail!("verifier backend unavailable");
            }
            Ok(self.known.contains(symbol))
        }

        async fn member_outcome(
            &self,
            symbol: &str,
            member: &str,
        ) -> anyhow::Result<VerificationOutcome> {
            tokio::time::sleep(self.delay).await;
            if self
                .members
                .contains(&(symbol.to_string(), member.to_string()))
            {
                Ok(VerificationOutcome::Verified)
            } else if self.known.contains(symbol) {
                Ok(VerificationOutcome::MemberUnknown {
                    available_members: self.available.clone(),
                })
            } else {
                Ok(VerificationOutcome::Unverified)
            }
        }

        async fn record_access(&self, symbols: &[String]) {
            self.accessed.lock().unwrap().extend(symbols.iter().cloned());
        }
    }

    fn strict_config() -> Config {
        Config {
            mode: EnforcementMode::Strict,
            ..Config::default()
        }
    }

    fn edit_ctx(code: &str) -> InvocationContext {
        InvocationContext::new(
            "edit_file",
            Arc::new(JsonPayload::new(json!({
                "file_path": "src/main.cs",
                "new_string": code,
            }))),
        )
    }

    #[tokio::test]
    async fn strict_mode_blocks_and_names_the_symbol() {
        let gate = VerificationGate::new(
            &strict_config(),
            Arc::new(FakeVerifier::new(&["User"])),
        )
        .unwrap();

        let err = gate
            .on_before(&edit_ctx("var w = new Widget(); var u = new User();"))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Widget"));
        assert!(!message.contains("User,"));
    }

    #[tokio::test]
    async fn warning_mode_lets_the_same_payload_through() {
        let config = Config {
            mode: EnforcementMode::Warning,
            ..Config::default()
        };
        let gate =
            VerificationGate::new(&config, Arc::new(FakeVerifier::new(&["User"]))).unwrap();

        gate.on_before(&edit_ctx("var w = new Widget();"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn verified_payload_records_access() {
        let verifier = Arc::new(FakeVerifier::new(&["User", "Order"]));
        let gate = VerificationGate::new(&strict_config(), verifier.clone()).unwrap();

        gate.on_before(&edit_ctx("var u = new User(); var o = new Order();"))
            .await
            .unwrap();

        let accessed = verifier.accessed.lock().unwrap();
        assert!(accessed.contains(&"User".to_string()));
        assert!(accessed.contains(&"Order".to_string()));
    }

    #[tokio::test]
    async fn violations_do_not_record_access() {
        let verifier = Arc::new(FakeVerifier::new(&["User"]));
        let gate = VerificationGate::new(&strict_config(), verifier.clone()).unwrap();

        let _ = gate
            .on_before(&edit_ctx("var u = new User(); var w = new Widget();"))
            .await;

        assert!(verifier.accessed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_modifying_tools_and_empty_payloads_pass_untouched() {
        let gate = VerificationGate::new(
            &strict_config(),
            Arc::new(FakeVerifier::new(&[])),
        )
        .unwrap();

        // Read-style tool never consults the verifier.
        let read_ctx = InvocationContext::new(
            "read_file",
            Arc::new(JsonPayload::new(json!({ "file_path": "x.cs" }))),
        );
        gate.on_before(&read_ctx).await.unwrap();

        // Whitespace payload is a no-op too.
        gate.on_before(&edit_ctx("   \n\t ")).await.unwrap();

        // No recognized content fields at all.
        let no_content = InvocationContext::new(
            "edit_file",
            Arc::new(JsonPayload::new(json!({ "file_path": "x.cs" }))),
        );
        gate.on_before(&no_content).await.unwrap();
    }

    #[tokio::test]
    async fn whitelisted_symbols_are_never_violations() {
        let config = Config {
            mode: EnforcementMode::Strict,
            extra_whitelist: ["Widget".to_string()].into_iter().collect(),
            ..Config::default()
        };
        let gate = VerificationGate::new(&config, Arc::new(FakeVerifier::new(&[]))).unwrap();

        // List and Widget are whitelisted (built-in and extra); nothing left.
        gate.on_before(&edit_ctx("List<Widget> widgets = Load();"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_members_surface_with_available_list() {
        let config = Config {
            mode: EnforcementMode::Strict,
            require_member_verification: true,
            ..Config::default()
        };
        let verifier = FakeVerifier::new(&["User"])
            .with_member("User", "Save")
            .with_available(&["Save", "Load", "Delete"]);
        let gate = VerificationGate::new(&config, Arc::new(verifier)).unwrap();

        // Known member passes.
        gate.on_before(&edit_ctx("User.Save();")).await.unwrap();

        // Unknown member blocks and lists what exists.
        let err = gate
            .on_before(&edit_ctx("User.Frobnicate();"))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("User.Frobnicate"));
        assert!(message.contains("Save"));
    }

    #[tokio::test]
    async fn member_checks_are_skipped_without_the_flag() {
        let verifier = FakeVerifier::new(&["User"]); // no members known
        let gate = VerificationGate::new(&strict_config(), Arc::new(verifier)).unwrap();
        gate.on_before(&edit_ctx("User.Anything();")).await.unwrap();
    }

    #[tokio::test]
    async fn internal_error_fails_closed_in_strict_mode_only() {
        let mut failing = FakeVerifier::new(&["User"]);
        failing.fail = true;
        let failing = Arc::new(failing);

        let gate = VerificationGate::new(&strict_config(), failing.clone()).unwrap();
        let err = gate
            .on_before(&edit_ctx("var u = new User();"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Gate(GateError::Internal(_))
        ));

        let config = Config {
            mode: EnforcementMode::Warning,
            ..Config::default()
        };
        let gate = VerificationGate::new(&config, failing).unwrap();
        gate.on_before(&edit_ctx("var u = new User();"))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn twenty_slow_lookups_cost_about_one_lookup() {
        let mut verifier = FakeVerifier::new(&[]);
        verifier.delay = Duration::from_millis(100);
        // All 20 symbols verified so the gate runs the full happy path.
        verifier.known = (0..20).map(|i| format!("Type{}", i)).collect();

        let code: String = (0..20)
            .map(|i| format!("var v{} = new Type{}();", i, i))
            .collect::<Vec<_>>()
            .join("\n");

        let config = Config {
            mode: EnforcementMode::Strict,
            max_lookup_concurrency: 0,
            ..Config::default()
        };
        let gate = VerificationGate::new(&config, Arc::new(verifier)).unwrap();

        let started = tokio::time::Instant::now();
        gate.on_before(&edit_ctx(&code)).await.unwrap();
        let elapsed = started.elapsed();

        // Sequential would be 2000ms; concurrent is one lookup plus noise.
        assert!(elapsed < Duration::from_millis(300), "took {:?}", elapsed);
        assert!(elapsed >= Duration::from_millis(100));
    }
}
