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

//! Tool-invocation middleware pipeline.
//!
//! Every tool call runs through an ordered chain of hooks: `on_before` in
//! ascending order (any failure blocks the call), the wrapped operation,
//! then `on_after` or `on_error` in the same ascending order. After/error
//! hooks are isolated: one hook failing is logged and never hides the
//! wrapped operation's outcome from the caller.
//!
//! The registry is passed in explicitly; there is no ambient global state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::engine_core::errors::PipelineError;
use crate::engine_core::models::InvocationId;
use crate::verification::payload::PayloadView;

/// One tool invocation as seen by middleware.
#[derive(Clone)]
pub struct InvocationContext {
    pub id: InvocationId,
    pub tool_name: String,
    pub payload: Arc<dyn PayloadView>,
}

impl InvocationContext {
    pub fn new(tool_name: impl Into<String>, payload: Arc<dyn PayloadView>) -> Self {
        Self {
            id: InvocationId::generate(),
            tool_name: tool_name.into(),
            payload,
        }
    }
}

/// A cross-cutting hook around tool execution.
///
/// Hooks run in ascending `order`; ties preserve registration order.
/// A disabled hook receives no calls of any kind.
#[async_trait]
pub trait ToolMiddleware: Send + Sync {
    fn name(&self) -> &str;

    fn order(&self) -> i32 {
        100
    }

    fn enabled(&self) -> bool {
        true
    }

    /// Runs before the wrapped operation. A failure here blocks the call:
    /// the operation and every after/error hook are skipped.
    async fn on_before(&self, _ctx: &InvocationContext) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Runs after a successful operation, in the same ascending order as
    /// `on_before`. Failures are logged and isolated per hook.
    async fn on_after(
        &self,
        _ctx: &InvocationContext,
        _result: &Value,
        _elapsed: Duration,
    ) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Runs after a failed operation, same order and isolation rules.
    async fn on_error(
        &self,
        _ctx: &InvocationContext,
        _error: &PipelineError,
        _elapsed: Duration,
    ) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Hook lists owned by whoever assembles the pipeline.
#[derive(Default)]
pub struct MiddlewareRegistry {
    global: Vec<Arc<dyn ToolMiddleware>>,
    per_tool: HashMap<String, Vec<Arc<dyn ToolMiddleware>>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook that wraps every tool.
    pub fn register_global(&mut self, middleware: Arc<dyn ToolMiddleware>) {
        self.global.push(middleware);
    }

    /// Register a hook for one tool only.
    pub fn register_for_tool(&mut self, tool_name: &str, middleware: Arc<dyn ToolMiddleware>) {
        self.per_tool
            .entry(tool_name.to_string())
            .or_default()
            .push(middleware);
    }
}

/// The pipeline: immutable merged hook chains built once at construction.
pub struct ToolPipeline {
    global_chain: Vec<Arc<dyn ToolMiddleware>>,
    tool_chains: HashMap<String, Vec<Arc<dyn ToolMiddleware>>>,
}

impl ToolPipeline {
    /// Merge the registry's global and per-tool lists and stable-sort each
    /// chain ascending by `order`. Global hooks keep their relative order
    /// among themselves, as do tool-specific hooks, interleaved by order
    /// value.
    pub fn new(registry: MiddlewareRegistry) -> Self {
        let mut global_chain = registry.global.clone();
        global_chain.sort_by_key(|m| m.order());

        let mut tool_chains = HashMap::new();
        for (tool_name, specific) in registry.per_tool {
            let mut chain: Vec<Arc<dyn ToolMiddleware>> = registry
                .global
                .iter()
                .cloned()
                .chain(specific.into_iter())
                .collect();
            chain.sort_by_key(|m| m.order());
            tool_chains.insert(tool_name, chain);
        }

        Self {
            global_chain,
            tool_chains,
        }
    }

    fn chain_for(&self, tool_name: &str) -> &[Arc<dyn ToolMiddleware>] {
        self.tool_chains
            .get(tool_name)
            .map(Vec::as_slice)
            .unwrap_or(&self.global_chain)
    }

    /// Run one tool invocation through the hook chain.
    pub async fn execute<F, Fut>(
        &self,
        ctx: InvocationContext,
        op: F,
    ) -> Result<Value, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Value>>,
    {
        let chain = self.chain_for(&ctx.tool_name);

        for middleware in chain {
            if !middleware.enabled() {
                continue;
            }
            middleware.on_before(&ctx).await?;
        }

        let started = Instant::now();
        match op().await {
            Ok(value) => {
                let elapsed = started.elapsed();
                for middleware in chain {
                    if !middleware.enabled() {
                        continue;
                    }
                    if let Err(hook_error) = middleware.on_after(&ctx, &value, elapsed).await {
                        warn!(
                            middleware = middleware.name(),
                            tool = %ctx.tool_name,
                            error = %hook_error,
                            "after-hook failed; continuing"
                        );
                    }
                }
                Ok(value)
            }
            Err(cause) => {
                let elapsed = started.elapsed();
                let error = PipelineError::Execution(cause);
                for middleware in chain {
                    if !middleware.enabled() {
                        continue;
                    }
                    if let Err(hook_error) = middleware.on_error(&ctx, &error, elapsed).await {
                        warn!(
                            middleware = middleware.name(),
                            tool = %ctx.tool_name,
                            error = %hook_error,
                            "error-hook failed; continuing"
                        );
                    }
                }
                Err(error)
            }
        }
    }
}
