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

//! Structured per-invocation logging.
//!
//! Runs at order 0 so it observes every invocation, including ones a later
//! gate blocks. Emits one serialized entry per lifecycle event under the
//! `invocation` target.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::engine_core::errors::PipelineError;
use crate::pipeline::{InvocationContext, ToolMiddleware};

#[derive(Serialize)]
struct InvocationLogEntry<'a> {
    invocation_id: String,
    timestamp: f64,
    tool_name: &'a str,
    outcome: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u128>,
}

pub struct InvocationLogMiddleware {
    order: i32,
}

impl InvocationLogMiddleware {
    pub fn new() -> Self {
        Self { order: 0 }
    }

    pub fn with_order(order: i32) -> Self {
        Self { order }
    }

    fn entry<'a>(
        &self,
        ctx: &'a InvocationContext,
        outcome: &'a str,
        elapsed: Option<Duration>,
    ) -> String {
        let entry = InvocationLogEntry {
            invocation_id: ctx.id.to_string(),
            timestamp: crate::utils::time::now(),
            tool_name: &ctx.tool_name,
            outcome,
            elapsed_ms: elapsed.map(|e| e.as_millis()),
        };
        serde_json::to_string(&entry).unwrap_or_default()
    }
}

impl Default for InvocationLogMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolMiddleware for InvocationLogMiddleware {
    fn name(&self) -> &str {
        "invocation_log"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn on_before(&self, ctx: &InvocationContext) -> Result<(), PipelineError> {
        debug!(
            target: "invocation",
            payload = %self.entry(ctx, "start", None),
            "TOOL_INVOCATION_START"
        );
        Ok(())
    }

    async fn on_after(
        &self,
        ctx: &InvocationContext,
        _result: &Value,
        elapsed: Duration,
    ) -> Result<(), PipelineError> {
        info!(
            target: "invocation",
            payload = %self.entry(ctx, "ok", Some(elapsed)),
            "TOOL_INVOCATION"
        );
        Ok(())
    }

    async fn on_error(
        &self,
        ctx: &InvocationContext,
        error: &PipelineError,
        elapsed: Duration,
    ) -> Result<(), PipelineError> {
        warn!(
            target: "invocation",
            payload = %self.entry(ctx, "error", Some(elapsed)),
            error = %error,
            "TOOL_INVOCATION"
        );
        Ok(())
    }
}
