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

//! Integration tests for middleware ordering semantics.
//! Covers:
//! - Ascending-order execution for before AND after hooks (not onion order)
//! - Disabled hooks receiving zero calls under any outcome
//! - Error hooks firing in the same ascending order

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use toolgate::engine_core::errors::PipelineError;
use toolgate::pipeline::{
    InvocationContext, MiddlewareRegistry, ToolMiddleware, ToolPipeline,
};
use toolgate::verification::payload::JsonPayload;

type CallLog = Arc<Mutex<Vec<String>>>;

struct Probe {
    label: String,
    order: i32,
    enabled: bool,
    log: CallLog,
}

impl Probe {
    fn new(label: &str, order: i32, log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            order,
            enabled: true,
            log,
        })
    }

    fn disabled(label: &str, order: i32, log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            order,
            enabled: false,
            log,
        })
    }

    fn record(&self, stage: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", stage, self.label));
    }
}

#[async_trait]
impl ToolMiddleware for Probe {
    fn name(&self) -> &str {
        &self.label
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn on_before(&self, _ctx: &InvocationContext) -> Result<(), PipelineError> {
        self.record("before");
        Ok(())
    }

    async fn on_after(
        &self,
        _ctx: &InvocationContext,
        _result: &Value,
        _elapsed: Duration,
    ) -> Result<(), PipelineError> {
        self.record("after");
        Ok(())
    }

    async fn on_error(
        &self,
        _ctx: &InvocationContext,
        _error: &PipelineError,
        _elapsed: Duration,
    ) -> Result<(), PipelineError> {
        self.record("error");
        Ok(())
    }
}

fn ctx() -> InvocationContext {
    InvocationContext::new("any_tool", Arc::new(JsonPayload::new(json!({}))))
}

#[tokio::test]
async fn orders_20_5_30_fire_as_5_20_30_for_before_and_after() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut registry = MiddlewareRegistry::new();
    registry.register_global(Probe::new("twenty", 20, log.clone()));
    registry.register_global(Probe::new("five", 5, log.clone()));
    registry.register_global(Probe::new("thirty", 30, log.clone()));
    let pipeline = ToolPipeline::new(registry);

    pipeline
        .execute(ctx(), || async { Ok(json!("done")) })
        .await
        .unwrap();

    let calls = log.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            "before:five",
            "before:twenty",
            "before:thirty",
            "after:five",
            "after:twenty",
            "after:thirty",
        ]
    );
}

#[tokio::test]
async fn error_hooks_fire_in_the_same_ascending_order() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut registry = MiddlewareRegistry::new();
    registry.register_global(Probe::new("twenty", 20, log.clone()));
    registry.register_global(Probe::new("five", 5, log.clone()));
    let pipeline = ToolPipeline::new(registry);

    let _ = pipeline
        .execute(ctx(), || async { anyhow::bail!("operation failed") })
        .await;

    let calls = log.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec!["before:five", "before:twenty", "error:five", "error:twenty"]
    );
}

#[tokio::test]
async fn disabled_hook_gets_zero_calls_on_success_and_failure() {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let mut registry = MiddlewareRegistry::new();
    registry.register_global(Probe::disabled("ghost", 1, log.clone()));
    registry.register_global(Probe::new("live", 2, log.clone()));
    let pipeline = ToolPipeline::new(registry);

    pipeline
        .execute(ctx(), || async { Ok(json!(null)) })
        .await
        .unwrap();
    let _ = pipeline
        .execute(ctx(), || async { anyhow::bail!("nope") })
        .await;

    let calls = log.lock().unwrap().clone();
    assert!(!calls.is_empty());
    assert!(calls.iter().all(|call| !call.ends_with(":ghost")));
}
