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

//! Error taxonomy for the tool-invocation pipeline.
//!
//! Strict-mode gate failures and wrapped execution failures surface as
//! `PipelineError`; the execution engine has its own generic `FanOutError`
//! so retry exhaustion can re-raise the caller's error type unchanged.

use std::time::Duration;

use thiserror::Error;

use crate::engine_core::models::ViolationReport;

/// Failure surfaced to the caller of a pipeline invocation.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or invalid dependency at construction. Fatal, raised before
    /// any invocation runs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A gate middleware blocked the invocation.
    #[error(transparent)]
    Gate(#[from] GateError),

    /// The wrapped tool operation itself failed. Hooks can never mask this.
    #[error("Tool execution failed: {0}")]
    Execution(#[source] anyhow::Error),
}

/// Failure raised by the verification gate.
#[derive(Error, Debug)]
pub enum GateError {
    /// One or more referenced symbols failed verification (Strict mode only;
    /// Warning mode logs the same report and lets the call proceed).
    #[error("{}", .0.render())]
    Violation(ViolationReport),

    /// Unexpected failure inside extraction or verification. Strict mode
    /// fails closed with this; Warning mode logs it and proceeds.
    #[error("Verification gate internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

/// Failure from the bounded fan-out engine.
///
/// `Op` carries an item failure with the underlying error unchanged.
/// `Timeout` is deliberately a distinct variant so callers can always tell
/// a deadline from anything the operation itself raised.
#[derive(Error, Debug)]
pub enum FanOutError<E> {
    #[error("batch size must be positive")]
    InvalidBatchSize,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("fan-out cancelled")]
    Cancelled,

    #[error("{0}")]
    Op(E),
}

impl<E> FanOutError<E> {
    /// Unwrap the item failure, if that is what this is.
    pub fn into_op(self) -> Option<E> {
        match self {
            FanOutError::Op(e) => Some(e),
            _ => None,
        }
    }
}

impl PipelineError {
    /// Get user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Configuration(_) => "Internal error".to_string(),
            PipelineError::Gate(GateError::Violation(report)) => report.render(),
            PipelineError::Gate(GateError::Internal(_)) => {
                "Verification failed due to an internal error".to_string()
            }
            PipelineError::Execution(source) => format!("Tool execution failed: {}", source),
        }
    }
}
