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

//! toolgate: a tool-invocation pipeline with a verification gate.
//!
//! This library wraps every tool call a protocol server dispatches in an
//! ordered middleware chain. The built-in verification gate extracts symbol
//! references from code-modification payloads and checks them against a
//! TTL-bounded verification cache, concurrently, before the modification
//! is allowed to run. Transport bindings and tool discovery live in the
//! embedding server, not here.

pub mod config;
pub mod engine;
pub mod engine_core;
pub mod middleware;
pub mod pipeline;
pub mod utils;
pub mod verification;
