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

//! toolgate Constants - Single source of truth for all configuration values.
//!
//! This module centralizes env var names, report limits, and the built-in
//! symbol whitelist to ensure consistency and maintainability.

/// Configuration Environment Variables
pub mod config {
    pub const ENV_CONFIG_YAML_PATH: &str = "TOOLGATE_CONFIG_YAML_PATH";
    pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
    pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
    pub const ENV_ENABLED: &str = "TOOLGATE_ENABLED";
    pub const ENV_MODE: &str = "TOOLGATE_MODE";
    pub const ENV_REQUIRE_MEMBERS: &str = "TOOLGATE_REQUIRE_MEMBER_VERIFICATION";
    pub const ENV_EXTRA_WHITELIST: &str = "TOOLGATE_EXTRA_WHITELIST";
    pub const ENV_CACHE_TTL_HOURS: &str = "TOOLGATE_CACHE_TTL_HOURS";
    pub const ENV_MAX_CACHE_ENTRIES: &str = "TOOLGATE_MAX_CACHE_ENTRIES";
}

/// Defaults applied when neither env nor YAML provides a value
pub mod defaults {
    /// Verification records live this long before lazy expiry
    pub const CACHE_TTL_HOURS: u64 = 24;
    /// Upper bound on cached verification records
    pub const MAX_CACHE_ENTRIES: usize = 10_000;
    /// Concurrent symbol lookups per gate evaluation (0 = unbounded)
    pub const MAX_LOOKUP_CONCURRENCY: usize = 16;
}

/// Violation report rendering limits
pub mod report {
    /// Unverified symbols enumerated before "+N more"
    pub const MAX_SYMBOLS_LISTED: usize = 5;
    /// Member issues enumerated in one report
    pub const MAX_MEMBER_ISSUES: usize = 3;
    /// Available members shown per member issue
    pub const MAX_MEMBERS_LISTED: usize = 5;

    pub const REMEDIATION_GUIDANCE: &str = "Before retrying, verify each symbol against \
its actual definition: open the declaring file or search the codebase for the type, \
confirm the member names, then re-run the operation. Unverified names are usually \
typos or stale assumptions about an API that has changed.";
}

/// Gate behavior
pub mod gate {
    /// Tool names treated as content-modifying (compared case-insensitively)
    pub const MODIFYING_TOOLS: &[&str] = &[
        "edit",
        "edit_file",
        "multi_edit",
        "multiedit",
        "write",
        "write_file",
        "create_file",
        "notebook_edit",
        "notebook_edit_cell",
        "apply_patch",
        "str_replace",
    ];
}

/// Built-in symbol whitelist: language primitives plus common library types
/// for the two supported dialects. Never reported as unverified.
pub mod whitelist {
    pub const BUILTIN: &[&str] = &[
        // C#-family primitives and keywords that scan like type names
        "var", "void", "int", "uint", "long", "ulong", "short", "ushort", "byte", "sbyte",
        "bool", "char", "float", "double", "decimal", "string", "object", "dynamic",
        // Common .NET library types
        "String", "Int32", "Int64", "Boolean", "Object", "DateTime", "DateTimeOffset",
        "TimeSpan", "Guid", "Task", "ValueTask", "List", "Dictionary", "HashSet",
        "IEnumerable", "ICollection", "IList", "IDictionary", "Array", "Exception",
        "ArgumentException", "InvalidOperationException", "Console", "Math", "Convert",
        "Nullable", "Func", "Action", "Tuple", "KeyValuePair", "StringBuilder",
        "CancellationToken", "Span", "Memory", "Type",
        // TS/JS primitives
        "number", "boolean", "any", "unknown", "never", "undefined", "null", "symbol",
        "bigint",
        // Common JS/TS library types and globals
        "Promise", "Map", "Set", "WeakMap", "WeakSet", "Date", "Error", "JSON",
        "console", "Number", "RegExp", "Function", "Symbol", "Infinity", "NaN",
        "globalThis", "Record", "Partial", "Readonly", "Required", "Pick", "Omit",
    ];
}
