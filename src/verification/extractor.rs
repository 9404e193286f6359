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

//! Lexical symbol-reference extraction.
//!
//! Two dialects cover the payloads this gate sees in practice: a C#-family
//! mode and a TS/JS-family mode. Dispatch is data (extension table, then
//! keyword hints), extraction is a fixed set of regex patterns per dialect.
//! Only PascalCase identifiers are candidates; primitives and camelCase
//! locals are not resolvable lexically and are left to the whitelist.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;

use crate::engine_core::models::SymbolReference;

/// Extraction mode for one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDialect {
    CSharpLike,
    TsJsLike,
}

const CSHARP_EXTENSIONS: &[&str] = &["cs", "csx"];
const TSJS_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

const TSJS_HINTS: &[&str] = &[
    "function ",
    "=> ",
    "const ",
    "let ",
    "import ",
    "export ",
    "interface ",
];
const CSHARP_HINTS: &[&str] = &[
    "namespace ",
    "using System",
    "public class",
    "internal ",
    "readonly ",
    "void ",
    "async Task",
];

impl SourceDialect {
    /// Pick a dialect from the file extension, then keyword hints; when
    /// neither is conclusive, C#-family wins.
    pub fn detect(file_path: Option<&str>, code: &str) -> Self {
        if let Some(ext) = file_path
            .map(Path::new)
            .and_then(Path::extension)
            .and_then(|ext| ext.to_str())
        {
            let ext = ext.to_ascii_lowercase();
            if CSHARP_EXTENSIONS.contains(&ext.as_str()) {
                return SourceDialect::CSharpLike;
            }
            if TSJS_EXTENSIONS.contains(&ext.as_str()) {
                return SourceDialect::TsJsLike;
            }
        }

        let ts_score = TSJS_HINTS.iter().filter(|hint| code.contains(*hint)).count();
        let cs_score = CSHARP_HINTS
            .iter()
            .filter(|hint| code.contains(*hint))
            .count();
        if ts_score > cs_score {
            SourceDialect::TsJsLike
        } else {
            SourceDialect::CSharpLike
        }
    }
}

enum RuleKind {
    /// Capture group 1 is one symbol name
    Symbol,
    /// Capture group 1 is a comma-separated list of type names
    SymbolList,
    /// Capture group 1 is the symbol, group 2 the member
    MemberAccess,
}

struct PatternRule {
    regex: Regex,
    kind: RuleKind,
}

impl PatternRule {
    fn new(pattern: &str, kind: RuleKind) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            kind,
        })
    }
}

/// Compiled extraction patterns, built once at gate construction.
pub struct SymbolExtractor {
    shared: Vec<PatternRule>,
    csharp: Vec<PatternRule>,
    tsjs: Vec<PatternRule>,
}

impl SymbolExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        let shared = vec![
            // Constructor calls: new User(...), new Repository<User>(...)
            PatternRule::new(r"\bnew\s+([A-Z][A-Za-z0-9_]*)", RuleKind::Symbol)?,
            // Generic type arguments, including multi-argument lists:
            // Dictionary<UserId, User>, Repository<Order>
            PatternRule::new(
                r"\b[A-Za-z_][A-Za-z0-9_]*<\s*([A-Z][A-Za-z0-9_]*(?:\s*,\s*[A-Z][A-Za-z0-9_]*)*)\s*>",
                RuleKind::SymbolList,
            )?,
            // Static/class member access: User.Create, Config.DEFAULTS
            PatternRule::new(
                r"\b([A-Z][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)",
                RuleKind::MemberAccess,
            )?,
            // Safe casts in both dialects: x as User
            PatternRule::new(r"\bas\s+([A-Z][A-Za-z0-9_]*)", RuleKind::Symbol)?,
        ];

        let csharp = vec![
            // Typed declarations and parameters, generic or not:
            // User user = ..., Dictionary<UserId, User> map = ..., void F(User u)
            PatternRule::new(
                r"\b([A-Z][A-Za-z0-9_]*)(?:<[^<>]*>)?\s+[a-z_][A-Za-z0-9_]*\s*[=;,)]",
                RuleKind::Symbol,
            )?,
            // Parenthesized casts: (User)obj
            PatternRule::new(r"\(\s*([A-Z][A-Za-z0-9_]*)\s*\)\s*[A-Za-z_(]", RuleKind::Symbol)?,
            // Type tests: obj is User
            PatternRule::new(r"\bis\s+([A-Z][A-Za-z0-9_]*)", RuleKind::Symbol)?,
            // Declarations
            PatternRule::new(
                r"\b(?:class|interface|struct|enum|record)\s+([A-Z][A-Za-z0-9_]*)",
                RuleKind::Symbol,
            )?,
        ];

        let tsjs = vec![
            // Type annotations: let u: User, function f(x: Order): Invoice
            PatternRule::new(r":\s*([A-Z][A-Za-z0-9_]*)", RuleKind::Symbol)?,
            // Type tests: x instanceof User
            PatternRule::new(r"\binstanceof\s+([A-Z][A-Za-z0-9_]*)", RuleKind::Symbol)?,
            // Declarations (type aliases included)
            PatternRule::new(
                r"\b(?:class|interface|enum|type)\s+([A-Z][A-Za-z0-9_]*)",
                RuleKind::Symbol,
            )?,
        ];

        Ok(Self {
            shared,
            csharp,
            tsjs,
        })
    }

    /// Apply the dialect's patterns and return references deduplicated by
    /// `(symbol, member)`, in first-seen order.
    pub fn extract(&self, dialect: SourceDialect, code: &str) -> Vec<SymbolReference> {
        let dialect_rules = match dialect {
            SourceDialect::CSharpLike => &self.csharp,
            SourceDialect::TsJsLike => &self.tsjs,
        };

        let mut seen: HashSet<SymbolReference> = HashSet::new();
        let mut out = Vec::new();
        let mut push = |reference: SymbolReference| {
            if seen.insert(reference.clone()) {
                out.push(reference);
            }
        };

        for rule in self.shared.iter().chain(dialect_rules.iter()) {
            for caps in rule.regex.captures_iter(code) {
                match rule.kind {
                    RuleKind::Symbol => {
                        if let Some(symbol) = caps.get(1) {
                            push(SymbolReference::type_only(symbol.as_str()));
                        }
                    }
                    RuleKind::SymbolList => {
                        if let Some(list) = caps.get(1) {
                            for part in list.as_str().split(',') {
                                let name = part.trim();
                                if !name.is_empty() {
                                    push(SymbolReference::type_only(name));
                                }
                            }
                        }
                    }
                    RuleKind::MemberAccess => {
                        if let (Some(symbol), Some(member)) = (caps.get(1), caps.get(2)) {
                            push(SymbolReference::with_member(
                                symbol.as_str(),
                                member.as_str(),
                            ));
                        }
                    }
                }
            }
        }
        out
    }
}
