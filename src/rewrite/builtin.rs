//! Built-in rule sets, keyed by `<name>-<version>` of the generator they target.

use super::{RewriteRule, RuleSet};
use crate::types::{Error, Result};

/// Placeholder expanded to the configured base type inside replacements.
pub const BASE_TYPE_PLACEHOLDER: &str = "{{base_type}}";

/// Rule set used when none is configured.
pub const DEFAULT_RULE_SET: &str = "swift-protobuf-1.0";

/// Keys of every built-in rule set.
pub const BUILTIN_RULE_SETS: &[&str] = &[DEFAULT_RULE_SET];

/// Look up a built-in rule set by key.
pub fn builtin(key: &str, base_type: &str) -> Result<RuleSet> {
    match key {
        DEFAULT_RULE_SET => swift_protobuf_v1(base_type),
        other => Err(Error::unknown_rule_set(other)),
    }
}

/// Substitute the base type into a replacement, escaping `$` so the type
/// name cannot be read as a capture reference.
pub(crate) fn expand_base_type(replacement: &str, base_type: &str) -> String {
    replacement.replace(BASE_TYPE_PLACEHOLDER, &base_type.replace('$', "$$"))
}

/// Output of swift-protobuf 1.x: value-type messages become reference types
/// deriving from `base_type`.
fn swift_protobuf_v1(base_type: &str) -> Result<RuleSet> {
    // Rules see raw text: comments and string literals are rewritten like code.
    let rules = vec![
        RewriteRule::new(
            "struct-declaration",
            r"\bstruct\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{",
            expand_base_type("class ${1} : {{base_type}} {", base_type),
        )?
        .required(),
        // Declarations with a conformance list, nested or forward references.
        RewriteRule::new("struct-keyword", r"\bstruct\b", "class")?,
        RewriteRule::new("strip-mutating", r"\bmutating[ \t]+", "")?,
        // Starts a line or follows `{`/`;` on the declaration's line. Absorbs
        // existing qualifiers so a second pass is a no-op.
        RewriteRule::new(
            "override-init",
            r"(?m)(^[ \t]*|[{;][ \t]*)(?:public[ \t]+)?(?:override[ \t]+)?init\(\)[ \t]*\{[ \t]*\}",
            "${1}public override init() {}",
        )?
        .required(),
    ];
    RuleSet::new("swift-protobuf", "1.0", rules)
}
