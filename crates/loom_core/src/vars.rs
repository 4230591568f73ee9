//! Memory variable substitution and merge semantics
//!
//! Block values declare `{{name}}` placeholders filled at create/update
//! time. Tool execution variables carry their own merge rules keyed off
//! the preserve-tool-variables flag.

use std::collections::HashMap;

/// Substitute `{{name}}` placeholders in `template` from `vars`.
///
/// Unknown placeholders are left intact so a later migration (or a human)
/// can still see what was expected. Whitespace inside the braces is
/// tolerated: `{{ name }}` and `{{name}}` are equivalent.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after[..end]);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated opener; emit the remainder verbatim
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Overlay `overrides` onto `base`, with `overrides` winning on conflicts.
///
/// Used when an agent's own stored variables are combined with the
/// migration-level variables before substitution.
pub fn overlay(
    base: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = base.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Apply template-declared tool variable defaults to a live agent's
/// variable map under the preserve-tool-variables contract.
///
/// With `preserve` set, existing keys always win and only keys the live
/// agent lacks are filled from the defaults. Without it, the defaults
/// replace the live map outright.
pub fn apply_tool_variables(
    live: &HashMap<String, String>,
    defaults: &HashMap<String, String>,
    preserve: bool,
) -> HashMap<String, String> {
    if !preserve {
        return defaults.clone();
    }
    let mut merged = live.clone();
    for (key, value) in defaults {
        merged.entry(key.clone()).or_insert_with(|| value.clone());
    }
    merged
}
