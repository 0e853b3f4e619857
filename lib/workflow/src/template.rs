//! `{{key}}` template expansion.

use crate::context::VariableContext;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Replaces every `{{key}}` with the context's text for `key`.
///
/// Missing keys render as the empty string. Text without placeholders is
/// returned unchanged.
#[must_use]
pub fn expand(template: &str, context: &VariableContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            context.get_text(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> VariableContext {
        [("name", "Ana"), ("email", "a@x.com")].into_iter().collect()
    }

    #[test]
    fn substitutes_known_keys() {
        assert_eq!(expand("Hi {{name}}", &ctx()), "Hi Ana");
        assert_eq!(expand("{{ name }} <{{email}}>", &ctx()), "Ana <a@x.com>");
    }

    #[test]
    fn missing_keys_render_empty() {
        assert_eq!(expand("Hi {{company}}!", &ctx()), "Hi !");
    }

    #[test]
    fn text_without_tokens_is_unchanged() {
        let plain = "No tokens here, just {braces} and }} stray {{";
        let once = expand(plain, &ctx());
        assert_eq!(once, plain);
        assert_eq!(expand(&once, &ctx()), once);
    }

    #[test]
    fn non_string_values_render_as_json() {
        let mut ctx = ctx();
        ctx.insert("score", 0.75);
        assert_eq!(expand("score={{score}}", &ctx), "score=0.75");
    }
}
