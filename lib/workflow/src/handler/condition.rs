use crate::context::VariableContext;
use crate::error::StepError;
use crate::execution::StepOutcome;
use crate::step::{ConditionConfig, StepKind};

/// Compares a context variable against the configured literal.
///
/// A missing variable compares as the empty string.
pub(super) fn evaluate(
    config: &ConditionConfig,
    ctx: &VariableContext,
) -> Result<StepOutcome, StepError> {
    if config.variable.trim().is_empty() {
        return Err(StepError::InvalidConfig {
            kind: StepKind::Condition,
            reason: "no variable to compare".to_string(),
        });
    }

    let actual = ctx.get_text(&config.variable).unwrap_or_default();
    let held = config.operator.evaluate(&actual, &config.value);
    let branch = if held {
        config.true_label.as_deref()
    } else {
        config.false_label.as_deref()
    };
    let mut detail = format!(
        "{} ({actual:?}) {} {:?}: {held}",
        config.variable, config.operator, config.value
    );
    if let Some(label) = branch {
        detail.push_str(&format!(" -> {label}"));
    }
    Ok(StepOutcome::condition(held, detail))
}
