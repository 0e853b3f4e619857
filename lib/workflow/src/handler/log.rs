use crate::context::VariableContext;
use crate::execution::StepOutcome;
use crate::step::LogConfig;
use crate::template::expand;
use tracing::info;

pub(super) fn record(config: &LogConfig, ctx: &VariableContext) -> StepOutcome {
    let message = expand(&config.message, ctx);
    info!(message = %message, "workflow log step");
    StepOutcome::success(message)
}
