use super::{AI_RESPONSE_KEY, AI_SENTIMENT_KEY};
use crate::context::VariableContext;
use crate::execution::StepOutcome;
use crate::step::AiAgentConfig;
use crate::template::expand;
use nurture_ai::{AiResponder, AiTask};
use tracing::warn;

/// Asks the responder and stores the answer for later steps.
pub(super) async fn run(
    ai: &dyn AiResponder,
    config: &AiAgentConfig,
    ctx: &mut VariableContext,
) -> StepOutcome {
    let prompt = expand(&config.prompt, ctx);
    match ai.generate(&prompt, &ctx.to_json(), config.task).await {
        Ok(answer) => {
            let key = match config.task {
                AiTask::Sentiment => AI_SENTIMENT_KEY,
                AiTask::Generation => AI_RESPONSE_KEY,
            };
            let detail = format!("{key} = {}", answer.result);
            ctx.insert(key, answer.result);
            StepOutcome::success(detail)
        }
        Err(report) => {
            warn!(task = ?config.task, error = %report, "AI step failed");
            StepOutcome::failed(format!("AI service failed: {report}"))
        }
    }
}
