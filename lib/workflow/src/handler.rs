//! Step handlers.
//!
//! One handler per step kind. A handler reads its typed configuration and the
//! live variable context, may write derived keys back into the context, calls
//! out through the [`Services`] it needs, and reports a [`StepOutcome`].
//!
//! Transport problems are outcomes (`FAILED`), not errors. A [`StepError`] is
//! reserved for steps that cannot be executed at all.

mod ai_agent;
mod condition;
mod email;
mod log;
mod notify;
mod wait;

use crate::context::VariableContext;
use crate::error::StepError;
use crate::execution::StepOutcome;
use crate::step::{Step, StepAction};
use nurture_ai::AiResponder;
use nurture_integration::{ChatPoster, HttpCaller, MailSender, MessageChannel, MessageSender};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Context key written by a sentiment AI step.
pub const AI_SENTIMENT_KEY: &str = "ai_sentiment";
/// Context key written by a generation AI step.
pub const AI_RESPONSE_KEY: &str = "ai_response";

/// The external collaborators handlers call through.
#[derive(Clone)]
pub struct Services {
    pub mail: Arc<dyn MailSender>,
    pub chat: Arc<dyn ChatPoster>,
    pub http: Arc<dyn HttpCaller>,
    pub messaging: Arc<dyn MessageSender>,
    pub ai: Arc<dyn AiResponder>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

/// Dispatch table from step kind to handler.
#[derive(Debug, Clone)]
pub struct StepHandlers {
    services: Services,
    wait_threshold: Duration,
}

impl StepHandlers {
    /// Creates the table. Waits shorter than `wait_threshold` block in place.
    #[must_use]
    pub fn new(services: Services, wait_threshold: Duration) -> Self {
        Self {
            services,
            wait_threshold,
        }
    }

    #[must_use]
    pub fn wait_threshold(&self) -> Duration {
        self.wait_threshold
    }

    /// Executes one step against the context.
    ///
    /// # Errors
    ///
    /// Returns a [`StepError`] when the step's configuration cannot be
    /// executed.
    #[instrument(skip_all, fields(kind = %step.kind()))]
    pub async fn execute(
        &self,
        step: &Step,
        ctx: &mut VariableContext,
    ) -> Result<StepOutcome, StepError> {
        let outcome = match &step.action {
            StepAction::Email(config) => email::send(self.services.mail.as_ref(), config, ctx).await,
            StepAction::Wait => wait::pause(step.delay.unwrap_or(0), self.wait_threshold).await,
            StepAction::Log(config) => log::record(config, ctx),
            StepAction::Condition(config) => condition::evaluate(config, ctx)?,
            StepAction::AiAgent(config) => {
                ai_agent::run(self.services.ai.as_ref(), config, ctx).await
            }
            StepAction::Slack(config) => {
                notify::slack(self.services.chat.as_ref(), config, ctx).await
            }
            StepAction::Http(config) => notify::http(self.services.http.as_ref(), config, ctx).await,
            StepAction::Sms(config) => {
                notify::message(
                    self.services.messaging.as_ref(),
                    MessageChannel::Sms,
                    config,
                    ctx,
                )
                .await
            }
            StepAction::Whatsapp(config) => {
                notify::message(
                    self.services.messaging.as_ref(),
                    MessageChannel::Whatsapp,
                    config,
                    ctx,
                )
                .await
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::StepStatus;
    use crate::mock::MockServices;
    use crate::step::ConditionOperator;
    use nurture_ai::AiTask;
    use serde_json::json;

    fn context() -> VariableContext {
        VariableContext::from_payload(json!({"name": "Ana", "email": "a@x.com"}))
            .expect("object")
    }

    #[tokio::test]
    async fn dispatches_by_kind() {
        let mocks = MockServices::new();
        let handlers = StepHandlers::new(mocks.services(), Duration::from_secs(10));
        let mut ctx = context();

        let outcome = handlers
            .execute(&Step::email("Hi {{name}}", "Hello"), &mut ctx)
            .await
            .expect("email");
        assert_eq!(outcome.status, StepStatus::Success);
        assert_eq!(mocks.mail.sent().await.len(), 1);

        let outcome = handlers
            .execute(&Step::log("seen {{name}}"), &mut ctx)
            .await
            .expect("log");
        assert_eq!(outcome.status, StepStatus::Success);
        assert_eq!(outcome.detail, "seen Ana");
    }

    #[tokio::test]
    async fn condition_without_variable_is_an_error() {
        let handlers = StepHandlers::new(MockServices::new().services(), Duration::from_secs(10));
        let err = handlers
            .execute(
                &Step::condition("", ConditionOperator::Equals, "x"),
                &mut context(),
            )
            .await
            .expect_err("invalid config");
        assert!(matches!(err, StepError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn ai_output_feeds_later_steps() {
        let mocks = MockServices::new().with_ai_answer("Positive!");
        let handlers = StepHandlers::new(mocks.services(), Duration::from_secs(10));
        let mut ctx = context();

        handlers
            .execute(&Step::ai_agent(AiTask::Sentiment, "{{message}}"), &mut ctx)
            .await
            .expect("ai");
        handlers
            .execute(&Step::email("Mood", "You seem {{ai_sentiment}}"), &mut ctx)
            .await
            .expect("email");

        let sent = mocks.mail.sent().await;
        assert_eq!(sent[0].html, "You seem positive");
    }
}
