use crate::context::VariableContext;
use crate::execution::StepOutcome;
use crate::step::EmailConfig;
use crate::template::expand;
use nurture_integration::MailSender;
use tracing::{debug, warn};

pub(super) async fn send(
    mail: &dyn MailSender,
    config: &EmailConfig,
    ctx: &VariableContext,
) -> StepOutcome {
    let Some(to) = ctx.non_blank("email") else {
        return StepOutcome::skipped("no email address in context");
    };
    let subject = expand(&config.subject, ctx);
    let html = expand(&config.body, ctx);

    match mail.send(&to, &subject, &html).await {
        Ok(result) if result.success => {
            debug!(to = %to, id = ?result.id, "email sent");
            StepOutcome::success(format!("sent \"{subject}\" to {to}"))
        }
        Ok(result) => StepOutcome::failed(format!(
            "mail provider refused message: {}",
            result.error.unwrap_or_default()
        )),
        Err(report) => {
            warn!(to = %to, error = %report, "email delivery failed");
            StepOutcome::failed(format!("mail delivery failed: {report}"))
        }
    }
}
