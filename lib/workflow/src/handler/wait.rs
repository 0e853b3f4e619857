use crate::execution::StepOutcome;
use std::time::Duration;

/// Short waits block the run; long ones are acknowledged as `QUEUED`.
pub(super) async fn pause(delay_secs: u64, threshold: Duration) -> StepOutcome {
    let delay = Duration::from_secs(delay_secs);
    if delay >= threshold {
        return StepOutcome::queued(format!("wait of {delay_secs}s queued"));
    }
    tokio::time::sleep(delay).await;
    StepOutcome::success(format!("waited {delay_secs}s"))
}
