//! The responder contract and task prompts.

use crate::error::AiError;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// What the AI step is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AiTask {
    /// Classify sentiment into `positive`, `neutral` or `negative`.
    Sentiment,
    /// Produce free-form text.
    Generation,
}

impl AiTask {
    /// System prompt sent ahead of the step's own prompt.
    #[must_use]
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Sentiment => {
                "You classify the sentiment of a customer's message. \
                 Answer with exactly one word: positive, neutral or negative."
            }
            Self::Generation => {
                "You are a marketing assistant writing on behalf of a small business. \
                 Be concise and friendly. Reply with the text only."
            }
        }
    }

    /// Normalises raw model output for this task.
    ///
    /// Sentiment answers are reduced to the bare lowercase label when the
    /// model wraps it in punctuation or prose. A leading label wins; otherwise
    /// the one label the answer affirms. Negated labels ("not positive") do
    /// not count, and an answer affirming several labels is left as is.
    #[must_use]
    pub fn normalise(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self {
            Self::Generation => trimmed.to_string(),
            Self::Sentiment => {
                let lower = trimmed.to_lowercase();
                sentiment_label(&lower).map_or(lower, str::to_string)
            }
        }
    }
}

const SENTIMENT_LABELS: [&str; 3] = ["positive", "neutral", "negative"];
const NEGATIONS: [&str; 4] = ["not", "no", "isn't", "never"];

fn sentiment_label(answer: &str) -> Option<&'static str> {
    let words: Vec<&str> = answer
        .split(|c: char| !(c.is_alphabetic() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();
    let label_of = |word: &str| SENTIMENT_LABELS.into_iter().find(|label| *label == word);

    if let Some(label) = words.first().and_then(|w| label_of(w)) {
        return Some(label);
    }

    let mut affirmed: Vec<&'static str> = Vec::new();
    for (i, word) in words.iter().enumerate() {
        let Some(label) = label_of(word) else {
            continue;
        };
        let negated = i > 0 && NEGATIONS.iter().any(|n| *n == words[i - 1]);
        if !negated && !affirmed.contains(&label) {
            affirmed.push(label);
        }
    }
    match affirmed.as_slice() {
        [label] => Some(*label),
        _ => None,
    }
}

/// Output of an AI call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiResult {
    /// The normalised answer.
    pub result: String,
}

/// Generates text for a workflow step.
#[async_trait]
pub trait AiResponder: Send + Sync {
    /// Runs `task` with the step's prompt and the run's variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or yields nothing usable.
    async fn generate(
        &self,
        prompt: &str,
        context: &JsonValue,
        task: AiTask,
    ) -> Result<AiResult, Report<AiError>>;
}

/// Renders the user message: the step prompt followed by the run variables.
#[must_use]
pub fn user_message(prompt: &str, context: &JsonValue) -> String {
    let variables = serde_json::to_string_pretty(context).unwrap_or_default();
    if prompt.trim().is_empty() {
        format!("Contact data:\n{variables}")
    } else {
        format!("{prompt}\n\nContact data:\n{variables}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_serde_uses_screaming_case() {
        let json = serde_json::to_string(&AiTask::Sentiment).expect("serialize");
        assert_eq!(json, "\"SENTIMENT\"");
        let parsed: AiTask = serde_json::from_str("\"GENERATION\"").expect("deserialize");
        assert_eq!(parsed, AiTask::Generation);
    }

    #[test]
    fn sentiment_output_is_reduced_to_label() {
        assert_eq!(AiTask::Sentiment.normalise(" Positive.\n"), "positive");
        assert_eq!(
            AiTask::Sentiment.normalise("The sentiment is NEGATIVE"),
            "negative"
        );
        assert_eq!(AiTask::Sentiment.normalise("unclear"), "unclear");
    }

    #[test]
    fn negated_sentiment_labels_are_ignored() {
        assert_eq!(
            AiTask::Sentiment.normalise("not positive, rather negative"),
            "negative"
        );
        assert_eq!(
            AiTask::Sentiment.normalise("Negative, definitely not positive."),
            "negative"
        );
        assert_eq!(
            AiTask::Sentiment.normalise("It is not negative"),
            "it is not negative"
        );
    }

    #[test]
    fn mixed_sentiment_is_left_unclassified() {
        assert_eq!(
            AiTask::Sentiment.normalise("partly positive, partly negative"),
            "partly positive, partly negative"
        );
    }

    #[test]
    fn generation_output_is_trimmed_only() {
        assert_eq!(
            AiTask::Generation.normalise("  Hello Ana, thanks!  "),
            "Hello Ana, thanks!"
        );
    }

    #[test]
    fn user_message_appends_variables() {
        let msg = user_message("Reply kindly", &serde_json::json!({"name": "Ana"}));
        assert!(msg.starts_with("Reply kindly"));
        assert!(msg.contains("\"name\": \"Ana\""));
    }
}
