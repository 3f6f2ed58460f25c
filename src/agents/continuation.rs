//! Truncation recovery
//!
//! When a blocking completion stops because of the token budget, up to two
//! follow-up requests ask the model to finish its thought. Follow-ups are
//! sequential and best-effort: their failures are logged and the text gathered
//! so far is returned.

use crate::agents::domain::Message;
use crate::agents::error::UpstreamResult;
use crate::agents::llm::{CompletionRequest, ProviderBackend};

/// Hard cap on extra round-trips per primary call
pub const MAX_CONTINUATIONS: usize = 2;

/// Instruction sent with each follow-up, in order
pub const CONTINUATION_INSTRUCTIONS: [&str; MAX_CONTINUATIONS] = [
    "Please continue and complete your previous response.",
    "Please finish your response.",
];

const MIN_BUDGET: u32 = 50;
const MAX_FIRST_BUDGET: u32 = 500;

/// `clamp(round(original * 0.2), 50, 500)`
pub fn first_continuation_budget(original_max_tokens: u32) -> u32 {
    let scaled = (f64::from(original_max_tokens) * 0.2).round() as u32;
    scaled.clamp(MIN_BUDGET, MAX_FIRST_BUDGET)
}

/// `max(50, round(first * 0.5))`
pub fn second_continuation_budget(first_budget: u32) -> u32 {
    let scaled = (f64::from(first_budget) * 0.5).round() as u32;
    scaled.max(MIN_BUDGET)
}

/// Append continuation text with a single separating space
pub fn merge_continuation(accumulated: &mut String, continuation: &str) {
    if continuation.is_empty() {
        return;
    }
    if !accumulated.is_empty() {
        accumulated.push(' ');
    }
    accumulated.push_str(continuation);
}

/// Run the primary request and, if it was truncated, the continuation rounds.
///
/// Only a failure of the primary request is returned as an error.
pub async fn complete_with_continuation(
    backend: &dyn ProviderBackend,
    messages: Vec<Message>,
    max_tokens: u32,
) -> UpstreamResult<String> {
    let mut conversation = messages;
    let primary = backend
        .complete(&CompletionRequest::new(conversation.clone(), max_tokens))
        .await?;

    let mut text = primary.text.clone();
    if !primary.is_truncated() {
        return Ok(text);
    }

    conversation.push(Message::assistant(primary.text));
    let mut budget = first_continuation_budget(max_tokens);

    for (round, instruction) in CONTINUATION_INSTRUCTIONS.iter().enumerate() {
        conversation.push(Message::user(*instruction));
        tracing::debug!(
            provider = %backend.kind(),
            round = round + 1,
            budget,
            "Response truncated, requesting continuation"
        );

        let continuation = match backend
            .complete(&CompletionRequest::new(conversation.clone(), budget))
            .await
        {
            Ok(continuation) => continuation,
            Err(e) => {
                tracing::warn!(
                    provider = %backend.kind(),
                    round = round + 1,
                    "Continuation failed, keeping partial response: {}",
                    e
                );
                break;
            }
        };

        merge_continuation(&mut text, &continuation.text);

        if !continuation.is_truncated() || budget <= MIN_BUDGET {
            break;
        }

        conversation.push(Message::assistant(continuation.text));
        budget = second_continuation_budget(budget);
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::config::ProviderKind;
    use crate::agents::domain::{Completion, FinishReason};
    use crate::agents::error::UpstreamError;
    use crate::agents::llm::FragmentStream;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted results and records each request
    struct ScriptedBackend {
        responses: Mutex<VecDeque<UpstreamResult<Completion>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<UpstreamResult<Completion>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProviderBackend for ScriptedBackend {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        async fn complete(&self, request: &CompletionRequest) -> UpstreamResult<Completion> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra request")
        }

        fn complete_stream(&self, _request: CompletionRequest) -> FragmentStream {
            unimplemented!()
        }
    }

    fn truncated(text: &str) -> UpstreamResult<Completion> {
        Ok(Completion {
            text: text.to_string(),
            finish_reason: FinishReason::Length,
        })
    }

    fn finished(text: &str) -> UpstreamResult<Completion> {
        Ok(Completion {
            text: text.to_string(),
            finish_reason: FinishReason::Stop,
        })
    }

    fn failure() -> UpstreamResult<Completion> {
        Err(UpstreamError::Status {
            provider: ProviderKind::OpenAi,
            status: 500,
            message: "overloaded".to_string(),
        })
    }

    #[test]
    fn test_first_budget() {
        assert_eq!(first_continuation_budget(2000), 400);
        assert_eq!(first_continuation_budget(100), 50);
        assert_eq!(first_continuation_budget(1024), 205);
        assert_eq!(first_continuation_budget(10_000), 500);
    }

    #[test]
    fn test_second_budget() {
        assert_eq!(second_continuation_budget(400), 200);
        assert_eq!(second_continuation_budget(205), 103);
        assert_eq!(second_continuation_budget(60), 50);
    }

    #[test]
    fn test_merge_continuation() {
        let mut text = "Hello".to_string();
        merge_continuation(&mut text, "world");
        assert_eq!(text, "Hello world");
        merge_continuation(&mut text, "");
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn test_no_continuation_when_not_truncated() {
        let backend = ScriptedBackend::new(vec![finished("All done.")]);
        let text = complete_with_continuation(&backend, vec![Message::user("q")], 1024)
            .await
            .unwrap();
        assert_eq!(text, "All done.");
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_single_continuation() {
        let backend = ScriptedBackend::new(vec![truncated("The answer is"), finished("forty-two.")]);
        let text = complete_with_continuation(&backend, vec![Message::user("q")], 2000)
            .await
            .unwrap();
        assert_eq!(text, "The answer is forty-two.");

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].max_tokens, 400);
        assert_eq!(
            requests[1].messages,
            vec![
                Message::user("q"),
                Message::assistant("The answer is"),
                Message::user(CONTINUATION_INSTRUCTIONS[0]),
            ]
        );
    }

    #[tokio::test]
    async fn test_two_continuations_then_stop() {
        let backend = ScriptedBackend::new(vec![truncated("a"), truncated("b"), truncated("c")]);
        let text = complete_with_continuation(&backend, vec![Message::user("q")], 2000)
            .await
            .unwrap();
        assert_eq!(text, "a b c");

        let requests = backend.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].max_tokens, 200);
        assert_eq!(
            requests[2].messages.last(),
            Some(&Message::user(CONTINUATION_INSTRUCTIONS[1]))
        );
        assert_eq!(requests[2].messages[3], Message::assistant("b"));
    }

    #[tokio::test]
    async fn test_no_second_round_at_minimum_budget() {
        let backend = ScriptedBackend::new(vec![truncated("a"), truncated("b")]);
        let text = complete_with_continuation(&backend, vec![Message::user("q")], 100)
            .await
            .unwrap();
        assert_eq!(text, "a b");
        assert_eq!(backend.requests().len(), 2);
        assert_eq!(backend.requests()[1].max_tokens, 50);
    }

    #[tokio::test]
    async fn test_continuation_failure_is_swallowed() {
        let backend = ScriptedBackend::new(vec![truncated("partial"), failure()]);
        let text = complete_with_continuation(&backend, vec![Message::user("q")], 1024)
            .await
            .unwrap();
        assert_eq!(text, "partial");
    }

    #[tokio::test]
    async fn test_second_continuation_failure_keeps_first() {
        let backend = ScriptedBackend::new(vec![truncated("a"), truncated("b"), failure()]);
        let text = complete_with_continuation(&backend, vec![Message::user("q")], 2000)
            .await
            .unwrap();
        assert_eq!(text, "a b");
    }

    #[tokio::test]
    async fn test_primary_failure_propagates() {
        let backend = ScriptedBackend::new(vec![failure()]);
        let err = complete_with_continuation(&backend, vec![Message::user("q")], 1024)
            .await
            .unwrap_err();
        assert_eq!(err.message(), "overloaded");
    }
}
