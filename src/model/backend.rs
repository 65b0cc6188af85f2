//! Model backend trait and shared request types.
//!
//! The [`ModelBackend`] trait is the single seam between the workflow and the
//! generative model. Structured outputs (component lists, headers) are
//! requested as JSON in the prompt and parsed by the caller, so the backend
//! only ever returns free text.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("API key not set (expected environment variable {0})")]
    MissingApiKey(String),
}

/// One model call: a system prompt plus a single user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Trait for generative model backends.
///
/// `Sync` because pipelines call the same backend from rayon workers.
pub trait ModelBackend: Sync {
    /// Send one request and return the model's text reply.
    fn complete(&self, request: &ModelRequest) -> Result<String, ModelError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock backend that replies from a script and records every request.
    ///
    /// Replies are matched by the first rule whose needle occurs in the user
    /// message; each rule holds a queue so repeated calls can get different
    /// answers. Uses Mutex (not RefCell) so it is Sync and works with rayon.
    #[derive(Default)]
    pub struct MockModel {
        rules: Mutex<Vec<(String, VecDeque<Result<String, String>>)>>,
        pub requests: Mutex<Vec<ModelRequest>>,
    }

    impl MockModel {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a reply for requests whose user message contains `needle`.
        pub fn reply(self, needle: &str, text: &str) -> Self {
            self.push(needle, Ok(text.to_string()));
            self
        }

        /// Queue a failure for requests whose user message contains `needle`.
        pub fn fail(self, needle: &str, message: &str) -> Self {
            self.push(needle, Err(message.to_string()));
            self
        }

        fn push(&self, needle: &str, outcome: Result<String, String>) {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|(n, _)| n == needle) {
                Some((_, queue)) => queue.push_back(outcome),
                None => rules.push((needle.to_string(), VecDeque::from([outcome]))),
            }
        }

        pub fn get_requests(&self) -> Vec<ModelRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn count_matching(&self, needle: &str) -> usize {
            self.get_requests()
                .iter()
                .filter(|r| r.user.contains(needle))
                .count()
        }
    }

    impl ModelBackend for MockModel {
        fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
            self.requests.lock().unwrap().push(request.clone());

            let mut rules = self.rules.lock().unwrap();
            let (_, queue) = rules
                .iter_mut()
                .find(|(needle, _)| request.user.contains(needle.as_str()))
                .ok_or_else(|| {
                    ModelError::MalformedResponse(format!(
                        "no scripted reply for: {}",
                        request.user
                    ))
                })?;

            // The last queued reply repeats once the queue drains.
            let outcome = if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            };
            outcome.map_err(|message| ModelError::Api {
                status: 500,
                message,
            })
        }
    }

    fn request(user: &str) -> ModelRequest {
        ModelRequest {
            system: "sys".into(),
            user: user.into(),
            max_tokens: 16,
            temperature: 0.0,
        }
    }

    #[test]
    fn mock_replies_in_order_then_repeats() {
        let model = MockModel::new().reply("code", "one").reply("code", "two");

        assert_eq!(model.complete(&request("code please")).unwrap(), "one");
        assert_eq!(model.complete(&request("code please")).unwrap(), "two");
        assert_eq!(model.complete(&request("code please")).unwrap(), "two");
        assert_eq!(model.get_requests().len(), 3);
    }

    #[test]
    fn mock_without_rule_errors() {
        let model = MockModel::new();
        assert!(matches!(
            model.complete(&request("anything")),
            Err(ModelError::MalformedResponse(_))
        ));
    }

    #[test]
    fn mock_scripted_failure() {
        let model = MockModel::new().fail("plan", "overloaded");
        let err = model.complete(&request("plan this")).unwrap_err();
        assert!(err.to_string().contains("overloaded"));
    }
}
