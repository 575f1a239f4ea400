//! Test doubles for provider crates.

use crate::{Prompter, ProviderEnv, ProviderError, ProviderResult, SamlResolver};
use async_trait::async_trait;
use broker_config_and_utils::Config;
use broker_http::{HttpClient, MockTransport};
use broker_storage::MemoryStorage;
use callback_relay::RecordingBrowser;
use parking_lot::Mutex;
use saml_assertion::SamlAssertion;
use std::collections::VecDeque;
use std::sync::Arc;

/// Answers prompts from queued values and records what was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    choices: Mutex<VecDeque<usize>>,
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    statuses: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_choice(self, choice: usize) -> Self {
        self.choices.lock().push_back(choice);
        self
    }

    /// Queue an answer for the next `text` or `secret` prompt.
    pub fn with_answer(self, answer: &str) -> Self {
        self.answers.lock().push_back(answer.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().clone()
    }

    fn answer(&self, prompt: &str) -> ProviderResult<String> {
        self.prompts.lock().push(prompt.to_string());
        self.answers
            .lock()
            .pop_front()
            .ok_or_else(|| ProviderError::Prompt(format!("no scripted answer for '{}'", prompt)))
    }
}

impl Prompter for ScriptedPrompter {
    fn choose(&self, title: &str, _columns: &[&str], _rows: &[Vec<String>]) -> ProviderResult<usize> {
        self.prompts.lock().push(title.to_string());
        self.choices
            .lock()
            .pop_front()
            .ok_or_else(|| ProviderError::Prompt(format!("no scripted choice for '{}'", title)))
    }

    fn text(&self, prompt: &str) -> ProviderResult<String> {
        self.answer(prompt)
    }

    fn secret(&self, prompt: &str) -> ProviderResult<String> {
        self.answer(prompt)
    }

    fn status(&self, message: &str) {
        self.statuses.lock().push(message.to_string());
    }
}

/// A provider environment backed entirely by in-memory doubles.
pub struct TestEnv {
    pub env: ProviderEnv,
    pub storage: Arc<MemoryStorage>,
    pub http: Arc<MockTransport>,
    pub prompter: Arc<ScriptedPrompter>,
    pub browser: Arc<RecordingBrowser>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_prompter(ScriptedPrompter::new())
    }

    pub fn with_prompter(prompter: ScriptedPrompter) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let http = Arc::new(MockTransport::new());
        let prompter = Arc::new(prompter);
        let browser = Arc::new(RecordingBrowser::new());

        let config = Config {
            mfa_poll_interval_ms: 1,
            device_auth_timeout_secs: 5,
            relay_timeout_secs: 5,
            ..Config::default()
        };

        let env = ProviderEnv {
            config,
            storage: storage.clone(),
            http: HttpClient::new(http.clone()),
            prompter: prompter.clone(),
            browser: browser.clone(),
        };

        Self {
            env,
            storage,
            http,
            prompter,
            browser,
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves every URL to the same assertion, or to an unhandled-URL error.
pub struct FixedResolver {
    assertion: Option<SamlAssertion>,
    calls: Mutex<Vec<String>>,
}

impl FixedResolver {
    pub fn new(assertion: SamlAssertion) -> Self {
        Self {
            assertion: Some(assertion),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unhandled() -> Self {
        Self {
            assertion: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SamlResolver for FixedResolver {
    async fn resolve_saml(&self, url: &str) -> ProviderResult<SamlAssertion> {
        self.calls.lock().push(url.to_string());
        self.assertion
            .clone()
            .ok_or_else(|| ProviderError::UnhandledUrl(url.to_string()))
    }
}
