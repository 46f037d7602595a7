//! Model call and outcome classification for one admission.
//!
//! The generator never persists: it turns a prompt into a
//! [`GeneratedLetter`] whose outcome says what happened.

use std::sync::Arc;
use std::time::Instant;

use super::validation::{validate_letter, ValidationPolicy};
use super::{ChatRequest, LlmClient, LlmError};
use crate::departments::PromptTemplate;
use crate::models::enums::{Environment, LetterOutcome};
use crate::models::GeneratedLetter;
use crate::pipeline::prompt::{LengthError, Prompt};

/// How a prompt is turned into model output. Only single-shot exists today;
/// chunked generation for very long stays would be a second implementation.
pub trait GenerationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, client: &dyn LlmClient, prompt: &Prompt, temperature: f32) -> Result<String, LlmError>;
}

/// One call with the whole patient file.
pub struct SingleShot;

impl GenerationStrategy for SingleShot {
    fn name(&self) -> &'static str {
        "single_shot"
    }

    fn run(&self, client: &dyn LlmClient, prompt: &Prompt, temperature: f32) -> Result<String, LlmError> {
        client.complete(&ChatRequest {
            system: &prompt.system_prompt,
            user: &prompt.user_prompt,
            temperature,
            json_response: true,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub policy: ValidationPolicy,
}

pub struct LetterGenerator {
    client: Arc<dyn LlmClient>,
    strategy: Box<dyn GenerationStrategy>,
    settings: GenerationSettings,
}

impl LetterGenerator {
    pub fn new(client: Arc<dyn LlmClient>, settings: GenerationSettings) -> Self {
        Self::with_strategy(client, Box::new(SingleShot), settings)
    }

    pub fn with_strategy(
        client: Arc<dyn LlmClient>,
        strategy: Box<dyn GenerationStrategy>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            client,
            strategy,
            settings,
        }
    }

    pub fn generate(
        &self,
        admission_id: &str,
        prompt: &Prompt,
        template: &PromptTemplate,
        environment: Environment,
    ) -> GeneratedLetter {
        let started = Instant::now();
        let mut letter = GeneratedLetter::new(admission_id, template.code(), environment, LetterOutcome::ModelError);
        letter.input_tokens = Some(prompt.token_count);

        match self.strategy.run(self.client.as_ref(), prompt, self.settings.temperature) {
            Err(e) => {
                letter.error_detail = Some(e.to_string());
            }
            Ok(raw) => {
                match validate_letter(&raw, template.categories(), &self.settings.policy) {
                    Ok(sections) => {
                        letter.outcome = LetterOutcome::Success;
                        letter.sections = sections;
                    }
                    Err(e) => {
                        letter.outcome = LetterOutcome::ValidationError;
                        letter.error_detail = Some(e.to_string());
                    }
                }
                letter.raw_response = Some(raw);
            }
        }

        tracing::info!(
            admission_id,
            department = template.code(),
            deployment = self.client.deployment(),
            strategy = self.strategy.name(),
            input_tokens = prompt.token_count,
            outcome = %letter.outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Letter generation finished"
        );
        letter
    }

    /// Letter recorded when the prompt never reached the model.
    pub fn length_rejected(
        admission_id: &str,
        template: &PromptTemplate,
        environment: Environment,
        error: &LengthError,
    ) -> GeneratedLetter {
        let mut letter = GeneratedLetter::new(admission_id, template.code(), environment, LetterOutcome::LengthError);
        letter.input_tokens = Some(error.tokens);
        letter.error_detail = Some(error.to_string());
        letter
    }
}
