//! Natural-language change summaries.
//!
//! The language model is opaque: text in, text out. [`ChangeSummarizer`]
//! decides when a call is worth making, builds the prompt, and fails closed
//! to a fixed sentinel so a model outage never blocks persistence.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::diff::NO_BASELINE;
use crate::error::ModelResult;

pub mod openai;

pub use openai::OpenAIModel;

pub const NO_SIGNIFICANT_CHANGES: &str = "No significant changes detected.";

pub const ANALYSIS_FAILED: &str = "LLM analysis failed.";

const SYSTEM_PROMPT: &str = "You are an expert in A/B testing and website analytics.";

/// A text-generation backend (to allow mocking).
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// One request/response exchange: a fixed persona plus a user prompt.
    async fn complete(&self, system: &str, user: &str) -> ModelResult<String>;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for &T {
    async fn complete(&self, system: &str, user: &str) -> ModelResult<String> {
        (**self).complete(system, user).await
    }
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Box<T> {
    async fn complete(&self, system: &str, user: &str) -> ModelResult<String> {
        (**self).complete(system, user).await
    }
}

/// Turns diff text into an A/B-testing oriented description.
pub struct ChangeSummarizer<M> {
    model: M,
}

impl<M: LanguageModel> ChangeSummarizer<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Describe the change in `diff_text`. Never fails: trivial input gets
    /// [`NO_SIGNIFICANT_CHANGES`] without a model call, and model errors
    /// become [`ANALYSIS_FAILED`].
    pub async fn summarize(&self, diff_text: &str) -> String {
        if diff_text.trim().is_empty() || diff_text.starts_with(NO_BASELINE) {
            return NO_SIGNIFICANT_CHANGES.to_string();
        }

        let prompt = format_change_prompt(diff_text);
        match self.model.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(analysis) => {
                debug!(chars = analysis.len(), "Change summary generated");
                analysis
            }
            Err(e) => {
                warn!(error = %e, "Change summary failed");
                ANALYSIS_FAILED.to_string()
            }
        }
    }
}

/// User prompt framing a diff as the output of an A/B test.
pub fn format_change_prompt(diff_text: &str) -> String {
    format!(
        "Below are the HTML differences detected between two snapshots:\n\n\
         {diff_text}\n\n\
         Please describe what elements changed and describe them from a UI A/B Testing perspective. \
         Based on the HTML differences, I'd like to know what A/B testing strategies were done \
         (i.e variations in banners, buttons, or CTAs). \
         If there are no significant differences, just say 'No major changes detected'"
    )
}
