//! Prompt texts used by the session, embedded at compile time and gathered in
//! one table that is built once and shared by reference.

use crate::codex::compact::SUMMARIZATION_PROMPT;
use crate::codex::compact::SUMMARY_PREFIX;

const BASE_INSTRUCTIONS: &str = include_str!("../templates/prompt.md");
const GPT_5_CODEX_INSTRUCTIONS: &str = include_str!("../templates/gpt_5_codex_prompt.md");
const GPT_5_1_INSTRUCTIONS: &str = include_str!("../templates/gpt_5_1_prompt.md");
const GPT_5_2_INSTRUCTIONS: &str = include_str!("../templates/gpt_5_2_prompt.md");
const GPT_5_1_CODEX_MAX_INSTRUCTIONS: &str =
    include_str!("../templates/gpt_5_1_codex_max_prompt.md");
const GPT_5_2_CODEX_INSTRUCTIONS: &str = include_str!("../templates/gpt_5_2_codex_prompt.md");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKey {
    BaseInstructions,
    Gpt5CodexInstructions,
    Gpt51Instructions,
    Gpt52Instructions,
    Gpt51CodexMaxInstructions,
    Gpt52CodexInstructions,
    CompactPrompt,
    CompactSummaryPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptCatalog {
    base_instructions: String,
    gpt_5_codex_instructions: String,
    gpt_5_1_instructions: String,
    gpt_5_2_instructions: String,
    gpt_5_1_codex_max_instructions: String,
    gpt_5_2_codex_instructions: String,
    compact_prompt: String,
    summary_prefix: String,
}

impl PromptCatalog {
    /// The prompts shipped with this crate.
    pub fn builtin() -> Self {
        Self {
            base_instructions: BASE_INSTRUCTIONS.to_string(),
            gpt_5_codex_instructions: GPT_5_CODEX_INSTRUCTIONS.to_string(),
            gpt_5_1_instructions: GPT_5_1_INSTRUCTIONS.to_string(),
            gpt_5_2_instructions: GPT_5_2_INSTRUCTIONS.to_string(),
            gpt_5_1_codex_max_instructions: GPT_5_1_CODEX_MAX_INSTRUCTIONS.to_string(),
            gpt_5_2_codex_instructions: GPT_5_2_CODEX_INSTRUCTIONS.to_string(),
            compact_prompt: SUMMARIZATION_PROMPT.to_string(),
            summary_prefix: SUMMARY_PREFIX.to_string(),
        }
    }

    pub fn get(&self, key: PromptKey) -> &str {
        match key {
            PromptKey::BaseInstructions => &self.base_instructions,
            PromptKey::Gpt5CodexInstructions => &self.gpt_5_codex_instructions,
            PromptKey::Gpt51Instructions => &self.gpt_5_1_instructions,
            PromptKey::Gpt52Instructions => &self.gpt_5_2_instructions,
            PromptKey::Gpt51CodexMaxInstructions => &self.gpt_5_1_codex_max_instructions,
            PromptKey::Gpt52CodexInstructions => &self.gpt_5_2_codex_instructions,
            PromptKey::CompactPrompt => &self.compact_prompt,
            PromptKey::CompactSummaryPrefix => &self.summary_prefix,
        }
    }

    /// Replace one entry, e.g. to ship custom base instructions.
    pub fn with_prompt(mut self, key: PromptKey, text: impl Into<String>) -> Self {
        let text = text.into();
        match key {
            PromptKey::BaseInstructions => self.base_instructions = text,
            PromptKey::Gpt5CodexInstructions => self.gpt_5_codex_instructions = text,
            PromptKey::Gpt51Instructions => self.gpt_5_1_instructions = text,
            PromptKey::Gpt52Instructions => self.gpt_5_2_instructions = text,
            PromptKey::Gpt51CodexMaxInstructions => self.gpt_5_1_codex_max_instructions = text,
            PromptKey::Gpt52CodexInstructions => self.gpt_5_2_codex_instructions = text,
            PromptKey::CompactPrompt => self.compact_prompt = text,
            PromptKey::CompactSummaryPrefix => self.summary_prefix = text,
        }
        self
    }

    pub fn compact_prompt(&self) -> &str {
        &self.compact_prompt
    }

    pub fn summary_prefix(&self) -> &str {
        &self.summary_prefix
    }
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
