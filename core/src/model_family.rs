use serde::Deserialize;
use serde::Serialize;

use crate::prompts::PromptCatalog;
use crate::prompts::PromptKey;
use crate::truncate::TruncationPolicy;

const CONTEXT_WINDOW_272K: i64 = 272_000;

/// How the apply_patch tool is presented to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyPatchToolType {
    /// JSON function taking a single `input` string.
    Function,
    /// Custom tool constrained by a lark grammar.
    Freeform,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigShellToolType {
    Disabled,
    #[default]
    Default,
    Local,
    ShellCommand,
    UnifiedExec,
}

/// A model family is a group of models that share certain characteristics.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFamily {
    /// The full model slug used to derive this model family, e.g.
    /// "gpt-4.1-2025-04-14".
    pub slug: String,

    /// The model family name, e.g. "gpt-4.1".
    pub family: String,

    /// True if the model needs additional instructions on how to use the
    /// "virtual" `apply_patch` CLI.
    pub needs_special_apply_patch_instructions: bool,

    pub context_window: Option<i64>,

    /// Explicit auto-compaction threshold; see [`Self::auto_compact_token_limit`].
    pub auto_compact_token_limit: Option<i64>,

    pub supports_reasoning_summaries: bool,

    pub supports_parallel_tool_calls: bool,

    /// Present if the model performs better when `apply_patch` is provided as
    /// a tool call instead of just a bash command.
    pub apply_patch_tool_type: Option<ApplyPatchToolType>,

    pub base_instructions: String,

    pub experimental_supported_tools: Vec<String>,

    /// Share of the context window usable for input, in percent.
    pub effective_context_window_percent: i64,

    pub shell_type: ConfigShellToolType,

    pub truncation_policy: TruncationPolicy,
}

impl ModelFamily {
    fn base(slug: &str, family: &str, prompts: &PromptCatalog) -> Self {
        Self {
            slug: slug.to_string(),
            family: family.to_string(),
            needs_special_apply_patch_instructions: false,
            context_window: Some(CONTEXT_WINDOW_272K),
            auto_compact_token_limit: None,
            supports_reasoning_summaries: false,
            supports_parallel_tool_calls: false,
            apply_patch_tool_type: None,
            base_instructions: prompts.get(PromptKey::BaseInstructions).to_string(),
            experimental_supported_tools: Vec::new(),
            effective_context_window_percent: 95,
            shell_type: ConfigShellToolType::Default,
            truncation_policy: TruncationPolicy::Bytes(10_000),
        }
    }

    fn codex(slug: &str, instructions: PromptKey, prompts: &PromptCatalog) -> Self {
        Self {
            supports_reasoning_summaries: true,
            apply_patch_tool_type: Some(ApplyPatchToolType::Freeform),
            base_instructions: prompts.get(instructions).to_string(),
            experimental_supported_tools: vec![
                "grep_files".to_string(),
                "list_dir".to_string(),
                "read_file".to_string(),
            ],
            shell_type: ConfigShellToolType::ShellCommand,
            supports_parallel_tool_calls: true,
            truncation_policy: TruncationPolicy::Tokens(10_000),
            ..Self::base(slug, slug, prompts)
        }
    }

    /// Context window available for input, computed on read.
    pub fn effective_context_window(&self) -> Option<i64> {
        self.context_window
            .map(|window| window * self.effective_context_window_percent / 100)
    }

    /// Token count past which a host should compact: the explicit limit, or
    /// 90% of the context window.
    pub fn auto_compact_token_limit(&self) -> Option<i64> {
        self.auto_compact_token_limit
            .or_else(|| self.context_window.map(|window| window * 9 / 10))
    }
}

macro_rules! model_family {
    (
        $slug:expr, $family:expr, $prompts:expr $(, $key:ident : $value:expr )* $(,)?
    ) => {{
        #[allow(unused_mut)]
        let mut mf = ModelFamily::base($slug, $family, $prompts);
        $(
            mf.$key = $value;
        )*
        mf
    }};
}

/// Returns the `ModelFamily` for `slug`. Prefixes are matched in order and
/// without regard to case; unknown slugs get the base family.
pub fn find_family_for_model(slug: &str, prompts: &PromptCatalog) -> ModelFamily {
    let lower = slug.to_ascii_lowercase();
    let starts = |prefix: &str| lower.starts_with(prefix);

    if starts("o3") {
        model_family!(
            slug, "o3", prompts,
            supports_reasoning_summaries: true,
            needs_special_apply_patch_instructions: true,
            context_window: Some(200_000),
        )
    } else if starts("o4-mini") {
        model_family!(
            slug, "o4-mini", prompts,
            supports_reasoning_summaries: true,
            needs_special_apply_patch_instructions: true,
            context_window: Some(200_000),
        )
    } else if starts("codex-mini-latest") {
        model_family!(
            slug, "codex-mini-latest", prompts,
            supports_reasoning_summaries: true,
            needs_special_apply_patch_instructions: true,
            shell_type: ConfigShellToolType::Local,
            context_window: Some(200_000),
        )
    } else if starts("gpt-4.1") {
        model_family!(
            slug, "gpt-4.1", prompts,
            needs_special_apply_patch_instructions: true,
            context_window: Some(1_047_576),
        )
    } else if starts("gpt-oss") || starts("openai/gpt-oss") {
        model_family!(
            slug, "gpt-oss", prompts,
            apply_patch_tool_type: Some(ApplyPatchToolType::Function),
            context_window: Some(96_000),
        )
    } else if starts("gpt-4o") {
        model_family!(
            slug, "gpt-4o", prompts,
            needs_special_apply_patch_instructions: true,
            context_window: Some(128_000),
        )
    } else if starts("gpt-3.5") {
        model_family!(
            slug, "gpt-3.5", prompts,
            needs_special_apply_patch_instructions: true,
            context_window: Some(16_385),
        )
    } else if starts("gpt-5.2-codex") {
        ModelFamily::codex(slug, PromptKey::Gpt52CodexInstructions, prompts)
    } else if starts("gpt-5.1-codex-max") {
        ModelFamily {
            supports_parallel_tool_calls: false,
            ..ModelFamily::codex(slug, PromptKey::Gpt51CodexMaxInstructions, prompts)
        }
    } else if starts("gpt-5-codex") || starts("gpt-5.1-codex") || starts("codex-") {
        ModelFamily {
            supports_parallel_tool_calls: false,
            ..ModelFamily::codex(slug, PromptKey::Gpt5CodexInstructions, prompts)
        }
    } else if starts("gpt-5.2") {
        model_family!(
            slug, slug, prompts,
            supports_reasoning_summaries: true,
            apply_patch_tool_type: Some(ApplyPatchToolType::Freeform),
            base_instructions: prompts.get(PromptKey::Gpt52Instructions).to_string(),
            shell_type: ConfigShellToolType::ShellCommand,
            supports_parallel_tool_calls: true,
        )
    } else if starts("gpt-5.1") {
        model_family!(
            slug, "gpt-5.1", prompts,
            supports_reasoning_summaries: true,
            apply_patch_tool_type: Some(ApplyPatchToolType::Freeform),
            base_instructions: prompts.get(PromptKey::Gpt51Instructions).to_string(),
            shell_type: ConfigShellToolType::ShellCommand,
            supports_parallel_tool_calls: true,
        )
    } else if starts("gpt-5") {
        model_family!(
            slug, "gpt-5", prompts,
            supports_reasoning_summaries: true,
            needs_special_apply_patch_instructions: true,
        )
    } else {
        model_family!(slug, slug, prompts)
    }
}
