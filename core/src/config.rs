use std::path::Path;
use std::path::PathBuf;

use codicil_protocol::protocol::AskForApproval;
use codicil_protocol::protocol::SandboxPolicy;
use serde::Deserialize;

use crate::error::Result;
use crate::model_family::ModelFamily;
use crate::model_family::find_family_for_model;
use crate::prompts::PromptCatalog;
use crate::shell::ShellInfo;
use crate::shell::ShellType;
use crate::truncate::TruncationPolicy;

pub const DEFAULT_MODEL: &str = "gpt-5.2-codex";

/// Session options, fixed once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory the session works in. Rendered into the environment context
    /// and used as the user-instructions directory.
    pub cwd: PathBuf,

    pub approval_policy: AskForApproval,

    pub sandbox_policy: SandboxPolicy,

    pub shell: ShellInfo,

    /// Sent as a `developer` message at the start of the conversation.
    pub developer_instructions: Option<String>,

    /// Project instructions (e.g. the contents of AGENTS.md).
    pub user_instructions: Option<String>,

    pub model: String,

    /// When set, used instead of looking `model` up in the catalog.
    pub model_family_override: Option<ModelFamily>,

    pub truncation_policy_override: Option<TruncationPolicy>,

    pub include_shell_tool: bool,

    pub include_apply_patch_tool: bool,

    pub include_view_image_tool: bool,
}

/// Tool toggles as written in `config.toml`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolsToml {
    #[serde(default)]
    pub shell: Option<bool>,
    #[serde(default)]
    pub apply_patch: Option<bool>,
    #[serde(default)]
    pub view_image: Option<bool>,
}

/// On-disk configuration shape. Every field is optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfigToml {
    pub model: Option<String>,
    pub approval_policy: Option<AskForApproval>,
    pub sandbox_policy: Option<SandboxPolicy>,
    pub shell: Option<ShellType>,
    pub shell_path: Option<PathBuf>,
    pub developer_instructions: Option<String>,
    pub user_instructions: Option<String>,
    pub truncation_policy: Option<TruncationPolicy>,
    #[serde(default)]
    pub tools: Option<ToolsToml>,
}

/// Optional overrides for user configuration (e.g., from CLI flags).
#[derive(Default, Debug, Clone)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub cwd: Option<PathBuf>,
    pub approval_policy: Option<AskForApproval>,
    pub sandbox_policy: Option<SandboxPolicy>,
    pub shell: Option<ShellInfo>,
    pub developer_instructions: Option<String>,
    pub user_instructions: Option<String>,
    pub model_family: Option<ModelFamily>,
    pub truncation_policy: Option<TruncationPolicy>,
    pub include_shell_tool: Option<bool>,
    pub include_apply_patch_tool: Option<bool>,
    pub include_view_image_tool: Option<bool>,
}

impl Config {
    /// Merges `cfg` with `overrides`; overrides take precedence and anything
    /// left unset falls back to the built-in default.
    pub fn load_from_base_config_with_overrides(
        cfg: ConfigToml,
        overrides: ConfigOverrides,
        cwd: PathBuf,
    ) -> Self {
        let ConfigOverrides {
            model,
            cwd: cwd_override,
            approval_policy,
            sandbox_policy,
            shell,
            developer_instructions,
            user_instructions,
            model_family,
            truncation_policy,
            include_shell_tool,
            include_apply_patch_tool,
            include_view_image_tool,
        } = overrides;

        let shell = shell.unwrap_or_else(|| match cfg.shell {
            Some(shell_type) => ShellInfo {
                shell_type,
                shell_path: cfg.shell_path.clone(),
            },
            None => ShellInfo {
                shell_path: cfg.shell_path.clone(),
                ..ShellInfo::default_for_platform()
            },
        });
        let tools = cfg.tools.unwrap_or_default();

        Self {
            cwd: cwd_override.unwrap_or(cwd),
            approval_policy: approval_policy
                .or(cfg.approval_policy)
                .unwrap_or_default(),
            sandbox_policy: sandbox_policy.or(cfg.sandbox_policy).unwrap_or_default(),
            shell,
            developer_instructions: developer_instructions.or(cfg.developer_instructions),
            user_instructions: user_instructions.or(cfg.user_instructions),
            model: model
                .or(cfg.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            model_family_override: model_family,
            truncation_policy_override: truncation_policy.or(cfg.truncation_policy),
            include_shell_tool: include_shell_tool.or(tools.shell).unwrap_or(true),
            include_apply_patch_tool: include_apply_patch_tool
                .or(tools.apply_patch)
                .unwrap_or(true),
            include_view_image_tool: include_view_image_tool
                .or(tools.view_image)
                .unwrap_or(true),
        }
    }

    pub fn load_from_toml_str(
        contents: &str,
        overrides: ConfigOverrides,
        cwd: PathBuf,
    ) -> Result<Self> {
        let cfg: ConfigToml = toml::from_str(contents)?;
        Ok(Self::load_from_base_config_with_overrides(cfg, overrides, cwd))
    }

    /// Reads `config.toml` from `path`. A missing file yields the defaults.
    pub fn load_from_file(path: &Path, overrides: ConfigOverrides, cwd: PathBuf) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::load_from_toml_str(&contents, overrides, cwd),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(
                Self::load_from_base_config_with_overrides(ConfigToml::default(), overrides, cwd),
            ),
            Err(err) => Err(err.into()),
        }
    }

    /// The override if present, else the catalog entry for `model`.
    pub fn resolve_model_family(&self, prompts: &PromptCatalog) -> ModelFamily {
        self.model_family_override
            .clone()
            .unwrap_or_else(|| find_family_for_model(&self.model, prompts))
    }
}
