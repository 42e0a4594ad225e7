use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ShellType {
    Bash,
    PowerShell,
}

/// The user's shell as described to the model and used by `shell_command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellInfo {
    pub shell_type: ShellType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_path: Option<PathBuf>,
}

impl ShellInfo {
    pub fn new(shell_type: ShellType) -> Self {
        Self {
            shell_type,
            shell_path: None,
        }
    }

    /// PowerShell on Windows, Bash everywhere else.
    pub fn default_for_platform() -> Self {
        if cfg!(windows) {
            Self::new(ShellType::PowerShell)
        } else {
            Self::new(ShellType::Bash)
        }
    }

    pub fn name(&self) -> String {
        self.shell_type.to_string()
    }

    /// argv that runs `command` as a script in this shell.
    pub fn derive_exec_args(&self, command: &str, use_login_shell: bool) -> Vec<String> {
        match self.shell_type {
            ShellType::Bash => {
                let program = self
                    .shell_path
                    .as_ref()
                    .map_or_else(|| "/bin/bash".to_string(), |p| p.to_string_lossy().to_string());
                let flag = if use_login_shell { "-lc" } else { "-c" };
                vec![program, flag.to_string(), command.to_string()]
            }
            ShellType::PowerShell => {
                let program = self.shell_path.as_ref().map_or_else(
                    || "powershell.exe".to_string(),
                    |p| p.to_string_lossy().to_string(),
                );
                vec![program, "-Command".to_string(), command.to_string()]
            }
        }
    }
}

impl Default for ShellInfo {
    fn default() -> Self {
        Self::default_for_platform()
    }
}
