use std::path::PathBuf;

use codicil_protocol::config_types::SandboxMode;
use codicil_protocol::models::ContentItem;
use codicil_protocol::models::ResponseItem;
use codicil_protocol::protocol::AskForApproval;
use codicil_protocol::protocol::NetworkAccess;
use codicil_protocol::protocol::SandboxPolicy;
use serde::Deserialize;
use serde::Serialize;

use crate::shell::ShellInfo;

pub const ENVIRONMENT_CONTEXT_OPEN_TAG: &str = "<environment_context>";
pub const ENVIRONMENT_CONTEXT_CLOSE_TAG: &str = "</environment_context>";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename = "environment_context", rename_all = "snake_case")]
pub struct EnvironmentContext {
    pub cwd: Option<PathBuf>,
    pub approval_policy: Option<AskForApproval>,
    pub sandbox_mode: Option<SandboxMode>,
    pub network_access: Option<NetworkAccess>,
    pub writable_roots: Option<Vec<PathBuf>>,
    pub shell: ShellInfo,
}

impl EnvironmentContext {
    pub fn new(
        cwd: Option<PathBuf>,
        approval_policy: Option<AskForApproval>,
        sandbox_policy: Option<&SandboxPolicy>,
        shell: ShellInfo,
    ) -> Self {
        Self {
            cwd,
            approval_policy,
            sandbox_mode: sandbox_policy.map(SandboxPolicy::sandbox_mode),
            network_access: sandbox_policy.map(SandboxPolicy::network_access),
            writable_roots: sandbox_policy
                .map(SandboxPolicy::writable_roots)
                .filter(|roots| !roots.is_empty())
                .map(<[PathBuf]>::to_vec),
            shell,
        }
    }

    /// Serializes the environment context to XML. The tag names and enum
    /// spellings are read by the model, so they must not drift. Output looks
    /// like:
    ///
    /// ```xml
    /// <environment_context>
    ///   <cwd>...</cwd>
    ///   <approval_policy>...</approval_policy>
    ///   <sandbox_mode>...</sandbox_mode>
    ///   <network_access>...</network_access>
    ///   <writable_roots>
    ///     <root>...</root>
    ///   </writable_roots>
    ///   <shell>...</shell>
    /// </environment_context>
    /// ```
    pub fn serialize_to_xml(&self) -> String {
        let mut lines = vec![ENVIRONMENT_CONTEXT_OPEN_TAG.to_string()];
        if let Some(cwd) = &self.cwd {
            let cwd = cwd.to_string_lossy();
            if !cwd.trim().is_empty() {
                lines.push(format!("  <cwd>{cwd}</cwd>"));
            }
        }
        if let Some(approval_policy) = self.approval_policy {
            lines.push(format!(
                "  <approval_policy>{approval_policy}</approval_policy>"
            ));
        }
        if let Some(sandbox_mode) = self.sandbox_mode {
            lines.push(format!("  <sandbox_mode>{sandbox_mode}</sandbox_mode>"));
        }
        if let Some(network_access) = self.network_access {
            lines.push(format!(
                "  <network_access>{network_access}</network_access>"
            ));
        }
        if let Some(writable_roots) = &self.writable_roots
            && !writable_roots.is_empty()
        {
            lines.push("  <writable_roots>".to_string());
            for writable_root in writable_roots {
                lines.push(format!(
                    "    <root>{}</root>",
                    writable_root.to_string_lossy()
                ));
            }
            lines.push("  </writable_roots>".to_string());
        }
        lines.push(format!("  <shell>{}</shell>", self.shell.name()));
        lines.push(ENVIRONMENT_CONTEXT_CLOSE_TAG.to_string());
        lines.join("\n")
    }
}

impl From<EnvironmentContext> for ResponseItem {
    fn from(ec: EnvironmentContext) -> Self {
        ResponseItem::Message {
            id: None,
            role: "user".to_string(),
            content: vec![ContentItem::InputText {
                text: ec.serialize_to_xml(),
            }],
        }
    }
}
