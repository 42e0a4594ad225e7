use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

/// Coarse sandbox mode as rendered into the environment descriptor. Derived
/// from [`crate::protocol::SandboxPolicy`]; this crate never enforces it.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SandboxMode {
    #[default]
    ReadOnly,

    WorkspaceWrite,

    DangerFullAccess,
}
