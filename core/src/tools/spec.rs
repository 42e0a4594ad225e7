use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::config::Config;
use crate::model_family::ApplyPatchToolType;
use crate::model_family::ModelFamily;

const APPLY_PATCH_LARK_GRAMMAR: &str = include_str!("apply_patch.lark");

const SHELL_DESCRIPTION_UNIX: &str = r#"Runs a shell command and returns its output.
- The arguments to `shell` will be passed to execvp(). Most terminal commands should be prefixed with ["bash", "-lc"].
- Always set the `workdir` param when using the shell function. Do not use `cd` unless absolutely necessary.
"#;

const SHELL_DESCRIPTION_WINDOWS: &str = r#"Runs a Powershell command (Windows) and returns its output. Arguments to `shell` will be passed to CreateProcessW(). Most commands should be prefixed with ["powershell.exe", "-Command"].

Examples of valid command strings:

- ls -a (show hidden): ["powershell.exe", "-Command", "Get-ChildItem -Force"]
- recursive find by name: ["powershell.exe", "-Command", "Get-ChildItem -Recurse -Filter *.py"]
- setting an env var: ["powershell.exe", "-Command", "$env:FOO='bar'; echo $env:FOO"]
"#;

const SHELL_COMMAND_DESCRIPTION_UNIX: &str = r#"Runs a shell command and returns its output.
- Always set the `workdir` param when using the shell_command function. Do not use `cd` unless absolutely necessary.
"#;

const SHELL_COMMAND_DESCRIPTION_WINDOWS: &str = r#"Runs a Powershell command (Windows) and returns its output.

Examples of valid command strings:

- ls -a (show hidden): "Get-ChildItem -Force"
- recursive find by name: "Get-ChildItem -Recurse -Filter *.py"
- setting an env var: "$env:FOO='bar'; echo $env:FOO"
"#;

const APPLY_PATCH_JSON_DESCRIPTION: &str = r#"Use the `apply_patch` tool to edit files.
Your patch language is a stripped-down, file-oriented diff format designed to be easy to parse and safe to apply.
*** Begin Patch
[ one or more file sections ]
*** End Patch

Each operation starts with one of:
*** Add File: <path>
*** Delete File: <path>
*** Update File: <path>
"#;

const SANDBOX_PERMISSIONS_DESCRIPTION: &str = "Sandbox permissions for the command. Set to \"require_escalated\" to request running without sandbox restrictions; defaults to \"use_default\".";
const JUSTIFICATION_DESCRIPTION: &str = "Only set if sandbox_permissions is \"require_escalated\". 1-sentence explanation of why we want to run this command.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponsesApiTool {
    pub name: String,
    pub description: String,
    /// TODO: Validation. When strict is set to true, the JSON schema,
    /// `required` and `additional_properties` must be present. All fields in
    /// `properties` must be present in `required`.
    pub strict: bool,
    pub parameters: JsonSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreeformTool {
    pub name: String,
    pub description: String,
    pub format: FreeformToolFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreeformToolFormat {
    pub r#type: String,
    pub syntax: String,
    pub definition: String,
}

/// When serialized as JSON, this produces a valid "Tool" in the OpenAI
/// Responses API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ToolSpec {
    #[serde(rename = "function")]
    Function(ResponsesApiTool),
    #[serde(rename = "local_shell")]
    LocalShell {},
    #[serde(rename = "web_search")]
    WebSearch {},
    #[serde(rename = "custom")]
    Freeform(FreeformTool),
}

impl ToolSpec {
    pub fn name(&self) -> &str {
        match self {
            ToolSpec::Function(tool) => tool.name.as_str(),
            ToolSpec::LocalShell {} => "local_shell",
            ToolSpec::WebSearch {} => "web_search",
            ToolSpec::Freeform(tool) => tool.name.as_str(),
        }
    }
}

/// Whether additional properties are allowed, and if so, any required schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Boolean(bool),
    Schema(Box<JsonSchema>),
}

impl From<bool> for AdditionalProperties {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Generic JSON-Schema subset needed for our tool definitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonSchema {
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    #[serde(alias = "integer")]
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Array {
        items: Box<JsonSchema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Object {
        properties: BTreeMap<String, JsonSchema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        required: Option<Vec<String>>,
        #[serde(
            default,
            rename = "additionalProperties",
            skip_serializing_if = "Option::is_none"
        )]
        additional_properties: Option<AdditionalProperties>,
    },
}

fn string_schema(description: &str) -> JsonSchema {
    JsonSchema::String {
        description: Some(description.to_string()),
    }
}

fn strict_object(properties: BTreeMap<String, JsonSchema>, required: &[&str]) -> JsonSchema {
    JsonSchema::Object {
        properties,
        required: Some(required.iter().map(|name| (*name).to_string()).collect()),
        additional_properties: Some(false.into()),
    }
}

fn function_tool(name: &str, description: &str, parameters: JsonSchema) -> ToolSpec {
    ToolSpec::Function(ResponsesApiTool {
        name: name.to_string(),
        description: description.to_string(),
        strict: false,
        parameters,
    })
}

fn sandbox_properties(properties: &mut BTreeMap<String, JsonSchema>) {
    properties.insert(
        "timeout_ms".to_string(),
        JsonSchema::Number {
            description: Some("The timeout for the command in milliseconds".to_string()),
        },
    );
    properties.insert(
        "sandbox_permissions".to_string(),
        string_schema(SANDBOX_PERMISSIONS_DESCRIPTION),
    );
    properties.insert(
        "justification".to_string(),
        string_schema(JUSTIFICATION_DESCRIPTION),
    );
}

pub fn create_shell_tool() -> ToolSpec {
    let mut properties = BTreeMap::new();
    properties.insert(
        "command".to_string(),
        JsonSchema::Array {
            items: Box::new(JsonSchema::String { description: None }),
            description: Some("The command to execute".to_string()),
        },
    );
    properties.insert(
        "workdir".to_string(),
        string_schema("The working directory to execute the command in"),
    );
    sandbox_properties(&mut properties);

    let description = if cfg!(windows) {
        SHELL_DESCRIPTION_WINDOWS
    } else {
        SHELL_DESCRIPTION_UNIX
    };
    function_tool("shell", description, strict_object(properties, &["command"]))
}

pub fn create_shell_command_tool() -> ToolSpec {
    let mut properties = BTreeMap::new();
    properties.insert(
        "command".to_string(),
        string_schema("The shell script to execute in the user's default shell"),
    );
    properties.insert(
        "workdir".to_string(),
        string_schema("The working directory to execute the command in"),
    );
    properties.insert(
        "login".to_string(),
        JsonSchema::Boolean {
            description: Some(
                "Whether to run the shell with login shell semantics. Defaults to true."
                    .to_string(),
            ),
        },
    );
    sandbox_properties(&mut properties);

    let description = if cfg!(windows) {
        SHELL_COMMAND_DESCRIPTION_WINDOWS
    } else {
        SHELL_COMMAND_DESCRIPTION_UNIX
    };
    function_tool(
        "shell_command",
        description,
        strict_object(properties, &["command"]),
    )
}

pub fn create_view_image_tool() -> ToolSpec {
    let mut properties = BTreeMap::new();
    properties.insert(
        "path".to_string(),
        string_schema("Local filesystem path to an image file"),
    );
    function_tool(
        "view_image",
        "Attach a local image (by filesystem path) to the conversation context for this turn.",
        strict_object(properties, &["path"]),
    )
}

pub fn create_apply_patch_freeform_tool() -> ToolSpec {
    ToolSpec::Freeform(FreeformTool {
        name: "apply_patch".to_string(),
        description: "Use the `apply_patch` tool to edit files. This is a FREEFORM tool, so do not wrap the patch in JSON.".to_string(),
        format: FreeformToolFormat {
            r#type: "grammar".to_string(),
            syntax: "lark".to_string(),
            definition: APPLY_PATCH_LARK_GRAMMAR.to_string(),
        },
    })
}

pub fn create_apply_patch_json_tool() -> ToolSpec {
    let mut properties = BTreeMap::new();
    properties.insert(
        "input".to_string(),
        string_schema("The entire contents of the apply_patch command"),
    );
    function_tool(
        "apply_patch",
        APPLY_PATCH_JSON_DESCRIPTION,
        strict_object(properties, &["input"]),
    )
}

/// Tools offered to the model for a session, in a stable order.
pub fn build_tool_specs(config: &Config, model_family: &ModelFamily) -> Vec<ToolSpec> {
    let mut tools = Vec::new();
    if config.include_shell_tool {
        tools.push(create_shell_tool());
        tools.push(create_shell_command_tool());
    }
    if config.include_apply_patch_tool {
        match model_family.apply_patch_tool_type {
            Some(ApplyPatchToolType::Function) => tools.push(create_apply_patch_json_tool()),
            Some(ApplyPatchToolType::Freeform) | None => {
                tools.push(create_apply_patch_freeform_tool())
            }
        }
    }
    if config.include_view_image_tool {
        tools.push(create_view_image_tool());
    }
    tools
}
