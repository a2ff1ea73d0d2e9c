// SPDX-License-Identifier: MIT
//! Template frontmatter — the `---`-fenced YAML block ahead of the body.
//!
//! The typed subset the pipeline reads: insertion `mode`, the `stream`
//! opt-out, `required_values`, model overrides, and the `PromptInfo`
//! metadata block. Everything else lands in `extra` and becomes a
//! template-declared default variable layer.
//!
//! List-ish fields accept either a YAML sequence or a comma-separated
//! string; template authors use both.

use crate::error::ParseError;
use crate::insert::InsertMode;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Parsed frontmatter of one template. Read-only input to context building.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateFrontmatter {
    /// How the generated text is committed to the surface.
    pub mode: Option<InsertMode>,
    /// Opt out of (or insist on) streaming for this template.
    pub stream: Option<bool>,
    /// Variables that must resolve to a non-empty value before generation.
    #[serde(deserialize_with = "string_or_seq")]
    pub required_values: Vec<String>,
    /// Per-template model override.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Descriptive metadata for template discovery.
    #[serde(rename = "PromptInfo")]
    pub prompt_info: Option<PromptInfo>,
    /// Remaining keys: template-declared default variable values.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// The `PromptInfo` metadata block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptInfo {
    #[serde(rename = "promptId")]
    pub prompt_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    #[serde(deserialize_with = "string_or_seq")]
    pub tags: Vec<String>,
    pub version: Option<String>,
    #[serde(deserialize_with = "string_or_seq")]
    pub commands: Vec<String>,
}

/// Accept `["a", "b"]`, `"a, b"`, or nothing at all.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Listish {
        One(String),
        Many(Vec<String>),
    }

    match Option::<Listish>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(Listish::Many(items)) => Ok(items),
        Some(Listish::One(joined)) => Ok(joined
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()),
    }
}

/// Split raw template text into parsed frontmatter and the body.
///
/// Text without a well-formed fence is all body; only invalid YAML inside a
/// well-formed fence is an error.
pub fn split(raw: &str) -> Result<(TemplateFrontmatter, &str), ParseError> {
    let Some((yaml, body)) = fence(raw) else {
        return Ok((TemplateFrontmatter::default(), raw));
    };
    if yaml.trim().is_empty() {
        return Ok((TemplateFrontmatter::default(), body));
    }
    let frontmatter = serde_yaml::from_str(yaml).map_err(ParseError::Frontmatter)?;
    Ok((frontmatter, body))
}

/// Leniently read a target note's own frontmatter as variable values.
///
/// Broken YAML in a *target* never aborts a generation — it just contributes
/// no variables.
pub fn note_vars(content: &str) -> BTreeMap<String, serde_yaml::Value> {
    fence(content)
        .and_then(|(yaml, _)| serde_yaml::from_str(yaml).ok())
        .unwrap_or_default()
}

/// `(yaml, body)` when `raw` opens with a `---` fence that also closes.
fn fence(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}
