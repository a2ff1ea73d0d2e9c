// SPDX-License-Identifier: MIT
//! Template parsing and rendering.
//!
//! A template file is YAML frontmatter followed by up to three `***`
//! -separated sections:
//!
//! ```text
//! ---
//! mode: insert
//! required_values: topic
//! ---
//! {{! pre-runner — optional, derives variables before generation }}
//! ***
//! Write about {{topic}} using {{selection}}.
//! ***
//! {{! output — optional, post-processes the model text }}
//! > {{output}}
//! ```
//!
//! One section is the input; two are input + output; three are pre-runner +
//! input + output. Missing sections render to nothing — never an error.
//! A [`Template`] is parsed on demand, immutable once constructed, and
//! discarded after one generation.

pub mod frontmatter;
pub mod library;
pub mod variables;

pub use frontmatter::{PromptInfo, TemplateFrontmatter};
pub use library::{TemplateEntry, TemplateLibrary};
pub use variables::extract_variables;

use crate::error::ParseError;
use handlebars::Handlebars;
use serde_json::json;
use std::collections::BTreeSet;

/// Registry names for the three sections.
const INPUT: &str = "input";
const OUTPUT: &str = "output";
const PRE_RUNNER: &str = "pre_runner";

/// Resolved variable values, keyed by name. Insertion order carries no
/// meaning.
pub type VarMap = std::collections::BTreeMap<String, serde_json::Value>;

/// One parsed template: immutable sections plus their compiled renderers.
pub struct Template {
    raw: String,
    pre_runner: Option<String>,
    input: String,
    output: Option<String>,
    frontmatter: TemplateFrontmatter,
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("input_len", &self.input.len())
            .field("has_output", &self.output.is_some())
            .field("has_pre_runner", &self.pre_runner.is_some())
            .finish()
    }
}

impl Template {
    /// Parse raw template text. Fails only on malformed markup — a missing
    /// section is an empty renderer, not an error.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let (frontmatter, body) = frontmatter::split(raw)?;
        let sections = split_sections(body);

        let (pre_runner, input, output) = match sections.len() {
            0 => (None, String::new(), None),
            1 => (None, sections[0].clone(), None),
            2 => (None, sections[0].clone(), Some(sections[1].clone())),
            _ => (
                Some(sections[0].clone()),
                sections[1].clone(),
                Some(sections[2].clone()),
            ),
        };

        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_template_string(INPUT, input.trim())?;
        if let Some(section) = &output {
            registry.register_template_string(OUTPUT, section.trim())?;
        }
        if let Some(section) = &pre_runner {
            registry.register_template_string(PRE_RUNNER, section.trim())?;
        }

        Ok(Self {
            raw: raw.to_string(),
            pre_runner,
            input,
            output,
            frontmatter,
            registry,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn frontmatter(&self) -> &TemplateFrontmatter {
        &self.frontmatter
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn has_pre_runner(&self) -> bool {
        self.pre_runner.is_some()
    }

    /// Variable names referenced anywhere in the template, deduplicated
    /// across all three sections.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = extract_variables(&self.input);
        if let Some(section) = &self.output {
            names.extend(extract_variables(section));
        }
        if let Some(section) = &self.pre_runner {
            names.extend(extract_variables(section));
        }
        names
    }

    /// Render the input section into prompt text.
    pub fn render_input(&self, vars: &VarMap) -> Result<String, Box<handlebars::RenderError>> {
        self.registry.render(INPUT, vars).map_err(Box::new)
    }

    /// Render the output section over the model's text (exposed to the
    /// section as `{{output}}`, alongside all input variables). Returns the
    /// text unchanged when the template has no output section.
    pub fn render_output(
        &self,
        output_text: &str,
        vars: &VarMap,
    ) -> Result<String, Box<handlebars::RenderError>> {
        if self.output.is_none() {
            return Ok(output_text.to_string());
        }
        let mut scope = vars.clone();
        scope.insert(OUTPUT.to_string(), json!(output_text));
        self.registry.render(OUTPUT, &scope).map_err(Box::new)
    }

    /// Render the pre-runner section, or `None` when the template has none.
    pub fn render_pre_runner(
        &self,
        vars: &VarMap,
    ) -> Result<Option<String>, Box<handlebars::RenderError>> {
        if self.pre_runner.is_none() {
            return Ok(None);
        }
        self.registry.render(PRE_RUNNER, vars).map(Some).map_err(Box::new)
    }
}

/// Split a template body on `***` separator lines (three or more stars on a
/// line of their own).
fn split_sections(body: &str) -> Vec<String> {
    let mut sections = vec![String::new()];
    for line in body.lines() {
        if is_separator(line) {
            sections.push(String::new());
        } else {
            let current = sections.last_mut().expect("sections is never empty");
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    if sections.len() == 1 && sections[0].trim().is_empty() {
        return Vec::new();
    }
    sections
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == '*')
}
