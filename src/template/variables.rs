// SPDX-License-Identifier: MIT
//! Variable placeholder extraction.
//!
//! Scans handlebars-style markup for the set of variable names a section
//! references: plain `{{name}}` and `{{{name}}}` expressions, parameters of
//! block constructs (`{{#if a}}`, `{{#each items}}`, `{{#with obj}}`,
//! `{{^empty}}`), and arguments of helper calls. Dotted and slashed paths
//! contribute their root segment. Partials, comments, literals, `this`, and
//! `@`-locals are not variables.
//!
//! The scanner is a pure function over text — structural validity of the
//! markup is the renderer's concern, not this module's.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static MUSTACHE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\{?([^{}]*)\}?\}\}").expect("mustache pattern compiles"));

/// Block helpers whose name is a keyword, not a variable.
const BLOCK_HELPERS: [&str; 4] = ["if", "unless", "each", "with"];

/// Extract the set of variable names referenced in `section`.
///
/// Each name appears exactly once regardless of how often the section
/// references it; ordering carries no meaning.
pub fn extract_variables(section: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();

    for cap in MUSTACHE.captures_iter(section) {
        let inner = cap[1].trim();
        if inner.is_empty() {
            continue;
        }
        match inner.chars().next() {
            // closing tags, comments, partials
            Some('/') | Some('!') | Some('>') => continue,
            _ => {}
        }

        let (is_block, body) = match inner.strip_prefix('#').or_else(|| inner.strip_prefix('^')) {
            Some(rest) => (true, rest.trim()),
            None => (false, inner),
        };

        let tokens = tokenize(body);
        let Some(head) = tokens.first() else {
            continue;
        };

        let candidates: &[String] = if is_block {
            if BLOCK_HELPERS.contains(&head.as_str()) {
                &tokens[1..]
            } else {
                // mustache-style section: the section name itself is a variable
                &tokens[..]
            }
        } else if tokens.len() > 1 {
            // helper call: the helper name is not a variable, its args may be
            &tokens[1..]
        } else {
            &tokens[..]
        };

        for token in candidates {
            if let Some(root) = variable_root(token) {
                names.insert(root);
            }
        }
    }

    names
}

/// Split an expression body on whitespace, keeping quoted strings intact.
fn tokenize(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in body.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => {
                    current.push(c);
                    quote = Some(c);
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// The root variable name a token refers to, if any.
fn variable_root(token: &str) -> Option<String> {
    // subexpression opener names a helper, not a variable
    if token.starts_with('(') {
        return None;
    }
    let token = token.trim_end_matches(')');
    // hash arguments: `key=value` — only the value side can reference a variable
    let token = match token.split_once('=') {
        Some((_, value)) => value,
        None => token,
    };
    if token.is_empty() {
        return None;
    }

    let first = token.chars().next()?;
    if first == '"' || first == '\'' || first == '@' || first == '-' || first.is_ascii_digit() {
        return None;
    }

    // relative-path prefixes carry no name of their own
    let mut path = token.strip_prefix("./").unwrap_or(token);
    while let Some(rest) = path.strip_prefix("../") {
        path = rest;
    }

    let root = path.split(['.', '/', '[']).next().unwrap_or("");
    if root.is_empty() || matches!(root, "this" | "else" | "true" | "false" | "null") {
        return None;
    }
    if !root
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return None;
    }
    Some(root.to_string())
}
