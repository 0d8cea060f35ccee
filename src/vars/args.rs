// src/vars/args.rs

use std::collections::BTreeMap;

use crate::errors::{KdeployError, Result};

/// One `NAME[=VALUE]` entry from an env-list argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Coerce an argument value to a boolean.
///
/// Accepts `true|yes|1` and `false|no|0`; anything else is a configuration
/// error. `arg_name` is only used for the diagnostic.
pub fn parse_bool(arg_name: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(KdeployError::BadBoolArg {
            name: arg_name.to_string(),
            value: other.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    Skipping,
    InString,
    InQuotedString,
}

/// Split an argument value into whitespace-separated tokens with single-quote
/// grouping: `a b 'c d'` yields `["a", "b", "c d"]`.
///
/// Tokenization policy: whitespace terminates only unquoted tokens; `'` opens
/// a quoted token at a token boundary and terminates only quoted tokens. A
/// `'` inside an unquoted token is kept literally.
pub fn parse_string_list(values: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut state = TokenState::Skipping;
    let mut current = String::new();

    for ch in values.chars() {
        match state {
            TokenState::Skipping => {
                if ch.is_whitespace() {
                    continue;
                }
                if ch == '\'' {
                    state = TokenState::InQuotedString;
                    continue;
                }
                state = TokenState::InString;
                current.push(ch);
            }
            TokenState::InString => {
                if ch.is_whitespace() {
                    out.push(std::mem::take(&mut current));
                    state = TokenState::Skipping;
                    continue;
                }
                current.push(ch);
            }
            TokenState::InQuotedString => {
                if ch == '\'' {
                    out.push(std::mem::take(&mut current));
                    state = TokenState::Skipping;
                    continue;
                }
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        out.push(current);
    }

    out
}

/// Parse an env-list argument: a string list whose tokens are `NAME[=VALUE]`.
/// Tokens with an empty name are dropped.
pub fn parse_env_list(values: &str) -> Vec<EnvVar> {
    parse_string_list(values)
        .into_iter()
        .filter_map(|token| {
            let (name, value) = match token.find('=') {
                Some(pos) => (token[..pos].to_string(), token[pos + 1..].to_string()),
                None => (token, String::new()),
            };
            if name.is_empty() {
                None
            } else {
                Some(EnvVar { name, value })
            }
        })
        .collect()
}

/// Parse a key-value argument: a string list whose `KEY[=VALUE]` tokens are
/// collapsed into a map. Duplicate keys: last wins. Empty keys are dropped.
pub fn parse_key_values(values: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();

    for token in parse_string_list(values) {
        match token.find('=') {
            Some(pos) if pos > 0 => {
                out.insert(token[..pos].to_string(), token[pos + 1..].to_string());
            }
            Some(_) => {}
            None => {
                if !token.is_empty() {
                    out.insert(token, String::new());
                }
            }
        }
    }

    out
}
