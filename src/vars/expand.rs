// src/vars/expand.rs

use std::collections::BTreeMap;

use crate::errors::{KdeployError, Result};

/// Per-cluster variable map, as parsed from the cluster argument string.
pub type Variables = BTreeMap<String, String>;

/// Resolve a variable by name: cluster variables first, then the process
/// environment, then the default (empty string when there is none).
pub fn lookup_var(name: &str, vars: &Variables, default_value: Option<&str>) -> String {
    if let Some(v) = vars.get(name) {
        return v.clone();
    }

    if let Ok(v) = std::env::var(name) {
        return v;
    }

    default_value.unwrap_or("").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Copy,
    Backslash,
    Dollar,
    ScanName,
    ScanDefaultValue,
}

/// Expand `${NAME}` and `${NAME,DEFAULT}` references in a document.
///
/// Rules:
/// - Resolution order: cluster variables, process environment, default.
/// - `\` escapes a following `$`; before any other character the backslash is
///   kept as-is.
/// - A default whose first character is `$` is resolved as an environment
///   variable reference (`${X,$HOME}` inserts the environment's `HOME`).
/// - `"` inside a default value is backslash-escaped on insertion, so defaults
///   can be spliced into JSON string literals.
/// - Variable names are `[A-Za-z0-9._]+`; anything else inside `${...}`, or an
///   unterminated reference, is an error.
pub fn expand_variables(input: &str, vars: &Variables) -> Result<String> {
    let mut expanded = String::with_capacity(input.len());
    let mut state = State::Copy;
    let mut var_name = String::new();
    let mut default_value: Option<String> = None;

    let commit = |expanded: &mut String, name: &str, default: &mut Option<String>| {
        if let Some(def) = default.as_mut() {
            if let Some(env_name) = def.strip_prefix('$') {
                if let Ok(val) = std::env::var(env_name) {
                    *def = val;
                }
            }
        }
        expanded.push_str(&lookup_var(name, vars, default.as_deref()));
    };

    for ch in input.chars() {
        match state {
            State::Copy => {
                if ch == '\\' {
                    state = State::Backslash;
                } else if ch == '$' {
                    state = State::Dollar;
                } else {
                    expanded.push(ch);
                }
            }
            State::Backslash => {
                if ch != '$' {
                    expanded.push('\\');
                }
                expanded.push(ch);
                state = State::Copy;
            }
            State::Dollar => {
                if ch == '{' {
                    state = State::ScanName;
                    var_name.clear();
                    default_value = None;
                } else {
                    expanded.push('$');
                    expanded.push(ch);
                    state = State::Copy;
                }
            }
            State::ScanName => {
                if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' {
                    var_name.push(ch);
                } else if ch == ',' {
                    default_value = Some(String::new());
                    state = State::ScanDefaultValue;
                } else if ch == '}' {
                    commit(&mut expanded, &var_name, &mut default_value);
                    state = State::Copy;
                } else {
                    return Err(KdeployError::Expansion(format!(
                        "bad character {ch:?} in variable name starting with '{var_name}'"
                    )));
                }
            }
            State::ScanDefaultValue => {
                if ch == '}' {
                    commit(&mut expanded, &var_name, &mut default_value);
                    state = State::Copy;
                } else {
                    let def = default_value
                        .as_mut()
                        .expect("default accumulator set on ','");
                    if ch == '"' {
                        def.push('\\');
                    }
                    def.push(ch);
                }
            }
        }
    }

    if state != State::Copy {
        return Err(KdeployError::Expansion(format!(
            "variable '{var_name}' not properly terminated with '}}'"
        )));
    }

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn expands_defaults_and_variables() {
        let v = vars(&[("PORT", "9000")]);
        let out = expand_variables("host=${H,localhost}:${PORT,8080}", &v).unwrap();
        assert_eq!(out, "host=localhost:9000");
    }

    #[test]
    fn backslash_escapes_dollar() {
        let out = expand_variables("\\${X}", &Variables::new()).unwrap();
        assert_eq!(out, "${X}");
    }

    #[test]
    fn backslash_before_other_chars_is_kept() {
        let out = expand_variables("a\\nb", &Variables::new()).unwrap();
        assert_eq!(out, "a\\nb");
    }

    #[test]
    fn lone_dollar_passes_through() {
        let out = expand_variables("cost: 5$ total", &Variables::new()).unwrap();
        assert_eq!(out, "cost: 5$ total");
    }

    #[test]
    fn cluster_vars_win_over_defaults() {
        let v = vars(&[("name", "prod")]);
        let out = expand_variables("${name,dev}", &v).unwrap();
        assert_eq!(out, "prod");
    }

    #[test]
    fn env_wins_over_default() {
        std::env::set_var("KDEPLOY_TEST_EXPAND", "from-env");
        let out = expand_variables("${KDEPLOY_TEST_EXPAND,fallback}", &Variables::new()).unwrap();
        assert_eq!(out, "from-env");
    }

    #[test]
    fn dollar_default_resolves_environment() {
        std::env::set_var("KDEPLOY_TEST_HOME", "/home/u");
        let out =
            expand_variables("${NOPE_UNSET,$KDEPLOY_TEST_HOME}", &Variables::new()).unwrap();
        assert_eq!(out, "/home/u");
    }

    #[test]
    fn dollar_default_keeps_literal_when_env_unset() {
        let out = expand_variables("${NOPE_UNSET,$NOPE_ALSO_UNSET}", &Variables::new()).unwrap();
        assert_eq!(out, "$NOPE_ALSO_UNSET");
    }

    #[test]
    fn quote_in_default_is_escaped() {
        let out = expand_variables("${X,he said \"hi\"}", &Variables::new()).unwrap();
        assert_eq!(out, "he said \\\"hi\\\"");
    }

    #[test]
    fn missing_variable_without_default_is_empty() {
        let out = expand_variables("a${NOPE_UNSET}b", &Variables::new()).unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn unterminated_reference_fails() {
        assert!(expand_variables("${X", &Variables::new()).is_err());
        assert!(expand_variables("${X,abc", &Variables::new()).is_err());
        assert!(expand_variables("tail\\", &Variables::new()).is_err());
    }

    #[test]
    fn bad_name_character_fails() {
        assert!(expand_variables("${X Y}", &Variables::new()).is_err());
    }

    #[test]
    fn expansion_is_idempotent_on_plain_output() {
        let v = vars(&[("A", "one")]);
        let once = expand_variables("x ${A} y", &v).unwrap();
        let twice = expand_variables(&once, &v).unwrap();
        assert_eq!(once, twice);
    }
}
