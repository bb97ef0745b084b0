//! URL patterns: literal segments and `{name}` string variables, compiled to anchored regexes.

use crate::error::RouteError;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct Pattern {
    source: String,
    regex: Regex,
    variables: Vec<String>,
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidPattern {
            pattern: source.to_string(),
            reason: reason.to_string(),
        };
        let rest = source
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;

        let mut expr = String::from("^");
        let mut variables: Vec<String> = Vec::new();
        if rest.is_empty() {
            expr.push('/');
        }
        for segment in rest.split('/').filter(|_| !rest.is_empty()) {
            if segment.is_empty() {
                return Err(invalid("empty segment"));
            }
            expr.push('/');
            if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                if !is_identifier(name) {
                    return Err(invalid(&format!("bad variable name '{}'", name)));
                }
                if variables.iter().any(|v| v == name) {
                    return Err(invalid(&format!("duplicate variable '{}'", name)));
                }
                expr.push_str(&format!("(?P<{}>[^/]+)", name));
                variables.push(name.to_string());
            } else if segment.contains(['{', '}']) {
                return Err(invalid(&format!("unbalanced braces in '{}'", segment)));
            } else {
                expr.push_str(&regex::escape(segment));
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| invalid(&e.to_string()))?;
        Ok(Pattern {
            source: source.to_string(),
            regex,
            variables,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Path variables if `path` matches, percent-decoded, as strings.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let params = self
            .variables
            .iter()
            .filter_map(|name| {
                caps.name(name).map(|m| {
                    let value = percent_decode_str(m.as_str()).decode_utf8_lossy().into_owned();
                    (name.clone(), value)
                })
            })
            .collect();
        Some(params)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_matches_only_root() {
        let p = Pattern::parse("/").unwrap();
        assert!(p.captures("/").is_some());
        assert!(p.captures("/model").is_none());
    }

    #[test]
    fn literal_segments_are_escaped() {
        let p = Pattern::parse("/model/level_names.json").unwrap();
        assert!(p.captures("/model/level_names.json").is_some());
        assert!(p.captures("/model/level_namesXjson").is_none());
    }

    #[test]
    fn variables_capture_one_segment() {
        let p = Pattern::parse("/model/dimension/{name}/levels").unwrap();
        assert_eq!(p.variables(), ["name"]);
        let params = p.captures("/model/dimension/time/levels").unwrap();
        assert_eq!(params["name"], "time");
        assert!(p.captures("/model/dimension/a/b/levels").is_none());
        assert!(p.captures("/model/dimension//levels").is_none());
    }

    #[test]
    fn captured_values_are_percent_decoded() {
        let p = Pattern::parse("/fact/{id}").unwrap();
        assert_eq!(p.captures("/fact/a%20b").unwrap()["id"], "a b");
    }

    #[test]
    fn bad_patterns_are_rejected() {
        for bad in ["model", "/model//x", "/{}", "/{1x}", "/{a}/{a}", "/x{a}"] {
            assert!(Pattern::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
