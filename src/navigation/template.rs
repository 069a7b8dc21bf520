//! Parameterized route templates.

use regex::Regex;

use super::destination::Params;
use crate::error::ConfigurationError;

/// Whether a path segment is a `{name}` placeholder.
pub(crate) fn is_param_segment(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

pub(crate) fn is_parameterized(path: &str) -> bool {
    path.split('/').any(is_param_segment)
}

/// Trim slashes and drop empty segments: `/a//b/` becomes `a/b`.
pub(crate) fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join non-empty path parts with `/`.
pub(crate) fn join(prefix: &str, route: &str) -> String {
    normalize(&format!("{}/{}", prefix, route))
}

/// Compiled template: literal segments escaped, `{name}` segments captured.
#[derive(Debug, Clone)]
pub(crate) struct RouteTemplate {
    pattern: String,
    segments: usize,
    first_static: Option<String>,
    names: Vec<String>,
    regex: Regex,
}

impl RouteTemplate {
    pub(crate) fn compile(pattern: &str) -> Result<Self, ConfigurationError> {
        let pattern = normalize(pattern);
        let mut names = Vec::new();
        let mut parts = Vec::new();

        for segment in pattern.split('/') {
            if is_param_segment(segment) {
                names.push(segment[1..segment.len() - 1].to_string());
                parts.push("([^/]+)".to_string());
            } else {
                parts.push(regex::escape(segment));
            }
        }

        let regex = Regex::new(&format!("^{}$", parts.join("/"))).map_err(|source| {
            ConfigurationError::InvalidTemplate {
                path: pattern.clone(),
                source,
            }
        })?;
        let first_static = pattern
            .split('/')
            .next()
            .filter(|segment| !is_param_segment(segment))
            .map(str::to_string);

        Ok(Self {
            segments: pattern.split('/').count(),
            first_static,
            names,
            regex,
            pattern,
        })
    }

    pub(crate) fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Index key: segment count plus the first segment if it is static.
    pub(crate) fn bucket(&self) -> (usize, Option<String>) {
        (self.segments, self.first_static.clone())
    }

    /// Named parameters if `path` (already normalized) matches.
    pub(crate) fn captures(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .zip(captures.iter().skip(1))
                .filter_map(|(name, value)| Some((name.clone(), value?.as_str().to_string())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_named_segments() {
        let template = RouteTemplate::compile("home/detail/{id}").unwrap();
        let params = template.captures("home/detail/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert_eq!(template.bucket(), (3, Some("home".to_string())));
    }

    #[test]
    fn literal_characters_are_escaped() {
        let template = RouteTemplate::compile("files/v1.0/{name}").unwrap();
        assert!(template.captures("files/v1.0/readme").is_some());
        assert!(template.captures("files/v1x0/readme").is_none());
    }

    #[test]
    fn params_never_span_segments() {
        let template = RouteTemplate::compile("user/{id}").unwrap();
        assert!(template.captures("user/1/posts").is_none());
    }

    #[test]
    fn leading_parameter_has_no_static_bucket() {
        let template = RouteTemplate::compile("{lang}/about").unwrap();
        assert_eq!(template.bucket(), (2, None));
        let params = template.captures("en/about").unwrap();
        assert_eq!(params["lang"], "en");
    }

    #[test]
    fn normalize_collapses_slashes() {
        assert_eq!(normalize("/a//b/"), "a/b");
        assert_eq!(join("", "home"), "home");
        assert_eq!(join("settings", "/profile"), "settings/profile");
    }
}
