//! MIME allow/deny policy.
//!
//! Service configs may carry `allowedMimes` / `disallowedMimes` pattern lists.
//! Patterns are regular expressions matched against the full `Content-Type`
//! value, anchored at both ends, so `video/.+` permits `video/mp4` but not
//! `xvideo/mp4x`.

use regex::Regex;

/// A pattern list entry failed to compile.
#[derive(Debug, thiserror::Error)]
#[error("invalid MIME pattern '{pattern}': {source}")]
pub struct MimePatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Compiled allow/deny lists for one service.
///
/// With an allow-list configured, the type must match at least one pattern.
/// With a deny-list configured, the type must match none. Either list may be
/// absent; an absent list imposes no constraint.
#[derive(Debug, Default)]
pub struct MimePolicy {
    allowed: Option<Vec<Regex>>,
    disallowed: Option<Vec<Regex>>,
}

impl MimePolicy {
    /// Compiles the configured pattern lists, anchoring each pattern.
    ///
    /// # Errors
    ///
    /// Returns [`MimePatternError`] for the first pattern that fails to
    /// compile, so misconfiguration is caught at startup rather than on the
    /// request path.
    pub fn new(
        allowed: Option<&[String]>,
        disallowed: Option<&[String]>,
    ) -> Result<Self, MimePatternError> {
        Ok(Self {
            allowed: allowed.map(compile_all).transpose()?,
            disallowed: disallowed.map(compile_all).transpose()?,
        })
    }

    /// Whether `content_type` passes both lists.
    #[must_use]
    pub fn permits(&self, content_type: &str) -> bool {
        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|re| re.is_match(content_type)) {
                return false;
            }
        }
        if let Some(disallowed) = &self.disallowed {
            if disallowed.iter().any(|re| re.is_match(content_type)) {
                return false;
            }
        }
        true
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, MimePatternError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})$")).map_err(|source| MimePatternError {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}
