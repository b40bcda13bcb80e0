//! Route template compilation.
//!
//! # Responsibilities
//! - Validate templates at registration time
//! - Classify templates as static (exact match) or dynamic
//! - Translate dynamic templates into an anchored regex
//! - Extract parameter names in left-to-right order
//!
//! # Template Syntax
//! ```text
//! /users            static segment
//! /users/:id        required parameter   → /([^/]+?)
//! /users/:id?       optional parameter   → (?:/([^/]+?))?
//! /files/*          wildcard, named "*"  → /(.*)
//! ```
//!
//! # Design Decisions
//! - Static templates compile no regex; dispatch compares them byte-exact
//! - Every dynamic pattern is anchored and tolerates one trailing slash
//! - Literal segments are regex-escaped
//! - Ambiguous templates are rejected here, never at dispatch

use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

/// Name bound to the capture of a wildcard segment.
pub const WILDCARD: &str = "*";

/// Reasons a route template is rejected.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("route template is empty")]
    Empty,

    #[error("route template {0:?} must begin with '/' or '*'")]
    MissingLeadingSlash(String),

    #[error("segment {segment:?} of {template:?} mixes a parameter with a wildcard")]
    MixedSegment { template: String, segment: String },

    #[error("route template {0:?} contains more than one wildcard")]
    MultipleWildcards(String),

    #[error("segment {segment:?} of {template:?} has an empty parameter name")]
    EmptyParameterName { template: String, segment: String },

    #[error("parameter {name:?} appears more than once in {template:?}")]
    DuplicateParameter { template: String, name: String },

    #[error("segment {segment:?} of {template:?} uses '?' outside a parameter")]
    StrayOptional { template: String, segment: String },

    #[error("route template {template:?} did not compile: {source}")]
    Regex {
        template: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled route template.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// No dynamic segments; matched by string equality only.
    Static,
    /// Regex matcher plus the names of its capture groups, in order.
    Dynamic { regex: Regex, names: Arc<[String]> },
}

impl Pattern {
    pub fn is_static(&self) -> bool {
        matches!(self, Pattern::Static)
    }

    /// The compiled matcher, absent for static templates.
    pub fn regex(&self) -> Option<&Regex> {
        match self {
            Pattern::Static => None,
            Pattern::Dynamic { regex, .. } => Some(regex),
        }
    }

    /// Parameter names aligned with the matcher's capture groups.
    pub fn names(&self) -> &[String] {
        match self {
            Pattern::Static => &[],
            Pattern::Dynamic { names, .. } => names,
        }
    }
}

/// Compile a route template.
///
/// Templates without `:`, `*` or `?` are classified [`Pattern::Static`].
pub fn compile(template: &str) -> Result<Pattern, PatternError> {
    match template.as_bytes().first() {
        None => return Err(PatternError::Empty),
        Some(b'/') | Some(b'*') => {}
        Some(_) => return Err(PatternError::MissingLeadingSlash(template.to_owned())),
    }

    if !is_dynamic(template) {
        return Ok(Pattern::Static);
    }

    let (source, names) = translate(template)?;
    let regex = Regex::new(&source).map_err(|source| PatternError::Regex {
        template: template.to_owned(),
        source,
    })?;

    debug_assert_eq!(regex.captures_len() - 1, names.len());

    Ok(Pattern::Dynamic {
        regex,
        names: names.into(),
    })
}

/// Returns true if the template contains any parameter, optional or wildcard marker.
pub fn is_dynamic(template: &str) -> bool {
    template.bytes().any(|b| matches!(b, b':' | b'*' | b'?'))
}

/// Translate a template into regex source and its parameter names.
pub fn translate(template: &str) -> Result<(String, Vec<String>), PatternError> {
    let mut source = String::with_capacity(template.len() + 16);
    let mut names: Vec<String> = Vec::new();
    let mut seen_wildcard = false;

    source.push('^');

    for segment in template.split('/').filter(|s| !s.is_empty()) {
        let has_param = segment.contains(':');
        let has_wildcard = segment.contains('*');
        let optional = segment.contains('?');

        match (has_param, has_wildcard) {
            (true, true) => {
                return Err(PatternError::MixedSegment {
                    template: template.to_owned(),
                    segment: segment.to_owned(),
                });
            }
            (true, false) => {
                let name: String = segment.chars().filter(|c| !matches!(c, ':' | '?')).collect();
                if name.is_empty() {
                    return Err(PatternError::EmptyParameterName {
                        template: template.to_owned(),
                        segment: segment.to_owned(),
                    });
                }
                if names.contains(&name) {
                    return Err(PatternError::DuplicateParameter {
                        template: template.to_owned(),
                        name,
                    });
                }
                if optional {
                    source.push_str("(?:/([^/]+?))?");
                } else {
                    source.push_str("/([^/]+?)");
                }
                names.push(name);
            }
            (false, true) => {
                if seen_wildcard {
                    return Err(PatternError::MultipleWildcards(template.to_owned()));
                }
                seen_wildcard = true;
                source.push_str("/(.*)");
                names.push(WILDCARD.to_owned());
            }
            (false, false) => {
                if optional {
                    return Err(PatternError::StrayOptional {
                        template: template.to_owned(),
                        segment: segment.to_owned(),
                    });
                }
                source.push('/');
                source.push_str(&regex::escape(segment));
            }
        }
    }

    source.push_str("/?$");
    Ok((source, names))
}
