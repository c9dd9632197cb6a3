//! Route Matcher
//!
//! First-match-wins lookup of the rule governing a request.

use regex::{Regex, RegexBuilder};

use crate::config::RouteRule;
use crate::error::{CacheError, Result};
use crate::network::RequestIdentity;

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: RouteRule,
    regex: Regex,
}

impl CompiledRule {
    fn matches(&self, request: &RequestIdentity) -> bool {
        let method_ok = self
            .rule
            .method
            .as_deref()
            .map(|m| m.eq_ignore_ascii_case(&request.method))
            .unwrap_or(true);
        method_ok && self.regex.is_match(&request.url)
    }
}

// == Matcher ==
/// Ordered rule list. Declaration order is semantically significant.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    rules: Vec<CompiledRule>,
}

impl Matcher {
    /// Compiles every rule pattern, failing on the first that does not parse.
    pub fn new(rules: &[RouteRule]) -> Result<Self> {
        let compiled = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let regex = RegexBuilder::new(&rule.pattern)
                    .case_insensitive(rule.case_insensitive)
                    .build()
                    .map_err(|e| {
                        CacheError::Configuration(format!(
                            "rule #{} has an invalid pattern '{}': {}",
                            index, rule.pattern, e
                        ))
                    })?;
                Ok(CompiledRule {
                    rule: rule.clone(),
                    regex,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules: compiled })
    }

    /// Returns the first rule matching `request`, if any.
    pub fn find(&self, request: &RequestIdentity) -> Option<&RouteRule> {
        self.position(request).map(|index| &self.rules[index].rule)
    }

    /// Declaration index of the first rule matching `request`.
    pub fn position(&self, request: &RequestIdentity) -> Option<usize> {
        self.rules
            .iter()
            .position(|compiled| compiled.matches(request))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
