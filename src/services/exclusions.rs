// src/services/exclusions.rs

//! Chipset exclusion rules keyed by release family.

use std::collections::BTreeSet;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::ExclusionRule;

/// Compiled, ordered table of tag pattern → excluded chipsets.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRuleSet {
    rules: Vec<(Regex, BTreeSet<String>)>,
}

impl ExclusionRuleSet {
    /// Compile the configured rules. An invalid pattern is a configuration error.
    pub fn new(rules: &[ExclusionRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                let regex = Regex::new(&rule.pattern).map_err(|e| {
                    AppError::config(format!("exclusion pattern '{}': {}", rule.pattern, e))
                })?;
                Ok((regex, rule.chipsets.iter().cloned().collect()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Union of the chipsets of every rule matching `tag`.
    pub fn excluded_chipsets(&self, tag: &str) -> BTreeSet<String> {
        self.rules
            .iter()
            .filter(|(pattern, _)| pattern.is_match(tag))
            .flat_map(|(_, chipsets)| chipsets.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
