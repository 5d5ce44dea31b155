//! Rule matcher: map each source to the rule(s) whose chain should run on it.

use std::path::Path;

use regex::Regex;
use satchel_config::{ConfigError, MatchStrategy, RuleConfig};

use crate::source::Origin;
use crate::{Error, Result};

/// A rule with its patterns compiled once per build.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Position in the configured rule list.
    pub index: usize,
    pub test: Regex,
    pub exclude: Option<Regex>,
    pub rule: RuleConfig,
}

impl CompiledRule {
    /// `test` matches the relative path and `exclude` (if any) does not.
    pub fn matches(&self, rel: &str) -> bool {
        self.test.is_match(rel) && !self.exclude.as_ref().is_some_and(|ex| ex.is_match(rel))
    }
}

#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Vec<CompiledRule>,
    strategy: MatchStrategy,
}

impl RuleMatcher {
    pub fn new(rules: &[RuleConfig], strategy: MatchStrategy) -> Result<Self> {
        let compiled = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let test = compile(index, &rule.test)?;
                let exclude = rule
                    .exclude
                    .as_deref()
                    .map(|pattern| compile(index, pattern))
                    .transpose()?;
                Ok(CompiledRule {
                    index,
                    test,
                    exclude,
                    rule: rule.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules: compiled,
            strategy,
        })
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Rules selected for a source.
    ///
    /// Required sources (entries and their dependencies) with no matching
    /// rule fail the build. Scanned files without a rule are skipped.
    pub fn select(&self, rel: &str, origin: Origin, path: &Path) -> Result<Vec<&CompiledRule>> {
        let mut matching = self.rules.iter().filter(|rule| rule.matches(rel));
        let selected: Vec<&CompiledRule> = match self.strategy {
            MatchStrategy::FirstMatch => matching.next().into_iter().collect(),
            MatchStrategy::AllMatch => matching.collect(),
        };

        if selected.is_empty() && origin.is_required() {
            return Err(Error::NoRuleMatched {
                file: path.to_path_buf(),
            });
        }
        Ok(selected)
    }
}

fn compile(index: usize, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        Error::Config(ConfigError::InvalidPattern {
            index,
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
    })
}
