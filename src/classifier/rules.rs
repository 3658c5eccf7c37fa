//! Rule table compiled from the vocabulary and the current timer names.

use regex::{Captures, Regex};

use super::vocabulary::{Vocabulary, compile_rule};
use crate::error::Result;
use crate::types::Action;

/// One compiled rule. Named rules carry the timer name they were built for.
#[derive(Debug, Clone)]
pub struct CommandRule {
    pub action: Action,
    pub name: Option<String>,
    pub priority: u32,
    pub extract_number: bool,
    pub(crate) regex: Regex,
}

impl CommandRule {
    /// First non-empty capture parsed as a number.
    pub(crate) fn lap_number(&self, caps: &Captures<'_>) -> Option<u32> {
        if !self.extract_number {
            return None;
        }
        caps.iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str())
            .find(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
    }
}

/// General rules followed by every named template for every name, in
/// registry order. Regeneration is O(names x templates).
pub(crate) fn build_named(vocabulary: &Vocabulary, names: &[String]) -> Result<Vec<CommandRule>> {
    let mut rules = Vec::with_capacity(names.len() * vocabulary.named.len());
    for name in names {
        let escaped = regex::escape(name);
        for template in &vocabulary.named {
            rules.push(CommandRule {
                action: template.action,
                name: Some(name.clone()),
                priority: template.priority,
                extract_number: template.extract_number,
                regex: compile_rule(template, Some(&escaped))?,
            });
        }
    }
    Ok(rules)
}

pub(crate) fn build_general(vocabulary: &Vocabulary) -> Result<Vec<CommandRule>> {
    vocabulary
        .general
        .iter()
        .map(|template| {
            Ok(CommandRule {
                action: template.action,
                name: None,
                priority: template.priority,
                extract_number: template.extract_number,
                regex: compile_rule(template, None)?,
            })
        })
        .collect()
}

/// Highest priority match; ties go to the first rule in iteration order.
pub(crate) fn best_match<'r, 't>(
    rules: impl IntoIterator<Item = &'r CommandRule>,
    message: &'t str,
) -> Option<(&'r CommandRule, Captures<'t>)> {
    let mut best: Option<(&CommandRule, Captures<'t>)> = None;
    for rule in rules {
        if let Some(caps) = rule.regex.captures(message) {
            let better = match &best {
                Some((current, _)) => rule.priority > current.priority,
                None => true,
            };
            if better {
                best = Some((rule, caps));
            }
        }
    }
    best
}
