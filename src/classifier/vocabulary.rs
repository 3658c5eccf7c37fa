//! Command vocabulary as data.
//!
//! Named templates carry a `{name}` placeholder that is replaced by each
//! escaped timer name when the rule table is built. Every pattern is matched
//! case-insensitively, anchored at the start of the message, and tolerates
//! trailing free text after the matched phrase.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimingError};
use crate::types::Action;

/// Placeholder substituted with a timer name.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Name used when validating templates and rendering help.
const SAMPLE_NAME: &str = "Иванов";

/// A family of equivalent phrasings for one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTemplate {
    pub action: Action,
    /// Regex alternatives; named templates must contain `{name}`
    pub patterns: Vec<String>,
    #[serde(default)]
    pub priority: u32,
    /// Take the first non-empty capture group as a lap number
    #[serde(default)]
    pub extract_number: bool,
    #[serde(default)]
    pub description: String,
}

impl RuleTemplate {
    fn new(action: Action, priority: u32, description: &str, patterns: &[&str]) -> Self {
        Self {
            action,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            priority,
            extract_number: false,
            description: description.to_string(),
        }
    }

    fn numbered(mut self) -> Self {
        self.extract_number = true;
        self
    }

    /// Single alternation of every pattern, with `{name}` bound to `escaped_name`.
    pub(crate) fn alternation(&self, escaped_name: Option<&str>) -> String {
        let alternatives: Vec<String> = self
            .patterns
            .iter()
            .map(|p| match escaped_name {
                Some(name) => p.replace(NAME_PLACEHOLDER, name),
                None => p.clone(),
            })
            .collect();
        alternatives.join("|")
    }
}

/// Phrase that is never a command, optionally only in the presence of
/// context words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRule {
    pub word: String,
    #[serde(default)]
    pub context: Vec<String>,
}

impl IgnoreRule {
    fn new(word: &str, context: &[&str]) -> Self {
        Self {
            word: word.to_string(),
            context: context.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Keyword sets for the heuristic pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicVocabulary {
    pub start: Vec<String>,
    pub stop: Vec<String>,
    pub lap: Vec<String>,
    /// Un-named phrases, anchored at the start and ending on a word boundary
    pub general: Vec<RuleTemplate>,
}

impl HeuristicVocabulary {
    /// Action for a single command word, compared case-insensitively.
    pub fn action_for(&self, word: &str) -> Option<Action> {
        let word = word.to_lowercase();
        let hit = |tokens: &[String]| tokens.iter().any(|t| t.to_lowercase() == word);
        if hit(&self.start) {
            Some(Action::Start)
        } else if hit(&self.stop) {
            Some(Action::Stop)
        } else if hit(&self.lap) {
            Some(Action::Lap)
        } else {
            None
        }
    }
}

/// The full command grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub named: Vec<RuleTemplate>,
    pub general: Vec<RuleTemplate>,
    pub ignore: Vec<IgnoreRule>,
    pub heuristic: HeuristicVocabulary,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        Self {
            named: vec![
                RuleTemplate::new(
                    Action::Start,
                    1,
                    "Start",
                    &[
                        r"{name}\s+стартовал",
                        r"{name}\s+старт",
                        r"старт\s+{name}",
                        r"запуск\s+{name}",
                    ],
                ),
                RuleTemplate::new(
                    Action::Stop,
                    1,
                    "Finish",
                    &[r"{name}\s+финишировал", r"{name}\s+финиш", r"финиш\s+{name}"],
                ),
                RuleTemplate::new(
                    Action::Lap,
                    1,
                    "Lap",
                    &[
                        r"{name}\s+подошел",
                        r"{name}\s+вышел\s+с\s+огневого",
                        r"круг\s+{name}",
                    ],
                ),
                RuleTemplate::new(Action::Lap, 2, "Numbered lap", &[r"{name}\s+прошел\s+(\d+)"])
                    .numbered(),
                RuleTemplate::new(
                    Action::Select,
                    1,
                    "Enlarged view",
                    &[r"смотреть\s+{name}", r"показать\s+{name}", r"выбрать\s+{name}"],
                ),
            ],
            general: vec![
                RuleTemplate::new(
                    Action::StartAll,
                    0,
                    "Start everyone",
                    &[r"старт\s+всех", r"все\s+старт", r"общий\s+старт", r"поехали\s+все"],
                ),
                RuleTemplate::new(
                    Action::StopAll,
                    0,
                    "Stop everyone",
                    &[r"стоп\s+всех", r"все\s+стоп", r"общий\s+стоп", r"финиш\s+всех"],
                ),
                RuleTemplate::new(
                    Action::LapAll,
                    0,
                    "Lap for every running timer",
                    &[r"круг\s+всех", r"все\s+круг", r"общий\s+круг"],
                ),
                RuleTemplate::new(
                    Action::ResetAll,
                    0,
                    "Reset everyone",
                    &[r"сброс\s+всех", r"все\s+сброс", r"общий\s+сброс"],
                ),
            ],
            ignore: vec![
                IgnoreRule::new("дисквалифицирован", &[]),
                IgnoreRule::new("снят", &["с", "дистанции"]),
                IgnoreRule::new("нарушил", &["правила"]),
            ],
            heuristic: HeuristicVocabulary {
                start: words(&["стартовал", "старт", "запуск"]),
                stop: words(&["финишировал", "финиш", "стоп"]),
                lap: words(&["подошел", "прошел", "вышел", "круг"]),
                general: vec![
                    RuleTemplate::new(Action::StartAll, 0, "", &[r"старт\s+всех", r"все\s+старт"]),
                    RuleTemplate::new(Action::StopAll, 0, "", &[r"стоп\s+всех", r"все\s+стоп"]),
                    RuleTemplate::new(Action::LapAll, 0, "", &[r"круг\s+всех", r"все\s+круг"]),
                ],
            },
        }
    }
}

/// Rule-table regex for one template: anchored, trailing text after whitespace allowed.
pub(crate) fn compile_rule(template: &RuleTemplate, escaped_name: Option<&str>) -> Result<Regex> {
    let source = format!(r"^(?:{})(?:\s+.+)?$", template.alternation(escaped_name));
    build(&source)
}

/// Heuristic general regex: anchored at the start, ends on a word boundary.
pub(crate) fn compile_heuristic(template: &RuleTemplate) -> Result<Regex> {
    let source = format!(r"^(?:{})\b", template.alternation(None));
    build(&source)
}

pub(crate) fn build(source: &str) -> Result<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|e| TimingError::Pattern {
            pattern: source.to_string(),
            source: e,
        })
}

impl Vocabulary {
    /// Compile every pattern once and check template shape.
    pub fn validate(&self) -> Result<()> {
        let sample = regex::escape(SAMPLE_NAME);
        for template in &self.named {
            if template.patterns.is_empty() {
                return Err(TimingError::config(format!(
                    "named rule for '{}' has no patterns",
                    template.action
                )));
            }
            if let Some(p) = template.patterns.iter().find(|p| !p.contains(NAME_PLACEHOLDER)) {
                return Err(TimingError::config(format!(
                    "named pattern '{}' lacks the {} placeholder",
                    p, NAME_PLACEHOLDER
                )));
            }
            if template.action.is_general() {
                return Err(TimingError::config(format!(
                    "named rule cannot use general action '{}'",
                    template.action
                )));
            }
            compile_rule(template, Some(&sample))?;
        }
        for template in &self.general {
            if !template.action.is_general() {
                return Err(TimingError::config(format!(
                    "general rule cannot use named action '{}'",
                    template.action
                )));
            }
            compile_rule(template, None)?;
        }
        for template in &self.heuristic.general {
            compile_heuristic(template)?;
        }
        if self.ignore.iter().any(|rule| rule.word.trim().is_empty()) {
            return Err(TimingError::config("ignore rule with empty trigger word"));
        }
        Ok(())
    }

    /// Human-readable command help.
    pub fn examples(&self) -> String {
        let mut out = Vec::new();
        out.push("Per-timer commands:".to_string());
        for template in &self.named {
            out.push(render_help(template, Some(SAMPLE_NAME)));
        }
        out.push(String::new());
        out.push("Commands for every timer:".to_string());
        for template in &self.general {
            out.push(render_help(template, None));
        }
        out.push(String::new());
        out.push("Ignored phrases:".to_string());
        for rule in &self.ignore {
            let mut phrase = format!("  '{} {}", SAMPLE_NAME, rule.word);
            for context in &rule.context {
                phrase.push(' ');
                phrase.push_str(context);
            }
            phrase.push('\'');
            out.push(phrase);
        }
        out.join("\n")
    }
}

fn render_help(template: &RuleTemplate, name: Option<&str>) -> String {
    let phrases: Vec<String> = template
        .patterns
        .iter()
        .map(|p| format!("'{}'", humanize(p, name)))
        .collect();
    let label = if template.description.is_empty() {
        template.action.to_string()
    } else {
        template.description.clone()
    };
    format!("  {:<28} {}", format!("{}:", label), phrases.join(" / "))
}

fn humanize(pattern: &str, name: Option<&str>) -> String {
    let text = pattern.replace(r"\s+", " ").replace(r"(\d+)", "1");
    match name {
        Some(name) => text.replace(NAME_PLACEHOLDER, name),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vocabulary_is_valid() {
        Vocabulary::default().validate().unwrap();
    }

    #[test]
    fn compiled_rule_tolerates_trailing_text_only_after_whitespace() {
        let vocab = Vocabulary::default();
        let start = &vocab.named[0];
        let re = compile_rule(start, Some(&regex::escape("Slend37"))).unwrap();
        assert!(re.is_match("slend37 стартовал на дистанции"));
        assert!(re.is_match("СТАРТ Slend37"));
        assert!(!re.is_match("вася сказал slend37 стартовал"));
        assert!(!re.is_match("slend37 стартоваловал"));
    }

    #[test]
    fn validate_rejects_named_pattern_without_placeholder() {
        let mut vocab = Vocabulary::default();
        vocab.named[0].patterns.push(r"старт".into());
        let err = vocab.validate().unwrap_err();
        assert!(matches!(err, TimingError::Config { .. }));
    }

    #[test]
    fn validate_reports_bad_regex() {
        let mut vocab = Vocabulary::default();
        vocab.general[0].patterns.push(r"старт(".into());
        let err = vocab.validate().unwrap_err();
        assert!(matches!(err, TimingError::Pattern { .. }));
    }

    #[test]
    fn examples_render_sample_phrases() {
        let help = Vocabulary::default().examples();
        assert!(help.contains("'Иванов стартовал'"));
        assert!(help.contains("'Иванов прошел 1'"));
        assert!(help.contains("'круг всех'"));
        assert!(help.contains("'Иванов снят с дистанции'"));
    }

    #[test]
    fn heuristic_tokens_map_to_actions() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.heuristic.action_for("финиш"), Some(Action::Stop));
        assert_eq!(vocab.heuristic.action_for("вышел"), Some(Action::Lap));
        assert_eq!(vocab.heuristic.action_for("упал"), None);
    }

    #[test]
    fn vocabulary_deserializes_from_yaml() {
        let yaml = r#"
named:
  - action: start
    patterns: ['{name}\s+go']
    priority: 1
general: []
ignore:
  - word: dq
heuristic:
  start: [go]
  stop: [done]
  lap: [split]
  general: []
"#;
        let vocab: Vocabulary = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(vocab.named[0].action, Action::Start);
        assert!(vocab.ignore[0].context.is_empty());
        vocab.validate().unwrap();
    }
}
