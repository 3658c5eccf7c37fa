//! Maps chat messages to timer commands.
//!
//! Classification runs in two tiers:
//!
//! 1. **Rules**: every general rule and every named template bound to every
//!    known timer name is tried; the highest priority match wins and ties go to
//!    the first rule found. A named match is still subject to the ignore
//!    vocabulary, and a suppressed match does not fall through.
//! 2. **Heuristic**: only when no rule matched. Short messages are searched for
//!    whole-word timer names followed by a command word, then for general
//!    phrases.
//!
//! The rule table is rebuilt only when the set of names changes.
//!
//! ```rust
//! use skitime::classifier::{CommandClassifier, Verdict};
//! use skitime::types::Action;
//!
//! let mut classifier = CommandClassifier::default();
//! let names = vec!["Иванов".to_string()];
//! let verdicts = classifier.classify("Иванов стартовал", &names);
//! match &verdicts[..] {
//!     [Verdict::Dispatch(cmd)] => assert_eq!(cmd.action, Action::Start),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

mod heuristic;
mod ignore;
mod rules;
mod vocabulary;

pub use rules::CommandRule;
pub use vocabulary::{HeuristicVocabulary, IgnoreRule, NAME_PLACEHOLDER, RuleTemplate, Vocabulary};

use std::fmt;

use heuristic::{Heuristic, NameMatcher};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{Command, Tier};

/// Default word limit for heuristic candidates.
pub const DEFAULT_MAX_HEURISTIC_WORDS: usize = 8;

/// Why a message did not produce a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The ignore vocabulary suppressed a message about `name`
    IgnoreWord { name: String, word: String },
    /// Too many words to be a command
    TooLong { words: usize },
    /// Nothing recognisable
    NoCommand,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::IgnoreWord { name, word } => {
                write!(f, "ignore word '{}' for {}", word, name)
            }
            IgnoreReason::TooLong { words } => write!(f, "too long ({} words)", words),
            IgnoreReason::NoCommand => f.write_str("no command found"),
        }
    }
}

/// Outcome for one message. A message may yield several verdicts when the
/// heuristic pass skips ignored names before finding a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Dispatch(Command),
    Ignored(IgnoreReason),
}

/// Two-tier command classifier with a cached rule table.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    vocabulary: Vocabulary,
    general_rules: Vec<CommandRule>,
    named_rules: Vec<CommandRule>,
    matchers: Vec<NameMatcher>,
    cached_names: Option<Vec<String>>,
    heuristic: Heuristic,
}

impl Default for CommandClassifier {
    fn default() -> Self {
        // The built-in vocabulary always compiles.
        Self::new(Vocabulary::default(), DEFAULT_MAX_HEURISTIC_WORDS)
            .unwrap_or_else(|e| panic!("built-in vocabulary is invalid: {e}"))
    }
}

impl CommandClassifier {
    pub fn new(vocabulary: Vocabulary, max_heuristic_words: usize) -> Result<Self> {
        vocabulary.validate()?;
        let general_rules = rules::build_general(&vocabulary)?;
        let heuristic = Heuristic::new(&vocabulary, max_heuristic_words)?;
        Ok(Self {
            vocabulary,
            general_rules,
            named_rules: Vec::new(),
            matchers: Vec::new(),
            cached_names: None,
            heuristic,
        })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Drop the cached rule table; the next message rebuilds it.
    pub fn invalidate(&mut self) {
        self.cached_names = None;
    }

    /// Number of compiled rules for the cached name set.
    pub fn rule_count(&self) -> usize {
        self.general_rules.len() + self.named_rules.len()
    }

    /// Rebuild named rules if `names` differs from the cached snapshot.
    pub fn refresh(&mut self, names: &[String]) {
        if self.cached_names.as_deref() == Some(names) {
            return;
        }
        let built = rules::build_named(&self.vocabulary, names).and_then(|rules| {
            let matchers = names
                .iter()
                .map(|n| NameMatcher::new(n))
                .collect::<Result<Vec<_>>>()?;
            Ok((rules, matchers))
        });
        match built {
            Ok((rules, matchers)) => {
                self.named_rules = rules;
                self.matchers = matchers;
                debug!(names = names.len(), rules = self.rule_count(), "Command rules regenerated");
            }
            Err(e) => {
                warn!(error = %e, "Failed to regenerate command rules; named rules disabled");
                self.named_rules.clear();
                self.matchers.clear();
            }
        }
        self.cached_names = Some(names.to_vec());
    }

    /// Classify one message against the given timer names.
    ///
    /// Never fails: the result is at least one verdict.
    pub fn classify(&mut self, message: &str, names: &[String]) -> Vec<Verdict> {
        self.refresh(names);
        let message = message.trim();
        if message.is_empty() {
            return vec![Verdict::Ignored(IgnoreReason::NoCommand)];
        }

        let all_rules = self.general_rules.iter().chain(self.named_rules.iter());
        if let Some((rule, caps)) = rules::best_match(all_rules, message) {
            if let Some(name) = &rule.name {
                if let Some(hit) = ignore::matching_rule(&self.vocabulary.ignore, message, name) {
                    return vec![Verdict::Ignored(IgnoreReason::IgnoreWord {
                        name: name.clone(),
                        word: hit.word.clone(),
                    })];
                }
            }
            let command = match &rule.name {
                Some(name) => Command::targeted(rule.action, name.clone(), Tier::Rules),
                None => Command::general(rule.action, Tier::Rules),
            };
            return vec![Verdict::Dispatch(command.with_lap_number(rule.lap_number(&caps)))];
        }

        let verdicts = self.heuristic.classify(&self.vocabulary, &self.matchers, message);
        if verdicts.is_empty() {
            vec![Verdict::Ignored(IgnoreReason::NoCommand)]
        } else {
            verdicts
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn single(verdicts: Vec<Verdict>) -> Verdict {
        assert_eq!(verdicts.len(), 1, "{:?}", verdicts);
        verdicts.into_iter().next().unwrap()
    }

    fn dispatched(verdicts: Vec<Verdict>) -> Command {
        match single(verdicts) {
            Verdict::Dispatch(cmd) => cmd,
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[test]
    fn rule_tier_handles_named_commands_with_trailing_text() {
        let mut c = CommandClassifier::default();
        let n = names(&["Slend37", "Иванов"]);
        let cmd = dispatched(c.classify("Slend37 финишировал первым", &n));
        assert_eq!(cmd.action, Action::Stop);
        assert_eq!(cmd.target.as_deref(), Some("Slend37"));
        assert_eq!(cmd.tier, Tier::Rules);

        let cmd = dispatched(c.classify("показать иванов", &n));
        assert_eq!(cmd.action, Action::Select);
        assert_eq!(cmd.target.as_deref(), Some("Иванов"));
    }

    #[test]
    fn numbered_lap_outranks_plain_rules() {
        let mut c = CommandClassifier::default();
        let cmd = dispatched(c.classify("Иванов прошел 3 круг", &names(&["Иванов"])));
        assert_eq!(cmd.action, Action::Lap);
        assert_eq!(cmd.lap_number, Some(3));
    }

    #[test]
    fn priority_two_beats_priority_one_for_different_actions() {
        let mut vocab = Vocabulary::default();
        vocab.named.push(RuleTemplate {
            action: Action::Select,
            patterns: vec![r"{name}\s+стартовал".into()],
            priority: 2,
            extract_number: false,
            description: String::new(),
        });
        let mut c = CommandClassifier::new(vocab, 8).unwrap();
        let cmd = dispatched(c.classify("Иванов стартовал", &names(&["Иванов"])));
        assert_eq!(cmd.action, Action::Select);
    }

    #[test]
    fn general_rules_need_no_names() {
        let mut c = CommandClassifier::default();
        let cmd = dispatched(c.classify("круг всех", &names(&["A", "B"])));
        assert_eq!(cmd.action, Action::LapAll);
        assert_eq!(cmd.target, None);
        let cmd = dispatched(c.classify("Общий сброс результатов", &names(&["A"])));
        assert_eq!(cmd.action, Action::ResetAll);
    }

    #[test]
    fn ignored_rule_match_does_not_fall_through() {
        let mut vocab = Vocabulary::default();
        vocab.ignore.push(IgnoreRule { word: "фальстарт".into(), context: vec![] });
        let mut c = CommandClassifier::new(vocab, 8).unwrap();
        let verdict = single(c.classify("Иванов стартовал фальстарт", &names(&["Иванов"])));
        assert_eq!(
            verdict,
            Verdict::Ignored(IgnoreReason::IgnoreWord {
                name: "Иванов".into(),
                word: "фальстарт".into()
            })
        );
    }

    #[test]
    fn disqualification_is_ignored() {
        let mut c = CommandClassifier::default();
        let verdict = single(c.classify("Иванов дисквалифицирован", &names(&["Иванов"])));
        assert!(matches!(verdict, Verdict::Ignored(IgnoreReason::IgnoreWord { .. })));
    }

    #[test]
    fn heuristic_finds_name_anywhere() {
        let mut c = CommandClassifier::default();
        let cmd = dispatched(c.classify("кажется Иванов финиш!", &names(&["Петров", "Иванов"])));
        assert_eq!(cmd.action, Action::Stop);
        assert_eq!(cmd.tier, Tier::Heuristic);

        let cmd = dispatched(c.classify("ура Иванов прошел 2 кт", &names(&["Иванов"])));
        assert_eq!(cmd.action, Action::Lap);
        assert_eq!(cmd.lap_number, Some(2));
    }

    #[test]
    fn heuristic_requires_whole_word_names() {
        let mut c = CommandClassifier::default();
        let verdict = single(c.classify("Ивановский финиш", &names(&["Иванов"])));
        assert_eq!(verdict, Verdict::Ignored(IgnoreReason::NoCommand));
    }

    #[test]
    fn heuristic_skips_ignored_names_and_continues() {
        let mut c = CommandClassifier::default();
        let verdicts = c.classify("Петров дисквалифицирован, Иванов финиш", &names(&["Петров", "Иванов"]));
        // Both names trip the trigger because it is checked on the whole message.
        assert!(verdicts.iter().all(|v| matches!(v, Verdict::Ignored(_))));
        assert_eq!(verdicts.len(), 2);
    }

    #[test]
    fn long_messages_are_rejected_before_name_search() {
        let mut c = CommandClassifier::default();
        let verdict = single(c.classify(
            "вчера Иванов рассказал как он когда то давно финиш пересек",
            &names(&["Иванов"]),
        ));
        assert_eq!(verdict, Verdict::Ignored(IgnoreReason::TooLong { words: 10 }));
    }

    #[test]
    fn heuristic_general_phrases_end_on_word_boundary() {
        let mut c = CommandClassifier::default();
        let cmd = dispatched(c.classify("старт всех!", &names(&["A"])));
        assert_eq!(cmd.action, Action::StartAll);
        assert_eq!(cmd.tier, Tier::Heuristic);
    }

    #[test]
    fn rules_follow_name_changes() {
        let mut c = CommandClassifier::default();
        let before = single(c.classify("Сидоров старт", &names(&["Иванов"])));
        assert_eq!(before, Verdict::Ignored(IgnoreReason::NoCommand));
        let cmd = dispatched(c.classify("Сидоров старт", &names(&["Иванов", "Сидоров"])));
        assert_eq!(cmd.target.as_deref(), Some("Сидоров"));
        assert_eq!(c.rule_count(), 4 + 2 * 5);
    }

    #[test]
    fn blank_messages_are_ignored() {
        let mut c = CommandClassifier::default();
        assert_eq!(single(c.classify("   ", &[])), Verdict::Ignored(IgnoreReason::NoCommand));
    }
}
