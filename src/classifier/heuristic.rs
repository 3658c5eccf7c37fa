//! Fallback pass for messages the rule table does not recognise.

use lazy_static::lazy_static;
use regex::Regex;

use super::ignore::{matching_rule, strip_name};
use super::vocabulary::{Vocabulary, build, compile_heuristic};
use super::{IgnoreReason, Verdict};
use crate::error::Result;
use crate::types::{Action, Command, Tier};

lazy_static! {
    static ref RE_FIRST_NUMBER: Regex = Regex::new(r"(\d+)").unwrap();
}

/// Whole-word matcher for one timer name.
///
/// The name must sit between non-word characters or the ends of the
/// message, which also holds for names that start or end in punctuation.
#[derive(Debug, Clone)]
pub(crate) struct NameMatcher {
    pub name: String,
    regex: Regex,
}

impl NameMatcher {
    pub fn new(name: &str) -> Result<Self> {
        let source = format!(r"(?:^|\W){}(?:\W|$)", regex::escape(&name.to_lowercase()));
        Ok(Self {
            name: name.to_string(),
            regex: build(&source)?,
        })
    }

    pub fn is_match(&self, message: &str) -> bool {
        self.regex.is_match(message)
    }
}

/// Compiled heuristic state that does not depend on timer names.
#[derive(Debug, Clone)]
pub(crate) struct Heuristic {
    general: Vec<(Action, Regex)>,
    max_words: usize,
}

impl Heuristic {
    pub fn new(vocabulary: &Vocabulary, max_words: usize) -> Result<Self> {
        let general = vocabulary
            .heuristic
            .general
            .iter()
            .map(|t| Ok((t.action, compile_heuristic(t)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { general, max_words })
    }

    /// Run the fallback pass.
    ///
    /// Ignored candidates are reported and skipped; the first candidate that
    /// yields a command word ends the pass. Without one, the general phrases
    /// are tried.
    pub fn classify(
        &self,
        vocabulary: &Vocabulary,
        matchers: &[NameMatcher],
        message: &str,
    ) -> Vec<Verdict> {
        let word_count = message.split_whitespace().count();
        if word_count > self.max_words {
            return vec![Verdict::Ignored(IgnoreReason::TooLong { words: word_count })];
        }

        let mut verdicts = Vec::new();
        for matcher in matchers.iter().filter(|m| m.is_match(message)) {
            if let Some(rule) = matching_rule(&vocabulary.ignore, message, &matcher.name) {
                verdicts.push(Verdict::Ignored(IgnoreReason::IgnoreWord {
                    name: matcher.name.clone(),
                    word: rule.word.clone(),
                }));
                continue;
            }

            let rest = strip_name(message, &matcher.name);
            let action = rest
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .find_map(|w| vocabulary.heuristic.action_for(w));

            if let Some(action) = action {
                let lap_number = match action {
                    Action::Lap => RE_FIRST_NUMBER
                        .captures(&rest)
                        .and_then(|c| c[1].parse().ok()),
                    _ => None,
                };
                verdicts.push(Verdict::Dispatch(
                    Command::targeted(action, matcher.name.clone(), Tier::Heuristic)
                        .with_lap_number(lap_number),
                ));
                return verdicts;
            }
        }

        if let Some((action, _)) = self.general.iter().find(|(_, re)| re.is_match(message)) {
            verdicts.push(Verdict::Dispatch(Command::general(*action, Tier::Heuristic)));
        }
        verdicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_whole_words_only() {
        let petrov = NameMatcher::new("Петров").unwrap();
        assert!(petrov.is_match("Петров стартовал"));
        assert!(petrov.is_match("вперёд, петров!"));
        assert!(!petrov.is_match("Петрова стартовала"));
        assert!(!petrov.is_match("Сидоров-Петровский"));
    }

    #[test]
    fn names_with_punctuation_at_the_edges_match() {
        let second = NameMatcher::new("Петров (2)").unwrap();
        assert!(second.is_match("Петров (2) стартовал"));
        assert!(second.is_match("старт Петров (2)"));
        assert!(!second.is_match("Петров (22) стартовал"));

        let vocabulary = Vocabulary::default();
        let heuristic = Heuristic::new(&vocabulary, 7).unwrap();
        let verdicts = heuristic.classify(&vocabulary, &[second], "сегодня Петров (2) стартовал бодро");
        assert_eq!(
            verdicts,
            vec![Verdict::Dispatch(Command::targeted(
                Action::Start,
                "Петров (2)",
                Tier::Heuristic
            ))]
        );
    }
}
