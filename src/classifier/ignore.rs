//! Suppression of phrases that must never act on a timer.

use super::vocabulary::IgnoreRule;

/// Remove every case-insensitive occurrence of `name` from the message.
pub(crate) fn strip_name(message: &str, name: &str) -> String {
    let lowered = message.to_lowercase();
    let name = name.to_lowercase();
    if name.is_empty() {
        return lowered.trim().to_string();
    }
    lowered.replace(&name, " ").trim().to_string()
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

/// Find the first ignore rule that suppresses `message` for `name`.
///
/// The trigger word is searched as a substring of the message with the name
/// removed; context words, when listed, must appear as whole words.
pub(crate) fn matching_rule<'a>(
    rules: &'a [IgnoreRule],
    message: &str,
    name: &str,
) -> Option<&'a IgnoreRule> {
    let text = strip_name(message, name);
    rules.iter().find(|rule| {
        let trigger = rule.word.to_lowercase();
        if !text.contains(&trigger) {
            return false;
        }
        if rule.context.is_empty() {
            return true;
        }
        words(&text).any(|w| rule.context.iter().any(|c| c.to_lowercase() == w))
    })
}
