//! Matching file names against configured series rules and computing the
//! renamed destination file name.

use anyhow::Result;
use regex::Regex;

use crate::config::SeriesRule;
use crate::error::Error;

/// Result of checking one file name against the rule list.
#[derive(Debug)]
pub enum MatchOutcome<'a> {
    Matched(&'a SeriesRule),
    Unmatched,
}

impl MatchOutcome<'_> {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }
}

/// Check a file name against the rules in configured order. The first rule
/// whose pattern matches at the start of the name wins; later rules are
/// never evaluated once one matches.
pub fn match_file<'a>(file_name: &str, rules: &'a [SeriesRule]) -> MatchOutcome<'a> {
    for rule in rules {
        tracing::trace!(
            "Checking [{file_name}] against [{}] using pattern [{}]",
            rule.name,
            rule.regex.as_str()
        );
        if matches_at_start(&rule.regex, file_name) {
            tracing::info!("File [{file_name}] matches series [{}]", rule.name);
            return MatchOutcome::Matched(rule);
        }
    }
    tracing::debug!("Adding [{file_name}] to list of non-matches");
    MatchOutcome::Unmatched
}

/// Search-from-start semantics: the name matches when the leftmost match
/// begins at offset zero. The leftmost-match guarantee makes this exactly
/// "a match exists that starts at the beginning of the string".
fn matches_at_start(regex: &Regex, name: &str) -> bool {
    regex.find(name).is_some_and(|m| m.start() == 0)
}

/// Compute the destination file name for a matched file. Applies the
/// rule's replace template to the first regex match, then renumbers the
/// SxxEyy episode token when `episode_num_sub` is configured. Returns the
/// name unchanged if the rule configures neither.
pub fn build_name(file_name: &str, rule: &SeriesRule) -> Result<String> {
    let mut dest_file_name = file_name.to_string();

    if let Some(replace) = &rule.replace {
        tracing::trace!(
            "Processing episode name replace pattern [{replace}] for regex pattern [{}]",
            rule.regex.as_str()
        );
        dest_file_name = rule
            .regex
            .replacen(&dest_file_name, 1, replace.as_str())
            .into_owned();
    }

    if let Some(offset) = rule.episode_num_sub {
        tracing::trace!("Processing episode number subtraction [{offset}]");
        dest_file_name = renumber_episode(&dest_file_name, offset)?;
    }

    tracing::debug!("New name for [{file_name}] will be [{dest_file_name}]");
    Ok(dest_file_name)
}

/// Subtract `offset` from the two-digit episode number of the name's
/// SxxEyy token and substitute the result back in, replacing every
/// occurrence of the original token. The new number renders as a plain
/// decimal with no re-padding, which is the legacy renumbering contract.
fn renumber_episode(name: &str, offset: i64) -> Result<String> {
    // Whole match is the season/episode token; group 1 is the episode number.
    let token_regex = Regex::new(r"[sS]\d\d[eE](\d\d)")?;

    let Some(caps) = token_regex.captures_iter(name).last() else {
        return Err(Error::PatternMismatch {
            name: name.to_string(),
        }
        .into());
    };

    let episode_string = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
    let episode_num: i64 = caps[1].parse()?;

    let new_num = episode_num - offset;

    // The episode number is the last two characters of the token.
    let new_episode_string = format!(
        "{}{new_num}",
        &episode_string[..episode_string.len() - 2]
    );
    tracing::trace!("new episode string: {new_episode_string}");

    Ok(name.replace(&episode_string, &new_episode_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RawRule, validate_series};

    fn rules(entries: &[(&str, &str)]) -> Vec<SeriesRule> {
        let raw: Vec<RawRule> = entries
            .iter()
            .map(|(name, regex)| RawRule {
                name: Some(name.to_string()),
                regex: Some(regex.to_string()),
                ..RawRule::default()
            })
            .collect();
        validate_series(&raw).unwrap()
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = rules(&[
            ("Broad", r".*GATE.*"),
            ("Narrow", r"\[HorribleSubs\] GATE - \d+.*"),
        ]);
        match match_file("[HorribleSubs] GATE - 24 [1080p]", &rules) {
            MatchOutcome::Matched(rule) => assert_eq!(rule.name, "Broad"),
            MatchOutcome::Unmatched => panic!("expected a match"),
        }
    }

    #[test]
    fn no_rule_matches() {
        let rules = rules(&[("GATE", r"\[HorribleSubs\] GATE - \d+.*")]);
        assert!(!match_file("testFile1", &rules).is_match());
    }

    #[test]
    fn matching_is_anchored_to_the_start() {
        let rules = rules(&[("Show", r"Show - \d+")]);
        assert!(match_file("Show - 03 [720p]", &rules).is_match());
        // The pattern occurs later in the name, so search-from-start fails.
        assert!(!match_file("prefix Show - 03", &rules).is_match());
    }

    #[test]
    fn build_name_without_options_returns_name_unchanged() {
        let rules = rules(&[("Show", r"Show - \d+")]);
        let name = "Show - 03 [720p].mkv";
        assert_eq!(build_name(name, &rules[0]).unwrap(), name);
    }

    #[test]
    fn build_name_applies_replace_template() {
        let raw = RawRule {
            name: Some("Slime".to_string()),
            regex: Some(r"(.*)Tensei Shitara Slime Datta Ken - (\d+)(.*)".to_string()),
            replace: Some("${1}That Time I Got Reincarnated as a Slime - S02E${2}${3}".to_string()),
            ..RawRule::default()
        };
        let rules = validate_series(&[raw]).unwrap();
        let built = build_name("[Judas] Tensei Shitara Slime Datta Ken - 38 [1080p]", &rules[0]).unwrap();
        assert_eq!(
            built,
            "[Judas] That Time I Got Reincarnated as a Slime - S02E38 [1080p]"
        );
    }

    #[test]
    fn build_name_renumbers_episode_after_replace() {
        let raw = RawRule {
            name: Some("Slime".to_string()),
            regex: Some(r"(.*)Tensei Shitara Slime Datta Ken - (\d+)(.*)".to_string()),
            replace: Some("${1}That Time I Got Reincarnated as a Slime - S02E${2}${3}".to_string()),
            episode_num_sub: Some(serde_json::json!(24)),
            ..RawRule::default()
        };
        let rules = validate_series(&[raw]).unwrap();
        let built = build_name("[Judas] Tensei Shitara Slime Datta Ken - 38 [1080p]", &rules[0]).unwrap();
        assert_eq!(
            built,
            "[Judas] That Time I Got Reincarnated as a Slime - S02E14 [1080p]"
        );
    }

    #[test]
    fn renumber_replaces_every_occurrence_of_the_token() {
        assert_eq!(
            renumber_episode("Show.S02E38.S02E38.mkv", 24).unwrap(),
            "Show.S02E14.S02E14.mkv"
        );
    }

    #[test]
    fn renumber_does_not_re_pad_single_digits() {
        // Legacy behavior: 38 - 38 renders as S02E0, not S02E00.
        assert_eq!(renumber_episode("Show.S02E38.mkv", 38).unwrap(), "Show.S02E0.mkv");
    }

    #[test]
    fn renumber_without_token_is_a_pattern_mismatch() {
        let raw = RawRule {
            name: Some("Show".to_string()),
            regex: Some(r"Show - \d+".to_string()),
            episode_num_sub: Some(serde_json::json!(1)),
            ..RawRule::default()
        };
        let rules = validate_series(&[raw]).unwrap();
        let err = build_name("Show - 03 [720p].mkv", &rules[0]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::PatternMismatch { .. })
        ));
    }
}
