//! Keyword rule evaluation.
//!
//! Every configured rule is evaluated against the image's keywords. Matching
//! rules accumulate: all of them contribute keywords to remove and albums to
//! add, in configured order.

use crate::keywords::{contains_all, contains_any, difference, intersection};
use crate::types::{Album, Rule};

/// The combined effect of all rules on one image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    /// Keywords to strip from the file, in match order. May repeat when
    /// several rules match the same keyword.
    pub keywords_to_remove: Vec<String>,

    /// Keywords to send as tags
    pub keywords_to_add: Vec<String>,

    /// Albums to add the photo to, in match order. Repeats are kept.
    pub albums_to_add: Vec<Album>,
}

impl RuleOutcome {
    /// True if the rules asked for anything to happen
    pub fn has_actions(&self) -> bool {
        !self.keywords_to_remove.is_empty() || !self.albums_to_add.is_empty()
    }

    /// Operator-facing description of the actions
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.keywords_to_remove.is_empty() {
            lines.push(format!(
                "keywords to remove: {}",
                self.keywords_to_remove.join(", ")
            ));
        }
        if !self.albums_to_add.is_empty() {
            let names: Vec<&str> = self.albums_to_add.iter().map(|a| a.name.as_str()).collect();
            lines.push(format!("albums to add to: {}", names.join(", ")));
        }
        lines
    }
}

/// Keywords a single rule acts on, or `None` if the rule does not apply
pub fn matched_keywords(keywords: &[String], rule: &Rule) -> Option<Vec<String>> {
    let condition = &rule.condition;

    if !condition.excludes_all.is_empty() && contains_all(keywords, &condition.excludes_all) {
        return None;
    }

    if !condition.excludes_any.is_empty() && contains_any(keywords, &condition.excludes_any) {
        return None;
    }

    if !condition.includes_all.is_empty() {
        if !contains_all(keywords, &condition.includes_all) {
            return None;
        }
        return Some(condition.includes_all.clone());
    }

    if !condition.includes_any.is_empty() {
        let matched = intersection(keywords, &condition.includes_any);
        if matched.is_empty() {
            return None;
        }
        return Some(matched);
    }

    // No include condition: the rule names no keywords, so it never applies
    None
}

/// Evaluate all rules against an image's keywords
pub fn evaluate(keywords: &[String], rules: &[Rule]) -> RuleOutcome {
    let mut keywords_to_remove = Vec::new();
    let mut albums_to_add = Vec::new();

    for rule in rules {
        let Some(matched) = matched_keywords(keywords, rule) else {
            continue;
        };

        if rule.action.delete {
            keywords_to_remove.extend(matched);
        }
        albums_to_add.extend(rule.action.albums.iter().cloned());
    }

    let keywords_to_add = if keywords_to_remove.is_empty() {
        keywords.to_vec()
    } else {
        difference(keywords, &keywords_to_remove)
    };

    RuleOutcome {
        keywords_to_remove,
        keywords_to_add,
        albums_to_add,
    }
}
