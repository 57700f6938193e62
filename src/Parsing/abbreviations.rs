//! Resolving material acronyms like "PZT" or "LSMO" against the full
//! names seen in the same document.
//!
//! Matching works on capital-letter multisets: "BST" and
//! "Ba0.5Sr0.5TiO3" both reduce to {B,S,T}. Oxygen is excluded from
//! the multiset because it appears in nearly every oxide formula but
//! almost never in the acronym.

use std::collections::HashMap;

use log::info;
use regex::Regex;

/// Capital letters counted for acronym matching, O excluded.
fn capital_multiset(s: &str) -> Vec<char> {
    let mut caps: Vec<char> = s
        .chars()
        .filter(|c| c.is_ascii_uppercase() && *c != 'O')
        .collect();
    caps.sort_unstable();
    caps
}

/// An abbreviation is all-capitals once digits, x, dashes, dots and
/// parentheses are stripped, with at least two counted capitals.
pub fn is_abbreviation_like(word: &str) -> bool {
    let stripped: String = word
        .chars()
        .filter(|c| !matches!(c, '0'..='9' | 'x' | '-' | '(' | ')' | '.' | ' '))
        .collect();
    if stripped.is_empty() || stripped.chars().any(|c| c.is_lowercase()) {
        return false;
    }
    capital_multiset(word).len() > 1
}

/// Map every acronym in `materials` to a full material mention.
///
/// Three passes, each only filling entries still empty:
/// 1. capital multiset match against the non-acronym mentions;
/// 2. the same match against individual words of sentences that
///    contain the acronym, first hit wins;
/// 3. hyphenated acronyms whose every part already resolved are joined
///    from the parts, "PZT-PT" -> "(PbZrO3)-(PbTiO3)".
///
/// Unresolvable acronyms are dropped from the result.
pub fn build_abbreviations_dict(
    materials: &[String],
    sentences: &[String],
) -> HashMap<String, String> {
    let mut abbreviations: Vec<&String> = Vec::new();
    let mut full_names: Vec<&String> = Vec::new();
    for m in materials {
        if is_abbreviation_like(&m.replace(' ', "")) {
            if !abbreviations.contains(&m) {
                abbreviations.push(m);
            }
        } else if !full_names.contains(&m) {
            full_names.push(m);
        }
    }

    let mut resolved: HashMap<String, String> = HashMap::new();

    for abb in &abbreviations {
        let target = capital_multiset(abb);
        let hit = full_names
            .iter()
            .find(|mat| capital_multiset(mat) == target);
        if let Some(mat) = hit {
            resolved.insert((*abb).clone(), (*mat).clone());
        }
    }

    for abb in &abbreviations {
        if resolved.contains_key(abb.as_str()) {
            continue;
        }
        let target = capital_multiset(abb);
        let text: String = sentences
            .iter()
            .filter(|s| s.contains(abb.as_str()))
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            continue;
        }
        'fragments: for fragment in text.split(abb.as_str()) {
            for word in fragment.split_whitespace() {
                let word = word.trim_matches(|c: char| matches!(c, '(' | ')' | ',' | '.' | ';'));
                if word != *abb && capital_multiset(word) == target {
                    resolved.insert((*abb).clone(), word.to_string());
                    break 'fragments;
                }
            }
        }
    }

    for abb in &abbreviations {
        if resolved.contains_key(abb.as_str()) || !abb.contains('-') {
            continue;
        }
        let parts: Vec<&str> = abb.split('-').collect();
        let expansions: Vec<String> = parts
            .iter()
            .filter_map(|p| resolved.get(*p).map(|v| format!("({v})")))
            .collect();
        if expansions.len() == parts.len() {
            resolved.insert((*abb).clone(), expansions.join("-"));
        }
    }

    if !resolved.is_empty() {
        info!("resolved {} material acronyms", resolved.len());
    }
    resolved
}

/// Replace resolved acronyms inside a longer material string, longest
/// acronym first so "PZT-PT" is not eaten by "PZT".
pub fn substitute_abbreviations(name: &str, dict: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = dict.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let mut out = name.to_string();
    for key in keys {
        if out.contains(key.as_str()) {
            // only replace at word boundaries
            let pattern = format!(r"\b{}\b", regex::escape(key));
            let re = Regex::new(&pattern).unwrap();
            out = re.replace_all(&out, dict[key].as_str()).into_owned();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_abbreviation_like() {
        assert!(is_abbreviation_like("PZT"));
        assert!(is_abbreviation_like("LSMO"));
        assert!(is_abbreviation_like("BST-0.5"));
        assert!(is_abbreviation_like("PZT-PT"));
        assert!(!is_abbreviation_like("BaTiO3"));
        assert!(!is_abbreviation_like("W"));
        assert!(!is_abbreviation_like("CO2"));
        assert!(!is_abbreviation_like("titanate"));
    }

    #[test]
    fn test_resolve_from_materials() {
        let materials = vec![
            "PZT".to_string(),
            "PbZr0.5Ti0.5O3".to_string(),
            "BST".to_string(),
            "Ba0.5Sr0.5TiO3".to_string(),
        ];
        let dict = build_abbreviations_dict(&materials, &[]);
        assert_eq!(dict.get("PZT").map(String::as_str), Some("PbZr0.5Ti0.5O3"));
        assert_eq!(dict.get("BST").map(String::as_str), Some("Ba0.5Sr0.5TiO3"));
    }

    #[test]
    fn test_resolve_from_sentences() {
        let materials = vec!["LSMO".to_string()];
        let sentences = vec![
            "Thin films of La0.7Sr0.3MnO3 (LSMO) were grown on SrTiO3.".to_string(),
        ];
        let dict = build_abbreviations_dict(&materials, &sentences);
        assert_eq!(dict.get("LSMO").map(String::as_str), Some("La0.7Sr0.3MnO3"));
    }

    #[test]
    fn test_hyphenated_acronym() {
        let materials = vec![
            "PZ".to_string(),
            "PbZrO3".to_string(),
            "PT".to_string(),
            "PbTiO3".to_string(),
            "PZ-PT".to_string(),
        ];
        let dict = build_abbreviations_dict(&materials, &[]);
        assert_eq!(
            dict.get("PZ-PT").map(String::as_str),
            Some("(PbZrO3)-(PbTiO3)")
        );
    }

    #[test]
    fn test_unresolved_dropped() {
        let materials = vec!["XYZQ".to_string(), "BaTiO3".to_string()];
        let dict = build_abbreviations_dict(&materials, &[]);
        assert!(dict.is_empty());
    }

    #[test]
    fn test_substitute_abbreviations() {
        let mut dict = HashMap::new();
        dict.insert("PZT".to_string(), "PbZr0.5Ti0.5O3".to_string());
        assert_eq!(
            substitute_abbreviations("PZT thin films", &dict),
            "PbZr0.5Ti0.5O3 thin films"
        );
        assert_eq!(substitute_abbreviations("BaTiO3", &dict), "BaTiO3");
    }
}
