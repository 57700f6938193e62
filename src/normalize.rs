//! Normalization of extracted material mentions to canonical formulas.
//!
//! A tagger produces token-level entity labels; this module merges them
//! into mentions and reduces each mention to an alphabetized integer
//! formula ("Li2(FePO4)2" -> "FeLiO4P") where that is possible. A
//! mention with substitution placeholders or stoichiometric variables
//! expands into one canonical formula per candidate.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use reqwest::blocking::Client;

use crate::Parsing::abbreviations::build_abbreviations_dict;
use crate::Parsing::formula_parser::Composition;
use crate::Parsing::material_parser::{ChemicalStructure, MaterialParser};
use crate::Parsing::name_resolver::HttpClient;
use crate::Parsing::stoich_expr;
use crate::Parsing::variables::{get_elements_values, get_stoichiometric_values};

/// Merge token-level B-/I-/O labels into (mention, tag) pairs.
/// Tokens tagged "B-MAT" start a mention, following "I-MAT" tokens
/// extend it, everything else closes it.
pub fn concatenate_entities(tokens: &[(String, String)]) -> Vec<(String, String)> {
    let mut mentions = Vec::new();
    let mut current: Option<(String, String)> = None;
    for (text, tag) in tokens {
        if let Some(kind) = tag.strip_prefix("B-") {
            if let Some(done) = current.take() {
                mentions.push(done);
            }
            current = Some((text.clone(), kind.to_string()));
        } else if let Some(kind) = tag.strip_prefix("I-") {
            match &mut current {
                Some((mention, k)) if k == kind => {
                    mention.push(' ');
                    mention.push_str(text);
                }
                _ => current = Some((text.clone(), kind.to_string())),
            }
        } else if let Some(done) = current.take() {
            mentions.push(done);
        }
    }
    if let Some(done) = current {
        mentions.push(done);
    }
    mentions
}

/// Mentions passed through untouched: real materials with no sensible
/// stoichiometric formula.
const SPECIAL_MATERIALS: &[&str] = &[
    "air", "graphene", "graphite", "diamond", "steel", "glass", "water", "PDMS", "PMMA",
];

/// Reduce a fully numeric composition to its alphabetized integer
/// formula: amounts are scaled to the smallest integer vector, divided
/// by their gcd, and elements sorted alphabetically. "1" subscripts are
/// omitted. Returns None when any amount is symbolic or non-positive.
pub fn alphabetize_reduce(composition: &Composition) -> Option<String> {
    if composition.is_empty() {
        return None;
    }
    let mut ratios: Vec<(String, i64, i64)> = Vec::new();
    for (el, amt) in composition.iter() {
        let (num, den) = stoich_expr::eval_rational(amt).ok()?;
        if num <= 0 {
            return None;
        }
        ratios.push((el.to_string(), num, den));
    }
    let mut scale: i64 = 1;
    for (_, _, den) in &ratios {
        scale = scale.checked_mul(den / gcd(scale, *den))?;
    }
    let mut counts: Vec<(String, i64)> = ratios
        .into_iter()
        .map(|(el, num, den)| (el, num * (scale / den)))
        .collect();
    let mut g = 0;
    for (_, c) in &counts {
        g = gcd(g, *c);
    }
    if g > 1 {
        for (_, c) in &mut counts {
            *c /= g;
        }
    }
    counts.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out = String::new();
    for (el, c) in counts {
        out.push_str(&el);
        if c > 1 {
            out.push_str(&c.to_string());
        }
    }
    Some(out)
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

/// Top-level normalizer holding the parser and a per-document cache of
/// resolved mentions.
pub struct MatNormalizer<C: HttpClient = Client> {
    parser: MaterialParser<C>,
    special: HashSet<String>,
    lookup: HashMap<String, String>,
}

impl MatNormalizer<Client> {
    pub fn new() -> Self {
        Self::with_parser(MaterialParser::new())
    }
}

impl Default for MatNormalizer<Client> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: HttpClient> MatNormalizer<C> {
    pub fn with_parser(parser: MaterialParser<C>) -> Self {
        MatNormalizer {
            parser,
            special: SPECIAL_MATERIALS.iter().map(|s| s.to_string()).collect(),
            lookup: HashMap::new(),
        }
    }

    pub fn parser(&self) -> &MaterialParser<C> {
        &self.parser
    }

    /// Remember a resolution so repeated mentions in a document are
    /// answered from the cache.
    pub fn remember(&mut self, mention: &str, formula: &str) {
        self.lookup.insert(mention.to_string(), formula.to_string());
    }

    /// Resolve one mention to its canonical formula candidates.
    /// `all_mentions` and `sentences` provide document context for
    /// acronym expansion and variable-value search. An empty result
    /// means the mention stays as it was written.
    pub fn resolve_mention(
        &self,
        mention: &str,
        all_mentions: &[String],
        sentences: &[String],
    ) -> Vec<String> {
        let mention = mention.replace('_', " ");
        if self.special.contains(mention.as_str()) {
            return vec![mention];
        }
        if let Some(known) = self.lookup.get(mention.as_str()) {
            return vec![known.clone()];
        }

        let structure = self.parser.get_chemical_structure(&mention);
        if let Some(canonical) = self.canonical_of(&structure) {
            return vec![canonical];
        }

        // an acronym resolves through its document-level expansion
        let acronyms = build_abbreviations_dict(all_mentions, sentences);
        if let Some(expansion) = acronyms.get(mention.as_str()) {
            let expanded = self.parser.get_chemical_structure(expansion);
            if let Some(canonical) = self.canonical_of(&expanded) {
                return vec![canonical];
            }
        }

        // substitution placeholders fan out into one formula each
        if !structure.elements_vars.is_empty() && structure.is_resolved() {
            let candidates = self.expand_element_vars(&structure, sentences);
            if !candidates.is_empty() {
                info!(
                    "'{mention}' expanded into {} element substitutions",
                    candidates.len()
                );
                return candidates;
            }
        }

        // stoichiometric variables take their values from the text
        if !structure.fraction_vars.is_empty() && structure.is_resolved() {
            let candidates = self.expand_fraction_vars(&structure, sentences);
            if !candidates.is_empty() {
                info!(
                    "'{mention}' expanded into {} stoichiometries",
                    candidates.len()
                );
                return candidates;
            }
        }

        debug!("mention '{mention}' left unresolved");
        Vec::new()
    }

    /// First candidate of `resolve_mention`, or the mention itself.
    pub fn normalize_mention(
        &self,
        mention: &str,
        all_mentions: &[String],
        sentences: &[String],
    ) -> String {
        self.resolve_mention(mention, all_mentions, sentences)
            .into_iter()
            .next()
            .unwrap_or_else(|| mention.to_string())
    }

    fn canonical_of(&self, structure: &ChemicalStructure) -> Option<String> {
        if !structure.is_resolved()
            || !structure.elements_vars.is_empty()
            || !structure.fraction_vars.is_empty()
        {
            return None;
        }
        alphabetize_reduce(&structure.composition)
    }

    fn expand_element_vars(
        &self,
        structure: &ChemicalStructure,
        sentences: &[String],
    ) -> Vec<String> {
        let tables = self.parser.tables();
        let mut compositions = vec![structure.composition.clone()];
        // candidate order must not depend on hash-map iteration
        let mut vars: Vec<(&String, &Vec<String>)> = structure.elements_vars.iter().collect();
        vars.sort_by(|a, b| a.0.cmp(b.0));
        for (var, known) in vars {
            let candidates: Vec<String> = if known.is_empty() {
                sentences
                    .iter()
                    .map(|s| get_elements_values(var, s, tables))
                    .find(|v| !v.is_empty())
                    .unwrap_or_default()
            } else {
                known.clone()
            };
            if candidates.is_empty() {
                return Vec::new();
            }
            let mut next = Vec::new();
            for comp in &compositions {
                let Some(amount) = comp.get(var).map(str::to_string) else {
                    continue;
                };
                for el in &candidates {
                    let mut substituted = comp.clone();
                    substituted.remove(var);
                    merge_amount(&mut substituted, el, &amount);
                    next.push(substituted);
                }
            }
            compositions = next;
        }
        compositions
            .iter()
            .filter_map(alphabetize_reduce)
            .collect()
    }

    fn expand_fraction_vars(
        &self,
        structure: &ChemicalStructure,
        sentences: &[String],
    ) -> Vec<String> {
        let mut compositions = vec![structure.composition.clone()];
        let mut vars: Vec<(&String, &Vec<f64>)> = structure.fraction_vars.iter().collect();
        vars.sort_by(|a, b| a.0.cmp(b.0));
        for (var, known) in vars {
            let values: Vec<f64> = if known.is_empty() {
                sentences
                    .iter()
                    .map(|s| get_stoichiometric_values(var, s))
                    .find(|v| !v.values.is_empty())
                    .map(|v| v.values)
                    .unwrap_or_default()
            } else {
                known.clone()
            };
            if values.is_empty() {
                return Vec::new();
            }
            let var_char = match var.chars().next() {
                Some(c) => c,
                None => continue,
            };
            let mut next = Vec::new();
            for comp in &compositions {
                for value in &values {
                    if let Some(substituted) = substitute_in_composition(comp, var_char, *value) {
                        next.push(substituted);
                    }
                }
            }
            compositions = next;
        }
        // substitution must not lose elements to zero amounts
        let expected = structure.composition.len();
        compositions
            .iter()
            .filter(|c| c.len() == expected)
            .filter_map(alphabetize_reduce)
            .collect()
    }
}

fn merge_amount(comp: &mut Composition, el: &str, amount: &str) {
    match comp.get(el).map(str::to_string) {
        Some(old) => {
            let combined = stoich_expr::simplify(&format!("({old})+({amount})"))
                .unwrap_or_else(|_| old.clone());
            comp.insert(el, combined);
        }
        None => comp.insert(el, amount),
    }
}

fn substitute_in_composition(comp: &Composition, var: char, value: f64) -> Option<Composition> {
    let value_str = format!("{value}");
    let mut out = Composition::new();
    for (el, amt) in comp.iter() {
        let substituted = stoich_expr::substitute(amt, var, &value_str).ok()?;
        // elements vanishing at this value are dropped, "1-x" at x=1
        if stoich_expr::eval_rational(&substituted) == Ok((0, 1)) {
            continue;
        }
        out.insert(el, substituted);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(pairs: &[(&str, &str)]) -> Composition {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_concatenate_entities() {
        let tokens: Vec<(String, String)> = [
            ("Thin", "O"),
            ("BaTiO3", "B-MAT"),
            ("films", "O"),
            ("lead", "B-MAT"),
            ("zirconate", "I-MAT"),
            (".", "O"),
        ]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
        let mentions = concatenate_entities(&tokens);
        assert_eq!(
            mentions,
            vec![
                ("BaTiO3".to_string(), "MAT".to_string()),
                ("lead zirconate".to_string(), "MAT".to_string()),
            ]
        );
    }

    #[test]
    fn test_concatenate_trailing_mention() {
        let tokens: Vec<(String, String)> =
            vec![("SrTiO3".to_string(), "B-MAT".to_string())];
        assert_eq!(concatenate_entities(&tokens).len(), 1);
    }

    #[test]
    fn test_alphabetize_reduce_integer() {
        let c = comp(&[("Ba", "1"), ("Ti", "1"), ("O", "3")]);
        assert_eq!(alphabetize_reduce(&c), Some("BaO3Ti".to_string()));
    }

    #[test]
    fn test_alphabetize_reduce_scales_fractions() {
        let c = comp(&[("Sr", "1"), ("Zr", "0.5"), ("Ti", "0.5"), ("O", "3")]);
        assert_eq!(alphabetize_reduce(&c), Some("O6Sr2TiZr".to_string()));
    }

    #[test]
    fn test_alphabetize_reduce_common_factor() {
        let c = comp(&[("Li", "2"), ("Fe", "2"), ("P", "2"), ("O", "8")]);
        assert_eq!(alphabetize_reduce(&c), Some("FeLiO4P".to_string()));
    }

    #[test]
    fn test_alphabetize_reduce_rejects_symbolic() {
        let c = comp(&[("Fe", "1-x"), ("O", "1")]);
        assert_eq!(alphabetize_reduce(&c), None);
    }

    #[test]
    fn test_normalize_simple_formula() {
        let normalizer = MatNormalizer::new();
        assert_eq!(normalizer.normalize_mention("BaTiO3", &[], &[]), "BaO3Ti");
    }

    #[test]
    fn test_normalize_written_name() {
        let normalizer = MatNormalizer::new();
        assert_eq!(
            normalizer.normalize_mention("strontium titanate", &[], &[]),
            "O3SrTi"
        );
    }

    #[test]
    fn test_normalize_special_material() {
        let normalizer = MatNormalizer::new();
        assert_eq!(normalizer.normalize_mention("graphene", &[], &[]), "graphene");
    }

    #[test]
    fn test_normalize_cache() {
        let mut normalizer = MatNormalizer::new();
        normalizer.remember("our sample", "BaO3Ti");
        assert_eq!(normalizer.normalize_mention("our sample", &[], &[]), "BaO3Ti");
    }

    #[test]
    fn test_normalize_acronym() {
        let normalizer = MatNormalizer::new();
        let mentions = vec!["BST".to_string(), "Ba0.5Sr0.5TiO3".to_string()];
        let resolved = normalizer.resolve_mention("BST", &mentions, &[]);
        assert_eq!(resolved, vec!["BaO6SrTi2".to_string()]);
    }

    #[test]
    fn test_expand_element_vars() {
        let normalizer = MatNormalizer::new();
        let sentences = vec!["the MO2 oxides with M = Ti, Zr were studied".to_string()];
        let resolved = normalizer.resolve_mention("MO2", &[], &sentences);
        assert_eq!(resolved, vec!["O2Ti".to_string(), "O2Zr".to_string()]);
    }

    #[test]
    fn test_expand_two_element_vars_deterministic_order() {
        let normalizer = MatNormalizer::new();
        let sentences =
            vec!["perovskites AMO3 with A = Sr, Ba and M = Ti, Zr were compared".to_string()];
        // two placeholders expand in sorted variable order, so the
        // candidate list is reproducible across runs
        for _ in 0..3 {
            let resolved = normalizer.resolve_mention("AMO3", &[], &sentences);
            assert_eq!(
                resolved,
                vec![
                    "O3SrTi".to_string(),
                    "O3SrZr".to_string(),
                    "BaO3Ti".to_string(),
                    "BaO3Zr".to_string(),
                ]
            );
        }
    }

    #[test]
    fn test_expand_fraction_vars() {
        let normalizer = MatNormalizer::new();
        let sentences = vec!["samples with x = 0.5 were prepared".to_string()];
        let resolved = normalizer.resolve_mention("BaxSr1-xTiO3", &[], &sentences);
        assert_eq!(resolved, vec!["BaO6SrTi2".to_string()]);
    }

    #[test]
    fn test_unresolvable_mention_kept() {
        let normalizer = MatNormalizer::new();
        assert_eq!(
            normalizer.normalize_mention("some unknown stuff", &[], &[]),
            "some unknown stuff"
        );
    }
}
