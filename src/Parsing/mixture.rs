//! Splitting composite material names into weighted compounds.
//!
//! Mixture notation glues compounds together with dashes or middle
//! dots and optional molar fractions: "(1-x)BaTiO3-xSrTiO3",
//! "0.95MgTiO3-0.05CaTiO3", "La2O3·nH2O". The splitter has to tell a
//! compound separator apart from the same dash inside a stoichiometric
//! amount ("Fe1-xO" stays whole), which takes context on both sides of
//! the dash.

use log::warn;
use regex::Regex;

use super::chem_elements::ElementTables;
use super::formula_parser::{check_parentheses, parentheses_balanced};
use super::stoich_expr;

const SEPARATORS: &[char] = &['-', '⋅', '·', '∙', '∗', '*'];

fn is_separator(c: char) -> bool {
    SEPARATORS.contains(&c)
}

fn is_fraction_var(c: char) -> bool {
    matches!(c, 'x' | 'y' | 'z')
}

/// Split a material name into (compound formula, fraction expression)
/// pairs. A plain single-compound name comes back as one entry with
/// fraction "1". Fractions are canonicalized; one that cannot be
/// simplified degrades to "1".
pub fn split_formula_into_compounds(
    name: &str,
    tables: &ElementTables,
) -> Vec<(String, String)> {
    let mut split = split_once_level(name, "1", tables);
    // re-split until the partition stops changing
    let mut prev_len = 0;
    while split.len() != prev_len {
        prev_len = split.len();
        let mut next = Vec::new();
        for (m, f) in &split {
            next.extend(split_once_level(m, f, tables));
        }
        split = next;
    }

    let mut compounds: Vec<(String, String)> = Vec::new();
    for (m, f) in split {
        let formula = check_parentheses(&m);
        if formula.is_empty() {
            continue;
        }
        let fraction = match stoich_expr::simplify(&f) {
            Ok(s) => s,
            Err(e) => {
                warn!("unsimplifiable mixture fraction '{f}' in '{name}': {e}");
                "1".to_string()
            }
        };
        match compounds.iter_mut().find(|(k, _)| *k == formula) {
            Some((_, v)) => *v = fraction,
            None => compounds.push((formula, fraction)),
        }
    }
    compounds
}

/// One round of splitting: complement notation, hydrate tails, then the
/// generic separator scan, followed by fraction-prefix extraction.
fn split_once_level(
    material_name: &str,
    init_fraction: &str,
    tables: &ElementTables,
) -> Vec<(String, String)> {
    let name: String = material_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '−' | '–' => '-',
            other => other,
        })
        .collect();
    if name.is_empty() {
        return Vec::new();
    }

    // "(1-x)A-xB" complement notation takes fractions 1-x and x
    if let Some(parts) = split_complement(&name, init_fraction) {
        return parts;
    }

    // a trailing hydrate is its own compound
    let hydrate_re = Regex::new(r"[-⋅·∙∗\*]([nx0-9\.]*H2O)$").unwrap();
    let (body, hydrate) = match hydrate_re.captures(&name) {
        Some(c) => {
            let whole = c.get(0).map(|m| m.start()).unwrap_or(name.len());
            (
                name[..whole].to_string(),
                Some(c.get(1).map(|m| m.as_str().to_string()).unwrap_or_default()),
            )
        }
        None => (name.clone(), None),
    };

    let mut parts: Vec<String> = Vec::new();
    for part in split_at_separators(&body, tables) {
        parts.extend(split_before_fraction_var(&part));
    }
    if let Some(h) = hydrate {
        parts.push(h);
    }

    // "Y-Ba2Cu3O7" style element lists are one compound, not a mixture
    if parts.len() > 1 {
        let head = &parts[..parts.len() - 1];
        if head
            .iter()
            .any(|p| tables.is_element(p.trim_matches(|c: char| c.is_ascii_digit())))
        {
            return vec![(parts.join("-"), init_fraction.to_string())];
        }
    }

    // a chunk whose only capital is O belongs to the previous compound
    let mut merged: Vec<String> = Vec::new();
    for part in parts {
        let caps: Vec<char> = part.chars().filter(|c| c.is_ascii_uppercase()).collect();
        if caps == ['O'] && !merged.is_empty() {
            let last = merged.last_mut().unwrap();
            last.push('-');
            last.push_str(&part);
        } else {
            merged.push(part);
        }
    }

    let mut out = Vec::new();
    for part in merged {
        if let Some((formula, fraction)) = extract_leading_fraction(&part) {
            out.push((formula, format!("({fraction})*({init_fraction})")));
        }
    }
    out
}

/// "(1-x)BaTiO3-xSrTiO3" and the percent form "(100-x)..." assign the
/// complement fraction to the first compound. The split point is the
/// last separator immediately followed by the variable.
fn split_complement(name: &str, init_fraction: &str) -> Option<Vec<(String, String)>> {
    let head_re = Regex::new(r"^\((1|100)-([xyz])\)(.*)$").unwrap();
    let caps = head_re.captures(name)?;
    let var = caps.get(2)?.as_str().chars().next()?;
    let rest = caps.get(3)?.as_str().replace(&format!("({var})"), &var.to_string());

    let chars: Vec<char> = rest.chars().collect();
    let mut split_at: Option<usize> = None;
    let mut byte = 0usize;
    for i in 0..chars.len() {
        if is_separator(chars[i]) || chars[i] == '+' {
            if chars.get(i + 1) == Some(&var) {
                split_at = Some(byte);
            }
        }
        byte += chars[i].len_utf8();
    }
    let at = split_at?;
    let sep_len = rest[at..].chars().next().map(char::len_utf8).unwrap_or(1);
    let first = &rest[..at];
    let second = &rest[at + sep_len + var.len_utf8()..];
    if first.is_empty() || second.is_empty() {
        return None;
    }
    Some(vec![
        (
            first.to_string(),
            format!("(1-{var})*({init_fraction})"),
        ),
        (second.to_string(), format!("({var})*({init_fraction})")),
    ])
}

/// Generic separator scan. A dash splits only when its left side ends a
/// compound (digit, closing parenthesis, uppercase letter or a complete
/// two-letter element) and its right side starts one (digit, opening
/// parenthesis or uppercase letter).
fn split_at_separators(body: &str, tables: &ElementTables) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    let mut cuts: Vec<usize> = Vec::new();
    let mut byte = 0usize;
    for i in 0..chars.len() {
        let c = chars[i];
        if i > 0 && i + 1 < chars.len() && is_separator(c) {
            let prev = chars[i - 1];
            let next = chars[i + 1];
            let next_ok = next == '(' || next.is_ascii_digit() || next.is_ascii_uppercase();
            let mut prev_ok =
                prev.is_ascii_digit() || prev == ')' || prev.is_ascii_uppercase();
            if !prev_ok && prev.is_ascii_lowercase() && i >= 2 {
                let two: String = chars[i - 2..i].iter().collect();
                prev_ok = tables.is_element(&two);
            }
            if prev_ok && next_ok {
                cuts.push(byte);
            }
        }
        byte += c.len_utf8();
    }
    cut_string(body, &cuts)
}

/// Second pass: "BaTiO3-xSrTiO3" splits before the fraction variable.
/// The variable must introduce another compound; a trailing "O3-x" is an
/// oxygen deficiency and stays put.
fn split_before_fraction_var(part: &str) -> Vec<String> {
    let chars: Vec<char> = part.chars().collect();
    let mut cuts: Vec<usize> = Vec::new();
    let mut byte = 0usize;
    for i in 0..chars.len() {
        let c = chars[i];
        if i > 0 && is_separator(c) {
            let followed = chars.get(i + 1).copied().filter(|&v| is_fraction_var(v));
            let after_var = chars.get(i + 2).copied();
            if let (Some(_), Some(a)) = (followed, after_var) {
                if a.is_ascii_uppercase() || a == '(' {
                    let prev = chars[i - 1];
                    let prev_ok = if prev.is_ascii_uppercase() || prev == ')' {
                        true
                    } else if prev.is_ascii_digit() {
                        // digits only separate when subscripting oxygen
                        let mut j = i - 1;
                        while j > 0 && (chars[j].is_ascii_digit() || chars[j] == ')' || chars[j] == '.') {
                            j -= 1;
                        }
                        chars[j] == 'O'
                    } else {
                        false
                    };
                    if prev_ok {
                        cuts.push(byte);
                    }
                }
            }
        }
        byte += c.len_utf8();
    }
    cut_string(part, &cuts)
}

/// Cut a string at the given byte offsets, dropping the one-char
/// separator found at each offset.
fn cut_string(s: &str, cuts: &[usize]) -> Vec<String> {
    if cuts.is_empty() {
        return vec![s.to_string()];
    }
    let mut out = Vec::new();
    let mut start = 0usize;
    for &cut in cuts {
        if cut > start {
            out.push(s[start..cut].to_string());
        }
        let sep_len = s[cut..].chars().next().map(char::len_utf8).unwrap_or(1);
        start = cut + sep_len;
    }
    if start < s.len() {
        out.push(s[start..].to_string());
    }
    out
}

/// Pull the molar-fraction prefix off a compound chunk:
/// "0.95MgTiO3" -> ("MgTiO3", "0.95"), "xSrTiO3" -> ("SrTiO3", "x").
/// A chunk with no element start at all is dropped.
fn extract_leading_fraction(part: &str) -> Option<(String, String)> {
    let at = part
        .char_indices()
        .find(|(_, c)| c.is_ascii_uppercase() || *c == '□')
        .map(|(i, _)| i)?;
    // "(Sr,Ba)TiO3" has no fraction, the parenthesis belongs to the formula
    if !parentheses_balanced(&part[..at]) {
        return Some((part.to_string(), "1".to_string()));
    }
    let prefix = part[..at].trim_matches(|c| c == '(' || c == ')');
    let formula = &part[at..];
    if formula.is_empty() {
        return None;
    }
    let fraction = if prefix.is_empty() { "1" } else { prefix };
    Some((formula.to_string(), fraction.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> ElementTables {
        ElementTables::new()
    }

    fn split(name: &str) -> Vec<(String, String)> {
        split_formula_into_compounds(name, &tables())
    }

    #[test]
    fn test_single_compound() {
        assert_eq!(split("BaTiO3"), vec![("BaTiO3".into(), "1".into())]);
    }

    #[test]
    fn test_complement_mixture() {
        assert_eq!(
            split("(1-x)BaTiO3-xSrTiO3"),
            vec![
                ("BaTiO3".into(), "1-x".into()),
                ("SrTiO3".into(), "x".into()),
            ]
        );
    }

    #[test]
    fn test_complement_percent_form() {
        assert_eq!(
            split("(100-x)MgTiO3-xCaTiO3"),
            vec![
                ("MgTiO3".into(), "1-x".into()),
                ("CaTiO3".into(), "x".into()),
            ]
        );
    }

    #[test]
    fn test_numeric_fractions() {
        assert_eq!(
            split("0.95MgTiO3-0.05CaTiO3"),
            vec![
                ("MgTiO3".into(), "0.95".into()),
                ("CaTiO3".into(), "0.05".into()),
            ]
        );
    }

    #[test]
    fn test_dash_inside_amount_not_split() {
        assert_eq!(split("Fe1-xO"), vec![("Fe1-xO".into(), "1".into())]);
        assert_eq!(split("SrFeO3-x"), vec![("SrFeO3-x".into(), "1".into())]);
    }

    #[test]
    fn test_fraction_var_split() {
        assert_eq!(
            split("BaTiO3-xSrTiO3"),
            vec![
                ("BaTiO3".into(), "1".into()),
                ("SrTiO3".into(), "x".into()),
            ]
        );
    }

    #[test]
    fn test_hydrate_tail() {
        assert_eq!(
            split("La2O3·nH2O"),
            vec![("La2O3".into(), "1".into()), ("H2O".into(), "n".into())]
        );
        assert_eq!(
            split("CuSO4-5H2O"),
            vec![("CuSO4".into(), "1".into()), ("H2O".into(), "5".into())]
        );
    }

    #[test]
    fn test_middle_dot_separator() {
        assert_eq!(
            split("Li2O·2SiO2"),
            vec![("Li2O".into(), "1".into()), ("SiO2".into(), "2".into())]
        );
    }

    #[test]
    fn test_element_list_stays_whole() {
        assert_eq!(split("Y-Ba2Cu3O7"), vec![("Y-Ba2Cu3O7".into(), "1".into())]);
    }

    #[test]
    fn test_three_way_mixture() {
        assert_eq!(
            split("0.2Li2O-0.3BaO-0.5SiO2"),
            vec![
                ("Li2O".into(), "0.2".into()),
                ("BaO".into(), "0.3".into()),
                ("SiO2".into(), "0.5".into()),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(split("").is_empty());
    }
}
