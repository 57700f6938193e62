//! Recursive parser turning a formula string into an ordered map of
//! element symbols to symbolic amount strings.
//!
//! "SrTiO3" -> {Sr: "1", Ti: "1", O: "3"}, and parenthesized groups
//! distribute their multiplier over the interior, so "Sr(Zr0.5Ti0.5)O3"
//! yields Zr and Ti amounts of "0.5". Amounts may stay symbolic:
//! "Fe1-xO" gives Fe: "1-x".

use log::warn;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use super::chem_elements::ElementTables;
use super::stoich_expr::{self, ExprError};

/// Insertion-ordered element -> amount map. Formulas are small, so a
/// plain vector beats a hash map and keeps the reading order of the
/// original string, which callers rely on when rebuilding formulas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    items: Vec<(String, String)>,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, el: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|(k, _)| k == el)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or overwrite, keeping first-insertion order.
    pub fn insert(&mut self, el: impl Into<String>, amount: impl Into<String>) {
        let el = el.into();
        let amount = amount.into();
        match self.items.iter_mut().find(|(k, _)| *k == el) {
            Some((_, v)) => *v = amount,
            None => self.items.push((el, amount)),
        }
    }

    pub fn remove(&mut self, el: &str) -> Option<String> {
        let idx = self.items.iter().position(|(k, _)| k == el)?;
        Some(self.items.remove(idx).1)
    }

    pub fn contains(&self, el: &str) -> bool {
        self.items.iter().any(|(k, _)| k == el)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(k, _)| k.as_str())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl FromIterator<(String, String)> for Composition {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut c = Composition::new();
        for (k, v) in iter {
            c.insert(k, v);
        }
        c
    }
}

impl Serialize for Composition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (k, v) in &self.items {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Error)]
pub enum FormulaError {
    #[error("unparsable fragment '{0}' in formula")]
    Leftover(String),
    #[error(transparent)]
    Expr(#[from] ExprError),
}

/// True when every parenthesis in the string has a matching partner.
pub fn parentheses_balanced(formula: &str) -> bool {
    let mut depth = 0i32;
    for c in formula.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Normalize brackets to parentheses and repair imbalance: unmatched
/// closers and openers are dropped, and a single pair wrapping the whole
/// formula is stripped.
pub fn check_parentheses(formula: &str) -> String {
    let normalized: String = formula
        .chars()
        .map(|c| match c {
            '[' | '{' => '(',
            ']' | '}' => ')',
            other => other,
        })
        .collect();

    // drop ')' with no open partner, then '(' with no close partner
    let mut depth = 0i32;
    let mut pass1 = String::with_capacity(normalized.len());
    for c in normalized.chars() {
        match c {
            '(' => {
                depth += 1;
                pass1.push(c);
            }
            ')' => {
                if depth > 0 {
                    depth -= 1;
                    pass1.push(c);
                }
            }
            _ => pass1.push(c),
        }
    }
    let mut depth = 0i32;
    let mut fixed = String::with_capacity(pass1.len());
    for c in pass1.chars().rev() {
        match c {
            ')' => {
                depth += 1;
                fixed.push(c);
            }
            '(' => {
                if depth > 0 {
                    depth -= 1;
                    fixed.push(c);
                }
            }
            _ => fixed.push(c),
        }
    }
    let fixed: String = fixed.chars().rev().collect();

    // strip a pair enclosing the entire formula
    if fixed.starts_with('(') && fixed.ends_with(')') {
        let inner = &fixed[1..fixed.len() - 1];
        if parentheses_balanced(inner) {
            return inner.to_string();
        }
    }
    fixed
}

/// One balanced top-level group with its multiplier suffix.
struct Group {
    interior: String,
    suffix: String,
    full: String,
}

fn is_suffix_char(c: char) -> bool {
    c.is_ascii_digit()
        || c == '.'
        || c == '-'
        || c == '+'
        || c == '*'
        || c == '/'
        || c.is_ascii_lowercase()
        || ('α'..='ω').contains(&c)
}

fn top_level_groups(s: &str) -> Vec<Group> {
    let mut groups = Vec::new();
    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut idx = 0usize;
    while idx < chars.len() {
        let (pos, c) = chars[idx];
        match c {
            '(' => {
                if depth == 0 {
                    start = pos;
                }
                depth += 1;
            }
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return groups;
                }
                if depth == 0 {
                    let interior = s[start + 1..pos].to_string();
                    let mut j = idx + 1;
                    while j < chars.len() && is_suffix_char(chars[j].1) {
                        j += 1;
                    }
                    let end = if j < chars.len() { chars[j].0 } else { s.len() };
                    groups.push(Group {
                        interior,
                        suffix: s[pos + c.len_utf8()..end].to_string(),
                        full: s[start..end].to_string(),
                    });
                    idx = j;
                    continue;
                }
            }
            _ => {}
        }
        idx += 1;
    }
    groups
}

/// Scan a parenthesis-free fragment into (element, amount-expression)
/// pairs, each amount already multiplied by `factor`. A fragment with
/// characters left over after all element matches is unparsable.
fn get_sym_dict(
    fragment: &str,
    factor: &str,
    tables: &ElementTables,
) -> Result<Vec<(String, String)>, FormulaError> {
    let re = Regex::new(r"([A-Z□][a-z]?)\s*([-\*\.\da-zα-ω\+/]*)").unwrap();
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut remaining = fragment.to_string();
    for caps in re.captures_iter(fragment) {
        let sym = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let tail = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let (el, amt) = if sym.chars().count() == 2 && !tables.is_element_or_placeholder(sym) {
            // "Cx" is carbon with a variable amount, not an element "Cx"
            let mut chars = sym.chars();
            let first = chars.next().unwrap_or_default().to_string();
            let rest: String = chars.collect();
            (first, format!("{rest}{tail}"))
        } else {
            (sym.to_string(), tail.to_string())
        };
        let amt = if amt.is_empty() { "1".to_string() } else { amt };
        let scaled = format!("({amt})*({factor})");
        match pairs.iter_mut().find(|(k, _)| *k == el) {
            Some((_, v)) => *v = format!("({v})+{scaled}"),
            None => pairs.push((el, scaled)),
        }
        remaining = remaining.replacen(caps.get(0).map(|m| m.as_str()).unwrap_or(""), "", 1);
    }
    let leftover = remaining.trim();
    if !leftover.is_empty() {
        return Err(FormulaError::Leftover(leftover.to_string()));
    }
    Ok(pairs)
}

fn merge(acc: &mut Composition, el: &str, amt: &str) {
    match acc.get(el) {
        Some(old) => {
            let combined = format!("({old})+({amt})");
            acc.insert(el, combined);
        }
        None => acc.insert(el, amt),
    }
}

/// Recursive descent over balanced parenthesized groups. Each group's
/// multiplier suffix is folded into the running factor before the
/// interior is scanned, so nesting distributes correctly.
fn parse_parentheses(
    formula: &str,
    factor: &str,
    tables: &ElementTables,
) -> Result<Composition, FormulaError> {
    let mut acc = Composition::new();
    let mut remaining = formula.to_string();
    for group in top_level_groups(formula) {
        let mult = if group.suffix.is_empty() {
            "1"
        } else {
            group.suffix.as_str()
        };
        let group_factor = stoich_expr::simplify(&format!("({factor})*({mult})"))?;
        let inner = parse_parentheses(&group.interior, &group_factor, tables)?;
        for (el, amt) in inner.iter() {
            merge(&mut acc, el, amt);
        }
        remaining = remaining.replacen(&group.full, "", 1);
    }
    for (el, amt) in get_sym_dict(&remaining, factor, tables)? {
        merge(&mut acc, &el, &amt);
    }
    Ok(acc)
}

/// Parse a cleaned-up formula string into a composition. Unparsable
/// input returns an empty composition rather than an error; elements
/// whose amount cannot be canonicalized are dropped individually.
pub fn parse_formula(formula: &str, tables: &ElementTables) -> Composition {
    let raw = match parse_parentheses(formula, "1", tables) {
        Ok(c) => c,
        Err(e) => {
            warn!("failed to parse formula '{formula}': {e}");
            return Composition::new();
        }
    };
    let run_re = Regex::new(r"[A-Za-z]{2,}").unwrap();
    let mut out = Composition::new();
    for (el, amt) in raw.iter() {
        match stoich_expr::simplify(amt) {
            Ok(simplified) => {
                if run_re.is_match(&simplified) {
                    warn!("dropping element {el} with unresolved amount '{simplified}'");
                    continue;
                }
                out.insert(el, simplified);
            }
            Err(e) => {
                warn!("dropping element {el} of '{formula}': {e}");
            }
        }
    }
    out
}

/// A composition is acceptable when it is non-empty, every element
/// symbol actually occurs in the formula (placeholders excepted) and no
/// amount came out blank.
pub fn is_correct_composition(formula: &str, composition: &Composition) -> bool {
    !composition.is_empty()
        && composition.iter().all(|(el, amt)| {
            !amt.is_empty() && (formula.contains(el) || matches!(el, "M" | "Ln" | "□"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> ElementTables {
        ElementTables::new()
    }

    #[test]
    fn test_simple_formula() {
        let c = parse_formula("SrTiO3", &tables());
        assert_eq!(c.get("Sr"), Some("1"));
        assert_eq!(c.get("Ti"), Some("1"));
        assert_eq!(c.get("O"), Some("3"));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_fractional_amounts() {
        let c = parse_formula("Ba0.5Sr0.5TiO3", &tables());
        assert_eq!(c.get("Ba"), Some("0.5"));
        assert_eq!(c.get("Sr"), Some("0.5"));
        assert_eq!(c.get("Ti"), Some("1"));
        assert_eq!(c.get("O"), Some("3"));
    }

    #[test]
    fn test_parenthesized_group() {
        let c = parse_formula("Sr(Zr0.5Ti0.5)O3", &tables());
        assert_eq!(c.get("Sr"), Some("1"));
        assert_eq!(c.get("Zr"), Some("0.5"));
        assert_eq!(c.get("Ti"), Some("0.5"));
        assert_eq!(c.get("O"), Some("3"));
    }

    #[test]
    fn test_group_multiplier() {
        let c = parse_formula("Ca3(PO4)2", &tables());
        assert_eq!(c.get("Ca"), Some("3"));
        assert_eq!(c.get("P"), Some("2"));
        assert_eq!(c.get("O"), Some("8"));
    }

    #[test]
    fn test_nested_groups() {
        let c = parse_formula("Ba((Zr0.5)0.5Ti0.75)O3", &tables());
        assert_eq!(c.get("Zr"), Some("0.25"));
        assert_eq!(c.get("Ti"), Some("0.75"));
        assert_eq!(c.get("O"), Some("3"));
    }

    #[test]
    fn test_symbolic_amounts() {
        let c = parse_formula("Fe1-xO", &tables());
        assert_eq!(c.get("Fe"), Some("1-x"));
        assert_eq!(c.get("O"), Some("1"));

        let c = parse_formula("BaxSr1-xTiO3", &tables());
        assert_eq!(c.get("Ba"), Some("x"));
        assert_eq!(c.get("Sr"), Some("1-x"));
    }

    #[test]
    fn test_greek_amounts() {
        let c = parse_formula("SrFeO3-δ", &tables());
        assert_eq!(c.get("O"), Some("3-δ"));
    }

    #[test]
    fn test_repeated_element_accumulates() {
        let c = parse_formula("TiO(TiO2)2", &tables());
        assert_eq!(c.get("Ti"), Some("3"));
        assert_eq!(c.get("O"), Some("5"));
    }

    #[test]
    fn test_unparsable_returns_empty() {
        assert!(parse_formula("not_a_formula!", &tables()).is_empty());
        assert!(parse_formula("", &tables()).is_empty());
        assert!(parse_formula("123", &tables()).is_empty());
    }

    #[test]
    fn test_placeholder_element() {
        let c = parse_formula("MO2", &tables());
        assert_eq!(c.get("M"), Some("1"));
        assert_eq!(c.get("O"), Some("2"));
    }

    #[test]
    fn test_check_parentheses() {
        assert_eq!(check_parentheses("Ca3[PO4]2"), "Ca3(PO4)2");
        assert_eq!(check_parentheses("(BaTiO3)"), "BaTiO3");
        assert_eq!(check_parentheses("BaTiO3)"), "BaTiO3");
        assert_eq!(check_parentheses("(BaTiO3"), "BaTiO3");
        assert_eq!(check_parentheses("Ca3(PO4)2"), "Ca3(PO4)2");
    }

    #[test]
    fn test_parentheses_balanced() {
        assert!(parentheses_balanced("A(B(C))"));
        assert!(!parentheses_balanced(")A("));
        assert!(!parentheses_balanced("A(B"));
    }

    #[test]
    fn test_is_correct_composition() {
        let t = tables();
        let c = parse_formula("SrTiO3", &t);
        assert!(is_correct_composition("SrTiO3", &c));
        assert!(!is_correct_composition("SrTiO3", &Composition::new()));
        let mut bad = Composition::new();
        bad.insert("Sr", "");
        assert!(!is_correct_composition("SrTiO3", &bad));
        let mut m = Composition::new();
        m.insert("M", "1");
        m.insert("O", "2");
        assert!(is_correct_composition("MO2", &m));
    }
}
