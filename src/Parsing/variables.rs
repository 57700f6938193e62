//! Pulling numeric values for stoichiometric variables out of running
//! text, e.g. "x = 0.2, 0.4 and 0.6" or "0 < x < 0.3", and element
//! lists for substitution placeholders, e.g. "A = Sr, Ba".

use log::warn;
use regex::Regex;

use super::chem_elements::ElementTables;
use super::stoich_expr;

/// Number of subdivision steps used to sample a value range.
pub const DEFAULT_RANGE_STEPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    /// Explicitly enumerated values
    Values,
    /// An interval, sampled by subdivision
    Range,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoichValues {
    pub values: Vec<f64>,
    pub mode: Option<ValueMode>,
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim_matches(|c: char| matches!(c, '.' | ',' | ' '));
    if token.is_empty() {
        return None;
    }
    stoich_expr::eval_numeric(token).ok()
}

/// Subdivide [start, end] into `steps` increments plus the upper bound.
fn sample_range(start: f64, end: f64, steps: usize) -> Vec<f64> {
    if steps == 0 || end <= start {
        return vec![round4(start), round4(end)];
    }
    let incr = (end - start) / steps as f64;
    let mut values: Vec<f64> = (0..steps).map(|i| round4(start + i as f64 * incr)).collect();
    values.push(round4(end));
    values
}

/// Find numeric values for one variable in a sentence, trying four
/// notations in a fixed order:
/// 1. "x = 0.1, 0.2 and 0.3" (explicit list),
/// 2. "x = 0.1-0.3" (dash range),
/// 3. "0 < x < 0.3" (inequality range),
/// 4. "x varies from 0.1 to 0.3" (worded range).
/// The first notation that matches wins.
pub fn get_stoichiometric_values(var: &str, sentence: &str) -> StoichValues {
    get_stoichiometric_values_n(var, sentence, DEFAULT_RANGE_STEPS)
}

pub fn get_stoichiometric_values_n(var: &str, sentence: &str, steps: usize) -> StoichValues {
    let sentence = format!("{} ", sentence.replace(" - ", "-"));
    let v = regex::escape(var);

    let list_re = Regex::new(&format!(r"{v}\s*=\s*(-?[0-9\.\,/and\s]+)[\s\)\]\,]")).unwrap();
    if let Some(caps) = list_re.captures(&sentence) {
        let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let cleaned: String = raw.chars().filter(|c| !c.is_ascii_lowercase()).collect();
        let values: Vec<f64> = cleaned
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter_map(parse_number)
            .map(round4)
            .collect();
        if !values.is_empty() {
            return StoichValues {
                values,
                mode: Some(ValueMode::Values),
            };
        }
    }

    let dash_re =
        Regex::new(&format!(r"{v}\s*=\s*([0-9\.]+)\s*[-–]\s*([0-9\.]+)[\s\)\]\,m%]")).unwrap();
    if let Some(caps) = dash_re.captures(&sentence) {
        if let (Some(start), Some(end)) = (
            parse_number(caps.get(1).map(|m| m.as_str()).unwrap_or("")),
            parse_number(caps.get(2).map(|m| m.as_str()).unwrap_or("")),
        ) {
            return StoichValues {
                values: sample_range(start, end, steps),
                mode: Some(ValueMode::Range),
            };
        }
    }

    let ineq_re = Regex::new(&format!(
        r"([0-9\.\s]*)\s*[<≤⩽]?\s*{v}\s*[<≤⩽>]\s*([0-9\.\s]+)[\s\)\]\.\,]"
    ))
    .unwrap();
    if let Some(caps) = ineq_re.captures(&sentence) {
        let start = parse_number(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
        let end = parse_number(caps.get(2).map(|m| m.as_str()).unwrap_or(""));
        if let (Some(start), Some(end)) = (start, end) {
            return StoichValues {
                values: sample_range(start, end, steps),
                mode: Some(ValueMode::Range),
            };
        }
    }

    let worded_re = Regex::new(&format!(
        r"{v}[a-z\s]*from\s([0-9\./]+)\sto\s([0-9\./]+)"
    ))
    .unwrap();
    if let Some(caps) = worded_re.captures(&sentence) {
        if let (Some(start), Some(end)) = (
            parse_number(caps.get(1).map(|m| m.as_str()).unwrap_or("")),
            parse_number(caps.get(2).map(|m| m.as_str()).unwrap_or("")),
        ) {
            return StoichValues {
                values: sample_range(start, end, steps),
                mode: Some(ValueMode::Range),
            };
        }
    }

    StoichValues::default()
}

/// Find element symbols assigned to a substitution placeholder, e.g.
/// "M = Mn, Fe and Co". Only known element symbols survive; duplicates
/// are removed keeping first occurrence.
pub fn get_elements_values(var: &str, sentence: &str, tables: &ElementTables) -> Vec<String> {
    let v = regex::escape(var);
    let re = match Regex::new(&format!(r"{v}\s*[=:]\s*([A-Za-z0-9\+,\s]+)")) {
        Ok(re) => re,
        Err(e) => {
            warn!("bad element-values pattern for '{var}': {e}");
            return Vec::new();
        }
    };
    let Some(caps) = re.captures(sentence) else {
        return Vec::new();
    };
    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let mut out: Vec<String> = Vec::new();
    for token in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim_matches(|c: char| c.is_ascii_digit() || c == '+' || c == ' ');
        if tables.is_element(token) && !out.iter().any(|t| t == token) {
            out.push(token.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_explicit_value_list() {
        let v = get_stoichiometric_values("x", "samples with x = 0.2, 0.4 and 0.6 were sintered");
        assert_eq!(v.mode, Some(ValueMode::Values));
        assert_eq!(v.values, vec![0.2, 0.4, 0.6]);
    }

    #[test]
    fn test_single_value() {
        let v = get_stoichiometric_values("x", "the composition with x = 0.25 shows");
        assert_eq!(v.mode, Some(ValueMode::Values));
        assert_eq!(v.values, vec![0.25]);
    }

    #[test]
    fn test_fraction_value() {
        let v = get_stoichiometric_values("x", "for x = 1/3, ordering appears");
        assert_eq!(v.mode, Some(ValueMode::Values));
        assert_relative_eq!(v.values[0], 0.3333);
    }

    #[test]
    fn test_dash_range() {
        let v = get_stoichiometric_values("x", "ceramics with x = 0-0.5 were prepared");
        assert_eq!(v.mode, Some(ValueMode::Range));
        assert_eq!(v.values.len(), DEFAULT_RANGE_STEPS + 1);
        assert_relative_eq!(v.values[0], 0.0);
        assert_relative_eq!(*v.values.last().unwrap(), 0.5);
        assert_relative_eq!(v.values[1], 0.05);
    }

    #[test]
    fn test_inequality_range() {
        let v = get_stoichiometric_values("x", "in the range 0 < x < 0.3, the phase is cubic");
        assert_eq!(v.mode, Some(ValueMode::Range));
        assert_relative_eq!(v.values[0], 0.0);
        assert_relative_eq!(*v.values.last().unwrap(), 0.3);
    }

    #[test]
    fn test_one_sided_inequality() {
        let v = get_stoichiometric_values("x", "compositions with x < 0.2 are stable");
        assert_eq!(v.mode, None);
        assert!(v.values.is_empty());
    }

    #[test]
    fn test_worded_range() {
        let v = get_stoichiometric_values("x", "x was varied from 0.1 to 0.5 in this study");
        assert_eq!(v.mode, Some(ValueMode::Range));
        assert_relative_eq!(v.values[0], 0.1);
        assert_relative_eq!(*v.values.last().unwrap(), 0.5);
    }

    #[test]
    fn test_greek_variable() {
        let v = get_stoichiometric_values("δ", "oxygen deficiency δ = 0.05 was measured");
        assert_eq!(v.mode, Some(ValueMode::Values));
        assert_eq!(v.values, vec![0.05]);
    }

    #[test]
    fn test_no_match() {
        let v = get_stoichiometric_values("x", "no variable is mentioned here");
        assert_eq!(v.mode, None);
        assert!(v.values.is_empty());
    }

    #[test]
    fn test_custom_step_count() {
        let v = get_stoichiometric_values_n("x", "with x = 0-1 the lattice expands", 4);
        assert_eq!(v.values, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_elements_values() {
        let t = ElementTables::new();
        let els = get_elements_values("M", "MO2 where M = Ti, Zr and Hf", &t);
        assert_eq!(els, vec!["Ti", "Zr", "Hf"]);
    }

    #[test]
    fn test_elements_values_filters_junk() {
        let t = ElementTables::new();
        let els = get_elements_values("A", "with A = Sr, Ba or Qq cations", &t);
        assert_eq!(els, vec!["Sr", "Ba"]);
    }

    #[test]
    fn test_elements_values_no_match() {
        let t = ElementTables::new();
        assert!(get_elements_values("M", "nothing assigned", &t).is_empty());
    }
}
