//! The orchestrator: one entry point turning a raw material mention
//! from text into a structured record.
//!
//! `get_chemical_structure` never fails. Whatever cannot be parsed
//! degrades to an empty composition inside an otherwise valid record,
//! so callers can batch-process noisy extraction output without
//! guarding every call.

use std::collections::HashMap;

use log::warn;
use prettytable::{Cell, Row, Table};
use regex::Regex;
use reqwest::blocking::Client;
use serde::Serialize;

use super::abbreviations;
use super::chem_elements::ElementTables;
use super::formula_parser::{
    check_parentheses, is_correct_composition, parentheses_balanced, parse_formula, Composition,
};
use super::mixture::split_formula_into_compounds;
use super::name_resolver::{HttpClient, NameResolver};
use super::stoich_expr;

/// One weighted component of a mixture material.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MixtureComponent {
    pub formula: String,
    pub fraction: String,
    pub composition: Composition,
}

/// Structured record for one material mention.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChemicalStructure {
    /// The mention as given, before any cleanup
    pub material_name: String,
    /// Crystallographic phase prefix, e.g. "α" of "α-Fe2O3"
    pub phase: Option<String>,
    /// Formula the composition was derived from
    pub formula: String,
    /// Element -> symbolic amount, in reading order
    pub composition: Composition,
    /// Components of a mixture notation, empty for single compounds
    pub mixture: Vec<MixtureComponent>,
    /// Stoichiometric variables and their values once resolved
    pub fraction_vars: HashMap<String, Vec<f64>>,
    /// Element placeholders and their substitution candidates
    pub elements_vars: HashMap<String, Vec<String>>,
    /// Dopants and other additives separated from the name
    pub additives: Vec<String>,
}

impl ChemicalStructure {
    /// A record counts as resolved when its composition passed the
    /// correctness check against its formula.
    pub fn is_resolved(&self) -> bool {
        is_correct_composition(&self.formula, &self.composition)
    }

    /// Print the record as tables on stdout.
    pub fn pretty_print(&self) {
        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("material"),
            Cell::new(&self.material_name),
        ]));
        if let Some(phase) = &self.phase {
            table.add_row(Row::new(vec![Cell::new("phase"), Cell::new(phase)]));
        }
        table.add_row(Row::new(vec![Cell::new("formula"), Cell::new(&self.formula)]));
        if !self.additives.is_empty() {
            table.add_row(Row::new(vec![
                Cell::new("additives"),
                Cell::new(&self.additives.join(", ")),
            ]));
        }
        table.printstd();

        if !self.composition.is_empty() {
            let mut comp = Table::new();
            comp.add_row(Row::new(vec![Cell::new("element"), Cell::new("amount")]));
            for (el, amt) in self.composition.iter() {
                comp.add_row(Row::new(vec![Cell::new(el), Cell::new(amt)]));
            }
            comp.printstd();
        }
        if !self.mixture.is_empty() {
            let mut mix = Table::new();
            mix.add_row(Row::new(vec![Cell::new("compound"), Cell::new("fraction")]));
            for c in &self.mixture {
                mix.add_row(Row::new(vec![Cell::new(&c.formula), Cell::new(&c.fraction)]));
            }
            mix.printstd();
        }
    }
}

/// Result of parsing one formula string, before any name fallbacks.
#[derive(Debug, Clone, Default)]
pub struct FormulaParse {
    pub formula: String,
    pub composition: Composition,
    pub elements_vars: HashMap<String, Vec<String>>,
    pub fraction_vars: Vec<String>,
}

/// Words carrying no compositional information, stripped during name
/// cleanup.
const TRASH_WORDS: &[&str] = &[
    "ceramics",
    "ceramic",
    "powders",
    "powder",
    "nanoparticles",
    "nanopowders",
    "nanopowder",
    "thin films",
    "films",
    "film",
    "samples",
    "sample",
    "crystals",
    "crystal",
    "glass",
    "compound",
    "single",
];

const DOPING_VERBS: &[&str] = &[
    "activated",
    "modified",
    "stabilized",
    "coated",
    "doped",
    "added",
];

pub struct MaterialParser<C: HttpClient = Client> {
    tables: ElementTables,
    resolver: NameResolver<C>,
}

impl MaterialParser<Client> {
    pub fn new() -> Self {
        MaterialParser {
            tables: ElementTables::new(),
            resolver: NameResolver::new(),
        }
    }

    /// Enable the online PubChem fallback for written names the
    /// bundled dictionary does not cover.
    pub fn with_pubchem() -> Self {
        MaterialParser {
            tables: ElementTables::new(),
            resolver: NameResolver::new().with_pubchem(),
        }
    }
}

impl Default for MaterialParser<Client> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: HttpClient> MaterialParser<C> {
    pub fn with_resolver(resolver: NameResolver<C>) -> Self {
        MaterialParser {
            tables: ElementTables::new(),
            resolver,
        }
    }

    pub fn tables(&self) -> &ElementTables {
        &self.tables
    }

    /// Normalize typography and drop descriptive words around the
    /// actual material: "BaTiO3 ceramics" -> "BaTiO3".
    pub fn cleanup_name(&self, name: &str) -> String {
        let mut out = name.trim().to_string();
        out = out
            .replace('−', "-")
            .replace('–', "-")
            .replace('∶', ":")
            .replace('×', "x");
        for marker in ["(s)", "(l)", "(g)", "(aq)"] {
            out = out.replace(marker, "");
        }
        for word in TRASH_WORDS {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))).unwrap();
            out = re.replace_all(&out, "").into_owned();
        }
        out = out.trim_matches(|c: char| c.is_whitespace() || c == ',').to_string();
        let space_re = Regex::new(r"\s{2,}").unwrap();
        space_re.replace_all(&out, " ").into_owned()
    }

    /// Split dopant annotations off a material name. Returns the list
    /// of additive strings and the remaining host name:
    /// "Nb-doped BaTiO3" -> (["Nb"], "BaTiO3").
    pub fn separate_dopants(&self, name: &str) -> (Vec<String>, String) {
        let mut host = name.replace("codoped", "doped").replace("co-doped", "doped");
        let mut raw_additives: Vec<String> = Vec::new();

        for verb in DOPING_VERBS {
            let marker = format!("{verb} with");
            if let Some(idx) = host.find(&marker) {
                raw_additives.push(host[idx + marker.len()..].trim().to_string());
                host = host[..idx]
                    .trim()
                    .trim_end_matches(|c: char| c == '-' || c == ',')
                    .to_string();
                continue;
            }
            let prefix_re = Regex::new(&format!(r"^(.*)[-\s]{verb}\s+(.*)$")).unwrap();
            let current = host.clone();
            if let Some(caps) = prefix_re.captures(&current) {
                raw_additives.push(caps.get(1).map(|m| m.as_str().trim()).unwrap_or("").to_string());
                host = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("").to_string();
            }
        }

        if host.contains('%') {
            let cleaned = host.replace(".%", "%");
            let percent_re =
                Regex::new(r"\s*[-+:·]?\s*[0-9x\.]+\s*[vmolwt\.\s]*%\s*").unwrap();
            let parts: Vec<&str> = percent_re.split(&cleaned).collect();
            if parts.len() > 1 {
                host = parts[0].trim().to_string();
                raw_additives.extend(
                    parts[1..]
                        .iter()
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty()),
                );
            }
        }

        if host.contains(':') {
            let parts: Vec<String> = host.split(':').map(|p| p.trim().to_string()).collect();
            if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
                // the host is the longer side, "BaTiO3:Nb" and "Nb:BaTiO3" both work
                let (h, d) = if parts[0].len() >= parts[1].len() {
                    (parts[0].clone(), parts[1].clone())
                } else {
                    (parts[1].clone(), parts[0].clone())
                };
                host = h;
                raw_additives.push(d);
            }
        }

        let mut additives: Vec<String> = Vec::new();
        for raw in raw_additives {
            for token in raw
                .split(|c: char| c.is_whitespace() || c == ',' || c == '/')
                .map(str::trim)
                .filter(|t| !t.is_empty() && *t != "and" && *t != "or")
            {
                if !additives.iter().any(|a| a == token) {
                    additives.push(token.to_string());
                }
            }
        }
        let mut host = host
            .trim_matches(|c: char| {
                c.is_whitespace() || matches!(c, ',' | '.' | ':' | ';' | '-' | '±' | '/' | '+')
            })
            .to_string();
        // "(1-x)BaTiO3-xSrTiO3" keeps its parentheses, stray ones go
        if !parentheses_balanced(&host) {
            host = host.trim_matches(|c| c == '(' || c == ')').to_string();
        }
        (additives, host)
    }

    /// Parse one formula string into a composition plus the variables
    /// it mentions. Handles the "(A,B)O3" substitution notation and
    /// redundant parentheses before the structural parse.
    pub fn get_structure_by_formula(&self, formula: &str) -> FormulaParse {
        let cleaned: String = formula
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '−' | '–' => '-',
                other => other,
            })
            .collect();
        let mut formula = check_parentheses(&cleaned);

        let mut elements_vars: HashMap<String, Vec<String>> = HashMap::new();
        let group_re = Regex::new(r"\(([^\(\)]+)\)\s*([-\*\.\da-zα-ω\+/]*)").unwrap();
        let snapshot = formula.clone();
        let groups: Vec<(String, String, String)> = group_re
            .captures_iter(&snapshot)
            .map(|c| {
                (
                    c.get(0).map(|m| m.as_str().to_string()).unwrap_or_default(),
                    c.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
                    c.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
                )
            })
            .collect();
        for (full, inner, mult) in groups {
            if inner.contains(',') {
                // "(Sr,Ba)TiO3" is an element substitution set
                elements_vars.insert(
                    "M".to_string(),
                    inner.split(',').map(|e| e.trim().to_string()).collect(),
                );
                formula = formula.replacen(&full, &format!("M{mult}"), 1);
            } else if mult.is_empty()
                && inner.chars().any(|c| c.is_alphabetic() && c.is_lowercase())
            {
                // unwrap redundant parentheses: "Sr(Zr0.5Ti0.5)O3"
                formula = formula.replacen(&format!("({inner})"), &inner, 1);
            }
        }

        let mut composition = parse_formula(&formula, &self.tables);

        // a four-letter lowercase run means prose slipped through
        let trash_re = Regex::new(r"[a-z]{4,}").unwrap();
        if !composition.is_empty() && trash_re.is_match(&formula) {
            warn!("discarding composition of '{formula}': looks like prose");
            composition.clear();
        }

        for el in composition.keys() {
            if !self.tables.is_element(el) && !elements_vars.contains_key(el) {
                elements_vars.insert(el.to_string(), Vec::new());
            }
        }

        let mut fraction_vars: Vec<String> = Vec::new();
        for (_, amt) in composition.iter() {
            if let Ok(vars) = stoich_expr::variables_of(amt) {
                for v in vars {
                    let v = v.to_string();
                    if !fraction_vars.contains(&v) {
                        fraction_vars.push(v);
                    }
                }
            }
        }

        // "R" + "E" in one formula is the rare-earth placeholder "RE",
        // likewise "AE" (alkaline earth) and "TM" (transition metal)
        for (v1, v2) in [("R", "E"), ("A", "E"), ("T", "M")] {
            let fused = format!("{v1}{v2}");
            if elements_vars.contains_key(v1)
                && elements_vars.contains_key(v2)
                && formula.contains(&fused)
            {
                elements_vars.remove(v1);
                elements_vars.remove(v2);
                elements_vars.insert(fused.clone(), Vec::new());
                composition.remove(v1);
                if let Some(amt) = composition.remove(v2) {
                    composition.insert(fused, amt);
                }
            }
        }

        FormulaParse {
            formula,
            composition,
            elements_vars,
            fraction_vars,
        }
    }

    /// Parse one material mention into a structured record. Total:
    /// unparsable input comes back with an empty composition, never an
    /// error.
    pub fn get_chemical_structure(&self, material_name: &str) -> ChemicalStructure {
        let mut structure = ChemicalStructure {
            material_name: material_name.trim().to_string(),
            ..Default::default()
        };
        let mut name = self.cleanup_name(material_name);
        if name.is_empty() {
            return structure;
        }

        let (additives, host) = self.separate_dopants(&name);
        structure.additives = additives;
        name = host;
        if name.is_empty() {
            return structure;
        }

        // "α-Fe2O3" carries a phase prefix
        if name.chars().next().is_some_and(char::is_lowercase) {
            let phase_re = Regex::new(r"^([a-zα-ω']+)-(.*)$").unwrap();
            let current = name.clone();
            if let Some(caps) = phase_re.captures(&current) {
                structure.phase = caps.get(1).map(|m| m.as_str().to_string());
                name = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
            }
        }
        if name.is_empty() {
            return structure;
        }

        let compounds = split_formula_into_compounds(&name, &self.tables);
        let formula_source = if compounds.len() > 1 {
            let mut joined = String::new();
            for (f, frac) in &compounds {
                let component = self.get_structure_by_formula(f);
                joined.push_str(&component.formula);
                structure.mixture.push(MixtureComponent {
                    formula: component.formula.clone(),
                    fraction: frac.clone(),
                    composition: component.composition,
                });
            }
            joined
        } else if let Some((f, _)) = compounds.first() {
            f.clone()
        } else {
            name.clone()
        };

        let parsed = self.get_structure_by_formula(&formula_source);
        structure.formula = parsed.formula;
        structure.composition = parsed.composition;
        structure.elements_vars = parsed.elements_vars;
        for v in parsed.fraction_vars {
            structure.fraction_vars.entry(v).or_default();
        }

        // written-name fallbacks: bundled dictionary, then PubChem
        if !structure.is_resolved() {
            if let Some(formula) = self.resolver.resolve(&name) {
                let parsed = self.get_structure_by_formula(&formula);
                if is_correct_composition(&parsed.formula, &parsed.composition) {
                    structure.formula = parsed.formula;
                    structure.composition = parsed.composition;
                    structure.elements_vars = parsed.elements_vars;
                    structure.mixture.clear();
                    structure.fraction_vars.clear();
                    for v in parsed.fraction_vars {
                        structure.fraction_vars.entry(v).or_default();
                    }
                }
            }
        }
        if !structure.is_resolved() {
            warn!("could not resolve material '{material_name}'");
            structure.composition.clear();
        }

        // variables used in mixture fractions count as fraction vars
        let mixture_vars: Vec<String> = structure
            .mixture
            .iter()
            .filter_map(|c| stoich_expr::variables_of(&c.fraction).ok())
            .flatten()
            .map(|v| v.to_string())
            .collect();
        for v in mixture_vars {
            structure.fraction_vars.entry(v).or_default();
        }

        structure
    }

    /// Convenience wrapper resolving acronyms before parsing.
    pub fn get_chemical_structure_with_abbreviations(
        &self,
        material_name: &str,
        abbreviations_dict: &HashMap<String, String>,
    ) -> ChemicalStructure {
        let expanded = abbreviations::substitute_abbreviations(material_name, abbreviations_dict);
        let mut structure = self.get_chemical_structure(&expanded);
        structure.material_name = material_name.trim().to_string();
        structure
    }
}
