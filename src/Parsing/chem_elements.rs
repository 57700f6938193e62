/// Immutable reference tables for the material parser: element symbols split
/// by length (the formula scanner must decide whether "Sr" is one element or
/// "S" followed by junk), greek letters reserved for stoichiometric variables
/// and the placeholder symbols treated as valid atomic symbols.
use std::collections::HashSet;

/// One-letter element symbols
pub const ELEMENTS_1: &[&str] = &[
    "H", "B", "C", "N", "O", "F", "P", "S", "K", "V", "Y", "I", "W", "U",
];

/// Two-letter element symbols
pub const ELEMENTS_2: &[&str] = &[
    "He", "Li", "Be", "Ne", "Na", "Mg", "Al", "Si", "Cl", "Ar", "Ca", "Sc", "Ti", "Cr", "Mn",
    "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Zr", "Nb",
    "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te", "Xe", "Cs", "Ba", "La",
    "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf",
    "Ta", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra",
    "Ac", "Th", "Pa", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf",
    "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Fl", "Lv",
];

/// Placeholder symbols always accepted as atomic symbols: "M" is the generic
/// element-substitution wildcard, "Ln" the lanthanide wildcard, "□" a vacancy.
pub const PLACEHOLDERS: &[&str] = &["M", "Ln", "□"];

/// Lowercase greek letters (U+03B1..U+03C9) used as stoichiometric variables.
/// The range is contiguous, so regex character classes can use "α-ω" directly.
pub const GREEK_RANGE: &str = "α-ω";

pub fn greek_letters() -> Vec<char> {
    (0x3b1..=0x3c9u32).filter_map(char::from_u32).collect()
}

/// Read-only lookup tables injected into every parsing component.
/// Built once at startup, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ElementTables {
    elements_1: HashSet<&'static str>,
    elements_2: HashSet<&'static str>,
}

impl ElementTables {
    pub fn new() -> Self {
        Self {
            elements_1: ELEMENTS_1.iter().copied().collect(),
            elements_2: ELEMENTS_2.iter().copied().collect(),
        }
    }

    /// True for a valid one-letter element symbol
    pub fn is_element_1(&self, sym: &str) -> bool {
        self.elements_1.contains(sym)
    }

    /// True for a valid one- or two-letter element symbol (placeholders excluded)
    pub fn is_element(&self, sym: &str) -> bool {
        self.elements_1.contains(sym) || self.elements_2.contains(sym)
    }

    /// True for an element symbol or one of the placeholder wildcards
    pub fn is_element_or_placeholder(&self, sym: &str) -> bool {
        self.is_element(sym) || PLACEHOLDERS.contains(&sym)
    }

    pub fn all_elements(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.elements_1.iter().chain(self.elements_2.iter()).copied()
    }
}

impl Default for ElementTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_lookup() {
        let tables = ElementTables::new();
        assert!(tables.is_element_1("O"));
        assert!(!tables.is_element_1("Sr"));
        assert!(tables.is_element("Sr"));
        assert!(tables.is_element("H"));
        assert!(!tables.is_element("Xx"));
        assert!(tables.is_element_or_placeholder("M"));
        assert!(tables.is_element_or_placeholder("Ln"));
        assert!(tables.is_element_or_placeholder("□"));
        assert!(!tables.is_element("M"));
    }

    #[test]
    fn test_greek_letters() {
        let greek = greek_letters();
        assert_eq!(greek.len(), 25);
        assert_eq!(greek[0], 'α');
        assert_eq!(*greek.last().unwrap(), 'ω');
    }
}
