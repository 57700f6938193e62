/// Reference tables of element symbols, placeholder symbols and greek
/// stoichiometric variables shared by all parsing stages.
pub mod chem_elements;
/// Symbolic evaluator for stoichiometric amount expressions. Amounts like
/// "1-x" or "(0.5)*(2)" are canonicalized over exact rational coefficients:
/// 1) purely numeric expressions collapse to a decimal rounded to three places
/// 2) symbolic expressions keep their variables in a stable printed form
/// 3) the canonical form never leads with a negative term and re-feeding the
///    output returns the same string
pub mod stoich_expr;
/// Recursive formula parser. Takes a formula string such as "Sr(Zr0.5Ti0.5)O3"
/// and produces an ordered element -> amount map:
/// 1) parenthesized groups distribute their multiplier over the interior
/// 2) amounts may stay symbolic, "Fe1-xO" gives Fe: "1-x"
/// 3) unparsable input degrades to an empty composition instead of an error
pub mod formula_parser;
/// Splitting mixture notation into weighted compounds:
/// "(1-x)BaTiO3-xSrTiO3" becomes BaTiO3 with fraction "1-x" and SrTiO3 with
/// fraction "x". Hydrates, percent notation and dash-joined element lists are
/// recognized so a dash inside a stoichiometric amount never splits.
pub mod mixture;
/// Resolution of written chemical names ("strontium titanate") to formulas:
/// a bundled flat-file dictionary first, then the PubChem PUG REST service
/// behind an HttpClient trait when the online fallback is enabled.
pub mod name_resolver;
/// Acronym resolution by capital-letter multiset matching: "BST" is matched
/// against "Ba0.5Sr0.5TiO3" through the multiset {B,S,T}, with oxygen left
/// out of the count.
pub mod abbreviations;
/// Extraction of variable values from running text: "x = 0.2, 0.4 and 0.6",
/// "0 < x < 0.3" or "M = Ti, Zr and Hf".
pub mod variables;
/// The orchestrator. `MaterialParser::get_chemical_structure` takes one raw
/// material mention and produces a structured record with formula,
/// composition, mixture components, phase, additives and open variables.
/// The function is total: whatever cannot be parsed comes back as an empty
/// composition, never a panic or an error.
pub mod material_parser;
