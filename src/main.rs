#[allow(non_snake_case)]
pub mod Parsing;
pub mod normalize;

use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use crate::normalize::MatNormalizer;
use crate::Parsing::material_parser::MaterialParser;

pub fn main() {
    let _ = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    let parser = MaterialParser::new();
    for mention in [
        "SrTiO3",
        "(1-x)BaTiO3-xSrTiO3",
        "Nb-doped BaTiO3",
        "α-Fe2O3",
        "barium titanate",
        "(Sr,Ba)TiO3",
    ] {
        let structure = parser.get_chemical_structure(mention);
        structure.pretty_print();
    }

    let normalizer = MatNormalizer::new();
    let sentences = vec!["Samples with x = 0.2, 0.4 and 0.6 were sintered.".to_string()];
    for mention in ["BaxSr1-xTiO3", "lead zirconate"] {
        let candidates = normalizer.resolve_mention(mention, &[], &sentences);
        println!("{mention} -> {candidates:?}");
    }
}
