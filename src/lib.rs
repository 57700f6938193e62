#[allow(non_snake_case)]
pub mod Parsing;
pub mod normalize;
