//! Resolving written chemical names to formulas.
//!
//! Two stages: a bundled flat-file dictionary of common compound names
//! ("strontium titanate – SrTiO3"), then an optional online lookup
//! against the PubChem PUG REST service for names the dictionary does
//! not know. The HTTP side sits behind a small trait so tests can
//! substitute canned responses.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use regex::Regex;
use reqwest::blocking::Client;
use thiserror::Error;
use url::Url;

/// Bundled dictionary, one "Name – Formula" entry per line.
const BUNDLED_DICTIONARY: &str = include_str!("../../data/compounds_dictionary");

/// Entries are separated by an en dash with spaces; a plain " - " never
/// splits because names themselves contain hyphens.
const ENTRY_SEPARATOR: &str = " – ";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("invalid lookup url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("no formula found for '{0}'")]
    NotFound(String),
}

/// Lowercase the first letter only, preserving acronym tails, so
/// "Strontium titanate" and "strontium titanate" share one key while
/// "PZT" is untouched beyond its head.
fn normalize_key(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Name -> formula dictionary with oxidation-state-stripped aliases:
/// "iron (III) oxide" is also findable as "iron oxide".
#[derive(Debug, Clone, Default)]
pub struct ChemDictionary {
    entries: HashMap<String, String>,
}

impl ChemDictionary {
    /// Load the dictionary compiled into the binary.
    pub fn bundled() -> Self {
        Self::from_str_content(BUNDLED_DICTIONARY)
    }

    /// Load a user-supplied dictionary file in the same flat format.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read dictionary {}: {}", path.display(), e))?;
        Ok(Self::from_str_content(&content))
    }

    fn from_str_content(content: &str) -> Self {
        let oxidation_re = Regex::new(r"\s*\([IV,]+\)").unwrap();
        let mut entries = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, formula)) = line.split_once(ENTRY_SEPARATOR) else {
                warn!("skipping malformed dictionary line: '{line}'");
                continue;
            };
            let name = name.trim();
            let formula = formula.trim().to_string();
            entries.insert(normalize_key(name), formula.clone());
            let stripped = oxidation_re.replace_all(name, "").to_string();
            if stripped != name {
                entries.insert(normalize_key(&stripped), formula);
            }
        }
        info!("chemical name dictionary loaded: {} entries", entries.len());
        ChemDictionary { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look a written name up, tolerating capitalization of the first
    /// word and a fully lowercased variant.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.entries
            .get(name)
            .or_else(|| self.entries.get(&normalize_key(name)))
            .or_else(|| self.entries.get(&name.to_lowercase()))
            .map(String::as_str)
    }
}

/// Minimal HTTP abstraction over the blocking reqwest client.
pub trait HttpClient {
    fn get_text(&self, url: &str) -> Result<String, reqwest::Error>;
}

impl HttpClient for Client {
    fn get_text(&self, url: &str) -> Result<String, reqwest::Error> {
        self.get(url)
            .timeout(Duration::from_secs(20))
            .send()?
            .error_for_status()?
            .text()
    }
}

const PUBCHEM_BASE: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";

/// Client for the PubChem PUG REST name-to-formula endpoint.
pub struct PubchemClient<C: HttpClient> {
    client: C,
}

impl PubchemClient<Client> {
    pub fn new() -> Self {
        PubchemClient {
            client: Client::new(),
        }
    }
}

impl Default for PubchemClient<Client> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: HttpClient> PubchemClient<C> {
    pub fn with_client(client: C) -> Self {
        PubchemClient { client }
    }

    /// Fetch the molecular formula for a compound name. The TXT endpoint
    /// returns one formula per matching compound; the first is taken.
    pub fn molecular_formula(&self, name: &str) -> Result<String, LookupError> {
        let url = Url::parse(&format!(
            "{PUBCHEM_BASE}/compound/name/{}/property/MolecularFormula/TXT",
            name.trim()
        ))?;
        let body = self.client.get_text(url.as_str())?;
        body.lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(String::from)
            .ok_or_else(|| LookupError::NotFound(name.to_string()))
    }
}

/// Combined resolver: dictionary first, then PubChem when enabled.
/// Every failure path collapses to None, callers never see an error.
pub struct NameResolver<C: HttpClient = Client> {
    dictionary: ChemDictionary,
    pubchem: Option<PubchemClient<C>>,
}

impl NameResolver<Client> {
    pub fn new() -> Self {
        NameResolver {
            dictionary: ChemDictionary::bundled(),
            pubchem: None,
        }
    }

    /// Enable the online fallback. Off by default so parsing stays
    /// deterministic and offline.
    pub fn with_pubchem(mut self) -> Self {
        self.pubchem = Some(PubchemClient::new());
        self
    }
}

impl Default for NameResolver<Client> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: HttpClient> NameResolver<C> {
    pub fn with_parts(dictionary: ChemDictionary, pubchem: Option<PubchemClient<C>>) -> Self {
        NameResolver {
            dictionary,
            pubchem,
        }
    }

    pub fn dictionary(&self) -> &ChemDictionary {
        &self.dictionary
    }

    pub fn resolve(&self, name: &str) -> Option<String> {
        if let Some(formula) = self.dictionary.resolve(name) {
            return Some(formula.to_string());
        }
        if let Some(pubchem) = &self.pubchem {
            match pubchem.molecular_formula(name) {
                Ok(formula) => {
                    info!("pubchem resolved '{name}' to {formula}");
                    return Some(formula);
                }
                Err(e) => {
                    warn!("pubchem lookup failed for '{name}': {e}");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_bundled_dictionary_loads() {
        let dict = ChemDictionary::bundled();
        assert!(!dict.is_empty());
        assert_eq!(dict.resolve("strontium titanate"), Some("SrTiO3"));
        assert_eq!(dict.resolve("Strontium titanate"), Some("SrTiO3"));
        assert_eq!(dict.resolve("water"), Some("H2O"));
    }

    #[test]
    fn test_oxidation_state_alias() {
        let dict = ChemDictionary::bundled();
        assert_eq!(dict.resolve("iron (III) oxide"), Some("Fe2O3"));
        assert_eq!(dict.resolve("iron oxide"), Some("Fe2O3"));
    }

    #[test]
    fn test_dictionary_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Fake compound – XyZ3").unwrap();
        writeln!(file, "malformed line without separator").unwrap();
        let dict = ChemDictionary::from_file(file.path()).unwrap();
        assert_eq!(dict.resolve("fake compound"), Some("XyZ3"));
        assert_eq!(dict.resolve("missing"), None);
    }

    struct FakeHttp {
        body: &'static str,
    }

    impl HttpClient for FakeHttp {
        fn get_text(&self, _url: &str) -> Result<String, reqwest::Error> {
            Ok(self.body.to_string())
        }
    }

    #[test]
    fn test_pubchem_parses_first_line() {
        let pubchem = PubchemClient::with_client(FakeHttp {
            body: "BaTiO3\nBaTiO3\n",
        });
        assert_eq!(pubchem.molecular_formula("barium titanate").unwrap(), "BaTiO3");
    }

    #[test]
    fn test_pubchem_empty_body() {
        let pubchem = PubchemClient::with_client(FakeHttp { body: "\n" });
        assert!(matches!(
            pubchem.molecular_formula("nothing"),
            Err(LookupError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolver_dictionary_first() {
        let resolver = NameResolver::with_parts(
            ChemDictionary::bundled(),
            Some(PubchemClient::with_client(FakeHttp { body: "WRONG" })),
        );
        assert_eq!(resolver.resolve("water"), Some("H2O".to_string()));
        assert_eq!(resolver.resolve("unknownium"), Some("WRONG".to_string()));
    }

    #[test]
    fn test_resolver_offline_misses() {
        let resolver = NameResolver::new();
        assert_eq!(resolver.resolve("completely made up name"), None);
    }
}
