//! Fast lookup table for definitional and acronym questions.
//!
//! A static mapping from canonicalized short questions ("full form of IPC",
//! "what is FIR") to prewritten answers. The table is built once at startup
//! and read-only afterwards, so lookups are lock-free hash gets and the fast
//! path stays well under its 100 ms latency target. Answers served from
//! here bypass retrieval, generation, and the cache entirely: the table is
//! reference data refreshed out-of-band, not a caching concern.

use std::collections::HashMap;

/// Articles stripped from the front of an extracted key.
const LEADING_ARTICLES: [&str; 3] = ["the", "a", "an"];

/// Derive the canonical lookup key from a normalized question, if the
/// question has a definitional or acronym shape.
///
/// Recognised shapes: `what is X`, `define X`, `meaning of X`, `full form
/// of X`, `what does X stand for`, `what does X mean`, `X stands for`,
/// `expand X`. Returns `None` when no shape matches or the remainder is
/// empty. The same derivation feeds the classifier's pattern stage, so the
/// classifier and the table can never disagree about the key.
pub fn definitional_key(text: &str) -> Option<String> {
    let t = text.trim();

    let candidate = if let Some(idx) = t.find("full form of ") {
        Some(&t[idx + "full form of ".len()..])
    } else if let Some(rest) = t.strip_prefix("what does ") {
        rest.strip_suffix(" stand for")
            .or_else(|| rest.strip_suffix(" mean"))
    } else if let Some(rest) = t.strip_suffix(" stands for") {
        Some(rest)
    } else if let Some(rest) = t.strip_prefix("define ") {
        Some(rest)
    } else if let Some(idx) = t.find("meaning of ") {
        Some(&t[idx + "meaning of ".len()..])
    } else if let Some(rest) = t.strip_prefix("what is ") {
        Some(rest)
    } else if let Some(rest) = t.strip_prefix("expand ") {
        Some(rest)
    } else {
        None
    }?;

    let key = clean_key(candidate);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Whether a matched definitional shape is specifically an acronym
/// expansion request.
pub fn is_acronym_shape(text: &str, _key: &str) -> bool {
    text.contains("full form") || text.contains("stand for") || text.contains("stands for")
}

/// Strip leading articles and surrounding noise from an extracted key.
fn clean_key(candidate: &str) -> String {
    let mut words: Vec<&str> = candidate.split_whitespace().collect();
    while let Some(first) = words.first() {
        if LEADING_ARTICLES.contains(first) {
            words.remove(0);
        } else {
            break;
        }
    }
    words.join(" ")
}

/// Static table of prewritten answers for recognised definitional and
/// acronym questions.
///
/// Read-only after construction: no write path, no locking.
#[derive(Debug, Clone)]
pub struct FastLookupTable {
    entries: HashMap<String, String>,
}

impl FastLookupTable {
    /// Build the table from the compiled-in default entries.
    pub fn with_defaults() -> Self {
        let mut entries = HashMap::new();
        for (key, answer) in DEFAULT_ENTRIES {
            entries.insert((*key).to_string(), (*answer).to_string());
        }
        Self { entries }
    }

    /// Build the table from explicit entries, replacing the defaults.
    ///
    /// Used when a deployment ships its own reference table.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Build the table from the defaults plus deployment-specific extras.
    ///
    /// Extras override defaults on key collision.
    pub fn with_defaults_and(extra: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut table = Self::with_defaults();
        for (key, answer) in extra {
            table.entries.insert(key, answer);
        }
        table
    }

    /// Look up the prewritten answer for a canonical key.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compiled-in reference answers for common Indian legal acronyms and
/// terms.
const DEFAULT_ENTRIES: &[(&str, &str)] = &[
    (
        "ipc",
        "IPC stands for the Indian Penal Code, 1860 — the principal statute defining \
         criminal offences and their punishments in India, now succeeded by the \
         Bharatiya Nyaya Sanhita, 2023.",
    ),
    (
        "crpc",
        "CrPC stands for the Code of Criminal Procedure, 1973, which governs the \
         procedure for investigation, arrest, bail, and criminal trials in India. It \
         has been succeeded by the Bharatiya Nagarik Suraksha Sanhita, 2023.",
    ),
    (
        "dpdp",
        "DPDP refers to the Digital Personal Data Protection Act, 2023 — India's data \
         protection law governing the processing of digital personal data, consent \
         requirements, and penalties for breaches.",
    ),
    (
        "fir",
        "FIR stands for First Information Report: the written document prepared by \
         police when they receive information about the commission of a cognizable \
         offence, registered under Section 154 of the CrPC.",
    ),
    (
        "pil",
        "PIL stands for Public Interest Litigation: a petition filed before the \
         Supreme Court or a High Court seeking protection of the public interest \
         rather than a private grievance.",
    ),
    (
        "rti",
        "RTI stands for the Right to Information Act, 2005, which entitles citizens \
         to request information from public authorities within 30 days.",
    ),
    (
        "cpc",
        "CPC stands for the Code of Civil Procedure, 1908, which governs the \
         procedure of civil courts in India.",
    ),
    (
        "gst",
        "GST stands for Goods and Services Tax: India's unified indirect tax on the \
         supply of goods and services, introduced by the 101st Constitutional \
         Amendment in 2017.",
    ),
    (
        "pocso",
        "POCSO stands for the Protection of Children from Sexual Offences Act, 2012, \
         a special law protecting children below 18 from sexual assault, harassment, \
         and pornography.",
    ),
    (
        "ndps",
        "NDPS refers to the Narcotic Drugs and Psychotropic Substances Act, 1985, \
         which prohibits the production, possession, and trafficking of narcotic \
         drugs in India.",
    ),
    (
        "it act",
        "The IT Act is the Information Technology Act, 2000 — India's primary law on \
         electronic commerce, digital signatures, and cybercrime.",
    ),
    (
        "bail",
        "Bail is the conditional release of an accused person awaiting trial, \
         granted against a bond or surety; offences are classified as bailable or \
         non-bailable under the criminal procedure code.",
    ),
    (
        "affidavit",
        "An affidavit is a written statement of facts sworn or affirmed before an \
         authority empowered to administer oaths, used as evidence in court \
         proceedings.",
    ),
    (
        "writ",
        "A writ is a formal order issued by the Supreme Court under Article 32 or a \
         High Court under Article 226 to enforce fundamental rights — habeas corpus, \
         mandamus, prohibition, certiorari, or quo warranto.",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    // -- key extraction ---------------------------------------------------

    #[test]
    fn test_key_from_full_form() {
        assert_eq!(definitional_key("full form of ipc"), Some("ipc".into()));
        assert_eq!(
            definitional_key("what is the full form of crpc"),
            Some("crpc".into())
        );
    }

    #[test]
    fn test_key_from_what_is() {
        assert_eq!(definitional_key("what is fir"), Some("fir".into()));
        assert_eq!(definitional_key("what is the fir"), Some("fir".into()));
    }

    #[test]
    fn test_key_from_stand_for() {
        assert_eq!(
            definitional_key("what does pil stand for"),
            Some("pil".into())
        );
        assert_eq!(definitional_key("ndps stands for"), Some("ndps".into()));
    }

    #[test]
    fn test_key_from_define_and_meaning() {
        assert_eq!(definitional_key("define bail"), Some("bail".into()));
        assert_eq!(
            definitional_key("meaning of affidavit"),
            Some("affidavit".into())
        );
    }

    #[test]
    fn test_no_key_for_general_question() {
        assert_eq!(definitional_key("how do i get bail"), None);
        assert_eq!(definitional_key(""), None);
    }

    #[test]
    fn test_no_key_when_remainder_empty() {
        assert_eq!(definitional_key("what is the"), None);
    }

    #[test]
    fn test_acronym_shape_detection() {
        assert!(is_acronym_shape("full form of ipc", "ipc"));
        assert!(is_acronym_shape("what does pil stand for", "pil"));
        assert!(!is_acronym_shape("what is bail", "bail"));
    }

    // -- table ------------------------------------------------------------

    #[test]
    fn test_default_table_hits_known_acronyms() {
        let table = FastLookupTable::with_defaults();
        for key in ["ipc", "crpc", "dpdp", "fir", "pil"] {
            let answer = table.lookup(key);
            assert!(answer.is_some(), "missing default entry for {key}");
            assert!(!answer.unwrap().is_empty());
        }
    }

    #[test]
    fn test_lookup_miss_returns_none() {
        let table = FastLookupTable::with_defaults();
        assert_eq!(table.lookup("unknown-acronym"), None);
    }

    #[test]
    fn test_extra_entries_override_defaults() {
        let table = FastLookupTable::with_defaults_and([(
            "ipc".to_string(),
            "overridden".to_string(),
        )]);
        assert_eq!(table.lookup("ipc"), Some("overridden"));
    }

    #[test]
    fn test_from_entries_replaces_defaults() {
        let table =
            FastLookupTable::from_entries([("only".to_string(), "entry".to_string())]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("ipc"), None);
    }

    #[test]
    fn test_end_to_end_key_derivation_matches_table() {
        let table = FastLookupTable::with_defaults();
        let key = definitional_key("what is the full form of ipc").unwrap();
        assert!(table.lookup(&key).is_some());
    }
}
