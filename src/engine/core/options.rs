// Advanced codec option grammar: `key[=value](,key[=value])*`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::error::ParseError;

/// Advanced option keys this front end models, in canonical serialization order.
///
/// The derived `Ord` follows declaration order, so a `BTreeMap<OptionKey, _>`
/// iterates in exactly the order the encoder string is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    Ref,
    Bframes,
    Me,
    Merange,
    Subq,
    Trellis,
    Analyse,
    Direct,
    Deblock,
    BPyramid,
    Weightb,
    Brdo,
    Bime,
    MixedRefs,
    Dct8x8,
    Cabac,
    NoFastPskip,
    NoDctDecimate,
}

impl OptionKey {
    pub const ALL: [OptionKey; 18] = [
        OptionKey::Ref,
        OptionKey::Bframes,
        OptionKey::Me,
        OptionKey::Merange,
        OptionKey::Subq,
        OptionKey::Trellis,
        OptionKey::Analyse,
        OptionKey::Direct,
        OptionKey::Deblock,
        OptionKey::BPyramid,
        OptionKey::Weightb,
        OptionKey::Brdo,
        OptionKey::Bime,
        OptionKey::MixedRefs,
        OptionKey::Dct8x8,
        OptionKey::Cabac,
        OptionKey::NoFastPskip,
        OptionKey::NoDctDecimate,
    ];

    /// Canonical spelling written to option strings
    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::Ref => "ref",
            OptionKey::Bframes => "bframes",
            OptionKey::Me => "me",
            OptionKey::Merange => "merange",
            OptionKey::Subq => "subq",
            OptionKey::Trellis => "trellis",
            OptionKey::Analyse => "analyse",
            OptionKey::Direct => "direct",
            OptionKey::Deblock => "deblock",
            OptionKey::BPyramid => "b-pyramid",
            OptionKey::Weightb => "weightb",
            OptionKey::Brdo => "brdo",
            OptionKey::Bime => "bime",
            OptionKey::MixedRefs => "mixed-refs",
            OptionKey::Dct8x8 => "8x8dct",
            OptionKey::Cabac => "cabac",
            OptionKey::NoFastPskip => "no-fast-pskip",
            OptionKey::NoDctDecimate => "no-dct-decimate",
        }
    }

    /// Resolve a key name, accepting the synonyms older option strings use.
    /// Matching ignores case and surrounding whitespace.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let key = match name.as_str() {
            "ref" | "frameref" => OptionKey::Ref,
            "bframes" | "b-frames" | "b_frames" => OptionKey::Bframes,
            "me" => OptionKey::Me,
            "merange" | "me-range" | "me_range" => OptionKey::Merange,
            "subq" | "subme" => OptionKey::Subq,
            "trellis" => OptionKey::Trellis,
            "analyse" | "partitions" => OptionKey::Analyse,
            "direct" | "direct-pred" | "direct_pred" => OptionKey::Direct,
            "deblock" | "filter" => OptionKey::Deblock,
            "b-pyramid" | "bpyramid" | "b_pyramid" => OptionKey::BPyramid,
            "weightb" | "weight-b" | "weight_b" => OptionKey::Weightb,
            "brdo" | "b-rdo" | "b_rdo" => OptionKey::Brdo,
            "bime" => OptionKey::Bime,
            "mixed-refs" | "mixed_refs" => OptionKey::MixedRefs,
            "8x8dct" | "dct8x8" | "8x8_dct" => OptionKey::Dct8x8,
            "cabac" => OptionKey::Cabac,
            "no-fast-pskip" | "no_fast_pskip" | "no-fast-p-skip" => OptionKey::NoFastPskip,
            "no-dct-decimate" | "no_dct_decimate" => OptionKey::NoDctDecimate,
            _ => return None,
        };
        Some(key)
    }

    /// Keys whose presence alone switches the option on
    pub fn is_flag(self) -> bool {
        matches!(
            self,
            OptionKey::BPyramid
                | OptionKey::Weightb
                | OptionKey::Brdo
                | OptionKey::Bime
                | OptionKey::MixedRefs
                | OptionKey::Dct8x8
                | OptionKey::NoFastPskip
                | OptionKey::NoDctDecimate
        )
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an option set, as seen when iterating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionEntry<'a> {
    pub key: &'a str,
    pub value: Option<&'a str>,
}

/// Advanced codec options keyed by option name.
///
/// A key appears at most once. An absent key means "use the encoder default",
/// which is different from a key explicitly set to the default value.
/// Keys this crate does not model are kept verbatim after the known keys, in
/// the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AdvancedOptionSet {
    known: BTreeMap<OptionKey, Option<String>>,
    unknown: Vec<(String, Option<String>)>,
}

impl AdvancedOptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an option string.
    ///
    /// Empty segments (including a trailing comma) are skipped. Values are
    /// not checked against the key's domain; that is left to the caller.
    pub fn decode(text: &str) -> Result<Self, ParseError> {
        let mut set = Self::new();
        for segment in text.split(',') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = match segment.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (segment, None),
            };
            if key.is_empty() {
                return Err(ParseError::EmptyOptionKey {
                    segment: segment.to_string(),
                });
            }
            if segment.contains('"') {
                return Err(ParseError::invalid_option(
                    key,
                    value.unwrap_or_default(),
                    "text without double quotes",
                ));
            }
            set.insert(key, value.map(str::to_string));
        }
        Ok(set)
    }

    /// Render in canonical key order; equal sets always render byte-identical.
    pub fn encode(&self) -> String {
        self.iter()
            .map(|entry| match entry.value {
                Some(value) => format!("{}={}", entry.key, value),
                None => entry.key.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Set a key to a value (`None` for a bare flag), replacing any previous entry
    pub fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), ParseError> {
        let key = key.trim();
        if key.is_empty()
            || key.contains([',', '=', '"'])
            || key.contains(char::is_whitespace)
        {
            return Err(ParseError::EmptyOptionKey {
                segment: key.to_string(),
            });
        }
        let value = value.map(str::trim);
        if let Some(v) = value {
            check_value(key, v)?;
        }
        self.insert(key, value.map(str::to_string));
        Ok(())
    }

    /// Set a modelled key; the value is checked the same way as in [`set`](Self::set)
    pub fn set_known(&mut self, key: OptionKey, value: Option<&str>) -> Result<(), ParseError> {
        let value = value.map(str::trim);
        if let Some(v) = value {
            check_value(key.as_str(), v)?;
        }
        self.known.insert(key, value.map(str::to_string));
        Ok(())
    }

    /// Store a value rendered from typed settings (numbers and fixed names only)
    pub(super) fn put_known(&mut self, key: OptionKey, value: Option<String>) {
        debug_assert!(value.as_deref().is_none_or(|v| check_value(key.as_str(), v).is_ok()));
        self.known.insert(key, value);
    }

    /// Switch a flag-style option on (no value)
    pub fn set_flag(&mut self, key: OptionKey) {
        self.known.insert(key, None);
    }

    pub fn remove(&mut self, key: &str) {
        match OptionKey::parse(key) {
            Some(known) => {
                self.known.remove(&known);
            }
            None => {
                let key = key.trim().to_ascii_lowercase();
                self.unknown.retain(|(k, _)| *k != key);
            }
        }
    }

    pub fn remove_known(&mut self, key: OptionKey) {
        self.known.remove(&key);
    }

    pub fn contains(&self, key: &str) -> bool {
        match OptionKey::parse(key) {
            Some(known) => self.known.contains_key(&known),
            None => {
                let key = key.trim().to_ascii_lowercase();
                self.unknown.iter().any(|(k, _)| *k == key)
            }
        }
    }

    pub fn contains_known(&self, key: OptionKey) -> bool {
        self.known.contains_key(&key)
    }

    /// Value of a key: `None` if absent, `Some(None)` for a bare flag
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        match OptionKey::parse(key) {
            Some(known) => self.get_known(known),
            None => {
                let key = key.trim().to_ascii_lowercase();
                self.unknown
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.as_deref())
            }
        }
    }

    pub fn get_known(&self, key: OptionKey) -> Option<Option<&str>> {
        self.known.get(&key).map(|v| v.as_deref())
    }

    /// Entries whose keys are not modelled, in first-seen order
    pub fn unknown(&self) -> impl Iterator<Item = OptionEntry<'_>> {
        self.unknown.iter().map(|(key, value)| OptionEntry {
            key,
            value: value.as_deref(),
        })
    }

    /// All entries in canonical order
    pub fn iter(&self) -> impl Iterator<Item = OptionEntry<'_>> {
        self.known
            .iter()
            .map(|(key, value)| OptionEntry {
                key: key.as_str(),
                value: value.as_deref(),
            })
            .chain(self.unknown())
    }

    pub fn len(&self) -> usize {
        self.known.len() + self.unknown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.unknown.is_empty()
    }

    fn insert(&mut self, key: &str, value: Option<String>) {
        if let Some(known) = OptionKey::parse(key) {
            self.known.insert(known, value);
            return;
        }
        let key = key.to_ascii_lowercase();
        match self.unknown.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.unknown.push((key, value)),
        }
    }
}

/// A value must not contain the list separator or a quote, or it would not
/// read back as the same entry
fn check_value(key: &str, value: &str) -> Result<(), ParseError> {
    if value.contains([',', '"']) {
        return Err(ParseError::invalid_option(
            key,
            value,
            "a value without commas or quotes",
        ));
    }
    Ok(())
}

impl fmt::Display for AdvancedOptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl std::str::FromStr for AdvancedOptionSet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl TryFrom<String> for AdvancedOptionSet {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::decode(&value)
    }
}

impl From<AdvancedOptionSet> for String {
    fn from(set: AdvancedOptionSet) -> Self {
        set.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_is_all_defaults() {
        let set = AdvancedOptionSet::decode("").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.encode(), "");
    }

    #[test]
    fn test_decode_value_and_flag() {
        let set = AdvancedOptionSet::decode("ref=2,bframes").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("ref"), Some(Some("2")));
        assert_eq!(set.get("bframes"), Some(None));
        assert_eq!(set.get("me"), None);
    }

    #[test]
    fn test_trailing_comma_is_ignored() {
        let set = AdvancedOptionSet::decode("ref=3,mixed-refs,").unwrap();
        assert_eq!(set.encode(), "ref=3,mixed-refs");
    }

    #[test]
    fn test_encode_uses_canonical_order() {
        let set = AdvancedOptionSet::decode("cabac=0,8x8dct,me=umh,ref=5,bframes=3").unwrap();
        assert_eq!(set.encode(), "ref=5,bframes=3,me=umh,8x8dct,cabac=0");
    }

    #[test]
    fn test_unknown_keys_pass_through_after_known() {
        let set = AdvancedOptionSet::decode("vbv-maxrate=1500,ref=2,level=30").unwrap();
        assert_eq!(set.encode(), "ref=2,vbv-maxrate=1500,level=30");
        assert_eq!(set.unknown().count(), 2);
        assert_eq!(set.get("level"), Some(Some("30")));
    }

    #[test]
    fn test_synonyms_are_standardized() {
        let set =
            AdvancedOptionSet::decode("frameref=4,subme=6,me-range=24,direct_pred=auto,b_rdo")
                .unwrap();
        assert_eq!(set.encode(), "ref=4,merange=24,subq=6,direct=auto,brdo");
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let set = AdvancedOptionSet::decode("ref=2,frameref=6").unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get_known(OptionKey::Ref), Some(Some("6")));
    }

    #[test]
    fn test_empty_key_is_error() {
        let err = AdvancedOptionSet::decode("ref=2,=5").unwrap_err();
        assert_eq!(
            err,
            ParseError::EmptyOptionKey {
                segment: "=5".to_string()
            }
        );
    }

    #[test]
    fn test_values_are_not_domain_checked() {
        let set = AdvancedOptionSet::decode("ref=99,me=warp").unwrap();
        assert_eq!(set.get("ref"), Some(Some("99")));
        assert_eq!(set.get("me"), Some(Some("warp")));
    }

    #[test]
    fn test_set_and_remove() {
        let mut set = AdvancedOptionSet::new();
        set.set("bframes", Some("2")).unwrap();
        set.set_flag(OptionKey::Weightb);
        set.set("keyint", Some("300")).unwrap();
        assert_eq!(set.encode(), "bframes=2,weightb,keyint=300");

        set.remove("weight-b");
        set.remove("KEYINT");
        assert_eq!(set.encode(), "bframes=2");
        assert!(!set.contains("weightb"));
    }

    #[test]
    fn test_set_rejects_separators() {
        let mut set = AdvancedOptionSet::new();
        assert!(set.set("ref,bframes", Some("2")).is_err());
        assert!(set.set("deblock", Some("1,1")).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn test_set_known_rejects_separators() {
        let mut set = AdvancedOptionSet::new();
        let err = set.set_known(OptionKey::Ref, Some("1,bframes")).unwrap_err();
        assert!(matches!(err, ParseError::InvalidOptionValue { ref key, .. } if key == "ref"));
        assert!(set.set_known(OptionKey::Me, Some("\"umh\"")).is_err());
        assert!(set.is_empty());

        set.set_known(OptionKey::Ref, Some(" 1 ")).unwrap();
        assert_eq!(set.encode(), "ref=1");
        assert_eq!(AdvancedOptionSet::decode(&set.encode()).unwrap(), set);
    }

    #[test]
    fn test_serde_as_string() {
        let set = AdvancedOptionSet::decode("bframes=3,ref=2").unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "\"ref=2,bframes=3\"");
        let back: AdvancedOptionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_every_key_parses_from_its_canonical_name() {
        for key in OptionKey::ALL {
            assert_eq!(OptionKey::parse(key.as_str()), Some(key));
        }
    }
}
