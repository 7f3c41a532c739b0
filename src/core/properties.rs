//! Build properties
//!
//! An insertion-ordered `key=value` map used for `platform.txt`,
//! `boards.txt`, board menus and the merged build configuration.
//! Declaration order matters: the first option of a board menu is its
//! default, so the map never reorders keys.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::defaults::MAX_PROPERTY_EXPANSION_PASSES;
use crate::error::PropertiesError;

/// Ordered string-to-string map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesMap {
    keys: Vec<String>,
    values: HashMap<String, String>,
}

impl PropertiesMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(key, value)` pairs, keeping their order
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (k, v) in pairs {
            map.set(k, v);
        }
        map
    }

    /// Parse `key=value` lines
    ///
    /// Empty lines and lines starting with `#` are skipped. Keys suffixed
    /// with the current OS (`.linux`, `.macosx`, `.windows`) also override
    /// their unsuffixed key once the whole text is read.
    pub fn load_from_str(content: &str, origin: &str) -> Result<Self, PropertiesError> {
        let mut map = Self::new();
        let os_suffix = format!(".{}", current_os_suffix());
        let mut overrides = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(PropertiesError::InvalidLine {
                    origin: origin.to_string(),
                    line: idx + 1,
                    content: line.to_string(),
                });
            };
            let key = key.trim();
            let value = value.trim();
            if let Some(base) = key.strip_suffix(&os_suffix) {
                overrides.push((base.to_string(), value.to_string()));
            }
            map.set(key, value);
        }

        for (key, value) in overrides {
            map.set(key, value);
        }
        Ok(map)
    }

    /// Read and parse a properties file
    pub fn load(path: &Path) -> Result<Self, PropertiesError> {
        let content = std::fs::read_to_string(path).map_err(|e| PropertiesError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::load_from_str(&content, &path.display().to_string())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a value or a fallback
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Get a value as a path
    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    /// Whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Set a value; an existing key keeps its position
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.values.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.values.insert(key, value.into());
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let value = self.values.remove(key)?;
        self.keys.retain(|k| k != key);
        Some(value)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys
            .iter()
            .map(|k| (k.as_str(), self.values[k].as_str()))
    }

    /// Copy every entry of `other` into this map
    pub fn merge(&mut self, other: &PropertiesMap) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    /// Entries under `prefix.`, with the prefix stripped
    pub fn sub_tree(&self, prefix: &str) -> PropertiesMap {
        let dotted = format!("{prefix}.");
        let mut tree = PropertiesMap::new();
        for (k, v) in self.iter() {
            if let Some(rest) = k.strip_prefix(&dotted) {
                tree.set(rest, v);
            }
        }
        tree
    }

    /// Distinct first dotted segments, in order of first appearance
    pub fn first_level_keys(&self) -> Vec<String> {
        let mut seen = Vec::<String>::new();
        for key in &self.keys {
            let first = key.split('.').next().unwrap_or(key);
            if !seen.iter().any(|s| s == first) {
                seen.push(first.to_string());
            }
        }
        seen
    }

    /// Substitute `{key}` placeholders with their values
    ///
    /// Substitution repeats until the text is stable, bounded by
    /// [`MAX_PROPERTY_EXPANSION_PASSES`]. Unknown placeholders are left as is.
    pub fn expand(&self, pattern: &str) -> String {
        let re = placeholder_regex();
        let mut current = pattern.to_string();
        for _ in 0..MAX_PROPERTY_EXPANSION_PASSES {
            let next = re
                .replace_all(&current, |caps: &regex::Captures<'_>| {
                    self.get(&caps[1])
                        .map_or_else(|| caps[0].to_string(), str::to_string)
                })
                .into_owned();
            if next == current {
                break;
            }
            current = next;
        }
        current
    }
}

impl fmt::Display for PropertiesMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in self.iter() {
            writeln!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertiesMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

/// OS suffix used by platform files for host-specific values
pub fn current_os_suffix() -> &'static str {
    match std::env::consts::OS {
        "macos" => "macosx",
        "windows" => "windows",
        _ => "linux",
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder regex is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_load_skips_comments_and_blank_lines() {
        let text = "# a comment\n\nname=Arduino AVR Boards\n  version = 1.8.6  \n";
        let props = PropertiesMap::load_from_str(text, "platform.txt").unwrap();

        assert_eq!(props.len(), 2);
        assert_eq!(props.get("name"), Some("Arduino AVR Boards"));
        assert_eq!(props.get("version"), Some("1.8.6"));
    }

    #[test]
    fn test_load_rejects_line_without_equals() {
        let err = PropertiesMap::load_from_str("name=x\ngarbage\n", "boards.txt").unwrap_err();
        assert!(matches!(err, PropertiesError::InvalidLine { line: 2, .. }));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let props = PropertiesMap::load_from_str("compiler.flags=-DA=1 -DB=2", "t").unwrap();
        assert_eq!(props.get("compiler.flags"), Some("-DA=1 -DB=2"));
    }

    #[test]
    fn test_os_specific_override_wins_regardless_of_order() {
        let suffix = current_os_suffix();
        let text = format!("tools.cmd.{suffix}=native\ntools.cmd=generic\n");
        let props = PropertiesMap::load_from_str(&text, "t").unwrap();
        assert_eq!(props.get("tools.cmd"), Some("native"));
    }

    #[test]
    fn test_sub_tree_and_first_level_keys_keep_order() {
        let props = PropertiesMap::from_pairs([
            ("uno.name", "Arduino Uno"),
            ("mega.name", "Arduino Mega"),
            ("uno.build.mcu", "atmega328p"),
            ("menu.cpu", "Processor"),
        ]);

        assert_eq!(props.first_level_keys(), vec!["uno", "mega", "menu"]);

        let uno = props.sub_tree("uno");
        assert_eq!(uno.keys().collect::<Vec<_>>(), vec!["name", "build.mcu"]);
        assert_eq!(uno.get("build.mcu"), Some("atmega328p"));
    }

    #[test]
    fn test_set_existing_key_keeps_position() {
        let mut props = PropertiesMap::from_pairs([("a", "1"), ("b", "2")]);
        props.set("a", "3");
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(props.get("a"), Some("3"));
    }

    #[test]
    fn test_remove() {
        let mut props = PropertiesMap::from_pairs([("a", "1"), ("b", "2")]);
        assert_eq!(props.remove("a"), Some("1".to_string()));
        assert_eq!(props.remove("a"), None);
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_expand_nested_placeholders() {
        let props = PropertiesMap::from_pairs([
            ("compiler.path", "{runtime.tools.avr-gcc.path}/bin/"),
            ("runtime.tools.avr-gcc.path", "/opt/avr"),
            ("compiler.c.cmd", "avr-gcc"),
        ]);

        assert_eq!(
            props.expand("\"{compiler.path}{compiler.c.cmd}\" -c"),
            "\"/opt/avr/bin/avr-gcc\" -c"
        );
    }

    #[test]
    fn test_expand_leaves_unknown_placeholders() {
        let props = PropertiesMap::from_pairs([("a", "x")]);
        assert_eq!(props.expand("{a}-{missing}"), "x-{missing}");
    }

    #[test]
    fn test_expand_terminates_on_self_reference() {
        let props = PropertiesMap::from_pairs([("a", "{a}{a}")]);
        let expanded = props.expand("{a}");
        assert!(expanded.contains("{a}"));
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = PropertiesMap::from_pairs([("a", "1"), ("b", "2")]);
        base.merge(&PropertiesMap::from_pairs([("b", "3"), ("c", "4")]));
        assert_eq!(base.get("b"), Some("3"));
        assert_eq!(base.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Loading the Display output yields the same map
        #[test]
        fn prop_display_reloads(
            entries in proptest::collection::vec(
                ("[a-z]{1,8}(\\.[a-z0-9]{1,8}){0,3}", "[a-zA-Z0-9 ./-]{0,20}"),
                0..20,
            )
        ) {
            let props = PropertiesMap::from_pairs(entries);
            let text = props.to_string();
            let reloaded = PropertiesMap::load_from_str(&text, "prop").unwrap();
            for (k, v) in props.iter() {
                prop_assert_eq!(reloaded.get(k), Some(v.trim()));
            }
        }
    }
}
