//! Fully Qualified Board Names
//!
//! `package:arch:board[:key=value,key=value...]`

use std::fmt;
use std::str::FromStr;

use crate::core::properties::PropertiesMap;
use crate::error::FqbnError;

/// A parsed FQBN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fqbn {
    /// Package (vendor) name
    pub package: String,
    /// Platform architecture
    pub platform_arch: String,
    /// Board id within the platform release
    pub board_id: String,
    /// Configuration overrides, in declaration order
    pub configs: PropertiesMap,
}

impl Fqbn {
    /// Parse an FQBN string
    pub fn parse(fqbn: &str) -> Result<Self, FqbnError> {
        let fields: Vec<&str> = fqbn.split(':').collect();
        if fields.len() < 3 {
            return Err(FqbnError::MissingFields {
                fqbn: fqbn.to_string(),
            });
        }
        if fields.len() > 4 {
            return Err(FqbnError::TooManyFields {
                fqbn: fqbn.to_string(),
            });
        }

        for (value, field) in fields.iter().zip(["package", "architecture", "board id"]) {
            if value.is_empty() {
                return Err(FqbnError::EmptyField {
                    fqbn: fqbn.to_string(),
                    field,
                });
            }
        }

        let mut configs = PropertiesMap::new();
        if let Some(options) = fields.get(3) {
            for pair in options.split(',') {
                match pair.split_once('=') {
                    Some((key, value)) if !key.is_empty() => configs.set(key, value),
                    _ => {
                        return Err(FqbnError::InvalidConfig {
                            config: pair.to_string(),
                        })
                    }
                }
            }
        }

        Ok(Self {
            package: fields[0].to_string(),
            platform_arch: fields[1].to_string(),
            board_id: fields[2].to_string(),
            configs,
        })
    }

    /// The `package:arch:board` part without options
    pub fn base(&self) -> String {
        format!("{}:{}:{}", self.package, self.platform_arch, self.board_id)
    }
}

impl FromStr for Fqbn {
    type Err = FqbnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Fqbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base())?;
        if !self.configs.is_empty() {
            let opts: Vec<String> = self.configs.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, ":{}", opts.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_plain_fqbn() {
        let fqbn = Fqbn::parse("arduino:avr:uno").unwrap();
        assert_eq!(fqbn.package, "arduino");
        assert_eq!(fqbn.platform_arch, "avr");
        assert_eq!(fqbn.board_id, "uno");
        assert!(fqbn.configs.is_empty());
    }

    #[test]
    fn test_parse_with_configs_keeps_order() {
        let fqbn = Fqbn::parse("arduino:avr:mega:cpu=atmega1280,speed=16").unwrap();
        assert_eq!(fqbn.configs.keys().collect::<Vec<_>>(), vec!["cpu", "speed"]);
        assert_eq!(fqbn.configs.get("cpu"), Some("atmega1280"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Fqbn::parse("arduino:avr"),
            Err(FqbnError::MissingFields { .. })
        ));
        assert!(matches!(
            Fqbn::parse("a:b:c:d=1:e"),
            Err(FqbnError::TooManyFields { .. })
        ));
        assert!(matches!(
            Fqbn::parse("arduino::uno"),
            Err(FqbnError::EmptyField { field: "architecture", .. })
        ));
        assert!(matches!(
            Fqbn::parse("arduino:avr:mega:cpu"),
            Err(FqbnError::InvalidConfig { .. })
        ));
        assert!(matches!(
            Fqbn::parse("arduino:avr:mega:=x"),
            Err(FqbnError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_display() {
        let fqbn: Fqbn = "esp8266:esp8266:generic:xtal=160".parse().unwrap();
        assert_eq!(fqbn.to_string(), "esp8266:esp8266:generic:xtal=160");
        assert_eq!(fqbn.base(), "esp8266:esp8266:generic");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_display_parses_back(
            pkg in "[a-z][a-z0-9_-]{0,10}",
            arch in "[a-z][a-z0-9]{0,8}",
            board in "[a-z][a-z0-9_]{0,10}",
            opts in proptest::collection::vec(("[a-z]{1,6}", "[a-z0-9]{1,6}"), 0..4),
        ) {
            let mut text = format!("{pkg}:{arch}:{board}");
            if !opts.is_empty() {
                let joined: Vec<String> = opts.iter().map(|(k, v)| format!("{k}={v}")).collect();
                text.push(':');
                text.push_str(&joined.join(","));
            }
            let parsed = Fqbn::parse(&text).unwrap();
            let reparsed = Fqbn::parse(&parsed.to_string()).unwrap();
            prop_assert_eq!(parsed, reparsed);
        }
    }
}
