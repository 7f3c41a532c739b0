//! Board definitions
//!
//! A board is a `boards.txt` subtree inside a platform release. Its
//! configurable options are declared as menus:
//!
//! ```text
//! uno.menu.cpu.atmega328=ATmega328P
//! uno.menu.cpu.atmega328.build.mcu=atmega328p
//! uno.menu.cpu.atmega168=ATmega168
//! uno.menu.cpu.atmega168.build.mcu=atmega168
//! ```

use std::fmt;

use crate::core::package::PlatformReleaseId;
use crate::core::properties::PropertiesMap;
use crate::error::BoardError;

/// A board defined by a platform release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Board id (third FQBN field)
    pub board_id: String,
    /// Properties from `boards.txt`, with the board id prefix stripped
    pub properties: PropertiesMap,
    /// Release that defines this board
    pub platform: PlatformReleaseId,
}

/// One configurable option of a board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardMenu {
    /// Menu id, used as the FQBN config key
    pub id: String,
    /// Option ids and labels, in declaration order
    pub options: Vec<(String, String)>,
}

impl Board {
    /// Create a board
    pub fn new(board_id: &str, properties: PropertiesMap, platform: PlatformReleaseId) -> Self {
        Self {
            board_id: board_id.to_string(),
            properties,
            platform,
        }
    }

    /// Display name, falling back to the board id
    pub fn name(&self) -> &str {
        self.properties.get_or("name", &self.board_id)
    }

    /// `package:arch:board` for this board
    pub fn fqbn(&self) -> String {
        format!(
            "{}:{}:{}",
            self.platform.packager, self.platform.architecture, self.board_id
        )
    }

    /// Check whether the board advertises a USB vendor/product id pair
    ///
    /// Looks at `vid`/`pid` and every numbered `vid.N`/`pid.N` pair.
    /// Comparison ignores case.
    pub fn has_usb_id(&self, vid: &str, pid: &str) -> bool {
        let matches = |key_vid: &str, key_pid: &str| {
            match (self.properties.get(key_vid), self.properties.get(key_pid)) {
                (Some(v), Some(p)) => v.eq_ignore_ascii_case(vid) && p.eq_ignore_ascii_case(pid),
                _ => false,
            }
        };

        if matches("vid", "pid") {
            return true;
        }
        self.properties
            .sub_tree("vid")
            .keys()
            .any(|n| matches(&format!("vid.{n}"), &format!("pid.{n}")))
    }

    /// Menus declared by this board, in declaration order
    pub fn menus(&self) -> Vec<BoardMenu> {
        let menu_tree = self.properties.sub_tree("menu");
        menu_tree
            .first_level_keys()
            .into_iter()
            .map(|id| {
                let tree = menu_tree.sub_tree(&id);
                let options = tree
                    .first_level_keys()
                    .into_iter()
                    .map(|opt| {
                        let label = tree.get_or(&opt, &opt).to_string();
                        (opt, label)
                    })
                    .collect();
                BoardMenu { id, options }
            })
            .collect()
    }

    /// Compute the board's build properties for the given menu selections
    ///
    /// Every menu contributes the subtree of its selected option. A menu
    /// the user did not configure uses its first declared option.
    pub fn build_properties(&self, configs: &PropertiesMap) -> Result<PropertiesMap, BoardError> {
        let mut props = self.properties.clone();
        let mut remaining = configs.clone();

        for menu in self.menus() {
            let selected = match remaining.remove(&menu.id) {
                Some(value) => {
                    if !menu.options.iter().any(|(opt, _)| *opt == value) {
                        return Err(BoardError::InvalidOption {
                            option: menu.id,
                            value,
                        });
                    }
                    value
                }
                None => match menu.options.first() {
                    Some((opt, _)) => opt.clone(),
                    None => continue,
                },
            };
            props.merge(
                &self
                    .properties
                    .sub_tree(&format!("menu.{}.{selected}", menu.id)),
            );
        }

        if let Some(option) = remaining.keys().next() {
            return Err(BoardError::UnknownOption {
                option: option.to_string(),
            });
        }
        Ok(props)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqbn())
    }
}
