//! Tool selection for board builds
//!
//! A board build needs one release of every tool its platform depends on.
//! Platforms installed from a sketchbook `hardware/` folder declare no
//! dependencies, so every known tool first defaults to its latest
//! installed release; explicit dependencies then replace those defaults.

use std::collections::HashMap;

use tracing::debug;

use crate::core::board::Board;
use crate::core::manager::PackageManager;
use crate::core::package::{ToolDependency, ToolRelease};
use crate::error::ToolError;

impl PackageManager {
    /// Tool releases needed to build for `board`
    ///
    /// Returns one release per `packager:tool`. Fails without a partial set
    /// if any explicit dependency is not installed.
    pub fn find_tools_required_for_board(
        &self,
        board: &Board,
    ) -> Result<Vec<&ToolRelease>, ToolError> {
        let platform = self.platform_release(&board.platform)?;

        let mut found: HashMap<String, (&ToolRelease, bool)> = HashMap::new();
        for tool in self.packages().iter().flat_map(|p| p.tools.values()) {
            if let Some(release) = tool.latest_installed() {
                found.insert(release.tool.to_string(), (release, false));
            }
        }

        for dep in &platform.tool_dependencies {
            let release = self
                .find_tool_dependency(dep)
                .ok_or_else(|| ToolError::ToolReleaseNotFound(dep.clone()))?;
            found.insert(release.tool.to_string(), (release, true));
        }

        let mut selected: Vec<(&ToolRelease, bool)> = found.into_values().collect();
        selected.sort_by(|(a, _), (b, _)| a.tool.cmp(&b.tool));

        if let Some(events) = self.events() {
            for (release, explicit) in &selected {
                events.tool_release_selected(release, *explicit);
            }
        }
        debug!("{} tools required for {board}", selected.len());
        Ok(selected.into_iter().map(|(release, _)| release).collect())
    }

    /// The installed release matching a dependency exactly
    pub fn find_tool_dependency(&self, dep: &ToolDependency) -> Option<&ToolRelease> {
        self.find_tool_release(&dep.packager, &dep.name, &dep.version)
            .ok()
            .filter(|release| release.is_installed())
    }
}
