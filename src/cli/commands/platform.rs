//! Core subcommand implementations
//!
//! Implements `boardsmith core list`.

use anyhow::Result;

use super::Environment;
use crate::cli::output::print_table;

/// List installed platform releases
pub async fn execute_list() -> Result<()> {
    let env = Environment::load()?;
    let releases = env.manager.installed_platform_releases();

    if releases.is_empty() {
        println!("No platforms installed.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = releases
        .iter()
        .map(|release| {
            let id = &release.id;
            vec![
                format!("{}:{}", id.packager, id.architecture),
                id.version.clone(),
                release.name(),
            ]
        })
        .collect();
    print_table(&["ID", "Installed", "Name"], &rows);
    Ok(())
}
