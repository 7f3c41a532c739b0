//! Board subcommand implementations
//!
//! Implements `boardsmith board list` and `boardsmith board details`.

use anyhow::{Context, Result};

use super::Environment;
use crate::cli::output::{print_table, status};
use crate::core::board::Board;
use crate::core::fqbn::Fqbn;
use crate::core::resolver::PartialResolution;

/// List installed boards, optionally filtered by USB id or board id
pub async fn execute_list(
    vid: Option<String>,
    pid: Option<String>,
    id: Option<String>,
) -> Result<()> {
    let env = Environment::load()?;
    let manager = &env.manager;

    let mut boards: Vec<&Board> = match (vid, pid, id) {
        (Some(vid), Some(pid), _) => manager.find_boards_with_vid_pid(&vid, &pid),
        (_, _, Some(id)) => manager.find_boards_with_id(&id),
        _ => manager
            .installed_platform_releases()
            .into_iter()
            .flat_map(|release| release.boards.values())
            .collect(),
    };

    if boards.is_empty() {
        println!("No boards found.");
        return Ok(());
    }

    boards.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.fqbn().cmp(&b.fqbn())));
    let rows: Vec<Vec<String>> = boards
        .iter()
        .map(|board| vec![board.name().to_string(), board.fqbn()])
        .collect();
    print_table(&["Board Name", "FQBN"], &rows);
    Ok(())
}

/// Show how an FQBN resolves: platforms, menus, tools and optionally properties
pub async fn execute_details(fqbn: &str, show_properties: bool) -> Result<()> {
    let env = Environment::load()?;
    let fqbn = Fqbn::parse(fqbn).with_context(|| format!("Invalid FQBN '{fqbn}'"))?;

    let resolved = match env.manager.resolve_fqbn(&fqbn) {
        Ok(resolved) => resolved,
        Err(partial) => {
            print_partial(&partial);
            return Err(partial.into_error()).with_context(|| format!("Failed to resolve {fqbn}"));
        }
    };

    let board = resolved.board;
    println!("Board name:     {}", board.name());
    println!("FQBN:           {fqbn}");
    println!("Platform:       {}", resolved.platform_release.id);
    if resolved.build_platform_release.id != resolved.platform_release.id {
        println!("Core platform:  {}", resolved.build_platform_release.id);
    }

    let menus = board.menus();
    if !menus.is_empty() {
        println!();
        println!("Options:");
        for menu in menus {
            let selected = fqbn
                .configs
                .get(&menu.id)
                .or_else(|| menu.options.first().map(|(id, _)| id.as_str()))
                .unwrap_or_default()
                .to_string();
            println!("  {}", menu.id);
            for (option, label) in &menu.options {
                let marker = if *option == selected { "*" } else { " " };
                println!("    {marker} {option:<16} {label}");
            }
        }
    }

    let tools = env
        .manager
        .find_tools_required_for_board(board)
        .context("Failed to resolve required tools")?;
    println!();
    println!("Required tools:");
    if tools.is_empty() {
        println!("  (none)");
    }
    for tool in tools {
        println!("  {tool}");
    }

    if show_properties {
        println!();
        println!("Build properties:");
        print!("{}", resolved.build_properties);
    }
    Ok(())
}

fn print_partial(partial: &PartialResolution<'_>) {
    if let Some(package) = partial.package {
        println!("Package:        {package}");
    }
    if let Some(release) = partial.platform_release {
        println!("Platform:       {}", release.id);
    }
    if let Some(board) = partial.board {
        println!("Board name:     {}", board.name());
    }
    if partial.build_properties.is_some() {
        eprintln!(
            "{} Build properties computed, but the core platform is missing",
            status::WARNING
        );
    }
}
