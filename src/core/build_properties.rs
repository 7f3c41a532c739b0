//! Build properties assembly
//!
//! Layers every source of configuration into the single map that recipes
//! are expanded against, from lowest to highest precedence:
//!
//! 1. the build platform's `platform.txt`
//! 2. the board's own platform `platform.txt`, when it is a different release
//! 3. the board's build properties for the selected menu options
//! 4. runtime paths and values computed here
//! 5. `--build-property` overrides

use std::path::{Path, PathBuf};

use crate::config::defaults::RUNTIME_IDE_VERSION;
use crate::core::fqbn::Fqbn;
use crate::core::package::{Packages, PlatformRelease, ToolRelease};
use crate::core::properties::{current_os_suffix, PropertiesMap};
use crate::core::resolver::ResolvedFqbn;

/// Everything needed to compute the properties of one build
#[derive(Debug, Clone)]
pub struct BuildTarget<'a> {
    pub fqbn: &'a Fqbn,
    pub resolved: &'a ResolvedFqbn<'a>,
    /// Registry, for `packager:variant` lookups
    pub packages: &'a Packages,
    pub tools: &'a [&'a ToolRelease],
    pub build_path: &'a Path,
    /// Main sketch file name, e.g. `Blink.ino`
    pub project_name: &'a str,
    /// Sketch folder
    pub source_path: &'a Path,
    pub jobs: usize,
    pub warnings_level: &'a str,
    pub custom: &'a PropertiesMap,
}

/// Compute the merged build properties
pub fn assemble(target: &BuildTarget<'_>) -> PropertiesMap {
    let resolved = target.resolved;
    let mut props = resolved.build_platform_release.properties.clone();
    if resolved.build_platform_release.id != resolved.platform_release.id {
        props.merge(&resolved.platform_release.properties);
    }
    props.merge(&resolved.build_properties);

    let platform_dir = install_dir(resolved.platform_release);
    let core_platform_dir = install_dir(resolved.build_platform_release);

    let core = resolved.build_properties.get_or("build.core", "");
    let core_name = core.split_once(':').map_or(core, |(_, name)| name);
    if !core_name.is_empty() {
        props.set(
            "build.core.path",
            path_string(&core_platform_dir.join("cores").join(core_name)),
        );
    }
    props.set("build.system.path", path_string(&core_platform_dir.join("system")));

    if let Some(variant_dir) = variant_path(target, &platform_dir) {
        props.set("build.variant.path", path_string(&variant_dir));
    } else {
        props.set("build.variant.path", "");
    }

    props.set("runtime.platform.path", path_string(&platform_dir));
    props.set(
        "runtime.hardware.path",
        path_string(platform_dir.parent().unwrap_or(&platform_dir)),
    );
    props.set("build.arch", target.fqbn.platform_arch.to_uppercase());
    props.set("build.fqbn", target.fqbn.to_string());
    props.set("runtime.os", current_os_suffix());
    props.set("runtime.ide.version", RUNTIME_IDE_VERSION);
    props.set("ide_version", RUNTIME_IDE_VERSION);
    props.set("build.path", path_string(target.build_path));
    props.set("build.project_name", target.project_name);
    props.set("build.source.path", path_string(target.source_path));
    props.set("build.jobs", target.jobs.to_string());

    let warning_key = format!("compiler.warning_flags.{}", target.warnings_level);
    if let Some(flags) = props.get(&warning_key).map(str::to_string) {
        props.set("compiler.warning_flags", flags);
    }

    for tool in target.tools {
        if let Some(dir) = &tool.install_dir {
            let dir = path_string(dir);
            props.set(format!("runtime.tools.{}.path", tool.tool.name), dir.clone());
            props.set(
                format!("runtime.tools.{}-{}.path", tool.tool.name, tool.version),
                dir,
            );
        }
    }

    props.merge(target.custom);
    props
}

fn variant_path(target: &BuildTarget<'_>, platform_dir: &Path) -> Option<PathBuf> {
    let variant = target.resolved.build_properties.get("build.variant")?;
    if variant.is_empty() {
        return None;
    }
    match variant.split_once(':') {
        None => Some(platform_dir.join("variants").join(variant)),
        Some((packager, name)) => {
            let release = target
                .packages
                .get(packager)?
                .platforms
                .get(&target.fqbn.platform_arch)?
                .installed()?;
            Some(install_dir(release).join("variants").join(name))
        }
    }
}

fn install_dir(release: &PlatformRelease) -> PathBuf {
    release.install_dir.clone().unwrap_or_default()
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::registry::RegistryBuilder;

    fn assemble_for(
        pm: &crate::core::manager::PackageManager,
        fqbn: &str,
        custom: &PropertiesMap,
    ) -> PropertiesMap {
        let fqbn = Fqbn::parse(fqbn).unwrap();
        let resolved = pm.resolve_fqbn(&fqbn).unwrap();
        let tools = pm.find_tools_required_for_board(resolved.board).unwrap();
        assemble(&BuildTarget {
            fqbn: &fqbn,
            resolved: &resolved,
            packages: pm.packages(),
            tools: &tools,
            build_path: Path::new("/tmp/build"),
            project_name: "Blink.ino",
            source_path: Path::new("/home/me/Blink"),
            jobs: 4,
            warnings_level: "all",
            custom,
        })
    }

    #[test]
    fn test_layers_and_runtime_keys() {
        let pm = RegistryBuilder::new()
            .installed_platform("arduino", "avr", "1.8.6", &["uno"])
            .platform_property("arduino", "avr", "compiler.c.flags", "-Os")
            .platform_property("arduino", "avr", "build.extra_flags", "")
            .platform_property("arduino", "avr", "compiler.warning_flags.all", "-Wall -Wextra")
            .board_property("arduino", "avr", "uno", "build.core", "arduino")
            .board_property("arduino", "avr", "uno", "build.variant", "standard")
            .board_property("arduino", "avr", "uno", "build.extra_flags", "-DUNO")
            .installed_tool("arduino", "avr-gcc", "7.3.0")
            .build();

        let props = assemble_for(&pm, "arduino:avr:uno", &PropertiesMap::new());
        assert_eq!(props.get("compiler.c.flags"), Some("-Os"));
        assert_eq!(props.get("build.extra_flags"), Some("-DUNO"));
        assert_eq!(props.get("build.core.path"), Some("/hardware/arduino/avr/1.8.6/cores/arduino"));
        assert_eq!(
            props.get("build.variant.path"),
            Some("/hardware/arduino/avr/1.8.6/variants/standard")
        );
        assert_eq!(props.get("runtime.platform.path"), Some("/hardware/arduino/avr/1.8.6"));
        assert_eq!(props.get("runtime.hardware.path"), Some("/hardware/arduino/avr"));
        assert_eq!(props.get("build.arch"), Some("AVR"));
        assert_eq!(props.get("build.fqbn"), Some("arduino:avr:uno"));
        assert_eq!(props.get("build.project_name"), Some("Blink.ino"));
        assert_eq!(props.get("build.jobs"), Some("4"));
        assert_eq!(props.get("compiler.warning_flags"), Some("-Wall -Wextra"));
        assert_eq!(props.get("runtime.tools.avr-gcc.path"), Some("/tools/arduino/avr-gcc/7.3.0"));
        assert_eq!(
            props.get("runtime.tools.avr-gcc-7.3.0.path"),
            Some("/tools/arduino/avr-gcc/7.3.0")
        );
    }

    #[test]
    fn test_core_and_variant_from_other_package() {
        let pm = RegistryBuilder::new()
            .installed_platform("arduino", "avr", "1.8.6", &["uno"])
            .platform_property("arduino", "avr", "recipe.c.o.pattern", "gcc -c")
            .installed_platform("acme", "avr", "2.0.0", &["rocket"])
            .platform_property("acme", "avr", "recipe.c.o.pattern", "acme-gcc -c")
            .board_property("acme", "avr", "rocket", "build.core", "arduino:arduino")
            .board_property("acme", "avr", "rocket", "build.variant", "arduino:mega")
            .build();

        let props = assemble_for(&pm, "acme:avr:rocket", &PropertiesMap::new());
        assert_eq!(props.get("recipe.c.o.pattern"), Some("acme-gcc -c"));
        assert_eq!(props.get("build.core.path"), Some("/hardware/arduino/avr/1.8.6/cores/arduino"));
        assert_eq!(
            props.get("build.variant.path"),
            Some("/hardware/arduino/avr/1.8.6/variants/mega")
        );
        assert_eq!(props.get("runtime.platform.path"), Some("/hardware/acme/avr/2.0.0"));
    }

    #[test]
    fn test_custom_properties_win() {
        let pm = RegistryBuilder::new()
            .installed_platform("arduino", "avr", "1.8.6", &["uno"])
            .board_property("arduino", "avr", "uno", "build.core", "arduino")
            .build();
        let custom =
            PropertiesMap::from_pairs([("build.path", "/elsewhere"), ("build.extra_flags", "-DX")]);

        let props = assemble_for(&pm, "arduino:avr:uno", &custom);
        assert_eq!(props.get("build.path"), Some("/elsewhere"));
        assert_eq!(props.get("build.extra_flags"), Some("-DX"));
    }
}
