//! CMake project export
//!
//! Platforms that set `compiler.export_cmake` get a standalone copy of the
//! build under `<build>/_cmake`: core, variant, imported libraries and the
//! preprocessed sketch, plus a `CMakeLists.txt`. When the property names an
//! existing file it is used as the `CMakeLists.txt` template.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::defaults::{CMAKE_EXPORT_DIR, HEADER_EXTENSIONS, SOURCE_EXTENSIONS};
use crate::core::libraries::Library;
use crate::core::properties::PropertiesMap;
use crate::error::FilesystemError;
use crate::infra::filesystem;

const CMAKE_TEMPLATE: &str = "\
cmake_minimum_required(VERSION 3.5)

project({cmake.project_name} C CXX ASM)

set(CMAKE_C_FLAGS \"{compiler.c.flags} {build.extra_flags}\")
set(CMAKE_CXX_FLAGS \"{compiler.cpp.flags} {build.extra_flags}\")

include_directories({cmake.include_dirs})

file(GLOB_RECURSE SOURCES {cmake.source_globs})

add_executable({cmake.project_name} ${SOURCES})
";

/// Whether the platform asks for a CMake export
pub fn can_export(props: &PropertiesMap) -> bool {
    props.get("compiler.export_cmake").is_some_and(|v| !v.trim().is_empty())
}

/// What goes into the export
#[derive(Debug, Clone, Copy)]
pub struct CMakeExport<'a> {
    pub build_path: &'a Path,
    pub core_path: &'a Path,
    pub variant_path: Option<&'a Path>,
    pub sketch_build_path: &'a Path,
    pub libraries: &'a [Library],
}

/// Write the export and return its directory
pub fn export(
    project: &CMakeExport<'_>,
    props: &PropertiesMap,
) -> Result<PathBuf, FilesystemError> {
    let export_dir = project.build_path.join(CMAKE_EXPORT_DIR);
    filesystem::remove_dir_all(&export_dir)?;

    let mut include_dirs = Vec::new();
    copy_sources(project.core_path, &export_dir.join("core"))?;
    include_dirs.push("core".to_string());
    if let Some(variant) = project.variant_path {
        copy_sources(variant, &export_dir.join("variant"))?;
        include_dirs.push("variant".to_string());
    }
    for library in project.libraries {
        let target = Path::new("lib").join(library.build_dir_name());
        copy_sources(&library.source_dir, &export_dir.join(&target))?;
        include_dirs.push(target.to_string_lossy().into_owned());
    }
    copy_sources(project.sketch_build_path, &export_dir.join("sketch"))?;

    let mut props = props.clone();
    let name = props
        .get_or("build.project_name", "sketch")
        .replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_");
    props.set("cmake.project_name", name);
    props.set("cmake.include_dirs", include_dirs.join(" "));
    props.set(
        "cmake.source_globs",
        SOURCE_EXTENSIONS
            .iter()
            .map(|ext| format!("\"*.{ext}\""))
            .collect::<Vec<_>>()
            .join(" "),
    );

    let template = props
        .get_path("compiler.export_cmake")
        .filter(|p| p.is_file())
        .and_then(|p| {
            filesystem::read_file(&p)
                .map_err(|e| debug!("Using built-in CMake template: {e}"))
                .ok()
        })
        .unwrap_or_else(|| CMAKE_TEMPLATE.to_string());

    filesystem::write_file(&export_dir.join("CMakeLists.txt"), &props.expand(&template))?;
    debug!("Exported CMake project to {}", export_dir.display());
    Ok(export_dir)
}

fn copy_sources(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    let extensions: Vec<&str> = SOURCE_EXTENSIONS
        .iter()
        .chain(HEADER_EXTENSIONS)
        .copied()
        .collect();
    for file in filesystem::list_files(from, &extensions, true) {
        let relative = file.strip_prefix(from).unwrap_or(&file);
        filesystem::copy_file(&file, &to.join(relative))?;
    }
    Ok(())
}
