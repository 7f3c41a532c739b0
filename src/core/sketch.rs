//! Sketches
//!
//! A sketch is a folder `Name/` holding `Name.ino`, optionally more `.ino`
//! files, plain C/C++ sources and a `src/` tree. The `.ino` files are
//! merged into one translation unit, `Name.ino.cpp`, which preprocessing
//! then completes with the main header include and function prototypes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::defaults::{HEADER_EXTENSIONS, MAIN_HEADER, SKETCH_EXTENSIONS, SOURCE_EXTENSIONS};
use crate::error::StageError;
use crate::infra::filesystem;

/// A loaded sketch folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sketch {
    pub name: String,
    pub folder: PathBuf,
    pub main_file: PathBuf,
    /// Other `.ino`/`.pde` files at the top level, sorted
    pub other_sketch_files: Vec<PathBuf>,
    /// Sources and headers at the top level and under `src/`
    pub additional_files: Vec<PathBuf>,
}

impl Sketch {
    /// Load a sketch from its folder or its main file
    pub fn load(path: &Path) -> Result<Self, StageError> {
        let folder = if path.is_file() {
            path.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            path.to_path_buf()
        };
        if !folder.is_dir() {
            return Err(sketch_error(format!("no such sketch folder: {}", folder.display())));
        }
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| sketch_error(format!("invalid sketch path: {}", folder.display())))?;

        let main_file = SKETCH_EXTENSIONS
            .iter()
            .map(|ext| folder.join(format!("{name}.{ext}")))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                let expected = folder.join(format!("{name}.ino"));
                sketch_error(format!("main file missing from sketch: {}", expected.display()))
            })?;

        let other_sketch_files = filesystem::list_files(&folder, SKETCH_EXTENSIONS, false)
            .into_iter()
            .filter(|p| *p != main_file)
            .collect();

        let extensions: Vec<&str> = SOURCE_EXTENSIONS
            .iter()
            .chain(HEADER_EXTENSIONS)
            .copied()
            .collect();
        let mut additional_files = filesystem::list_files(&folder, &extensions, false);
        additional_files.extend(filesystem::list_files(&folder.join("src"), &extensions, true));

        Ok(Self {
            name,
            folder,
            main_file,
            other_sketch_files,
            additional_files,
        })
    }

    /// Main file name, used as `build.project_name`
    pub fn project_name(&self) -> String {
        self.main_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.ino", self.name))
    }

    /// Name of the merged translation unit
    pub fn merged_file_name(&self) -> String {
        format!("{}.cpp", self.project_name())
    }

    /// Concatenate the sketch files, main file first, with `#line` markers
    pub fn merge_sources(&self) -> Result<String, StageError> {
        let mut merged = String::new();
        for file in std::iter::once(&self.main_file).chain(&self.other_sketch_files) {
            let content = filesystem::read_file(file)?;
            merged.push_str(&format!("#line 1 {}\n", quote_path(file)));
            merged.push_str(&content);
            if !content.ends_with('\n') {
                merged.push('\n');
            }
        }
        Ok(merged)
    }

    /// Write the merged source and copy additional files into `sketch_build_dir`
    ///
    /// Returns the path of the merged translation unit.
    pub fn prepare_build_path(&self, sketch_build_dir: &Path) -> Result<PathBuf, StageError> {
        filesystem::create_dir_all(sketch_build_dir)?;
        for file in &self.additional_files {
            let relative = file.strip_prefix(&self.folder).unwrap_or(file);
            let target = sketch_build_dir.join(relative);
            let content = filesystem::read_file(file)?;
            filesystem::write_file_if_changed(&target, &content)?;
        }

        let merged_path = sketch_build_dir.join(self.merged_file_name());
        filesystem::write_file_if_changed(&merged_path, &self.merge_sources()?)?;
        Ok(merged_path)
    }
}

fn sketch_error(message: String) -> StageError {
    StageError::Sketch { message }
}

fn quote_path(path: &Path) -> String {
    format!("\"{}\"", path.to_string_lossy().replace('\\', "\\\\"))
}

/// Add the main header include and prototypes to a merged sketch
///
/// Prototypes are inserted before the first function definition, each
/// preceded by a `#line` marker pointing at its definition.
pub fn preprocess(merged: &str) -> String {
    let lines: Vec<&str> = merged.lines().collect();
    let positions = source_positions(&lines);
    let functions = find_functions(&lines);

    let mut out = String::new();
    if !includes_main_header(merged) {
        out.push_str(&format!("#include <{MAIN_HEADER}>\n"));
    }

    let Some(first) = functions.definitions.first() else {
        out.push_str(merged);
        return out;
    };

    let missing: Vec<&FunctionDefinition> = functions
        .definitions
        .iter()
        .filter(|f| !functions.declared.contains(&f.name))
        .collect();

    for (idx, line) in lines.iter().enumerate() {
        if idx == first.line && !missing.is_empty() {
            for function in &missing {
                if let Some((file, line)) = &positions[function.line] {
                    out.push_str(&format!("#line {line} {file}\n"));
                }
                out.push_str(&function.prototype);
                out.push_str(";\n");
            }
            if let Some((file, line)) = &positions[idx] {
                out.push_str(&format!("#line {line} {file}\n"));
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn includes_main_header(source: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(&format!(r#"(?m)^\s*#\s*include\s*[<"]{}[>"]"#, regex::escape(MAIN_HEADER)))
            .expect("main header regex is valid")
    });
    re.is_match(source)
}

/// Original `(quoted file, line)` of every merged line, from `#line` markers
fn source_positions(lines: &[&str]) -> Vec<Option<(String, usize)>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"^\s*#line\s+(\d+)\s+(".*")\s*$"#).expect("line marker regex is valid")
    });

    let mut current: Option<(String, usize)> = None;
    let mut positions = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(caps) = re.captures(line) {
            let next: usize = caps[1].parse().unwrap_or(1);
            positions.push(None);
            current = Some((caps[2].to_string(), next));
            continue;
        }
        positions.push(current.clone());
        if let Some((_, n)) = current.as_mut() {
            *n += 1;
        }
    }
    positions
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FunctionDefinition {
    name: String,
    prototype: String,
    line: usize,
}

#[derive(Debug, Default)]
struct Functions {
    definitions: Vec<FunctionDefinition>,
    declared: HashSet<String>,
}

const NOT_FUNCTIONS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "else", "sizeof",
];

fn find_functions(lines: &[&str]) -> Functions {
    static SIGNATURE: OnceLock<Regex> = OnceLock::new();
    let signature = SIGNATURE.get_or_init(|| {
        Regex::new(concat!(
            r"^\s*((?:[A-Za-z_][\w:<>,]*[\s\*&]+)+([A-Za-z_]\w*)",
            r"\s*\([^()]*\)(?:\s*const)?)\s*(\{|;)?"
        ))
        .expect("signature regex is valid")
    });

    let stripped = strip_comments_and_literals(lines);
    let mut functions = Functions::default();
    let mut depth: i64 = 0;

    for (idx, code) in stripped.iter().enumerate() {
        let trimmed = code.trim();
        if depth == 0 && !trimmed.is_empty() && !trimmed.starts_with('#') {
            if let Some(caps) = signature.captures(code) {
                let name = caps[2].to_string();
                let first_word = trimmed.split_whitespace().next().unwrap_or_default();
                if !NOT_FUNCTIONS.contains(&name.as_str()) && !NOT_FUNCTIONS.contains(&first_word) {
                    let opens_here = caps.get(3).map(|m| m.as_str()) == Some("{");
                    let declares = caps.get(3).map(|m| m.as_str()) == Some(";");
                    let opens_next = !opens_here
                        && !declares
                        && stripped[idx + 1..]
                            .iter()
                            .map(|l| l.trim())
                            .find(|l| !l.is_empty())
                            .is_some_and(|l| l.starts_with('{'));
                    if declares {
                        functions.declared.insert(name);
                    } else if opens_here || opens_next {
                        functions.definitions.push(FunctionDefinition {
                            name,
                            prototype: normalize_whitespace(&caps[1]),
                            line: idx,
                        });
                    }
                }
            }
        }
        for c in code.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth = (depth - 1).max(0),
                _ => {}
            }
        }
    }
    functions
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Blank out comments and string/char literal contents, keeping line count
fn strip_comments_and_literals(lines: &[&str]) -> Vec<String> {
    let mut in_block = false;
    lines
        .iter()
        .map(|line| {
            let mut out = String::with_capacity(line.len());
            let mut chars = line.chars().peekable();
            let mut literal: Option<char> = None;
            while let Some(c) = chars.next() {
                if in_block {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        in_block = false;
                    }
                    continue;
                }
                if let Some(quote) = literal {
                    if c == '\\' {
                        chars.next();
                    } else if c == quote {
                        literal = None;
                        out.push(c);
                    }
                    continue;
                }
                match c {
                    '/' if chars.peek() == Some(&'/') => break,
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        in_block = true;
                    }
                    '"' | '\'' => {
                        literal = Some(c);
                        out.push(c);
                    }
                    _ => out.push(c),
                }
            }
            out
        })
        .collect()
}
