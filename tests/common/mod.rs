//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: an isolated
//! set of boardsmith directories with a fake installed hardware tree.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test environment
///
/// Creates a temporary directory holding the config, data and user
/// directories plus any sketches, and runs the binary against them.
pub struct TestProject {
    /// Temporary directory for the test environment
    pub dir: TempDir,
}

impl TestProject {
    /// Create an empty environment in a temporary directory
    pub fn new() -> Self {
        let project = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        project.create_dir("config");
        project.create_dir("data");
        project.create_dir("user");
        project
    }

    /// Create an environment with the sample platform and tool installed
    pub fn with_sample_platform() -> Self {
        let project = Self::new();
        project.install_platform("testpkg", "avr", "1.0.0", SAMPLE_BOARDS_TXT, SAMPLE_PLATFORM_TXT);
        project.install_tool("testpkg", "avr-gcc", "7.3.0");
        project
    }

    /// Get the path to the test directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file relative to the test directory
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a directory relative to the test directory
    pub fn create_dir(&self, name: &str) {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path).expect("Failed to create directory");
    }

    /// Check if a file exists relative to the test directory
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file relative to the test directory
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Lay out an installed platform release with a minimal core and variant
    pub fn install_platform(
        &self,
        packager: &str,
        arch: &str,
        version: &str,
        boards: &str,
        platform: &str,
    ) {
        let root = format!("data/packages/{packager}/hardware/{arch}/{version}");
        self.create_file(&format!("{root}/boards.txt"), boards);
        self.create_file(&format!("{root}/platform.txt"), platform);
        self.create_file(&format!("{root}/cores/arduino/Arduino.h"), "#pragma once\n");
        self.create_file(&format!("{root}/cores/arduino/main.cpp"), "int main() { return 0; }\n");
        self.create_file(&format!("{root}/cores/arduino/wiring.c"), "void init(void) {}\n");
        self.create_file(&format!("{root}/variants/standard/pins_arduino.h"), "#pragma once\n");
    }

    /// Lay out an installed tool release
    pub fn install_tool(&self, packager: &str, tool: &str, version: &str) {
        self.create_dir(&format!("data/packages/{packager}/tools/{tool}/{version}/bin"));
    }

    /// Write a sketch folder `sketches/<name>/<name>.ino`, returning the folder
    pub fn create_sketch(&self, name: &str, content: &str) -> PathBuf {
        self.create_file(&format!("sketches/{name}/{name}.ino"), content);
        self.dir.path().join("sketches").join(name)
    }

    /// A `boardsmith` command isolated to this environment
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_boardsmith"));
        cmd.current_dir(self.path())
            .env("BOARDSMITH_CONFIG_DIR", self.dir.path().join("config"))
            .env("BOARDSMITH_DATA_DIR", self.dir.path().join("data"))
            .env("BOARDSMITH_USER_DIR", self.dir.path().join("user"))
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run `boardsmith` with the given arguments
    pub fn run(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .expect("Failed to execute boardsmith")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Stdout of a finished command
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stderr of a finished command
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Sample boards.txt with a USB-identified board and a board with a menu
pub const SAMPLE_BOARDS_TXT: &str = r"
menu.cpu=Processor

uno.name=Test Uno
uno.vid.0=0x2341
uno.pid.0=0x0043
uno.upload.tool=avrdude
uno.build.mcu=atmega328p
uno.build.core=arduino
uno.build.variant=standard

nano.name=Test Nano
nano.build.core=arduino
nano.build.variant=standard
nano.menu.cpu.atmega328=ATmega328P
nano.menu.cpu.atmega328.build.mcu=atmega328p
nano.menu.cpu.atmega168=ATmega168
nano.menu.cpu.atmega168.build.mcu=atmega168
";

/// Sample platform.txt whose recipes succeed without a real toolchain
pub const SAMPLE_PLATFORM_TXT: &str = r#"
name=Test AVR Boards
version=1.0.0

compiler.path={runtime.tools.avr-gcc.path}/bin/
compiler.cpp.flags=-c -g -Os -mmcu={build.mcu}

recipe.c.o.pattern=true -c {includes} "{source_file}" -o "{object_file}"
recipe.cpp.o.pattern=true {compiler.cpp.flags} {includes} "{source_file}" -o "{object_file}"
recipe.S.o.pattern=true -c {includes} "{source_file}" -o "{object_file}"
recipe.ar.pattern=true rcs "{archive_file_path}" "{object_file}"
recipe.c.combine.pattern=true -o "{build.path}/{build.project_name}.elf" {object_files}
"#;

/// Sample sketch with a helper that needs a prototype
pub const SAMPLE_SKETCH: &str = r"
void setup() {
  blink(3);
}

void loop() {
}

void blink(int times) {
  for (int i = 0; i < times; i++) {
  }
}
";
