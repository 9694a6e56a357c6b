//! Parses the single text file holding every WGSL program the renderer uses.
//!
//! An atlas starts with a shared prelude followed by one section per program.
//! Each section begins with a marker line naming the program:
//!
//! ```text
//! struct DrawUniforms { ... }   // prelude, prepended to every program
//!
//! //! program flat
//! @vertex fn vs_main(...) { ... }
//! @fragment fn fs_main(...) { ... }
//! ```
use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::content;
use crate::renderer::device::ShaderProgram;

/// Prefix of the line that starts a new program section.
pub const PROGRAM_MARKER: &str = "//! program ";

#[derive(Debug, Error)]
pub enum ShaderAtlasError {
    #[error("failed to read shader atlas")]
    Io(#[from] std::io::Error),
    #[error("program `{name}` is defined twice (second definition on line {line})")]
    DuplicateProgram { name: String, line: usize },
    #[error("shader atlas does not define any programs")]
    Empty,
}

/// Every program found in an atlas, each with the shared prelude prepended.
#[derive(Debug, Default)]
pub struct ShaderAtlas {
    prelude: String,
    programs: HashMap<ShaderProgram, String>,
}

impl ShaderAtlas {
    /// Load and parse the atlas file at `path`, relative to the content
    /// directory.
    #[tracing::instrument(level = "info")]
    pub fn load(path: &Path) -> Result<Self, ShaderAtlasError> {
        let text = content::load_as_string(path)?;
        let atlas = Self::parse(&text)?;

        info!("loaded {} shader programs", atlas.programs.len());
        Ok(atlas)
    }

    /// Parse atlas text. Sections naming a program the renderer does not know
    /// are ignored with a warning.
    pub fn parse(text: &str) -> Result<Self, ShaderAtlasError> {
        let mut atlas = ShaderAtlas::default();
        let mut current: Option<ShaderProgram> = None;
        let mut skipping = false;
        let mut body = String::new();

        for (index, line) in text.lines().enumerate() {
            let Some(name) = line.trim_start().strip_prefix(PROGRAM_MARKER) else {
                body.push_str(line);
                body.push('\n');
                continue;
            };

            atlas.finish_section(current, skipping, std::mem::take(&mut body));

            let name = name.trim();
            match ShaderProgram::from_name(name) {
                Some(program) if atlas.programs.contains_key(&program) => {
                    return Err(ShaderAtlasError::DuplicateProgram {
                        name: name.to_string(),
                        line: index + 1,
                    });
                }
                Some(program) => {
                    current = Some(program);
                    skipping = false;
                }
                None => {
                    warn!("ignoring unknown shader program `{name}` on line {}", index + 1);
                    current = None;
                    skipping = true;
                }
            }
        }

        atlas.finish_section(current, skipping, body);

        if atlas.programs.is_empty() {
            return Err(ShaderAtlasError::Empty);
        }

        Ok(atlas)
    }

    fn finish_section(&mut self, program: Option<ShaderProgram>, skipping: bool, body: String) {
        match program {
            Some(program) => {
                self.programs.insert(program, body);
            }
            None if !skipping => self.prelude = body,
            None => {}
        }
    }

    /// Full WGSL source for `program`, prelude included.
    pub fn source(&self, program: ShaderProgram) -> Option<String> {
        self.programs
            .get(&program)
            .map(|body| format!("{}\n{}", self.prelude, body))
    }

    pub fn contains(&self, program: ShaderProgram) -> bool {
        self.programs.contains_key(&program)
    }

    /// Programs defined by the atlas, in no particular order.
    pub fn programs(&self) -> impl Iterator<Item = ShaderProgram> + '_ {
        self.programs.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATLAS: &str = "\
const SHARED: f32 = 1.0;
//! program flat
fn flat_body() {}
//! program no_light
fn no_light_body() {}
";

    #[test]
    fn sections_get_the_prelude() {
        let atlas = ShaderAtlas::parse(ATLAS).unwrap();

        let flat = atlas.source(ShaderProgram::Flat).unwrap();
        assert!(flat.starts_with("const SHARED"));
        assert!(flat.contains("flat_body"));
        assert!(!flat.contains("no_light_body"));

        assert!(atlas.contains(ShaderProgram::NoLight));
        assert!(!atlas.contains(ShaderProgram::Skybox));
        assert_eq!(None, atlas.source(ShaderProgram::Skybox));
    }

    #[test]
    fn unknown_sections_are_skipped() {
        let atlas = ShaderAtlas::parse(
            "//! program phong\nfn phong() {}\n//! program flat\nfn flat() {}\n",
        )
        .unwrap();

        assert_eq!(1, atlas.programs().count());
        let flat = atlas.source(ShaderProgram::Flat).unwrap();
        assert!(!flat.contains("phong"));
    }

    #[test]
    fn duplicate_programs_are_rejected() {
        let result = ShaderAtlas::parse("//! program flat\n//! program flat\n");

        assert!(matches!(
            result,
            Err(ShaderAtlasError::DuplicateProgram { line: 2, .. })
        ));
    }

    #[test]
    fn shipped_atlas_defines_every_program() {
        let atlas = ShaderAtlas::load(Path::new("shaders.atlas")).unwrap();

        for program in ShaderProgram::ALL {
            let source = atlas.source(program).unwrap();
            assert!(source.contains("fn vs_main"), "{} has no vertex stage", program.name());
            assert!(source.contains("fn fs_main"), "{} has no fragment stage", program.name());
            assert_eq!(1, source.matches("fn vs_main").count());
        }
    }

    #[test]
    fn atlas_without_programs_is_rejected() {
        assert!(matches!(
            ShaderAtlas::parse("fn only_prelude() {}\n"),
            Err(ShaderAtlasError::Empty)
        ));
    }
}
