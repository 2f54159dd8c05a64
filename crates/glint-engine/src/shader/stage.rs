use std::fmt;
use std::path::{Path, PathBuf};

use super::ShaderError;

/// Pipeline stage a source file is compiled for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
            ShaderStage::Compute => naga::ShaderStage::Compute,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        })
    }
}

/// Shading language of a source file.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SourceLanguage {
    Wgsl,
    /// Vulkan-flavoured GLSL 450 (explicit `set`/`binding` layouts).
    Glsl,
}

impl SourceLanguage {
    /// Picks the language from the file extension. Unknown extensions are WGSL.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("vert" | "frag" | "comp" | "glsl") => SourceLanguage::Glsl,
            _ => SourceLanguage::Wgsl,
        }
    }
}

/// Parsed and validated shader IR.
pub(crate) struct StageIr {
    pub(crate) module: naga::Module,
    pub(crate) info: naga::valid::ModuleInfo,
}

/// Result of compiling one source file.
///
/// Compilation failures do not abort: the stage is still returned, carrying
/// the diagnostic, and program linking reports it.
pub struct CompiledStage {
    stage: ShaderStage,
    label: String,
    ir: Option<StageIr>,
    log: Option<String>,
}

impl CompiledStage {
    /// Compiles in-memory source text.
    pub fn from_source(
        label: impl Into<String>,
        source: &str,
        language: SourceLanguage,
        stage: ShaderStage,
    ) -> Self {
        let label = label.into();

        match parse_and_validate(source, language, stage) {
            Ok(ir) => {
                log::debug!("compiled {stage} shader {label}");
                Self {
                    stage,
                    label,
                    ir: Some(ir),
                    log: None,
                }
            }
            Err(diagnostic) => {
                log::error!("shader compile error ({label}):\n{diagnostic}");
                Self {
                    stage,
                    label,
                    ir: None,
                    log: Some(diagnostic),
                }
            }
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the source parsed and validated.
    pub fn is_compiled(&self) -> bool {
        self.ir.is_some()
    }

    /// Compiler diagnostic text, present when compilation failed.
    pub fn log(&self) -> Option<&str> {
        self.log.as_deref()
    }

    pub(crate) fn into_ir(self) -> Option<StageIr> {
        self.ir
    }
}

/// Reads `path` whole and compiles it for `stage`.
///
/// Only an unreadable file is an error; compile failures are carried by the
/// returned [`CompiledStage`].
pub fn compile(path: impl AsRef<Path>, stage: ShaderStage) -> Result<CompiledStage, ShaderError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
        path: PathBuf::from(path),
        source,
    })?;

    Ok(CompiledStage::from_source(
        path.display().to_string(),
        &source,
        SourceLanguage::from_path(path),
        stage,
    ))
}

fn parse_and_validate(
    source: &str,
    language: SourceLanguage,
    stage: ShaderStage,
) -> Result<StageIr, String> {
    let module = match language {
        SourceLanguage::Wgsl => {
            naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?
        }
        SourceLanguage::Glsl => {
            let options = naga::front::glsl::Options::from(stage.to_naga());
            let mut frontend = naga::front::glsl::Frontend::default();
            frontend
                .parse(&options, source)
                .map_err(|errors| format!("GLSL parse error:\n{errors}"))?
        }
    };

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    );
    let info = validator
        .validate(&module)
        .map_err(|e| e.emit_to_string(source))?;

    Ok(StageIr { module, info })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_VERTEX: &str = r#"
@vertex
fn vs_main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 1.0);
}
"#;

    #[test]
    fn language_from_extension() {
        assert_eq!(SourceLanguage::from_path(Path::new("a.wgsl")), SourceLanguage::Wgsl);
        assert_eq!(SourceLanguage::from_path(Path::new("a.vert")), SourceLanguage::Glsl);
        assert_eq!(SourceLanguage::from_path(Path::new("a.frag")), SourceLanguage::Glsl);
        assert_eq!(SourceLanguage::from_path(Path::new("a.comp")), SourceLanguage::Glsl);
        assert_eq!(SourceLanguage::from_path(Path::new("shader")), SourceLanguage::Wgsl);
    }

    #[test]
    fn valid_source_compiles_without_log() {
        let stage =
            CompiledStage::from_source("vs", VALID_VERTEX, SourceLanguage::Wgsl, ShaderStage::Vertex);
        assert!(stage.is_compiled());
        assert!(stage.log().is_none());
        assert_eq!(stage.stage(), ShaderStage::Vertex);
    }

    #[test]
    fn syntax_error_keeps_stage_and_log() {
        let stage = CompiledStage::from_source(
            "broken",
            "@fragment fn fs_main( -> {",
            SourceLanguage::Wgsl,
            ShaderStage::Fragment,
        );
        assert!(!stage.is_compiled());
        assert!(stage.log().is_some_and(|l| !l.is_empty()));
        assert_eq!(stage.label(), "broken");
    }

    #[test]
    fn type_error_is_reported_by_validation() {
        let src = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    let x: f32 = 1u;
    return vec4<f32>(x);
}
"#;
        let stage = CompiledStage::from_source("typed", src, SourceLanguage::Wgsl, ShaderStage::Fragment);
        assert!(!stage.is_compiled());
    }

    #[test]
    fn glsl_vertex_compiles() {
        let src = r#"
#version 450
layout(location = 0) in vec3 a_position;
void main() {
    gl_Position = vec4(a_position, 1.0);
}
"#;
        let stage = CompiledStage::from_source("glsl", src, SourceLanguage::Glsl, ShaderStage::Vertex);
        assert!(stage.is_compiled(), "{:?}", stage.log());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = compile("/definitely/not/here.wgsl", ShaderStage::Vertex)
            .err()
            .expect("missing file must fail");
        assert!(matches!(err, ShaderError::Io { .. }));
    }
}
