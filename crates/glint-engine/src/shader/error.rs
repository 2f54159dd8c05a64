use std::path::PathBuf;

/// Errors surfaced by shader loading.
///
/// Compile and link failures are not errors: they are logged and carried by
/// [`super::ProgramStatus`] so a program handle is always produced.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to read shader source {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
