//! Plugin compilation.
//!
//! Builds a plugin crate with cargo and copies the resulting dynamic library
//! to its destination.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Plugin compilation errors.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Invalid plugin manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("Failed to run cargo: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("cargo build failed for {}: {status}", source_dir.display())]
    BuildFailed { source_dir: PathBuf, status: String },

    #[error("Build artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Library target name declared by a crate manifest.
///
/// Uses `[lib] name` when present, otherwise the package name with dashes
/// replaced by underscores.
pub fn library_name(manifest_path: &Path) -> Result<String, CompileError> {
    let manifest_err = |reason: String| CompileError::Manifest {
        path: manifest_path.to_path_buf(),
        reason,
    };

    let content = std::fs::read_to_string(manifest_path).map_err(|e| manifest_err(e.to_string()))?;
    let manifest: toml::Table = content.parse().map_err(|e: toml::de::Error| manifest_err(e.to_string()))?;

    let lib_name = manifest
        .get("lib")
        .and_then(|lib| lib.get("name"))
        .and_then(|name| name.as_str());
    if let Some(name) = lib_name {
        return Ok(name.to_string());
    }

    manifest
        .get("package")
        .and_then(|package| package.get("name"))
        .and_then(|name| name.as_str())
        .map(|name| name.replace('-', "_"))
        .ok_or_else(|| manifest_err("missing package name".to_string()))
}

/// File name cargo gives a dynamic library on this platform.
pub fn artifact_file_name(lib_name: &str) -> String {
    format!("{DLL_PREFIX}{lib_name}{DLL_SUFFIX}")
}

/// Output path used when no destination is given.
pub fn default_destination(source_dir: &Path, lib_name: &str) -> PathBuf {
    source_dir.join(format!("{lib_name}{DLL_SUFFIX}"))
}

/// Build the plugin crate in `source_dir` and copy the library to `destination`.
pub fn compile_plugin(source_dir: &Path, destination: &Path) -> Result<PathBuf, CompileError> {
    let manifest = source_dir.join("Cargo.toml");
    let lib_name = library_name(&manifest)?;
    let target_dir = source_dir.join("target");

    let cargo = std::env::var_os("CARGO").unwrap_or_else(|| "cargo".into());
    tracing::debug!(
        source_dir = %source_dir.display(),
        destination = %destination.display(),
        lib_name = %lib_name,
        "Compiling plugin"
    );

    let status = Command::new(cargo)
        .args(["build", "--release", "--lib", "--manifest-path"])
        .arg(&manifest)
        .arg("--target-dir")
        .arg(&target_dir)
        .status()
        .map_err(CompileError::Spawn)?;
    if !status.success() {
        return Err(CompileError::BuildFailed {
            source_dir: source_dir.to_path_buf(),
            status: status.to_string(),
        });
    }

    let artifact = target_dir.join("release").join(artifact_file_name(&lib_name));
    if !artifact.is_file() {
        return Err(CompileError::MissingArtifact(artifact));
    }

    std::fs::copy(&artifact, destination).map_err(|source| CompileError::Copy {
        from: artifact.clone(),
        to: destination.to_path_buf(),
        source,
    })?;

    tracing::info!(destination = %destination.display(), "Plugin compiled");
    Ok(destination.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("Cargo.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_library_name_from_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = manifest(dir.path(), "[package]\nname = \"echo-plugin\"\nversion = \"0.1.0\"\n");
        assert_eq!(library_name(&path).unwrap(), "echo_plugin");
    }

    #[test]
    fn test_library_name_from_lib_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = manifest(
            dir.path(),
            "[package]\nname = \"echo-plugin\"\n\n[lib]\nname = \"echo\"\ncrate-type = [\"cdylib\"]\n",
        );
        assert_eq!(library_name(&path).unwrap(), "echo");
    }

    #[test]
    fn test_library_name_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            library_name(&dir.path().join("Cargo.toml")),
            Err(CompileError::Manifest { .. })
        ));

        let path = manifest(dir.path(), "[workspace]\n");
        assert!(matches!(
            library_name(&path),
            Err(CompileError::Manifest { .. })
        ));
    }

    #[test]
    fn test_artifact_names() {
        #[cfg(target_os = "linux")]
        assert_eq!(artifact_file_name("echo"), "libecho.so");

        #[cfg(target_os = "macos")]
        assert_eq!(artifact_file_name("echo"), "libecho.dylib");

        assert_eq!(
            default_destination(Path::new("/src/echo"), "echo"),
            PathBuf::from(format!("/src/echo/echo{DLL_SUFFIX}"))
        );
    }

    #[test]
    fn test_compile_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = compile_plugin(dir.path(), &dir.path().join("out.so")).unwrap_err();
        assert!(matches!(err, CompileError::Manifest { .. }));
    }
}
