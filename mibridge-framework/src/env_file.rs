//! Optional `.env` file loading.

use std::path::{Path, PathBuf};

/// Outcome of looking for a `.env` file at startup.
#[derive(Debug)]
pub enum EnvFile {
    Loaded(PathBuf),
    /// No file found. Not an error.
    Missing,
    Unreadable(String),
}

impl EnvFile {
    /// Load `.env` from the working directory or one of its parents.
    ///
    /// Variables already set in the process environment win.
    pub fn load() -> Self {
        Self::classify(dotenvy::dotenv())
    }

    /// Load a specific env file.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::classify(dotenvy::from_path(path).map(|()| path.to_path_buf()))
    }

    fn classify(result: dotenvy::Result<PathBuf>) -> Self {
        match result {
            Ok(path) => Self::Loaded(path),
            Err(e) if e.not_found() => Self::Missing,
            Err(e) => Self::Unreadable(e.to_string()),
        }
    }

    pub fn log(&self) {
        match self {
            Self::Loaded(path) => tracing::info!(path = %path.display(), "Loaded environment file"),
            Self::Missing => tracing::debug!("No .env file found"),
            Self::Unreadable(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = EnvFile::load_from(dir.path().join(".env"));
        assert!(matches!(env_file, EnvFile::Missing));
    }

    #[test]
    fn test_env_file_sets_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "MIBRIDGE_TEST_ENV_FILE_HOST=10.1.1.20\n").unwrap();

        let env_file = EnvFile::load_from(&path);
        assert!(matches!(env_file, EnvFile::Loaded(ref p) if p == &path));
        assert_eq!(
            std::env::var("MIBRIDGE_TEST_ENV_FILE_HOST").as_deref(),
            Ok("10.1.1.20")
        );
    }

    #[test]
    fn test_malformed_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "NOT A VALID LINE\n").unwrap();

        assert!(matches!(EnvFile::load_from(&path), EnvFile::Unreadable(_)));
    }
}
