//! Path utilities for spindle configuration files

use std::path::PathBuf;

/// Get the default configuration directory
///
/// Returns: `~/.config/spindle` (platform config dir), falling back to
/// `./spindle` when no config directory is known.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spindle")
}

/// Get the default config file path for a given file name
///
/// Returns: `{config_dir}/spindle/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_spindle() {
        let path = default_config_dir();
        assert!(path.ends_with("spindle"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path("test.yaml");
        assert!(path.ends_with("spindle/test.yaml"));
    }
}
