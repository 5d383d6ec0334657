//! File engine configuration

use std::path::PathBuf;

/// Default root for relative media names
pub const DEFAULT_SOUNDS_DIR: &str = "/var/lib/pbx/sounds";

/// File engine configuration options
#[derive(Debug, Clone)]
pub struct FileConfig {
    /// Root directory for relative media names
    pub sounds_dir: PathBuf,

    /// Language directory goes before the name (`en/demo`) instead of
    /// between its directory and file part (`digits/en/1`)
    pub language_is_prefix: bool,

    /// Language tried last when resolving localized names
    pub default_language: String,

    /// Record into this directory and move into place on close
    pub record_cache_dir: Option<PathBuf>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            sounds_dir: PathBuf::from(DEFAULT_SOUNDS_DIR),
            language_is_prefix: true,
            default_language: "en".to_string(),
            record_cache_dir: None,
        }
    }
}

impl FileConfig {
    /// Create a new config rooted at `dir`
    pub fn with_sounds_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            sounds_dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the sounds directory
    pub fn sounds_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sounds_dir = dir.into();
        self
    }

    /// Put the language directory after the name's directory part
    pub fn language_suffix(mut self) -> Self {
        self.language_is_prefix = false;
        self
    }

    /// Set the default language
    pub fn default_language(mut self, lang: impl Into<String>) -> Self {
        self.default_language = lang.into();
        self
    }

    /// Enable record caching
    pub fn record_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.record_cache_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FileConfig::default();

        assert_eq!(config.sounds_dir, PathBuf::from(DEFAULT_SOUNDS_DIR));
        assert!(config.language_is_prefix);
        assert_eq!(config.default_language, "en");
        assert!(config.record_cache_dir.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let config = FileConfig::with_sounds_dir("/srv/sounds")
            .language_suffix()
            .default_language("fr")
            .record_cache_dir("/tmp/cache");

        assert_eq!(config.sounds_dir, PathBuf::from("/srv/sounds"));
        assert!(!config.language_is_prefix);
        assert_eq!(config.default_language, "fr");
        assert_eq!(config.record_cache_dir, Some(PathBuf::from("/tmp/cache")));
    }
}
