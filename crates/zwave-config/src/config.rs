/// Limits applied when loading a configuration directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum number of JSON files loaded from a directory.
    pub max_files_from_directory: usize,
    /// Maximum bytes allowed per file.
    pub max_file_size: usize,
    /// When true, a second definition of the same device is an error.
    /// Otherwise the later file wins and a warning is logged.
    pub fail_on_duplicate: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_files_from_directory: 4096,
            max_file_size: 256 * 1024,
            fail_on_duplicate: true,
        }
    }
}
