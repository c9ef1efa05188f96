use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Isolated bundle directory for signing tests.
pub struct BundleFixture {
    pub temp_dir: TempDir,
}

impl BundleFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a file (and parent directories) inside the bundle.
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.temp_dir.path().join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    /// The `a.txt` / `sub/b.txt` bundle used throughout the signing tests.
    pub fn hello_world() -> Self {
        let fixture = Self::new();
        fixture.create_file("a.txt", "hello");
        fixture.create_file("sub/b.txt", "world");
        fixture
    }
}
