//! Handing the compiled manuscript to an external converter (pandoc by
//! default) to produce an epub.

use bk_core::config::ExportConfig;
use bk_core::error::{BkError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

pub const MANUSCRIPT_FILENAME: &str = "single_file.md";
pub const EBOOK_FILENAME: &str = "book.epub";
pub const DEFAULT_BUILD_DIR: &str = "build";

#[derive(Debug, Clone)]
pub struct EbookExport {
    converter: String,
    toc_depth: u32,
    chapter_level: u32,
    number_sections: bool,
    build_dir: Option<PathBuf>,
}

impl Default for EbookExport {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

impl EbookExport {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            converter: config.converter.clone(),
            toc_depth: config.toc_depth,
            chapter_level: config.chapter_level,
            number_sections: config.number_sections,
            build_dir: config.build_dir.clone(),
        }
    }

    pub fn with_build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = Some(dir.into());
        self
    }

    /// Configured build directory, or `build/` inside the project.
    pub fn build_dir(&self, project: &Path) -> PathBuf {
        match &self.build_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project.join(dir),
            None => project.join(DEFAULT_BUILD_DIR),
        }
    }

    /// Write the manuscript to `single_file.md` in `build_dir`, creating the
    /// directory as needed.
    pub fn write_manuscript(&self, build_dir: &Path, text: &str) -> Result<PathBuf> {
        fs::create_dir_all(build_dir).map_err(|e| BkError::from_io(build_dir, e))?;
        let path = build_dir.join(MANUSCRIPT_FILENAME);
        fs::write(&path, text).map_err(|e| BkError::from_io(&path, e))?;
        debug!(path = %path.display(), bytes = text.len(), "manuscript written");
        Ok(path)
    }

    pub fn command(&self, src: &Path, dst: &Path) -> Command {
        let mut cmd = Command::new(&self.converter);
        cmd.arg("-o")
            .arg(dst)
            .arg(src)
            .arg("--toc")
            .arg("--toc-depth")
            .arg(self.toc_depth.to_string())
            .arg("--epub-chapter-level")
            .arg(self.chapter_level.to_string());
        if self.number_sections {
            cmd.arg("--number-sections");
        }
        cmd
    }

    /// Run the converter. A launch failure or non-zero exit is an
    /// `Export` error carrying the converter's stderr.
    pub fn run(&self, src: &Path, dst: &Path) -> Result<()> {
        info!(src = %src.display(), dst = %dst.display(), converter = %self.converter, "converting");
        let output = self
            .command(src, dst)
            .output()
            .map_err(|e| BkError::Export(format!("failed to run {}: {e}", self.converter)))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(stdout = %stdout.trim(), "converter output");
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BkError::Export(format!(
                "{} exited with {}: {}",
                self.converter,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Write the manuscript into the project's build directory and, unless
    /// `manuscript_only`, convert it to `book.epub`. Returns the last file
    /// produced.
    pub fn export(&self, project: &Path, text: &str, manuscript_only: bool) -> Result<PathBuf> {
        let build_dir = self.build_dir(project);
        let src = self.write_manuscript(&build_dir, text)?;
        if manuscript_only {
            return Ok(src);
        }
        let dst = build_dir.join(EBOOK_FILENAME);
        self.run(&src, &dst)?;
        Ok(dst)
    }
}
