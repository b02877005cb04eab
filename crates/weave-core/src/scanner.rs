use crate::types::*;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use weave_common::ErrorKind;

/// Configuration for scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanConfig {
    pub max_file_size: u64,
    pub include_extensions: Vec<String>,
    /// Directory names skipped wherever they appear
    pub ignore_dirs: Vec<String>,
    /// Glob patterns matched against the path relative to the root.
    /// Empty means every whitelisted file.
    pub file_patterns: Vec<String>,
    pub respect_gitignore: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024, // 1MB
            include_extensions: vec![
                "ts".to_string(),
                "tsx".to_string(),
                "js".to_string(),
                "jsx".to_string(),
                "css".to_string(),
                "scss".to_string(),
                "sass".to_string(),
                "vue".to_string(),
            ],
            ignore_dirs: vec!["node_modules".to_string()],
            file_patterns: Vec::new(),
            respect_gitignore: false,
        }
    }
}

/// Walks a working tree and reads every source file a token can live in
pub struct SourceScanner {
    root_path: PathBuf,
    config: ScanConfig,
}

impl SourceScanner {
    pub fn new(root_path: impl AsRef<Path>) -> Result<Self> {
        let root_path = root_path.as_ref();
        if !root_path.exists() {
            anyhow::bail!("Path does not exist: {:?}", root_path);
        }

        if !root_path.is_dir() {
            anyhow::bail!("Path is not a directory: {:?}", root_path);
        }

        let root_path = fs::canonicalize(root_path)
            .with_context(|| format!("Failed to resolve {:?}", root_path))?;

        Ok(Self {
            root_path,
            config: ScanConfig::default(),
        })
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    pub fn scan(&self) -> Result<ScanReport> {
        let start = Instant::now();
        info!("Starting scan at {:?}", self.root_path);

        let patterns = build_globset(&self.config.file_patterns)?;
        let mut issues = Vec::new();
        let mut files = Vec::new();
        let mut summary = ScanSummary::default();

        for candidate in self.walk(&mut issues) {
            let relative_path = candidate
                .strip_prefix(&self.root_path)
                .unwrap_or(&candidate)
                .to_string_lossy()
                .replace('\\', "/");

            // Check extension whitelist
            let extension = candidate
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if !self.config.include_extensions.contains(&extension) {
                continue;
            }
            let Some(language) = SourceLanguage::from_extension(&extension) else {
                continue;
            };

            if let Some(set) = &patterns {
                if !set.is_match(&relative_path) {
                    continue;
                }
            }

            let metadata = match fs::metadata(&candidate) {
                Ok(m) => m,
                Err(err) => {
                    warn!("Error reading metadata for {:?}: {}", candidate, err);
                    issues.push(unreadable(&candidate, &err));
                    continue;
                }
            };

            let size = metadata.len();

            // Skip files that are too large
            if size > self.config.max_file_size {
                debug!("Skipping large file: {:?} ({} bytes)", candidate, size);
                summary.skipped += 1;
                continue;
            }

            let content = match fs::read_to_string(&candidate) {
                Ok(c) => c,
                Err(err) => {
                    warn!("Error reading file {:?}: {}", candidate, err);
                    issues.push(unreadable(&candidate, &err));
                    continue;
                }
            };

            summary.bytes_read += size;
            files.push(SourceFile {
                path: candidate,
                relative_path,
                language,
                size,
                content,
            });
        }

        summary.files_scanned = files.len();
        summary.duration_ms = start.elapsed().as_millis();
        info!(
            "Scanned {} files ({} bytes, {} unreadable) in {}ms",
            summary.files_scanned,
            summary.bytes_read,
            issues.len(),
            summary.duration_ms
        );

        Ok(ScanReport {
            root: self.root_path.clone(),
            files,
            issues,
            summary,
        })
    }

    /// Candidate file paths in a stable order. Walk errors become issues.
    fn walk(&self, issues: &mut Vec<ScanIssue>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if self.config.respect_gitignore {
            let ignore_dirs = self.config.ignore_dirs.clone();
            let walker = WalkBuilder::new(&self.root_path)
                .git_ignore(true)
                .git_exclude(true)
                .hidden(true)
                .sort_by_file_name(|a, b| a.cmp(b))
                .filter_entry(move |entry| {
                    let is_dir = entry.file_type().map_or(false, |t| t.is_dir());
                    entry.depth() == 0
                        || !(is_dir && is_skipped_dir(entry.file_name(), &ignore_dirs))
                })
                .build();

            for entry in walker {
                match entry {
                    Ok(e) if e.file_type().map_or(false, |t| t.is_file()) => {
                        paths.push(e.into_path())
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("Error walking directory: {}", err);
                        issues.push(ScanIssue {
                            path: self.root_path.clone(),
                            kind: ErrorKind::IoUnreadable,
                            message: err.to_string(),
                        });
                    }
                }
            }
        } else {
            let walker = WalkDir::new(&self.root_path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    entry.depth() == 0
                        || !(entry.file_type().is_dir()
                            && is_skipped_dir(entry.file_name(), &self.config.ignore_dirs))
                });

            for entry in walker {
                match entry {
                    Ok(e) if e.file_type().is_file() => paths.push(e.into_path()),
                    Ok(_) => {}
                    Err(err) => {
                        warn!("Error walking directory: {}", err);
                        issues.push(ScanIssue {
                            path: err
                                .path()
                                .map(Path::to_path_buf)
                                .unwrap_or_else(|| self.root_path.clone()),
                            kind: ErrorKind::IoUnreadable,
                            message: err.to_string(),
                        });
                    }
                }
            }
        }

        paths
    }
}

fn is_skipped_dir(name: &std::ffi::OsStr, ignore_dirs: &[String]) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') || ignore_dirs.iter().any(|d| *d == name)
}

fn unreadable(path: &Path, err: &std::io::Error) -> ScanIssue {
    ScanIssue {
        path: path.to_path_buf(),
        kind: ErrorKind::IoUnreadable,
        message: err.to_string(),
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid file pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_scanner_invalid_path() {
        let scanner = SourceScanner::new("/nonexistent/path");
        assert!(scanner.is_err());
    }

    #[test]
    fn test_scan_filters_extensions_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/Button.tsx", "export const a = 1;");
        write(dir.path(), "src/styles.css", ".x { color: red; }");
        write(dir.path(), "README.md", "# readme");
        write(dir.path(), "node_modules/lib/index.js", "module.exports = 1;");
        write(dir.path(), ".cache/tmp.css", ".y {}");

        let report = SourceScanner::new(dir.path()).unwrap().scan().unwrap();
        let rel: Vec<_> = report.files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(rel, vec!["src/Button.tsx", "src/styles.css"]);
        assert!(report.files.iter().all(|f| f.path.is_absolute()));
        assert_eq!(report.summary.files_scanned, 2);
        assert!(report.summary.bytes_read > 0);
    }

    #[test]
    fn test_scan_applies_file_patterns() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.css", ".a {}");
        write(dir.path(), "src/b.ts", "const b = 1;");

        let config = ScanConfig {
            file_patterns: vec!["**/*.css".to_string()],
            ..ScanConfig::default()
        };
        let report = SourceScanner::new(dir.path())
            .unwrap()
            .with_config(config)
            .scan()
            .unwrap();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].language, SourceLanguage::CSS);
    }

    #[test]
    fn test_scan_skips_large_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.css", &"a".repeat(64));

        let config = ScanConfig {
            max_file_size: 10,
            ..ScanConfig::default()
        };
        let report = SourceScanner::new(dir.path())
            .unwrap()
            .with_config(config)
            .scan()
            .unwrap();
        assert!(report.files.is_empty());
        assert_eq!(report.summary.skipped, 1);
    }

    #[test]
    fn test_unreadable_file_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ok.css", ".ok {}");
        // invalid UTF-8 fails read_to_string
        fs::write(dir.path().join("bad.css"), [0xff, 0xfe, 0xfd]).unwrap();

        let report = SourceScanner::new(dir.path()).unwrap().scan().unwrap();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, ErrorKind::IoUnreadable);
    }
}
