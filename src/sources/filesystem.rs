//! Program-directory scanner.
//!
//! Walks configured roots with `ignore::WalkBuilder` on the blocking pool
//! and streams matches back through a bounded channel.

use super::{DiscoverySource, SourceStream};
use crate::error::{SourceError, SourceResult};
use crate::types::{AppSource, ApplicationRecord};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Records buffered between the walker and the indexer.
const CHANNEL_CAPACITY: usize = 64;

/// Subdirectories that hold an application's binaries rather than
/// naming the application.
const NESTED_BIN_DIRS: &[&str] = &["bin", "app", "current", "application"];

/// Executable stems too generic to use as a display name.
const GENERIC_STEMS: &[&str] = &["app", "main", "run"];

/// Configuration for the filesystem source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemScanConfig {
    /// Directories to scan; missing ones are skipped
    pub roots: Vec<PathBuf>,
    /// Maximum walk depth below each root
    pub max_depth: usize,
    /// Include hidden files and directories
    pub include_hidden: bool,
    /// Follow symlinks
    pub follow_symlinks: bool,
    /// Extensions treated as executable (empty = unix exec bit)
    pub executable_extensions: Vec<String>,
    /// File names never indexed (case-insensitive)
    pub excluded_file_names: Vec<String>,
    /// Directory names never descended into (case-insensitive)
    pub excluded_dirs: Vec<String>,
}

impl Default for FilesystemScanConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            max_depth: 3,
            include_hidden: false,
            follow_symlinks: false,
            executable_extensions: if cfg!(windows) {
                vec!["exe".to_string()]
            } else {
                Vec::new()
            },
            excluded_file_names: [
                "unins000.exe",
                "uninstall.exe",
                "uninst.exe",
                "update.exe",
                "updater.exe",
                "autoupdate.exe",
                "setup.exe",
                "install.exe",
                "installer.exe",
                "helper.exe",
                "crash_reporter.exe",
                "crashreporter.exe",
                "elevate.exe",
                "bootstrap.exe",
                "uninstall",
                "uninstall.sh",
                "update.sh",
                "crashpad_handler",
                "chrome_crashpad_handler",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            excluded_dirs: [
                "Common Files",
                "Windows Kits",
                "Windows NT",
                "WindowsPowerShell",
                "MSBuild",
                "Reference Assemblies",
                "Microsoft SDKs",
                "dotnet",
                "Uninstall Information",
                "Microsoft.NET",
                "node_modules",
                "lib",
                "share",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

fn default_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if cfg!(windows) {
        for var in ["ProgramFiles", "ProgramFiles(x86)"] {
            if let Some(dir) = std::env::var_os(var) {
                roots.push(PathBuf::from(dir));
            }
        }
        if let Some(local) = dirs::data_local_dir() {
            roots.push(local.join("Programs"));
        }
    } else {
        roots.push(PathBuf::from("/opt"));
        if let Some(bin) = dirs::executable_dir() {
            roots.push(bin);
        }
    }
    roots
}

/// Discovers applications by walking program directories.
pub struct FilesystemSource {
    config: FilesystemScanConfig,
}

impl FilesystemSource {
    pub fn new(config: FilesystemScanConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &FilesystemScanConfig {
        &self.config
    }
}

impl DiscoverySource for FilesystemSource {
    fn kind(&self) -> AppSource {
        AppSource::Filesystem
    }

    fn name(&self) -> &str {
        "filesystem"
    }

    fn discover(&self, cancel: CancellationToken) -> SourceStream {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let walker = Walker::new(self.config.clone());

        // Detached: the walk ends on its own when the receiver is dropped
        // or the token fires.
        tokio::task::spawn_blocking(move || walker.run(&tx, &cancel));

        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }
}

/// Blocking half of the source.
struct Walker {
    config: FilesystemScanConfig,
    extensions: HashSet<String>,
    excluded_files: HashSet<String>,
    excluded_dirs: HashSet<String>,
}

impl Walker {
    fn new(config: FilesystemScanConfig) -> Self {
        let lower = |items: &[String]| -> HashSet<String> {
            items.iter().map(|s| s.to_lowercase()).collect()
        };
        Self {
            extensions: config
                .executable_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            excluded_files: lower(&config.excluded_file_names),
            excluded_dirs: lower(&config.excluded_dirs),
            config,
        }
    }

    fn run(&self, tx: &mpsc::Sender<SourceResult<ApplicationRecord>>, cancel: &CancellationToken) {
        for root in &self.config.roots {
            if cancel.is_cancelled() {
                return;
            }

            let root = match dunce::canonicalize(root) {
                Ok(root) => root,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!("Skipping missing scan root {}", root.display());
                    continue;
                }
                Err(e) => {
                    // Unreadable root fails the source
                    let _ = tx.blocking_send(Err(SourceError::Io {
                        path: root.clone(),
                        source: e,
                    }));
                    return;
                }
            };

            // The walker reports an unlistable root as an ordinary entry
            // error, so check it up front.
            if let Err(e) = list_root(&root) {
                let _ = tx.blocking_send(Err(SourceError::Io { path: root, source: e }));
                return;
            }

            if !self.walk_root(&root, tx, cancel) {
                return;
            }
        }
    }

    /// Returns false when the walk should stop entirely.
    fn walk_root(
        &self,
        root: &Path,
        tx: &mpsc::Sender<SourceResult<ApplicationRecord>>,
        cancel: &CancellationToken,
    ) -> bool {
        let excluded_dirs = self.excluded_dirs.clone();
        let walker = WalkBuilder::new(root)
            .max_depth(Some(self.config.max_depth))
            .hidden(!self.config.include_hidden)
            .follow_links(self.config.follow_symlinks)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && excluded_dirs.contains(&entry.file_name().to_string_lossy().to_lowercase()))
            })
            .build();

        for entry in walker {
            if cancel.is_cancelled() {
                return false;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == Some(0) => {
                    let _ = tx.blocking_send(Err(SourceError::Walk(format!(
                        "{}: {e}",
                        root.display()
                    ))));
                    return false;
                }
                Err(e) => {
                    // Permission errors below a root are routine
                    tracing::debug!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file() || ft.is_symlink()) {
                continue;
            }

            let path = entry.path();
            if !self.is_candidate(path) {
                continue;
            }

            if let Some(record) = record_for(root, path) {
                if tx.blocking_send(Ok(record)).is_err() {
                    // Receiver gone: the indexer stopped listening
                    return false;
                }
            }
        }
        true
    }

    fn is_candidate(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
            return false;
        };
        if self.excluded_files.contains(&file_name) {
            return false;
        }

        if self.extensions.is_empty() {
            return is_executable(path);
        }
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }
}

/// Fails if `root` is a directory whose entries cannot be read.
fn list_root(root: &Path) -> std::io::Result<()> {
    if !root.is_dir() {
        return Ok(());
    }
    match std::fs::read_dir(root)?.next() {
        Some(Err(e)) => Err(e),
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}

/// Builds a record for an executable found under `root`.
fn record_for(root: &Path, path: &Path) -> Option<ApplicationRecord> {
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    let parent = path.parent()?;
    let display = display_name(root, parent, &stem);

    let executable = path.to_string_lossy().into_owned();
    Some(
        ApplicationRecord::new(display, executable.clone(), AppSource::Filesystem)
            .with_working_directory(parent.to_string_lossy().into_owned())
            .with_icon(executable),
    )
}

/// Picks a display name for an executable.
///
/// `<root>/<App>/bin/tool` and generic stems like `main` take the
/// application directory's name; everything else uses the file stem.
fn display_name(root: &Path, parent: &Path, stem: &str) -> String {
    let dir_name = |p: &Path| p.file_name().map(|n| n.to_string_lossy().into_owned());
    let in_nested_bin = dir_name(parent)
        .is_some_and(|n| NESTED_BIN_DIRS.iter().any(|d| n.eq_ignore_ascii_case(d)));

    // Directory that names the application, if any
    let app_dir = if parent == root || !parent.starts_with(root) {
        None
    } else if in_nested_bin {
        parent
            .parent()
            .filter(|g| *g != root && g.starts_with(root))
            .and_then(|g| dir_name(g))
    } else {
        dir_name(parent)
    };

    let generic = GENERIC_STEMS.iter().any(|g| stem.eq_ignore_ascii_case(g));
    match app_dir {
        Some(dir) if in_nested_bin || generic => format_display_name(&dir),
        _ => format_display_name(stem),
    }
}

/// `my-app` / `my_app` / `my.app` → `My App`.
fn format_display_name(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if matches!(c, '-' | '_' | '.') { ' ' } else { c })
        .collect();

    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
