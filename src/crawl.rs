//! Directory crawl for files no entry references.
//!
//! [`referenced_files`] collects the paths named by the `file` fields of a
//! record collection; [`UnlinkedFilesCrawler`] then walks a directory and
//! keeps only files outside that set which also pass a caller filter.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::fetch::CancellationFlag;
use crate::model::ParseResult;

/// A directory or file in the crawl result tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub path: PathBuf,
    /// Sub-directories first, then files; both sorted by name
    pub children: Vec<FileNode>,
    /// Files at or below this node
    pub file_count: usize,
}

impl FileNode {
    fn file(path: PathBuf) -> Self {
        Self {
            path,
            children: Vec::new(),
            file_count: 1,
        }
    }

    fn directory(path: PathBuf) -> Self {
        Self {
            path,
            children: Vec::new(),
            file_count: 0,
        }
    }

    /// Returns true for directory nodes.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        !self.children.is_empty()
    }

    /// Returns every file path below this node in tree order.
    #[must_use]
    pub fn files(&self) -> Vec<&Path> {
        if !self.is_directory() {
            return vec![self.path.as_path()];
        }
        self.children.iter().flat_map(FileNode::files).collect()
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Returns the canonical paths named by the `file` fields of `result`.
///
/// A `file` field holds `;`-separated `description:path:type` triples.
/// Relative paths resolve against `base_dir`.
#[must_use]
pub fn referenced_files(result: &ParseResult, base_dir: &Path) -> HashSet<PathBuf> {
    let mut referenced = HashSet::new();
    for value in result.entries().iter().filter_map(|entry| entry.field("file")) {
        for link in value.split(';').map(str::trim).filter(|l| !l.is_empty()) {
            let path = link_path(link);
            if path.is_empty() {
                continue;
            }
            let path = Path::new(path);
            let resolved = if path.is_absolute() {
                path.to_path_buf()
            } else {
                base_dir.join(path)
            };
            referenced.insert(canonical(&resolved));
        }
    }
    debug!(count = referenced.len(), "Collected referenced files");
    referenced
}

/// Extracts the path part of a `description:path:type` link.
///
/// A bare path without separators is returned as is. Windows drive letters
/// (`C:\...`) stay part of the path.
fn link_path(link: &str) -> &str {
    let parts: Vec<&str> = link.split(':').collect();
    match parts.len() {
        0 | 1 => link,
        2 => parts[1],
        n => {
            let end = link.len() - parts[n - 1].len() - 1;
            let start = parts[0].len() + 1;
            if start <= end { &link[start..end] } else { "" }
        }
    }
}

/// Walks a directory for files not referenced by any entry.
#[derive(Debug)]
pub struct UnlinkedFilesCrawler {
    root: PathBuf,
    referenced: HashSet<PathBuf>,
}

impl UnlinkedFilesCrawler {
    /// Creates a crawler; `referenced` should hold canonical paths.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, referenced: HashSet<PathBuf>) -> Self {
        Self {
            root: root.into(),
            referenced,
        }
    }

    /// Returns the tree of unreferenced files accepted by `filter`.
    ///
    /// The stop flag is checked once per file; a cancelled crawl returns what
    /// was found so far. Directories left without files are pruned. Returns
    /// `None` when nothing remains.
    #[tracing::instrument(skip(self, filter, stop), fields(root = %self.root.display()))]
    pub fn crawl(
        &self,
        filter: impl Fn(&Path) -> bool,
        stop: &CancellationFlag,
    ) -> Option<FileNode> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        for entry in walker {
            if stop.is_cancelled() {
                info!(found = files.len(), "Crawl cancelled");
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Cannot access directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if self.referenced.contains(&canonical(path)) || !filter(path) {
                continue;
            }
            files.push(path.to_path_buf());
        }

        info!(unlinked = files.len(), "Crawl finished");
        build_tree(&self.root, &files)
    }
}

fn build_tree(dir: &Path, files: &[PathBuf]) -> Option<FileNode> {
    let mut node = FileNode::directory(dir.to_path_buf());
    let mut subdirs: Vec<PathBuf> = Vec::new();
    let mut direct_files = Vec::new();

    for file in files {
        let Ok(relative) = file.strip_prefix(dir) else {
            continue;
        };
        let mut components = relative.components();
        let Some(first) = components.next() else {
            continue;
        };
        if components.next().is_some() {
            let subdir = dir.join(first);
            if !subdirs.contains(&subdir) {
                subdirs.push(subdir);
            }
        } else {
            direct_files.push(file.clone());
        }
    }

    subdirs.sort();
    for subdir in subdirs {
        if let Some(child) = build_tree(&subdir, files) {
            node.file_count += child.file_count;
            node.children.push(child);
        }
    }
    direct_files.sort();
    for file in direct_files {
        node.file_count += 1;
        node.children.push(FileNode::file(file));
    }

    (node.file_count > 0).then_some(node)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Entry;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_link_path_forms() {
        assert_eq!(link_path("Paper:papers/a.pdf:PDF"), "papers/a.pdf");
        assert_eq!(link_path(":a.pdf:PDF"), "a.pdf");
        assert_eq!(link_path("a.pdf"), "a.pdf");
        assert_eq!(link_path("desc:C:\\docs\\a.pdf:PDF"), "C:\\docs\\a.pdf");
    }

    #[test]
    fn test_referenced_files_resolve_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("papers/a.pdf"));
        touch(&dir.path().join("b.pdf"));

        let mut entry = Entry::new("article");
        entry.set_field("file", ":papers/a.pdf:PDF;:b.pdf:PDF");
        let mut result = ParseResult::new();
        result.add_entry(entry);

        let referenced = referenced_files(&result, dir.path());
        assert_eq!(referenced.len(), 2);
        assert!(referenced.contains(&canonical(&dir.path().join("b.pdf"))));
    }

    #[test]
    fn test_crawl_excludes_referenced_and_prunes_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("linked/a.pdf"));
        touch(&root.join("new/b.pdf"));
        touch(&root.join("new/deep/c.pdf"));
        touch(&root.join("d.txt"));

        let referenced = HashSet::from([canonical(&root.join("linked/a.pdf"))]);
        let crawler = UnlinkedFilesCrawler::new(root, referenced);
        let tree = crawler
            .crawl(
                |p| p.extension().is_some_and(|e| e == "pdf"),
                &CancellationFlag::new(),
            )
            .unwrap();

        assert_eq!(tree.file_count, 2);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(
            tree.files(),
            vec![
                root.join("new/deep/c.pdf").as_path(),
                root.join("new/b.pdf").as_path()
            ]
        );
    }

    #[test]
    fn test_crawl_with_nothing_left_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("only.pdf"));
        let referenced = HashSet::from([canonical(&dir.path().join("only.pdf"))]);
        let crawler = UnlinkedFilesCrawler::new(dir.path(), referenced);
        assert!(crawler.crawl(|_| true, &CancellationFlag::new()).is_none());
    }

    #[test]
    fn test_cancelled_crawl_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.pdf"));
        let stop = CancellationFlag::new();
        stop.cancel();
        let crawler = UnlinkedFilesCrawler::new(dir.path(), HashSet::new());
        assert!(crawler.crawl(|_| true, &stop).is_none());
    }
}
