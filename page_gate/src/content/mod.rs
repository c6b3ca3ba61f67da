// Content resolution for Page Gate
//
// Maps a page name to the HTML document served after a successful
// validation. Only consulted once the validator has returned Valid.

use crate::error::Result;
use crate::types::{normalize_page, PAGE_EXTENSION};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Source of protected HTML documents
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Load the document for `page`, or `None` if there is none.
    async fn resolve(&self, page: &str) -> Result<Option<String>>;

    /// Names of every page this resolver can serve
    async fn available_pages(&self) -> Result<Vec<String>>;
}

/// Resolves `{page}.html` from a list of directories, first match wins
#[derive(Debug, Clone)]
pub struct FsContentResolver {
    directories: Vec<PathBuf>,
}

impl FsContentResolver {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self { directories }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

/// Page names that could escape the content directories
fn is_unsafe_page(page: &str) -> bool {
    page.is_empty()
        || page.contains('/')
        || page.contains('\\')
        || page.contains('\0')
        || page.contains("..")
}

/// Page name a file serves, if it is an HTML document
fn page_for_file(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(PAGE_EXTENSION)?;
    let page = normalize_page(stem);
    (!page.is_empty()).then_some(page)
}

/// HTML documents in `dir` as `(page, file name, path)`, sorted by file name
async fn page_files(dir: &Path) -> std::io::Result<Vec<(String, String, PathBuf)>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(page) = page_for_file(&name) else {
            continue;
        };
        match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_file() => files.push((page, name, entry.path())),
            _ => {}
        }
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

#[async_trait]
impl ContentResolver for FsContentResolver {
    /// File names are matched by their normalized stem, so `FoodAI.html` on
    /// disk serves the page `foodai`. Within one directory an exact
    /// `{page}.html` wins over other spellings.
    async fn resolve(&self, page: &str) -> Result<Option<String>> {
        let page = normalize_page(page);
        if is_unsafe_page(&page) {
            debug!("Refusing to resolve page name {:?}", page);
            return Ok(None);
        }

        let exact_name = format!("{}{}", page, PAGE_EXTENSION);
        for dir in &self.directories {
            let files = match page_files(dir).await {
                Ok(files) => files,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let matches: Vec<_> = files.into_iter().filter(|(p, _, _)| *p == page).collect();
            let candidate = matches
                .iter()
                .find(|(_, name, _)| *name == exact_name)
                .or_else(|| matches.first());

            if let Some((_, _, path)) = candidate {
                let html = tokio::fs::read_to_string(path).await?;
                debug!("Resolved {} to {}", page, path.display());
                return Ok(Some(html));
            }
        }

        Ok(None)
    }

    async fn available_pages(&self) -> Result<Vec<String>> {
        let mut pages = Vec::new();
        for dir in &self.directories {
            let files = match page_files(dir).await {
                Ok(files) => files,
                Err(e) => {
                    warn!("Skipping content directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            for (page, _, _) in files {
                if !pages.contains(&page) {
                    pages.push(page);
                }
            }
        }

        pages.sort();
        Ok(pages)
    }
}
