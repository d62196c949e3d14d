//! `RetrievalIndex` — the semantic + lexical search service, present here
//! as an interface. [`LexicalIndex`] is the reference implementation: a
//! term-overlap ranker over `docs/knowledge/**/*.md` and the repo tree.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Snippet {
    pub path: PathBuf,
    pub text: String,
    pub score: f64,
}

#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Vec<Snippet>;
}

/// Walks a root directory for markdown files, ranks paragraphs by
/// term-overlap against the query. No embeddings, no network calls — a
/// deliberately simple reference implementation standing in for the
/// semantic index this interface keeps out of scope.
pub struct LexicalIndex {
    root: PathBuf,
}

impl LexicalIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn documents(&self) -> Vec<PathBuf> {
        if !self.root.exists() {
            return Vec::new();
        }
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
            .map(|e| e.path().to_path_buf())
            .collect()
    }

    fn score_paragraph(query_terms: &[String], paragraph: &str) -> f64 {
        let paragraph_lower = paragraph.to_lowercase();
        let matches = query_terms.iter().filter(|t| paragraph_lower.contains(t.as_str())).count();
        if query_terms.is_empty() {
            0.0
        } else {
            matches as f64 / query_terms.len() as f64
        }
    }
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[async_trait]
impl RetrievalIndex for LexicalIndex {
    async fn search(&self, query: &str, limit: usize) -> Vec<Snippet> {
        let terms = query_terms(query);
        let mut snippets: Vec<Snippet> = Vec::new();

        for doc in self.documents() {
            let Ok(content) = std::fs::read_to_string(&doc) else {
                continue;
            };
            for paragraph in content.split("\n\n") {
                if paragraph.trim().is_empty() {
                    continue;
                }
                let score = Self::score_paragraph(&terms, paragraph);
                if score > 0.0 {
                    snippets.push(Snippet {
                        path: doc.clone(),
                        text: paragraph.trim().to_string(),
                        score,
                    });
                }
            }
        }

        snippets.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        snippets.truncate(limit);
        snippets
    }
}

/// Helper for tools that need to resolve a path under `repo_root` without
/// escaping it (used by `find_files_by_name`/`read_file_lines`).
pub fn is_within_root(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn search_ranks_paragraphs_by_term_overlap() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("conventions.md"),
            "# Conventions\n\nUse snake_case for module names.\n\nPrefer composition over inheritance.",
        )
        .unwrap();

        let index = LexicalIndex::new(dir.path());
        let results = index.search("snake_case module names", 5).await;

        assert!(!results.is_empty());
        assert!(results[0].text.contains("snake_case"));
    }

    #[tokio::test]
    async fn search_returns_empty_for_missing_root() {
        let index = LexicalIndex::new("/nonexistent/path/for/scopeward/tests");
        let results = index.search("anything", 5).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("domain.md"),
            "resource alpha\n\nresource beta\n\nresource gamma\n\nresource delta",
        )
        .unwrap();

        let index = LexicalIndex::new(dir.path());
        let results = index.search("resource", 2).await;
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn within_root_rejects_escapes() {
        let root = Path::new("/repo");
        assert!(is_within_root(root, Path::new("/repo/src/main.rs")));
        assert!(!is_within_root(root, Path::new("/etc/passwd")));
    }
}
