//! Store-backed facade over the external toolchain and the index codec.
//!
//! A [`Context`] owns a store directory of index files. Indexing and
//! searching dispatch the external `cindex`/`csearch` binaries against the
//! index file chosen by the [`IndexResolver`]; pruning bypasses the tools
//! entirely by decoding, mutating and rewriting the files through the codec.

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::index::types::Index;
use crate::index::{prune_files, prune_paths, read_index_file, write_index_file};
use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Conventional name of the native indexer binary
pub const DEFAULT_INDEXER: &str = "cindex";

/// Conventional name of the native searcher binary
pub const DEFAULT_SEARCHER: &str = "csearch";

/// Result cap applied when the caller does not pick one
pub const DEFAULT_MAX_RESULTS: usize = 1000;

/// Strategy mapping an input path to the index file that should contain it
pub trait IndexResolver: Send + Sync {
    fn resolve(&self, store: &Path, input: &Path) -> PathBuf;
}

/// Default resolver: every input collapses into a single index file named
/// `index` under the store
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleFileResolver;

impl IndexResolver for SingleFileResolver {
    fn resolve(&self, store: &Path, _input: &Path) -> PathBuf {
        store.join("index")
    }
}

/// Default store directory under the user's home
pub fn default_store_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| io::Error::other("could not determine home directory"))?;
    Ok(home.join(".csidx"))
}

/// Options for a search dispatch
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Case insensitive matching (`-i`)
    pub ignore_case: bool,
    /// Regex restricting which file paths are searched (`-f`)
    pub path_filter: Option<String>,
    /// Line bound applied to the searcher's output per index file
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            ignore_case: false,
            path_filter: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

/// One parsed searcher match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub file: PathBuf,
    pub line: u32,
    pub text: String,
}

/// A directory of index files plus the toolchain dispatch state
pub struct Context {
    store: PathBuf,
    resolver: Box<dyn IndexResolver>,
    dispatcher: Dispatcher,
    indexer: String,
    searcher: String,
}

impl Context {
    /// Open a context over `store`, creating the directory if absent
    pub fn new(store: impl Into<PathBuf>) -> Result<Self> {
        let store = store.into();
        fs::create_dir_all(&store)?;
        Ok(Self {
            store,
            resolver: Box::new(SingleFileResolver),
            dispatcher: Dispatcher::new(),
            indexer: DEFAULT_INDEXER.to_string(),
            searcher: DEFAULT_SEARCHER.to_string(),
        })
    }

    /// Open a context over the default store under the user's home
    pub fn open_default() -> Result<Self> {
        Self::new(default_store_dir()?)
    }

    /// Replace the resolver strategy
    pub fn with_resolver(mut self, resolver: Box<dyn IndexResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Override the indexer and searcher binaries
    pub fn with_tools(mut self, indexer: impl Into<String>, searcher: impl Into<String>) -> Self {
        self.indexer = indexer.into();
        self.searcher = searcher.into();
        self
    }

    /// Index one path. Tool failure is reported as `false`, never raised.
    pub fn index(&self, path: &Path) -> Result<bool> {
        let index_file = self.resolver.resolve(&self.store, path);
        let argv = vec![self.indexer.clone(), path.display().to_string()];
        let output = self
            .dispatcher
            .run_indexed(&argv, &index_file, None, None)?;
        Ok(output.success)
    }

    /// Index several paths, grouped by resolved index file: one indexer
    /// invocation per group, one success flag per group (in group iteration
    /// order). Callers wanting stable flag positions should pass sorted
    /// paths.
    pub fn index_all(&self, paths: &[PathBuf]) -> Result<Vec<bool>> {
        let mut groups: BTreeMap<PathBuf, Vec<&PathBuf>> = BTreeMap::new();
        for path in paths {
            groups
                .entry(self.resolver.resolve(&self.store, path))
                .or_default()
                .push(path);
        }

        let mut results = Vec::with_capacity(groups.len());
        for (index_file, group) in &groups {
            let mut argv = vec![self.indexer.clone()];
            argv.extend(group.iter().map(|p| p.display().to_string()));
            let output = self.dispatcher.run_indexed(&argv, index_file, None, None)?;
            results.push(output.success);
        }
        Ok(results)
    }

    /// Every path currently indexed across the store, via `cindex -list`.
    /// Any per-index tool failure is raised.
    pub fn paths_indexed(&self) -> Result<BTreeSet<String>> {
        let mut indexed = BTreeSet::new();
        for index_file in self.indices()? {
            let argv = vec![self.indexer.clone(), "-list".to_string()];
            let output = self.dispatcher.run_indexed(&argv, &index_file, None, None)?;
            if !output.success {
                return Err(Error::Tool {
                    program: self.indexer.clone(),
                    detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            for line in output.stdout_lines() {
                let line = String::from_utf8_lossy(line);
                let line = line.trim();
                if !line.is_empty() {
                    indexed.insert(line.to_string());
                }
            }
        }
        Ok(indexed)
    }

    /// Absolute paths of the index files currently in the store
    pub fn indices(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.store)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Remove every index file from the store
    pub fn clear_indices(&self) -> Result<()> {
        for file in self.indices()? {
            fs::remove_file(&file)?;
        }
        Ok(())
    }

    /// Remove the given paths (and everything under them, by byte prefix)
    /// from every index file in the store
    pub fn prune_paths(&self, paths: &[Vec<u8>]) -> Result<()> {
        self.rewrite_indices(|idx| prune_paths(idx, paths))
    }

    /// Remove the given file names from every index file in the store
    pub fn prune_files(&self, names: &[Vec<u8>]) -> Result<()> {
        self.rewrite_indices(|idx| prune_files(idx, names))
    }

    fn rewrite_indices<F>(&self, mutate: F) -> Result<()>
    where
        F: Fn(&mut Index) + Sync,
    {
        self.indices()?.par_iter().try_for_each(|file| {
            let mut idx = read_index_file(file)?;
            mutate(&mut idx);
            write_index_file(&idx, file)
        })
    }

    /// Search every index file for `pattern`, parsing `file:line:text`
    /// matches. A failing searcher yields no hits for that index; malformed
    /// lines are dropped. At most `max_results + 1` hits are returned.
    pub fn search(&self, pattern: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let mut argv = vec![self.searcher.clone()];
        if let Some(filter) = &options.path_filter {
            argv.push("-f".to_string());
            argv.push(filter.clone());
        }
        if options.ignore_case {
            argv.push("-i".to_string());
        }
        argv.push("-n".to_string());
        argv.push(pattern.to_string());

        let bound = Some(options.max_results);
        let mut hits = Vec::new();
        'indices: for index_file in self.indices()? {
            let output = self.dispatcher.run_indexed(&argv, &index_file, bound, bound)?;
            if !output.success {
                warn!(
                    "search: `{}` failed against {}, skipping",
                    self.searcher,
                    index_file.display()
                );
                continue;
            }
            for line in output.stdout_lines() {
                if let Some(hit) = parse_search_line(line) {
                    hits.push(hit);
                    if hits.len() > options.max_results {
                        break 'indices;
                    }
                }
            }
        }
        Ok(hits)
    }
}

/// Parse one searcher output line of the form `file:line:text`.
///
/// Blank lines, lines not beginning with `/`, short splits and non-integer
/// line numbers are dropped.
fn parse_search_line(raw: &[u8]) -> Option<SearchHit> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() || !line.starts_with('/') {
        return None;
    }

    let mut parts = line.splitn(3, ':');
    let file = parts.next()?;
    let number = parts.next()?;
    let text = parts.next()?;

    let number: u32 = match number.parse() {
        Ok(n) => n,
        Err(err) => {
            warn!("search: bad line number in {:?}: {}", line, err);
            return None;
        }
    };

    Some(SearchHit {
        file: PathBuf::from(file),
        line: number,
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_line() {
        let hit = parse_search_line(b"/repo/a.txt:42:hello world\n").unwrap();
        assert_eq!(hit.file, PathBuf::from("/repo/a.txt"));
        assert_eq!(hit.line, 42);
        assert_eq!(hit.text, "hello world");
    }

    #[test]
    fn test_parse_search_line_keeps_colons_in_text() {
        let hit = parse_search_line(b"/a.rs:7:let x: u32 = 1;").unwrap();
        assert_eq!(hit.text, "let x: u32 = 1;");
    }

    #[test]
    fn test_parse_search_line_drops_malformed() {
        assert_eq!(parse_search_line(b"malformed"), None);
        assert_eq!(parse_search_line(b""), None);
        assert_eq!(parse_search_line(b"   "), None);
        assert_eq!(parse_search_line(b"relative.txt:1:text"), None);
        assert_eq!(parse_search_line(b"/a.txt:notanumber:text"), None);
        assert_eq!(parse_search_line(b"/a.txt:12"), None);
    }

    #[test]
    fn test_single_file_resolver() {
        let resolver = SingleFileResolver;
        let store = Path::new("/store");
        assert_eq!(
            resolver.resolve(store, Path::new("/src/a")),
            PathBuf::from("/store/index")
        );
        assert_eq!(
            resolver.resolve(store, Path::new("/other")),
            PathBuf::from("/store/index")
        );
    }

    #[test]
    fn test_store_created_and_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let ctx = Context::new(&store).unwrap();
        assert!(store.is_dir());
        assert!(ctx.indices().unwrap().is_empty());

        fs::write(store.join("b"), b"x").unwrap();
        fs::write(store.join("a"), b"x").unwrap();
        fs::create_dir(store.join("subdir")).unwrap();

        // Files only, sorted
        let indices = ctx.indices().unwrap();
        assert_eq!(indices, vec![store.join("a"), store.join("b")]);

        ctx.clear_indices().unwrap();
        assert!(ctx.indices().unwrap().is_empty());
        assert!(store.join("subdir").is_dir());
    }

    #[test]
    fn test_prune_rewrites_every_index() {
        use crate::index::types::{bytes_to_trigram, Posting};
        use crate::index::{encode_index, read_index_file};

        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(dir.path()).unwrap();

        let mut idx = Index::empty();
        idx.paths = vec![b"/a".to_vec()];
        idx.names = vec![b"/a/x".to_vec()];
        idx.postings = vec![
            Posting::from_file_ids(bytes_to_trigram(b'a', b'b', b'c'), &[0]),
            Posting::sentinel(),
        ];
        idx.rebuild_offsets();

        for name in ["one", "two"] {
            fs::write(dir.path().join(name), encode_index(&idx)).unwrap();
        }

        ctx.prune_paths(&[b"/a".to_vec()]).unwrap();

        for name in ["one", "two"] {
            let pruned = read_index_file(&dir.path().join(name)).unwrap();
            assert_eq!(pruned, Index::empty());
        }
    }

    #[test]
    fn test_prune_invalid_index_raises() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(dir.path()).unwrap();
        fs::write(dir.path().join("broken"), b"not an index").unwrap();
        assert!(matches!(
            ctx.prune_files(&[b"/a".to_vec()]),
            Err(Error::InvalidIndex(_))
        ));
    }
}
