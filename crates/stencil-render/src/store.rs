//! Source loading and the compiled-document cache.
//!
//! Compilation runs the full pipeline (scan, parse, validate) and the
//! result is cached by identity: file path for loaded templates, a
//! content hash for inline sources. The cache is read-mostly; a race
//! between two first compilations of the same key just means the last
//! writer wins with an equivalent document.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use stencil_lexer::Scanner;
use stencil_parser::{parse_document, validate, Document, DocumentResolver, ParseError};

use crate::Error;

/// Turns a template path into source text.
pub trait SourceLoader: Send + Sync {
    fn load(&self, path: &str) -> io::Result<String>;
}

/// Loads templates from a directory, appending a default extension to
/// bare names.
pub struct FileLoader {
    root: PathBuf,
    ext: String,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>, ext: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ext: ext.into(),
        }
    }
}

impl SourceLoader for FileLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        let mut full = self.root.join(path);
        if full.extension().is_none() && !self.ext.is_empty() {
            full.set_extension(&self.ext);
        }
        std::fs::read_to_string(full)
    }
}

/// In-memory loader for tests and embedded templates.
#[derive(Default)]
pub struct MapLoader {
    sources: HashMap<String, String>,
}

impl MapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(path.into(), source.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapLoader {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut loader = Self::new();
        for (path, source) in iter {
            loader.insert(path, source);
        }
        loader
    }
}

impl SourceLoader for MapLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        self.sources
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no template \"{path}\"")))
    }
}

/// Cache of compiled documents over one source loader.
pub struct DocumentStore {
    loader: Box<dyn SourceLoader>,
    cache: RwLock<HashMap<String, Arc<Document>>>,
}

impl DocumentStore {
    pub fn new(loader: impl SourceLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Compile (or fetch from cache) the document at `path`.
    pub fn document(&self, path: &str) -> Result<Arc<Document>, Error> {
        if let Some(doc) = self.cached(path) {
            return Ok(doc);
        }
        let source = self.loader.load(path)?;
        let doc = self.compile(&source)?;
        self.store(path.to_string(), doc.clone());
        Ok(doc)
    }

    /// Compile (or fetch from cache) an inline source, keyed by content.
    pub fn document_from_source(&self, source: &str) -> Result<Arc<Document>, Error> {
        let key = content_key(source);
        if let Some(doc) = self.cached(&key) {
            return Ok(doc);
        }
        let doc = self.compile(source)?;
        self.store(key, doc.clone());
        Ok(doc)
    }

    /// Full compile pipeline; failed compiles never reach the cache.
    fn compile(&self, source: &str) -> Result<Arc<Document>, Error> {
        let stream = Scanner::tokenize(source)?;
        let doc = parse_document(stream, self)?;
        validate(&doc)?;
        Ok(Arc::new(doc))
    }

    fn cached(&self, key: &str) -> Option<Arc<Document>> {
        match self.cache.read() {
            Ok(cache) => cache.get(key).cloned(),
            // A poisoned cache degrades to compile-every-time.
            Err(_) => None,
        }
    }

    fn store(&self, key: String, doc: Arc<Document>) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, doc);
        }
    }
}

impl DocumentResolver for DocumentStore {
    fn resolve(&self, path: &str) -> Result<Arc<Document>, ParseError> {
        self.document(path).map_err(|err| ParseError::Resolve {
            path: path.into(),
            reason: err.to_string(),
        })
    }
}

fn content_key(source: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    source.hash(&mut hasher);
    format!("inline:{:016x}", hasher.finish())
}
