//! Engine facade.
//!
//! Owns a document store and a callable registry and exposes the
//! render/check entry points everything outside this crate goes
//! through.

use std::io::Write;

use crate::context::Context;
use crate::eval::Evaluator;
use crate::registry::Registry;
use crate::store::{DocumentStore, SourceLoader};
use crate::Error;

pub struct Engine {
    store: DocumentStore,
    registry: Registry,
}

impl Engine {
    pub fn new(loader: impl SourceLoader + 'static) -> Self {
        Self {
            store: DocumentStore::new(loader),
            registry: Registry::new(),
        }
    }

    /// Access the callable registry, e.g. to register functions before
    /// rendering.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Render the template at `path` against `ctx`.
    pub fn render_file(&self, path: &str, ctx: &mut Context) -> Result<String, Error> {
        let doc = self.store.document(path)?;
        Ok(Evaluator::new(&self.registry).render(&doc, ctx)?)
    }

    /// Render an inline template source against `ctx`.
    pub fn render_str(&self, source: &str, ctx: &mut Context) -> Result<String, Error> {
        let doc = self.store.document_from_source(source)?;
        Ok(Evaluator::new(&self.registry).render(&doc, ctx)?)
    }

    /// Render the template at `path` straight into a writer.
    pub fn render_to(
        &self,
        writer: &mut dyn Write,
        path: &str,
        ctx: &mut Context,
    ) -> Result<(), Error> {
        let output = self.render_file(path, ctx)?;
        writer.write_all(output.as_bytes())?;
        Ok(())
    }

    /// Compile and validate without rendering.
    pub fn check_file(&self, path: &str) -> Result<(), Error> {
        self.store.document(path).map(|_| ())
    }

    pub fn check_str(&self, source: &str) -> Result<(), Error> {
        self.store.document_from_source(source).map(|_| ())
    }
}
