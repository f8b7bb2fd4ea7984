//! Loading RDF documents into a store.

use crate::options::Strictness;
use crate::store::DynamicFileStore;
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{GraphName, NamedNodeRef, Quad};
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Instant;

/// Guesses the serialization of `file` from its extension, defaulting to Turtle.
pub fn format_from_path(file: &Path) -> RdfFormat {
    let content_type = file.extension().and_then(|ext| ext.to_str());
    content_type
        .and_then(|ext| match ext {
            "ttl" => Some(RdfFormat::Turtle),
            "xml" | "rdf" | "owl" => Some(RdfFormat::RdfXml),
            "n3" => Some(RdfFormat::Turtle),
            "nt" => Some(RdfFormat::NTriples),
            "nq" => Some(RdfFormat::NQuads),
            "trig" => Some(RdfFormat::TriG),
            _ => None,
        })
        .unwrap_or(RdfFormat::Turtle)
}

/// Counts reported by an import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Quads that were not already stored.
    pub added: usize,
    /// Quads already present.
    pub duplicates: usize,
    /// Records dropped in lenient mode.
    pub skipped: usize,
}

impl DynamicFileStore {
    /// Parses `reader` as `format` and asserts every statement.
    ///
    /// Statements in the default graph are placed in `graph`. Without a target
    /// graph they are an error, or skipped in lenient mode.
    /// Pending changes are not flushed at the end.
    pub fn import_reader<R: Read>(
        &mut self,
        reader: R,
        format: RdfFormat,
        graph: Option<NamedNodeRef>,
        strictness: Strictness,
    ) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let parser = RdfParser::from_format(format).for_reader(reader);
        for quad in parser {
            let quad = match quad {
                Ok(quad) => quad,
                Err(e) if strictness.is_strict() => return Err(e.into()),
                Err(e) => {
                    warn!("Skipping unparsable statement: {}", e);
                    summary.skipped += 1;
                    continue;
                }
            };
            let named = matches!(quad.graph_name, GraphName::NamedNode(_));
            let quad = match (graph, named) {
                (_, true) => quad,
                (Some(g), false) => {
                    Quad::new(quad.subject, quad.predicate, quad.object, g.into_owned())
                }
                (None, false) if strictness.is_strict() => {
                    return Err(anyhow!(
                        "Statement {} has no graph name and no target graph was given",
                        quad
                    ))
                }
                (None, false) => {
                    warn!("Skipping statement outside a named graph: {}", quad);
                    summary.skipped += 1;
                    continue;
                }
            };
            if self.assert_quad(quad.as_ref())? {
                summary.added += 1;
            } else {
                summary.duplicates += 1;
            }
        }
        debug!(
            "Imported {} statements ({} duplicates, {} skipped)",
            summary.added, summary.duplicates, summary.skipped
        );
        Ok(summary)
    }

    /// Imports a file, guessing its format from the extension, then flushes.
    pub fn import_file(
        &mut self,
        file: &Path,
        graph: Option<NamedNodeRef>,
        strictness: Strictness,
    ) -> Result<ImportSummary> {
        let timer = Instant::now();
        let reader = BufReader::new(
            std::fs::File::open(file).with_context(|| format!("Opening {}", file.display()))?,
        );
        let summary = self.import_reader(reader, format_from_path(file), graph, strictness)?;
        self.flush()?;
        info!(
            "Imported {} statements from {} in {:?}",
            summary.added,
            file.display(),
            timer.elapsed()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use oxigraph::model::NamedNode;
    use tempdir::TempDir;

    const TURTLE: &str = r#"
@prefix ex: <http://example.org/> .
ex:a ex:p ex:b ;
     ex:q "one" .
ex:b ex:p ex:c .
"#;

    #[test]
    fn test_format_from_path() {
        assert_eq!(format_from_path(Path::new("x.nq")), RdfFormat::NQuads);
        assert_eq!(format_from_path(Path::new("x.rdf")), RdfFormat::RdfXml);
        assert_eq!(format_from_path(Path::new("x")), RdfFormat::Turtle);
    }

    #[test]
    fn test_import_into_graph() {
        let dir = TempDir::new("quince-io").unwrap();
        let mut store = DynamicFileStore::open(StoreConfig::new(dir.path().to_path_buf())).unwrap();
        let g = NamedNode::new("http://example.org/g").unwrap();
        let summary = store
            .import_reader(TURTLE.as_bytes(), RdfFormat::Turtle, Some(g.as_ref()), Strictness::Strict)
            .unwrap();
        assert_eq!(summary.added, 3);
        let again = store
            .import_reader(TURTLE.as_bytes(), RdfFormat::Turtle, Some(g.as_ref()), Strictness::Strict)
            .unwrap();
        assert_eq!(again.duplicates, 3);
        assert_eq!(again.added, 0);
    }

    #[test]
    fn test_import_without_graph() {
        let dir = TempDir::new("quince-io").unwrap();
        let mut store = DynamicFileStore::open(StoreConfig::new(dir.path().to_path_buf())).unwrap();
        assert!(store
            .import_reader(TURTLE.as_bytes(), RdfFormat::Turtle, None, Strictness::Strict)
            .is_err());
        let summary = store
            .import_reader(TURTLE.as_bytes(), RdfFormat::Turtle, None, Strictness::Lenient)
            .unwrap();
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.added, 0);
    }

    #[test]
    fn test_named_graphs_are_kept() {
        let dir = TempDir::new("quince-io").unwrap();
        let mut store = DynamicFileStore::open(StoreConfig::new(dir.path().to_path_buf())).unwrap();
        let nquads = "<http://example.org/a> <http://example.org/p> \"x\" <http://example.org/g1> .\n\
                      <http://example.org/a> <http://example.org/p> \"y\" .\n";
        let fallback = NamedNode::new("http://example.org/g2").unwrap();
        let summary = store
            .import_reader(
                nquads.as_bytes(),
                RdfFormat::NQuads,
                Some(fallback.as_ref()),
                Strictness::Strict,
            )
            .unwrap();
        assert_eq!(summary.added, 2);
        let a = NamedNode::new("http://example.org/a").unwrap();
        let mut graphs: Vec<String> = store
            .get_for_subject(a.as_ref().into())
            .unwrap()
            .into_iter()
            .map(|q| q.graph_name.to_string())
            .collect();
        graphs.sort();
        assert_eq!(
            graphs,
            vec!["<http://example.org/g1>", "<http://example.org/g2>"]
        );
    }
}
