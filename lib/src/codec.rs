//! Canonical line encoding of quads.
//!
//! Every stored record is one N-Quads statement, `<s> <p> <o> <g>.`, produced from
//! oxigraph's N-Triples rendering of each term. Terms render deterministically, so
//! byte-wise string order is a total order over lines, and all lines that share a
//! subject share a prefix.

use crate::consts::{OBJECT_TAG, PREDICATE_TAG, SUBJECT_TAG};
use crate::errors::MalformedLineError;
use anyhow::{anyhow, Error, Result};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{
    GraphNameRef, NamedNodeRef, NamedOrBlankNodeRef, Quad, QuadRef, Term, TermRef,
};
use std::io::BufRead;

/// The role a shard indexes quads by.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Segment {
    Subject,
    Predicate,
    Object,
}

impl Segment {
    pub const ALL: [Segment; 3] = [Segment::Subject, Segment::Predicate, Segment::Object];

    /// Two-character tag that starts every shard name and path of this segment.
    pub fn tag(self) -> &'static str {
        match self {
            Segment::Subject => SUBJECT_TAG,
            Segment::Predicate => PREDICATE_TAG,
            Segment::Object => OBJECT_TAG,
        }
    }

    /// Segment owning a shard path relative to the store root.
    pub fn from_shard_path(path: &str) -> Option<Segment> {
        Segment::ALL
            .into_iter()
            .find(|segment| path.starts_with(segment.tag()))
    }

    /// The node of `quad` this segment indexes.
    pub fn node_of(self, quad: &Quad) -> Term {
        match self {
            Segment::Subject => quad.subject.clone().into(),
            Segment::Predicate => quad.predicate.clone().into(),
            Segment::Object => quad.object.clone(),
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Subject => write!(f, "subject"),
            Segment::Predicate => write!(f, "predicate"),
            Segment::Object => write!(f, "object"),
        }
    }
}

pub fn format_term<'a>(term: impl Into<TermRef<'a>>) -> String {
    term.into().to_string()
}

pub fn format_graph(graph: NamedNodeRef) -> String {
    graph.to_string()
}

/// The suffix every line of `graph` ends with.
pub fn graph_marker(graph: NamedNodeRef) -> String {
    format!(" {}.", format_graph(graph))
}

pub fn format_line(
    subject: NamedOrBlankNodeRef,
    predicate: NamedNodeRef,
    object: TermRef,
    graph: NamedNodeRef,
) -> String {
    format!("{} {} {} {}.", subject, predicate, object, graph)
}

/// Line for a quad; quads in the default graph have no line form.
pub fn format_quad(quad: QuadRef) -> Result<String> {
    match quad.graph_name {
        GraphNameRef::NamedNode(graph) => Ok(format_line(
            quad.subject,
            quad.predicate,
            quad.object,
            graph,
        )),
        _ => Err(anyhow!("Quad {} does not belong to a named graph", quad)),
    }
}

fn malformed(shard: &str, line: &str, err: impl std::fmt::Display) -> Error {
    Error::new(MalformedLineError {
        shard: shard.to_string(),
        line: line.to_string(),
        message: err.to_string(),
    })
}

/// Parses a single stored line. `shard` only labels errors.
pub fn parse_line(line: &str, shard: &str) -> Result<Quad> {
    let mut quads = RdfParser::from_format(RdfFormat::NQuads).for_reader(line.as_bytes());
    match quads.next() {
        Some(Ok(quad)) => {
            if quads.next().is_some() {
                return Err(malformed(shard, line, "more than one statement"));
            }
            if quad.graph_name.is_default_graph() {
                return Err(malformed(shard, line, "missing graph name"));
            }
            Ok(quad)
        }
        Some(Err(e)) => Err(malformed(shard, line, e)),
        None => Err(malformed(shard, line, "empty line")),
    }
}

/// Parses a sequence of stored lines, failing on the first malformed one.
pub fn parse_lines<'a, I>(lines: I, shard: &str) -> Result<Vec<Quad>>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .map(|line| parse_line(line, shard))
        .collect()
}

/// Streams quads out of a shard file, one line at a time. Errors name the shard
/// and the offending line.
pub fn read_quads<R: BufRead>(reader: R, shard: &str) -> impl Iterator<Item = Result<Quad>> {
    let shard = shard.to_string();
    reader.lines().filter_map(move |line| match line {
        Ok(line) if line.is_empty() => None,
        Ok(line) => Some(parse_line(&line, &shard)),
        Err(e) => Some(Err(Error::new(e).context(format!("Reading shard {}", shard)))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::{BlankNode, GraphName, Literal, NamedNode};

    fn ex(s: &str) -> NamedNode {
        NamedNode::new(format!("http://example.org/{}", s)).unwrap()
    }

    #[test]
    fn test_format_line() {
        let line = format_line(
            ex("s").as_ref().into(),
            ex("p").as_ref(),
            Literal::new_language_tagged_literal("hi", "en")
                .unwrap()
                .as_ref()
                .into(),
            ex("g").as_ref(),
        );
        assert_eq!(
            line,
            "<http://example.org/s> <http://example.org/p> \"hi\"@en <http://example.org/g>."
        );
        assert!(line.ends_with(&graph_marker(ex("g").as_ref())));
    }

    #[test]
    fn test_parse_line_roundtrip() {
        let quad = Quad::new(
            BlankNode::new("b0").unwrap(),
            ex("p"),
            Literal::new_simple_literal("line\nbreak \"quoted\""),
            GraphName::NamedNode(ex("g")),
        );
        let line = format_quad(quad.as_ref()).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(parse_line(&line, "test").unwrap(), quad);
    }

    #[test]
    fn test_parse_line_errors() {
        let err = parse_line("<http://example.org/s> not a quad", "_s.nq").unwrap_err();
        let malformed = err.downcast_ref::<MalformedLineError>().unwrap();
        assert_eq!(malformed.shard, "_s.nq");
        assert!(parse_line(
            "<http://example.org/s> <http://example.org/p> <http://example.org/o> .",
            "_s.nq"
        )
        .is_err());
    }

    #[test]
    fn test_default_graph_quad_has_no_line() {
        let quad = Quad::new(ex("s"), ex("p"), ex("o"), GraphName::DefaultGraph);
        assert!(format_quad(quad.as_ref()).is_err());
    }

    #[test]
    fn test_read_quads_reports_bad_line() {
        let content = "<http://example.org/s> <http://example.org/p> <http://example.org/o> <http://example.org/g>.\n\nnot a quad\n";
        let results: Vec<Result<Quad>> = read_quads(content.as_bytes(), "_s.nq").collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        let malformed = err.downcast_ref::<MalformedLineError>().unwrap();
        assert_eq!(malformed.shard, "_s.nq");
        assert_eq!(malformed.line, "not a quad");
    }

    #[test]
    fn test_segment_from_path() {
        assert_eq!(Segment::from_shard_path("_s.nq"), Some(Segment::Subject));
        assert_eq!(Segment::from_shard_path("_p/ab.nq"), Some(Segment::Predicate));
        assert_eq!(Segment::from_shard_path("_o/ab/cd.nq"), Some(Segment::Object));
        assert_eq!(Segment::from_shard_path("dirmap.txt"), None);
    }
}
