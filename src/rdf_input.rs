//! Parsing submitted RDF documents into the core [`Graph`] model.
//!
//! Any serialization `oxrdfio` reads is accepted. Quads are flattened:
//! graph names in TriG/N-Quads input are ignored because the target graph
//! is decided by the dataset, not the document.

use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use oxrdfio::{RdfFormat, RdfParser};

use ontodex_core::error::IndexingError;
use ontodex_core::models::{Graph, Literal, Object, Triple};

const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// Input syntaxes accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Turtle,
    NTriples,
    RdfXml,
    NQuads,
    TriG,
}

impl InputFormat {
    pub fn rdf_format(self) -> RdfFormat {
        match self {
            InputFormat::Turtle => RdfFormat::Turtle,
            InputFormat::NTriples => RdfFormat::NTriples,
            InputFormat::RdfXml => RdfFormat::RdfXml,
            InputFormat::NQuads => RdfFormat::NQuads,
            InputFormat::TriG => RdfFormat::TriG,
        }
    }

    /// Guess from a file extension; Turtle when unknown.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "nt" => InputFormat::NTriples,
            "rdf" | "xml" | "owl" => InputFormat::RdfXml,
            "nq" => InputFormat::NQuads,
            "trig" => InputFormat::TriG,
            _ => InputFormat::Turtle,
        }
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "turtle" | "ttl" => Ok(InputFormat::Turtle),
            "ntriples" | "nt" => Ok(InputFormat::NTriples),
            "rdfxml" | "xml" => Ok(InputFormat::RdfXml),
            "nquads" | "nq" => Ok(InputFormat::NQuads),
            "trig" => Ok(InputFormat::TriG),
            other => Err(format!(
                "unknown RDF format '{}': use turtle, ntriples, rdfxml, nquads, or trig",
                other
            )),
        }
    }
}

/// Parse a whole document. The first syntax error fails the submission;
/// nothing is returned for partially parsed input.
pub fn parse_graph(reader: impl Read, format: InputFormat) -> Result<Graph, IndexingError> {
    let mut graph = Graph::new();
    for quad in RdfParser::from_format(format.rdf_format()).for_reader(reader) {
        let quad = quad.map_err(|e| IndexingError::Parse(e.to_string()))?;
        let subject = match quad.subject {
            oxrdf::Subject::NamedNode(n) => n.into_string(),
            oxrdf::Subject::BlankNode(b) => format!("_:{}", b.as_str()),
            #[allow(unreachable_patterns)]
            other => {
                return Err(IndexingError::Parse(format!(
                    "unsupported subject term: {}",
                    other
                )))
            }
        };
        let object = convert_term(quad.object)?;
        graph.insert(Triple::new(subject, quad.predicate.into_string(), object));
    }
    Ok(graph)
}

pub fn parse_str(input: &str, format: InputFormat) -> Result<Graph, IndexingError> {
    parse_graph(input.as_bytes(), format)
}

fn convert_term(term: oxrdf::Term) -> Result<Object, IndexingError> {
    match term {
        oxrdf::Term::NamedNode(n) => Ok(Object::Iri(n.into_string())),
        oxrdf::Term::BlankNode(b) => Ok(Object::Blank(format!("_:{}", b.as_str()))),
        oxrdf::Term::Literal(lit) => Ok(Object::Literal(convert_literal(&lit))),
        #[allow(unreachable_patterns)]
        other => Err(IndexingError::Parse(format!(
            "unsupported object term: {}",
            other
        ))),
    }
}

fn convert_literal(lit: &oxrdf::Literal) -> Literal {
    if let Some(lang) = lit.language() {
        return Literal::lang(lit.value(), lang);
    }
    match lit.datatype().as_str() {
        XSD_STRING | RDF_LANG_STRING => Literal::simple(lit.value()),
        dt => Literal::typed(lit.value(), dt),
    }
}
