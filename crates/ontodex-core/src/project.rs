//! Projection of RDF resources into flat search documents.
//!
//! [`FieldProjector::project`] turns one instance description into an
//! [`IndexDocument`]. The passes run in a fixed order:
//!
//! 1. identity (`uid`, `uri`, `dataset`)
//! 2. asserted types
//! 3. labels, with a URI-tail fallback
//! 4. descriptions
//! 5. preferred URL and, when enabled, geo fields
//! 6. every remaining predicate, named through [`crate::fields`], with
//!    reification statements passed through
//! 7. the inferred-type closure
//!
//! Blank-node subjects are not indexable and produce no document.
//!
//! Missing ontology metadata never fails a projection. It degrades to
//! string handling (predicates) or the class plus the root type (classes)
//! and is reported as a [`Diagnostic`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use quick_xml::escape::escape;
use tracing::{debug, warn};

use crate::classify::ClassifiedGraph;
use crate::fields::{self, AttributeField, Cardinality, ValueKind};
use crate::geo;
use crate::labels::{uri_tail, LabelLookup};
use crate::models::{is_blank_node, IndexDocument, Literal, Object, PropertyMetadata, ResourceDescription};
use crate::ontology::{ClassHierarchy, PropertyMetadataResolver};
use crate::vocab::{
    ALT_LABEL_PREDICATES, DESCRIPTION_PREDICATES, GEO_ALT, GEO_LAT, GEO_LAT_LONG, GEO_LONG,
    GEO_PREDICATES, IRON_PREF_URL, LABEL_PREDICATES, RDF_OBJECT, RDF_PREDICATE, RDF_SUBJECT,
    RDF_TYPE, SCO_LOCATED_IN, SCO_POLYGON, SCO_POLYLINE,
};

/// Deployment settings the projector depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionConfig {
    /// Supported languages; the first is the default.
    pub languages: Vec<String>,
    pub geo_enabled: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            geo_enabled: false,
        }
    }
}

impl ProjectionConfig {
    pub fn new(languages: Vec<String>, geo_enabled: bool) -> Self {
        Self {
            languages,
            geo_enabled,
        }
    }

    pub fn default_language(&self) -> &str {
        self.languages.first().map(String::as_str).unwrap_or("en")
    }

    /// The language bucket for a literal tag.
    ///
    /// An exact (case-insensitive) match wins, then a match on the primary
    /// subtag (`en-GB` → `en`); anything else goes to the default language.
    pub fn resolve_language(&self, tag: Option<&str>) -> &str {
        let Some(tag) = tag.filter(|t| !t.is_empty()) else {
            return self.default_language();
        };
        let primary = tag.split('-').next().unwrap_or(tag);
        self.languages
            .iter()
            .find(|l| l.eq_ignore_ascii_case(tag))
            .or_else(|| self.languages.iter().find(|l| l.eq_ignore_ascii_case(primary)))
            .map(String::as_str)
            .unwrap_or_else(|| self.default_language())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    PropertyMetadataMiss,
    ClassHierarchyMiss,
    ValueCoercion,
    DuplicateSingleValue,
    IgnoredDatasetDescription,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::PropertyMetadataMiss => "property-metadata-miss",
            DiagnosticKind::ClassHierarchyMiss => "class-hierarchy-miss",
            DiagnosticKind::ValueCoercion => "value-coercion",
            DiagnosticKind::DuplicateSingleValue => "duplicate-single-value",
            DiagnosticKind::IgnoredDatasetDescription => "ignored-dataset-description",
        }
    }
}

/// A soft degradation noticed while indexing. Never fails the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub subject: String,
    pub kind: DiagnosticKind,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(subject: &str, kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            subject: subject.to_string(),
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] <{}>: {}", self.kind.as_str(), self.subject, self.detail)
    }
}

/// A projected document and the degradations met while building it.
#[derive(Debug, Clone)]
pub struct Projection {
    pub document: IndexDocument,
    pub diagnostics: Vec<Diagnostic>,
}

/// Accumulates one document. Values are XML-escaped on the way in,
/// except identity fields, and `attribute` entries are kept distinct.
struct DocumentBuilder {
    document: IndexDocument,
    attributes: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl DocumentBuilder {
    fn new(dataset: &str, subject: &str) -> Self {
        let document = IndexDocument::new(dataset, subject);
        let mut builder = Self {
            document,
            attributes: HashSet::new(),
            diagnostics: Vec::new(),
        };
        let uid = builder.document.uid.clone();
        builder.document.push(fields::UID, uid, false);
        builder.document.push(fields::URI, subject, false);
        builder.document.push(fields::DATASET, dataset, false);
        builder
    }

    fn subject(&self) -> &str {
        &self.document.uri
    }

    fn push(&mut self, name: impl Into<String>, value: &str, multi_valued: bool) {
        self.document
            .push(name, escape(value).into_owned(), multi_valued);
    }

    fn attribute(&mut self, predicate: &str) {
        if self.attributes.insert(predicate.to_string()) {
            self.push(fields::ATTRIBUTE, predicate, true);
        }
    }

    fn diagnose(&mut self, kind: DiagnosticKind, detail: impl Into<String>) {
        let diagnostic = Diagnostic::new(&self.document.uri, kind, detail);
        self.diagnostics.push(diagnostic);
    }

    fn finish(self) -> Projection {
        Projection {
            document: self.document,
            diagnostics: self.diagnostics,
        }
    }
}

/// Per-projection inputs that do not change across the passes.
struct Context<'a> {
    graph: &'a ClassifiedGraph,
    labels: &'a dyn LabelLookup,
    scope: &'a str,
}

/// Builds [`IndexDocument`]s from resource descriptions.
///
/// Stateless apart from the shared, thread-safe resolver caches, so one
/// projector can serve concurrent projections.
pub struct FieldProjector {
    config: ProjectionConfig,
    properties: Arc<dyn PropertyMetadataResolver>,
    classes: Arc<dyn ClassHierarchy>,
}

impl FieldProjector {
    pub fn new(
        config: ProjectionConfig,
        properties: Arc<dyn PropertyMetadataResolver>,
        classes: Arc<dyn ClassHierarchy>,
    ) -> Self {
        Self {
            config,
            properties,
            classes,
        }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Project one resource. `None` for blank-node subjects.
    pub async fn project(
        &self,
        resource: &ResourceDescription,
        graph: &ClassifiedGraph,
        dataset: &str,
        labels: &dyn LabelLookup,
        scope: &str,
    ) -> Option<Projection> {
        if is_blank_node(&resource.subject) {
            debug!(subject = %resource.subject, "skipping blank node subject");
            return None;
        }
        let cx = Context {
            graph,
            labels,
            scope,
        };
        let mut b = DocumentBuilder::new(dataset, &resource.subject);

        let types: Vec<&str> = resource.types().collect();
        self.project_types(&mut b, &types);
        self.project_labels(&mut b, resource);
        self.project_descriptions(&mut b, resource);
        self.project_well_known(&mut b, resource);
        self.project_predicates(&mut b, resource, &cx).await;
        self.project_inferred_types(&mut b, &types).await;

        Some(b.finish())
    }

    /// Project every instance of `graph`, at most `workers` at a time.
    ///
    /// Results come back in document order; blank-node instances are
    /// left out.
    pub async fn project_all(
        &self,
        graph: &ClassifiedGraph,
        dataset: &str,
        labels: &dyn LabelLookup,
        scope: &str,
        workers: usize,
    ) -> Vec<Projection> {
        let instances: Vec<&ResourceDescription> = graph.instances().collect();
        let workers = workers.max(1);
        let mut pending = FuturesUnordered::new();
        let mut next = 0;
        let mut out: Vec<(usize, Projection)> = Vec::with_capacity(instances.len());
        loop {
            while pending.len() < workers && next < instances.len() {
                pending.push(self.project_at(next, instances[next], graph, dataset, labels, scope));
                next += 1;
            }
            match pending.next().await {
                Some((idx, Some(projection))) => out.push((idx, projection)),
                Some((_, None)) => {}
                None => break,
            }
        }
        out.sort_by_key(|(idx, _)| *idx);
        out.into_iter().map(|(_, p)| p).collect()
    }

    async fn project_at(
        &self,
        idx: usize,
        resource: &ResourceDescription,
        graph: &ClassifiedGraph,
        dataset: &str,
        labels: &dyn LabelLookup,
        scope: &str,
    ) -> (usize, Option<Projection>) {
        (idx, self.project(resource, graph, dataset, labels, scope).await)
    }

    fn project_types(&self, b: &mut DocumentBuilder, types: &[&str]) {
        for t in types {
            b.push(fields::TYPE, t, true);
            b.push(fields::TYPE_FACETS, t, true);
        }
        if let Some(first) = types.first() {
            b.push(fields::TYPE_SINGLE_VALUED, first, false);
        }
    }

    fn project_labels(&self, b: &mut DocumentBuilder, resource: &ResourceDescription) {
        let mut preferred: HashSet<String> = HashSet::new();
        for predicate in LABEL_PREDICATES {
            for lit in resource.values(predicate).iter().filter_map(Object::as_literal) {
                let lang = self.config.resolve_language(lit.language.as_deref());
                if preferred.insert(lang.to_string()) {
                    b.push(fields::pref_label(lang), &lit.value, false);
                    b.push(fields::pref_label_autocompletion(lang), &lit.value, false);
                } else {
                    b.push(fields::alt_label(lang), &lit.value, true);
                }
            }
        }
        for predicate in ALT_LABEL_PREDICATES {
            for lit in resource.values(predicate).iter().filter_map(Object::as_literal) {
                let lang = self.config.resolve_language(lit.language.as_deref());
                b.push(fields::alt_label(lang), &lit.value, true);
            }
        }
        if preferred.is_empty() {
            let lang = self.config.default_language();
            let tail = uri_tail(&resource.subject).to_string();
            b.push(fields::pref_label(lang), &tail, false);
            b.push(fields::pref_label_autocompletion(lang), &tail, false);
        }
    }

    fn project_descriptions(&self, b: &mut DocumentBuilder, resource: &ResourceDescription) {
        for predicate in DESCRIPTION_PREDICATES {
            for lit in resource.values(predicate).iter().filter_map(Object::as_literal) {
                let lang = self.config.resolve_language(lit.language.as_deref());
                b.push(fields::description(lang), &lit.value, true);
            }
        }
    }

    fn project_well_known(&self, b: &mut DocumentBuilder, resource: &ResourceDescription) {
        if let Some(url) = resource.values(IRON_PREF_URL).first() {
            b.push(fields::PREF_URL, url.lexical(), false);
        }
        if self.config.geo_enabled {
            project_geo(b, resource);
        }
    }

    fn is_consumed(&self, predicate: &str) -> bool {
        predicate == RDF_TYPE
            || predicate == IRON_PREF_URL
            || LABEL_PREDICATES.contains(&predicate)
            || ALT_LABEL_PREDICATES.contains(&predicate)
            || DESCRIPTION_PREDICATES.contains(&predicate)
            || (self.config.geo_enabled && GEO_PREDICATES.contains(&predicate))
    }

    async fn metadata(
        &self,
        b: &mut DocumentBuilder,
        predicate: &str,
        scope: &str,
    ) -> Arc<PropertyMetadata> {
        let resolved = self.properties.resolve(predicate, scope).await;
        if let Some(reason) = resolved.degradation() {
            b.diagnose(DiagnosticKind::PropertyMetadataMiss, format!("<{}>: {}", predicate, reason));
        }
        resolved.into_value()
    }

    async fn project_predicates(
        &self,
        b: &mut DocumentBuilder,
        resource: &ResourceDescription,
        cx: &Context<'_>,
    ) {
        let mut used_single: HashSet<&str> = HashSet::new();
        for (predicate, values) in &resource.predicates {
            if self.is_consumed(predicate) {
                continue;
            }
            let metadata = self.metadata(b, predicate, cx.scope).await;
            let cardinality = Cardinality::of(&metadata);
            for value in values {
                if cardinality == Cardinality::Single && !used_single.insert(predicate.as_str()) {
                    b.diagnose(
                        DiagnosticKind::DuplicateSingleValue,
                        format!("dropped extra value '{}' for <{}>", value.lexical(), predicate),
                    );
                    continue;
                }
                match value {
                    Object::Literal(lit) => {
                        self.project_literal(b, predicate, lit, &metadata, cardinality);
                        self.pass_through_reifications(b, predicate, value, false, cx);
                    }
                    Object::Iri(uri) | Object::Blank(uri) => {
                        self.project_reference(b, predicate, uri, cardinality, cx).await;
                        self.pass_through_reifications(b, predicate, value, true, cx);
                    }
                }
            }
        }
    }

    fn project_literal(
        &self,
        b: &mut DocumentBuilder,
        predicate: &str,
        lit: &Literal,
        metadata: &PropertyMetadata,
        cardinality: Cardinality,
    ) {
        let lang = self.config.resolve_language(lit.language.as_deref());
        let declared = ValueKind::of(metadata);
        let (kind, value) = match declared.normalize(&lit.value) {
            Some(value) => (declared, value),
            None => {
                b.diagnose(
                    DiagnosticKind::ValueCoercion,
                    format!("'{}' is not a valid {:?} for <{}>", lit.value, declared, predicate),
                );
                (ValueKind::Text, lit.value.clone())
            }
        };
        let name = fields::attribute_field(predicate, AttributeField::Literal { kind, lang }, cardinality);
        b.push(name, &value, cardinality == Cardinality::Multi);
        b.attribute(predicate);
        let facets = fields::attribute_field(predicate, AttributeField::Facets, cardinality);
        b.push(facets, &lit.value, true);
    }

    async fn project_reference(
        &self,
        b: &mut DocumentBuilder,
        predicate: &str,
        uri: &str,
        cardinality: Cardinality,
        cx: &Context<'_>,
    ) {
        let (label, lang) = match cx.labels.label(uri).await {
            Some(label) => {
                let lang = self.config.resolve_language(label.language.as_deref());
                (label.text, lang)
            }
            None => (uri_tail(uri).to_string(), self.config.default_language()),
        };
        let name = |field| fields::attribute_field(predicate, field, cardinality);

        b.push(
            name(AttributeField::ObjectLabel { lang }),
            &label,
            cardinality == Cardinality::Multi,
        );
        b.push(name(AttributeField::ObjectUri), uri, true);
        b.attribute(predicate);
        b.push(name(AttributeField::Facets), &label, true);
        b.push(
            name(AttributeField::UriLabelFacets),
            &format!("{}::{}", uri, label),
            true,
        );
    }

    /// Attach reification statements about `(subject, predicate, value)`.
    ///
    /// Only literal reification values are projected. For referenced
    /// values only the first literal per reification predicate is kept.
    fn pass_through_reifications(
        &self,
        b: &mut DocumentBuilder,
        predicate: &str,
        value: &Object,
        first_only: bool,
        cx: &Context<'_>,
    ) {
        let subject = b.subject().to_string();
        let mut taken: HashSet<&str> = HashSet::new();
        for statement in cx.graph.reifications_of(&subject, predicate, value) {
            for (reify_predicate, reify_values) in &statement.predicates {
                if matches!(
                    reify_predicate.as_str(),
                    RDF_TYPE | RDF_SUBJECT | RDF_PREDICATE | RDF_OBJECT
                ) {
                    continue;
                }
                for lit in reify_values.iter().filter_map(Object::as_literal) {
                    if first_only && !taken.insert(reify_predicate.as_str()) {
                        break;
                    }
                    let lang = self.config.resolve_language(lit.language.as_deref());
                    let multi = Cardinality::Multi;
                    b.push(
                        fields::attribute_field(reify_predicate, AttributeField::ReifyAttr, multi),
                        predicate,
                        true,
                    );
                    b.push(
                        fields::attribute_field(reify_predicate, AttributeField::ReifyObj, multi),
                        value.lexical(),
                        true,
                    );
                    b.push(
                        fields::attribute_field(
                            reify_predicate,
                            AttributeField::ReifyValue { lang },
                            multi,
                        ),
                        &lit.value,
                        true,
                    );
                    b.attribute(reify_predicate);
                }
            }
        }
    }

    async fn project_inferred_types(&self, b: &mut DocumentBuilder, types: &[&str]) {
        let mut inferred: Vec<String> = Vec::new();
        for t in types {
            let closure = self.classes.super_classes(t).await;
            if let Some(reason) = closure.degradation() {
                b.diagnose(DiagnosticKind::ClassHierarchyMiss, format!("<{}>: {}", t, reason));
            }
            for class in closure.value().iter() {
                if !inferred.contains(class) {
                    inferred.push(class.clone());
                }
            }
        }
        for class in &inferred {
            b.push(fields::INFERRED_TYPE, class, true);
        }
    }
}

fn push_point(b: &mut DocumentBuilder, point: &geo::Point, mark_attributes: bool) {
    b.push(fields::LAT, &point.lat, true);
    b.push(fields::LONG, &point.long, true);
    if let Some(alt) = &point.alt {
        b.push(fields::ALT, alt, true);
    }
    b.push(fields::GEOHASH, &point.geohash(), true);
    if mark_attributes {
        b.attribute(GEO_LAT);
        b.attribute(GEO_LONG);
        if point.alt.is_some() {
            b.attribute(GEO_ALT);
        }
    }
}

fn first_literal<'a>(resource: &'a ResourceDescription, predicate: &str) -> Option<&'a str> {
    resource
        .values(predicate)
        .iter()
        .find_map(Object::as_literal)
        .map(|l| l.value.as_str())
}

fn project_geo(b: &mut DocumentBuilder, resource: &ResourceDescription) {
    let mut marked = false;

    let lat = first_literal(resource, GEO_LAT).and_then(geo::normalize_coordinate);
    let long = first_literal(resource, GEO_LONG).and_then(geo::normalize_coordinate);
    let direct = match (lat, long) {
        (Some(lat), Some(long)) => Some(geo::Point {
            lat,
            long,
            alt: first_literal(resource, GEO_ALT).and_then(geo::normalize_coordinate),
        }),
        _ => first_literal(resource, GEO_LAT_LONG).and_then(geo::parse_lat_long),
    };
    if let Some(point) = direct {
        push_point(b, &point, true);
        marked = true;
    } else {
        let partial: Vec<&str> = [GEO_LAT, GEO_LONG, GEO_ALT, GEO_LAT_LONG]
            .into_iter()
            .filter(|p| !resource.values(p).is_empty())
            .collect();
        if !partial.is_empty() {
            b.diagnose(
                DiagnosticKind::ValueCoercion,
                format!("no point could be built from <{}>", partial.join(">, <")),
            );
        }
    }

    for (predicate, field) in [
        (SCO_POLYGON, fields::POLYGON_COORDINATES),
        (SCO_POLYLINE, fields::POLYLINE_COORDINATES),
    ] {
        for lit in resource.values(predicate).iter().filter_map(Object::as_literal) {
            let points = geo::parse_coordinates(&lit.value);
            if points.is_empty() {
                warn!(subject = %resource.subject, predicate = %predicate, "unparseable coordinate list");
                continue;
            }
            b.push(field, &lit.value, true);
            b.attribute(predicate);
            for point in &points {
                push_point(b, point, !marked);
                marked = true;
            }
        }
    }

    for value in resource.values(SCO_LOCATED_IN) {
        b.push(fields::LOCATED_IN, value.lexical(), true);
        b.attribute(SCO_LOCATED_IN);
    }
}
