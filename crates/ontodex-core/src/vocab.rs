//! Vocabulary IRIs the projection engine recognises.

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_STATEMENT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Statement";
pub const RDF_SUBJECT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#subject";
pub const RDF_PREDICATE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#predicate";
pub const RDF_OBJECT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#object";

pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";

pub const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";

pub const VOID_DATASET: &str = "http://rdfs.org/ns/void#Dataset";

pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const XSD_INT: &str = "http://www.w3.org/2001/XMLSchema#int";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";

pub const SKOS_PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
pub const SKOS_ALT_LABEL: &str = "http://www.w3.org/2004/02/skos/core#altLabel";
pub const SKOS_DEFINITION: &str = "http://www.w3.org/2004/02/skos/core#definition";
pub const SKOS08_PREF_LABEL: &str = "http://www.w3.org/2008/05/skos#prefLabel";
pub const SKOS08_ALT_LABEL: &str = "http://www.w3.org/2008/05/skos#altLabel";
pub const SKOS08_DEFINITION: &str = "http://www.w3.org/2008/05/skos#definition";
pub const UMBEL_PREF_LABEL: &str = "http://umbel.org/umbel#prefLabel";
pub const UMBEL_ALT_LABEL: &str = "http://umbel.org/umbel#altLabel";
pub const IRON_PREF_LABEL: &str = "http://purl.org/ontology/iron#prefLabel";
pub const IRON_ALT_LABEL: &str = "http://purl.org/ontology/iron#altLabel";
pub const IRON_DESCRIPTION: &str = "http://purl.org/ontology/iron#description";
pub const IRON_PREF_URL: &str = "http://purl.org/ontology/iron#prefURL";
pub const DCTERMS_TITLE: &str = "http://purl.org/dc/terms/title";
pub const DCTERMS_DESCRIPTION: &str = "http://purl.org/dc/terms/description";
pub const DC_TITLE: &str = "http://purl.org/dc/elements/1.1/title";
pub const DC_DESCRIPTION: &str = "http://purl.org/dc/elements/1.1/description";
pub const FOAF_NAME: &str = "http://xmlns.com/foaf/0.1/name";

pub const GEO_LAT: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#lat";
pub const GEO_LONG: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#long";
pub const GEO_ALT: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#alt";
pub const GEO_LAT_LONG: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#lat_long";
pub const SCO_POLYGON: &str = "http://purl.org/ontology/sco#polygonCoordinates";
pub const SCO_POLYLINE: &str = "http://purl.org/ontology/sco#polylineCoordinates";
pub const SCO_LOCATED_IN: &str = "http://purl.org/ontology/sco#locatedIn";

/// Label predicates in priority order: preferred-label variants first,
/// then generic title/name/label predicates.
pub const LABEL_PREDICATES: &[&str] = &[
    SKOS_PREF_LABEL,
    SKOS08_PREF_LABEL,
    UMBEL_PREF_LABEL,
    IRON_PREF_LABEL,
    DCTERMS_TITLE,
    DC_TITLE,
    FOAF_NAME,
    RDFS_LABEL,
];

/// Predicates whose values are always alternate labels.
pub const ALT_LABEL_PREDICATES: &[&str] = &[
    SKOS_ALT_LABEL,
    SKOS08_ALT_LABEL,
    UMBEL_ALT_LABEL,
    IRON_ALT_LABEL,
];

pub const DESCRIPTION_PREDICATES: &[&str] = &[
    SKOS_DEFINITION,
    SKOS08_DEFINITION,
    IRON_DESCRIPTION,
    DCTERMS_DESCRIPTION,
    DC_DESCRIPTION,
    RDFS_COMMENT,
];

pub const GEO_PREDICATES: &[&str] = &[
    GEO_LAT,
    GEO_LONG,
    GEO_ALT,
    GEO_LAT_LONG,
    SCO_POLYGON,
    SCO_POLYLINE,
    SCO_LOCATED_IN,
];
