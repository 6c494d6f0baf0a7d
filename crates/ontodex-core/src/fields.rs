//! Index field naming.
//!
//! Every field name the projector emits comes from this module. Names are
//! a pure function of (predicate, value kind, cardinality, language,
//! reification role), so projecting the same resource twice can never
//! introduce a second schema entry for the same data.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::PropertyMetadata;
use crate::vocab::{XSD_DATE_TIME, XSD_FLOAT, XSD_INT, XSD_INTEGER};

pub const UID: &str = "uid";
pub const URI: &str = "uri";
pub const DATASET: &str = "dataset";
pub const TYPE: &str = "type";
pub const TYPE_FACETS: &str = "type_facets";
pub const TYPE_SINGLE_VALUED: &str = "type_single_valued";
pub const INFERRED_TYPE: &str = "inferred_type";
pub const ATTRIBUTE: &str = "attribute";
pub const PREF_URL: &str = "prefURL";
pub const LAT: &str = "lat";
pub const LONG: &str = "long";
pub const ALT: &str = "alt";
pub const GEOHASH: &str = "geohash";
pub const POLYGON_COORDINATES: &str = "polygonCoordinates";
pub const POLYLINE_COORDINATES: &str = "polylineCoordinates";
pub const LOCATED_IN: &str = "located_in";

const SINGLE_VALUED_SUFFIX: &str = "_single_valued";

pub fn pref_label(lang: &str) -> String {
    format!("prefLabel_{}", lang)
}

pub fn pref_label_autocompletion(lang: &str) -> String {
    format!("prefLabelAutocompletion_{}", lang)
}

pub fn alt_label(lang: &str) -> String {
    format!("altLabel_{}", lang)
}

pub fn description(lang: &str) -> String {
    format!("description_{}", lang)
}

/// Datatype classification of a literal, decided by the predicate's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Date,
    Int,
    Float,
    Text,
}

impl ValueKind {
    /// Dispatch in priority order: dateTime, int/integer, float, string.
    pub fn of(metadata: &PropertyMetadata) -> Self {
        if metadata.has_range(XSD_DATE_TIME) {
            ValueKind::Date
        } else if metadata.has_range(XSD_INT) || metadata.has_range(XSD_INTEGER) {
            ValueKind::Int
        } else if metadata.has_range(XSD_FLOAT) {
            ValueKind::Float
        } else {
            ValueKind::Text
        }
    }

    /// Canonical index form of `raw` for this kind, or `None` when the
    /// lexical value does not fit the kind.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        if *self == ValueKind::Text {
            return Some(raw.to_string());
        }
        let raw = raw.trim();
        match self {
            ValueKind::Text => Some(raw.to_string()),
            ValueKind::Int => raw.parse::<i64>().ok().map(|i| i.to_string()),
            ValueKind::Float => {
                let dotted = raw.replace(',', ".");
                dotted
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|_| dotted)
            }
            ValueKind::Date => normalize_date(raw),
        }
    }
}

fn normalize_date(raw: &str) -> Option<String> {
    const OUT: &str = "%Y-%m-%dT%H:%M:%SZ";
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).format(OUT).to_string());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(dt.format(OUT).to_string());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.format(OUT).to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Single,
    Multi,
}

impl Cardinality {
    pub fn of(metadata: &PropertyMetadata) -> Self {
        if metadata.is_single_valued() {
            Cardinality::Single
        } else {
            Cardinality::Multi
        }
    }
}

/// The per-predicate field families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeField<'a> {
    /// Literal value; `lang` only shapes the name for [`ValueKind::Text`].
    Literal { kind: ValueKind, lang: &'a str },
    /// Label of a referenced resource.
    ObjectLabel { lang: &'a str },
    ObjectUri,
    Facets,
    UriLabelFacets,
    ReifyAttr,
    ReifyObj,
    ReifyValue { lang: &'a str },
}

/// Percent-encode a predicate IRI into a field-name prefix.
pub fn encode_predicate(predicate: &str) -> String {
    urlencoding::encode(predicate).into_owned()
}

/// Name of the field holding `field` for `predicate`.
///
/// `cardinality` only affects literal and object-label fields; the
/// remaining families are always multi-valued.
pub fn attribute_field(predicate: &str, field: AttributeField<'_>, cardinality: Cardinality) -> String {
    let p = encode_predicate(predicate);
    let base = match field {
        AttributeField::Literal { kind, lang } => match kind {
            ValueKind::Date => format!("{}_attr_date", p),
            ValueKind::Int => format!("{}_attr_int", p),
            ValueKind::Float => format!("{}_attr_float", p),
            ValueKind::Text => format!("{}_attr_{}", p, lang),
        },
        AttributeField::ObjectLabel { lang } => format!("{}_attr_obj_{}", p, lang),
        AttributeField::ObjectUri => return format!("{}_attr_obj_uri", p),
        AttributeField::Facets => return format!("{}_attr_facets", p),
        AttributeField::UriLabelFacets => return format!("{}_attr_uri_label_facets", p),
        AttributeField::ReifyAttr => return format!("{}_reify_attr", p),
        AttributeField::ReifyObj => return format!("{}_reify_obj", p),
        AttributeField::ReifyValue { lang } => return format!("{}_reify_value_{}", p, lang),
    };
    match cardinality {
        Cardinality::Single => base + SINGLE_VALUED_SUFFIX,
        Cardinality::Multi => base,
    }
}

/// Whether a field name is a single-valued variant.
pub fn is_single_valued_field(name: &str) -> bool {
    name.ends_with(SINGLE_VALUED_SUFFIX)
}
