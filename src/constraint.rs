// src/constraint.rs
//
// The query constraint grammar: free builder functions produce
// `QueryConstraint` values, `QueryWhere` merges them per field and
// serializes the `where` JSON object.

use std::collections::BTreeMap;

use serde::ser::{Error, SerializeMap};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::CairnError;
use crate::geopoint::{CairnGeoPoint, EARTH_RADIUS_KILOMETERS, EARTH_RADIUS_MILES};
use crate::object::CairnObject;
use crate::pointer::{Pointer, RawPointer};
use crate::polygon::CairnPolygon;
use crate::query::Query;

/// The operator a constraint applies to its key. Constraints without a
/// comparator serialize as direct `{key: value}` equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    NotEqualTo,
    ContainedIn,
    NotContainedIn,
    ContainedBy,
    All,
    Regex,
    Exists,
    Text,
    Select,
    DontSelect,
    InQuery,
    NotInQuery,
    NearSphere,
    MaxDistance,
    CenterSphere,
    Within,
    GeoWithin,
    GeoIntersects,
}

impl Comparator {
    pub(crate) fn symbol(&self) -> &'static str {
        match self {
            Comparator::LessThan => "$lt",
            Comparator::LessThanOrEqualTo => "$lte",
            Comparator::GreaterThan => "$gt",
            Comparator::GreaterThanOrEqualTo => "$gte",
            Comparator::NotEqualTo => "$ne",
            Comparator::ContainedIn => "$in",
            Comparator::NotContainedIn => "$nin",
            Comparator::ContainedBy => "$containedBy",
            Comparator::All => "$all",
            Comparator::Regex => "$regex",
            Comparator::Exists => "$exists",
            Comparator::Text => "$text",
            Comparator::Select => "$select",
            Comparator::DontSelect => "$dontSelect",
            Comparator::InQuery => "$inQuery",
            Comparator::NotInQuery => "$notInQuery",
            Comparator::NearSphere => "$nearSphere",
            Comparator::MaxDistance => "$maxDistance",
            Comparator::CenterSphere => "$centerSphere",
            Comparator::Within => "$within",
            Comparator::GeoWithin => "$geoWithin",
            Comparator::GeoIntersects => "$geoIntersects",
        }
    }
}

/// The payload of a constraint. Closed on purpose: every wire shape the
/// dialect knows has its own variant and serialization arm, so a new shape
/// is a new variant, not a loosely-typed escape hatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintValue {
    /// A plain JSON scalar, object or prebuilt operator map.
    Scalar(Value),
    /// A JSON array (`$in`, `$nin`, `$all`, `$containedBy`).
    Array(Vec<Value>),
    /// A geo point (`$nearSphere`, `$centerSphere`).
    GeoPoint(CairnGeoPoint),
    /// Two corners, emitted as `{"$box": [sw, ne]}`.
    GeoBox {
        southwest: CairnGeoPoint,
        northeast: CairnGeoPoint,
    },
    /// Vertex pair list, emitted as `{"$polygon": [[lat, lng], ...]}`.
    PolygonPoints(Vec<[f64; 2]>),
    /// A geo point wrapped as `{"$point": ...}` (`$geoIntersects`).
    Point(CairnGeoPoint),
    /// A pointer, emitted in its `__type` wire form.
    Pointer(RawPointer),
    /// Full-text term, emitted as `{"$search": {"$term": ...}}`.
    TextSearch(String),
    /// Wraps another value as `{"$relativeTime": ...}`.
    RelativeTime(Box<ConstraintValue>),
    /// `$relatedTo` payload: `{"key": ..., "object": <pointer>}`.
    Related { key: String, object: RawPointer },
    /// Sub-query payload: `{"where": ..., "className": ...}`.
    SubQuery {
        class_name: String,
        where_clause: QueryWhere,
    },
    /// Keyed sub-query payload:
    /// `{"query": {"where": ..., "className": ...}, "key": ...}`.
    KeyedSubQuery {
        key: String,
        class_name: String,
        where_clause: QueryWhere,
    },
    /// A list of where objects (`$or`, `$nor`, `$and`).
    WhereList(Vec<QueryWhere>),
    /// A value that failed JSON encoding at build time. Surfaces as a
    /// serialization error when the query body is encoded.
    Invalid(String),
}

#[derive(Serialize)]
struct SubQueryPayload<'a> {
    #[serde(rename = "where")]
    where_clause: &'a QueryWhere,
    #[serde(rename = "className")]
    class_name: &'a str,
}

#[derive(Serialize)]
struct KeyedSubQueryPayload<'a> {
    query: SubQueryPayload<'a>,
    key: &'a str,
}

#[derive(Serialize)]
struct RelatedPayload<'a> {
    key: &'a str,
    object: &'a RawPointer,
}

#[derive(Serialize)]
struct TermPayload<'a> {
    #[serde(rename = "$term")]
    term: &'a str,
}

#[derive(Serialize)]
struct SearchPayload<'a> {
    #[serde(rename = "$search")]
    search: TermPayload<'a>,
}

impl Serialize for ConstraintValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConstraintValue::Scalar(value) => value.serialize(serializer),
            ConstraintValue::Array(items) => items.serialize(serializer),
            ConstraintValue::GeoPoint(point) => point.serialize(serializer),
            ConstraintValue::GeoBox {
                southwest,
                northeast,
            } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$box", &[southwest, northeast])?;
                map.end()
            }
            ConstraintValue::PolygonPoints(points) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$polygon", points)?;
                map.end()
            }
            ConstraintValue::Point(point) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$point", point)?;
                map.end()
            }
            ConstraintValue::Pointer(pointer) => pointer.serialize(serializer),
            ConstraintValue::TextSearch(term) => SearchPayload {
                search: TermPayload { term },
            }
            .serialize(serializer),
            ConstraintValue::RelativeTime(inner) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$relativeTime", inner)?;
                map.end()
            }
            ConstraintValue::Related { key, object } => {
                RelatedPayload { key, object }.serialize(serializer)
            }
            ConstraintValue::SubQuery {
                class_name,
                where_clause,
            } => SubQueryPayload {
                where_clause,
                class_name,
            }
            .serialize(serializer),
            ConstraintValue::KeyedSubQuery {
                key,
                class_name,
                where_clause,
            } => KeyedSubQueryPayload {
                query: SubQueryPayload {
                    where_clause,
                    class_name,
                },
                key,
            }
            .serialize(serializer),
            ConstraintValue::WhereList(wheres) => wheres.serialize(serializer),
            ConstraintValue::Invalid(message) => Err(S::Error::custom(message)),
        }
    }
}

/// A single filter on one key. Built by the free functions in this module
/// and added to a query with [`Query::filter`](crate::query::Query::filter).
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConstraint {
    pub(crate) key: String,
    pub(crate) comparator: Option<Comparator>,
    pub(crate) value: ConstraintValue,
}

impl QueryConstraint {
    fn direct(key: &str, value: ConstraintValue) -> Self {
        QueryConstraint {
            key: key.to_string(),
            comparator: None,
            value,
        }
    }

    fn with_comparator(key: &str, comparator: Comparator, value: ConstraintValue) -> Self {
        QueryConstraint {
            key: key.to_string(),
            comparator: Some(comparator),
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// The merge-map behind a query's `where` object: field name to the
/// constraints accumulated for that field, in insertion order.
///
/// Serialization folds each field's constraints left to right: operator
/// constraints union into one operator map (the same operator overwrites),
/// and a direct-equality constraint replaces whatever was accumulated so
/// far (and vice versa).
#[derive(Debug, Clone, Default)]
pub struct QueryWhere {
    constraints: BTreeMap<String, Vec<QueryConstraint>>,
}

impl QueryWhere {
    pub(crate) fn add(&mut self, constraint: QueryConstraint) {
        self.constraints
            .entry(constraint.key.clone())
            .or_default()
            .push(constraint);
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

struct MergedEntry<'a>(&'a [QueryConstraint]);

impl Serialize for MergedEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut direct: Option<&ConstraintValue> = None;
        let mut operators: Vec<(&'static str, &ConstraintValue)> = Vec::new();
        for constraint in self.0 {
            match constraint.comparator {
                None => {
                    direct = Some(&constraint.value);
                    operators.clear();
                }
                Some(comparator) => {
                    direct = None;
                    let symbol = comparator.symbol();
                    if let Some(slot) = operators.iter_mut().find(|(s, _)| *s == symbol) {
                        slot.1 = &constraint.value;
                    } else {
                        operators.push((symbol, &constraint.value));
                    }
                }
            }
        }
        if let Some(value) = direct {
            value.serialize(serializer)
        } else {
            let mut map = serializer.serialize_map(Some(operators.len()))?;
            for (symbol, value) in operators {
                map.serialize_entry(symbol, value)?;
            }
            map.end()
        }
    }
}

impl Serialize for QueryWhere {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.constraints.len()))?;
        for (key, constraints) in &self.constraints {
            map.serialize_entry(key, &MergedEntry(constraints))?;
        }
        map.end()
    }
}

impl PartialEq for QueryWhere {
    /// Compares the merged wire forms, so insertion order across different
    /// keys never matters.
    fn eq(&self, other: &Self) -> bool {
        match (serde_json::to_value(self), serde_json::to_value(other)) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.constraints == other.constraints,
        }
    }
}

fn encoded<V: Serialize>(value: V) -> ConstraintValue {
    match serde_json::to_value(value) {
        Ok(json) => ConstraintValue::Scalar(json),
        Err(e) => ConstraintValue::Invalid(format!("unencodable constraint value: {}", e)),
    }
}

fn encoded_array<V: Serialize>(values: &[V]) -> ConstraintValue {
    match values
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(items) => ConstraintValue::Array(items),
        Err(e) => ConstraintValue::Invalid(format!("unencodable constraint value: {}", e)),
    }
}

fn radians(distance: f64) -> ConstraintValue {
    ConstraintValue::Scalar(Value::from(distance))
}

/// Quotes a string so the server's regex engine treats it as a literal.
fn quote_literal(text: &str) -> String {
    format!("\\Q{}\\E", text)
}

/// Requires the field to equal `value`. Serializes without an operator
/// envelope: `{"yolo": "yarr"}`.
pub fn equal_to<V: Serialize>(key: &str, value: V) -> QueryConstraint {
    QueryConstraint::direct(key, encoded(value))
}

/// Requires the field to point at `object`. The object must already be
/// saved.
///
/// # Errors
/// `CairnError::MissingObjectId` when the object has no `objectId`.
pub fn equal_to_object<T: CairnObject>(key: &str, object: &T) -> Result<QueryConstraint, CairnError> {
    let pointer = Pointer::from_object(object)?;
    Ok(QueryConstraint::direct(
        key,
        ConstraintValue::Pointer(pointer.to_raw()),
    ))
}

pub fn not_equal_to<V: Serialize>(key: &str, value: V) -> QueryConstraint {
    QueryConstraint::with_comparator(key, Comparator::NotEqualTo, encoded(value))
}

pub fn less_than<V: Serialize>(key: &str, value: V) -> QueryConstraint {
    QueryConstraint::with_comparator(key, Comparator::LessThan, encoded(value))
}

pub fn less_than_or_equal_to<V: Serialize>(key: &str, value: V) -> QueryConstraint {
    QueryConstraint::with_comparator(key, Comparator::LessThanOrEqualTo, encoded(value))
}

pub fn greater_than<V: Serialize>(key: &str, value: V) -> QueryConstraint {
    QueryConstraint::with_comparator(key, Comparator::GreaterThan, encoded(value))
}

pub fn greater_than_or_equal_to<V: Serialize>(key: &str, value: V) -> QueryConstraint {
    QueryConstraint::with_comparator(key, Comparator::GreaterThanOrEqualTo, encoded(value))
}

/// Requires the field's value to be one of `values` (`$in`).
pub fn contained_in<V: Serialize>(key: &str, values: &[V]) -> QueryConstraint {
    QueryConstraint::with_comparator(key, Comparator::ContainedIn, encoded_array(values))
}

/// Requires the field's value to be none of `values` (`$nin`).
pub fn not_contained_in<V: Serialize>(key: &str, values: &[V]) -> QueryConstraint {
    QueryConstraint::with_comparator(key, Comparator::NotContainedIn, encoded_array(values))
}

/// Requires an array field to contain every one of `values` (`$all`).
pub fn contains_all<V: Serialize>(key: &str, values: &[V]) -> QueryConstraint {
    QueryConstraint::with_comparator(key, Comparator::All, encoded_array(values))
}

/// Requires an array field to be contained by `values` (`$containedBy`).
pub fn contained_by<V: Serialize>(key: &str, values: &[V]) -> QueryConstraint {
    QueryConstraint::with_comparator(key, Comparator::ContainedBy, encoded_array(values))
}

pub fn exists(key: &str) -> QueryConstraint {
    QueryConstraint::with_comparator(key, Comparator::Exists, ConstraintValue::Scalar(Value::Bool(true)))
}

pub fn does_not_exist(key: &str) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::Exists,
        ConstraintValue::Scalar(Value::Bool(false)),
    )
}

/// Matches the field against a raw regex pattern. With `modifiers` set the
/// pattern and its `$options` travel together in one operator map.
pub fn matches_regex(key: &str, regex: &str, modifiers: Option<&str>) -> QueryConstraint {
    match modifiers {
        None => QueryConstraint::with_comparator(
            key,
            Comparator::Regex,
            ConstraintValue::Scalar(Value::String(regex.to_string())),
        ),
        Some(options) => QueryConstraint::direct(
            key,
            ConstraintValue::Scalar(serde_json::json!({
                "$regex": regex,
                "$options": options,
            })),
        ),
    }
}

/// Matches fields containing `substring`, quoted as a regex literal.
pub fn contains_string(key: &str, substring: &str, modifiers: Option<&str>) -> QueryConstraint {
    matches_regex(key, &quote_literal(substring), modifiers)
}

/// Matches fields starting with `prefix`, quoted as a regex literal.
pub fn has_prefix(key: &str, prefix: &str, modifiers: Option<&str>) -> QueryConstraint {
    matches_regex(key, &format!("^{}", quote_literal(prefix)), modifiers)
}

/// Matches fields ending with `suffix`, quoted as a regex literal.
pub fn has_suffix(key: &str, suffix: &str, modifiers: Option<&str>) -> QueryConstraint {
    matches_regex(key, &format!("{}$", quote_literal(suffix)), modifiers)
}

/// Full-text search on the field: `{"$text": {"$search": {"$term": ...}}}`.
pub fn matches_text(key: &str, text: &str) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::Text,
        ConstraintValue::TextSearch(text.to_string()),
    )
}

/// Requires the field to equal the value of `query_key` on objects matched
/// by `query` (`$select`).
pub fn matches_key_in_query<U: CairnObject>(
    key: &str,
    query_key: &str,
    query: &Query<U>,
) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::Select,
        ConstraintValue::KeyedSubQuery {
            key: query_key.to_string(),
            class_name: U::class_name().to_string(),
            where_clause: query.where_clause().clone(),
        },
    )
}

/// Negation of [`matches_key_in_query`] (`$dontSelect`).
pub fn does_not_match_key_in_query<U: CairnObject>(
    key: &str,
    query_key: &str,
    query: &Query<U>,
) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::DontSelect,
        ConstraintValue::KeyedSubQuery {
            key: query_key.to_string(),
            class_name: U::class_name().to_string(),
            where_clause: query.where_clause().clone(),
        },
    )
}

/// Requires the field to point at an object matched by `query` (`$inQuery`).
pub fn matches_query<U: CairnObject>(key: &str, query: &Query<U>) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::InQuery,
        ConstraintValue::SubQuery {
            class_name: U::class_name().to_string(),
            where_clause: query.where_clause().clone(),
        },
    )
}

/// Negation of [`matches_query`] (`$notInQuery`).
pub fn does_not_match_query<U: CairnObject>(key: &str, query: &Query<U>) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::NotInQuery,
        ConstraintValue::SubQuery {
            class_name: U::class_name().to_string(),
            where_clause: query.where_clause().clone(),
        },
    )
}

fn where_list<T: CairnObject>(queries: &[Query<T>]) -> ConstraintValue {
    ConstraintValue::WhereList(
        queries
            .iter()
            .map(|query| query.where_clause().clone())
            .collect(),
    )
}

/// Matches objects satisfying any of `queries` (`$or`).
pub fn or<T: CairnObject>(queries: &[Query<T>]) -> QueryConstraint {
    QueryConstraint::direct("$or", where_list(queries))
}

/// Matches objects satisfying none of `queries` (`$nor`).
pub fn nor<T: CairnObject>(queries: &[Query<T>]) -> QueryConstraint {
    QueryConstraint::direct("$nor", where_list(queries))
}

/// Matches objects satisfying all of `queries` (`$and`).
pub fn and<T: CairnObject>(queries: &[Query<T>]) -> QueryConstraint {
    QueryConstraint::direct("$and", where_list(queries))
}

/// Matches objects related to `object` through the relation named `key`.
pub fn related<T: CairnObject>(key: &str, object: &Pointer<T>) -> QueryConstraint {
    QueryConstraint::direct(
        "$relatedTo",
        ConstraintValue::Related {
            key: key.to_string(),
            object: object.to_raw(),
        },
    )
}

/// Rewrites a comparison so the server evaluates its value as a relative
/// time phrase, e.g. `relative(greater_than("date", "3 days ago"))`.
pub fn relative(constraint: QueryConstraint) -> QueryConstraint {
    QueryConstraint {
        key: constraint.key,
        comparator: constraint.comparator,
        value: ConstraintValue::RelativeTime(Box::new(constraint.value)),
    }
}

/// Orders results by distance from `geopoint` (`$nearSphere`).
pub fn near(key: &str, geopoint: &CairnGeoPoint) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::NearSphere,
        ConstraintValue::GeoPoint(geopoint.clone()),
    )
}

/// Restricts the field to `distance` radians around `geopoint`. Sorted mode
/// emits `$nearSphere` + `$maxDistance`; unsorted mode emits the flat
/// `$centerSphere` + `$geoWithin` pair.
pub fn within_radians(
    key: &str,
    geopoint: &CairnGeoPoint,
    distance: f64,
    sorted: bool,
) -> Vec<QueryConstraint> {
    if sorted {
        vec![
            near(key, geopoint),
            QueryConstraint::with_comparator(key, Comparator::MaxDistance, radians(distance)),
        ]
    } else {
        vec![
            QueryConstraint::with_comparator(
                key,
                Comparator::CenterSphere,
                ConstraintValue::GeoPoint(geopoint.clone()),
            ),
            QueryConstraint::with_comparator(key, Comparator::GeoWithin, radians(distance)),
        ]
    }
}

/// [`within_radians`] with the distance given in miles.
pub fn within_miles(
    key: &str,
    geopoint: &CairnGeoPoint,
    distance: f64,
    sorted: bool,
) -> Vec<QueryConstraint> {
    within_radians(key, geopoint, distance / EARTH_RADIUS_MILES, sorted)
}

/// [`within_radians`] with the distance given in kilometers.
pub fn within_kilometers(
    key: &str,
    geopoint: &CairnGeoPoint,
    distance: f64,
    sorted: bool,
) -> Vec<QueryConstraint> {
    within_radians(key, geopoint, distance / EARTH_RADIUS_KILOMETERS, sorted)
}

/// Restricts the field to the box spanned by two corners
/// (`$within.$box`).
pub fn within_geo_box(
    key: &str,
    southwest: &CairnGeoPoint,
    northeast: &CairnGeoPoint,
) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::Within,
        ConstraintValue::GeoBox {
            southwest: southwest.clone(),
            northeast: northeast.clone(),
        },
    )
}

/// Restricts the field to a polygon (`$geoWithin.$polygon`).
pub fn within_polygon(key: &str, polygon: &CairnPolygon) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::GeoWithin,
        ConstraintValue::PolygonPoints(polygon.coordinate_pairs()),
    )
}

/// [`within_polygon`] from raw vertices.
pub fn within_polygon_points(key: &str, points: &[CairnGeoPoint]) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::GeoWithin,
        ConstraintValue::PolygonPoints(
            points.iter().map(CairnGeoPoint::coordinate_pair).collect(),
        ),
    )
}

/// Requires a polygon field to contain `point` (`$geoIntersects.$point`).
pub fn polygon_contains(key: &str, point: &CairnGeoPoint) -> QueryConstraint {
    QueryConstraint::with_comparator(
        key,
        Comparator::GeoIntersects,
        ConstraintValue::Point(point.clone()),
    )
}
