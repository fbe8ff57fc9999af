//! Query-string serialization.
//!
//! Any `Serialize` struct or map can be turned into URL query parameters.
//! Values are first collected into a small tree by a dedicated
//! [`serde::Serializer`], then flattened according to [`QuerySettings`]:
//!
//! | Input | `NestedFormat::Brackets` | `NestedFormat::Dots` |
//! |---|---|---|
//! | `{a: {b: 1}}` | `a[b]=1` | `a.b=1` |
//!
//! | Input | `Comma` | `Repeat` | `Brackets` | `Indices` |
//! |---|---|---|---|---|
//! | `{tags: [x, y]}` | `tags=x,y` | `tags=x&tags=y` | `tags[]=x&tags[]=y` | `tags[0]=x&tags[1]=y` |
//!
//! Struct fields keep declaration order and map entries are sorted by key, so
//! equal inputs always produce byte-identical strings. Omitted
//! [`Field`](crate::Field)s produce nothing; nulls render as `key=`.
//!
//! Pairs hold text with `%` and `,` already escaped by [`escape_component`],
//! so a comma inside a value (`"a,b"` becomes `a%2Cb`) never reads as a list
//! separator.
//!
//! # Example
//!
//! ```
//! use ledgerkit_core::{Field, QuerySettings, to_query_string};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct ListTransactions {
//!     #[serde(skip_serializing_if = "Field::is_omitted")]
//!     account_id: Field<String>,
//!     #[serde(skip_serializing_if = "Field::is_omitted")]
//!     limit: Field<u32>,
//! }
//!
//! let params = ListTransactions { account_id: Field::present("acct_1".into()), limit: Field::omitted() };
//! let query = to_query_string(&params, QuerySettings::default()).expect("query");
//! assert_eq!(query, "account_id=acct_1");
//! ```

use std::fmt;

use derive_more::{Display, Error};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde::ser;

/// Characters escaped when pairs are written out.
///
/// Brackets, dots and commas stay literal so nested keys and comma lists
/// remain readable. `%` and `,` inside a component were escaped earlier.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'[')
    .remove(b']')
    .remove(b',')
    .remove(b'%');

/// How arrays are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArrayFormat {
    /// `tags=a,b`. Arrays of objects fall back to [`ArrayFormat::Indices`].
    #[default]
    Comma,
    /// `tags=a&tags=b`
    Repeat,
    /// `tags[]=a&tags[]=b`
    Brackets,
    /// `tags[0]=a&tags[1]=b`
    Indices,
}

/// How nested object keys are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NestedFormat {
    /// `created_at[gte]=...`
    #[default]
    Brackets,
    /// `created_at.gte=...`
    Dots,
}

/// Conventions for [`to_query_pairs`] and [`to_query_string`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QuerySettings {
    /// Array rendering.
    pub array_format: ArrayFormat,
    /// Nested key rendering.
    pub nested_format: NestedFormat,
}

impl QuerySettings {
    /// Default conventions: comma arrays, bracket nesting.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            array_format: ArrayFormat::Comma,
            nested_format: NestedFormat::Brackets,
        }
    }

    /// Set the array format.
    #[must_use]
    pub const fn with_array_format(mut self, array_format: ArrayFormat) -> Self {
        self.array_format = array_format;
        self
    }

    /// Set the nested format.
    #[must_use]
    pub const fn with_nested_format(mut self, nested_format: NestedFormat) -> Self {
        self.nested_format = nested_format;
        self
    }
}

/// A value that cannot be expressed as query parameters.
#[derive(Debug, Display, Error)]
#[display("{_0}")]
pub struct QueryError(#[error(not(source))] String);

impl ser::Error for QueryError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

impl From<QueryError> for crate::Error {
    fn from(error: QueryError) -> Self {
        Self::encoding(format!("query: {error}"))
    }
}

/// Escape `%` and `,` in a single query key or value.
///
/// Every pair handed to [`encode_pairs`] must go through this first.
#[must_use]
pub fn escape_component(text: &str) -> String {
    text.replace('%', "%25").replace(',', "%2C")
}

/// Flatten a value into `(key, value)` pairs, each component escaped with
/// [`escape_component`].
///
/// # Errors
///
/// Returns [`Error::Encoding`](crate::Error::Encoding) when the top-level
/// value is not a struct or map, or a map key is not a scalar.
pub fn to_query_pairs<T: Serialize + ?Sized>(
    value: &T,
    settings: QuerySettings,
) -> crate::Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    match value.serialize(NodeSerializer)? {
        Node::Object(fields) => {
            for (name, node) in fields {
                flatten(escape_component(&name), node, settings, &mut pairs);
            }
        }
        Node::Null => {}
        Node::Leaf(_) | Node::List(_) => {
            return Err(QueryError("top-level value must be a struct or map".to_string()).into());
        }
    }
    Ok(pairs)
}

/// Serialize a value into a percent-encoded query string (without `?`).
///
/// # Errors
///
/// Same as [`to_query_pairs`].
pub fn to_query_string<T: Serialize + ?Sized>(
    value: &T,
    settings: QuerySettings,
) -> crate::Result<String> {
    let pairs = to_query_pairs(value, settings)?;
    Ok(encode_pairs(&pairs))
}

/// Percent-encode escaped pairs into a query string.
#[must_use]
pub fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, QUERY),
                utf8_percent_encode(value, QUERY)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

// ============================================================================
// Flattening
// ============================================================================

#[derive(Debug)]
enum Node {
    Null,
    Leaf(String),
    List(Vec<Node>),
    Object(Vec<(String, Node)>),
}

impl Node {
    const fn is_scalar(&self) -> bool {
        matches!(self, Self::Null | Self::Leaf(_))
    }
}

fn nested_key(parent: &str, child: &str, settings: QuerySettings) -> String {
    match settings.nested_format {
        NestedFormat::Brackets => format!("{parent}[{child}]"),
        NestedFormat::Dots => format!("{parent}.{child}"),
    }
}

fn flatten(key: String, node: Node, settings: QuerySettings, out: &mut Vec<(String, String)>) {
    match node {
        Node::Null => out.push((key, String::new())),
        Node::Leaf(value) => out.push((key, escape_component(&value))),
        Node::Object(fields) => {
            for (name, child) in fields {
                let child_key = nested_key(&key, &escape_component(&name), settings);
                flatten(child_key, child, settings, out);
            }
        }
        Node::List(items) if items.is_empty() => {}
        Node::List(items) => match settings.array_format {
            ArrayFormat::Comma if items.iter().all(Node::is_scalar) => {
                let joined = items
                    .into_iter()
                    .map(|item| match item {
                        Node::Leaf(value) => escape_component(&value),
                        _ => String::new(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                out.push((key, joined));
            }
            ArrayFormat::Comma | ArrayFormat::Indices => {
                for (index, item) in items.into_iter().enumerate() {
                    flatten(format!("{key}[{index}]"), item, settings, out);
                }
            }
            ArrayFormat::Repeat => {
                for item in items {
                    flatten(key.clone(), item, settings, out);
                }
            }
            ArrayFormat::Brackets => {
                for item in items {
                    flatten(format!("{key}[]"), item, settings, out);
                }
            }
        },
    }
}

// ============================================================================
// Serializer
// ============================================================================

struct NodeSerializer;

type NodeResult = Result<Node, QueryError>;

fn leaf(value: impl ToString) -> NodeResult {
    Ok(Node::Leaf(value.to_string()))
}

fn tagged(variant: &'static str, node: Node) -> Node {
    Node::Object(vec![(variant.to_string(), node)])
}

impl ser::Serializer for NodeSerializer {
    type Ok = Node;
    type Error = QueryError;

    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = SeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = StructBuilder;
    type SerializeStructVariant = StructBuilder;

    fn serialize_bool(self, v: bool) -> NodeResult {
        leaf(v)
    }

    fn serialize_i8(self, v: i8) -> NodeResult {
        leaf(v)
    }

    fn serialize_i16(self, v: i16) -> NodeResult {
        leaf(v)
    }

    fn serialize_i32(self, v: i32) -> NodeResult {
        leaf(v)
    }

    fn serialize_i64(self, v: i64) -> NodeResult {
        leaf(v)
    }

    fn serialize_i128(self, v: i128) -> NodeResult {
        leaf(v)
    }

    fn serialize_u8(self, v: u8) -> NodeResult {
        leaf(v)
    }

    fn serialize_u16(self, v: u16) -> NodeResult {
        leaf(v)
    }

    fn serialize_u32(self, v: u32) -> NodeResult {
        leaf(v)
    }

    fn serialize_u64(self, v: u64) -> NodeResult {
        leaf(v)
    }

    fn serialize_u128(self, v: u128) -> NodeResult {
        leaf(v)
    }

    fn serialize_f32(self, v: f32) -> NodeResult {
        leaf(v)
    }

    fn serialize_f64(self, v: f64) -> NodeResult {
        leaf(v)
    }

    fn serialize_char(self, v: char) -> NodeResult {
        leaf(v)
    }

    fn serialize_str(self, v: &str) -> NodeResult {
        leaf(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> NodeResult {
        Ok(Node::List(
            v.iter().map(|byte| Node::Leaf(byte.to_string())).collect(),
        ))
    }

    fn serialize_none(self) -> NodeResult {
        Ok(Node::Null)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> NodeResult {
        value.serialize(self)
    }

    fn serialize_unit(self) -> NodeResult {
        Ok(Node::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> NodeResult {
        Ok(Node::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> NodeResult {
        leaf(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> NodeResult {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> NodeResult {
        Ok(tagged(variant, value.serialize(self)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, QueryError> {
        Ok(SeqBuilder::new(len.unwrap_or_default(), None))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, QueryError> {
        Ok(SeqBuilder::new(len, None))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, QueryError> {
        Ok(SeqBuilder::new(len, None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, QueryError> {
        Ok(SeqBuilder::new(len, Some(variant)))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapBuilder, QueryError> {
        Ok(MapBuilder {
            entries: Vec::with_capacity(len.unwrap_or_default()),
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<StructBuilder, QueryError> {
        Ok(StructBuilder::new(len, None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<StructBuilder, QueryError> {
        Ok(StructBuilder::new(len, Some(variant)))
    }
}

struct SeqBuilder {
    items: Vec<Node>,
    variant: Option<&'static str>,
}

impl SeqBuilder {
    fn new(len: usize, variant: Option<&'static str>) -> Self {
        Self {
            items: Vec::with_capacity(len),
            variant,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        self.items.push(value.serialize(NodeSerializer)?);
        Ok(())
    }

    fn finish(self) -> NodeResult {
        let list = Node::List(self.items);
        Ok(match self.variant {
            Some(variant) => tagged(variant, list),
            None => list,
        })
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Node;
    type Error = QueryError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        self.push(value)
    }

    fn end(self) -> NodeResult {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Node;
    type Error = QueryError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        self.push(value)
    }

    fn end(self) -> NodeResult {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Node;
    type Error = QueryError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        self.push(value)
    }

    fn end(self) -> NodeResult {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SeqBuilder {
    type Ok = Node;
    type Error = QueryError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        self.push(value)
    }

    fn end(self) -> NodeResult {
        self.finish()
    }
}

struct MapBuilder {
    entries: Vec<(String, Node)>,
    pending_key: Option<String>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Node;
    type Error = QueryError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), QueryError> {
        match key.serialize(NodeSerializer)? {
            Node::Leaf(key) => {
                self.pending_key = Some(key);
                Ok(())
            }
            _ => Err(QueryError("map keys must be scalars".to_string())),
        }
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), QueryError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| QueryError("map value without a key".to_string()))?;
        self.entries.push((key, value.serialize(NodeSerializer)?));
        Ok(())
    }

    fn end(mut self) -> NodeResult {
        self.entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(Node::Object(self.entries))
    }
}

struct StructBuilder {
    fields: Vec<(String, Node)>,
    variant: Option<&'static str>,
}

impl StructBuilder {
    fn new(len: usize, variant: Option<&'static str>) -> Self {
        Self {
            fields: Vec::with_capacity(len),
            variant,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), QueryError> {
        self.fields
            .push((key.to_string(), value.serialize(NodeSerializer)?));
        Ok(())
    }

    fn finish(self) -> NodeResult {
        let object = Node::Object(self.fields);
        Ok(match self.variant {
            Some(variant) => tagged(variant, object),
            None => object,
        })
    }
}

impl ser::SerializeStruct for StructBuilder {
    type Ok = Node;
    type Error = QueryError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), QueryError> {
        self.push(key, value)
    }

    fn end(self) -> NodeResult {
        self.finish()
    }
}

impl ser::SerializeStructVariant for StructBuilder {
    type Ok = Node;
    type Error = QueryError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), QueryError> {
        self.push(key, value)
    }

    fn end(self) -> NodeResult {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use assert2::{check, let_assert};
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::Serialize;

    use super::*;
    use crate::{Error, Field};

    #[derive(Serialize)]
    struct Nested {
        a: Inner,
    }

    #[derive(Serialize)]
    struct Inner {
        b: u32,
    }

    #[derive(Serialize)]
    struct Tags {
        tags: Vec<&'static str>,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "snake_case")]
    enum Status {
        Pending,
        Complete,
    }

    #[derive(Serialize)]
    struct TimeRange {
        #[serde(skip_serializing_if = "Field::is_omitted")]
        after: Field<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Field::is_omitted")]
        before: Field<DateTime<Utc>>,
    }

    #[derive(Serialize)]
    struct ListTransactions {
        #[serde(skip_serializing_if = "Field::is_omitted")]
        account_id: Field<String>,
        #[serde(skip_serializing_if = "Field::is_omitted")]
        created_at: Field<TimeRange>,
        #[serde(skip_serializing_if = "Field::is_omitted")]
        status: Field<Vec<Status>>,
        #[serde(skip_serializing_if = "Field::is_omitted")]
        cursor: Field<String>,
        #[serde(skip_serializing_if = "Field::is_omitted")]
        limit: Field<u32>,
    }

    fn settings(array_format: ArrayFormat, nested_format: NestedFormat) -> QuerySettings {
        QuerySettings::new()
            .with_array_format(array_format)
            .with_nested_format(nested_format)
    }

    fn timestamp(value: &str) -> DateTime<Utc> {
        value.parse().expect("valid timestamp")
    }

    #[test]
    fn nested_formats() {
        let value = Nested { a: Inner { b: 1 } };

        let dots = to_query_string(&value, settings(ArrayFormat::Comma, NestedFormat::Dots))
            .expect("query");
        check!(dots == "a.b=1");

        let brackets = to_query_string(&value, QuerySettings::default()).expect("query");
        insta::assert_snapshot!(brackets, @"a[b]=1");
    }

    #[test]
    fn array_formats() {
        let value = Tags {
            tags: vec!["ach", "wire"],
        };
        let render = |format| {
            to_query_string(&value, settings(format, NestedFormat::Brackets)).expect("query")
        };

        check!(render(ArrayFormat::Comma) == "tags=ach,wire");
        check!(render(ArrayFormat::Repeat) == "tags=ach&tags=wire");
        check!(render(ArrayFormat::Brackets) == "tags[]=ach&tags[]=wire");
        check!(render(ArrayFormat::Indices) == "tags[0]=ach&tags[1]=wire");
    }

    #[test]
    fn empty_arrays_emit_nothing() {
        let value = Tags { tags: vec![] };
        check!(to_query_string(&value, QuerySettings::default()).expect("query") == "");
    }

    #[test]
    fn comma_arrays_of_objects_use_indices() {
        #[derive(Serialize)]
        struct Lines {
            lines: Vec<Inner>,
        }

        let value = Lines {
            lines: vec![Inner { b: 1 }, Inner { b: 2 }],
        };
        let pairs = to_query_pairs(&value, QuerySettings::default()).expect("query");
        check!(
            pairs
                == vec![
                    ("lines[0][b]".to_string(), "1".to_string()),
                    ("lines[1][b]".to_string(), "2".to_string()),
                ]
        );
    }

    #[test]
    fn omitted_fields_are_skipped_and_nulls_are_empty() {
        let params = ListTransactions {
            account_id: Field::present("acct_1".to_string()),
            created_at: Field::present(TimeRange {
                after: Field::present(timestamp("2024-01-01T00:00:00Z")),
                before: Field::omitted(),
            }),
            status: Field::omitted(),
            cursor: Field::null(),
            limit: Field::present(25),
        };

        let query = to_query_string(&params, QuerySettings::default()).expect("query");
        check!(
            query
                == "account_id=acct_1&created_at[after]=2024-01-01T00%3A00%3A00Z&cursor=&limit=25"
        );

        let dotted = to_query_pairs(&params, settings(ArrayFormat::Comma, NestedFormat::Dots))
            .expect("query");
        check!(dotted.get(1).map(|(key, _)| key.as_str()) == Some("created_at.after"));
    }

    #[test]
    fn enums_and_dates_render_as_strings() {
        #[derive(Serialize)]
        struct Filter {
            status: Vec<Status>,
            on: NaiveDate,
            settled: bool,
        }

        let value = Filter {
            status: vec![Status::Pending, Status::Complete],
            on: NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date"),
            settled: false,
        };
        let query = to_query_string(&value, QuerySettings::default()).expect("query");
        check!(query == "status=pending,complete&on=2024-02-29&settled=false");
    }

    #[test]
    fn maps_are_sorted_and_output_is_deterministic() {
        let mut metadata = HashMap::new();
        for key in ["zeta", "alpha", "mid", "beta", "omega"] {
            metadata.insert(key.to_string(), key.len());
        }
        let mut value = BTreeMap::new();
        value.insert("metadata", metadata);

        for array_format in [ArrayFormat::Comma, ArrayFormat::Repeat] {
            for nested_format in [NestedFormat::Brackets, NestedFormat::Dots] {
                let settings = settings(array_format, nested_format);
                let first = to_query_string(&value, settings).expect("query");
                for _ in 0..10 {
                    check!(to_query_string(&value, settings).expect("query") == first);
                }
            }
        }

        let query = to_query_string(&value, QuerySettings::default()).expect("query");
        check!(
            query
                == "metadata[alpha]=5&metadata[beta]=4&metadata[mid]=3&metadata[omega]=5&metadata[zeta]=4"
        );
    }

    #[test]
    fn values_are_percent_encoded() {
        let mut value = BTreeMap::new();
        value.insert("description", "Rent & utilities/May");
        let query = to_query_string(&value, QuerySettings::default()).expect("query");
        check!(query == "description=Rent%20%26%20utilities%2FMay");
    }

    #[test]
    fn commas_inside_values_are_not_separators() {
        #[derive(Serialize)]
        struct Search {
            memo: &'static str,
            tags: Vec<&'static str>,
        }

        let value = Search {
            memo: "a,b",
            tags: vec!["a,b", "c"],
        };
        let query = to_query_string(&value, QuerySettings::default()).expect("query");
        check!(query == "memo=a%2Cb&tags=a%2Cb,c");

        let two = Tags { tags: vec!["a", "b"] };
        check!(to_query_string(&two, QuerySettings::default()).expect("query") == "tags=a,b");

        let repeat = to_query_string(&value, settings(ArrayFormat::Repeat, NestedFormat::Brackets))
            .expect("query");
        check!(repeat == "memo=a%2Cb&tags=a%2Cb&tags=c");
    }

    #[test]
    fn percent_signs_are_escaped_once() {
        let mut value = BTreeMap::new();
        value.insert("rate", vec!["5%", "100% off"]);
        let query = to_query_string(&value, QuerySettings::default()).expect("query");
        check!(query == "rate=5%25,100%25%20off");

        check!(escape_component("a,b%") == "a%2Cb%25");
        check!(encode_pairs(&[("note".to_string(), escape_component("50%,ok"))]) == "note=50%25%2Cok");
    }

    #[test]
    fn top_level_must_be_struct_or_map() {
        let_assert!(Err(Error::Encoding(message)) = to_query_string(&42, QuerySettings::default()));
        check!(message.contains("struct or map"));

        check!(to_query_string(&(), QuerySettings::default()).expect("unit") == "");
        check!(to_query_string(&None::<Tags>, QuerySettings::default()).expect("none") == "");
    }

    #[test]
    fn non_scalar_map_keys_are_rejected() {
        let mut value = BTreeMap::new();
        value.insert(vec![1, 2], "x");
        let_assert!(Err(Error::Encoding(_)) = to_query_string(&value, QuerySettings::default()));
    }
}
