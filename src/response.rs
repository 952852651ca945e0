//! Gateway reply model.
//!
//! A [`Response`] owns the decoded `/RESPONSE/FIELDS/*` map, the raw HTTP
//! reply it came from, and the request fields that produced it. Everything the
//! gateway reports about the outcome of a call, including rejected input, is
//! read from here. Nothing in this module fails: absent fields are `None` or
//! empty, and error text that does not follow the gateway's usual phrasing
//! yields empty results.

use http::{HeaderMap, StatusCode};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::str::FromStr;

use crate::error::XmlError;
use crate::xml::{self, FieldMap, FieldValue, RequestFields};

/// Prefix of the gateway's "missing required fields" error. Two trailing spaces.
const MISSING_FIELDS_LABEL: &str = "Required Fields Missing:  ";

/// Serialized key of the caller's request fields.
pub(crate) const ORIGINAL_ARGS: &str = "original_args";

/// Prefix for gateway fields whose names collide with a serialized entry.
const RESERVED_KEY_PREFIX: &str = "gateway_";

/// Generates `fn name(&self) -> Option<&str>` accessors reading the field of the same name.
macro_rules! text_accessors {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name(&self) -> Option<&str> {
                self.get_str(stringify!($name))
            }
        )*
    };
}

pub(crate) use text_accessors;

/// The HTTP reply a [`Response`] was decoded from.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// A field the gateway rejected, parsed from its error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidField {
    pub value: String,
    pub message: String,
}

/// A decoded gateway reply. Immutable once built.
///
/// Serializes as the gateway fields followed by `original_args`. A gateway
/// field whose name is reserved for the added entries is written with a
/// `gateway_` prefix so the output never repeats a key.
#[derive(Debug, Clone)]
pub struct Response {
    fields: FieldMap,
    original_args: RequestFields,
    raw: RawResponse,
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        serialize_fields(&mut map, &self.fields, &[ORIGINAL_ARGS])?;
        map.serialize_entry(ORIGINAL_ARGS, &self.original_args)?;
        map.end()
    }
}

/// Writes `fields` into `map`, prefixing any key listed in `reserved`.
pub(crate) fn serialize_fields<M: SerializeMap>(
    map: &mut M,
    fields: &FieldMap,
    reserved: &[&str],
) -> Result<(), M::Error> {
    for (key, value) in fields {
        if reserved.contains(&key.as_str()) {
            map.serialize_entry(&format!("{RESERVED_KEY_PREFIX}{key}"), value)?;
        } else {
            map.serialize_entry(key, value)?;
        }
    }
    Ok(())
}

impl Response {
    /// Decodes the body of `raw`.
    ///
    /// Fails only if the body is not well-formed XML. A well-formed body without
    /// `/RESPONSE/FIELDS` gives an empty field map.
    pub fn from_raw(raw: RawResponse, original_args: RequestFields) -> Result<Self, XmlError> {
        let fields = xml::decode_response(&raw.body)?;
        Ok(Self::from_fields(raw, fields, original_args))
    }

    /// Wraps an already decoded field map.
    pub fn from_fields(raw: RawResponse, fields: FieldMap, original_args: RequestFields) -> Self {
        Self {
            fields,
            original_args,
            raw,
        }
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn raw(&self) -> &RawResponse {
        &self.raw
    }

    /// The caller-supplied request fields, without credentials or `operation_type`.
    pub fn original_args(&self) -> &RequestFields {
        &self.original_args
    }

    pub fn into_parts(self) -> (FieldMap, RawResponse, RequestFields) {
        (self.fields, self.raw, self.original_args)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Text of a leaf field. `None` if absent or nested.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    /// Text of a leaf field, or `""`.
    pub fn text(&self, key: &str) -> &str {
        self.get_str(key).unwrap_or_default()
    }

    /// A field parsed as a non-negative count.
    pub fn count(&self, key: &str) -> Option<usize> {
        self.get_str(key)?.trim().parse().ok()
    }

    /// A field parsed as a decimal amount.
    pub fn amount(&self, key: &str) -> Option<Decimal> {
        Decimal::from_str(self.get_str(key)?.trim()).ok()
    }

    text_accessors! {
        /// `1` on success, `0` when the request was rejected, `2` on decline.
        status,
        /// `APPROVED`, `DECLINED`, or a gateway-specific message.
        auth_response,
        auth_code,
        avs_code,
        cvv2_code,
        reference_number,
        order_id,
        cim_ref_num,
        trans_type,
    }

    pub fn records_found(&self) -> Option<usize> {
        self.count("records_found")
    }

    pub fn total_transactions_voided(&self) -> Option<usize> {
        self.count("total_transactions_voided")
    }

    pub fn total_transactions_settled(&self) -> Option<usize> {
        self.count("total_transactions_settled")
    }

    pub fn total_transactions_credited(&self) -> Option<usize> {
        self.count("total_transactions_credited")
    }

    pub fn total_amount_settled(&self) -> Option<Decimal> {
        self.amount("total_amount_settled")
    }

    /// `true` iff `status` is exactly `"1"`.
    pub fn is_successful(&self) -> bool {
        self.status() == Some("1")
    }

    /// `true` iff `status` is exactly `"0"`.
    pub fn was_request_bad(&self) -> bool {
        self.status() == Some("0")
    }

    /// The `error` field with surrounding whitespace removed.
    pub fn error(&self) -> &str {
        self.text("error").trim()
    }

    /// Field names listed in a "Required Fields Missing" error.
    ///
    /// The list runs from the label to the first `.` and is split on single
    /// spaces. Empty unless the request was rejected with that error.
    pub fn missing_fields(&self) -> Vec<String> {
        if !self.was_request_bad() {
            return Vec::new();
        }
        let Some(rest) = self.error().strip_prefix(MISSING_FIELDS_LABEL) else {
            return Vec::new();
        };
        let list = rest.split_once('.').map_or(rest, |(list, _)| list);
        list.split(' ').map(str::to_string).collect()
    }

    /// Fields named in `Invalid <name>...` clauses of the error text, in order.
    ///
    /// Each clause carries a name, a value and a message separated by `": "`
    /// and `". "`. Whichever delimiter comes first ends the name, the other
    /// splits value from message. Empty unless the request was rejected.
    pub fn invalid_fields(&self) -> IndexMap<String, InvalidField> {
        if !self.was_request_bad() {
            return IndexMap::new();
        }
        self.error()
            .split("Invalid ")
            .skip(1)
            .map(str::trim)
            .filter_map(parse_invalid_field)
            .collect()
    }
}

fn parse_invalid_field(clause: &str) -> Option<(String, InvalidField)> {
    const COLON: &str = ": ";
    const PERIOD: &str = ". ";

    let (name_delimiter, value_delimiter) = match (clause.find(COLON), clause.find(PERIOD)) {
        (Some(colon), Some(period)) if period < colon => (PERIOD, COLON),
        (Some(_), _) => (COLON, PERIOD),
        (None, Some(_)) => (PERIOD, COLON),
        (None, None) => return None,
    };
    let (name, rest) = clause.split_once(name_delimiter)?;
    let (value, message) = rest.split_once(value_delimiter).unwrap_or((rest, ""));
    Some((
        name.to_string(),
        InvalidField {
            value: value.to_string(),
            message: message.to_string(),
        },
    ))
}
