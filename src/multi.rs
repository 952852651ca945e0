//! Grouping of batch replies into per-transaction records.
//!
//! Batch operations (query, void, settle, credit) describe several
//! transactions in one flat reply by suffixing field names with the record's
//! 1-based position: `status1`, `reference_number1`, `status2`, ...
//! [`MultiRecordResponse`] splits such a reply into the fields that describe
//! the whole batch and an ordered list of [`TransactionRecord`]s.
//!
//! Two strategies exist:
//!
//! - [`GroupingStrategy::Templates`] (primary) reads `templateN` for a known
//!   list of templates and a known record count. It always yields exactly
//!   `record_count` records, filling absent fields with `""`.
//! - [`GroupingStrategy::SuffixScan`] (heuristic) infers records from any
//!   key ending in the expected index. A batch-level field whose name happens
//!   to end in that index is misfiled as a record field, so use it only when
//!   the templates are not known.

use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::str::FromStr;

use crate::operation::BatchLayout;
use crate::response::{ORIGINAL_ARGS, RawResponse, Response, serialize_fields, text_accessors};
use crate::xml::{FieldMap, FieldValue, RequestFields};

const TRANSACTIONS: &str = "transactions";

/// One transaction within a batch reply, keyed by un-suffixed field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TransactionRecord(FieldMap);

impl TransactionRecord {
    pub fn new(fields: FieldMap) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.0
    }

    pub fn into_fields(self) -> FieldMap {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    pub fn text(&self, key: &str) -> &str {
        self.get_str(key).unwrap_or_default()
    }

    pub fn amount(&self, key: &str) -> Option<Decimal> {
        Decimal::from_str(self.get_str(key)?.trim()).ok()
    }

    text_accessors! {
        status,
        response,
        reference_number,
        batch_number,
        trans_type,
        trans_status,
        settled,
        credit_void,
        order_id,
        trans_time,
        card_type,
        posted_by,
        signature,
    }

    pub fn settle_amount(&self) -> Option<Decimal> {
        self.amount("settle_amount")
    }

    pub fn credit_amount(&self) -> Option<Decimal> {
        self.amount("credit_amount")
    }

    /// `true` iff this record's `status` is exactly `"1"`.
    pub fn is_successful(&self) -> bool {
        self.status() == Some("1")
    }

    pub fn error(&self) -> &str {
        self.text("error").trim()
    }

    fn insert<K: Into<String>>(&mut self, key: K, value: FieldValue) {
        self.0.insert(key.into(), value);
    }
}

/// How a flat batch reply is split into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingStrategy<'a> {
    /// Read `templateN` for every template and every `N` in `1..=record_count`.
    Templates {
        templates: &'a [&'a str],
        record_count: usize,
    },
    /// Infer records from trailing-digit suffixes. See [`group_by_suffix_scan`].
    SuffixScan,
}

/// A batch reply: batch-level fields plus ordered transaction records.
///
/// Serializes as the batch-level fields followed by `original_args` and
/// `transactions`; see [`Response`] for how colliding field names are written.
#[derive(Debug, Clone)]
pub struct MultiRecordResponse {
    summary: Response,
    transactions: Vec<TransactionRecord>,
}

impl Serialize for MultiRecordResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        serialize_fields(&mut map, self.summary.fields(), &[ORIGINAL_ARGS, TRANSACTIONS])?;
        map.serialize_entry(ORIGINAL_ARGS, self.summary.original_args())?;
        map.serialize_entry(TRANSACTIONS, &self.transactions)?;
        map.end()
    }
}

impl MultiRecordResponse {
    /// Regroups `response` with the given strategy.
    pub fn from_response(response: Response, strategy: GroupingStrategy<'_>) -> Self {
        let (fields, raw, original_args) = response.into_parts();
        let (scalars, transactions) = match strategy {
            GroupingStrategy::Templates {
                templates,
                record_count,
            } => group_by_templates(fields, record_count, templates),
            GroupingStrategy::SuffixScan => group_by_suffix_scan(fields),
        };
        tracing::debug!(
            records = transactions.len(),
            batch_fields = scalars.len(),
            "Grouped batch reply"
        );
        Self::from_parts(raw, scalars, transactions, original_args)
    }

    /// Regroups `response` using an operation's templates and record count source.
    pub fn from_layout(response: Response, layout: &BatchLayout) -> Self {
        let record_count = layout.count.resolve(&response);
        to_multi_record(response, record_count, layout.templates)
    }

    pub fn from_parts(
        raw: RawResponse,
        fields: FieldMap,
        transactions: Vec<TransactionRecord>,
        original_args: RequestFields,
    ) -> Self {
        Self {
            summary: Response::from_fields(raw, fields, original_args),
            transactions,
        }
    }

    /// The batch-level fields, with every grouped field removed.
    pub fn summary(&self) -> &Response {
        &self.summary
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub fn into_transactions(self) -> Vec<TransactionRecord> {
        self.transactions
    }

    pub fn fields(&self) -> &FieldMap {
        self.summary.fields()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.summary.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.summary.get_str(key)
    }

    pub fn raw(&self) -> &RawResponse {
        self.summary.raw()
    }

    pub fn original_args(&self) -> &RequestFields {
        self.summary.original_args()
    }

    pub fn is_successful(&self) -> bool {
        self.summary.is_successful()
    }

    pub fn error(&self) -> &str {
        self.summary.error()
    }
}

/// Regroups `response` into exactly `record_count` records of `templates`.
pub fn to_multi_record(
    response: Response,
    record_count: usize,
    templates: &[&str],
) -> MultiRecordResponse {
    MultiRecordResponse::from_response(
        response,
        GroupingStrategy::Templates {
            templates,
            record_count,
        },
    )
}

/// Moves `templateN` for `N` in `1..=record_count` out of `fields` into records.
///
/// Returns the remaining fields, in their original order, and the records.
/// Absent `templateN` fields become `""` in record `N`.
///
/// `record_count` is taken as given, so the work and memory are
/// `record_count * templates.len()` regardless of how many numbered fields
/// the reply actually carries. A count above the highest numbered template
/// field present is logged as a warning.
pub fn group_by_templates(
    mut fields: FieldMap,
    record_count: usize,
    templates: &[&str],
) -> (FieldMap, Vec<TransactionRecord>) {
    let highest = highest_template_index(&fields, templates);
    if record_count > highest {
        tracing::warn!(
            record_count,
            highest_index = highest,
            "Record count exceeds the numbered fields in the reply"
        );
    }
    let transactions = (1..=record_count)
        .map(|n| {
            let mut record = TransactionRecord::default();
            for template in templates {
                let value = fields
                    .shift_remove(&format!("{template}{n}"))
                    .unwrap_or_default();
                record.insert(*template, value);
            }
            record
        })
        .collect();
    (fields, transactions)
}

/// Groups keys by trailing index without knowing the templates.
///
/// Walks `fields` in order, expecting index 1 first. A key whose trailing
/// digits equal the expected index, or the next one once a record exists,
/// goes into that record under its name without the digits. Keys seen before
/// the first match stay batch-level. After the first key that matches
/// neither index, grouping stops and every later key stays batch-level.
pub fn group_by_suffix_scan(fields: FieldMap) -> (FieldMap, Vec<TransactionRecord>) {
    let mut scalars = FieldMap::new();
    let mut transactions: Vec<TransactionRecord> = Vec::new();
    let mut index = 1;
    let mut scanning = true;

    for (key, value) in fields {
        if scanning {
            let matched = split_index_suffix(&key).filter(|(_, n)| {
                *n == index || (!transactions.is_empty() && *n == index + 1)
            });
            if let Some((name, n)) = matched {
                index = n;
                if transactions.len() < index {
                    transactions.push(TransactionRecord::default());
                }
                transactions[index - 1].insert(name, value);
                continue;
            }
            if !transactions.is_empty() {
                scanning = false;
            }
        }
        scalars.insert(key, value);
    }
    (scalars, transactions)
}

/// The largest `N` among `templateN` keys in `fields`, or 0.
fn highest_template_index(fields: &FieldMap, templates: &[&str]) -> usize {
    fields
        .keys()
        .filter_map(|key| split_index_suffix(key))
        .filter(|(name, _)| templates.contains(name))
        .map(|(_, index)| index)
        .max()
        .unwrap_or(0)
}

/// Splits `status12` into `("status", 12)`. `None` without a non-empty name and digits.
fn split_index_suffix(key: &str) -> Option<(&str, usize)> {
    let name = key.trim_end_matches(|c: char| c.is_ascii_digit());
    if name.is_empty() || name.len() == key.len() {
        return None;
    }
    let index = key[name.len()..].parse().ok()?;
    Some((name, index))
}
