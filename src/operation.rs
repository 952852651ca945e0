//! Gateway operation names and the per-operation layout of batch replies.

use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::response::Response;
use crate::xml::RequestFields;

/// Request field carrying the number of records in a batch request.
pub const TOTAL_NUMBER_TRANSACTIONS: &str = "total_number_transactions";

/// An `operation_type` understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Sale,
    Auth,
    Query,
    Void,
    Settle,
    Credit,
    CimQuery,
    CimSale,
    /// A plain sale that also creates or updates the CIM record named by `cim_ref_num`.
    CimSaleAndSave,
    CimInsert,
    CimEdit,
    CimDelete,
    RecurringModify,
}

impl Operation {
    /// The value sent as `operation_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Sale => "Sale",
            Operation::Auth => "Auth",
            Operation::Query => "Query",
            Operation::Void => "void",
            Operation::Settle => "settle",
            Operation::Credit => "credit",
            Operation::CimQuery => "cim_query",
            Operation::CimSale => "cim_sale",
            Operation::CimSaleAndSave => "sale",
            Operation::CimInsert => "cim_insert",
            Operation::CimEdit => "cim_edit",
            Operation::CimDelete => "cim_delete",
            Operation::RecurringModify => "recurring_modify",
        }
    }

    /// How the reply is split into records, for operations that act on a batch.
    pub fn batch_layout(&self) -> Option<&'static BatchLayout> {
        match self {
            Operation::Query => Some(&BatchLayout::QUERY),
            Operation::Void => Some(&BatchLayout::VOID),
            Operation::Settle => Some(&BatchLayout::SETTLE),
            Operation::Credit => Some(&BatchLayout::CREDIT),
            _ => None,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    /// Parses the snake_case operation name, e.g. `cim_sale_and_save`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let operation = match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "sale" => Operation::Sale,
            "auth" => Operation::Auth,
            "query" => Operation::Query,
            "void" => Operation::Void,
            "settle" => Operation::Settle,
            "credit" => Operation::Credit,
            "cim_query" => Operation::CimQuery,
            "cim_sale" => Operation::CimSale,
            "cim_sale_and_save" => Operation::CimSaleAndSave,
            "cim_insert" => Operation::CimInsert,
            "cim_edit" => Operation::CimEdit,
            "cim_delete" => Operation::CimDelete,
            "recurring_modify" => Operation::RecurringModify,
            _ => return Err(format!("unknown operation '{s}'")),
        };
        Ok(operation)
    }
}

/// Where the number of records in a batch reply comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCount {
    /// A count reported by the gateway, e.g. `records_found`.
    ResponseField(&'static str),
    /// A count declared in the request, e.g. `total_number_transactions`.
    RequestField(&'static str),
}

impl RecordCount {
    /// Reads the count. Absent or non-numeric values count as zero.
    pub fn resolve(&self, response: &Response) -> usize {
        let (source, key, raw) = match self {
            RecordCount::ResponseField(key) => ("response", *key, response.get_str(key)),
            RecordCount::RequestField(key) => (
                "request",
                *key,
                response.original_args().get(*key).map(String::as_str),
            ),
        };
        let Some(raw) = raw else {
            return 0;
        };
        match raw.trim().parse() {
            Ok(count) => count,
            Err(_) => {
                tracing::warn!(source, field = key, value = raw, "Record count is not numeric");
                0
            }
        }
    }
}

/// Per-record field names of a batch reply and where its record count comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLayout {
    /// Field names that appear once per record with a `1..=count` suffix.
    pub templates: &'static [&'static str],
    pub count: RecordCount,
}

impl BatchLayout {
    pub const QUERY: BatchLayout = BatchLayout {
        templates: &[
            "trans_type",
            "trans_status",
            "settled",
            "credit_void",
            "order_id",
            "reference_number",
            "trans_time",
            "card_type",
            "amount",
            "amount_settled",
            "amount_credited",
            "posted_by",
            "signature",
            "error",
        ],
        count: RecordCount::ResponseField("records_found"),
    };

    pub const VOID: BatchLayout = BatchLayout {
        templates: &["status", "response", "reference_number", "error"],
        count: RecordCount::RequestField(TOTAL_NUMBER_TRANSACTIONS),
    };

    pub const SETTLE: BatchLayout = BatchLayout {
        templates: &[
            "status",
            "response",
            "reference_number",
            "batch_number",
            "settle_amount",
            "error",
        ],
        count: RecordCount::RequestField(TOTAL_NUMBER_TRANSACTIONS),
    };

    pub const CREDIT: BatchLayout = BatchLayout {
        templates: &[
            "status",
            "response",
            "reference_number",
            "credit_amount",
            "error",
        ],
        count: RecordCount::RequestField(TOTAL_NUMBER_TRANSACTIONS),
    };
}

/// Builds the request fields of a batch call.
///
/// Each record's fields get the record's 1-based position as a suffix, and
/// `total_number_transactions` is set to the number of records.
///
/// ```
/// use first_american_xml::operation::BatchFields;
///
/// let fields = BatchFields::new()
///     .record([("reference_number", "A"), ("settle_amount", "1.00")])
///     .record([("reference_number", "B"), ("settle_amount", "2.50")])
///     .build();
/// assert_eq!(fields["total_number_transactions"], "2");
/// assert_eq!(fields["settle_amount2"], "2.50");
/// ```
#[derive(Debug, Clone, Default)]
pub struct BatchFields {
    records: Vec<Vec<(String, String)>>,
    extra: RequestFields,
}

impl BatchFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record.
    pub fn record<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.records.push(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        );
        self
    }

    /// Adds a field sent once for the whole batch.
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn build(self) -> RequestFields {
        let mut fields = RequestFields::new();
        fields.insert(
            TOTAL_NUMBER_TRANSACTIONS.to_string(),
            self.records.len().to_string(),
        );
        for (i, record) in self.records.into_iter().enumerate() {
            for (key, value) in record {
                fields.insert(format!("{key}{}", i + 1), value);
            }
        }
        fields.extend(self.extra);
        fields
    }
}

impl From<BatchFields> for RequestFields {
    fn from(value: BatchFields) -> Self {
        value.build()
    }
}
