//! The gateway client.
//!
//! [`Gateway`] merges the configured credentials into each request, encodes
//! it, hands it to a [`Transport`], and decodes the reply. Batch operations
//! come back as a [`MultiRecordResponse`]; everything else as a [`Response`].
//!
//! ```rust,no_run
//! use first_american_xml::config::{CredentialSet, Credentials, GatewayConfig};
//! use first_american_xml::gateway::Gateway;
//! use first_american_xml::xml::RequestFields;
//!
//! # async fn run() -> Result<(), first_american_xml::error::GatewayError> {
//! let config = GatewayConfig::new(CredentialSet::Production(Credentials::new(
//!     "center", "gateway", "processor",
//! )));
//! let gateway = Gateway::new(&config);
//!
//! let mut sale = RequestFields::new();
//! sale.insert("order_id".into(), "A-1".into());
//! sale.insert("total".into(), "1.00".into());
//! let response = gateway.sale(sale).await?;
//! if response.was_request_bad() {
//!     println!("missing: {:?}", response.missing_fields());
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{CredentialSet, GatewayConfig};
use crate::error::GatewayError;
use crate::multi::MultiRecordResponse;
use crate::operation::{BatchFields, BatchLayout, Operation};
use crate::response::Response;
use crate::transport::{HttpTransport, Transport};
use crate::xml::{self, RequestFields};

/// Request field naming the operation.
const OPERATION_TYPE: &str = "operation_type";

/// A client for the XML gateway.
#[derive(Clone, Debug)]
pub struct Gateway<T = HttpTransport> {
    transport: T,
    credentials: CredentialSet,
}

impl Gateway<HttpTransport> {
    /// A client posting over HTTP to the configured endpoint.
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_transport(
            HttpTransport::from_config(config),
            config.credentials().clone(),
        )
    }
}

impl<T: Transport> Gateway<T> {
    pub fn with_transport(transport: T, credentials: CredentialSet) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.credentials
    }

    /// The full field list sent for `operation`.
    ///
    /// Credentials come first, then `args`, then `operation_type`. A later
    /// value for a key replaces an earlier one in the earlier position.
    pub fn request_fields(&self, operation: Operation, args: &RequestFields) -> RequestFields {
        let mut fields = self.credentials.fields();
        fields.extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
        fields.insert(OPERATION_TYPE.to_string(), operation.as_str().to_string());
        fields
    }

    /// Sends `args` as `operation` and decodes the reply.
    ///
    /// `args` is kept on the response as [`Response::original_args`].
    #[tracing::instrument(name = "fa_gateway.send", skip_all, fields(operation = %operation))]
    pub async fn send<A: Into<RequestFields>>(
        &self,
        operation: Operation,
        args: A,
    ) -> Result<Response, GatewayError> {
        let args = args.into();
        let fields = self.request_fields(operation, &args);
        let body = xml::encode_request(&fields)?;
        tracing::debug!(fields = fields.len(), bytes = body.len(), "Sending gateway request");

        let raw = self.transport.post_xml(body).await?;
        let response = Response::from_raw(raw, args)?;
        tracing::debug!(
            status = response.status().unwrap_or_default(),
            fields = response.fields().len(),
            "Gateway request completed"
        );
        Ok(response)
    }

    /// Sends a batch operation and groups the reply by `layout`.
    pub async fn send_batch<A: Into<RequestFields>>(
        &self,
        operation: Operation,
        args: A,
        layout: &BatchLayout,
    ) -> Result<MultiRecordResponse, GatewayError> {
        let response = self.send(operation, args).await?;
        Ok(MultiRecordResponse::from_layout(response, layout))
    }

    /// Authorizes and captures a card payment.
    pub async fn sale<A: Into<RequestFields>>(&self, args: A) -> Result<Response, GatewayError> {
        self.send(Operation::Sale, args).await
    }

    /// Authorizes a card payment without capturing it.
    pub async fn auth<A: Into<RequestFields>>(&self, args: A) -> Result<Response, GatewayError> {
        self.send(Operation::Auth, args).await
    }

    /// Searches the transaction database. One record per transaction found.
    pub async fn query<A: Into<RequestFields>>(
        &self,
        args: A,
    ) -> Result<MultiRecordResponse, GatewayError> {
        self.send_batch(Operation::Query, args, &BatchLayout::QUERY)
            .await
    }

    /// Voids pending transactions for their full amount. One record per reference number.
    pub async fn void<I, R>(&self, reference_numbers: I) -> Result<MultiRecordResponse, GatewayError>
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let batch = reference_numbers
            .into_iter()
            .fold(BatchFields::new(), |batch, reference_number| {
                batch.record([("reference_number", reference_number)])
            });
        self.send_batch(Operation::Void, batch, &BatchLayout::VOID)
            .await
    }

    /// Settles authorized transactions. `args` must declare `total_number_transactions`;
    /// see [`BatchFields`].
    pub async fn settle<A: Into<RequestFields>>(
        &self,
        args: A,
    ) -> Result<MultiRecordResponse, GatewayError> {
        self.send_batch(Operation::Settle, args, &BatchLayout::SETTLE)
            .await
    }

    /// Credits settled transactions. `args` must declare `total_number_transactions`;
    /// see [`BatchFields`].
    pub async fn credit<A: Into<RequestFields>>(
        &self,
        args: A,
    ) -> Result<MultiRecordResponse, GatewayError> {
        self.send_batch(Operation::Credit, args, &BatchLayout::CREDIT)
            .await
    }

    /// Looks up a stored customer.
    pub async fn cim_query(&self, cim_ref_num: &str) -> Result<Response, GatewayError> {
        self.send_cim(Operation::CimQuery, RequestFields::new(), cim_ref_num)
            .await
    }

    /// Charges a stored customer.
    pub async fn cim_sale<A: Into<RequestFields>>(
        &self,
        cim_ref_num: &str,
        args: A,
    ) -> Result<Response, GatewayError> {
        self.send_cim(Operation::CimSale, args, cim_ref_num).await
    }

    /// Runs a sale and creates or updates the stored customer from its card and owner data.
    pub async fn cim_sale_and_save<A: Into<RequestFields>>(
        &self,
        cim_ref_num: &str,
        args: A,
    ) -> Result<Response, GatewayError> {
        self.send_cim(Operation::CimSaleAndSave, args, cim_ref_num)
            .await
    }

    pub async fn cim_create(&self, cim_ref_num: &str) -> Result<Response, GatewayError> {
        self.send_cim(Operation::CimInsert, RequestFields::new(), cim_ref_num)
            .await
    }

    pub async fn cim_edit<A: Into<RequestFields>>(
        &self,
        cim_ref_num: &str,
        args: A,
    ) -> Result<Response, GatewayError> {
        self.send_cim(Operation::CimEdit, args, cim_ref_num).await
    }

    pub async fn cim_delete(&self, cim_ref_num: &str) -> Result<Response, GatewayError> {
        self.send_cim(Operation::CimDelete, RequestFields::new(), cim_ref_num)
            .await
    }

    /// Creates or modifies the recurring schedule of a transaction.
    pub async fn recurring_modify<A: Into<RequestFields>>(
        &self,
        reference_number: &str,
        args: A,
        is_ach: bool,
    ) -> Result<Response, GatewayError> {
        let mut args = args.into();
        args.entry("reference_number".to_string())
            .or_insert_with(|| reference_number.to_string());
        args.entry("is_ach".to_string())
            .or_insert_with(|| if is_ach { "1" } else { "0" }.to_string());
        self.send(Operation::RecurringModify, args).await
    }

    /// Adds `cim_ref_num` unless `args` already carries one.
    async fn send_cim<A: Into<RequestFields>>(
        &self,
        operation: Operation,
        args: A,
        cim_ref_num: &str,
    ) -> Result<Response, GatewayError> {
        let mut args = args.into();
        args.entry("cim_ref_num".to_string())
            .or_insert_with(|| cim_ref_num.to_string());
        self.send(operation, args).await
    }
}
