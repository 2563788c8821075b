//! IMS gateway implementation over the SOAP web services

use super::client::ImsClient;
use super::protocol::{Element, ResultNode, Service, WebMethod, flatten_leaves, parse_document};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rater_application::{GatewayError, ImsGateway};
use rater_domain::remote::requests::PostalAddress;
use rater_domain::{
    DataTable, InsuredRequest, ProcedureOutcome, ProcedureParams, QuoteOption, QuoteRequest,
    RaterImport, RaterUpload, parse_number_text,
};
use tracing::{debug, info};

const ZERO_GUID: &str = "00000000-0000-0000-0000-000000000000";
/// Office and charge code used when posting a premium
const DEFAULT_OFFICE_ID: i64 = -1;
const DEFAULT_CHARGE_CODE: i64 = 1;

/// Gateway implementation for the IMS web services
pub struct ImsSoapGateway {
    client: ImsClient,
}

impl ImsSoapGateway {
    pub fn new(client: ImsClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ImsClient {
        &self.client
    }

    /// Non-empty text result of a method returning an identifier
    async fn invoke_for_id(&self, call: WebMethod) -> Result<String, GatewayError> {
        let result = self.client.invoke(&call).await?;
        match result.value() {
            "" => Err(GatewayError::InvalidResponse(format!(
                "{} returned no identifier",
                call.method
            ))),
            id => Ok(id.to_string()),
        }
    }
}

fn address_elements(address: &PostalAddress) -> Vec<Element> {
    vec![
        Element::text("Address1", &address.address1),
        Element::text("Address2", &address.address2),
        Element::text("City", &address.city),
        Element::text("State", &address.state),
        Element::text("Zip", &address.zip),
        Element::text("Phone", &address.phone),
        Element::text("Email", &address.email),
        Element::text("ISOCountryCode", &address.country_code),
    ]
}

fn insured_call(request: &InsuredRequest) -> WebMethod {
    let insured = &request.insured;
    let mut location = vec![
        Element::text("LocationName", &request.location_name),
        Element::text("LocationTypeID", request.location_type_id),
    ];
    location.extend(address_elements(&request.address));
    location.push(Element::text("DeliveryMethodID", request.delivery_method_id));

    let mut contact = vec![
        Element::text("DeliveryMethodID", request.delivery_method_id),
        Element::text("FirstName", &request.contact_first_name),
        Element::text("LastName", &request.contact_last_name),
    ];
    contact.extend(address_elements(&request.address));

    WebMethod::new(Service::InsuredFunctions, "AddInsuredWithContact")
        .element(Element::group(
            "insured",
            vec![
                Element::text("BusinessTypeID", insured.business_type_id),
                Element::text("FirstName", &insured.first_name),
                Element::text("LastName", &insured.last_name),
                Element::text("CorporationName", &insured.corporation_name),
                Element::text("NameOnPolicy", &insured.name_on_policy),
                Element::text("DBA", &insured.dba),
                Element::text("FEIN", &insured.fein),
                Element::text("SSN", &insured.ssn),
                Element::text("Office", &insured.office),
            ],
        ))
        .element(Element::group("location", location))
        .element(Element::group("contact", contact))
}

fn quote_call(request: &QuoteRequest) -> WebMethod {
    let risk = &request.risk;
    WebMethod::new(Service::QuoteFunctions, "AddQuoteWithSubmission")
        .element(Element::group(
            "submission",
            vec![
                Element::text("Insured", &request.insured_id),
                Element::text("ProducerContact", &request.producer_contact_id),
                Element::text("Underwriter", &request.underwriter_id),
                Element::text("SubmissionDate", request.submission_date),
                Element::text("ProducerLocation", &request.producer_location_id),
            ],
        ))
        .element(Element::group(
            "quote",
            vec![
                Element::text("QuotingLocation", &request.quoting_location_id),
                Element::text("IssuingLocation", &request.issuing_location_id),
                Element::text("CompanyLocation", &request.company_location_id),
                Element::text("Line", &request.line_id),
                Element::text("StateID", &request.state_id),
                Element::text("ProducerContact", &request.producer_contact_id),
                Element::text("QuoteStatusID", request.quote_status_id),
                Element::text("Effective", request.term.effective),
                Element::text("Expiration", request.term.expiration),
                Element::text("BillingTypeID", request.billing_type_id),
                Element::text("PolicyTypeID", request.policy_type_id),
                Element::text("InsuredBusinessTypeID", request.insured_business_type_id),
                Element::group(
                    "RiskInformation",
                    vec![
                        Element::text("PolicyName", &risk.policy_name),
                        Element::text("CorporationName", &risk.corporation_name),
                        Element::text("DBA", &risk.dba),
                        Element::text("FirstName", &risk.first_name),
                        Element::text("LastName", &risk.last_name),
                        Element::text("SSN", &risk.ssn),
                        Element::text("FEIN", &risk.fein),
                        Element::text("Address1", &risk.address.address1),
                        Element::text("Address2", &risk.address.address2),
                        Element::text("City", &risk.address.city),
                        Element::text("State", &risk.address.state),
                        Element::text("ZipCode", &risk.address.zip),
                        Element::text("Phone", &risk.address.phone),
                        Element::text("BusinessType", request.insured_business_type_id),
                    ],
                ),
            ],
        ))
}

/// Quote options reported by AutoAddQuoteOptions.
///
/// The service answers with nothing, `0` or `true` when it created options
/// without listing them; that reads as no options.
fn parse_quote_options(result: &ResultNode) -> Vec<QuoteOption> {
    let mut nodes = Vec::new();
    collect_named(result, "QuoteOption", &mut nodes);
    if nodes.is_empty() && result.child("QuoteOptionGuid").is_some() {
        nodes.push(result);
    }
    nodes
        .into_iter()
        .filter_map(|node| {
            let id = node.child_text("QuoteOptionGuid")?;
            Some(QuoteOption {
                id: id.to_string(),
                line_id: node.child_text("LineGuid").map(str::to_string),
                line_name: node.child_text("LineName").map(str::to_string),
                company_location: node.child_text("CompanyLocation").map(str::to_string),
            })
        })
        .collect()
}

fn collect_named<'a>(node: &'a ResultNode, name: &str, out: &mut Vec<&'a ResultNode>) {
    for child in &node.children {
        if child.name.eq_ignore_ascii_case(name) {
            out.push(child);
        } else {
            collect_named(child, name, out);
        }
    }
}

fn parse_rater_import(result: &ResultNode) -> RaterImport {
    let success = result
        .child_text("Success")
        .is_some_and(|s| s.eq_ignore_ascii_case("true"));
    let mut totals = Vec::new();
    if let Some(premiums) = result.child("Premiums") {
        collect_named(premiums, "PremiumTotal", &mut totals);
    }
    let premium_total = totals
        .iter()
        .filter_map(|node| parse_number_text(node.value()))
        .reduce(|a, b| a + b);
    RaterImport {
        success,
        error_message: result.child_text("ErrorMessage").map(str::to_string),
        premium_total,
    }
}

#[async_trait]
impl ImsGateway for ImsSoapGateway {
    async fn execute_procedure(
        &self,
        procedure: &str,
        params: &ProcedureParams,
    ) -> Result<ProcedureOutcome, GatewayError> {
        Ok(self.client.execute_procedure(procedure, params).await?)
    }

    async fn add_insured(&self, request: &InsuredRequest) -> Result<String, GatewayError> {
        let id = self.invoke_for_id(insured_call(request)).await?;
        info!("IMS insured {}", id);
        Ok(id)
    }

    async fn add_quote_with_submission(&self, request: &QuoteRequest) -> Result<String, GatewayError> {
        // The returned GUID identifies both the submission and the quote
        self.invoke_for_id(quote_call(request)).await
    }

    async fn get_control_number(&self, quote_id: &str) -> Result<String, GatewayError> {
        self.invoke_for_id(
            WebMethod::new(Service::QuoteFunctions, "GetControlNumber").param("quoteGuid", quote_id),
        )
        .await
    }

    async fn auto_add_quote_details(&self, quote_id: &str) -> Result<(), GatewayError> {
        let call = WebMethod::new(Service::QuoteFunctions, "AutoAddQuoteDetails")
            .param("QuoteGuid", quote_id)
            .param("RecalculateCommissions", false);
        self.client.invoke(&call).await?;
        Ok(())
    }

    async fn auto_add_quote_options(&self, quote_id: &str) -> Result<Vec<QuoteOption>, GatewayError> {
        let call =
            WebMethod::new(Service::QuoteFunctions, "AutoAddQuoteOptions").param("quoteGuid", quote_id);
        let result = self.client.invoke(&call).await?;
        let options = parse_quote_options(&result);
        debug!("AutoAddQuoteOptions listed {} option(s)", options.len());
        Ok(options)
    }

    async fn save_rating_sheet(&self, upload: &RaterUpload) -> Result<(), GatewayError> {
        let call = WebMethod::new(Service::DocumentFunctions, "SaveRatingSheet")
            .param("quoteGuid", &upload.quote_id)
            .param("raterId", upload.rater_id)
            .param("fileBytes", BASE64.encode(&upload.bytes))
            .param("fileName", &upload.file_name);
        self.client.invoke(&call).await?;
        Ok(())
    }

    async fn import_excel_rater(&self, upload: &RaterUpload) -> Result<RaterImport, GatewayError> {
        let call = WebMethod::new(Service::QuoteFunctions, "ImportExcelRater")
            .param("QuoteGuid", &upload.quote_id)
            .param("FileBytes", BASE64.encode(&upload.bytes))
            .param("FileName", &upload.file_name)
            .param("RaterID", upload.rater_id)
            .param("FactorSetGuid", ZERO_GUID)
            .param("ApplyFees", false);
        let result = self.client.invoke(&call).await?;
        Ok(parse_rater_import(&result))
    }

    async fn add_premium(&self, quote_option_id: &str, premium: f64) -> Result<(), GatewayError> {
        let call = WebMethod::new(Service::QuoteFunctions, "AddPremium")
            .param("quoteOptionGuid", quote_option_id)
            .param("premium", format!("{premium:.2}"))
            .param("officeID", DEFAULT_OFFICE_ID)
            .param("chargeCode", DEFAULT_CHARGE_CODE);
        self.client.invoke(&call).await?;
        Ok(())
    }

    async fn get_policy_information(&self, quote_id: &str) -> Result<DataTable, GatewayError> {
        let call = WebMethod::new(Service::QuoteFunctions, "GetPolicyInformation")
            .param("quoteGuid", quote_id);
        let result = self.client.invoke(&call).await?;
        // Usually an XML document serialized as text
        let row = if result.is_leaf() && result.value().starts_with('<') {
            let document = parse_document(result.value()).map_err(GatewayError::from)?;
            flatten_leaves(&document)
        } else {
            flatten_leaves(&result)
        };
        Ok(if row.is_empty() {
            DataTable::default()
        } else {
            DataTable::new(vec![row])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ims::client::ImsConnection;
    use crate::ims::client::tests::{ScriptedTransport, login, ok};
    use crate::ims::token_cache::TokenCache;
    use rater_domain::{ApplicantData, PolicyTerm, RemoteLineIds};
    use std::sync::Arc;

    fn gateway(responses: Vec<crate::ims::transport::SoapResponse>) -> (ImsSoapGateway, Arc<ScriptedTransport>) {
        let mut all = vec![login("tok-1")];
        all.extend(responses);
        let transport = Arc::new(ScriptedTransport::new(all));
        let client = ImsClient::new(
            ImsConnection::new("https://ims.test", "svc", "secret"),
            transport.clone(),
            Arc::new(TokenCache::default()),
        );
        (ImsSoapGateway::new(client), transport)
    }

    fn result(method: &str, inner: &str) -> crate::ims::transport::SoapResponse {
        ok(&format!(
            "<{method}Response><{method}Result>{inner}</{method}Result></{method}Response>"
        ))
    }

    fn remote() -> RemoteLineIds {
        RemoteLineIds {
            line_id: "line-1".into(),
            company_id: "company-1".into(),
            ..Default::default()
        }
    }

    fn jane() -> ApplicantData {
        ApplicantData {
            first_name: Some("Jane".into()),
            last_name: Some("Doe".into()),
            state: Some("TX".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_insured_sends_insured_location_contact() {
        let (gateway, transport) = gateway(vec![result("AddInsuredWithContact", "ins-42")]);
        let request = InsuredRequest::from_applicant(&jane(), &remote());

        let id = gateway.add_insured(&request).await.unwrap();

        assert_eq!(id, "ins-42");
        let sent = &transport.sent()[1];
        assert_eq!(sent.url, "https://ims.test/insuredfunctions.asmx");
        assert!(sent.envelope.contains("<NameOnPolicy>Jane Doe</NameOnPolicy>"));
        assert!(sent.envelope.contains("<BusinessTypeID>4</BusinessTypeID>"));
        assert!(sent.envelope.contains("<Office>company-1</Office>"));
        assert!(sent.envelope.contains("<ISOCountryCode>US</ISOCountryCode>"));
    }

    #[tokio::test]
    async fn test_empty_identifier_is_invalid_response() {
        let (gateway, _) = gateway(vec![result("AddQuoteWithSubmission", "")]);
        let term = PolicyTerm::annual(chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        let request = QuoteRequest::new("ins-1", &jane(), &remote(), term);
        assert!(matches!(
            gateway.add_quote_with_submission(&request).await,
            Err(GatewayError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_quote_request_dates() {
        let (gateway, transport) = gateway(vec![result("AddQuoteWithSubmission", "quote-1")]);
        let term = PolicyTerm::annual(chrono::NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        let request = QuoteRequest::new("ins-1", &jane(), &remote(), term);

        assert_eq!(gateway.add_quote_with_submission(&request).await.unwrap(), "quote-1");
        let envelope = &transport.sent()[1].envelope;
        assert!(envelope.contains("<Effective>2026-01-15</Effective>"));
        assert!(envelope.contains("<Expiration>2027-01-15</Expiration>"));
        assert!(envelope.contains("<StateID>TX</StateID>"));
    }

    #[tokio::test]
    async fn test_quote_options_listed_and_minimal_answers() {
        let (gateway, _) = gateway(vec![
            result(
                "AutoAddQuoteOptions",
                "<QuoteOption><QuoteOptionGuid>opt-1</QuoteOptionGuid><LineName>GL</LineName></QuoteOption>\
                 <QuoteOption><QuoteOptionGUID>opt-2</QuoteOptionGUID></QuoteOption>",
            ),
            result("AutoAddQuoteOptions", "0"),
            result("AutoAddQuoteOptions", "true"),
        ]);

        let options = gateway.auto_add_quote_options("q-1").await.unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].id, "opt-1");
        assert_eq!(options[0].line_name.as_deref(), Some("GL"));
        assert_eq!(options[1].id, "opt-2");

        assert!(gateway.auto_add_quote_options("q-1").await.unwrap().is_empty());
        assert!(gateway.auto_add_quote_options("q-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_excel_rater_sums_premiums() {
        let (gateway, transport) = gateway(vec![result(
            "ImportExcelRater",
            "<Success>true</Success><ErrorMessage/><Premiums>\
             <OptionResult><PremiumTotal>1000.50</PremiumTotal></OptionResult>\
             <OptionResult><PremiumTotal>250</PremiumTotal></OptionResult></Premiums>",
        )]);
        let upload = RaterUpload {
            quote_id: "q-1".into(),
            rater_id: 7,
            file_name: "gl.xlsx".into(),
            bytes: b"PK".to_vec(),
        };

        let import = gateway.import_excel_rater(&upload).await.unwrap();

        assert!(import.success);
        assert_eq!(import.premium_total, Some(1250.50));
        assert!(import.error_message.is_none());
        let envelope = &transport.sent()[1].envelope;
        assert!(envelope.contains("<FileBytes>UEs=</FileBytes>"));
        assert!(envelope.contains("<FactorSetGuid>00000000-0000-0000-0000-000000000000</FactorSetGuid>"));
    }

    #[tokio::test]
    async fn test_add_premium_formats_amount() {
        let (gateway, transport) = gateway(vec![ok("<AddPremiumResponse/>")]);
        gateway.add_premium("opt-1", 1200.5).await.unwrap();
        let envelope = &transport.sent()[1].envelope;
        assert!(envelope.contains("<premium>1200.50</premium>"));
        assert!(envelope.contains("<officeID>-1</officeID>"));
    }

    #[tokio::test]
    async fn test_policy_information_flattens_document() {
        let (gateway, _) = gateway(vec![result(
            "GetPolicyInformation",
            "&lt;PolicyInformation&gt;&lt;Quote&gt;&lt;TotalPremium&gt;815.00&lt;/TotalPremium&gt;&lt;/Quote&gt;&lt;/PolicyInformation&gt;",
        )]);
        let table = gateway.get_policy_information("q-1").await.unwrap();
        assert_eq!(table.find_premium(), Some(("TotalPremium".to_string(), 815.0)));
    }
}
