use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use rootcause::prelude::ResultExt;
use rootcause::{Report, bail, report};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use super::{DnsProvider, DnsRecordType};
use crate::config::{Config, Credentials, Target};
use crate::soap::{self, Fault};

const CALL_TIMEOUT: Duration = Duration::from_secs(30);
const UNKNOWN_CODE: &str = "??";
const UNKNOWN_MESSAGE: &str = "unknown error";

/// Client for the Arsys hosting SOAP API. One authenticated HTTP session is
/// shared by every call.
pub struct ArsysProvider {
    endpoint: String,
    namespace: String,
    credentials: Credentials,
    client: reqwest::Client,
}

impl ArsysProvider {
    pub fn new(config: &Config) -> Result<Self, Report> {
        let client = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .context("Building HTTP client for the Arsys API")?;

        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: &Config, client: reqwest::Client) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            namespace: config.soap_namespace.clone(),
            credentials: config.credentials.clone(),
            client,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        procedure: &str,
        fields: &[(&str, &str)],
    ) -> Result<Option<CallResult<T>>, Report> {
        debug!(procedure = %procedure, "calling Arsys API");

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.credentials.login, Some(&self.credentials.api_key))
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("{}#{}", self.namespace, procedure))
            .body(soap::envelope(&self.namespace, procedure, fields))
            .send()
            .await
            .context("Calling Arsys API")
            .attach(format!("procedure: '{procedure}'"))
            .attach(format!("endpoint: '{}'", self.endpoint))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Reading Arsys API response")
            .attach(format!("procedure: '{procedure}'"))?;

        if !status.is_success() {
            let error = match soap::fault(&body) {
                Some(fault) => fault.into_report(),
                None => report!("Arsys API returned HTTP {}", status)
                    .attach(format!("response: {body:?}")),
            };
            return Err(error
                .attach(format!("procedure: '{procedure}'"))
                .attach(format!("status: {status}")));
        }

        parse_call_result(&body).attach(format!("procedure: '{procedure}'"))
    }
}

#[async_trait]
impl DnsProvider for ArsysProvider {
    async fn find_record(&self, target: &Target) -> Result<Option<String>, Report> {
        let result = self
            .call(
                "InfoDNSZone",
                &[
                    ("domain", target.domain.as_str()),
                    ("dns", target.hostname.as_str()),
                    ("type", DnsRecordType::A.as_str()),
                    ("value", ""),
                ],
            )
            .await?;

        current_value(result, &target.hostname)
    }

    async fn create_record(&self, target: &Target, value: &str) -> Result<(), Report> {
        let result = self
            .call(
                "CreateDNSEntry",
                &[
                    ("domain", target.domain.as_str()),
                    ("dns", target.hostname.as_str()),
                    ("type", DnsRecordType::A.as_str()),
                    ("value", value),
                ],
            )
            .await?;

        ensure_success("CreateDNSEntry", result)
    }

    async fn modify_record(
        &self,
        target: &Target,
        current_value: &str,
        new_value: &str,
    ) -> Result<(), Report> {
        let result = self
            .call(
                "ModifyDNSEntry",
                &[
                    ("domain", target.domain.as_str()),
                    ("dns", target.hostname.as_str()),
                    ("currenttype", DnsRecordType::A.as_str()),
                    ("currentvalue", current_value),
                    ("newtype", DnsRecordType::A.as_str()),
                    ("newvalue", new_value),
                ],
            )
            .await?;

        ensure_success("ModifyDNSEntry", result)
    }
}

#[derive(Debug, Deserialize)]
struct ResponseBody<T> {
    #[serde(rename = "Fault")]
    fault: Option<Fault>,
    #[serde(
        rename = "InfoDNSZoneResponse",
        alias = "CreateDNSEntryResponse",
        alias = "ModifyDNSEntryResponse"
    )]
    response: Option<Response<T>>,
}

/// A procedure response. The result struct is usually wrapped in
/// `<return>`, but some servers put its fields directly in the response.
#[derive(Debug, Deserialize)]
struct Response<T> {
    #[serde(rename = "return")]
    wrapped: Option<CallResult<T>>,
    #[serde(rename = "errorCode")]
    error_code: Option<i64>,
    #[serde(rename = "errorMsg")]
    error_msg: Option<String>,
    res: Option<T>,
}

impl<T> Response<T> {
    fn into_result(self) -> Result<CallResult<T>, Report> {
        let result = match self.wrapped {
            Some(wrapped) => wrapped,
            None => CallResult {
                error_code: self.error_code,
                error_msg: self.error_msg,
                res: self.res,
            },
        };

        if result.error_code.is_none() && result.res.is_none() {
            bail!("SOAP response carries neither errorCode nor res");
        }

        Ok(result)
    }
}

/// The `{errorCode, errorMsg, res}` struct every procedure returns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct CallResult<T> {
    #[serde(rename = "errorCode")]
    error_code: Option<i64>,
    #[serde(rename = "errorMsg")]
    error_msg: Option<String>,
    res: Option<T>,
}

impl<T> CallResult<T> {
    fn failed(&self) -> bool {
        self.error_code.is_some_and(|code| code != 0)
    }

    fn message(&self) -> &str {
        self.error_msg
            .as_deref()
            .filter(|it| !it.trim().is_empty())
            .unwrap_or(UNKNOWN_MESSAGE)
    }
}

impl CallResult<String> {
    /// Boolean `res`, as returned by the create and modify procedures.
    fn confirmed(&self) -> bool {
        self.res.as_deref().is_some_and(|flag| {
            let flag = flag.trim();
            flag.eq_ignore_ascii_case("true") || flag == "1"
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ZoneInfo {
    data: Option<ZoneData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ZoneData {
    #[serde(rename = "item", default)]
    items: Vec<ZoneRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ZoneRecord {
    #[serde(rename = "type")]
    typ: Option<String>,
    name: Option<String>,
    value: Option<String>,
}

fn parse_call_result<T: DeserializeOwned>(body: &str) -> Result<Option<CallResult<T>>, Report> {
    let body: ResponseBody<T> = soap::decode_body(body)?;

    if let Some(fault) = body.fault {
        return Err(fault.into_report());
    }

    body.response.map(Response::into_result).transpose()
}

fn current_value(
    result: Option<CallResult<ZoneInfo>>,
    hostname: &str,
) -> Result<Option<String>, Report> {
    let Some(result) = result else {
        debug!("InfoDNSZone returned nothing");
        return Ok(None);
    };

    if result.failed() {
        bail!(
            "InfoDNSZone failed: errorCode={}, errorMsg={}",
            result.error_code.unwrap_or_default(),
            result.message()
        );
    }

    let record = result
        .res
        .and_then(|res| res.data)
        .map(|data| data.items)
        .unwrap_or_default()
        .into_iter()
        .find(|it| {
            it.typ.as_deref() == Some(DnsRecordType::A.as_str())
                && it.name.as_deref() == Some(hostname)
        });

    debug!(
        record_type = %DnsRecordType::A,
        hostname = %hostname,
        found = record.is_some(),
        "scanned zone records"
    );

    Ok(record.and_then(|it| it.value))
}

fn ensure_success(procedure: &str, result: Option<CallResult<String>>) -> Result<(), Report> {
    if result.as_ref().is_some_and(|it| !it.failed() && it.confirmed()) {
        return Ok(());
    }

    let code = result
        .as_ref()
        .and_then(|it| it.error_code)
        .map_or_else(|| UNKNOWN_CODE.to_string(), |code| code.to_string());
    let message = result.as_ref().map_or(UNKNOWN_MESSAGE, |it| it.message());

    bail!(
        "{} failed: errorCode={}, errorMsg={}",
        procedure,
        code,
        message
    );
}
