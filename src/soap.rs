//! Just enough SOAP 1.1 to talk to an RPC-style endpoint: building request
//! envelopes, decoding response bodies and spotting faults.

use quick_xml::escape::escape;
use rootcause::{Report, prelude::ResultExt, report};
use serde::{Deserialize, de::DeserializeOwned};

const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Builds a request envelope calling `procedure` with a single `input`
/// struct made of `fields`.
pub fn envelope(namespace: &str, procedure: &str, fields: &[(&str, &str)]) -> String {
    let input: String = fields
        .iter()
        .map(|(name, value)| format!("<{name}>{}</{name}>", escape(*value)))
        .collect();

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="{envelope_ns}" xmlns:ns1="{ns}">"#,
            "<SOAP-ENV:Body><ns1:{procedure}><input>{input}</input></ns1:{procedure}></SOAP-ENV:Body>",
            "</SOAP-ENV:Envelope>"
        ),
        envelope_ns = ENVELOPE_NS,
        ns = escape(namespace),
        procedure = procedure,
        input = input,
    )
}

// Element names are matched on their local name, so `SOAP-ENV:Body` and
// `soap:Body` both land in `body`.
#[derive(Debug, Deserialize)]
struct Envelope<B> {
    #[serde(rename = "Body")]
    body: B,
}

/// Decodes the `Body` of a response envelope into `B`.
pub fn decode_body<B: DeserializeOwned>(xml: &str) -> Result<B, Report> {
    let envelope: Envelope<B> =
        quick_xml::de::from_str(xml).context("Malformed SOAP response")?;
    Ok(envelope.body)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Fault {
    faultcode: Option<String>,
    faultstring: Option<String>,
}

impl Fault {
    pub fn into_report(self) -> Report {
        report!(
            "SOAP fault {}: {}",
            self.faultcode.as_deref().unwrap_or("(no code)"),
            self.faultstring.as_deref().unwrap_or("(no message)")
        )
    }
}

#[derive(Debug, Deserialize)]
struct FaultBody {
    #[serde(rename = "Fault")]
    fault: Option<Fault>,
}

/// The fault carried by `xml`, if it is a SOAP envelope holding one.
pub fn fault(xml: &str) -> Option<Fault> {
    decode_body::<FaultBody>(xml).ok().and_then(|body| body.fault)
}
