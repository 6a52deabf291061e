//! Test doubles for the echo services, the DNS provider and the SOAP
//! endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rootcause::{Report, bail, report};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::Target;
use crate::provider::DnsProvider;
use crate::public_ip::AddressEcho;

/// Echo double answering from a fixed script. Unknown URLs are unreachable.
#[derive(Clone, Default)]
pub struct ScriptedEcho {
    answers: Arc<HashMap<String, Result<String, String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEcho {
    pub fn new(script: &[(&str, Result<&str, &str>)]) -> Self {
        let answers = script
            .iter()
            .map(|(url, answer)| {
                let answer = answer.map(str::to_string).map_err(str::to_string);
                (url.to_string(), answer)
            })
            .collect();
        Self {
            answers: Arc::new(answers),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AddressEcho for ScriptedEcho {
    async fn fetch(&self, url: &str) -> Result<String, Report> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.answers.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(reason)) => Err(report!("{}", reason)),
            None => Err(report!("{} is unreachable", url)),
        }
    }
}

#[derive(Debug, Default)]
struct ZoneState {
    records: HashMap<String, String>,
    query_error: Option<(i64, String)>,
    queries: usize,
    creates: Vec<(String, String)>,
    modifies: Vec<(String, String, String)>,
}

/// In-memory zone that records every call made against it.
#[derive(Clone, Default)]
pub struct MockZone {
    state: Arc<Mutex<ZoneState>>,
}

impl MockZone {
    pub fn with_record(hostname: &str, value: &str) -> Self {
        let zone = Self::default();
        zone.state
            .lock()
            .unwrap()
            .records
            .insert(hostname.to_string(), value.to_string());
        zone
    }

    pub fn failing_with(code: i64, message: &str) -> Self {
        let zone = Self::default();
        zone.state.lock().unwrap().query_error = Some((code, message.to_string()));
        zone
    }

    pub fn queries(&self) -> usize {
        self.state.lock().unwrap().queries
    }

    pub fn creates(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().creates.clone()
    }

    pub fn modifies(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().modifies.clone()
    }

    pub fn mutations(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.creates.len() + state.modifies.len()
    }
}

#[async_trait]
impl DnsProvider for MockZone {
    async fn find_record(&self, target: &Target) -> Result<Option<String>, Report> {
        let mut state = self.state.lock().unwrap();
        state.queries += 1;
        if let Some((code, message)) = &state.query_error {
            bail!("InfoDNSZone failed: errorCode={}, errorMsg={}", code, message);
        }
        Ok(state.records.get(&target.hostname).cloned())
    }

    async fn create_record(&self, target: &Target, value: &str) -> Result<(), Report> {
        let mut state = self.state.lock().unwrap();
        state
            .creates
            .push((target.hostname.clone(), value.to_string()));
        state
            .records
            .insert(target.hostname.clone(), value.to_string());
        Ok(())
    }

    async fn modify_record(
        &self,
        target: &Target,
        current_value: &str,
        new_value: &str,
    ) -> Result<(), Report> {
        let mut state = self.state.lock().unwrap();
        state.modifies.push((
            target.hostname.clone(),
            current_value.to_string(),
            new_value.to_string(),
        ));
        state
            .records
            .insert(target.hostname.clone(), new_value.to_string());
        Ok(())
    }
}

/// Accepts a single HTTP connection on a local port and answers it with
/// `status` and an XML `body`.
///
/// Returns the endpoint URL and a handle yielding the raw request text.
pub async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/xml; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        while !request_complete(&request) {
            let read = socket.read(&mut buf).await.unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buf[..read]);
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&request).into_owned()
    });

    (format!("http://{address}/soap"), handle)
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    request.len() >= header_end + 4 + content_length
}
