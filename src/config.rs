use std::env::VarError;
use std::fmt;

use derive_more::Display;
use rootcause::{Report, report};

pub const LOGIN_VAR: &str = "ARSYS_LOGIN";
pub const API_KEY_VAR: &str = "ARSYS_API_KEY";
pub const DOMAIN_VAR: &str = "ARSYS_DOMAIN";
pub const HOSTNAME_VAR: &str = "ARSYS_DNS";
pub const ENDPOINT_VAR: &str = "ARSYS_ENDPOINT";
pub const SOAP_NAMESPACE_VAR: &str = "ARSYS_SOAP_NAMESPACE";

pub const DEFAULT_ENDPOINT: &str = "https://api.servidoresdns.net:54321/hosting/api/soap/index.php";
pub const DEFAULT_SOAP_NAMESPACE: &str = "urn:arsys:hosting:soap";

/// Account used to authenticate against the hosting API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// The record this run is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("'{hostname}' in zone '{domain}'")]
pub struct Target {
    pub domain: String,
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub credentials: Credentials,
    pub target: Target,
    pub endpoint: String,
    pub soap_namespace: String,
}

impl Config {
    /// Resolves the configuration through `lookup`, which behaves like
    /// [`std::env::var`].
    ///
    /// Every mandatory variable is checked before failing, so the error
    /// names all of the missing ones at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Result<String, VarError>) -> Result<Self, Report> {
        let mut missing = Vec::new();
        let mut problems = Vec::new();

        let mut require = |var: &'static str| match lookup(var) {
            Ok(value) if !value.is_empty() => value,
            Ok(_) => {
                missing.push(var);
                problems.push(format!("'{}' is empty", var));
                String::new()
            }
            Err(VarError::NotPresent) => {
                missing.push(var);
                problems.push(format!("'{}' is not set", var));
                String::new()
            }
            Err(VarError::NotUnicode(e)) => {
                missing.push(var);
                problems.push(format!("'{}' is not valid unicode: '{}'", var, e.display()));
                String::new()
            }
        };

        let login = require(LOGIN_VAR);
        let api_key = require(API_KEY_VAR);
        let domain = require(DOMAIN_VAR);
        let hostname = require(HOSTNAME_VAR);

        if !missing.is_empty() {
            let mut error = report!(
                "Missing required environment variable: {}",
                missing.join(", ")
            );
            for problem in problems {
                error = error.attach(problem);
            }
            return Err(error);
        }

        let optional = |var: &str, default: &str| {
            lookup(var)
                .ok()
                .filter(|it| !it.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            credentials: Credentials { login, api_key },
            target: Target { domain, hostname },
            endpoint: optional(ENDPOINT_VAR, DEFAULT_ENDPOINT),
            soap_namespace: optional(SOAP_NAMESPACE_VAR, DEFAULT_SOAP_NAMESPACE),
        })
    }
}
