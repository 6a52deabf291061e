use async_trait::async_trait;
use derive_more::Display;
use rootcause::Report;

use crate::config::Target;

pub mod arsys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DnsRecordType {
    A,
}

impl DnsRecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
        }
    }
}

#[async_trait]
pub trait DnsProvider {
    /// Value of the A record named exactly like the target hostname, if any.
    async fn find_record(&self, target: &Target) -> Result<Option<String>, Report>;
    async fn create_record(&self, target: &Target, value: &str) -> Result<(), Report>;
    async fn modify_record(
        &self,
        target: &Target,
        current_value: &str,
        new_value: &str,
    ) -> Result<(), Report>;
}
