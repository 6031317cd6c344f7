//! Provisioning outcome reporting.
//!
//! The report is presentation data only: integrations record into it, the
//! summary prints it, and nothing reads it back to make decisions.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Integration {
    SourceControl,
    Warehouse,
    Workspace,
}

impl Integration {
    pub fn label(&self) -> &'static str {
        match self {
            Integration::SourceControl => "source control",
            Integration::Warehouse => "warehouse",
            Integration::Workspace => "workspace",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationResult {
    pub integration: Integration,
    pub attempted: bool,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningReport {
    pub repo_name: String,
    pub remote_url: String,
    pub default_branch: String,
    pub branches: Vec<String>,
    pub integrations: Vec<IntegrationResult>,
    pub provisioned_at: String,
}

impl ProvisioningReport {
    pub fn new(
        repo_name: String,
        remote_url: String,
        default_branch: String,
        branches: Vec<String>,
    ) -> Self {
        Self {
            repo_name,
            remote_url,
            default_branch,
            branches,
            integrations: Vec::new(),
            provisioned_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn record_success(&mut self, integration: Integration) {
        self.integrations.push(IntegrationResult {
            integration,
            attempted: true,
            succeeded: true,
            failure_reason: None,
        });
    }

    pub fn record_failure(&mut self, integration: Integration, reason: String) {
        self.integrations.push(IntegrationResult {
            integration,
            attempted: true,
            succeeded: false,
            failure_reason: Some(reason),
        });
    }

    pub fn record_skipped(&mut self, integration: Integration) {
        self.integrations.push(IntegrationResult {
            integration,
            attempted: false,
            succeeded: false,
            failure_reason: None,
        });
    }

    pub fn failed(&self) -> Vec<&IntegrationResult> {
        self.integrations
            .iter()
            .filter(|r| r.attempted && !r.succeeded)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ProvisioningReport {
        ProvisioningReport::new(
            "proj-x".to_string(),
            "https://dev.azure.com/acme/p/_git/proj-x".to_string(),
            "main".to_string(),
            vec!["main".to_string(), "stage".to_string(), "dev".to_string()],
        )
    }

    #[test]
    fn records_distinguish_skipped_from_failed() {
        let mut report = report();
        report.record_success(Integration::SourceControl);
        report.record_failure(Integration::Warehouse, "bad passphrase".to_string());
        report.record_skipped(Integration::Workspace);

        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].integration, Integration::Warehouse);

        let skipped = &report.integrations[2];
        assert!(!skipped.attempted);
        assert!(skipped.failure_reason.is_none());
    }

    #[test]
    fn serializes_camel_case_envelope() {
        let mut report = report();
        report.record_success(Integration::SourceControl);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["repoName"], "proj-x");
        assert_eq!(json["integrations"][0]["integration"], "sourceControl");
        assert_eq!(json["integrations"][0]["succeeded"], true);
        assert!(json["provisionedAt"].is_string());
    }
}
