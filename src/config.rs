use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{LoanError, Result};

/// what happens to a late fee assessed on a regular payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateFeePolicy {
    /// fee is recorded on the payment only; the whole amount reduces the installment
    #[default]
    Informational,
    /// fee is taken out of the payment first; only the rest reduces the installment
    CollectFromPayment,
}

/// dashboard windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub recent_loans_limit: usize,
    pub upcoming_window_days: u32,
    pub ending_soon_window_days: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            recent_loans_limit: 5,
            upcoming_window_days: 7,
            ending_soon_window_days: 7,
        }
    }
}

/// servicing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicingConfig {
    pub loan_number_prefix: String,
    pub loan_number_min_digits: usize,
    pub late_fee_policy: LateFeePolicy,
    pub allow_payments_on_closed_loans: bool,
    pub dashboard: DashboardConfig,
}

impl Default for ServicingConfig {
    fn default() -> Self {
        Self {
            loan_number_prefix: "L".to_string(),
            loan_number_min_digits: 4,
            late_fee_policy: LateFeePolicy::Informational,
            allow_payments_on_closed_loans: false,
            dashboard: DashboardConfig::default(),
        }
    }
}

impl ServicingConfig {
    /// parse from json; missing keys fall back to defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ServicingConfig = serde_json::from_str(json)
            .map_err(|e| LoanError::validation(format!("invalid servicing config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            LoanError::validation(format!("cannot read servicing config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_late_fee_policy(mut self, policy: LateFeePolicy) -> Self {
        self.late_fee_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let prefix = self.loan_number_prefix.as_str();
        if prefix.is_empty() || prefix.contains('-') {
            return Err(LoanError::validation(
                "loan number prefix must be non-empty and must not contain '-'",
            ));
        }
        if self.loan_number_min_digits < 4 {
            return Err(LoanError::validation("loan numbers carry at least 4 sequence digits"));
        }
        Ok(())
    }
}
