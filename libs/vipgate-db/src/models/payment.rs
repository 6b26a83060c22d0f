use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown payment status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "approved" => Ok(PaymentStatus::Approved),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Admin verdict on a pending report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(&self) -> PaymentStatus {
        match self {
            Decision::Approved => PaymentStatus::Approved,
            Decision::Rejected => PaymentStatus::Rejected,
        }
    }
}

/// A user's unverified claim of an off-platform payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PaymentReport {
    pub id: i64,
    pub user_id: i64,
    pub tx_hash: String,
    pub amount: String,
    pub network: String,
    pub note: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub processed_by: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Validated report fields. Only constructible through `new` or `parse`,
/// so every instance carries non-empty hash, amount and network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSubmission {
    tx_hash: String,
    amount: String,
    network: String,
    note: Option<String>,
}

impl ReportSubmission {
    pub const DELIMITER: char = ';';

    pub fn new(
        tx_hash: &str,
        amount: &str,
        network: &str,
        note: Option<&str>,
    ) -> LedgerResult<Self> {
        let required = [("tx_hash", tx_hash), ("amount", amount), ("network", network)];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(LedgerError::Validation(format!("{} is required", field)));
        }

        let note = note.map(str::trim).filter(|n| !n.is_empty());

        Ok(Self {
            tx_hash: tx_hash.trim().to_string(),
            amount: amount.trim().to_string(),
            network: network.trim().to_string(),
            note: note.map(str::to_string),
        })
    }

    /// Parses `tx_hash;amount;network;note?`. Anything after the third
    /// delimiter belongs to the note.
    pub fn parse(line: &str) -> LedgerResult<Self> {
        let parts: Vec<&str> = line.splitn(4, Self::DELIMITER).collect();
        if parts.len() < 3 {
            return Err(LedgerError::Validation(format!(
                "expected at least 3 fields separated by '{}', got {}",
                Self::DELIMITER,
                parts.len()
            )));
        }
        Self::new(parts[0], parts[1], parts[2], parts.get(3).copied())
    }

    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_line_with_note() {
        let sub = ReportSubmission::parse("0xabc;10;BSC;monthly").unwrap();
        assert_eq!(sub.tx_hash(), "0xabc");
        assert_eq!(sub.amount(), "10");
        assert_eq!(sub.network(), "BSC");
        assert_eq!(sub.note(), Some("monthly"));
    }

    #[test]
    fn parse_trims_and_drops_blank_note() {
        let sub = ReportSubmission::parse("  0xabc ; 10 ;BSC ;   ").unwrap();
        assert_eq!(sub.tx_hash(), "0xabc");
        assert_eq!(sub.network(), "BSC");
        assert_eq!(sub.note(), None);
    }

    #[test]
    fn note_keeps_extra_delimiters() {
        let sub = ReportSubmission::parse("0xabc;10;BSC;paid; twice").unwrap();
        assert_eq!(sub.note(), Some("paid; twice"));
    }

    #[test]
    fn too_few_fields_is_validation_error() {
        let err = ReportSubmission::parse("0xabc;10").unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn empty_required_field_is_validation_error() {
        let err = ReportSubmission::parse("0xabc;;BSC").unwrap_err();
        assert!(matches!(err, LedgerError::Validation(msg) if msg.contains("amount")));
    }

    #[test]
    fn status_text_form() {
        assert_eq!("approved".parse::<PaymentStatus>().unwrap(), PaymentStatus::Approved);
        assert!("done".parse::<PaymentStatus>().is_err());
        assert_eq!(PaymentStatus::Rejected.to_string(), "rejected");
        assert_eq!(Decision::Rejected.status(), PaymentStatus::Rejected);
    }
}
