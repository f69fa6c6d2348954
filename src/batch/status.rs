use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle states of a produce batch.
///
/// The serialized labels are the strings stored documents and dashboards use,
/// so existing documents keep round-tripping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Retailer placed an order and still has to confirm it with the token.
    #[serde(rename = "Awaiting Retailer Confirmation")]
    RequestedByRetailer,
    /// Order confirmed by the retailer, waiting on a farmer to accept it.
    #[serde(rename = "Awaiting Farmer Confirmation")]
    AwaitingFarmerConfirmation,
    #[serde(rename = "Processing")]
    Processing,
    #[serde(rename = "Pending Verification")]
    PendingVerification,
    #[serde(rename = "In Transit")]
    InTransit,
    #[serde(rename = "Delivered")]
    Delivered,
    #[serde(rename = "Ready for Sale")]
    ReadyForSale,
    #[serde(rename = "Sold")]
    Sold,
    #[serde(rename = "Rejected")]
    Rejected,
}

#[derive(Debug, Error)]
#[error("unknown batch status: {0}")]
pub struct ParseStatusError(String);

impl BatchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BatchStatus::RequestedByRetailer => "Awaiting Retailer Confirmation",
            BatchStatus::AwaitingFarmerConfirmation => "Awaiting Farmer Confirmation",
            BatchStatus::Processing => "Processing",
            BatchStatus::PendingVerification => "Pending Verification",
            BatchStatus::InTransit => "In Transit",
            BatchStatus::Delivered => "Delivered",
            BatchStatus::ReadyForSale => "Ready for Sale",
            BatchStatus::Sold => "Sold",
            BatchStatus::Rejected => "Rejected",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Sold | BatchStatus::Rejected)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Awaiting Retailer Confirmation" => Ok(BatchStatus::RequestedByRetailer),
            "Awaiting Farmer Confirmation" => Ok(BatchStatus::AwaitingFarmerConfirmation),
            "Processing" => Ok(BatchStatus::Processing),
            "Pending Verification" => Ok(BatchStatus::PendingVerification),
            "In Transit" => Ok(BatchStatus::InTransit),
            "Delivered" => Ok(BatchStatus::Delivered),
            "Ready for Sale" => Ok(BatchStatus::ReadyForSale),
            "Sold" => Ok(BatchStatus::Sold),
            "Rejected" => Ok(BatchStatus::Rejected),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
