// Trigger payloads. Shapes mirror what the dashboards submit; validation
// happens before any record is built or read.

use serde::{Deserialize, Serialize};

use crate::batch::Grade;

use super::error::WorkflowError;

/// A retailer's order request: the retailer-initiated entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub crop: String,
    pub quantity_kg: f64,
    pub grade: Grade,
    pub contact_person: String,
    pub contact_phone: String,
    pub preferred_date: Option<String>,
    /// Total expected price, currency-formatted. Informational.
    pub price: String,
    pub notes: Option<String>,
}

impl OrderRequest {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.crop.trim().is_empty() {
            return Err(WorkflowError::validation("crop name is required"));
        }
        if self.quantity_kg <= 0.0 || !self.quantity_kg.is_finite() {
            return Err(WorkflowError::validation(
                "quantity must be greater than 0",
            ));
        }
        if self.contact_person.trim().is_empty() {
            return Err(WorkflowError::validation("contact person is required"));
        }
        if self.contact_phone.trim().is_empty() {
            return Err(WorkflowError::validation("contact phone is required"));
        }
        if self.price.trim().is_empty() {
            return Err(WorkflowError::validation("expected price is required"));
        }
        Ok(())
    }
}

/// A farmer's direct harvest upload: the farmer-initiated entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectUpload {
    pub crop: String,
    pub weight_kg: f64,
    pub harvest_date: String,
    pub quality: Grade,
    pub farmer: String,
    pub farm_location: Option<String>,
}

impl DirectUpload {
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.crop.trim().is_empty() {
            return Err(WorkflowError::validation("crop name is required"));
        }
        if self.weight_kg <= 0.0 || !self.weight_kg.is_finite() {
            return Err(WorkflowError::validation("weight must be greater than 0"));
        }
        if self.harvest_date.trim().is_empty() {
            return Err(WorkflowError::validation("harvest date is required"));
        }
        if self.farmer.trim().is_empty() {
            return Err(WorkflowError::validation("farmer name is required"));
        }
        Ok(())
    }
}

/// Farmer acceptance of a pending order. `quantity_to_sell` defaults to the
/// requested quantity; fulfilling less is allowed, more is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmerConfirmation {
    pub farmer: String,
    pub quantity_to_sell: Option<f64>,
}

/// Farmer rejection of a pending order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FarmerRejection {
    pub farmer: Option<String>,
    pub reason: Option<String>,
}

/// Actor and optional note for the distributor steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusNote {
    pub actor: Option<String>,
    pub note: Option<String>,
}

/// Retailer publishing a delivered batch for sale, optionally re-pricing it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetailPricing {
    pub retail_price: Option<String>,
    pub actor: Option<String>,
}

/// Retailer price change on a batch already on sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub new_price: String,
    pub actor: Option<String>,
}
