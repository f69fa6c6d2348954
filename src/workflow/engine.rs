use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::batch::{
    generate_confirmation_token, generate_lot_number, qr_asset_path, BatchId, BatchRecord,
    BatchStatus, SensorReading, Weight,
};
use crate::push::{events, Channel, EventPublisher};
use crate::store::{BatchRepository, StoreError};

use super::error::WorkflowError;
use super::requests::{
    DirectUpload, FarmerConfirmation, FarmerRejection, OrderRequest, PriceUpdate, RetailPricing,
    StatusNote,
};

/// The batch lifecycle workflow engine.
///
/// Owns the state machine and the audit trail; storage and event delivery
/// are injected. Every trigger is one read-validate-write unit: the write is
/// conditioned on the revision that was read, so two transitions racing from
/// the same stale state cannot both land. Publishes run after the save and
/// never fail the transition.
pub struct WorkflowEngine {
    store: Arc<dyn BatchRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn BatchRepository>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, publisher }
    }

    // ----- entry points ---------------------------------------------------

    /// Retailer places an order request. The batch starts awaiting the
    /// retailer's own confirmation, guarded by a freshly minted token.
    pub async fn place_order(&self, request: OrderRequest) -> Result<BatchRecord, WorkflowError> {
        request.validate()?;

        let now = Utc::now();
        let lot_number = generate_lot_number();
        let contact = request.contact_person.trim().to_string();
        let mut record = BatchRecord {
            id: BatchId::new(),
            qr_code: Some(qr_asset_path(&lot_number)),
            lot_number: Some(lot_number),
            confirmation_token: Some(generate_confirmation_token()),
            crop: request.crop.trim().to_string(),
            quality: request.grade,
            weight: Weight::kilograms(request.quantity_kg),
            price: Some(request.price.trim().to_string()),
            farmer: None,
            retailer: Some(contact.clone()),
            retailer_contact: Some(request.contact_phone.trim().to_string()),
            harvest_date: request
                .preferred_date
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
            farm_location: None,
            status: BatchStatus::RequestedByRetailer,
            earnings: None,
            notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
            sensor_data: None,
            tracking_history: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        record.append_audit(
            "Order Request Placed",
            format!("Retailer {contact} placed an order request. Awaiting retailer confirmation."),
            &contact,
            None,
        );

        let saved = self.store.save(record, None).await?;
        info!(
            batch_id = %saved.id,
            lot = ?saved.lot_number,
            crop = %saved.crop,
            "Order request placed"
        );
        // No fan-out yet: the order only becomes visible to farmers once the
        // retailer confirms it with the token.
        Ok(saved)
    }

    /// Farmer uploads a harvest batch directly. The record is registered and
    /// immediately pending quality verification.
    pub async fn upload_direct(&self, upload: DirectUpload) -> Result<BatchRecord, WorkflowError> {
        upload.validate()?;

        let now = Utc::now();
        let lot_number = generate_lot_number();
        let farmer = upload.farmer.trim().to_string();
        let mut record = BatchRecord {
            id: BatchId::new(),
            qr_code: Some(qr_asset_path(&lot_number)),
            lot_number: Some(lot_number),
            confirmation_token: None,
            crop: upload.crop.trim().to_string(),
            quality: upload.quality,
            weight: Weight::kilograms(upload.weight_kg),
            price: None,
            farmer: Some(farmer.clone()),
            retailer: None,
            retailer_contact: None,
            harvest_date: upload.harvest_date.trim().to_string(),
            farm_location: upload.farm_location.clone(),
            status: BatchStatus::PendingVerification,
            earnings: None,
            notes: None,
            sensor_data: None,
            tracking_history: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        record.append_audit(
            BatchStatus::Processing.label(),
            "Batch created",
            format!("{farmer} (Farmer)"),
            upload.farm_location.clone(),
        );

        let saved = self.store.save(record, None).await?;
        info!(
            batch_id = %saved.id,
            lot = ?saved.lot_number,
            crop = %saved.crop,
            "Batch uploaded"
        );
        self.announce(
            Channel::System,
            events::BATCH_UPLOADED,
            json!({ "batch": saved }),
        )
        .await;
        Ok(saved)
    }

    // ----- order path -----------------------------------------------------

    /// Retailer confirms their own order request with the token issued at
    /// placement. The token is single-use: it is cleared by this transition.
    pub async fn confirm_by_retailer(
        &self,
        batch_id: &BatchId,
        token: &str,
    ) -> Result<BatchRecord, WorkflowError> {
        const TRIGGER: &str = "confirm order";

        let record = self.load(batch_id).await?;
        require_status(&record, BatchStatus::RequestedByRetailer, TRIGGER)?;
        match record.confirmation_token.as_deref() {
            Some(stored) if stored == token => {}
            _ => return Err(WorkflowError::AuthorizationMismatch),
        }

        let expected = record.revision;
        let stale_status = record.status;
        let mut updated = record;
        updated.status = BatchStatus::AwaitingFarmerConfirmation;
        updated.confirmation_token = None;
        let retailer = updated
            .retailer
            .clone()
            .unwrap_or_else(|| "Retailer".to_string());
        updated.append_audit(
            "Order Confirmed by Retailer",
            format!("Retailer {retailer} confirmed the order request. Awaiting farmer confirmation."),
            &retailer,
            None,
        );

        let saved = self.commit(updated, expected, TRIGGER, stale_status).await?;
        info!(batch_id = %saved.id, lot = ?saved.lot_number, "Order confirmed by retailer");
        self.announce(
            Channel::Farmer,
            events::NEW_ORDER_REQUEST,
            json!({ "batch": saved }),
        )
        .await;
        Ok(saved)
    }

    /// Farmer accepts a confirmed order, optionally for less than the
    /// requested quantity. Never more, never zero.
    pub async fn confirm_by_farmer(
        &self,
        batch_id: &BatchId,
        confirmation: FarmerConfirmation,
    ) -> Result<BatchRecord, WorkflowError> {
        const TRIGGER: &str = "confirm order";

        let farmer = confirmation.farmer.trim().to_string();
        if farmer.is_empty() {
            return Err(WorkflowError::validation("farmer name is required"));
        }

        let record = self.load(batch_id).await?;
        require_status(&record, BatchStatus::AwaitingFarmerConfirmation, TRIGGER)?;

        let requested_kg = record.weight.value_kg();
        let final_kg = confirmation.quantity_to_sell.unwrap_or(requested_kg);
        if final_kg <= 0.0 || !final_kg.is_finite() {
            return Err(WorkflowError::validation(
                "quantity to sell must be greater than 0",
            ));
        }
        if final_kg > requested_kg {
            return Err(WorkflowError::validation(
                "cannot sell more than the requested quantity",
            ));
        }

        let expected = record.revision;
        let stale_status = record.status;
        let mut updated = record;
        updated.status = BatchStatus::Processing;
        updated.farmer = Some(farmer.clone());
        updated.weight = Weight::kilograms(final_kg);
        let adjustment = if final_kg < requested_kg {
            format!(
                " Quantity adjusted from {}kg to {}kg.",
                format_kg(requested_kg),
                format_kg(final_kg)
            )
        } else {
            String::new()
        };
        let location = updated
            .farm_location
            .clone()
            .unwrap_or_else(|| "Farm Location".to_string());
        updated.append_audit(
            "Farmer Confirmed Order",
            format!(
                "Farmer {farmer} confirmed the order for {}kg of {}.{adjustment}",
                format_kg(final_kg),
                updated.crop
            ),
            &farmer,
            Some(location),
        );

        let saved = self.commit(updated, expected, TRIGGER, stale_status).await?;
        info!(
            batch_id = %saved.id,
            lot = ?saved.lot_number,
            quantity_kg = final_kg,
            "Order confirmed by farmer"
        );
        self.announce(
            Channel::System,
            events::BATCH_CONFIRMED,
            json!({
                "batch": saved,
                "farmerName": farmer,
                "quantityConfirmed": final_kg,
                "originalQuantity": requested_kg,
            }),
        )
        .await;
        if saved.retailer.is_some() {
            self.announce(
                Channel::Retailer,
                events::ORDER_CONFIRMED_BY_FARMER,
                json!({
                    "batch": saved,
                    "message": format!(
                        "Your order for {}kg of {} has been confirmed by the farmer.",
                        format_kg(final_kg),
                        saved.crop
                    ),
                }),
            )
            .await;
        }
        Ok(saved)
    }

    /// Farmer declines a confirmed order. Terminal.
    pub async fn reject_by_farmer(
        &self,
        batch_id: &BatchId,
        rejection: FarmerRejection,
    ) -> Result<BatchRecord, WorkflowError> {
        const TRIGGER: &str = "reject order";

        let record = self.load(batch_id).await?;
        require_status(&record, BatchStatus::AwaitingFarmerConfirmation, TRIGGER)?;

        let reason = rejection
            .reason
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "Order rejected by farmer.".to_string());
        let actor = rejection
            .farmer
            .clone()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| "Farmer".to_string());

        let expected = record.revision;
        let stale_status = record.status;
        let mut updated = record;
        updated.status = BatchStatus::Rejected;
        updated.append_note(&reason);
        updated.append_audit(BatchStatus::Rejected.label(), reason.clone(), &actor, None);

        let saved = self.commit(updated, expected, TRIGGER, stale_status).await?;
        info!(batch_id = %saved.id, lot = ?saved.lot_number, reason = %reason, "Order rejected by farmer");
        let payload = json!({ "batch": saved, "reason": reason });
        self.announce(
            Channel::System,
            events::ORDER_REJECTED_BY_FARMER,
            payload.clone(),
        )
        .await;
        self.announce(
            Channel::Retailer,
            events::ORDER_REJECTED_BY_FARMER,
            payload.clone(),
        )
        .await;
        self.announce(Channel::Distributor, events::ORDER_REJECTED_BY_FARMER, payload)
            .await;
        Ok(saved)
    }

    // ----- distributor path -----------------------------------------------

    /// Distributor verifies quality; the batch leaves the farm gate.
    pub async fn verify_quality(
        &self,
        batch_id: &BatchId,
        update: StatusNote,
    ) -> Result<BatchRecord, WorkflowError> {
        self.distributor_step(
            batch_id,
            "verify quality",
            BatchStatus::PendingVerification,
            BatchStatus::InTransit,
            update.note.unwrap_or_else(|| "Quality inspection completed".to_string()),
            update.actor,
        )
        .await
    }

    /// Distributor records the pickup. Same edge as quality verification;
    /// whichever fires first wins.
    pub async fn mark_in_transit(
        &self,
        batch_id: &BatchId,
        update: StatusNote,
    ) -> Result<BatchRecord, WorkflowError> {
        self.distributor_step(
            batch_id,
            "mark in transit",
            BatchStatus::PendingVerification,
            BatchStatus::InTransit,
            update.note.unwrap_or_else(|| "Picked up by distributor".to_string()),
            update.actor,
        )
        .await
    }

    /// Distributor hands the batch to the retail partner.
    pub async fn mark_delivered(
        &self,
        batch_id: &BatchId,
        update: StatusNote,
    ) -> Result<BatchRecord, WorkflowError> {
        self.distributor_step(
            batch_id,
            "mark delivered",
            BatchStatus::InTransit,
            BatchStatus::Delivered,
            update.note.unwrap_or_else(|| "Delivered to retail partner".to_string()),
            update.actor,
        )
        .await
    }

    async fn distributor_step(
        &self,
        batch_id: &BatchId,
        trigger: &'static str,
        from: BatchStatus,
        to: BatchStatus,
        note: String,
        actor: Option<String>,
    ) -> Result<BatchRecord, WorkflowError> {
        let record = self.load(batch_id).await?;
        require_status(&record, from, trigger)?;

        let expected = record.revision;
        let stale_status = record.status;
        let mut updated = record;
        updated.status = to;
        let actor = actor
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "Distributor".to_string());
        updated.append_audit(to.label(), note, &actor, None);

        let saved = self.commit(updated, expected, trigger, stale_status).await?;
        info!(batch_id = %saved.id, lot = ?saved.lot_number, status = %saved.status, "Batch updated");
        self.announce(
            Channel::Distributor,
            events::BATCH_UPDATED,
            json!({ "batch": saved }),
        )
        .await;
        Ok(saved)
    }

    // ----- retail path ----------------------------------------------------

    /// Retailer sets the retail price (optional) and puts the batch on sale.
    pub async fn publish_for_sale(
        &self,
        batch_id: &BatchId,
        pricing: RetailPricing,
    ) -> Result<BatchRecord, WorkflowError> {
        const TRIGGER: &str = "publish for sale";

        let record = self.load(batch_id).await?;
        require_status(&record, BatchStatus::Delivered, TRIGGER)?;

        let expected = record.revision;
        let stale_status = record.status;
        let mut updated = record;
        updated.status = BatchStatus::ReadyForSale;
        let actor = pricing
            .actor
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "Retailer".to_string());
        let note = match pricing.retail_price.filter(|p| !p.trim().is_empty()) {
            Some(retail_price) => {
                let original = updated
                    .price
                    .replace(retail_price.trim().to_string())
                    .unwrap_or_else(|| "unset".to_string());
                format!(
                    "Retail price set to {} (original farm price: {original}). \
                     Quality approved and made available for consumers",
                    updated.price.as_deref().unwrap_or_default()
                )
            }
            None => "Quality approved and made available for consumers".to_string(),
        };
        updated.append_audit(BatchStatus::ReadyForSale.label(), note, &actor, None);

        let saved = self.commit(updated, expected, TRIGGER, stale_status).await?;
        info!(batch_id = %saved.id, lot = ?saved.lot_number, price = ?saved.price, "Batch published for sale");
        self.announce(
            Channel::System,
            events::BATCH_UPDATED,
            json!({ "batch": saved }),
        )
        .await;
        Ok(saved)
    }

    /// Retailer changes the price of a batch already on sale. The status
    /// stays `ReadyForSale`; the change is still audited.
    pub async fn update_price(
        &self,
        batch_id: &BatchId,
        update: PriceUpdate,
    ) -> Result<BatchRecord, WorkflowError> {
        const TRIGGER: &str = "update price";

        let new_price = update.new_price.trim().to_string();
        if new_price.is_empty() {
            return Err(WorkflowError::validation("a new price is required"));
        }

        let record = self.load(batch_id).await?;
        require_status(&record, BatchStatus::ReadyForSale, TRIGGER)?;

        let expected = record.revision;
        let stale_status = record.status;
        let mut updated = record;
        let old_price = updated
            .price
            .replace(new_price.clone())
            .unwrap_or_else(|| "unset".to_string());
        let actor = update
            .actor
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "Retailer".to_string());
        updated.append_audit(
            BatchStatus::ReadyForSale.label(),
            format!("Price updated from {old_price} to {new_price} by retailer"),
            &actor,
            None,
        );

        let saved = self.commit(updated, expected, TRIGGER, stale_status).await?;
        info!(batch_id = %saved.id, lot = ?saved.lot_number, price = ?saved.price, "Price updated");
        self.announce(
            Channel::System,
            events::BATCH_UPDATED,
            json!({ "batch": saved }),
        )
        .await;
        Ok(saved)
    }

    /// Retailer closes the loop: the batch is sold. Terminal.
    pub async fn mark_sold(
        &self,
        batch_id: &BatchId,
        actor: Option<String>,
    ) -> Result<BatchRecord, WorkflowError> {
        const TRIGGER: &str = "mark sold";

        let record = self.load(batch_id).await?;
        require_status(&record, BatchStatus::ReadyForSale, TRIGGER)?;

        let expected = record.revision;
        let stale_status = record.status;
        let mut updated = record;
        updated.status = BatchStatus::Sold;
        updated.earnings = updated.price.clone();
        let actor = actor
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "Retailer".to_string());
        updated.append_audit(
            BatchStatus::Sold.label(),
            "Successfully sold to consumer",
            &actor,
            None,
        );

        let saved = self.commit(updated, expected, TRIGGER, stale_status).await?;
        info!(batch_id = %saved.id, lot = ?saved.lot_number, earnings = ?saved.earnings, "Batch sold");
        self.announce(
            Channel::System,
            events::BATCH_UPDATED,
            json!({ "batch": saved }),
        )
        .await;
        Ok(saved)
    }

    // ----- sub-events -----------------------------------------------------

    /// Attach a field sensor reading. Informational; allowed in any
    /// non-terminal state and audited like every other mutation.
    pub async fn attach_sensor_reading(
        &self,
        batch_id: &BatchId,
        reading: SensorReading,
        actor: Option<String>,
    ) -> Result<BatchRecord, WorkflowError> {
        const TRIGGER: &str = "record sensor reading";

        let record = self.load(batch_id).await?;
        if record.status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                trigger: TRIGGER,
                status: record.status,
            });
        }

        let expected = record.revision;
        let stale_status = record.status;
        let note = format!(
            "Sensor reading recorded: {}% soil moisture, {}% humidity, {}\u{b0}C",
            reading.soil_moisture, reading.humidity, reading.temperature
        );
        let mut updated = record;
        updated.sensor_data = Some(reading);
        let actor = actor
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "IoT Gateway".to_string());
        updated.append_audit("Sensor Reading", note, &actor, None);

        let saved = self.commit(updated, expected, TRIGGER, stale_status).await?;
        self.announce(
            Channel::System,
            events::BATCH_UPDATED,
            json!({ "batch": saved }),
        )
        .await;
        Ok(saved)
    }

    // ----- reads ----------------------------------------------------------

    pub async fn batch(&self, batch_id: &BatchId) -> Result<BatchRecord, WorkflowError> {
        self.load(batch_id).await
    }

    /// The consumer QR/lot lookup.
    pub async fn batch_by_lot(&self, lot_number: &str) -> Result<BatchRecord, WorkflowError> {
        self.store
            .get_by_lot_number(lot_number)
            .await?
            .ok_or_else(|| WorkflowError::NotFound {
                batch: lot_number.to_string(),
            })
    }

    /// All batches, most recently updated first.
    pub async fn batches(&self) -> Result<Vec<BatchRecord>, WorkflowError> {
        Ok(self.store.list_all().await?)
    }

    // ----- plumbing -------------------------------------------------------

    async fn load(&self, batch_id: &BatchId) -> Result<BatchRecord, WorkflowError> {
        self.store
            .get(batch_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound {
                batch: batch_id.to_string(),
            })
    }

    /// Persist a transition conditioned on the revision that was read. A
    /// conflict means another transition landed first; the caller's read was
    /// stale and the trigger is reported as invalid for the current state.
    async fn commit(
        &self,
        record: BatchRecord,
        expected_revision: u64,
        trigger: &'static str,
        stale_status: BatchStatus,
    ) -> Result<BatchRecord, WorkflowError> {
        let batch_id = record.id.clone();
        match self.store.save(record, Some(expected_revision)).await {
            Ok(saved) => Ok(saved),
            Err(StoreError::RevisionConflict { .. }) => {
                let current_status = self
                    .store
                    .get(&batch_id)
                    .await
                    .ok()
                    .flatten()
                    .map(|current| current.status)
                    .unwrap_or(stale_status);
                warn!(
                    batch_id = %batch_id,
                    trigger = trigger,
                    status = %current_status,
                    "Transition lost a concurrent update race"
                );
                Err(WorkflowError::InvalidState {
                    trigger,
                    status: current_status,
                })
            }
            Err(other) => Err(WorkflowError::Internal(other)),
        }
    }

    /// Best-effort post-commit fan-out. The persisted state is authoritative;
    /// a delivery failure is logged and counted, never raised.
    async fn announce(&self, channel: Channel, event: &str, payload: serde_json::Value) {
        if let Err(err) = self.publisher.publish(channel, event, payload).await {
            warn!(
                channel = %channel,
                event = %event,
                error = %err,
                "Event delivery failed; batch state is already persisted"
            );
        }
    }
}

fn require_status(
    record: &BatchRecord,
    expected: BatchStatus,
    trigger: &'static str,
) -> Result<(), WorkflowError> {
    if record.status != expected {
        return Err(WorkflowError::InvalidState {
            trigger,
            status: record.status,
        });
    }
    Ok(())
}

/// Quantities read naturally in notes: "80", not "80.0".
fn format_kg(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
