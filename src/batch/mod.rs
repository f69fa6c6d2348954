// Batch Data Model - one produce lot moving through the supply chain
//
// Records are mutated exclusively through workflow transitions; the audit
// trail is embedded in the record so a single read returns the full history.

pub mod identity;
pub mod record;
pub mod status;
pub mod weight;

pub use identity::{generate_confirmation_token, generate_lot_number, qr_asset_path, BatchId};
pub use record::{AuditEntry, BatchRecord, Grade, SensorReading};
pub use status::BatchStatus;
pub use weight::Weight;
