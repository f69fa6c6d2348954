use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::Instrument;

use freshtrace::batch::{BatchId, BatchRecord, Grade, SensorReading};
use freshtrace::config::FreshtraceConfig;
use freshtrace::push::{EventPublisher, PushRelayClient, RelayRetryConfig, TracingPublisher};
use freshtrace::store::{BatchRepository, MemoryBatchStore};
use freshtrace::workflow::{
    DirectUpload, FarmerConfirmation, FarmerRejection, OrderRequest, PriceUpdate, RetailPricing,
    StatusNote, WorkflowEngine,
};

#[derive(Parser)]
#[command(name = "freshtrace")]
#[command(about = "Farm-to-consumer produce batch tracking")]
#[command(
    long_about = "FreshTrace tracks produce batches from harvest (or retailer order) through \
                  verification, transport, pricing, and sale, with a tamper-evident audit trail \
                  and real-time notifications to every party."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a harvest batch directly (farmer entry point)
    Upload {
        #[arg(long)]
        crop: String,
        /// Weight in kilograms
        #[arg(long)]
        weight: f64,
        #[arg(long, help = "Harvest date, YYYY-MM-DD")]
        harvest_date: String,
        #[arg(long, default_value = "A", help = "Quality grade: A+, A, B, or C")]
        quality: String,
        #[arg(long)]
        farmer: String,
        #[arg(long)]
        location: Option<String>,
    },
    /// Place a retailer order request (retailer entry point)
    Order {
        #[arg(long)]
        crop: String,
        /// Requested quantity in kilograms
        #[arg(long)]
        quantity: f64,
        #[arg(long, default_value = "A", help = "Quality grade: A+, A, B, or C")]
        grade: String,
        #[arg(long, help = "Contact person placing the order")]
        contact: String,
        #[arg(long)]
        phone: String,
        #[arg(long, help = "Total expected price, e.g. '₹800'")]
        price: String,
        #[arg(long, help = "Preferred harvest date, YYYY-MM-DD")]
        date: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Confirm a placed order with its confirmation token (retailer)
    ConfirmOrder {
        #[arg(long)]
        batch: String,
        #[arg(long)]
        token: String,
    },
    /// Accept a pending order, optionally for a smaller quantity (farmer)
    Accept {
        #[arg(long)]
        batch: String,
        #[arg(long)]
        farmer: String,
        #[arg(long, help = "Quantity to fulfill in kg; defaults to the requested amount")]
        quantity: Option<f64>,
    },
    /// Reject a pending order (farmer)
    Reject {
        #[arg(long)]
        batch: String,
        #[arg(long)]
        farmer: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Verify batch quality and send it on its way (distributor)
    Verify {
        #[arg(long)]
        batch: String,
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Record the distributor pickup (distributor)
    Transit {
        #[arg(long)]
        batch: String,
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Mark a batch delivered to the retail partner (distributor)
    Deliver {
        #[arg(long)]
        batch: String,
        #[arg(long)]
        actor: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Put a delivered batch on sale, optionally setting the retail price (retailer)
    Publish {
        #[arg(long)]
        batch: String,
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Change the price of a batch already on sale (retailer)
    Reprice {
        #[arg(long)]
        batch: String,
        #[arg(long)]
        price: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Mark a batch sold (retailer)
    Sell {
        #[arg(long)]
        batch: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Attach a field sensor reading to a batch
    Sensor {
        #[arg(long)]
        batch: String,
        #[arg(long)]
        moisture: f64,
        #[arg(long)]
        humidity: f64,
        #[arg(long)]
        temperature: f64,
        #[arg(long, help = "GPS coordinates, e.g. '34.0522,-118.2437'")]
        gps: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// List all batches, most recently updated first
    List,
    /// Look a batch up by lot number (the consumer QR path)
    Track {
        #[arg(long)]
        lot: String,
    },
    /// Show one batch with its full audit trail
    Show {
        #[arg(long)]
        batch: String,
    },
    /// Run both lifecycle paths end to end against an in-memory store
    Demo,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tokio::runtime::Runtime::new()?.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    freshtrace::telemetry::init_telemetry()?;
    freshtrace::config::init_config()?;

    let correlation_id = freshtrace::telemetry::generate_correlation_id();
    let span = freshtrace::telemetry::create_workflow_span("cli", None, None, Some(&correlation_id));
    let result = dispatch(cli).instrument(span).await;
    freshtrace::telemetry::shutdown_telemetry();
    result
}

async fn dispatch(cli: Cli) -> Result<()> {
    if matches!(cli.command, Commands::Demo) {
        return demo_command().await;
    }

    let engine = build_engine().await?;
    match cli.command {
        Commands::Upload {
            crop,
            weight,
            harvest_date,
            quality,
            farmer,
            location,
        } => {
            let quality: Grade = quality
                .parse()
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            let batch = engine
                .upload_direct(DirectUpload {
                    crop,
                    weight_kg: weight,
                    harvest_date,
                    quality,
                    farmer,
                    farm_location: location,
                })
                .await?;
            println!("📦 Batch uploaded and pending verification");
            print_batch(&batch);
        }
        Commands::Order {
            crop,
            quantity,
            grade,
            contact,
            phone,
            price,
            date,
            notes,
        } => {
            let grade: Grade = grade.parse().map_err(|e| anyhow::anyhow!("{e}"))?;
            let batch = engine
                .place_order(OrderRequest {
                    crop,
                    quantity_kg: quantity,
                    grade,
                    contact_person: contact,
                    contact_phone: phone,
                    preferred_date: date,
                    price,
                    notes,
                })
                .await?;
            println!("📦 Order request placed; confirm it with the token below");
            print_batch(&batch);
            if let Some(token) = &batch.confirmation_token {
                println!("   Confirmation token: {token}");
            }
        }
        Commands::ConfirmOrder { batch, token } => {
            let batch = engine
                .confirm_by_retailer(&BatchId::from(batch), &token)
                .await?;
            println!("✅ Order confirmed; farmers have been notified");
            print_batch(&batch);
        }
        Commands::Accept {
            batch,
            farmer,
            quantity,
        } => {
            let batch = engine
                .confirm_by_farmer(
                    &BatchId::from(batch),
                    FarmerConfirmation {
                        farmer,
                        quantity_to_sell: quantity,
                    },
                )
                .await?;
            println!("✅ Order accepted; batch is processing");
            print_batch(&batch);
        }
        Commands::Reject {
            batch,
            farmer,
            reason,
        } => {
            let batch = engine
                .reject_by_farmer(&BatchId::from(batch), FarmerRejection { farmer, reason })
                .await?;
            println!("🚫 Order rejected");
            print_batch(&batch);
        }
        Commands::Verify { batch, actor, note } => {
            let batch = engine
                .verify_quality(&BatchId::from(batch), StatusNote { actor, note })
                .await?;
            println!("✅ Quality verified; batch is in transit");
            print_batch(&batch);
        }
        Commands::Transit { batch, actor, note } => {
            let batch = engine
                .mark_in_transit(&BatchId::from(batch), StatusNote { actor, note })
                .await?;
            println!("🚚 Pickup recorded; batch is in transit");
            print_batch(&batch);
        }
        Commands::Deliver { batch, actor, note } => {
            let batch = engine
                .mark_delivered(&BatchId::from(batch), StatusNote { actor, note })
                .await?;
            println!("📬 Batch delivered");
            print_batch(&batch);
        }
        Commands::Publish {
            batch,
            price,
            actor,
        } => {
            let batch = engine
                .publish_for_sale(
                    &BatchId::from(batch),
                    RetailPricing {
                        retail_price: price,
                        actor,
                    },
                )
                .await?;
            println!("🛒 Batch is ready for sale");
            print_batch(&batch);
        }
        Commands::Reprice {
            batch,
            price,
            actor,
        } => {
            let batch = engine
                .update_price(
                    &BatchId::from(batch),
                    PriceUpdate {
                        new_price: price,
                        actor,
                    },
                )
                .await?;
            println!("🏷️  Price updated");
            print_batch(&batch);
        }
        Commands::Sell { batch, actor } => {
            let batch = engine.mark_sold(&BatchId::from(batch), actor).await?;
            println!("💰 Batch sold");
            print_batch(&batch);
        }
        Commands::Sensor {
            batch,
            moisture,
            humidity,
            temperature,
            gps,
            actor,
        } => {
            let batch = engine
                .attach_sensor_reading(
                    &BatchId::from(batch),
                    SensorReading {
                        soil_moisture: moisture,
                        humidity,
                        temperature,
                        gps_coordinates: gps,
                        captured_at: chrono::Utc::now(),
                    },
                    actor,
                )
                .await?;
            println!("🌡️  Sensor reading recorded");
            print_batch(&batch);
        }
        Commands::List => {
            let batches = engine.batches().await?;
            if batches.is_empty() {
                println!("No batches yet.");
            } else {
                println!("📋 {} batch(es):", batches.len());
                for batch in batches {
                    print_batch(&batch);
                }
            }
        }
        Commands::Track { lot } => {
            let batch = engine.batch_by_lot(&lot).await?;
            print_batch(&batch);
            print_history(&batch);
        }
        Commands::Show { batch } => {
            let batch = engine.batch(&BatchId::from(batch)).await?;
            print_batch(&batch);
            print_history(&batch);
        }
        Commands::Demo => unreachable!("handled above"),
    }

    Ok(())
}

async fn build_engine() -> Result<WorkflowEngine> {
    let cfg = freshtrace::config::config()?;

    let store: Arc<dyn BatchRepository> = match cfg.store.backend.as_str() {
        "memory" => Arc::new(MemoryBatchStore::new()),
        "sqlite" => build_sqlite_store(cfg).await?,
        other => bail!("unknown store backend: {other}"),
    };

    let publisher: Arc<dyn EventPublisher> = if cfg.push.enabled {
        let endpoint = cfg
            .push
            .endpoint
            .clone()
            .context("push.enabled requires push.endpoint")?;
        let token = cfg
            .push
            .token
            .clone()
            .context("push.enabled requires a relay token (FRESHTRACE_PUSH_TOKEN)")?;
        Arc::new(PushRelayClient::with_retry(
            endpoint,
            token,
            cfg.push.publishes_per_second,
            cfg.push.burst_capacity,
            RelayRetryConfig {
                max_attempts: cfg.push.max_attempts,
                ..RelayRetryConfig::default()
            },
        )?)
    } else {
        Arc::new(TracingPublisher::new())
    };

    Ok(WorkflowEngine::new(store, publisher))
}

#[cfg(feature = "database")]
async fn build_sqlite_store(cfg: &FreshtraceConfig) -> Result<Arc<dyn BatchRepository>> {
    let db = cfg
        .store
        .database
        .clone()
        .context("store.database must be configured for the sqlite backend")?;
    let store = freshtrace::store::SqliteBatchStore::connect(&db.url, db.auto_migrate).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "database"))]
async fn build_sqlite_store(_cfg: &FreshtraceConfig) -> Result<Arc<dyn BatchRepository>> {
    bail!("the sqlite backend requires building with --features database")
}

fn print_batch(batch: &BatchRecord) {
    println!(
        "   {} | {} | {} | {} | {}",
        batch.lot_number.as_deref().unwrap_or("(no lot)"),
        batch.crop,
        batch.weight,
        batch.status,
        batch.price.as_deref().unwrap_or("-")
    );
    println!("   id: {}", batch.id);
}

fn print_history(batch: &BatchRecord) {
    println!("   History ({} entries):", batch.tracking_history.len());
    for entry in &batch.tracking_history {
        println!(
            "     {} | {} | {} | {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.status,
            entry.note,
            entry.actor
        );
    }
}

/// Walk both entry paths end to end against an in-memory store so the whole
/// lifecycle can be seen without any setup.
async fn demo_command() -> Result<()> {
    let timer = freshtrace::OperationTimer::new("demo");
    let store = Arc::new(MemoryBatchStore::new());
    let publisher = Arc::new(TracingPublisher::new());
    let engine = WorkflowEngine::new(store, publisher);

    println!("— Retailer order path —");
    let placed = engine
        .place_order(OrderRequest {
            crop: "Tomatoes".to_string(),
            quantity_kg: 100.0,
            grade: Grade::A,
            contact_person: "Fresh Market Co.".to_string(),
            contact_phone: "555-0100".to_string(),
            preferred_date: None,
            price: "₹800".to_string(),
            notes: None,
        })
        .await?;
    print_batch(&placed);

    let token = placed
        .confirmation_token
        .clone()
        .context("a placed order carries a token")?;
    let confirmed = engine.confirm_by_retailer(&placed.id, &token).await?;
    print_batch(&confirmed);

    let accepted = engine
        .confirm_by_farmer(
            &placed.id,
            FarmerConfirmation {
                farmer: "Manish".to_string(),
                quantity_to_sell: Some(80.0),
            },
        )
        .await?;
    print_batch(&accepted);

    println!("— Farmer direct-upload path —");
    let uploaded = engine
        .upload_direct(DirectUpload {
            crop: "Carrots".to_string(),
            weight_kg: 200.0,
            harvest_date: "2024-01-14".to_string(),
            quality: Grade::APlus,
            farmer: "Sarah Johnson".to_string(),
            farm_location: Some("Sunny Acres Farm, OR".to_string()),
        })
        .await?;
    engine
        .verify_quality(&uploaded.id, StatusNote::default())
        .await?;
    engine
        .mark_delivered(&uploaded.id, StatusNote::default())
        .await?;
    engine
        .publish_for_sale(
            &uploaded.id,
            RetailPricing {
                retail_price: Some("$12".to_string()),
                actor: Some("Fresh Market Co.".to_string()),
            },
        )
        .await?;
    engine
        .update_price(
            &uploaded.id,
            PriceUpdate {
                new_price: "$10".to_string(),
                actor: None,
            },
        )
        .await?;
    let sold = engine.mark_sold(&uploaded.id, None).await?;
    print_batch(&sold);
    print_history(&sold);

    freshtrace::observability::publish_metrics().log_stats();
    timer.finish();
    Ok(())
}
