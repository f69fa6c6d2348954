//! Order-path guard tests: token authorization, quantity policy, and the
//! no-mutation-on-failure contract.

use freshtrace::push::{events, Channel};
use freshtrace::store::BatchRepository;
use freshtrace::{BatchStatus, FarmerConfirmation, WorkflowError};

mod common;
use common::{harness, tomato_order};

#[tokio::test]
async fn wrong_token_is_an_authorization_mismatch() {
    let h = harness();
    let placed = h.engine.place_order(tomato_order()).await.unwrap();

    let err = h
        .engine
        .confirm_by_retailer(&placed.id, "0x0000")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::AuthorizationMismatch));

    // Nothing was persisted and nothing was announced.
    let current = h.store.get(&placed.id).await.unwrap().unwrap();
    assert_eq!(current, placed);
    assert!(h.publisher.events().is_empty());
}

#[tokio::test]
async fn token_is_single_use() {
    let h = harness();
    let placed = h.engine.place_order(tomato_order()).await.unwrap();
    let token = placed.confirmation_token.clone().unwrap();

    let confirmed = h
        .engine
        .confirm_by_retailer(&placed.id, &token)
        .await
        .unwrap();
    assert!(confirmed.confirmation_token.is_none());

    let err = h
        .engine
        .confirm_by_retailer(&placed.id, &token)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidState {
            status: BatchStatus::AwaitingFarmerConfirmation,
            ..
        }
    ));
}

#[tokio::test]
async fn quantity_policy_is_enforced_exactly() {
    let h = harness();
    let placed = h.engine.place_order(tomato_order()).await.unwrap();
    let token = placed.confirmation_token.clone().unwrap();
    h.engine
        .confirm_by_retailer(&placed.id, &token)
        .await
        .unwrap();

    // Over-quantity is a validation failure, never silently clamped.
    let err = h
        .engine
        .confirm_by_farmer(
            &placed.id,
            FarmerConfirmation {
                farmer: "Manish".to_string(),
                quantity_to_sell: Some(100.1),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation { .. }));

    // Anything in (0, requested] succeeds and becomes the weight.
    let accepted = h
        .engine
        .confirm_by_farmer(
            &placed.id,
            FarmerConfirmation {
                farmer: "Manish".to_string(),
                quantity_to_sell: Some(99.5),
            },
        )
        .await
        .unwrap();
    assert_eq!(accepted.weight.value_kg(), 99.5);
    assert_eq!(accepted.status, BatchStatus::Processing);
}

#[tokio::test]
async fn double_confirmation_fails_with_invalid_state() {
    let h = harness();
    let placed = h.engine.place_order(tomato_order()).await.unwrap();
    let token = placed.confirmation_token.clone().unwrap();
    h.engine
        .confirm_by_retailer(&placed.id, &token)
        .await
        .unwrap();

    let confirmation = FarmerConfirmation {
        farmer: "Manish".to_string(),
        quantity_to_sell: Some(80.0),
    };
    let first = h
        .engine
        .confirm_by_farmer(&placed.id, confirmation.clone())
        .await;
    assert!(first.is_ok());

    let second = h.engine.confirm_by_farmer(&placed.id, confirmation).await;
    assert!(matches!(
        second,
        Err(WorkflowError::InvalidState {
            status: BatchStatus::Processing,
            ..
        })
    ));

    // The retry did not double-apply: weight still reflects one confirmation.
    let current = h.store.get(&placed.id).await.unwrap().unwrap();
    assert_eq!(current.weight.to_string(), "80 kg");
    assert_eq!(
        current
            .tracking_history
            .iter()
            .filter(|e| e.status == "Farmer Confirmed Order")
            .count(),
        1
    );
}

#[tokio::test]
async fn confirmation_fan_out_reaches_system_and_retailer() {
    let h = harness();
    let placed = h.engine.place_order(tomato_order()).await.unwrap();
    let token = placed.confirmation_token.clone().unwrap();
    h.engine
        .confirm_by_retailer(&placed.id, &token)
        .await
        .unwrap();

    h.engine
        .confirm_by_farmer(
            &placed.id,
            FarmerConfirmation {
                farmer: "Manish".to_string(),
                quantity_to_sell: Some(80.0),
            },
        )
        .await
        .unwrap();

    let system = h.publisher.events_on(Channel::System);
    assert!(system
        .iter()
        .any(|e| e.event == events::BATCH_CONFIRMED && e.payload["farmerName"] == "Manish"));

    let retailer = h.publisher.events_on(Channel::Retailer);
    assert_eq!(retailer.len(), 1);
    assert_eq!(retailer[0].event, events::ORDER_CONFIRMED_BY_FARMER);
    let message = retailer[0].payload["message"].as_str().unwrap();
    assert!(message.contains("80"), "retailer message was: {message}");
}
