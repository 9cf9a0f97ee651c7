mod common;

use std::{sync::Arc, time::Duration};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{TestHousehold, COCA_COLA, COCA_COLA_SHORT, NUTELLA, UNKNOWN};
use hearth::{
    entities::{pantry_item, PantryItem},
    events::{Event, EventSender, InventoryChange},
    services::{
        inventory::{AddOutcome, AssignOutcome, DeleteOutcome, RemoveOutcome},
        CatalogEntry, CatalogSource,
    },
    view::LocationFilter,
    Household, ServiceError,
};
use rstest::rstest;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};

struct BrokenCatalog;

#[async_trait]
impl CatalogSource for BrokenCatalog {
    async fn lookup(&self, _code: &str) -> Result<Option<CatalogEntry>, ServiceError> {
        Err(ServiceError::LookupFault("catalog file is unreadable".into()))
    }
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(7)]
#[tokio::test]
async fn n_add_scans_yield_quantity_n(#[case] n: i32) {
    let t = TestHousehold::new().await;
    let inventory = &t.household.inventory;

    let first = inventory.add_scan(NUTELLA).await.unwrap();
    assert_eq!(
        first,
        AddOutcome::Added {
            name: "Ferrero Nutella (400g)".into()
        }
    );
    for expected in 2..=n {
        assert_eq!(
            inventory.add_scan(NUTELLA).await.unwrap(),
            AddOutcome::Incremented { quantity: expected }
        );
    }

    let item = inventory.get_item(NUTELLA).await.unwrap().unwrap();
    assert_eq!(item.quantity, n);
    assert_eq!(item.location_id, None);
    let scanned = item.last_scanned.expect("last_scanned is set");
    assert!((Utc::now() - scanned).num_seconds() < 5);
}

/// Pushes the row's `last_scanned` three days into the past.
async fn backdate(t: &TestHousehold, barcode: &str) -> DateTime<Utc> {
    let old = Utc::now() - chrono::Duration::days(3);
    PantryItem::update_many()
        .col_expr(pantry_item::Column::LastScanned, Expr::value(old))
        .filter(pantry_item::Column::Barcode.eq(barcode))
        .exec(&*t.household.db)
        .await
        .unwrap();
    old
}

async fn last_scanned(t: &TestHousehold, barcode: &str) -> DateTime<Utc> {
    t.household
        .inventory
        .get_item(barcode)
        .await
        .unwrap()
        .expect("row exists")
        .last_scanned
        .expect("last_scanned is set")
}

#[tokio::test]
async fn scans_move_last_scanned_forward_and_assignment_leaves_it() {
    let t = TestHousehold::new().await;
    let inventory = &t.household.inventory;
    inventory.add_scan(NUTELLA).await.unwrap();
    inventory.add_scan(NUTELLA).await.unwrap();

    let old = backdate(&t, NUTELLA).await;
    assert!((Utc::now() - last_scanned(&t, NUTELLA).await).num_days() >= 2);
    assert_eq!(
        inventory.add_scan(NUTELLA).await.unwrap(),
        AddOutcome::Incremented { quantity: 3 }
    );
    let after_increment = last_scanned(&t, NUTELLA).await;
    assert!(after_increment > old);
    assert!((Utc::now() - after_increment).num_seconds() < 5);

    let old = backdate(&t, NUTELLA).await;
    assert_eq!(
        inventory.remove_scan(NUTELLA).await.unwrap(),
        RemoveOutcome::Decremented { quantity: 2 }
    );
    let after_decrement = last_scanned(&t, NUTELLA).await;
    assert!(after_decrement > old);
    assert!((Utc::now() - after_decrement).num_seconds() < 5);

    backdate(&t, NUTELLA).await;
    let seeded = last_scanned(&t, NUTELLA).await;
    let fridge = t.household.locations.create("Fridge").await.unwrap().id();
    assert_eq!(
        inventory.assign_location(NUTELLA, Some(fridge)).await.unwrap(),
        AssignOutcome::Updated
    );
    assert_eq!(last_scanned(&t, NUTELLA).await, seeded);
}

#[tokio::test]
async fn undrained_refresh_channel_never_stalls_a_mutation() {
    // Room for one event and nobody reading: every later publish finds it full.
    let (sender, mut held) = EventSender::channel(1);
    let household = Household::new(
        common::memory_pool().await,
        Arc::new(common::test_catalog()),
        &common::test_config(),
        Some(sender),
    );

    let mutations = async {
        household.inventory.add_scan(NUTELLA).await?;
        household.inventory.add_scan(NUTELLA).await?;
        household.inventory.add_scan(COCA_COLA).await?;
        household.inventory.remove_scan(COCA_COLA).await?;
        household.locations.create("Fridge").await?;
        Ok::<_, ServiceError>(())
    };
    tokio::time::timeout(Duration::from_secs(2), mutations)
        .await
        .expect("mutations return while the channel is full")
        .unwrap();

    assert_eq!(
        household.inventory.get_item(NUTELLA).await.unwrap().unwrap().quantity,
        2
    );
    assert!(household.inventory.get_item(COCA_COLA).await.unwrap().is_none());

    // Only the first event fit; the rest were dropped.
    assert_matches!(
        held.try_recv(),
        Ok(Event::InventoryChanged {
            change: InventoryChange::Added { .. },
            ..
        })
    );
    assert!(held.try_recv().is_err());
}

#[rstest]
#[case(1)]
#[case(4)]
#[tokio::test]
async fn n_removes_after_n_adds_delete_the_row(#[case] n: i32) {
    let t = TestHousehold::new().await;
    let inventory = &t.household.inventory;

    for _ in 0..n {
        inventory.add_scan(NUTELLA).await.unwrap();
    }
    for remaining in (1..n).rev() {
        assert_eq!(
            inventory.remove_scan(NUTELLA).await.unwrap(),
            RemoveOutcome::Decremented { quantity: remaining }
        );
    }
    assert_eq!(
        inventory.remove_scan(NUTELLA).await.unwrap(),
        RemoveOutcome::RemovedEntirely
    );
    assert!(inventory.get_item(NUTELLA).await.unwrap().is_none());
}

#[tokio::test]
async fn remove_of_absent_barcode_changes_nothing() {
    let t = TestHousehold::new().await;
    let inventory = &t.household.inventory;
    inventory.add_scan(NUTELLA).await.unwrap();

    assert_eq!(
        inventory.remove_scan(COCA_COLA).await.unwrap(),
        RemoveOutcome::NotPresent
    );
    let rows = inventory.list_items(LocationFilter::All).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 1);
}

#[tokio::test]
async fn unknown_barcode_is_not_stored() {
    let t = TestHousehold::new().await;
    let inventory = &t.household.inventory;

    assert_eq!(
        inventory.add_scan(UNKNOWN).await.unwrap(),
        AddOutcome::UnknownBarcode
    );
    assert!(inventory.list_items(LocationFilter::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn leading_zero_fallback_resolves_the_scanned_code() {
    let t = TestHousehold::new().await;
    let inventory = &t.household.inventory;

    assert_eq!(
        inventory.add_scan(COCA_COLA_SHORT).await.unwrap(),
        AddOutcome::Added {
            name: "Coca-Cola (355ml)".into()
        }
    );
    // The row is keyed by what was scanned.
    assert_eq!(t.quantity_of(COCA_COLA_SHORT).await, Some(1));
    assert_eq!(t.quantity_of(COCA_COLA).await, None);
}

#[tokio::test]
async fn lookup_fault_propagates_without_mutation() {
    let t = TestHousehold::with_catalog(Arc::new(BrokenCatalog)).await;
    let inventory = &t.household.inventory;

    let err = inventory.add_scan(COCA_COLA).await.unwrap_err();
    assert_matches!(err, ServiceError::LookupFault(_));
    assert!(err.is_retryable());
    assert!(inventory.list_items(LocationFilter::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn existing_rows_do_not_consult_the_catalog() {
    let t = TestHousehold::new().await;
    t.household.inventory.add_scan(NUTELLA).await.unwrap();

    // Same store, but every lookup now fails: increments must still succeed.
    let broken = hearth::Household::new(
        t.household.db.clone(),
        Arc::new(BrokenCatalog),
        &common::test_config(),
        None,
    );
    assert_eq!(
        broken.inventory.add_scan(NUTELLA).await.unwrap(),
        AddOutcome::Incremented { quantity: 2 }
    );
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("\r\n")]
#[tokio::test]
async fn blank_barcodes_are_rejected(#[case] input: &str) {
    let t = TestHousehold::new().await;
    assert_matches!(
        t.household.inventory.add_scan(input).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        t.household.inventory.remove_scan(input).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn scanner_whitespace_is_trimmed() {
    let t = TestHousehold::new().await;
    t.household
        .inventory
        .add_scan(&format!("  {NUTELLA}\n"))
        .await
        .unwrap();
    assert_eq!(t.quantity_of(NUTELLA).await, Some(1));
}

#[tokio::test]
async fn delete_item_removes_regardless_of_quantity() {
    let t = TestHousehold::new().await;
    let inventory = &t.household.inventory;
    for _ in 0..5 {
        inventory.add_scan(NUTELLA).await.unwrap();
    }

    assert_eq!(inventory.delete_item(NUTELLA).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(
        inventory.delete_item(NUTELLA).await.unwrap(),
        DeleteOutcome::NotPresent
    );
    assert_eq!(t.quantity_of(NUTELLA).await, None);
}

#[tokio::test]
async fn coca_cola_session() {
    let mut t = TestHousehold::new().await;
    let inventory = t.household.inventory.clone();

    assert_eq!(
        inventory.add_scan(UNKNOWN).await.unwrap(),
        AddOutcome::UnknownBarcode
    );
    assert!(inventory.list_items(LocationFilter::All).await.unwrap().is_empty());

    assert_eq!(
        inventory.add_scan(COCA_COLA).await.unwrap(),
        AddOutcome::Added {
            name: "Coca-Cola (355ml)".into()
        }
    );
    assert_eq!(
        inventory.add_scan(COCA_COLA).await.unwrap(),
        AddOutcome::Incremented { quantity: 2 }
    );

    let rows = inventory.list_items(LocationFilter::All).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Coca-Cola (355ml)");
    assert_eq!(rows[0].quantity, 2);
    assert_eq!(rows[0].location_label(), "-");

    assert_eq!(
        inventory.remove_scan(COCA_COLA).await.unwrap(),
        RemoveOutcome::Decremented { quantity: 1 }
    );
    assert_eq!(
        inventory.remove_scan(COCA_COLA).await.unwrap(),
        RemoveOutcome::RemovedEntirely
    );
    assert!(inventory.list_items(LocationFilter::All).await.unwrap().is_empty());

    let changes: Vec<InventoryChange> = t
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            Event::InventoryChanged { barcode, change } if barcode == COCA_COLA => Some(change),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        vec![
            InventoryChange::Added {
                name: "Coca-Cola (355ml)".into()
            },
            InventoryChange::Incremented { quantity: 2 },
            InventoryChange::Decremented { quantity: 1 },
            InventoryChange::Removed,
        ]
    );
}

#[tokio::test]
async fn details_view_reads_the_catalog() {
    let t = TestHousehold::new().await;
    let entry = t
        .household
        .inventory
        .resolver()
        .details(COCA_COLA_SHORT)
        .await
        .unwrap();
    assert_eq!(entry.category_summary(), "Beverages, Sodas");
    assert_eq!(entry.nutrition.rows()[0].display_value(), "42");
}

#[tokio::test]
async fn quantities_survive_a_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("pantry.db").display());

    for expected in 1..=2 {
        let pool = hearth::db::establish_connection(&url).await.unwrap();
        hearth::db::run_migrations(&pool).await.unwrap();
        let household = hearth::Household::new(
            Arc::new(pool),
            Arc::new(common::test_catalog()),
            &common::test_config(),
            None,
        );
        household.inventory.add_scan(NUTELLA).await.unwrap();
        assert_eq!(
            household.inventory.get_item(NUTELLA).await.unwrap().unwrap().quantity,
            expected
        );
    }
}
