use crate::{
    db::{self, DbPool},
    entities::{
        location::{self, Entity as Location},
        pantry_item::{self, Entity as PantryItem},
    },
    errors::ServiceError,
    events::{Event, EventSender, InventoryChange},
    services::catalog::CatalogResolver,
    view::{InventoryRow, InventoryView, LocationFilter},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Result of an add scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AddOutcome {
    /// First sighting; a row was created with quantity 1.
    Added { name: String },
    Incremented { quantity: i32 },
    /// The catalog does not know the barcode; nothing was written.
    UnknownBarcode,
}

/// Result of a remove scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RemoveOutcome {
    Decremented { quantity: i32 },
    /// The last unit was removed, so the row is gone.
    RemovedEntirely,
    NotPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeleteOutcome {
    Deleted,
    NotPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignOutcome {
    Updated,
    NotPresent,
}

/// Trims a scanned barcode and rejects blank input.
pub fn normalize_barcode(raw: &str) -> Result<String, ServiceError> {
    let barcode = raw.trim();
    if barcode.is_empty() {
        return Err(ServiceError::ValidationError(
            "barcode must not be empty".to_string(),
        ));
    }
    Ok(barcode.to_string())
}

/// Adds one unit to an existing row. `None` when no row exists.
async fn increment<C: ConnectionTrait>(
    conn: &C,
    barcode: &str,
    now: DateTime<Utc>,
) -> Result<Option<i32>, ServiceError> {
    let result = PantryItem::update_many()
        .col_expr(
            pantry_item::Column::Quantity,
            Expr::col(pantry_item::Column::Quantity).add(1),
        )
        .col_expr(pantry_item::Column::LastScanned, Expr::value(now))
        .filter(pantry_item::Column::Barcode.eq(barcode))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Ok(None);
    }
    current_quantity(conn, barcode).await.map(Some)
}

async fn current_quantity<C: ConnectionTrait>(conn: &C, barcode: &str) -> Result<i32, ServiceError> {
    PantryItem::find_by_id(barcode.to_owned())
        .one(conn)
        .await?
        .map(|item| item.quantity)
        .ok_or_else(|| {
            ServiceError::InternalError(format!("row for {barcode} vanished inside its transaction"))
        })
}

/// The pantry inventory store.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    resolver: CatalogResolver,
    event_sender: Option<EventSender>,
}

impl InventoryService {
    /// Creates a new inventory service instance
    pub fn new(db_pool: Arc<DbPool>, resolver: CatalogResolver) -> Self {
        Self {
            db_pool,
            resolver,
            event_sender: None,
        }
    }

    /// Publishes a refresh event after every committed mutation
    pub fn with_events(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    pub fn resolver(&self) -> &CatalogResolver {
        &self.resolver
    }

    fn publish(&self, barcode: &str, change: InventoryChange) {
        let Some(sender) = &self.event_sender else {
            return;
        };
        let event = Event::InventoryChanged {
            barcode: barcode.to_string(),
            change,
        };
        // The mutation is already committed; a slow or missing listener must not hold it.
        if let Err(e) = sender.try_send(event) {
            warn!(barcode, error = %e, "inventory event dropped");
        }
    }

    /// Registers one unit of `barcode`.
    ///
    /// The catalog is consulted only on first sighting, and before any
    /// transaction is opened, so a slow lookup never holds a write lock.
    #[instrument(skip(self))]
    pub async fn add_scan(&self, barcode: &str) -> Result<AddOutcome, ServiceError> {
        let barcode = normalize_barcode(barcode)?;

        let existing = {
            let barcode = barcode.clone();
            db::transaction(&self.db_pool, "add_scan.increment", move |txn| {
                Box::pin(async move { increment(txn, &barcode, Utc::now()).await })
            })
            .await?
        };

        if let Some(quantity) = existing {
            counter!("hearth_inventory.add_scan", 1, "outcome" => "incremented");
            info!(barcode = %barcode, quantity, "incremented pantry item");
            self.publish(&barcode, InventoryChange::Incremented { quantity });
            return Ok(AddOutcome::Incremented { quantity });
        }

        let Some(entry) = self.resolver.resolve(&barcode).await? else {
            counter!("hearth_inventory.add_scan", 1, "outcome" => "unknown");
            warn!(barcode = %barcode, "no catalog entry for scanned barcode");
            return Ok(AddOutcome::UnknownBarcode);
        };
        let name = entry.display_name();

        let inserted = {
            let barcode = barcode.clone();
            db::transaction(&self.db_pool, "add_scan.insert", move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    // Another session may have inserted the row while we were resolving.
                    if let Some(quantity) = increment(txn, &barcode, now).await? {
                        return Ok(AddOutcome::Incremented { quantity });
                    }

                    pantry_item::ActiveModel {
                        barcode: Set(barcode),
                        name: Set(name.clone()),
                        quantity: Set(1),
                        last_scanned: Set(Some(now)),
                        location_id: Set(None),
                    }
                    .insert(txn)
                    .await?;

                    Ok(AddOutcome::Added { name })
                })
            })
            .await
        };

        let outcome = match inserted {
            Ok(outcome) => outcome,
            // Lost the first-sighting race: another session committed the row
            // between our increment and our insert.
            Err(err) if err.is_unique_violation() => {
                warn!(barcode = %barcode, "concurrent first sighting, counting against the new row");
                let quantity = {
                    let barcode = barcode.clone();
                    db::transaction(&self.db_pool, "add_scan.retry", move |txn| {
                        Box::pin(async move { increment(txn, &barcode, Utc::now()).await })
                    })
                    .await?
                };
                let quantity = quantity.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "row for {barcode} conflicted on insert but could not be incremented"
                    ))
                })?;
                AddOutcome::Incremented { quantity }
            }
            Err(e) => return Err(e),
        };

        match &outcome {
            AddOutcome::Added { name } => {
                counter!("hearth_inventory.add_scan", 1, "outcome" => "added");
                info!(barcode = %barcode, name = %name, "added new pantry item");
                self.publish(&barcode, InventoryChange::Added { name: name.clone() });
            }
            AddOutcome::Incremented { quantity } => {
                counter!("hearth_inventory.add_scan", 1, "outcome" => "incremented");
                self.publish(&barcode, InventoryChange::Incremented { quantity: *quantity });
            }
            AddOutcome::UnknownBarcode => {}
        }

        Ok(outcome)
    }

    /// Takes one unit of `barcode` out; the row is deleted with its last unit.
    #[instrument(skip(self))]
    pub async fn remove_scan(&self, barcode: &str) -> Result<RemoveOutcome, ServiceError> {
        let barcode = normalize_barcode(barcode)?;

        let outcome = {
            let barcode = barcode.clone();
            db::transaction(&self.db_pool, "remove_scan", move |txn| {
                Box::pin(async move {
                    let decremented = PantryItem::update_many()
                        .col_expr(
                            pantry_item::Column::Quantity,
                            Expr::col(pantry_item::Column::Quantity).sub(1),
                        )
                        .col_expr(pantry_item::Column::LastScanned, Expr::value(Utc::now()))
                        .filter(pantry_item::Column::Barcode.eq(barcode.as_str()))
                        .filter(pantry_item::Column::Quantity.gt(1))
                        .exec(txn)
                        .await?;

                    if decremented.rows_affected > 0 {
                        let quantity = current_quantity(txn, &barcode).await?;
                        return Ok(RemoveOutcome::Decremented { quantity });
                    }

                    let deleted = PantryItem::delete_many()
                        .filter(pantry_item::Column::Barcode.eq(barcode.as_str()))
                        .exec(txn)
                        .await?;

                    if deleted.rows_affected > 0 {
                        Ok(RemoveOutcome::RemovedEntirely)
                    } else {
                        Ok(RemoveOutcome::NotPresent)
                    }
                })
            })
            .await?
        };

        match &outcome {
            RemoveOutcome::Decremented { quantity } => {
                counter!("hearth_inventory.remove_scan", 1, "outcome" => "decremented");
                info!(barcode = %barcode, quantity, "decremented pantry item");
                self.publish(&barcode, InventoryChange::Decremented { quantity: *quantity });
            }
            RemoveOutcome::RemovedEntirely => {
                counter!("hearth_inventory.remove_scan", 1, "outcome" => "removed");
                info!(barcode = %barcode, "removed last unit of pantry item");
                self.publish(&barcode, InventoryChange::Removed);
            }
            RemoveOutcome::NotPresent => {
                counter!("hearth_inventory.remove_scan", 1, "outcome" => "not_present");
                warn!(barcode = %barcode, "remove scan for barcode not in pantry");
            }
        }

        Ok(outcome)
    }

    /// Removes the row regardless of its quantity.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, barcode: &str) -> Result<DeleteOutcome, ServiceError> {
        let barcode = normalize_barcode(barcode)?;

        let result = PantryItem::delete_by_id(barcode.clone())
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Ok(DeleteOutcome::NotPresent);
        }

        info!(barcode = %barcode, "deleted pantry item");
        self.publish(&barcode, InventoryChange::Deleted);
        Ok(DeleteOutcome::Deleted)
    }

    /// Binds the item to a location, or clears the binding with `None`.
    ///
    /// Does not touch `last_scanned`.
    #[instrument(skip(self))]
    pub async fn assign_location(
        &self,
        barcode: &str,
        location_id: Option<i32>,
    ) -> Result<AssignOutcome, ServiceError> {
        let barcode = normalize_barcode(barcode)?;

        let outcome = {
            let barcode = barcode.clone();
            db::transaction(&self.db_pool, "assign_location", move |txn| {
                Box::pin(async move {
                    if let Some(id) = location_id {
                        if Location::find_by_id(id).one(txn).await?.is_none() {
                            return Err(ServiceError::ValidationError(format!(
                                "location {id} does not exist"
                            )));
                        }
                    }

                    let result = PantryItem::update_many()
                        .col_expr(pantry_item::Column::LocationId, Expr::value(location_id))
                        .filter(pantry_item::Column::Barcode.eq(barcode.as_str()))
                        .exec(txn)
                        .await?;

                    Ok(if result.rows_affected == 0 {
                        AssignOutcome::NotPresent
                    } else {
                        AssignOutcome::Updated
                    })
                })
            })
            .await?
        };

        if outcome == AssignOutcome::Updated {
            info!(barcode = %barcode, location_id = ?location_id, "assigned pantry item location");
            self.publish(&barcode, InventoryChange::LocationAssigned { location_id });
        }
        Ok(outcome)
    }

    /// Gets a single pantry row
    #[instrument(skip(self))]
    pub async fn get_item(&self, barcode: &str) -> Result<Option<pantry_item::Model>, ServiceError> {
        let barcode = normalize_barcode(barcode)?;
        PantryItem::find_by_id(barcode)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists pantry rows for `filter`, sorted by name and annotated with age and location.
    #[instrument(skip(self))]
    pub async fn list_items(&self, filter: LocationFilter) -> Result<Vec<InventoryRow>, ServiceError> {
        let mut query = PantryItem::find().find_also_related(Location);
        if let LocationFilter::Only(id) = filter {
            query = query.filter(pantry_item::Column::LocationId.eq(id));
        }

        let pairs: Vec<(pantry_item::Model, Option<location::Model>)> = query
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(InventoryView::project(pairs, filter, Utc::now()))
    }
}
