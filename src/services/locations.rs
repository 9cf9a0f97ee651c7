use crate::{
    db::{self, DbPool},
    entities::{
        location::{self, Entity as Location},
        pantry_item::{self, Entity as PantryItem},
    },
    errors::ServiceError,
    events::{Event, EventSender, LocationChange},
};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Input for creating a storage location
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateLocationInput {
    #[validate(length(min = 1, max = 100, message = "Location name must be 1-100 characters"))]
    pub name: String,
}

impl CreateLocationInput {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().trim().to_string(),
        }
    }
}

/// Result of asking for a location by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CreateLocationOutcome {
    Created(location::Model),
    /// A location with the same name, ignoring case, already exists.
    AlreadyExists(location::Model),
}

impl CreateLocationOutcome {
    pub fn id(&self) -> i32 {
        self.location().id
    }

    pub fn location(&self) -> &location::Model {
        match self {
            Self::Created(l) | Self::AlreadyExists(l) => l,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Registry of named storage places.
#[derive(Clone)]
pub struct LocationService {
    db_pool: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl LocationService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            db_pool,
            event_sender: None,
        }
    }

    pub fn with_events(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    fn publish(&self, location_id: i32, change: LocationChange) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.try_send(Event::LocationsChanged {
                location_id,
                change,
            }) {
                warn!(location_id, error = %e, "location event dropped");
            }
        }
    }

    async fn find_by_name_ci<C: sea_orm::ConnectionTrait>(
        conn: &C,
        name: &str,
    ) -> Result<Option<location::Model>, DbErr> {
        Location::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(location::Column::Name)))
                    .eq(name.to_lowercase()),
            )
            .one(conn)
            .await
    }

    /// Creates a location, or returns the existing one whose name matches ignoring case.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str) -> Result<CreateLocationOutcome, ServiceError> {
        let input = CreateLocationInput::new(name);
        input.validate()?;

        let outcome = {
            let name = input.name.clone();
            db::transaction(&self.db_pool, "create_location", move |txn| {
                Box::pin(async move {
                    if let Some(existing) = Self::find_by_name_ci(txn, &name).await? {
                        return Ok(CreateLocationOutcome::AlreadyExists(existing));
                    }
                    let created = location::ActiveModel {
                        name: Set(name),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;
                    Ok(CreateLocationOutcome::Created(created))
                })
            })
            .await
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            // Lost a race against another session creating the same name.
            Err(err) if err.is_unique_violation() => {
                let existing = Self::find_by_name_ci(&*self.db_pool, &input.name)
                    .await?
                    .ok_or(err)?;
                CreateLocationOutcome::AlreadyExists(existing)
            }
            Err(e) => return Err(e),
        };

        if let CreateLocationOutcome::Created(location) = &outcome {
            info!(location_id = location.id, name = %location.name, "created location");
            self.publish(
                location.id,
                LocationChange::Created {
                    name: location.name.clone(),
                },
            );
        }
        Ok(outcome)
    }

    /// Deletes a location and detaches every item that referenced it.
    ///
    /// Returns `false` for an unknown id, leaving everything untouched.
    #[instrument(skip(self))]
    pub async fn delete(&self, location_id: i32) -> Result<bool, ServiceError> {
        let detached = db::transaction(&self.db_pool, "delete_location", move |txn| {
            Box::pin(async move {
                if Location::find_by_id(location_id).one(txn).await?.is_none() {
                    return Ok(None);
                }

                let detached = PantryItem::update_many()
                    .col_expr(
                        pantry_item::Column::LocationId,
                        Expr::value(Option::<i32>::None),
                    )
                    .filter(pantry_item::Column::LocationId.eq(location_id))
                    .exec(txn)
                    .await?
                    .rows_affected;

                Location::delete_by_id(location_id).exec(txn).await?;
                Ok(Some(detached))
            })
        })
        .await?;

        let Some(detached_items) = detached else {
            return Ok(false);
        };

        info!(location_id, detached_items, "deleted location");
        self.publish(location_id, LocationChange::Deleted { detached_items });
        Ok(true)
    }

    /// Lists all locations sorted by name
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<location::Model>, ServiceError> {
        let mut locations = Location::find()
            .order_by_asc(location::Column::Id)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        locations.sort_by_cached_key(|l| (l.name.to_lowercase(), l.id));
        Ok(locations)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, location_id: i32) -> Result<Option<location::Model>, ServiceError> {
        Location::find_by_id(location_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}
