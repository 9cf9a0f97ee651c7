use crate::{
    db::{self, DbPool},
    entities::chore::{self, Entity as Chore},
    errors::ServiceError,
    events::{Event, EventSender},
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Input for creating a chore
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateChoreInput {
    #[validate(length(min = 1, max = 500, message = "Description must be 1-500 characters"))]
    pub description: String,
    pub person_id: Option<i32>,
    #[validate(length(min = 1, max = 50, message = "Frequency must be 1-50 characters"))]
    pub frequency: String,
}

/// Re-sequences display orders to `1..=n`, keeping relative order.
///
/// Input is `(chore_id, display_order)`; the output pairs each id with its new
/// position, sorted by that position. Ties keep the lower id first.
pub fn renumber(orders: &[(i32, i32)]) -> Vec<(i32, i32)> {
    let mut sorted = orders.to_vec();
    sorted.sort_by_key(|&(id, order)| (order, id));
    sorted
        .into_iter()
        .enumerate()
        .map(|(idx, (id, _))| (id, idx as i32 + 1))
        .collect()
}

/// Household chore list.
#[derive(Clone)]
pub struct ChoreService {
    db_pool: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl ChoreService {
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

    fn publish(&self, chore_id: i32) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.try_send(Event::ChoresChanged { chore_id }) {
                warn!(chore_id, error = %e, "chore event dropped");
            }
        }
    }

    /// Appends a chore at the end of the list.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateChoreInput) -> Result<chore::Model, ServiceError> {
        let input = CreateChoreInput {
            description: input.description.trim().to_string(),
            frequency: input.frequency.trim().to_string(),
            ..input
        };
        input.validate()?;

        let created = db::transaction(&self.db_pool, "create_chore", move |txn| {
            Box::pin(async move {
                let count = Chore::find().count(txn).await?;
                let created = chore::ActiveModel {
                    description: Set(input.description),
                    person_id: Set(input.person_id),
                    frequency: Set(input.frequency),
                    display_order: Set(count as i32 + 1),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                Ok(created)
            })
        })
        .await?;

        info!(chore_id = created.chore_id, display_order = created.display_order, "created chore");
        self.publish(created.chore_id);
        Ok(created)
    }

    /// Removes a chore and closes the gap it leaves in the display order.
    #[instrument(skip(self))]
    pub async fn delete(&self, chore_id: i32) -> Result<bool, ServiceError> {
        let deleted = db::transaction(&self.db_pool, "delete_chore", move |txn| {
            Box::pin(async move {
                let result = Chore::delete_by_id(chore_id).exec(txn).await?;
                if result.rows_affected == 0 {
                    return Ok(false);
                }

                let survivors: Vec<(i32, i32)> = Chore::find()
                    .all(txn)
                    .await?
                    .into_iter()
                    .map(|c| (c.chore_id, c.display_order))
                    .collect();

                let current: std::collections::HashMap<i32, i32> =
                    survivors.iter().copied().collect();
                for (id, order) in renumber(&survivors) {
                    if current.get(&id) == Some(&order) {
                        continue;
                    }
                    Chore::update_many()
                        .col_expr(chore::Column::DisplayOrder, Expr::value(order))
                        .filter(chore::Column::ChoreId.eq(id))
                        .exec(txn)
                        .await?;
                }
                Ok(true)
            })
        })
        .await?;

        if deleted {
            info!(chore_id, "deleted chore");
            self.publish(chore_id);
        }
        Ok(deleted)
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<chore::Model>, ServiceError> {
        Chore::find()
            .order_by_asc(chore::Column::DisplayOrder)
            .order_by_asc(chore::Column::ChoreId)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}
