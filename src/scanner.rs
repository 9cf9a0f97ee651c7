//! Scanner-driven session: a two-state add/remove mode over the inventory store.

use crate::{
    errors::ServiceError,
    services::inventory::{AddOutcome, InventoryService, RemoveOutcome},
    view::{InventoryRow, LocationFilter},
};
use serde::Serialize;
use strum::{Display, EnumString};
use tracing::{debug, info, instrument};

/// Whether a scan adds or removes one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScanMode {
    #[default]
    Add,
    Remove,
}

impl ScanMode {
    pub fn toggled(self) -> Self {
        match self {
            ScanMode::Add => ScanMode::Remove,
            ScanMode::Remove => ScanMode::Add,
        }
    }

    /// Banner shown while the mode is active.
    pub fn banner(self) -> &'static str {
        match self {
            ScanMode::Add => "Mode: ADDING",
            ScanMode::Remove => "Mode: REMOVING",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScanOutcome {
    Add(AddOutcome),
    Remove(RemoveOutcome),
}

impl ScanOutcome {
    /// Whether the store changed.
    pub fn mutated(&self) -> bool {
        !matches!(
            self,
            ScanOutcome::Add(AddOutcome::UnknownBarcode)
                | ScanOutcome::Remove(RemoveOutcome::NotPresent)
        )
    }

    /// One-line message for the person at the scanner.
    pub fn notice(&self, barcode: &str) -> String {
        match self {
            ScanOutcome::Add(AddOutcome::Added { name }) => format!("Added {name}"),
            ScanOutcome::Add(AddOutcome::Incremented { quantity }) => {
                format!("{barcode}: quantity now {quantity}")
            }
            ScanOutcome::Add(AddOutcome::UnknownBarcode) => {
                format!("No product found for barcode: {barcode}")
            }
            ScanOutcome::Remove(RemoveOutcome::Decremented { quantity }) => {
                format!("{barcode}: quantity now {quantity}")
            }
            ScanOutcome::Remove(RemoveOutcome::RemovedEntirely) => {
                format!("{barcode}: last unit removed")
            }
            ScanOutcome::Remove(RemoveOutcome::NotPresent) => {
                format!("Item with barcode {barcode} is not in the pantry.")
            }
        }
    }
}

/// What one scan did, plus the refreshed list when it changed anything.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub barcode: String,
    pub mode: ScanMode,
    pub outcome: ScanOutcome,
    pub rows: Option<Vec<InventoryRow>>,
}

impl ScanReport {
    pub fn notice(&self) -> String {
        self.outcome.notice(&self.barcode)
    }
}

/// Collects scanner keystrokes and turns each submitted line into one scan.
///
/// Input is only accepted between [`activate`](Self::activate) and
/// [`deactivate`](Self::deactivate). Changing mode drops whatever is buffered.
pub struct ScanProcessor {
    inventory: InventoryService,
    mode: ScanMode,
    filter: LocationFilter,
    active: bool,
    pending: String,
}

impl ScanProcessor {
    pub fn new(inventory: InventoryService) -> Self {
        Self {
            inventory,
            mode: ScanMode::default(),
            filter: LocationFilter::default(),
            active: false,
            pending: String::new(),
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn filter(&self) -> LocationFilter {
        self.filter
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn activate(&mut self) {
        self.active = true;
        debug!(mode = %self.mode, "scanner capture activated");
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.pending.clear();
        debug!("scanner capture deactivated");
    }

    pub fn set_mode(&mut self, mode: ScanMode) {
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, "scan mode switched");
        }
        self.mode = mode;
        self.pending.clear();
    }

    pub fn toggle_mode(&mut self) -> ScanMode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    pub fn set_filter(&mut self, filter: LocationFilter) {
        self.filter = filter;
    }

    fn ensure_active(&self) -> Result<(), ServiceError> {
        if self.active {
            Ok(())
        } else {
            Err(ServiceError::InvalidOperation(
                "scanner input is not being captured".to_string(),
            ))
        }
    }

    /// Buffers raw scanner input.
    pub fn feed(&mut self, input: &str) -> Result<(), ServiceError> {
        self.ensure_active()?;
        self.pending.push_str(input);
        Ok(())
    }

    /// Commits the buffered input as one scan. Blank input is dropped and yields `None`.
    pub async fn submit(&mut self) -> Result<Option<ScanReport>, ServiceError> {
        self.ensure_active()?;
        let input = std::mem::take(&mut self.pending);
        let barcode = input.trim();
        if barcode.is_empty() {
            return Ok(None);
        }
        self.scan(barcode).await.map(Some)
    }

    /// Applies one scan in the current mode.
    #[instrument(skip(self))]
    pub async fn scan(&mut self, barcode: &str) -> Result<ScanReport, ServiceError> {
        self.ensure_active()?;

        let outcome = match self.mode {
            ScanMode::Add => ScanOutcome::Add(self.inventory.add_scan(barcode).await?),
            ScanMode::Remove => ScanOutcome::Remove(self.inventory.remove_scan(barcode).await?),
        };

        let rows = if outcome.mutated() {
            Some(self.refresh().await?)
        } else {
            None
        };

        Ok(ScanReport {
            barcode: barcode.trim().to_string(),
            mode: self.mode,
            outcome,
            rows,
        })
    }

    /// Re-pulls the pantry list with the current filter.
    pub async fn refresh(&self) -> Result<Vec<InventoryRow>, ServiceError> {
        self.inventory.list_items(self.filter).await
    }
}
