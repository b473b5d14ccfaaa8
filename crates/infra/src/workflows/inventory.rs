use chrono::Utc;
use tracing::instrument;

use facilities_assets::{InventoryLine, Restock};
use facilities_core::{DomainError, ItemId};

use super::{FacilityService, WorkflowError, finish};
use crate::store::FacilityTx;

impl FacilityService {
    #[instrument(skip(self), fields(item_id = %item), err)]
    pub async fn get_inventory_line(&self, item: ItemId) -> Result<InventoryLine, WorkflowError> {
        let mut tx = self.begin().await?;
        let result = tx
            .inventory_line(item)
            .await
            .map_err(WorkflowError::from)
            .and_then(|line| line.ok_or_else(|| DomainError::not_found().into()));
        finish(tx, "get_inventory_line", result).await
    }

    #[instrument(skip(self), err)]
    pub async fn list_inventory(&self) -> Result<Vec<InventoryLine>, WorkflowError> {
        let mut tx = self.begin().await?;
        let result = tx.list_inventory().await.map_err(WorkflowError::from);
        finish(tx, "list_inventory", result).await
    }

    /// Receive stock. The unit cost becomes the weighted average of what was
    /// on hand and what arrived.
    #[instrument(skip(self, restock), fields(item_id = %item, cantidad = restock.quantity), err)]
    pub async fn restock(&self, item: ItemId, restock: Restock) -> Result<InventoryLine, WorkflowError> {
        restock.validate()?;

        let mut tx = self.begin().await?;
        let result = receive(tx.as_mut(), item, &restock).await;
        let line = finish(tx, "restock", result).await?;

        tracing::info!(quantity = line.quantity, unit_cost = %line.unit_cost, "stock received");
        Ok(line)
    }
}

async fn receive(
    tx: &mut dyn FacilityTx,
    item: ItemId,
    restock: &Restock,
) -> Result<InventoryLine, WorkflowError> {
    let now = Utc::now();
    let line = match tx.lock_inventory_line(item).await? {
        Some(mut line) => {
            line.restock(restock, now)?;
            line
        }
        None => InventoryLine::from_restock(item, restock, now)?,
    };
    Ok(tx.upsert_inventory_line(&line).await?)
}
