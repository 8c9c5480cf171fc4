use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::customer::Customer;
use super::AlreadyExists;
use crate::errors::{ApiException, CustomException, Rollback};

/// In-memory customer registry. Clones share the same registrations.
#[derive(Debug, Default, Clone)]
pub struct CustomerStore {
    customers: Arc<RwLock<Vec<Customer>>>,
}

impl CustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `customer`, rejecting a phone number whose coverage overlaps
    /// an existing registration
    pub async fn insert(&self, customer: Customer) -> Result<Customer, ApiException> {
        let mut customers = self.customers.write().await;

        if let Some(existing) = customers
            .iter()
            .find(|c| c.phone == customer.phone && c.overlaps(&customer))
        {
            debug!(
                existing_id = %existing.id,
                phone = %customer.phone,
                "Rejecting customer with overlapping coverage"
            );
            return Err(ApiException::Custom(AlreadyExists::raise().with_detail(format!(
                "Customer {} already has coverage from {} to {}.",
                existing.phone, existing.effective_date, existing.expiry_date
            ))));
        }

        info!(id = %customer.id, "Registered courtesy car customer");
        customers.push(customer.clone());
        Ok(customer)
    }

    /// [`insert`](Self::insert) as part of a request: the registration is
    /// removed again if the request is rolled back
    pub async fn insert_in(
        &self,
        rollback: &Rollback,
        customer: Customer,
    ) -> Result<Customer, ApiException> {
        let customer = self.insert(customer).await?;

        let store = self.clone();
        let id = customer.id;
        rollback.on_rollback(move || async move {
            if store.remove(id).await.is_some() {
                info!(id = %id, "Rolled back courtesy car customer");
            }
        });
        Ok(customer)
    }

    pub async fn remove(&self, id: Uuid) -> Option<Customer> {
        let mut customers = self.customers.write().await;
        let index = customers.iter().position(|c| c.id == id)?;
        Some(customers.remove(index))
    }

    pub async fn get(&self, id: Uuid) -> Option<Customer> {
        self.customers
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub async fn list(&self) -> Vec<Customer> {
        self.customers.read().await.clone()
    }
}
