use std::sync::Arc;

use serde::Serialize;

use crate::domain::aggregates::{ContactDetails, Order, UserProfile};
use crate::domain::value_objects::{Money, UserId};
use crate::store::{OrderStore, ProfileStore};
use crate::Result;

#[derive(Clone, Debug, Serialize)]
pub struct Activities {
    pub total_orders: usize,
    pub total_spent: Money,
    /// Newest first.
    pub order_history: Vec<Order>,
}

#[derive(Clone)]
pub struct ProfileService {
    orders: Arc<dyn OrderStore>,
    profiles: Arc<dyn ProfileStore>,
    currency: String,
}

impl ProfileService {
    pub fn new(orders: Arc<dyn OrderStore>, profiles: Arc<dyn ProfileStore>, currency: &str) -> Self {
        Self { orders, profiles, currency: currency.to_uppercase() }
    }

    #[tracing::instrument(skip(self), fields(%user))]
    pub async fn activities(&self, user: UserId) -> Result<Activities> {
        let mut order_history = self.orders.orders_for_user(user).await?;
        order_history.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        let total_spent = order_history
            .iter()
            .try_fold(Money::zero(&self.currency), |sum, order| sum.add(order.total()))?;
        Ok(Activities { total_orders: order_history.len(), total_spent, order_history })
    }

    /// Saved contact details; an empty profile when nothing was saved yet.
    pub async fn profile(&self, user: UserId) -> Result<UserProfile> {
        Ok(self.profiles.load_profile(user).await?.unwrap_or_else(|| UserProfile::empty(user)))
    }

    #[tracing::instrument(skip(self, details), fields(%user))]
    pub async fn update_profile(&self, user: UserId, details: ContactDetails) -> Result<UserProfile> {
        let mut profile = self.profile(user).await?;
        profile.update(details);
        self.profiles.save_profile(&profile).await?;
        tracing::info!("profile updated");
        Ok(profile)
    }
}
