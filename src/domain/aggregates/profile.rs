//! User profile
//!
//! Shipping and contact details a user keeps on file. Every field is optional;
//! blank input clears it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::UserId;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub country: Option<String>,
}

impl ContactDetails {
    /// Trims every field and turns blanks into `None`.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }
        Self {
            phone: clean(self.phone),
            address: clean(self.address),
            city: clean(self.city),
            state: clean(self.state),
            pincode: clean(self.pincode),
            country: clean(self.country),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    user_id: UserId,
    details: ContactDetails,
    updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Profile of a user who never saved one.
    pub fn empty(user_id: UserId) -> Self { Self { user_id, details: ContactDetails::default(), updated_at: None } }

    pub fn restore(user_id: UserId, details: ContactDetails, updated_at: DateTime<Utc>) -> Self {
        Self { user_id, details, updated_at: Some(updated_at) }
    }

    pub fn user_id(&self) -> UserId { self.user_id }
    pub fn details(&self) -> &ContactDetails { &self.details }
    pub fn updated_at(&self) -> Option<DateTime<Utc>> { self.updated_at }

    /// Replaces all details at once.
    pub fn update(&mut self, details: ContactDetails) {
        self.details = details.normalized();
        self.updated_at = Some(Utc::now());
    }
}
