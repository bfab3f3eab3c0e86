use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{ApiResult, AppState, CurrentUser, ValidatedJson};
use crate::domain::aggregates::{ContactDetails, UserProfile};
use crate::domain::value_objects::UserId;
use crate::service::Activities;

/// `{"user": {...}}`, the shape the profile page reads.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: ProfileUser,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUser {
    pub id: UserId,
    pub profile: ContactDetails,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self { user: ProfileUser { id: profile.user_id(), updated_at: profile.updated_at(), profile: profile.details().clone() } }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(custom = "phone_number")]
    pub phone: Option<String>,
    #[validate(length(max = 300))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(custom = "valid_pincode")]
    pub pincode: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

fn phone_number(phone: &str) -> Result<(), ValidationError> {
    let phone = phone.trim();
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    let allowed = phone.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    if phone.is_empty() || (allowed && (7..=15).contains(&digits)) {
        return Ok(());
    }
    Err(ValidationError::new("phone"))
}

fn valid_pincode(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.is_empty() || ((3..=10).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')) {
        return Ok(());
    }
    Err(ValidationError::new("pincode"))
}

pub async fn activities(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<Activities>> {
    Ok(Json(state.profile.activities(user).await?))
}

pub async fn get(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<Json<ProfileResponse>> {
    Ok(Json(state.profile.profile(user).await?.into()))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(body): ValidatedJson<UpdateProfile>,
) -> ApiResult<Json<ProfileResponse>> {
    let details = ContactDetails {
        phone: body.phone,
        address: body.address,
        city: body.city,
        state: body.state,
        pincode: body.pincode,
        country: body.country,
    };
    Ok(Json(state.profile.update_profile(user, details).await?.into()))
}
