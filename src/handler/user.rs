use crate::extractor::CurrentUser;
use axum::{response::IntoResponse, Json};
use serde::Serialize;
use tracing::instrument;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
}

/// Display details for the page script; `401` when nobody is logged in.
#[instrument]
pub async fn user(user: CurrentUser) -> impl IntoResponse {
    let profile = user.profile();

    Json(UserResponse {
        name: profile.name.clone(),
        picture: profile.picture.clone(),
    })
}
