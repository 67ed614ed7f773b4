use super::HtmlTemplate;
use askama::Template;
use axum::{extract::Query, response::IntoResponse};
use serde::Deserialize;
use tracing::instrument;

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    login_failed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    #[serde(default)]
    error: Option<String>,
}

#[instrument]
pub async fn home(Query(query): Query<HomeQuery>) -> impl IntoResponse {
    let template = HomeTemplate {
        login_failed: query.error.is_some(),
    };
    HtmlTemplate(template)
}
