use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Keyword, matched case-insensitively. Blank keywords are allowed.
    pub q: Option<String>,
}
