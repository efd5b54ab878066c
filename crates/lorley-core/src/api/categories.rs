use serde_json::Value;

use crate::auth::SessionManager;

use super::models::Category;
use super::{ApiError, Envelope, OperationResult, SessionRequest};

const CATEGORIES_PATH: &str = "/api/v1/categories";

/// Business-listing categories. Listing is public; adding one requires a
/// signed-in session.
#[derive(Clone)]
pub struct CategoryApi {
    session: SessionManager,
}

impl CategoryApi {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub async fn fetch_categories(&self) -> OperationResult<Vec<Category>> {
        let result = async {
            let envelope = self.session.execute(&SessionRequest::get(CATEGORIES_PATH)).await?;
            Self::parse_categories(&envelope)
        }
        .await;
        OperationResult::from_result(result, "Failed to fetch categories.")
    }

    pub async fn add_category(&self, category: Value) -> OperationResult<Envelope> {
        let request = SessionRequest::post(CATEGORIES_PATH, category).authed();
        let result = self.session.execute_with_refresh(&request).await;
        SessionManager::envelope_result_or(result, "Failed to add category.")
    }

    fn parse_categories(envelope: &Envelope) -> Result<Vec<Category>, ApiError> {
        let list = envelope
            .field("categories")
            .cloned()
            .ok_or_else(|| ApiError::InvalidResponse("Categories not found in response.".into()))?;
        serde_json::from_value(list).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}
