use std::sync::Arc;

use crate::query::QueryService;

#[derive(Clone)]
pub struct AppState {
    pub queries: Arc<QueryService>,
    pub cors_origin: String,
}

impl AppState {
    pub fn new(queries: Arc<QueryService>) -> Self {
        Self {
            queries,
            cors_origin: "*".to_string(),
        }
    }
}
