pub mod meta;
pub mod profiles;
pub mod refresh;
pub mod usage;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::util::ServiceExt;

    use crate::api::state::AppState;
    use crate::models::{MoveSlot, UsageRecord};
    use crate::query::QueryService;
    use crate::resolve::NameResolver;
    use crate::storage::{SnapshotStore, StorageConfig};

    pub async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn record(name: &str, period: &str, usage: f64, item: &str, tera: &str) -> UsageRecord {
        let mut r = UsageRecord::new(name, period);
        r.usage_fraction = Some(usage);
        r.raw_count = Some(usage * 1000.0);
        r.top_item = Some(item.to_string());
        r.item_fraction = Some(0.5);
        r.top_tera_type = Some(tera.to_string());
        r.tera_fraction = Some(0.25);
        r.top_spread_without_nature = Some("252/0/4/0/0/252".to_string());
        r.top_nature = Some("Jolly".to_string());
        r.moves[0] = MoveSlot::new(Some("Protect".to_string()), Some(0.9));
        r
    }

    /// State over a store holding two periods.
    pub fn setup_test_state(dir: &std::path::Path) -> AppState {
        let store = SnapshotStore::from_config(&StorageConfig::new(dir.to_path_buf()));
        store
            .upsert(vec![
                record("Incineroar", "2025-01", 0.5, "Safety Goggles", "Grass"),
                record("Rillaboom", "2025-01", 0.3, "Assault Vest", "Fire"),
                record("Yveltal", "2025-01", 0.2, "Assault Vest", "Dark"),
                record("Incineroar", "2025-03", 0.4, "Sitrus Berry", "Grass"),
                record("Flutter Mane", "2025-03", 0.35, "Booster Energy", "Fairy"),
            ])
            .unwrap();

        AppState::new(Arc::new(QueryService::new(store, NameResolver::default())))
    }
}
