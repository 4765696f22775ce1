//! CRUD glue for the dashboard sections.
//!
//! Every call goes through the [`RequestGate`]; a `SessionExpired` error
//! means the caller should navigate to login.

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use flockdesk_session::{RequestGate, SessionError};

/// Backend collections the dashboard manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Batches,
    FeedingPlans,
    Inventory,
    Costs,
    Users,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Batches,
        Resource::FeedingPlans,
        Resource::Inventory,
        Resource::Costs,
        Resource::Users,
    ];

    pub fn collection_path(self) -> &'static str {
        match self {
            Resource::Batches => "/api/batches",
            Resource::FeedingPlans => "/api/feeding-plans",
            Resource::Inventory => "/api/inventory",
            Resource::Costs => "/api/costs",
            Resource::Users => "/api/users",
        }
    }

    pub fn item_path(self, id: i64) -> String {
        format!("{}/{}", self.collection_path(), id)
    }
}

#[derive(Debug, Clone)]
pub struct DashboardApi {
    gate: RequestGate,
}

impl DashboardApi {
    pub fn new(gate: RequestGate) -> Self {
        Self { gate }
    }

    pub async fn list<T: DeserializeOwned>(&self, resource: Resource) -> Result<Vec<T>, SessionError> {
        self.gate.get_json(resource.collection_path()).await
    }

    pub async fn get<T: DeserializeOwned>(&self, resource: Resource, id: i64) -> Result<T, SessionError> {
        self.gate.get_json(&resource.item_path(id)).await
    }

    pub async fn create<B, T>(&self, resource: Resource, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.gate.post_json(resource.collection_path(), body).await
    }

    pub async fn update<B, T>(&self, resource: Resource, id: i64, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.gate.put_json(&resource.item_path(id), body).await
    }

    pub async fn delete(&self, resource: Resource, id: i64) -> Result<(), SessionError> {
        self.gate.delete(&resource.item_path(id)).await
    }

    /// Backend reachability; the health endpoint is public.
    pub async fn health(&self) -> bool {
        let request = self.gate.request(Method::GET, "/api/health");
        match self.gate.send(request).await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::warn!(error = %err, "health check failed");
                false
            }
        }
    }
}
