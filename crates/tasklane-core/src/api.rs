//! Typed client for the tasks/goals/categories REST backend.

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ApiError, StoreError};
use crate::resource::{Category, CategoryDraft, Goal, GoalDraft};
use crate::session::{Session, SessionGate};
use crate::task::{Task, TaskDraft, TaskPatch};

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
    session: SessionGate,
}

impl ApiClient {
    pub fn new(base_url: Url, session: SessionGate) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tasklane/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_http(base_url, session, http))
    }

    pub fn with_http(base_url: Url, session: SessionGate, http: reqwest::Client) -> Self {
        Self {
            base_url,
            http,
            session,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &SessionGate {
        &self.session
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        self.session
            .login(&self.http, &self.base_url, username, password)
            .await
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        self.session.logout()
    }

    // Tasks

    #[tracing::instrument(skip(self))]
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let req = self.request(Method::GET, "tasks/")?;
        self.fetch("task list", req).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_tasks_for_goal(&self, goal: u64) -> Result<Vec<Task>, ApiError> {
        let req = self.request(Method::GET, "tasks/")?.query(&[("goal", goal)]);
        self.fetch("task list", req).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, id: u64) -> Result<Task, ApiError> {
        let req = self.request(Method::GET, &format!("tasks/{id}/"))?;
        self.fetch("task", req).await
    }

    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        draft.validate()?;
        let req = self.request(Method::POST, "tasks/")?.json(draft);
        self.fetch("task", req).await
    }

    #[tracing::instrument(skip(self, draft))]
    pub async fn update_task(&self, id: u64, draft: &TaskDraft) -> Result<Task, ApiError> {
        draft.validate()?;
        let req = self.request(Method::PUT, &format!("tasks/{id}/"))?.json(draft);
        self.fetch("task", req).await
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn patch_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, ApiError> {
        patch.validate()?;
        let req = self.request(Method::PATCH, &format!("tasks/{id}/"))?.json(patch);
        self.fetch("task", req).await
    }

    pub async fn set_completed(&self, id: u64, completed: bool) -> Result<Task, ApiError> {
        self.patch_task(id, &TaskPatch::completed(completed)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
        let req = self.request(Method::DELETE, &format!("tasks/{id}/"))?;
        self.execute(req).await.map(|_| ())
    }

    // Goals

    #[tracing::instrument(skip(self))]
    pub async fn list_goals(&self) -> Result<Vec<Goal>, ApiError> {
        let req = self.request(Method::GET, "goals/")?;
        self.fetch("goal list", req).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_goal(&self, id: u64) -> Result<Goal, ApiError> {
        let req = self.request(Method::GET, &format!("goals/{id}/"))?;
        self.fetch("goal", req).await
    }

    #[tracing::instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_goal(&self, draft: &GoalDraft) -> Result<Goal, ApiError> {
        draft.validate()?;
        let req = self.request(Method::POST, "goals/")?.json(draft);
        self.fetch("goal", req).await
    }

    #[tracing::instrument(skip(self, draft))]
    pub async fn update_goal(&self, id: u64, draft: &GoalDraft) -> Result<Goal, ApiError> {
        draft.validate()?;
        let req = self.request(Method::PUT, &format!("goals/{id}/"))?.json(draft);
        self.fetch("goal", req).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_goal(&self, id: u64) -> Result<(), ApiError> {
        let req = self.request(Method::DELETE, &format!("goals/{id}/"))?;
        self.execute(req).await.map(|_| ())
    }

    // Categories

    #[tracing::instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let req = self.request(Method::GET, "categories/")?;
        self.fetch("category list", req).await
    }

    #[tracing::instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_category(&self, draft: &CategoryDraft) -> Result<Category, ApiError> {
        draft.validate()?;
        let req = self.request(Method::POST, "categories/")?.json(draft);
        self.fetch("category", req).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_category(&self, id: u64) -> Result<(), ApiError> {
        let req = self.request(Method::DELETE, &format!("categories/{id}/"))?;
        self.execute(req).await.map(|_| ())
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.base_url.join(path)?;
        Ok(self.http.request(method, url))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        req: RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.execute(req).await?;
        serde_json::from_slice(&body).map_err(|source| {
            warn!(resource, error = %source, "response did not match schema");
            ApiError::Decode { resource, source }
        })
    }

    /// Sends a protected request. Without a token nothing goes on the wire.
    async fn execute(&self, req: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let Some(request) = self.session.authorize(req.build()?) else {
            debug!("refusing protected request without a session");
            return Err(ApiError::Unauthenticated);
        };
        debug!(method = %request.method(), url = %request.url(), "sending request");

        let resp = self.http.execute(request).await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&body).into_owned();
            warn!(%status, "backend returned an error");
            return Err(ApiError::Status { status, body });
        }

        Ok(body.to_vec())
    }
}
