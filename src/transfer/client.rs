use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{
    TransferApi, TransferError,
    types::{ListOperationsResponse, Operation, TransferJob, UpdateJobRequest},
};
use crate::{config::TransferConfig, credentials::CredentialProvider};

/// REST client for the transfer service.
pub struct HttpTransferClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpTransferClient {
    pub fn new(
        config: &TransferConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, TransferError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    async fn token(&self) -> Result<String, TransferError> {
        self.credentials
            .bearer_token()
            .await
            .map_err(|e| TransferError::Api {
                status: StatusCode::UNAUTHORIZED,
                message: e.to_string(),
            })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransferError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(TransferError::Api { status, message })
    }
}

#[async_trait]
impl TransferApi for HttpTransferClient {
    async fn create_job(&self, job: &TransferJob) -> Result<TransferJob, TransferError> {
        let response = self
            .http
            .post(format!("{}/transferJobs", self.base_url))
            .bearer_auth(self.token().await?)
            .json(job)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn patch_job(
        &self,
        name: &str,
        request: &UpdateJobRequest,
    ) -> Result<TransferJob, TransferError> {
        let response = self
            .http
            .patch(format!("{}/{}", self.base_url, name))
            .bearer_auth(self.token().await?)
            .json(request)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn get_job(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<Option<TransferJob>, TransferError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, name))
            .query(&[("projectId", project_id)])
            .bearer_auth(self.token().await?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::check(response).await?.json().await?))
    }

    async fn list_operations(
        &self,
        project_id: &str,
        job_names: &[String],
    ) -> Result<Vec<Operation>, TransferError> {
        let filter = serde_json::json!({
            "project_id": project_id,
            "job_names": job_names,
        })
        .to_string();

        let mut operations = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = vec![("filter", &filter)];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response = self
                .http
                .get(format!("{}/transferOperations", self.base_url))
                .query(&query)
                .bearer_auth(self.token().await?)
                .send()
                .await?;
            let page: ListOperationsResponse = Self::check(response).await?.json().await?;

            operations.extend(page.operations);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(operations)
    }
}
