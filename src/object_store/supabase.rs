use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};

use super::{check_key, ObjectStore, ObjectStoreError};

/// Supabase Storage backend, authenticated with the project's service role key.
pub struct SupabaseStore {
    base_url: String,
    bucket: String,
    client: Client,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, service_key: &str, bucket: &str) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            client,
            service_key: service_key.to_string(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, key
        )
    }

    fn info_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/info/{}/{}",
            self.base_url, self.bucket, key
        )
    }

    async fn failure(op: &str, resp: reqwest::Response) -> ObjectStoreError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        ObjectStoreError::Backend(format!("Supabase {op} failed ({status}): {body}"))
    }
}

/// Storage reports a missing object as 404, or as 400 with a "not_found" error body.
fn is_not_found(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND
        || (status == StatusCode::BAD_REQUEST && body.to_lowercase().contains("not_found"))
}

/// Only a not-found answer means absent; auth and server failures are errors.
fn exists_from_status(status: StatusCode, body: &str) -> Result<bool, ObjectStoreError> {
    if status.is_success() {
        return Ok(true);
    }
    if is_not_found(status, body) {
        return Ok(false);
    }
    Err(ObjectStoreError::Backend(format!(
        "Supabase info failed ({status}): {body}"
    )))
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        check_key(key)?;

        let resp = self
            .client
            .post(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(data)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::failure("upload", resp).await);
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        check_key(key)?;

        let resp = self
            .client
            .get(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if is_not_found(status, &body) {
                return Err(ObjectStoreError::NotFound(key.to_string()));
            }
            return Err(ObjectStoreError::Backend(format!(
                "Supabase download failed ({status}): {body}"
            )));
        }

        resp.bytes()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        check_key(key)?;

        let resp = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        // Already gone is fine
        let body = resp.text().await.unwrap_or_default();
        if is_not_found(status, &body) {
            return Ok(());
        }
        Err(ObjectStoreError::Backend(format!(
            "Supabase delete failed ({status}): {body}"
        )))
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        check_key(key)?;

        let resp = self
            .client
            .get(self.info_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(true);
        }
        let body = resp.text().await.unwrap_or_default();
        exists_from_status(status, &body)
    }
}
