//! HTTP client for the backend, and the trait seam the reconciler programs
//! against.

use reqwest::header::AUTHORIZATION;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::types::{ClusterEnvelope, ReleaseGroup, ReleaseGroupEnvelope};

/// Backend operations the release controller depends on.
pub trait ReleaseApi: Send {
    /// Fetch a release group by name.
    fn get_release_group(
        &self,
        name: &str,
    ) -> impl Future<Output = ApiResult<ReleaseGroupEnvelope>> + Send;

    /// Fetch cluster membership by cluster key.
    fn get_cluster(
        &self,
        cluster_key: &str,
    ) -> impl Future<Output = ApiResult<ClusterEnvelope>> + Send;

    /// Overwrite a release group's routing rules.
    fn put_release_group(
        &self,
        name: &str,
        body: &ReleaseGroup,
    ) -> impl Future<Output = ApiResult<()>> + Send;
}

/// Authenticated JSON client. One static per-process key, sent as
/// `Authorization: Token <key>` on every request.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1.0/{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        debug!(%url, "GET");
        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Token {}", self.api_key))
            .send()
            .await
            .map_err(|e| ApiError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| ApiError::Fetch(e.to_string()))?;
        resp.json().await.map_err(|e| ApiError::Parse(e.to_string()))
    }
}

impl ReleaseApi for ApiClient {
    async fn get_release_group(&self, name: &str) -> ApiResult<ReleaseGroupEnvelope> {
        self.get_json(&self.url(&format!("shared_rules/{name}"))).await
    }

    async fn get_cluster(&self, cluster_key: &str) -> ApiResult<ClusterEnvelope> {
        self.get_json(&self.url(&format!("cluster/{cluster_key}"))).await
    }

    async fn put_release_group(&self, name: &str, body: &ReleaseGroup) -> ApiResult<()> {
        let url = self.url(&format!("shared_rules/{name}"));
        debug!(%url, "PUT");
        self.http
            .put(&url)
            .header(AUTHORIZATION, format!("Token {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| ApiError::Fetch(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn release_group_body() -> serde_json::Value {
        serde_json::json!({
            "result": {
                "rule_key": "rk-1",
                "default": {
                    "light": [{
                        "constraint_key": "ck-1",
                        "cluster_key": "all-in-one-server",
                        "metadata": [
                            {"key": "stage", "value": "prod"},
                            {"key": "version", "value": "v1"}
                        ],
                        "weight": 10000
                    }]
                }
            }
        })
    }

    #[tokio::test]
    async fn get_release_group_sends_token_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/shared_rules/button-demo"))
            .and(header("authorization", "Token sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_group_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), "sekrit");
        let envelope = client.get_release_group("button-demo").await.unwrap();
        assert_eq!(
            envelope.result.default.light[0].metadata_value("version"),
            Some("v1")
        );
    }

    #[tokio::test]
    async fn get_cluster_hits_the_cluster_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/cluster/all-in-one-server"))
            .and(header("authorization", "Token sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"instances": [
                    {"metadata": [{"key": "stage", "value": "prod"}, {"key": "version", "value": "v2"}]}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), "sekrit");
        let envelope = client.get_cluster("all-in-one-server").await.unwrap();
        assert_eq!(
            envelope.result.instances[0].metadata_value("version"),
            Some("v2")
        );
    }

    #[tokio::test]
    async fn put_sends_the_result_body_verbatim() {
        let body = release_group_body();
        let group: crate::ReleaseGroupEnvelope = serde_json::from_value(body.clone()).unwrap();

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1.0/shared_rules/button-demo"))
            .and(header("authorization", "Token sekrit"))
            .and(body_json(&body["result"]))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), "sekrit");
        client
            .put_release_group("button-demo", &group.result)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_2xx_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/shared_rules/button-demo"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), "sekrit");
        let err = client.get_release_group("button-demo").await.unwrap_err();
        assert!(matches!(err, ApiError::Fetch(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/shared_rules/button-demo"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": []})),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), "sekrit");
        let err = client.get_release_group("button-demo").await.unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)), "got {err:?}");
    }
}
