use crate::client::{ConditionalResponse, UpstreamClient};
use crate::dto::{DispatchPostEntry, PanelEnvelope, ServerEntry, TrainEntry};

/// The panel API group (spec §6): server list, per-server trains and
/// dispatch posts, all etag-conditional.
#[derive(Clone)]
pub struct PanelApiClient {
    client: UpstreamClient,
}

impl PanelApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: UpstreamClient::new(base_url),
        }
    }

    pub async fn servers(&self) -> Option<Vec<ServerEntry>> {
        match self
            .client
            .get_conditional::<PanelEnvelope<ServerEntry>>("/servers-open", None)
            .await
        {
            ConditionalResponse::Fresh { body, .. } if body.success => Some(body.entries),
            _ => None,
        }
    }

    pub async fn trains(
        &self,
        server_code: &str,
        etag: Option<&str>,
    ) -> ConditionalResponse<Vec<TrainEntry>> {
        let path = format!("/trains-open?serverCode={server_code}");
        match self
            .client
            .get_conditional::<PanelEnvelope<TrainEntry>>(&path, etag)
            .await
        {
            ConditionalResponse::Fresh { body, etag } if body.success => {
                ConditionalResponse::Fresh {
                    body: body.entries,
                    etag,
                }
            }
            _ => ConditionalResponse::NotModified,
        }
    }

    pub async fn positions(
        &self,
        server_code: &str,
        etag: Option<&str>,
    ) -> ConditionalResponse<Vec<crate::dto::PositionEntry>> {
        let path = format!("/train-positions-open?serverCode={server_code}");
        match self
            .client
            .get_conditional::<PanelEnvelope<crate::dto::PositionEntry>>(&path, etag)
            .await
        {
            ConditionalResponse::Fresh { body, etag } if body.success => {
                ConditionalResponse::Fresh {
                    body: body.entries,
                    etag,
                }
            }
            _ => ConditionalResponse::NotModified,
        }
    }

    pub async fn dispatch_posts(
        &self,
        server_code: &str,
        etag: Option<&str>,
    ) -> ConditionalResponse<Vec<DispatchPostEntry>> {
        let path = format!("/stations-open?serverCode={server_code}");
        match self
            .client
            .get_conditional::<PanelEnvelope<DispatchPostEntry>>(&path, etag)
            .await
        {
            ConditionalResponse::Fresh { body, etag } if body.success => {
                ConditionalResponse::Fresh {
                    body: body.entries,
                    etag,
                }
            }
            _ => ConditionalResponse::NotModified,
        }
    }
}
