use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::constants::{DAO_SPACES, SNAPSHOT_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::services::http::HttpClient;

const PROPOSALS_QUERY: &str = r#"
  query Proposals($spaces: [String!]) {
    proposals(
      first: 20,
      where: { space_in: $spaces, state: "active" },
      orderBy: "end",
      orderDirection: asc
    ) {
      id
      title
      body
      end
      start
      space {
        id
        name
      }
      link
    }
  }
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<ProposalsData>,
}

#[derive(Debug, Deserialize)]
struct ProposalsData {
    #[serde(default)]
    proposals: Vec<Proposal>,
}

#[derive(Debug, Deserialize)]
struct Proposal {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    end: Option<i64>,
    #[serde(default)]
    space: Option<Space>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Space {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// One open proposal, formatted for the API and chat replies.
#[derive(Debug, Clone, Serialize)]
pub struct OpenProposal {
    pub title: String,
    pub dao: Option<String>,
    pub link: String,
    /// Proposal end as ISO-8601.
    pub ends: String,
}

/// Client for the Snapshot governance hub. The proposal set is drawn from a
/// fixed allow-list of spaces; the querying wallet does not influence it.
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    http: HttpClient,
    api_url: String,
}

impl SnapshotClient {
    pub fn new(http: HttpClient, api_url: String) -> Self {
        Self { http, api_url }
    }

    /// Active proposals across the allow-listed spaces whose end time is
    /// strictly in the future, capped at 20, ascending by end time.
    pub async fn open_proposals(&self) -> Result<Vec<OpenProposal>> {
        let payload = json!({
            "query": PROPOSALS_QUERY,
            "variables": { "spaces": DAO_SPACES },
        });
        let res = self
            .http
            .post_json(
                &self.api_url,
                &payload,
                Duration::from_secs(SNAPSHOT_TIMEOUT_SECS),
                0,
            )
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Snapshot fetch failed: {} {}",
                status, body
            )));
        }

        let parsed: GraphQlResponse = res.json().await.map_err(|e| {
            AppError::ExternalApi(format!("Snapshot response parse failed: {}", e))
        })?;
        let proposals = parsed.data.map(|d| d.proposals).unwrap_or_default();

        let now = Utc::now().timestamp();
        let open = proposals
            .into_iter()
            .filter(|p| p.end.map(|end| end > now).unwrap_or(false))
            .take(20)
            .map(format_proposal)
            .collect();
        Ok(open)
    }
}

// Internal helper that maps a raw proposal to its API shape.
fn format_proposal(p: Proposal) -> OpenProposal {
    let space_id = p.space.as_ref().map(|s| s.id.clone()).unwrap_or_default();
    let dao = p
        .space
        .as_ref()
        .and_then(|s| s.name.clone())
        .or_else(|| p.space.as_ref().map(|s| s.id.clone()));
    let link = p
        .link
        .unwrap_or_else(|| format!("https://snapshot.org/#/{}/proposal/{}", space_id, p.id));
    let ends = p
        .end
        .and_then(|end| DateTime::<Utc>::from_timestamp(end, 0))
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_default();

    OpenProposal {
        title: p.title.unwrap_or_default(),
        dao,
        link,
        ends,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    #[test]
    fn derives_link_when_missing() {
        // Memastikan link diturunkan dari space + id saat absen
        let proposal = Proposal {
            id: "0xprop".to_string(),
            title: Some("Fee switch".to_string()),
            end: Some(4_000_000_000),
            space: Some(Space {
                id: "uniswap".to_string(),
                name: Some("Uniswap".to_string()),
            }),
            link: None,
        };
        let formatted = format_proposal(proposal);
        assert_eq!(formatted.link, "https://snapshot.org/#/uniswap/proposal/0xprop");
        assert_eq!(formatted.dao.as_deref(), Some("Uniswap"));
    }

    #[test]
    fn dao_falls_back_to_space_id() {
        // Memastikan id space dipakai saat nama kosong
        let proposal = Proposal {
            id: "1".to_string(),
            title: None,
            end: Some(4_000_000_000),
            space: Some(Space {
                id: "aave.eth".to_string(),
                name: None,
            }),
            link: Some("https://example.org".to_string()),
        };
        assert_eq!(format_proposal(proposal).dao.as_deref(), Some("aave.eth"));
    }

    #[tokio::test]
    async fn filters_to_proposals_ending_in_the_future() {
        // Memastikan hanya proposal dengan end > now yang lolos
        let future = Utc::now().timestamp() + 86_400;
        let past = Utc::now().timestamp() - 86_400;
        let router = Router::new().route(
            "/graphql",
            post(move || async move {
                Json(json!({
                    "data": {"proposals": [
                        {"id": "a", "title": "Past", "end": past,
                         "space": {"id": "uniswap", "name": "Uniswap"}},
                        {"id": "b", "title": "Open", "end": future,
                         "space": {"id": "uniswap", "name": "Uniswap"}},
                        {"id": "c", "title": "No end"}
                    ]}
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = SnapshotClient::new(
            HttpClient::new().unwrap(),
            format!("http://{}/graphql", addr),
        );
        let open = client.open_proposals().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "Open");
    }
}
