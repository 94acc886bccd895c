//! reqwest-backed [`ElectionService`]. Each endpoint has exactly one response
//! schema; a 2xx body that does not match it is a [`ServiceError::Schema`].

use super::ElectionService;
use crate::config::Config;
use crate::error::ServiceError;
use crate::models::{
    check_ballot_layout, Ballot, BallotEntry, Candidate, Election, ElectionStatus, Position, Receipt,
    Voter,
};
use crate::session::AuthSession;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub struct HttpElectionService {
    client: Client,
    base_url: Url,
}

// --- Wire schemas ---

#[derive(Debug, Deserialize)]
struct ElectionEnvelope {
    election: ElectionDto,
}

#[derive(Debug, Deserialize)]
struct ElectionDto {
    id: String,
    title: String,
    description: Option<String>,
    status: ElectionStatus,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    has_voted: bool,
}

#[derive(Debug, Deserialize)]
struct PositionsEnvelope {
    positions: Vec<PositionDto>,
}

#[derive(Debug, Deserialize)]
struct PositionDto {
    id: String,
    name: String,
    candidates: Vec<CandidateDto>,
}

#[derive(Debug, Deserialize)]
struct CandidateDto {
    id: String,
    name: String,
    party: Option<String>,
    department: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    student_id: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    voter: VoterDto,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VoterDto {
    id: String,
    student_id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    votes: &'a [BallotEntry],
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    receipt_id: String,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl From<ElectionDto> for Election {
    fn from(dto: ElectionDto) -> Self {
        Election {
            id: dto.id,
            title: dto.title,
            description: dto.description,
            status: dto.status,
            starts_at: dto.starts_at,
            ends_at: dto.ends_at,
            has_voted: dto.has_voted,
        }
    }
}

impl From<PositionDto> for Position {
    fn from(dto: PositionDto) -> Self {
        Position {
            id: dto.id,
            name: dto.name,
            candidates: dto
                .candidates
                .into_iter()
                .map(|c| Candidate {
                    id: c.id,
                    name: c.name,
                    party: c.party,
                    department: c.department,
                })
                .collect(),
        }
    }
}

impl HttpElectionService {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let base_url = Url::parse(&config.api_url).map_err(|e| {
            ServiceError::Network(format!("invalid API url '{}': {}", config.api_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::Network(format!(
                "API url '{}' cannot carry a path",
                config.api_url
            )));
        }

        Ok(Self { client, base_url })
    }

    /// Appends `segments` to the base path. Each segment is percent-encoded,
    /// so an id containing `/`, `?` or `#` stays inside its own segment.
    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::Network(format!("API url '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn election_url(&self, election_id: &str, tail: Option<&str>) -> Result<Url, ServiceError> {
        if election_id.is_empty() || election_id == "." || election_id == ".." {
            return Err(ServiceError::NotFound);
        }
        let mut segments = vec!["elections", election_id];
        segments.extend(tail);
        self.url(&segments)
    }

    fn authorized(&self, request: RequestBuilder, session: &AuthSession) -> RequestBuilder {
        request.bearer_auth(session.bearer_token())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        let body = self.send_raw(endpoint, request).await?;
        decode(endpoint, &body)
    }

    async fn send_raw(&self, endpoint: &str, request: RequestBuilder) -> Result<String, ServiceError> {
        debug!("Request {}", endpoint);
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        if (200..300).contains(&status) {
            Ok(body)
        } else {
            warn!("{} returned status {}", endpoint, status);
            Err(error_for_status(status, &body))
        }
    }
}

#[async_trait]
impl ElectionService for HttpElectionService {
    async fn login(&self, student_id: &str, password: &str) -> Result<AuthSession, ServiceError> {
        let request = self
            .client
            .post(self.url(&["auth", "login"])?)
            .json(&LoginRequest { student_id, password });
        let response: LoginResponse = self.send("POST /auth/login", request).await?;

        let session = AuthSession::new(
            response.token,
            Voter {
                id: response.voter.id,
                student_id: response.voter.student_id,
                name: response.voter.name,
            },
            response.expires_in,
        );
        info!("Logged in as {} (session {})", session.voter().student_id, session.id());
        Ok(session)
    }

    async fn logout(&self, session: &AuthSession) -> Result<(), ServiceError> {
        let request = self.authorized(self.client.post(self.url(&["auth", "logout"])?), session);
        self.send_raw("POST /auth/logout", request).await?;
        Ok(())
    }

    async fn fetch_election(
        &self,
        session: &AuthSession,
        election_id: &str,
    ) -> Result<Election, ServiceError> {
        let url = self.election_url(election_id, None)?;
        let endpoint = format!("GET {}", url.path());
        let request = self.authorized(self.client.get(url), session);
        let envelope: ElectionEnvelope = self.send(&endpoint, request).await?;
        Ok(envelope.election.into())
    }

    async fn fetch_candidates_by_position(
        &self,
        session: &AuthSession,
        election_id: &str,
    ) -> Result<Vec<Position>, ServiceError> {
        let url = self.election_url(election_id, Some("positions"))?;
        let endpoint = format!("GET {}", url.path());
        let request = self.authorized(self.client.get(url), session);
        let envelope: PositionsEnvelope = self.send(&endpoint, request).await?;
        positions_from(&endpoint, envelope)
    }

    async fn submit_ballot(
        &self,
        session: &AuthSession,
        election_id: &str,
        ballot: &Ballot,
    ) -> Result<Receipt, ServiceError> {
        let url = self.election_url(election_id, Some("votes"))?;
        let endpoint = format!("POST {}", url.path());
        let request = self
            .authorized(self.client.post(url), session)
            .json(&SubmitRequest { votes: &ballot.votes });
        let response: SubmitResponse = self.send(&endpoint, request).await?;

        Ok(Receipt {
            receipt_id: response.receipt_id,
            message: response.message,
        })
    }
}

fn positions_from(endpoint: &str, envelope: PositionsEnvelope) -> Result<Vec<Position>, ServiceError> {
    let positions: Vec<Position> = envelope.positions.into_iter().map(Position::from).collect();
    check_ballot_layout(&positions).map_err(|detail| ServiceError::Schema {
        endpoint: endpoint.to_string(),
        detail,
    })?;
    Ok(positions)
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ServiceError> {
    serde_json::from_str(body).map_err(|e| ServiceError::Schema {
        endpoint: endpoint.to_string(),
        detail: e.to_string(),
    })
}

/// Maps a non-2xx response to the error taxonomy. The `message` field of the
/// error body is passed through verbatim when present.
fn error_for_status(status: u16, body: &str) -> ServiceError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| format!("request failed with status {}", status));

    match status {
        401 | 403 => ServiceError::Unauthorized(message),
        404 => ServiceError::NotFound,
        400 | 409 | 422 => ServiceError::Validation(message),
        _ => ServiceError::Server { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_envelope_decodes() {
        let body = r#"{
            "election": {
                "id": "12",
                "title": "SSC General Election",
                "description": null,
                "status": "active",
                "starts_at": "2026-10-01T00:00:00Z",
                "ends_at": null,
                "has_voted": false
            }
        }"#;
        let envelope: ElectionEnvelope = decode("GET /elections/12", body).unwrap();
        let election: Election = envelope.election.into();
        assert_eq!(election.id, "12");
        assert_eq!(election.status, ElectionStatus::Active);
        assert!(election.starts_at.is_some());
    }

    #[test]
    fn positions_keep_backend_order() {
        let body = r#"{
            "positions": [
                {"id": "p1", "name": "President", "candidates": [
                    {"id": "c1", "name": "Ana", "party": "Unity", "department": "CS"},
                    {"id": "c2", "name": "Ben", "party": null, "department": null}
                ]},
                {"id": "p2", "name": "Auditor", "candidates": []}
            ]
        }"#;
        let envelope: PositionsEnvelope = decode("GET /elections/12/positions", body).unwrap();
        let positions: Vec<Position> = envelope.positions.into_iter().map(Position::from).collect();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].candidates[0].party.as_deref(), Some("Unity"));
        assert_eq!(positions[0].candidates[1].name, "Ben");
        assert!(positions[1].candidates.is_empty());
    }

    #[test]
    fn alternative_response_shapes_are_schema_errors() {
        // A bare list instead of the envelope is not accepted.
        let err = decode::<PositionsEnvelope>("GET /elections/12/positions", "[]").unwrap_err();
        match err {
            ServiceError::Schema { endpoint, .. } => assert_eq!(endpoint, "GET /elections/12/positions"),
            other => panic!("expected schema error, got {:?}", other),
        }

        let err = decode::<ElectionEnvelope>("GET /elections/12", r#"{"data": {}}"#).unwrap_err();
        assert!(matches!(err, ServiceError::Schema { .. }));
    }

    #[test]
    fn repeated_position_ids_are_schema_errors() {
        let body = r#"{
            "positions": [
                {"id": "p", "name": "President", "candidates": [{"id": "c1", "name": "Ana", "party": null, "department": null}]},
                {"id": "p", "name": "Treasurer", "candidates": [{"id": "c2", "name": "Ben", "party": null, "department": null}]}
            ]
        }"#;
        let endpoint = "GET /api/elections/12/positions";
        let envelope: PositionsEnvelope = decode(endpoint, body).unwrap();
        match positions_from(endpoint, envelope) {
            Err(ServiceError::Schema { endpoint: at, detail }) => {
                assert_eq!(at, endpoint);
                assert!(detail.contains("'p'"));
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    fn service(api_url: &str) -> HttpElectionService {
        let config = Config {
            api_url: api_url.to_string(),
            ..Config::default()
        };
        HttpElectionService::new(&config).unwrap()
    }

    #[test]
    fn election_ids_stay_inside_their_path_segment() {
        let service = service("http://localhost:8000/api");

        let url = service.election_url("12", Some("positions")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/elections/12/positions");

        let url = service.election_url("1/../../auth/logout", None).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/elections/1%2F..%2F..%2Fauth%2Flogout"
        );

        let url = service.election_url("1?x=", Some("votes")).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/elections/1%3Fx=/votes");
        assert!(url.query().is_none());

        assert_eq!(service.election_url("..", None), Err(ServiceError::NotFound));
        assert_eq!(service.election_url("", None), Err(ServiceError::NotFound));
    }

    #[test]
    fn auth_urls_extend_the_base_path() {
        let service = service("https://vote.school.edu/api/v1");
        assert_eq!(
            service.url(&["auth", "login"]).unwrap().as_str(),
            "https://vote.school.edu/api/v1/auth/login"
        );
    }

    #[test]
    fn unusable_api_url_is_rejected() {
        let config = Config {
            api_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            HttpElectionService::new(&config),
            Err(ServiceError::Network(_))
        ));
    }

    #[test]
    fn statuses_map_to_error_kinds() {
        assert_eq!(
            error_for_status(401, r#"{"message": "Token expired"}"#),
            ServiceError::Unauthorized("Token expired".to_string())
        );
        assert_eq!(error_for_status(404, ""), ServiceError::NotFound);
        assert_eq!(
            error_for_status(422, r#"{"message": "You already voted for President"}"#),
            ServiceError::Validation("You already voted for President".to_string())
        );
        assert_eq!(
            error_for_status(502, "<html>Bad Gateway</html>"),
            ServiceError::Server {
                status: 502,
                message: "request failed with status 502".to_string()
            }
        );
    }

    #[test]
    fn submit_request_serializes_votes_only() {
        let ballot = Ballot {
            votes: vec![BallotEntry {
                position_id: "p1".to_string(),
                candidate_id: "c2".to_string(),
            }],
        };
        let json = serde_json::to_value(SubmitRequest { votes: &ballot.votes }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"votes": [{"position_id": "p1", "candidate_id": "c2"}]})
        );
    }
}
