//! GoHighLevel REST adapter. Implements CrmGateway over reqwest.
//!
//! Every request carries `Accept`, `Version` and the bearer token from [`GhlClientConfig`].
//! A shared semaphore caps upstream requests in flight; a permit is held for one
//! request/response exchange (including body read) and never across nested calls.
//! Ids are pushed as percent-encoded path segments, never spliced into the path text.

use crate::adapters::ghl::mapper::{
    self, ContactsEnvelope, ConversationsEnvelope, MessagesEnvelope,
};
use crate::domain::{
    Contact, Conversation, DEFAULT_RECORDING_FILENAME, DomainError, Message, NoteResponse,
    Recording,
};
use crate::ports::CrmGateway;
use crate::shared::GhlClientConfig;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, warn};

pub struct GhlGateway {
    client: Client,
    base: Url,
    config: GhlClientConfig,
    in_flight: Semaphore,
}

impl GhlGateway {
    /// Create a gateway from an explicit client configuration.
    ///
    /// # Errors
    /// `DomainError::Transport` if the HTTP client cannot be built or `api_base` is not a
    /// usable base URL.
    pub fn new(config: GhlClientConfig) -> Result<Self, DomainError> {
        let base = Url::parse(&config.api_base).map_err(|e| {
            DomainError::Transport(format!("invalid API base {}: {}", config.api_base, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(DomainError::Transport(format!(
                "invalid API base {}",
                config.api_base
            )));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DomainError::Transport(format!("build HTTP client: {}", e)))?;
        let in_flight = Semaphore::new(config.max_in_flight.max(1));
        Ok(Self {
            client,
            base,
            config,
            in_flight,
        })
    }

    /// Base URL extended with `segments`, each percent-encoded (`/`, `?`, `#` and `%` included).
    fn url(&self, segments: &[&str]) -> Result<Url, DomainError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DomainError::Transport("API base cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(ACCEPT, "application/json")
            .header("Version", &self.config.api_version)
            .bearer_auth(&self.config.token)
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>, DomainError> {
        self.in_flight
            .acquire()
            .await
            .map_err(|_| DomainError::Transport("request limiter closed".to_string()))
    }

    async fn send(
        &self,
        resource: &'static str,
        builder: RequestBuilder,
    ) -> Result<Response, DomainError> {
        self.authorized(builder)
            .send()
            .await
            .map_err(|e| DomainError::Transport(format!("{} request failed: {}", resource, e)))
    }

    /// Turn a non-success response into `DomainError::Upstream` with the body text.
    async fn ensure_success(
        resource: &'static str,
        response: Response,
    ) -> Result<Response, DomainError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        warn!(resource, status = %status, body = %text, "CRM API returned error");
        Err(DomainError::upstream(resource, status.as_u16(), &text))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, DomainError> {
        let _permit = self.permit().await?;
        let response = self.send(resource, builder).await?;
        let response = Self::ensure_success(resource, response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| DomainError::Decode(format!("{}: {}", resource, e)))
    }
}

/// Ids that would vanish or collapse as a single path segment are rejected.
fn path_id<'a>(name: &str, id: &'a str) -> Result<&'a str, DomainError> {
    match id {
        "" | "." | ".." => Err(DomainError::InvalidInput(format!("Invalid {}", name))),
        _ => Ok(id),
    }
}

#[async_trait::async_trait]
impl CrmGateway for GhlGateway {
    async fn list_contacts(&self, location_id: &str) -> Result<Vec<Contact>, DomainError> {
        let request = self
            .client
            .get(self.url(&["contacts", ""])?)
            .query(&[("locationId", location_id)]);
        let envelope: ContactsEnvelope = self.get_json("contacts", request).await?;
        let contacts = mapper::contacts_from_envelope(envelope);
        debug!(location_id, count = contacts.len(), "fetched contacts");
        Ok(contacts)
    }

    async fn search_conversations(
        &self,
        contact_id: &str,
        location_id: &str,
    ) -> Result<Vec<Conversation>, DomainError> {
        let request = self
            .client
            .get(self.url(&["conversations", "search"])?)
            .query(&[("locationId", location_id), ("contactId", contact_id)]);
        let envelope: ConversationsEnvelope = self.get_json("conversations", request).await?;
        let conversations = envelope.into_conversations();
        debug!(contact_id, count = conversations.len(), "fetched conversations");
        Ok(conversations)
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, DomainError> {
        let conversation_id = path_id("conversationId", conversation_id)?;
        let request = self
            .client
            .get(self.url(&["conversations", conversation_id, "messages"])?);
        let envelope: MessagesEnvelope = self.get_json("messages", request).await?;
        let messages = envelope.into_messages();
        debug!(conversation_id, count = messages.len(), "fetched messages");
        Ok(messages)
    }

    async fn fetch_recording(
        &self,
        message_id: &str,
        location_id: &str,
    ) -> Result<Option<Recording>, DomainError> {
        let message_id = path_id("messageId", message_id)?;
        let location_id = path_id("locationId", location_id)?;
        let request = self.client.get(self.url(&[
            "conversations",
            "messages",
            message_id,
            "locations",
            location_id,
            "recording",
        ])?);

        let _permit = self.permit().await?;
        let response = self.send("recording", request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(message_id, "no recording for call message");
            return Ok(None);
        }
        let response = Self::ensure_success("recording", response).await?;

        let headers = response.headers();
        let filename = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(mapper::filename_from_disposition)
            .unwrap_or_else(|| DEFAULT_RECORDING_FILENAME.to_string());
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DomainError::Transport(format!("recording body: {}", e)))?;

        debug!(message_id, size = bytes.len(), filename = %filename, "fetched recording");
        Ok(Some(Recording {
            bytes: bytes.to_vec(),
            filename,
            content_type,
        }))
    }

    async fn create_note(&self, contact_id: &str, body: &str) -> Result<NoteResponse, DomainError> {
        let contact_id = path_id("contactId", contact_id)?;
        let request = self
            .client
            .post(self.url(&["contacts", contact_id, "notes"])?)
            .form(&[("body", body)]);

        let _permit = self.permit().await?;
        let response = self.send("notes", request).await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DomainError::Transport(format!("notes body: {}", e)))?;

        if !status.is_success() {
            warn!(contact_id, status = %status, body = %text, "note creation rejected");
            return Err(DomainError::upstream("notes", status.as_u16(), &text));
        }

        Ok(NoteResponse::from_body(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryRecordingStore;
    use crate::shared::AggregationOptions;
    use crate::usecases::RecordingsService;
    use axum::extract::{Form, Path, Query, Request, State};
    use axum::http::{HeaderMap, Method, StatusCode as AxumStatus, Uri, header};
    use axum::middleware::{self, Next};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const TOKEN: &str = "test-token";

    fn authorized(headers: &HeaderMap) -> bool {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let version = headers.get("Version").and_then(|v| v.to_str().ok());
        bearer == Some("Bearer test-token") && version == Some("2021-07-28")
    }

    async fn contacts(headers: HeaderMap, Query(q): Query<HashMap<String, String>>) -> AxumResponse {
        if !authorized(&headers) {
            return (AxumStatus::UNAUTHORIZED, "bad token").into_response();
        }
        if q.get("locationId").map(String::as_str) == Some("broken") {
            return (AxumStatus::INTERNAL_SERVER_ERROR, "boom").into_response();
        }
        Json(json!({
            "contacts": [
                { "id": "c1", "firstNameRaw": "Ada", "lastNameRaw": "Lovelace", "email": "ada@example.com", "locationId": q.get("locationId") },
                { "id": "c2", "firstNameRaw": "Alan" }
            ],
            "meta": { "total": 2 }
        }))
        .into_response()
    }

    async fn search(Query(q): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
        match (
            q.get("contactId").map(String::as_str),
            q.get("locationId").map(String::as_str),
        ) {
            (Some("c1"), Some("loc1")) => Json(json!({
                "conversations": [{ "id": "conv1", "contactId": "c1", "type": "TYPE_PHONE" }]
            })),
            _ => Json(json!({ "total": 0 })),
        }
    }

    async fn messages(Path(id): Path<String>) -> Json<serde_json::Value> {
        Json(json!({
            "messages": {
                "messages": [
                    { "id": format!("{}-m1", id), "messageType": "TYPE_CALL" },
                    { "id": format!("{}-m2", id), "messageType": "TYPE_SMS", "body": "hi" }
                ]
            }
        }))
    }

    async fn recording(Path((message_id, _location)): Path<(String, String)>) -> AxumResponse {
        match message_id.as_str() {
            "missing" => (AxumStatus::NOT_FOUND, "not found").into_response(),
            "broken" => (AxumStatus::BAD_GATEWAY, "upstream down").into_response(),
            "bare" => (AxumStatus::OK, vec![1u8, 2, 3]).into_response(),
            _ => (
                [
                    (header::CONTENT_TYPE, "audio/x-wav"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"call-1.wav\""),
                ],
                vec![b'R', b'I', b'F', b'F'],
            )
                .into_response(),
        }
    }

    async fn notes(
        Path(contact_id): Path<String>,
        Form(form): Form<HashMap<String, String>>,
    ) -> AxumResponse {
        match contact_id.as_str() {
            "rejected" => (AxumStatus::UNPROCESSABLE_ENTITY, "body too long").into_response(),
            "plain" => (AxumStatus::CREATED, "ok").into_response(),
            _ => Json(json!({ "note": { "id": "n1", "body": form.get("body") } })).into_response(),
        }
    }

    fn upstream_router() -> Router {
        Router::new()
            .route("/contacts/", get(contacts))
            .route("/contacts/:id/notes", post(notes))
            .route("/conversations/search", get(search))
            .route("/conversations/:id/messages", get(messages))
            .route(
                "/conversations/messages/:message_id/locations/:location_id/recording",
                get(recording),
            )
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn spawn_upstream() -> String {
        serve(upstream_router()).await
    }

    fn gateway_at(api_base: String, max_in_flight: usize) -> GhlGateway {
        GhlGateway::new(GhlClientConfig {
            api_base,
            api_version: "2021-07-28".into(),
            token: TOKEN.into(),
            request_timeout: Duration::from_secs(5),
            max_in_flight,
        })
        .unwrap()
    }

    /// Upstream that answers `{}` to everything and records `METHOD path?query` as received.
    async fn spawn_path_log() -> (String, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let router = Router::new().fallback(move |method: Method, uri: Uri| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{} {}", method, uri));
                Json(json!({}))
            }
        });
        (serve(router).await, seen)
    }

    #[derive(Default)]
    struct InFlight {
        current: AtomicUsize,
        peak: AtomicUsize,
        total: AtomicUsize,
    }

    async fn track_in_flight(
        State(in_flight): State<Arc<InFlight>>,
        request: Request,
        next: Next,
    ) -> AxumResponse {
        let now = in_flight.current.fetch_add(1, Ordering::SeqCst) + 1;
        in_flight.peak.fetch_max(now, Ordering::SeqCst);
        in_flight.total.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        let response = next.run(request).await;
        in_flight.current.fetch_sub(1, Ordering::SeqCst);
        response
    }

    async fn gateway() -> GhlGateway {
        GhlGateway::new(GhlClientConfig {
            api_base: spawn_upstream().await,
            api_version: "2021-07-28".into(),
            token: TOKEN.into(),
            request_timeout: Duration::from_secs(5),
            max_in_flight: 2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_contacts_sends_auth_headers() {
        let gw = gateway().await;
        let contacts = gw.list_contacts("loc1").await.unwrap();
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].first_name.as_deref(), Some("Ada"));
        assert_eq!(contacts[0].location_id.as_deref(), Some("loc1"));
        assert_eq!(contacts[1].email, None);
    }

    #[tokio::test]
    async fn test_list_contacts_upstream_error() {
        let gw = gateway().await;
        let err = gw.list_contacts("broken").await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Upstream {
                resource: "contacts",
                status: 500,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_bad_token_is_upstream_error() {
        let gw = GhlGateway::new(GhlClientConfig {
            api_base: spawn_upstream().await,
            api_version: "2021-07-28".into(),
            token: "wrong".into(),
            request_timeout: Duration::from_secs(5),
            max_in_flight: 1,
        })
        .unwrap();
        let err = gw.list_contacts("loc1").await.unwrap_err();
        assert!(matches!(err, DomainError::Upstream { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_conversations_scoped_to_location() {
        let gw = gateway().await;
        let found = gw.search_conversations("c1", "loc1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "conv1");
        assert_eq!(found[0].fields.get("contactId"), Some(&json!("c1")));

        let other_location = gw.search_conversations("c1", "loc2").await.unwrap();
        assert!(other_location.is_empty());
    }

    #[tokio::test]
    async fn test_list_messages_unwraps_nested_page() {
        let gw = gateway().await;
        let messages = gw.list_messages("conv1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_call());
        assert_eq!(messages[1].fields.get("body"), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn test_fetch_recording_outcomes() {
        let gw = gateway().await;

        let found = gw.fetch_recording("m1", "loc1").await.unwrap().unwrap();
        assert_eq!(found.filename, "call-1.wav");
        assert_eq!(found.content_type.as_deref(), Some("audio/x-wav"));
        assert_eq!(found.bytes, b"RIFF".to_vec());

        let bare = gw.fetch_recording("bare", "loc1").await.unwrap().unwrap();
        assert_eq!(bare.filename, DEFAULT_RECORDING_FILENAME);

        assert!(gw.fetch_recording("missing", "loc1").await.unwrap().is_none());

        let err = gw.fetch_recording("broken", "loc1").await.unwrap_err();
        assert!(matches!(err, DomainError::Upstream { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_create_note_form_body() {
        let gw = gateway().await;
        let created = gw.create_note("c1", "Call summary").await.unwrap();
        assert_eq!(
            created,
            NoteResponse::Created(json!({ "note": { "id": "n1", "body": "Call summary" } }))
        );

        let raw = gw.create_note("plain", "x").await.unwrap();
        assert_eq!(
            raw,
            NoteResponse::Raw {
                raw_response: "ok".into()
            }
        );
    }

    #[tokio::test]
    async fn test_create_note_surfaces_upstream_text() {
        let gw = gateway().await;
        let err = gw.create_note("rejected", "x").await.unwrap_err();
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("body too long"));
    }

    #[tokio::test]
    async fn test_ids_are_sent_as_single_encoded_segments() {
        let (base, seen) = spawn_path_log().await;
        let gw = gateway_at(base, 2);

        gw.create_note("../../locations/L1/customFields?", "x")
            .await
            .unwrap();
        gw.create_note("victim?", "x").await.unwrap();
        gw.list_messages("conv/1#frag").await.unwrap();
        gw.fetch_recording("m 1", "loc%2F").await.unwrap();
        gw.search_conversations("c&x=1", "loc1").await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "POST /contacts/..%2F..%2Flocations%2FL1%2FcustomFields%3F/notes",
                "POST /contacts/victim%3F/notes",
                "GET /conversations/conv%2F1%23frag/messages",
                "GET /conversations/messages/m%201/locations/loc%252F/recording",
                "GET /conversations/search?locationId=loc1&contactId=c%26x%3D1",
            ]
        );
    }

    #[tokio::test]
    async fn test_dot_ids_rejected_before_sending() {
        let (base, seen) = spawn_path_log().await;
        let gw = gateway_at(base, 2);

        for id in ["", ".", ".."] {
            assert!(gw.create_note(id, "x").await.unwrap_err().is_invalid_input());
            assert!(gw.list_messages(id).await.unwrap_err().is_invalid_input());
            assert!(gw.fetch_recording(id, "loc1").await.unwrap_err().is_invalid_input());
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_base_with_path_prefix() {
        let (base, seen) = spawn_path_log().await;
        let gw = gateway_at(format!("{}/v2/", base), 1);
        gw.list_contacts("loc1").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["GET /v2/contacts/?locationId=loc1"]);
    }

    #[tokio::test]
    async fn test_in_flight_cap_holds_under_nested_fan_out() {
        let in_flight = Arc::new(InFlight::default());
        let router = upstream_router().layer(middleware::from_fn_with_state(
            Arc::clone(&in_flight),
            track_in_flight,
        ));
        let gw: Arc<dyn CrmGateway> = Arc::new(gateway_at(serve(router).await, 2));
        let store = Arc::new(MemoryRecordingStore::new(Duration::from_secs(60), ""));
        let svc = RecordingsService::new(
            Arc::clone(&gw),
            store,
            "loc1",
            AggregationOptions::default(),
        );

        let aggregations = (0..3).map(|_| svc.fetch_all_recordings(None));
        let listings = (0..4).map(|i| gw.list_messages(if i % 2 == 0 { "conv1" } else { "conv2" }));
        let (aggregated, listed) = tokio::join!(
            futures::future::join_all(aggregations),
            futures::future::join_all(listings),
        );
        assert!(aggregated.iter().all(Result::is_ok));
        assert!(listed.iter().all(Result::is_ok));

        // each aggregation: contacts, 2 searches, 1 message list, 1 recording (later ones reuse it)
        assert!(in_flight.total.load(Ordering::SeqCst) >= 3 * 4 + 1 + 4);
        assert_eq!(in_flight.peak.load(Ordering::SeqCst), 2);
    }
}
