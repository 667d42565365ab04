use roombot_core::config::ClientConfig;
use roombot_core::types::{ActionKind, BookingId};
use roombot_engine::engine::spawn_engine;
use roombot_engine::traits::{BookingApi, ChatTransport, CommandError};
use roombot_engine::turn::TurnEnd;
use roombot_engine::workflow::ConfirmOutcome;
use roombot_runtime::http_client::{HttpBookingClient, LoginError, login};
use roombot_runtime::runtime_engine::build_runtime_from_config;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn ndjson(records: &[Value]) -> String {
    records.iter().map(|r| format!("{r}\n")).collect()
}

fn client(server: &MockServer) -> Arc<HttpBookingClient> {
    let cfg = ClientConfig::with_base_url(server.uri());
    Arc::new(HttpBookingClient::from_config(&cfg, "tok").unwrap())
}

/// Server-side conversational context, as the booking service keeps it.
#[derive(Clone, Default)]
struct ServerContext(Arc<Mutex<Option<i64>>>);

struct SetContext(ServerContext);

impl Respond for SetContext {
    fn respond(&self, req: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&req.body).unwrap();
        *self.0.0.lock().unwrap() = body["last_booking_id"].as_i64();
        ResponseTemplate::new(200).set_body_json(json!({"message": "Contexte mis à jour"}))
    }
}

/// First message proposes a booking; every later one resolves "cancel it"
/// from the stored context.
struct Assistant {
    ctx: ServerContext,
    turns: AtomicUsize,
}

impl Respond for Assistant {
    fn respond(&self, _req: &Request) -> ResponseTemplate {
        let body = if self.turns.fetch_add(1, Ordering::SeqCst) == 0 {
            ndjson(&[
                json!({"type": "delta", "content": "Je peux réserver **Atlas**."}),
                json!({"type": "action", "action": "confirm_booking", "data": {
                    "room_id": 1,
                    "start_time": "2025-01-06T10:00:00",
                    "end_time": "2025-01-06T11:00:00",
                    "attendees": 4
                }}),
            ])
        } else {
            let id = *self.ctx.0.lock().unwrap();
            ndjson(&[
                json!({"type": "delta", "content": "Annuler cette réservation ?"}),
                json!({"type": "action", "action": "confirm_cancel", "data": {"booking_id": id}}),
            ])
        };
        ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson")
    }
}

#[tokio::test]
async fn created_booking_is_the_target_of_a_follow_up_cancel() {
    let server = MockServer::start().await;
    let ctx = ServerContext::default();

    Mock::given(method("POST"))
        .and(path("/api/chat/message"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(Assistant {
            ctx: ctx.clone(),
            turns: AtomicUsize::new(0),
        })
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/bookings/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 77, "room_id": 1, "start_time": "2025-01-06T10:00:00",
            "end_time": "2025-01-06T11:00:00", "attendees_count": 4, "status": "confirmed"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/chat/context"))
        .respond_with(SetContext(ctx.clone()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/bookings/77"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Réservation annulée"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/chat/context"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .mount(&server)
        .await;

    let http = client(&server);
    let (engine, _events) = spawn_engine(http.clone(), http.clone());

    let first = engine.submit("réserve Atlas demain à 10h").await.unwrap();
    assert_eq!(first.pending, Some(ActionKind::ConfirmBooking));
    let created = engine.confirm_pending().await.unwrap();
    assert_eq!(
        created,
        ConfirmOutcome::Succeeded {
            kind: ActionKind::ConfirmBooking,
            booking_id: Some(BookingId(77))
        }
    );
    assert_eq!(*ctx.0.lock().unwrap(), Some(77));

    let second = engine.submit("annule-la").await.unwrap();
    assert_eq!(second.pending, Some(ActionKind::ConfirmCancel));
    let cancelled = engine.confirm_pending().await.unwrap();
    assert!(matches!(cancelled, ConfirmOutcome::Succeeded { .. }));
    assert_eq!(engine.last_booking().await.unwrap(), None);
}

#[tokio::test]
async fn cancel_all_issues_batch_delete_then_context_clear() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/message"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            ndjson(&[json!({"type": "action", "action": "confirm_cancel_all"})]),
            "application/x-ndjson",
        ))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/bookings/batch"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "2 réservations annulées."})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/chat/context"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let http = client(&server);
    let (engine, _events) = spawn_engine(http.clone(), http.clone());
    engine.submit("annule tout").await.unwrap();
    engine.confirm_pending().await.unwrap();

    let entries = engine.transcript().await.unwrap();
    assert_eq!(
        entries.last().unwrap().body.text(),
        "✅ 2 réservations annulées."
    );

    let calls: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect();
    assert_eq!(
        calls,
        vec![
            "POST /api/chat/message",
            "DELETE /api/bookings/batch",
            "DELETE /api/chat/context"
        ]
    );
}

#[tokio::test]
async fn rejected_booking_carries_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bookings/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Salle déjà réservée"})),
        )
        .mount(&server)
        .await;

    let http = client(&server);
    let draft = serde_json::from_value(json!({"start_time": "a", "end_time": "b"})).unwrap();
    match http.create_booking(&draft).await {
        Err(CommandError::Rejected { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Salle déjà réservée");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn chat_refusal_is_a_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/message"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token is invalid!"})))
        .mount(&server)
        .await;

    let http = client(&server);
    match http.open_chat("bonjour").await {
        Err(CommandError::Rejected { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Token is invalid!");
        }
        Err(e) => panic!("unexpected {e:?}"),
        Ok(_) => panic!("expected refusal"),
    }

    let (engine, _events) = spawn_engine(http.clone(), http.clone());
    let summary = engine.submit("bonjour").await.unwrap();
    assert!(matches!(summary.end, TurnEnd::TransportError(_)));
}

#[tokio::test]
async fn lists_bookings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bookings/my_bookings"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "room_name": "Atlas", "start_time": "2025-01-06T10:00:00",
             "end_time": "2025-01-06T11:00:00", "attendees_count": 4}
        ])))
        .mount(&server)
        .await;

    let list = client(&server).list_bookings().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].room_label(), "Atlas");
}

#[tokio::test]
async fn login_returns_token_or_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(|req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap();
            if body["password"] == "secret" {
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": "jwt", "role": "user", "username": "ana"}))
            } else {
                ResponseTemplate::new(401).set_body_json(json!({"message": "Identifiants invalides"}))
            }
        })
        .mount(&server)
        .await;

    let cfg = ClientConfig::with_base_url(server.uri());
    let ok = login(&cfg, "ana", "secret").await.unwrap();
    assert_eq!(ok.token, "jwt");
    assert_eq!(ok.username.as_deref(), Some("ana"));

    match login(&cfg, "ana", "wrong").await {
        Err(LoginError::Rejected(message)) => assert_eq!(message, "Identifiants invalides"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn login_without_server_is_a_connection_error() {
    // Port 9 (discard) is not expected to accept HTTP.
    let mut cfg = ClientConfig::with_base_url("http://127.0.0.1:9");
    cfg.connect_timeout_secs = 1;
    let err = login(&cfg, "ana", "secret").await.unwrap_err();
    assert!(matches!(err, LoginError::Transport(_)));
    assert_eq!(err.to_string(), "Erreur de connexion.");
}

#[tokio::test]
async fn runtime_without_recognizer_has_no_dictation() {
    let server = MockServer::start().await;
    let cfg = ClientConfig::with_base_url(server.uri());
    let rt = build_runtime_from_config(&cfg, "tok", None).unwrap();
    assert!(rt.dictation.is_none());

    rt.composer.set_input("   ");
    assert_eq!(rt.composer.send().await.unwrap(), None);
}
