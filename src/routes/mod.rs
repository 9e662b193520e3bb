//! API routes

mod auth;
mod chats;
mod error;
mod messages;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use crate::core::QueueStats;
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    queue: QueueStats,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queue: state.queue.stats(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/token/", post(auth::obtain_token))
        .route("/chat/", get(chats::list_chats).post(chats::create_chat))
        .route(
            "/messages/",
            get(messages::list_messages).post(messages::post_message),
        )
        .route("/updates/", get(messages::get_updates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::{Config, FileConfig};
    use crate::conversation::{timestamp, User};
    use crate::core::{CompletionClient, JobOutcome, Pipeline, ProductionQueue};
    use crate::store::{NewMessage, Store};
    use crate::testing::{DictionaryTranslator, ScriptedProvider};

    struct TestApp {
        state: AppState,
        translator: Arc<DictionaryTranslator>,
        provider: Arc<ScriptedProvider>,
    }

    impl TestApp {
        async fn new() -> Self {
            Self::with_translator(
                DictionaryTranslator::new()
                    .with("Hola", "Hello")
                    .with("How old are you?", "¿Cuántos años tienes?"),
            )
            .await
        }

        async fn with_translator(translator: DictionaryTranslator) -> Self {
            let config = Config::resolve(FileConfig::default(), |_| None).unwrap();
            let store = Arc::new(Store::new_in_memory().await.unwrap());
            let translator = Arc::new(translator);
            let provider = Arc::new(ScriptedProvider::answering("How old are you?"));

            let completion = CompletionClient::new(
                provider.clone(),
                translator.clone(),
                "You are a test assistant.",
                "es",
            );
            let pipeline = Arc::new(Pipeline::new(store.clone(), completion));
            let queue = ProductionQueue::start(pipeline, 2, Some(Duration::from_secs(5)));

            let state = AppState {
                config: Arc::new(config),
                store,
                translator: translator.clone(),
                queue,
            };

            Self {
                state,
                translator,
                provider,
            }
        }

        async fn user(&self, username: &str, is_staff: bool) -> (User, String) {
            let user = self
                .state
                .store
                .create_user(username, "pw", &format!("{username}@example.com"), is_staff)
                .await
                .unwrap();
            let token = self.state.store.get_or_create_token(user.id).await.unwrap();
            (user, token)
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = router()
                .with_state(self.state.clone())
                .oneshot(request)
                .await
                .unwrap();

            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new().await;
        let (status, body) = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["queue"]["submitted"], 0);
    }

    #[tokio::test]
    async fn test_token_endpoint() {
        let app = TestApp::new().await;
        let (user, _) = app.user("alice", false).await;

        let (status, body) = app
            .send(
                Method::POST,
                "/token/",
                None,
                Some(json!({"username": "alice", "password": "pw"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], user.id);
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["is_staff"], false);
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));

        let (status, _) = app
            .send(
                Method::POST,
                "/token/",
                None,
                Some(json!({"username": "alice", "password": "wrong"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .send(Method::POST, "/token/", None, Some(json!({"username": "alice"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_endpoints_require_token() {
        let app = TestApp::new().await;
        for uri in ["/chat/", "/messages/?chat=x", "/updates/?chat=x&timestamp=2024-01-01"] {
            let (status, _) = app.send(Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");

            let (status, _) = app.send(Method::GET, uri, Some("bogus"), None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_new_user_gets_default_chat() {
        let app = TestApp::new().await;
        let (user, token) = app.user("bob", false).await;

        let (status, body) = app.send(Method::GET, "/chat/", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let chats = body.as_array().unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0]["name"], "Chat");
        assert_eq!(chats[0]["user"], user.id);

        // a second read does not create another one
        let (_, body) = app.send(Method::GET, "/chat/", Some(&token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_chat_and_staff_sees_all() {
        let app = TestApp::new().await;
        let (_, alice) = app.user("alice", false).await;
        let (_, bob) = app.user("bob", false).await;
        let (_, staff) = app.user("root", true).await;

        let (status, body) = app
            .send(Method::POST, "/chat/", Some(&alice), Some(json!({"name": "Savings"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Savings");

        let (status, body) = app.send(Method::POST, "/chat/", Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Chat");

        let (_, body) = app.send(Method::GET, "/chat/", Some(&alice), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = app.send(Method::GET, "/chat/", Some(&staff), None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_post_message_creates_pair_and_produces_answer() {
        let app = TestApp::new().await;
        let (user, token) = app.user("carol", false).await;
        let chat = app.state.store.create_conversation(user.id, "Chat").await.unwrap();
        let mut reports = app.state.queue.subscribe();

        let (status, body) = app
            .send(
                Method::POST,
                "/messages/",
                Some(&token),
                Some(json!({"message": "Hola", "chat": chat.id, "id": "m1"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let placeholder_id = body["id"].as_str().unwrap().to_string();
        assert_ne!(placeholder_id, "m1");
        assert!(body["user"].is_null());

        let user_message = app.state.store.get_message("m1").await.unwrap().unwrap();
        assert_eq!(user_message.text, "Hello");
        assert_eq!(user_message.chat_display_text, "Hola");
        assert_eq!(user_message.user_id, Some(user.id));
        assert!(app
            .translator
            .calls()
            .contains(&("Hola".to_string(), "en".to_string())));

        let report = reports.recv().await.unwrap();
        assert_eq!(report.placeholder_id, placeholder_id);
        assert_eq!(report.outcome, JobOutcome::Filled { fallback: false });

        let (status, body) = app
            .send(
                Method::GET,
                &format!("/messages/?chat={}", chat.id),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let messages = body.as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["id"], "m1");
        assert_eq!(messages[1]["id"], placeholder_id.as_str());
        assert_eq!(messages[1]["text"], "How old are you?");
        assert_eq!(messages[1]["chat_display_text"], "¿Cuántos años tienes?");
    }

    #[tokio::test]
    async fn test_staff_post_bypasses_translation_and_production() {
        let app = TestApp::new().await;
        let (owner, _) = app.user("dora", false).await;
        let (_, staff) = app.user("root", true).await;
        let chat = app.state.store.create_conversation(owner.id, "Chat").await.unwrap();

        let (status, body) = app
            .send(
                Method::POST,
                "/messages/",
                Some(&staff),
                Some(json!({"message": "Hi", "chat": chat.id, "id": "m2"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": "m2"}));

        let messages = app.state.store.list_messages(&chat.id, None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].user_id.is_none());
        assert_eq!(messages[0].text, "Hi");
        assert_eq!(messages[0].chat_display_text, "Hi");

        assert!(app.translator.calls().is_empty());
        assert!(app.provider.requests().is_empty());
        assert_eq!(app.state.queue.stats().submitted, 0);
    }

    #[tokio::test]
    async fn test_post_message_validation() {
        let app = TestApp::new().await;
        let (alice, alice_token) = app.user("alice", false).await;
        let (_, bob_token) = app.user("bob", false).await;
        let chat = app.state.store.create_conversation(alice.id, "Chat").await.unwrap();

        let cases = [
            json!({"chat": chat.id, "id": "x1"}),
            json!({"message": "Hola", "id": "x2"}),
            json!({"message": "Hola", "chat": chat.id}),
            json!({"message": "", "chat": chat.id, "id": "x3"}),
            json!({"message": "Hola", "chat": "no-such-chat", "id": "x4"}),
        ];
        for body in cases {
            let (status, _) = app
                .send(Method::POST, "/messages/", Some(&alice_token), Some(body.clone()))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }

        // someone else's conversation looks unknown
        let (status, _) = app
            .send(
                Method::POST,
                "/messages/",
                Some(&bob_token),
                Some(json!({"message": "Hola", "chat": chat.id, "id": "x5"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.state.store.get_message("x5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_translation_outage_on_post_writes_nothing() {
        let app = TestApp::with_translator(DictionaryTranslator::new().failing()).await;
        let (user, token) = app.user("hugo", false).await;
        let chat = app.state.store.create_conversation(user.id, "Chat").await.unwrap();

        let (status, body) = app
            .send(
                Method::POST,
                "/messages/",
                Some(&token),
                Some(json!({"message": "Hola", "chat": chat.id, "id": "m9"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "upstream_failed");

        assert!(app.state.store.list_messages(&chat.id, None).await.unwrap().is_empty());
        assert_eq!(app.state.queue.stats().submitted, 0);
        assert!(app.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_message_id_is_rejected() {
        let app = TestApp::new().await;
        let (_, staff) = app.user("root", true).await;
        let (owner, _) = app.user("erin", false).await;
        let chat = app.state.store.create_conversation(owner.id, "Chat").await.unwrap();

        let body = json!({"message": "Hi", "chat": chat.id, "id": "same"});
        let (status, _) = app
            .send(Method::POST, "/messages/", Some(&staff), Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app
            .send(Method::POST, "/messages/", Some(&staff), Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_messages_requires_chat() {
        let app = TestApp::new().await;
        let (_, token) = app.user("fay", false).await;

        let (status, _) = app.send(Method::GET, "/messages/", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_updates() {
        let app = TestApp::new().await;
        let (user, token) = app.user("gus", false).await;
        let chat = app.state.store.create_conversation(user.id, "Chat").await.unwrap();
        let first = app
            .state
            .store
            .create_message(NewMessage {
                id: "u1".to_string(),
                conversation_id: chat.id.clone(),
                user_id: Some(user.id),
                text: "Hello".to_string(),
                chat_display_text: "Hola".to_string(),
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        app.state
            .store
            .create_message(NewMessage::placeholder(&chat.id))
            .await
            .unwrap();

        let since = timestamp::encode(first.timestamp);
        let uri = format!("/updates/?chat={}&timestamp={}", chat.id, since);
        let (status, body) = app.send(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let uri = format!("/updates/?chat={}&timestamp=2999-01-01T00:00:00", chat.id);
        let (status, body) = app.send(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let uri = format!("/updates/?chat={}&timestamp=2000-01-01", chat.id);
        let (_, body) = app.send(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        for uri in [
            format!("/updates/?chat={}", chat.id),
            format!("/updates/?chat={}&timestamp=soon", chat.id),
            "/updates/?timestamp=2000-01-01".to_string(),
        ] {
            let (status, _) = app.send(Method::GET, &uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }
}
