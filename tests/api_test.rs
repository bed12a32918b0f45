use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tower::ServiceExt;

use tma_notes::api::{cors_layer, router, AppState, INIT_DATA_HEADER};
use tma_notes::entity::{Note, NoteList};
use tma_notes::init_data::{StandardValidator, ThirdPartyValidator, Validator};
use tma_notes::{AuthGate, NoteStore};

const BOT_TOKEN: &str = "6000000001:AAFakeTokenForIntegrationTests";
const BOT_ID: i64 = 6000000001;

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[9u8; 32])
}

fn app(allow_anonymous: bool) -> Router {
    let validators: Vec<Box<dyn Validator>> = vec![
        Box::new(ThirdPartyValidator::new(
            BOT_ID,
            signing_key().verifying_key(),
            Duration::hours(24),
        )),
        Box::new(StandardValidator::new(BOT_TOKEN, Duration::hours(24))),
    ];
    let gate = AuthGate::new(validators, allow_anonymous.then_some(12345)).unwrap();
    router(AppState::new(NoteStore::new(), gate), cors_layer(&[]).unwrap())
}

fn pairs(user_id: i64) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("auth_date".to_string(), Utc::now().timestamp().to_string()),
        ("chat_type".to_string(), "private".to_string()),
        ("user".to_string(), format!(r#"{{"id":{user_id},"first_name":"Test"}}"#)),
    ];
    pairs.sort();
    pairs
}

fn check_string(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn encode(pairs: &[(String, String)], extra: (&str, &str)) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.append_pair(extra.0, extra.1);
    serializer.finish()
}

fn standard_init_data(user_id: i64) -> String {
    let hmac = |key: &[u8], message: &[u8]| {
        let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    };
    let pairs = pairs(user_id);
    let secret = hmac(b"WebAppData", BOT_TOKEN.as_bytes());
    let hash = hex::encode(hmac(&secret, check_string(&pairs).as_bytes()));
    encode(&pairs, ("hash", &hash))
}

fn third_party_init_data(user_id: i64) -> String {
    let pairs = pairs(user_id);
    let message = format!("{BOT_ID}:WebAppData\n{}", check_string(&pairs));
    let signature = signing_key().sign(message.as_bytes());
    encode(&pairs, ("signature", &URL_SAFE_NO_PAD.encode(signature.to_bytes())))
}

async fn send(app: &Router, method: &str, uri: &str, init_data: Option<&str>, body: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(raw) = init_data {
        builder = builder.header(INIT_DATA_HEADER, raw);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn create(app: &Router, init_data: &str, text: &str) -> Note {
    let body = serde_json::json!({ "text": text }).to_string();
    let response = send(app, "POST", "/api/notes", Some(init_data), Some(&body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn list(app: &Router, init_data: &str) -> Vec<Note> {
    let response = send(app, "GET", "/api/notes", Some(init_data), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice::<NoteList>(&bytes).unwrap().notes
}

fn texts(notes: &[Note]) -> Vec<&str> {
    notes.iter().map(|n| n.text.as_str()).collect()
}

#[tokio::test]
async fn test_users_only_see_their_own_notes() {
    let app = app(false);
    let alice = standard_init_data(1001);
    let bob = standard_init_data(2002);

    create(&app, &alice, "buy milk").await;

    let alice_notes = list(&app, &alice).await;
    assert_eq!(texts(&alice_notes), vec!["buy milk"]);
    assert_eq!(alice_notes[0].user_id, 1001);
    assert!(list(&app, &bob).await.is_empty());
}

#[tokio::test]
async fn test_notes_are_listed_newest_first() {
    let app = app(false);
    let user = standard_init_data(1);

    for text in ["a", "b", "c"] {
        create(&app, &user, text).await;
    }
    assert_eq!(texts(&list(&app, &user).await), vec!["c", "b", "a"]);
}

#[tokio::test]
async fn test_delete_lifecycle() {
    let app = app(false);
    let user = standard_init_data(1);

    create(&app, &user, "a").await;
    let b = create(&app, &user, "b").await;
    create(&app, &user, "c").await;

    let uri = format!("/api/notes/{}", b.id);
    let response = send(&app, "DELETE", &uri, Some(&user), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(texts(&list(&app, &user).await), vec!["c", "a"]);

    let response = send(&app, "DELETE", &uri, Some(&user), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(list(&app, &user).await.len(), 2);

    let response = send(&app, "DELETE", "/api/notes", Some(&user), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(list(&app, &user).await.is_empty());

    // Deleting everything again is still fine
    let response = send(&app, "DELETE", "/api/notes", Some(&user), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_cannot_delete_another_users_note() {
    let app = app(false);
    let alice = standard_init_data(1001);
    let bob = standard_init_data(2002);

    let note = create(&app, &alice, "private").await;
    let uri = format!("/api/notes/{}", note.id);
    let response = send(&app, "DELETE", &uri, Some(&bob), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(list(&app, &alice).await.len(), 1);
}

#[tokio::test]
async fn test_third_party_and_standard_resolve_same_user() {
    let app = app(false);

    create(&app, &third_party_init_data(77), "from third-party").await;
    create(&app, &standard_init_data(77), "from standard").await;

    let notes = list(&app, &third_party_init_data(77)).await;
    assert_eq!(texts(&notes), vec!["from standard", "from third-party"]);
}

#[tokio::test]
async fn test_invalid_init_data_is_rejected_even_with_anonymous_access() {
    let app = app(true);
    let forged = standard_init_data(1).replace("1%2C", "2%2C");

    let response = send(&app, "GET", "/api/notes", Some(&forged), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, "GET", "/api/notes", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_creates_for_one_user() {
    let app = app(false);
    let user = standard_init_data(5);

    let tasks: Vec<_> = (0..25)
        .map(|i| {
            let app = app.clone();
            let user = user.clone();
            tokio::spawn(async move { create(&app, &user, &format!("note {i}")).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let notes = list(&app, &user).await;
    assert_eq!(notes.len(), 25);
    let mut ids: Vec<_> = notes.iter().map(|n| n.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 25);
}
