#![allow(dead_code)]

use clap::Parser;
use parley_server::adapters::Backends;
use parley_server::adapters::database::{DbPool, init_pool};
use parley_server::adapters::memory::InMemoryStore;
use parley_server::adapters::storage::PublicUrlSigner;
use parley_server::config::Config;
use parley_server::domain::profile::ProfileSummary;
use parley_server::server::Server;
use serde_json::{Value, json};
use std::sync::{Arc, Once};
use tokio::sync::watch;

static INIT: Once = Once::new();

pub const MEDIA_BASE_URL: &str = "https://media.test";

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("parley_server=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}

pub fn get_test_config() -> Config {
    let mut config = Config::parse_from([
        "parley-server",
        "--database-url",
        "postgres://unused@localhost/parley",
        "--storage-bucket",
        "parley-test",
    ]);
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.mgmt_port = 0;
    config.rate_limit.per_second = 10_000;
    config.rate_limit.burst = 10_000;
    config.messaging.summary_retry_base_delay_ms = 1;
    config.repair.interval_secs = 0;
    config
}

/// Connects to the database named by `DATABASE_URL` and applies the migrations.
///
/// Returns `None` when the variable is unset so the Postgres suites are skipped without a server.
pub async fn get_test_pool() -> Option<DbPool> {
    setup_tracing();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL not set, skipping Postgres test");
        return None;
    };

    let mut database = get_test_config().database;
    database.url = database_url;
    let pool = init_pool(&database).await.expect("Failed to connect to DB. Is Postgres running?");

    sqlx::migrate!().run(&pool).await.expect("Failed to run migrations");

    Some(pool)
}

/// The real routers served on ephemeral ports over the in-process backend.
pub struct TestApp {
    pub api_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub store: Arc<InMemoryStore>,
    pub config: Config,
    shutdown: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let backends = Backends::in_memory(Arc::clone(&store), PublicUrlSigner::new(MEDIA_BASE_URL));
        Self::spawn_with_backends(config, store, backends).await
    }

    pub async fn spawn_with_backends(config: Config, store: Arc<InMemoryStore>, backends: Backends) -> Self {
        setup_tracing();

        let server = Server::bind(&config, backends).await.unwrap();
        let api_url = format!("http://{}", server.api_addr().unwrap());
        let mgmt_url = format!("http://{}", server.mgmt_addr().unwrap());

        let (shutdown, _) = watch::channel(false);
        tokio::spawn(server.run(shutdown.clone()));

        Self { api_url, mgmt_url, client: reqwest::Client::new(), store, config, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/candidate{}", self.api_url, path)
    }

    pub fn profile(&self, user_id: &str, full_name: &str, image: Option<&str>) {
        self.store.upsert_profile(ProfileSummary {
            user_id: user_id.to_string(),
            full_name: Some(full_name.to_string()),
            profile_image: image.map(str::to_string),
            headline: None,
        });
    }

    pub async fn send_raw(&self, body: Value) -> reqwest::Response {
        self.client.post(self.url("/messages/send")).json(&body).send().await.unwrap()
    }

    /// Sends a text message and returns the `data` object of the 201 response.
    pub async fn send(&self, sender: &str, receiver: &str, content: &str) -> Value {
        let resp = self.send_raw(json!({ "senderId": sender, "receiverId": receiver, "content": content })).await;
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    pub async fn unread_count(&self, user_id: &str) -> i64 {
        let resp = self.client.get(self.url(&format!("/messages/unread-count/{user_id}"))).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        body["unreadCount"].as_i64().unwrap()
    }

    pub async fn messages(&self, conversation_id: &str, user_id: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/messages/conversation/{conversation_id}?userId={user_id}")))
            .send()
            .await
            .unwrap()
    }

    pub async fn mark_read(&self, conversation_id: &str, user_id: &str) -> reqwest::Response {
        self.client
            .put(self.url(&format!("/messages/conversation/{conversation_id}/read")))
            .json(&json!({ "userId": user_id }))
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
