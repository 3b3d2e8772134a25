#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use quillpress::config::Config;
use quillpress::db::User;
use quillpress::services::{Mail, RecordingMailSender};
use quillpress::state::SharedState;
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub shared: Arc<SharedState>,
    pub mail: Arc<RecordingMailSender>,
    pub admin: User,
    pub admin_password: String,
    db_file: PathBuf,
    upload_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_file);
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

pub fn test_config() -> (Config, PathBuf, PathBuf) {
    let id = uuid::Uuid::new_v4();
    let tmp = std::env::temp_dir();
    let db_file = tmp.join(format!("quillpress-test-{id}.db"));
    let upload_dir = tmp.join(format!("quillpress-test-{id}-files"));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_file.display());
    config.user.bcrypt_cost = 4;
    config.file.location = upload_dir.display().to_string();
    config.server.domain = "https://blog.example.com".to_string();
    config.log.access = false;

    (config, db_file, upload_dir)
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let (mut config, db_file, upload_dir) = test_config();
    customize(&mut config);

    let mail = Arc::new(RecordingMailSender::default());
    let shared = Arc::new(
        SharedState::with_mail_sender(config, mail.clone())
            .await
            .expect("Failed to create shared state"),
    );

    let (admin, password) = shared
        .users
        .bootstrap_admin()
        .await
        .expect("bootstrap failed")
        .expect("fresh database must bootstrap an admin");

    let app = quillpress::api::router(quillpress::api::AppState::new(shared.clone(), None));

    TestApp {
        app,
        shared,
        mail,
        admin,
        admin_password: password.as_str().to_string(),
        db_file,
        upload_dir,
    }
}

impl TestApp {
    /// Sends a request and decodes the JSON body (`Value::Null` when empty).
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, cookie, body).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Logs in and returns the raw `Set-Cookie` header.
    pub async fn login_raw(&self, username: &str, password: &str) -> (StatusCode, Option<String>) {
        let response = self
            .send(
                "POST",
                "/api/login",
                None,
                Some(serde_json::json!({ "login": username, "password": password })),
            )
            .await;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        (response.status(), cookie)
    }

    /// Logs in and returns the `name=value` pair to send back.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, cookie) = self.login_raw(username, password).await;
        assert_eq!(status, StatusCode::OK, "login as {username} failed");
        cookie_pair(&cookie.expect("login must set a cookie"))
    }

    pub async fn login_admin(&self) -> String {
        let password = self.admin_password.clone();
        self.login("admin", &password).await
    }

    /// Waits for the mail consumer to deliver `count` messages.
    pub async fn wait_for_mail(&self, count: usize) -> Vec<Mail> {
        for _ in 0..100 {
            let sent = self.mail.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.mail.sent()
    }
}

pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
