mod common;

use axum::http::{StatusCode, header};
use http_body_util::BodyExt;
use serde_json::json;

use common::{cookie_pair, spawn_app};

#[tokio::test]
async fn test_admin_routes_require_session() {
    let app = spawn_app().await;

    let (status, body) = app.call("GET", "/api/admin/articles", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let (status, _) = app
        .call(
            "GET",
            "/api/me",
            Some("quillpress-session=not-a-session"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = app.login_admin().await;
    let (status, body) = app.call("GET", "/api/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], json!("admin"));
    assert_eq!(body["data"]["is_admin"], json!(true));
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let app = spawn_app().await;

    let (status, cookie) = app.login_raw("admin", "definitely-wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());

    let (status, _) = app.login_raw("nobody", "definitely-wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invite_activate_and_login() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/user-invites",
            Some(&admin),
            Some(json!({
                "displayname": "Homer Simpson",
                "email": "homer@example.com",
                "username": "homer",
                "admin": false
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let hash = body["data"]["hash"].as_str().unwrap().to_string();
    assert_eq!(hash.len(), 128);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));

    let mails = app.wait_for_mail(1).await;
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "homer@example.com");
    assert!(
        mails[0]
            .body
            .contains(&format!("https://blog.example.com/activate-account/{hash}"))
    );

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/activate-account/{hash}"),
            None,
            Some(json!({ "password": "1234567890123", "password_repeat": "1234567890123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["username"], json!("homer"));
    assert_eq!(body["data"]["is_admin"], json!(false));

    let (status, set_cookie) = app.login_raw("homer", "1234567890123").await;
    assert_eq!(status, StatusCode::OK);
    let set_cookie = set_cookie.unwrap();
    assert!(set_cookie.starts_with("quillpress-session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Secure"));

    // The invite is consumed.
    let (status, _) = app
        .call(
            "POST",
            &format!("/api/activate-account/{hash}"),
            None,
            Some(json!({ "password": "1234567890123", "password_repeat": "1234567890123" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_activation_rejects_mismatched_passwords() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;

    let (_, body) = app
        .call(
            "POST",
            "/api/admin/user-invites",
            Some(&admin),
            Some(json!({
                "display_name": "Marge Simpson",
                "email": "marge@example.com",
                "username": "marge"
            })),
        )
        .await;
    let hash = body["data"]["hash"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/activate-account/{hash}"),
            None,
            Some(json!({ "password": "1234567890123", "password_repeat": "1234567890124" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], json!("The passwords do not match"));
}

#[tokio::test]
async fn test_unpublished_article_hidden_from_guests() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/articles",
            Some(&admin),
            Some(json!({
                "headline": "Hello world",
                "teaser": "First post",
                "content": "Body text"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["published"], json!(false));

    let uri = format!("/api/article/by-id/{id}");
    let (status, _) = app.call("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/admin/articles/{id}/publish"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["published"], json!(true));
    assert!(body["data"]["published_on"].is_string());

    let (status, body) = app.call("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["headline"], json!("Hello world"));
    assert_eq!(body["data"]["author"]["username"], json!("admin"));

    let slug = body["data"]["slug"].as_str().unwrap().to_string();
    let (status, _) = app
        .call("GET", &format!("/api/article/{slug}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            "DELETE",
            &format!("/api/admin/articles/{id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_feed_and_index() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;

    for headline in ["Draft & notes", "Published <post>"] {
        let published = headline.starts_with("Published");
        let (status, _) = app
            .call(
                "POST",
                "/api/admin/articles",
                Some(&admin),
                Some(json!({
                    "headline": headline,
                    "teaser": "Teaser",
                    "published": published
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app.send("GET", "/api/feed", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/rss+xml; charset=utf-8"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let xml = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(xml.contains("<rss version=\"2.0\""));
    assert!(xml.contains("Published &lt;post&gt;"));
    assert!(!xml.contains("Draft"));
    assert!(xml.contains("https://blog.example.com/"));

    let (status, body) = app.call("GET", "/api/index", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let years = body["data"].as_array().unwrap();
    assert_eq!(years.len(), 1);
    assert_eq!(years[0]["articles"].as_array().unwrap().len(), 1);

    let (status, body) = app.call("GET", "/api/articles?page=1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["total_pages"], json!(1));
}

#[tokio::test]
async fn test_non_admin_cannot_touch_foreign_articles() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;

    let (status, body) = app
        .call(
            "POST",
            "/api/admin/users",
            Some(&admin),
            Some(json!({
                "username": "lisa",
                "email": "lisa@example.com",
                "display_name": "Lisa Simpson",
                "password": "saxophone-solo",
                "password_repeat": "saxophone-solo"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, body) = app
        .call(
            "POST",
            "/api/admin/articles",
            Some(&admin),
            Some(json!({ "headline": "Admin only", "teaser": "t" })),
        )
        .await;
    let id = body["data"]["id"].as_i64().unwrap();

    let lisa = app.login("lisa", "saxophone-solo").await;

    let (status, _) = app
        .call(
            "GET",
            &format!("/api/admin/articles/{id}"),
            Some(&lisa),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/admin/articles/{id}/publish"),
            Some(&lisa),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("GET", "/api/admin/articles", Some(&lisa), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(0));

    let (status, _) = app.call("GET", "/api/admin/users", Some(&lisa), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_profile_password_change_revokes_other_sessions() {
    let app = spawn_app().await;
    let password = app.admin_password.clone();

    let first = app.login("admin", &password).await;
    let second = app.login("admin", &password).await;

    let response = app
        .send(
            "PUT",
            "/api/admin/profile",
            Some(&first),
            Some(json!({
                "username": "admin",
                "email": "admin@localhost",
                "display_name": "Administrator",
                "password": "a-much-better-password",
                "password_repeat": "a-much-better-password"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let renewed = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(cookie_pair)
        .expect("password change must renew the session cookie");
    assert_ne!(renewed, first);

    let (status, _) = app.call("GET", "/api/me", Some(&renewed), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("GET", "/api/me", Some(&first), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call("GET", "/api/me", Some(&second), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.login_raw("admin", "a-much-better-password").await;
    assert_eq!(status, StatusCode::OK);

    let mails = app.wait_for_mail(1).await;
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "admin@localhost");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = spawn_app().await;
    let cookie = app.login_admin().await;

    let (status, _) = app.call("POST", "/api/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("GET", "/api/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sites_navigation_and_reorder() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;

    let mut ids = Vec::new();
    for title in ["About", "Contact", "Imprint"] {
        let (status, body) = app
            .call(
                "POST",
                "/api/admin/sites",
                Some(&admin),
                Some(json!({
                    "title": title,
                    "link": title,
                    "section": "navigation",
                    "content": format!("{title} page"),
                    "published": true
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        ids.push(body["data"]["id"].as_i64().unwrap());
    }

    let (status, body) = app
        .call(
            "POST",
            &format!("/api/admin/sites/{}/order/up", ids[2]),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_no"], json!(2));

    let (status, body) = app.call("GET", "/api/sites/navigation", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["About", "Imprint", "Contact"]);

    let (status, body) = app.call("GET", "/api/site/about", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], json!("About page"));

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/admin/sites/{}/order/sideways", ids[0]),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app.call("GET", "/api/sites/sidebar", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_and_serve_file() {
    let app = spawn_app().await;
    let admin = app.login_admin().await;

    let boundary = "quillpress-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         hello file\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"inline\"\r\n\r\n\
         false\r\n\
         --{boundary}--\r\n"
    );

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/admin/files")
        .header(header::COOKIE, &admin)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(axum::body::Body::from(body))
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.app.clone(), request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(json["data"]["filename"], json!("notes.txt"));
    assert_eq!(json["data"]["size"], json!(10));
    let unique_name = json["data"]["unique_name"].as_str().unwrap().to_string();
    assert_ne!(unique_name, "notes.txt");

    let response = app
        .send("GET", &format!("/file/{unique_name}"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"notes.txt\""
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"hello file");

    let (status, body) = app
        .call("GET", "/api/admin/files", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], json!(1));

    let id = json["data"]["id"].as_i64().unwrap();
    let (status, _) = app
        .call(
            "DELETE",
            &format!("/api/admin/files/{id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call("GET", &format!("/file/{unique_name}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;

    let (status, body) = app.call("GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ready"], json!(true));
    assert_eq!(body["data"]["checks"]["database"], json!(true));
}
