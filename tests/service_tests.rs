mod common;

use axum::http::StatusCode;
use chrono::{Datelike, Duration as ChronoDuration, Utc};
use zeroize::Zeroizing;

use common::{TestApp, spawn_app};
use quillpress::crypto::random_hash;
use quillpress::db::{InviteFields, NewToken};
use quillpress::domain::{
    AdminCriteria, CategoryFilter, Direction, LoginMethod, PublishedCriteria, Section, TokenType,
};
use quillpress::services::token_service::PASSWORD_RESET_TTL;
use quillpress::services::{ArticleInput, ServiceError, SiteInput, UserInput};

fn article(headline: &str) -> ArticleInput {
    ArticleInput {
        headline: headline.to_string(),
        teaser: "teaser".to_string(),
        content: "content".to_string(),
        ..ArticleInput::default()
    }
}

fn site(title: &str) -> SiteInput {
    SiteInput {
        title: title.to_string(),
        link: title.to_string(),
        section: Section::Navigation,
        content: String::new(),
        published: true,
    }
}

fn account(username: &str, password: Option<&str>) -> UserInput {
    UserInput {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        display_name: username.to_string(),
        password: password.map(|p| Zeroizing::new(p.to_string())),
        is_admin: false,
        active: true,
    }
}

async fn order_no(app: &TestApp, id: i32) -> i32 {
    app.shared
        .sites
        .get(Some(&app.admin), id, PublishedCriteria::All)
        .await
        .unwrap()
        .order_no
}

#[tokio::test]
async fn test_article_slug_collision() {
    let app = spawn_app().await;
    let articles = &app.shared.articles;

    let first = articles
        .create(&app.admin, article("a sample headline"))
        .await
        .unwrap();
    let second = articles
        .create(&app.admin, article("a sample headline"))
        .await
        .unwrap();
    let third = articles
        .create(&app.admin, article("a sample headline"))
        .await
        .unwrap();

    let now = Utc::now();
    let prefix = format!("{}/{}", now.year(), now.month());
    assert_eq!(first.slug, format!("{prefix}/a-sample-headline"));
    assert_eq!(second.slug, format!("{prefix}/a-sample-headline1"));
    assert_eq!(third.slug, format!("{prefix}/a-sample-headline2"));
}

#[tokio::test]
async fn test_article_validation() {
    let app = spawn_app().await;
    let articles = &app.shared.articles;

    let err = articles
        .create(&app.admin, article("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValueRequired { field: "headline" }));

    let err = articles
        .create(&app.admin, article(&"h".repeat(151)))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValueTooLong { .. }));
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_last_admin_protection() {
    let app = spawn_app().await;
    let users = &app.shared.users;
    assert!(users.one_admin().await.unwrap());

    let demoted = UserInput {
        username: "admin".to_string(),
        email: "admin@localhost".to_string(),
        display_name: "Administrator".to_string(),
        password: None,
        is_admin: false,
        active: true,
    };

    let err = users
        .update(&app.admin, app.admin.id, demoted, false)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        err.to_string(),
        "Could not update the user, no administrator would remain"
    );

    let err = users.remove(&app.admin, app.admin.id).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        err.to_string(),
        "Could not remove the user, no administrator would remain"
    );

    assert_eq!(users.count(AdminCriteria::OnlyAdmins).await.unwrap(), 1);
}

#[tokio::test]
async fn test_password_reset_token_expiry() {
    let app = spawn_app().await;
    let repo = app.shared.store.tokens();

    let fresh = repo
        .create(NewToken {
            hash: random_hash(),
            token_type: TokenType::PasswordReset,
            user_id: app.admin.id,
            requested_at: Utc::now() - ChronoDuration::minutes(59),
        })
        .await
        .unwrap();

    let token = app
        .shared
        .tokens
        .get(&fresh.hash, TokenType::PasswordReset, PASSWORD_RESET_TTL)
        .await
        .unwrap();
    assert_eq!(token.user_id, app.admin.id);

    let stale = repo
        .create(NewToken {
            hash: random_hash(),
            token_type: TokenType::PasswordReset,
            user_id: app.admin.id,
            requested_at: Utc::now() - ChronoDuration::minutes(61),
        })
        .await
        .unwrap();

    let err = app
        .shared
        .tokens
        .get(&stale.hash, TokenType::PasswordReset, PASSWORD_RESET_TTL)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
    assert!(err.to_string().contains("already expired"));

    assert!(
        repo.get(&stale.hash, TokenType::PasswordReset)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let app = spawn_app().await;
    let users = &app.shared.users;

    users.forgot_password("nobody").await.unwrap();
    users.forgot_password("admin").await.unwrap();

    let mails = app.wait_for_mail(1).await;
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].to, "admin@localhost");

    let marker = "https://blog.example.com/reset-password/";
    let start = mails[0].body.find(marker).unwrap() + marker.len();
    let hash: String = mails[0].body[start..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect();
    assert_eq!(hash.len(), 128);

    let err = users
        .reset_password(&hash, Zeroizing::new("short".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let user = users
        .reset_password(&hash, Zeroizing::new("brand-new-password".to_string()))
        .await
        .unwrap();
    assert_eq!(user.id, app.admin.id);

    users
        .authenticate(LoginMethod::Username, "admin", "brand-new-password")
        .await
        .unwrap();
    assert!(matches!(
        users
            .authenticate(LoginMethod::Username, "admin", &app.admin_password)
            .await,
        Err(ServiceError::Unauthorized)
    ));

    let err = users
        .reset_password(&hash, Zeroizing::new("another-password".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    let mails = app.wait_for_mail(2).await;
    assert_eq!(mails.len(), 2);
}

#[tokio::test]
async fn test_duplicates_span_users_and_invites() {
    let app = spawn_app().await;

    app.shared
        .invites
        .create(
            &app.admin,
            InviteFields {
                username: "bart".to_string(),
                email: "bart@example.com".to_string(),
                display_name: "Bart Simpson".to_string(),
                is_admin: false,
            },
        )
        .await
        .unwrap();

    let err = app
        .shared
        .users
        .create(&app.admin, account("bart", Some("eat-my-shorts!")))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "The mail address 'bart@example.com' is already in use");

    let mut input = account("bart", Some("eat-my-shorts!"));
    input.email = "el-barto@example.com".to_string();
    let err = app
        .shared
        .users
        .create(&app.admin, input)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "The username 'bart' is already taken");

    let err = app
        .shared
        .users
        .create(&app.admin, account("maggie", Some("short")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("at least 12 characters"));
}

#[tokio::test]
async fn test_site_reorder_and_delete() {
    let app = spawn_app().await;
    let sites = &app.shared.sites;

    let a = sites.create(&app.admin, site("A")).await.unwrap();
    let b = sites.create(&app.admin, site("B")).await.unwrap();
    let c = sites.create(&app.admin, site("C")).await.unwrap();
    assert_eq!((a.order_no, b.order_no, c.order_no), (1, 2, 3));

    sites.order(&app.admin, c.id, Direction::Up).await.unwrap();

    assert_eq!(order_no(&app, a.id).await, 1);
    assert_eq!(order_no(&app, c.id).await, 2);
    assert_eq!(order_no(&app, b.id).await, 3);

    // No-ops at either end.
    sites.order(&app.admin, a.id, Direction::Up).await.unwrap();
    sites.order(&app.admin, b.id, Direction::Down).await.unwrap();
    assert_eq!(order_no(&app, a.id).await, 1);
    assert_eq!(order_no(&app, b.id).await, 3);

    sites.delete(&app.admin, a.id).await.unwrap();
    assert_eq!(order_no(&app, c.id).await, 1);
    assert_eq!(order_no(&app, b.id).await, 2);
    assert_eq!(sites.max().await.unwrap(), 2);
}

#[tokio::test]
async fn test_duplicate_site_link_rejected() {
    let app = spawn_app().await;
    let sites = &app.shared.sites;

    sites.create(&app.admin, site("About")).await.unwrap();
    let err = sites.create(&app.admin, site("about")).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let mut external = site("Mastodon");
    external.link = "https://social.example.com/@blog".to_string();
    let created = sites.create(&app.admin, external).await.unwrap();
    assert_eq!(created.link, "https://social.example.com/@blog");
}

#[tokio::test]
async fn test_category_filters() {
    let app = spawn_app().await;
    let categories = &app.shared.categories;

    let news = categories.create(&app.admin, "Breaking News").await.unwrap();
    assert_eq!(news.slug, "breaking-news");
    let empty = categories.create(&app.admin, "Empty").await.unwrap();

    let mut input = article("In the news");
    input.category_id = Some(news.id);
    let draft = app.shared.articles.create(&app.admin, input).await.unwrap();

    let published = categories
        .list(CategoryFilter::WithPublishedArticles)
        .await
        .unwrap();
    assert!(published.is_empty());

    let without = categories
        .list(CategoryFilter::WithoutArticles)
        .await
        .unwrap();
    assert_eq!(without.len(), 1);
    assert_eq!(without[0].id, empty.id);

    app.shared
        .articles
        .publish(&app.admin, draft.id)
        .await
        .unwrap();
    let published = categories
        .list(CategoryFilter::WithPublishedArticles)
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].id, news.id);

    categories.delete(&app.admin, news.id).await.unwrap();
    let orphan = app
        .shared
        .articles
        .get(Some(&app.admin), draft.id, PublishedCriteria::All)
        .await
        .unwrap();
    assert!(orphan.category.is_none());
}

#[tokio::test]
async fn test_remove_user_cascades_and_keeps_site_order() {
    let app = spawn_app().await;

    let carl = app
        .shared
        .users
        .create(&app.admin, account("carl", Some("nuclear-plant-7g")))
        .await
        .unwrap();

    let first = app.shared.sites.create(&app.admin, site("First")).await.unwrap();
    app.shared.sites.create(&carl, site("Carls")).await.unwrap();
    let last = app.shared.sites.create(&app.admin, site("Last")).await.unwrap();
    let article = app
        .shared
        .articles
        .create(&carl, article("Carl writes"))
        .await
        .unwrap();

    let removed = app.shared.users.remove(&app.admin, carl.id).await.unwrap();
    assert_eq!(removed.id, carl.id);

    let err = app
        .shared
        .articles
        .get(Some(&app.admin), article.id, PublishedCriteria::All)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    let first = app
        .shared
        .sites
        .get(Some(&app.admin), first.id, PublishedCriteria::All)
        .await
        .unwrap();
    let last = app
        .shared
        .sites
        .get(Some(&app.admin), last.id, PublishedCriteria::All)
        .await
        .unwrap();
    assert_eq!((first.order_no, last.order_no), (1, 2));
}

#[tokio::test]
async fn test_sessions_revoked_per_user() {
    let app = spawn_app().await;
    let sessions = &app.shared.sessions;

    let keep = sessions.create(app.admin.id).await;
    let other = sessions.create(app.admin.id).await;

    assert_eq!(sessions.revoke_other_sessions(app.admin.id, &keep.id).await, 1);
    assert!(sessions.get(&keep.id).await.is_some());
    assert!(sessions.get(&other.id).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_demotions_keep_one_admin() {
    let app = spawn_app().await;
    let users = &app.shared.users;

    let mut input = account("marge", Some("blue-hair-forever"));
    input.is_admin = true;
    let marge = users.create(&app.admin, input).await.unwrap();
    assert_eq!(users.count(AdminCriteria::OnlyAdmins).await.unwrap(), 2);

    let demote = |user: &quillpress::db::User| UserInput {
        username: user.username.clone(),
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        password: None,
        is_admin: false,
        active: true,
    };

    let (first, second) = tokio::join!(
        users.update(&app.admin, app.admin.id, demote(&app.admin), false),
        users.update(&app.admin, marge.id, demote(&marge), false),
    );

    let failures: Vec<ServiceError> = [first, second].into_iter().filter_map(Result::err).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        failures[0].to_string(),
        "Could not update the user, no administrator would remain"
    );
    assert_eq!(users.count(AdminCriteria::OnlyAdmins).await.unwrap(), 1);
}

#[tokio::test]
async fn test_last_admin_cannot_be_deactivated() {
    let app = spawn_app().await;

    let deactivated = UserInput {
        username: "admin".to_string(),
        email: "admin@localhost".to_string(),
        display_name: "Administrator".to_string(),
        password: None,
        is_admin: true,
        active: false,
    };

    let err = app
        .shared
        .users
        .update(&app.admin, app.admin.id, deactivated, false)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        err.to_string(),
        "Could not update the user, no administrator would remain"
    );

    let admin = app.shared.users.get(app.admin.id).await.unwrap();
    assert!(admin.active);
}

#[tokio::test]
async fn test_article_slug_attempts_are_bounded() {
    let app = spawn_app().await;
    let articles = &app.shared.articles;

    for _ in 0..10 {
        articles.create(&app.admin, article("same")).await.unwrap();
    }

    let err = articles
        .create(&app.admin, article("same"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err.to_string().starts_with("Could not assign a slug"));
}

#[tokio::test]
async fn test_category_slugs_get_suffixes() {
    let app = spawn_app().await;
    let categories = &app.shared.categories;

    // Distinct names that all reduce to the slug "news".
    let names: Vec<String> = (0..11).map(|i| format!("news{}", "-".repeat(i))).collect();

    let first = categories.create(&app.admin, &names[0]).await.unwrap();
    let second = categories.create(&app.admin, &names[1]).await.unwrap();
    assert_eq!(first.slug, "news");
    assert_eq!(second.slug, "news1");

    for name in &names[2..10] {
        categories.create(&app.admin, name).await.unwrap();
    }

    let err = categories
        .create(&app.admin, &names[10])
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err.to_string().starts_with("Could not assign a slug"));
}

#[tokio::test]
async fn test_reset_token_rate_limit_threshold() {
    let app = spawn_app().await;
    let repo = app.shared.store.tokens();
    let tokens = &app.shared.tokens;

    let request = |minutes_ago: i64| NewToken {
        hash: random_hash(),
        token_type: TokenType::PasswordReset,
        user_id: app.admin.id,
        requested_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
    };

    repo.create(request(20)).await.unwrap();
    repo.create(request(20)).await.unwrap();
    for _ in 0..3 {
        repo.create(request(1)).await.unwrap();
    }
    assert!(
        !tokens
            .rate_limit(app.admin.id, TokenType::PasswordReset)
            .await
            .unwrap()
    );

    repo.create(request(1)).await.unwrap();
    assert!(
        tokens
            .rate_limit(app.admin.id, TokenType::PasswordReset)
            .await
            .unwrap()
    );

    // Over the limit the request is still served.
    app.shared.users.forgot_password("admin").await.unwrap();
    assert_eq!(app.wait_for_mail(1).await.len(), 1);
}

#[tokio::test]
async fn test_corrupt_site_section_is_an_error() {
    use quillpress::entities::sites;
    use sea_orm::{ActiveModelTrait, Set};

    let app = spawn_app().await;

    let row = sites::ActiveModel {
        title: Set("Broken".to_string()),
        link: Set("broken".to_string()),
        section: Set("sidebar".to_string()),
        content: Set(String::new()),
        published: Set(true),
        published_on: Set(Some(Utc::now())),
        order_no: Set(1),
        last_modified: Set(Utc::now()),
        author_id: Set(app.admin.id.value()),
        ..Default::default()
    }
    .insert(&app.shared.store.conn)
    .await
    .unwrap();

    let err = app
        .shared
        .sites
        .get(Some(&app.admin), row.id, PublishedCriteria::All)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
