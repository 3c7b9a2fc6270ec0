//! End-to-end tests for the access-control middleware
//!
//! These drive the full router (sessions, chain, realm, static site) with
//! `oneshot` requests and carry the session cookie by hand.

#[cfg(test)]
mod tests {
    use crate::{create_router, AppState, PageConfig};
    use authz::FilterChain;
    use authz_cache::MemoryCache;
    use axum::{
        body::Body,
        http::{header, Method, Request, Response, StatusCode},
        Router,
    };
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;
    use user::{
        HashAlgorithm, MatcherConfig, SessionConfig, SessionStoreKind, UserDatabaseConfig,
        UserManager,
    };

    const CHAIN: &[(&str, &str)] = &[
        ("/index.jsp", "anon"),
        ("/logout", "logout"),
        ("/users/login", "anon"),
        ("/error.jsp", "anon"),
        ("/health", "anon"),
        ("/cars.jsp", "roles[guest]"),
        ("/users.jsp", "roles[admin]"),
        ("/reports/**", "perms[report:read]"),
        ("/admin/**", "roles[admin]"),
        ("/**", "authc"),
    ];

    struct Gate {
        _dir: TempDir,
        app: Router,
        users: Arc<UserManager>,
    }

    async fn gate() -> Gate {
        let dir = TempDir::new().unwrap();
        let site = dir.path().join("site");
        std::fs::create_dir_all(site.join("reports")).unwrap();
        for (file, body) in [
            ("index.jsp", "login page"),
            ("index.html", "home"),
            ("cars.jsp", "car listing"),
            ("users.jsp", "user listing"),
            ("noRen.jsp", "not allowed"),
            ("error.jsp", "something broke"),
            ("reports/q3.html", "q3 report"),
        ] {
            std::fs::write(site.join(file), body).unwrap();
        }

        let session_config = SessionConfig {
            store: SessionStoreKind::Memory,
            ..SessionConfig::default()
        };
        let users = Arc::new(
            UserManager::new(
                UserDatabaseConfig {
                    database_path: dir.path().join("gate.db"),
                    ..UserDatabaseConfig::default()
                },
                session_config.clone(),
                &MatcherConfig {
                    algorithm: HashAlgorithm::Sha256,
                    iterations: Some(1),
                },
                Arc::new(MemoryCache::new()),
            )
            .await
            .unwrap(),
        );

        let admin = users.admin();
        admin.create_user("alice", "secret").await.unwrap();
        admin.grant_role("alice", "guest").await.unwrap();
        admin.create_user("root", "toor").await.unwrap();
        admin.grant_role("root", "admin").await.unwrap();

        let chain = FilterChain::from_definitions(CHAIN.iter().copied()).unwrap();
        let state = AppState::new(chain, users.clone(), PageConfig::default());
        let app = create_router(
            state,
            session_config.layer(MemoryStore::default()),
            Some(site),
        );

        Gate {
            _dir: dir,
            app,
            users,
        }
    }

    /// Minimal cookie jar holding the one session cookie
    #[derive(Default)]
    struct Client {
        cookie: Option<String>,
    }

    impl Client {
        async fn send(&mut self, app: &Router, mut request: Request<Body>) -> Response<Body> {
            if let Some(cookie) = &self.cookie {
                request
                    .headers_mut()
                    .insert(header::COOKIE, cookie.parse().unwrap());
            }
            let response = app.clone().oneshot(request).await.unwrap();
            if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
                let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
                self.cookie = Some(pair.to_string());
            }
            response
        }

        async fn get(&mut self, app: &Router, path: &str) -> Response<Body> {
            self.send(app, Request::get(path).body(Body::empty()).unwrap())
                .await
        }

        async fn login(&mut self, app: &Router, username: &str, password: &str) -> Response<Body> {
            let request = Request::post("/users/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!(
                    "username={}&password={}",
                    username, password
                )))
                .unwrap();
            self.send(app, request).await
        }

        async fn call(&mut self, app: &Router, method: Method, path: &str) -> Response<Body> {
            let request = Request::builder()
                .method(method)
                .uri(path)
                .body(Body::empty())
                .unwrap();
            self.send(app, request).await
        }
    }

    fn location(response: &Response<Body>) -> &str {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_anonymous_pages_pass_through() {
        let gate = gate().await;
        let mut client = Client::default();

        let response = client.get(&gate.app, "/index.jsp").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "login page");
    }

    #[tokio::test]
    async fn test_login_returns_to_saved_request() {
        let gate = gate().await;
        let mut client = Client::default();

        let response = client.get(&gate.app, "/cars.jsp").await;
        assert_eq!(location(&response), "/index.jsp");
        let anonymous_cookie = client.cookie.clone();
        assert!(anonymous_cookie.is_some());

        let response = client.login(&gate.app, "alice", "secret").await;
        assert_eq!(location(&response), "/cars.jsp");
        assert_ne!(client.cookie, anonymous_cookie, "session id must change on login");

        let response = client.get(&gate.app, "/cars.jsp").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "car listing");
    }

    #[tokio::test]
    async fn test_login_without_saved_request_lands_on_success_page() {
        let gate = gate().await;
        let mut client = Client::default();

        let response = client.login(&gate.app, "alice", "secret").await;
        assert_eq!(location(&response), "/");

        let response = client.get(&gate.app, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "home");
    }

    #[tokio::test]
    async fn test_failed_logins_look_identical() {
        let gate = gate().await;

        let mut wrong_password = Client::default();
        let response = wrong_password.login(&gate.app, "alice", "nope").await;
        assert_eq!(location(&response), "/index.jsp?error");

        let mut unknown_user = Client::default();
        let response = unknown_user.login(&gate.app, "mallory", "secret").await;
        assert_eq!(location(&response), "/index.jsp?error");

        let response = wrong_password.get(&gate.app, "/cars.jsp").await;
        assert_eq!(location(&response), "/index.jsp");
    }

    #[tokio::test]
    async fn test_missing_role_redirects_to_unauthorized_page() {
        let gate = gate().await;
        let mut client = Client::default();
        client.login(&gate.app, "alice", "secret").await;

        let response = client.get(&gate.app, "/users.jsp").await;
        assert_eq!(location(&response), "/noRen.jsp");

        let response = client
            .call(&gate.app, Method::POST, "/admin/users/alice/roles/admin")
            .await;
        assert_eq!(location(&response), "/noRen.jsp");
    }

    #[tokio::test]
    async fn test_encoded_paths_meet_the_decoded_rule() {
        let gate = gate().await;

        let mut anonymous = Client::default();
        let response = anonymous.get(&gate.app, "/users%2Ejsp").await;
        assert_eq!(location(&response), "/index.jsp");

        let mut alice = Client::default();
        alice.login(&gate.app, "alice", "secret").await;
        for path in ["/users%2Ejsp", "/%75sers.jsp", "/cars.jsp/..%2Fusers.jsp"] {
            let response = alice.get(&gate.app, path).await;
            assert_eq!(location(&response), "/noRen.jsp", "{}", path);
        }

        let mut root = Client::default();
        root.login(&gate.app, "root", "toor").await;
        let response = root.get(&gate.app, "/users%2Ejsp").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "user listing");
    }

    #[tokio::test]
    async fn test_saved_request_never_leaves_the_site() {
        let gate = gate().await;
        let mut client = Client::default();

        let response = client.get(&gate.app, "//evil.example/phish").await;
        assert_eq!(location(&response), "/index.jsp");

        let response = client.login(&gate.app, "alice", "secret").await;
        assert_eq!(location(&response), "/evil.example/phish");
    }

    #[tokio::test]
    async fn test_logout_destroys_session() {
        let gate = gate().await;
        let mut client = Client::default();
        client.login(&gate.app, "alice", "secret").await;
        let logged_in_cookie = client.cookie.clone();

        let response = client.get(&gate.app, "/logout").await;
        assert_eq!(location(&response), "/index.jsp");

        // replaying the old cookie must not authenticate
        let mut replay = Client {
            cookie: logged_in_cookie,
        };
        let response = replay.get(&gate.app, "/cars.jsp").await;
        assert_eq!(location(&response), "/index.jsp");
    }

    #[tokio::test]
    async fn test_admin_grant_takes_effect_immediately() {
        let gate = gate().await;

        let mut alice = Client::default();
        alice.login(&gate.app, "alice", "secret").await;
        let response = alice.get(&gate.app, "/users.jsp").await;
        assert_eq!(location(&response), "/noRen.jsp");

        let mut root = Client::default();
        root.login(&gate.app, "root", "toor").await;
        let response = root
            .call(&gate.app, Method::POST, "/admin/users/alice/roles/admin")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["changed"], true);
        assert_eq!(body["invalidated"][0], "alice");

        let response = alice.get(&gate.app, "/users.jsp").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = root
            .call(&gate.app, Method::DELETE, "/admin/users/alice/roles/admin")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = alice.get(&gate.app, "/users.jsp").await;
        assert_eq!(location(&response), "/noRen.jsp");
    }

    #[tokio::test]
    async fn test_permission_rule_with_wildcard_grant() {
        let gate = gate().await;

        let mut alice = Client::default();
        alice.login(&gate.app, "alice", "secret").await;
        let response = alice.get(&gate.app, "/reports/q3.html").await;
        assert_eq!(location(&response), "/noRen.jsp");

        let mut root = Client::default();
        root.login(&gate.app, "root", "toor").await;
        let response = root
            .call(&gate.app, Method::POST, "/admin/roles/guest/permissions/report:*")
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = alice.get(&gate.app, "/reports/q3.html").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "q3 report");
    }

    #[tokio::test]
    async fn test_admin_errors_are_json() {
        let gate = gate().await;
        let mut root = Client::default();
        root.login(&gate.app, "root", "toor").await;

        let response = root
            .call(&gate.app, Method::POST, "/admin/users/ghost/roles/guest")
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let gate = gate().await;
        let mut client = Client::default();
        client.login(&gate.app, "alice", "secret").await;

        gate.users.database().get_pool().close().await;

        let response = client.get(&gate.app, "/cars.jsp").await;
        assert_eq!(location(&response), "/error.jsp");

        let mut newcomer = Client::default();
        let response = newcomer.login(&gate.app, "alice", "secret").await;
        assert_eq!(location(&response), "/error.jsp");
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let gate = gate().await;
        let mut client = Client::default();

        let response = client.get(&gate.app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"]["connected"], true);
        assert_eq!(body["cache"]["stats"]["backend"], "memory");
    }
}
