use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use propdesk_api::app::{self, AppServices};
use propdesk_auth::{PasswordError, PasswordHasher, TokenCodec, TokenSettings};
use propdesk_infra::Stores;

const JWT_SECRET: &str = "black-box-secret-black-box-secret-0001";

/// Argon2 is slow in debug builds; the HTTP behavior does not depend on it.
struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        Ok(format!("plain${plaintext}"))
    }

    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
        Ok(digest.strip_prefix("plain$") == Some(plaintext))
    }
}

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let codec = Arc::new(TokenCodec::new(JWT_SECRET.as_bytes(), TokenSettings::default()).unwrap());
        let services = AppServices::new(Stores::in_memory(), codec, Arc::new(PlainHasher));
        Self::spawn_with(services).await
    }

    async fn spawn_with(services: AppServices) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        req.send().await.unwrap()
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        req.send().await.unwrap()
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// Sign up a tenant and return its unscoped access and refresh tokens.
    async fn signup(&self, name: &str, slug: &str, email: &str) -> (String, String) {
        let res = self
            .post(
                "/api/auth/signup-tenant",
                None,
                json!({
                    "tenantName": name,
                    "tenantSlug": slug,
                    "adminName": "Admin",
                    "adminEmail": email,
                    "adminPassword": "correct horse",
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        (
            body["accessToken"].as_str().unwrap().to_string(),
            body["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    async fn first_company(&self, token: &str) -> String {
        let body: Value = self.get("/api/companies/mine", Some(token)).await.json().await.unwrap();
        body["items"][0]["companyId"].as_str().unwrap().to_string()
    }

    async fn select(&self, token: &str, company_id: &str) -> String {
        let res = self
            .post("/api/companies/select", Some(token), json!({ "companyId": company_id }))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["accessToken"].as_str().unwrap().to_string()
    }

    /// Sign up and select the bootstrapped company.
    async fn scoped_admin(&self, name: &str, slug: &str) -> (String, String) {
        let (token, _) = self.signup(name, slug, &format!("admin@{slug}.test")).await;
        let company_id = self.first_company(&token).await;
        (self.select(&token, &company_id).await, company_id)
    }

    async fn create_location(&self, token: &str, name: &str, parent: Option<&str>) -> Value {
        let res = self
            .post(
                "/api/locations",
                Some(token),
                json!({ "name": name, "type": "BUILDING", "parentId": parent }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint(claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_and_ping_are_public() {
    let srv = TestServer::spawn().await;
    assert_eq!(srv.get("/health", None).await.status(), StatusCode::OK);
    let ping = srv.get("/api/ping", None).await;
    assert_eq!(ping.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_requests_get_401_envelope() {
    let srv = TestServer::spawn().await;

    let res = srv.get("/api/me", None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 401);
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["path"], "/api/me");
    assert!(body["timestamp"].is_string());

    let res = srv.get("/api/locations", Some("not-a-jwt")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["path"], "/api/locations");
}

#[tokio::test]
async fn unrouted_requests_get_the_envelope() {
    let srv = TestServer::spawn().await;

    let res = srv.get("/api/nowhere", None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 404);
    assert_eq!(body["path"], "/api/nowhere");

    let res = srv.delete("/health", "not-a-jwt").await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 405);
    assert_eq!(body["error"], "Method Not Allowed");
    assert_eq!(body["path"], "/health");
}

#[tokio::test]
async fn tokens_without_access_claims_are_anonymous() {
    let srv = TestServer::spawn().await;
    let now = Utc::now();

    let no_tenant = mint(json!({
        "sub": uuid::Uuid::now_v7().to_string(),
        "email": "x@test",
        "roles": "OWNER",
        "iat": now.timestamp(),
        "exp": (now + ChronoDuration::minutes(5)).timestamp(),
    }));
    assert_eq!(srv.get("/api/me", Some(&no_tenant)).await.status(), StatusCode::UNAUTHORIZED);

    let (_, refresh) = srv.signup("Acme Inc.", "acme", "ada@acme.test").await;
    assert_eq!(srv.get("/api/me", Some(&refresh)).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_bootstraps_default_company() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.signup("Acme Inc.", "acme", "Ada@Acme.test").await;

    let me: Value = srv.get("/api/me", Some(&token)).await.json().await.unwrap();
    assert_eq!(me["email"], "ada@acme.test");
    assert_eq!(me["roles"], json!(["OWNER", "ADMIN"]));
    assert!(me["companyId"].is_null());

    let mine: Value = srv.get("/api/companies/mine", Some(&token)).await.json().await.unwrap();
    let items = mine["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Acme Inc.");
    assert_eq!(items[0]["slug"], "acme");
    assert_eq!(items[0]["memberActive"], true);
    assert_eq!(items[0]["roles"], json!(["OWNER", "ADMIN"]));

    let dup = srv
        .post(
            "/api/auth/signup-tenant",
            None,
            json!({
                "tenantName": "Other",
                "tenantSlug": "acme",
                "adminName": "Bob",
                "adminEmail": "bob@other.test",
                "adminPassword": "correct horse",
            }),
        )
        .await;
    assert_eq!(dup.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let srv = TestServer::spawn().await;
    srv.signup("Acme Inc.", "acme", "ada@acme.test").await;

    let ok = srv
        .post(
            "/api/auth/login",
            None,
            json!({ "tenantSlug": "acme", "email": "ADA@acme.test", "password": "correct horse" }),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let attempts = [
        json!({ "tenantSlug": "acme", "email": "ada@acme.test", "password": "wrong" }),
        json!({ "tenantSlug": "acme", "email": "nobody@acme.test", "password": "correct horse" }),
        json!({ "tenantSlug": "nope", "email": "ada@acme.test", "password": "correct horse" }),
    ];
    let mut messages = Vec::new();
    for attempt in attempts {
        let res = srv.post("/api/auth/login", None, attempt).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        messages.push(body["message"].as_str().unwrap().to_string());
    }
    assert!(messages.iter().all(|m| m == &messages[0]));
}

#[tokio::test]
async fn refresh_rotates_and_logout_revokes() {
    let srv = TestServer::spawn().await;
    let (_, refresh) = srv.signup("Acme Inc.", "acme", "ada@acme.test").await;

    let res = srv.post("/api/auth/refresh", None, json!({ "refreshToken": refresh })).await;
    assert_eq!(res.status(), StatusCode::OK);
    let pair: Value = res.json().await.unwrap();
    let rotated = pair["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, refresh);

    let replay = srv.post("/api/auth/refresh", None, json!({ "refreshToken": refresh })).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    let logout = srv.post("/api/auth/logout", None, json!({ "refreshToken": rotated })).await;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);
    let after = srv.post("/api/auth/refresh", None, json!({ "refreshToken": rotated })).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn company_selection_gate() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.signup("Acme Inc.", "acme", "ada@acme.test").await;

    let res = srv.get("/api/locations", Some(&token)).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Company selection required");
    assert_eq!(body["path"], "/api/locations");

    // Allowlisted paths still work unscoped.
    assert_eq!(srv.get("/api/me", Some(&token)).await.status(), StatusCode::OK);
    assert_eq!(srv.get("/api/ping", Some(&token)).await.status(), StatusCode::OK);

    let company_id = srv.first_company(&token).await;
    let scoped = srv.select(&token, &company_id).await;

    let me: Value = srv.get("/api/me", Some(&scoped)).await.json().await.unwrap();
    assert_eq!(me["companyId"], company_id.as_str());
    assert_eq!(srv.get("/api/locations", Some(&scoped)).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn location_hierarchy_over_http() {
    let srv = TestServer::spawn().await;
    let (token, _) = srv.scoped_admin("Acme Inc.", "acme").await;

    let p = srv.create_location(&token, "Park", None).await;
    let r = srv.create_location(&token, "Riverside", None).await;
    let p_id = p["id"].as_str().unwrap();
    let r_id = r["id"].as_str().unwrap();
    let c = srv.create_location(&token, "Cellar", Some(r_id)).await;
    let c_id = c["id"].as_str().unwrap();
    assert_eq!(c["path"], format!("/{r_id}/{c_id}"));

    // Reparent R under P: R and its child are rewritten.
    let res = srv
        .put(
            &format!("/api/locations/{r_id}"),
            &token,
            json!({ "name": "Riverside", "type": "BUILDING", "parentId": p_id }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let moved: Value = res.json().await.unwrap();
    assert_eq!(moved["path"], format!("/{p_id}/{r_id}"));

    let child: Value = srv
        .get(&format!("/api/locations/{c_id}"), Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(child["path"], format!("/{p_id}/{r_id}/{c_id}"));

    // Moving P under its own grandchild is refused and changes nothing.
    let cyclic = srv
        .put(
            &format!("/api/locations/{p_id}"),
            &token,
            json!({ "name": "Park", "type": "SITE", "parentId": c_id }),
        )
        .await;
    assert_eq!(cyclic.status(), StatusCode::CONFLICT);
    let park: Value = srv
        .get(&format!("/api/locations/{p_id}"), Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(park["path"], format!("/{p_id}"));
    assert_eq!(park["type"], "BUILDING");

    let tree: Value = srv.get("/api/locations/tree", Some(&token)).await.json().await.unwrap();
    assert_eq!(tree.as_array().unwrap().len(), 1);
    assert_eq!(tree[0]["id"], p_id);
    assert_eq!(tree[0]["children"][0]["id"], r_id);
    assert_eq!(tree[0]["children"][0]["children"][0]["id"], c_id);

    let below: Value = srv
        .get(&format!("/api/locations/{p_id}/descendants"), Some(&token))
        .await
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = below["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![r_id, c_id]);

    let found: Value = srv.get("/api/locations?q=RIVER", Some(&token)).await.json().await.unwrap();
    assert_eq!(found["items"].as_array().unwrap().len(), 1);

    assert_eq!(srv.delete(&format!("/api/locations/{r_id}"), &token).await.status(), StatusCode::CONFLICT);
    assert_eq!(srv.delete(&format!("/api/locations/{c_id}"), &token).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(srv.delete(&format!("/api/locations/{c_id}"), &token).await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn manager_directory_and_location_roles() {
    let srv = TestServer::spawn().await;
    let (admin, company_id) = srv.scoped_admin("Acme Inc.", "acme").await;

    let res = srv
        .post(
            "/api/users",
            Some(&admin),
            json!({
                "email": "max@acme.test",
                "password": "manager pass",
                "fullName": "Max Manager",
                "roles": ["MANAGER"],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let manager: Value = res.json().await.unwrap();

    let res = srv
        .post(
            &format!("/api/companies/{company_id}/members"),
            Some(&admin),
            json!({ "userId": manager["id"], "roles": ["MANAGER"] }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let login: Value = srv
        .post(
            "/api/auth/login",
            None,
            json!({ "tenantSlug": "acme", "email": "max@acme.test", "password": "manager pass" }),
        )
        .await
        .json()
        .await
        .unwrap();
    let unscoped = login["accessToken"].as_str().unwrap();
    let token = srv.select(unscoped, &company_id).await;

    let everyone = srv.get("/api/users?activeOnly=false", Some(&token)).await;
    assert_eq!(everyone.status(), StatusCode::FORBIDDEN);
    let active = srv.get("/api/users?activeOnly=true", Some(&token)).await;
    assert_eq!(active.status(), StatusCode::OK);
    let body: Value = active.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let site = srv.create_location(&token, "Depot", None).await;
    let res = srv.delete(&format!("/api/locations/{}", site["id"].as_str().unwrap()), &token).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 403);
}

#[tokio::test]
async fn tenants_are_isolated() {
    let srv = TestServer::spawn().await;
    let (a_token, a_company) = srv.scoped_admin("Acme Inc.", "acme").await;
    let (b_token, _) = srv.scoped_admin("Bolt Ltd", "bolt").await;

    let a_site = srv.create_location(&a_token, "Acme HQ", None).await;
    let a_site_id = a_site["id"].as_str().unwrap();

    let res = srv.get(&format!("/api/locations/{a_site_id}"), Some(&b_token)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let b_list: Value = srv.get("/api/locations", Some(&b_token)).await.json().await.unwrap();
    assert!(b_list["items"].as_array().unwrap().is_empty());

    let b_users: Value = srv.get("/api/users", Some(&b_token)).await.json().await.unwrap();
    let emails: Vec<&str> = b_users["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails, vec!["admin@bolt.test"]);

    let res = srv
        .post("/api/companies/select", Some(&b_token), json!({ "companyId": a_company }))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn validation_errors_list_every_field() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post(
            "/api/auth/signup-tenant",
            None,
            json!({
                "tenantName": "Acme Inc.",
                "tenantSlug": "Not A Slug",
                "adminName": "Ada",
                "adminEmail": "not-an-email",
                "adminPassword": "short",
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["path"], "/api/auth/signup-tenant");
    let fields: Vec<&str> = body["validationErrors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"tenantSlug"));
    assert!(fields.contains(&"adminEmail"));
    assert!(fields.contains(&"adminPassword"));
    assert!(!fields.contains(&"tenantName"));

    let (admin, _) = srv.scoped_admin("Acme Inc.", "acme").await;
    let res = srv
        .post(
            "/api/users",
            Some(&admin),
            json!({
                "email": "eve@acme.test",
                "password": "long enough",
                "fullName": "Eve",
                "roles": ["ROOT"],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["validationErrors"][0]["field"], "roles");
    assert_eq!(body["validationErrors"][0]["rejectedValue"], json!(["ROOT"]));

    let malformed = srv
        .client
        .post(srv.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    let body: Value = malformed.json().await.unwrap();
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn argon2_backed_signup_and_login() {
    let codec = Arc::new(TokenCodec::new(JWT_SECRET.as_bytes(), TokenSettings::default()).unwrap());
    let srv = TestServer::spawn_with(AppServices::in_memory(codec)).await;
    srv.signup("Acme Inc.", "acme", "ada@acme.test").await;

    let res = srv
        .post(
            "/api/auth/login",
            None,
            json!({ "tenantSlug": "acme", "email": "ada@acme.test", "password": "correct horse" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
}
