//! Integration tests for the storefront sync client.
//!
//! [`FakeApi`] serves the storefront HTTP API and the notification hub on an
//! ephemeral local port. It counts requests per [`Endpoint`], can be told to
//! fail individual endpoints, and can push hub events to connected clients.
//!
//! ```rust,ignore
//! let api = FakeApi::start().await;
//! let storefront = Storefront::builder(api.config()).build()?;
//! storefront.login(api.login_form()).await?;
//! assert_eq!(api.hits(Endpoint::Login), 1);
//! ```

#![allow(clippy::missing_panics_doc)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use storefront_sync_client::{AppState, ClientConfig, Store};
use storefront_sync_core::LoginForm;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use url::Url;

/// Password the fake accepts for any email.
pub const PASSWORD: &str = "Correct-Horse-42";

/// Number of products in the fake catalog.
pub const CATALOG_SIZE: usize = 30;

const RECORD_SEPARATOR: char = '\u{1e}';

/// Delay applied to catalog and refresh responses so concurrent callers
/// overlap.
const LATENCY: Duration = Duration::from_millis(50);

/// Endpoints with hit counters and failure switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    Refresh,
    Logout,
    Me,
    UpdateProfile,
    Products,
    Product,
    Categories,
    Cart,
    AddCartItem,
    Orders,
    ToggleLike,
    ReplaceLiked,
    ToggleStockSubscription,
    Hub,
}

/// One hub method call received from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub target: String,
    pub arguments: Vec<Value>,
}

/// What the fake hub sends to every connected session.
#[derive(Debug, Clone)]
enum HubCommand {
    Send(String),
    Disconnect,
}

struct Data {
    generation: u64,
    valid_token: Option<String>,
    email: String,
    first_name: String,
    cart_id: Option<String>,
    liked: BTreeSet<String>,
    replaced_liked: Option<Vec<String>>,
    cart_items: Vec<Value>,
    invocations: Vec<Invocation>,
    hub_tokens: Vec<Option<String>>,
    hold_completions: bool,
}

struct FakeState {
    hits: Mutex<HashMap<Endpoint, usize>>,
    failing: Mutex<HashSet<Endpoint>>,
    data: Mutex<Data>,
    hub: broadcast::Sender<HubCommand>,
    hub_clients: watch::Sender<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeState {
    /// Count a hit and report whether the endpoint is switched to fail.
    fn hit(&self, endpoint: Endpoint) -> bool {
        *lock(&self.hits).entry(endpoint).or_default() += 1;
        lock(&self.failing).contains(&endpoint)
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let data = lock(&self.data);
        match (bearer, data.valid_token.as_deref()) {
            (Some(given), Some(valid)) if given == valid => Ok(()),
            _ => Err(problem(StatusCode::UNAUTHORIZED, "token expired")),
        }
    }

    fn issue_token(&self) -> Value {
        let mut data = lock(&self.data);
        data.generation += 1;
        let token = format!("token-{}", data.generation);
        data.valid_token = Some(token.clone());
        json!({ "accessToken": token, "user": user_json(&data) })
    }
}

fn user_json(data: &Data) -> Value {
    json!({
        "id": "u1",
        "email": data.email,
        "firstName": data.first_name,
        "lastName": "Doe",
        "cartId": data.cart_id,
        "roles": ["customer"],
        "likedProductIds": data.liked.iter().collect::<Vec<_>>(),
        "stockSubscriptions": [],
    })
}

fn problem(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "title": status.to_string(), "detail": detail }))).into_response()
}

fn unavailable() -> Response {
    problem(StatusCode::SERVICE_UNAVAILABLE, "switched off by test")
}

/// Catalog product `n` (1-based). Odd products are by Acme, even by Globex.
#[must_use]
pub fn product_json(n: usize) -> Value {
    let brand = if n % 2 == 1 { "Acme" } else { "Globex" };
    json!({
        "id": format!("p{n}"),
        "slug": format!("product-{n}"),
        "name": format!("Product {n}"),
        "brand": brand,
        "price": format!("{n}.00"),
        "colors": [{
            "color": "red",
            "images": [],
            "sizes": [{ "size": "M", "stock": n % 3 }],
        }],
        "images": [
            { "url": format!("/img/{n}-a.jpg"), "isMain": true },
            { "url": format!("/img/{n}-b.jpg"), "isMain": true },
        ],
    })
}

fn order_json() -> Value {
    json!({
        "id": "o1",
        "orderNumber": "1001",
        "status": "shipped",
        "paymentStatus": "paid",
        "total": "59.90",
        "createdAt": "2026-01-05T10:00:00Z",
    })
}

// =============================================================================
// Handlers
// =============================================================================

type Shared = State<Arc<FakeState>>;

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): Shared, Json(body): Json<LoginBody>) -> Response {
    if state.hit(Endpoint::Login) {
        return unavailable();
    }
    if body.password != PASSWORD {
        return problem(StatusCode::UNAUTHORIZED, "invalid credentials");
    }
    lock(&state.data).email = body.email;
    Json(state.issue_token()).into_response()
}

async fn refresh(State(state): Shared) -> Response {
    let failing = state.hit(Endpoint::Refresh);
    tokio::time::sleep(LATENCY).await;
    if failing {
        return problem(StatusCode::UNAUTHORIZED, "refresh token expired");
    }
    Json(state.issue_token()).into_response()
}

async fn logout(State(state): Shared) -> StatusCode {
    state.hit(Endpoint::Logout);
    lock(&state.data).valid_token = None;
    StatusCode::NO_CONTENT
}

async fn me(State(state): Shared, headers: HeaderMap) -> Response {
    if state.hit(Endpoint::Me) {
        return unavailable();
    }
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    Json(user_json(&lock(&state.data))).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBody {
    first_name: String,
}

async fn update_profile(
    State(state): Shared,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> Response {
    if state.hit(Endpoint::UpdateProfile) {
        return unavailable();
    }
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let mut data = lock(&state.data);
    data.first_name = body.first_name;
    Json(user_json(&data)).into_response()
}

async fn products(
    State(state): Shared,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let failing = state.hit(Endpoint::Products);
    tokio::time::sleep(LATENCY).await;
    if failing {
        return unavailable();
    }

    let matching: Vec<Value> = (1..=CATALOG_SIZE)
        .map(product_json)
        .filter(|p| query.get("brand").is_none_or(|b| p["brand"] == b.as_str()))
        .collect();
    let page_number: usize = query
        .get("pageNumber")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let page_size: usize = query
        .get("pageSize")
        .and_then(|v| v.parse().ok())
        .unwrap_or(12);
    let items: Vec<Value> = matching
        .iter()
        .skip(page_number.saturating_sub(1) * page_size)
        .take(page_size)
        .cloned()
        .collect();

    Json(json!({
        "items": items,
        "totalCount": matching.len(),
        "pageNumber": page_number,
        "pageSize": page_size,
    }))
    .into_response()
}

async fn product(State(state): Shared, Path(slug): Path<String>) -> Response {
    if state.hit(Endpoint::Product) {
        return unavailable();
    }
    (1..=CATALOG_SIZE)
        .map(product_json)
        .find(|p| p["slug"] == slug.as_str())
        .map_or_else(
            || problem(StatusCode::NOT_FOUND, "no such product"),
            |p| Json(p).into_response(),
        )
}

async fn categories(State(state): Shared) -> Response {
    if state.hit(Endpoint::Categories) {
        return unavailable();
    }
    Json(json!([
        {
            "id": "c-women",
            "name": "Women",
            "slug": "women",
            "subCategories": [{ "id": "c-dresses", "name": "Dresses", "slug": "dresses" }],
        },
        { "id": "c-men", "name": "Men", "slug": "men" },
    ]))
    .into_response()
}

fn cart_json(data: &Data) -> Value {
    json!({ "id": data.cart_id.as_deref().unwrap_or("c1"), "items": data.cart_items })
}

async fn cart(State(state): Shared, headers: HeaderMap) -> Response {
    if state.hit(Endpoint::Cart) {
        return unavailable();
    }
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    Json(cart_json(&lock(&state.data))).into_response()
}

async fn add_cart_item(State(state): Shared, headers: HeaderMap, Json(item): Json<Value>) -> Response {
    if state.hit(Endpoint::AddCartItem) {
        return unavailable();
    }
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let mut data = lock(&state.data);
    let line = json!({
        "id": format!("line-{}", data.cart_items.len() + 1),
        "productId": item["productId"],
        "productName": "Product",
        "color": item["color"],
        "size": item["size"],
        "quantity": item["quantity"],
        "unitPrice": "10.00",
    });
    data.cart_items.push(line);
    Json(cart_json(&data)).into_response()
}

async fn orders(State(state): Shared, headers: HeaderMap) -> Response {
    if state.hit(Endpoint::Orders) {
        return unavailable();
    }
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    Json(json!([order_json()])).into_response()
}

async fn toggle_like(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if state.hit(Endpoint::ToggleLike) {
        return unavailable();
    }
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let mut data = lock(&state.data);
    if !data.liked.remove(&id) {
        data.liked.insert(id);
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplaceLikedBody {
    product_ids: Vec<String>,
}

async fn replace_liked(
    State(state): Shared,
    headers: HeaderMap,
    Json(body): Json<ReplaceLikedBody>,
) -> Response {
    if state.hit(Endpoint::ReplaceLiked) {
        return unavailable();
    }
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    let mut data = lock(&state.data);
    data.liked = body.product_ids.iter().cloned().collect();
    data.replaced_liked = Some(body.product_ids);
    StatusCode::NO_CONTENT.into_response()
}

async fn toggle_stock_subscription(State(state): Shared, headers: HeaderMap) -> Response {
    if state.hit(Endpoint::ToggleStockSubscription) {
        return unavailable();
    }
    if let Err(denied) = state.authorize(&headers) {
        return denied;
    }
    StatusCode::NO_CONTENT.into_response()
}

// =============================================================================
// Hub
// =============================================================================

async fn hub(
    State(state): Shared,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    if state.hit(Endpoint::Hub) {
        return unavailable();
    }
    lock(&state.data)
        .hub_tokens
        .push(query.get("access_token").cloned());
    ws.on_upgrade(move |socket| hub_session(socket, state))
}

fn frame(value: &Value) -> Message {
    Message::Text(format!("{value}{RECORD_SEPARATOR}").into())
}

async fn hub_session(socket: WebSocket, state: Arc<FakeState>) {
    let (mut sink, mut stream) = socket.split();

    // Handshake request first, then a bare `{}` response.
    match stream.next().await {
        Some(Ok(Message::Text(text))) if text.as_str().contains("\"protocol\"") => {}
        _ => return,
    }
    let mut pushes = state.hub.subscribe();
    if sink
        .send(Message::Text(format!("{{}}{RECORD_SEPARATOR}").into()))
        .await
        .is_err()
    {
        return;
    }
    state.hub_clients.send_modify(|n| *n += 1);

    loop {
        tokio::select! {
            command = pushes.recv() => {
                let Ok(HubCommand::Send(push)) = command else { break };
                if sink.send(Message::Text(push.into())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else { break };
                let Message::Text(text) = message else { continue };
                for record in text.as_str().split(RECORD_SEPARATOR).filter(|r| !r.is_empty()) {
                    let Ok(value) = serde_json::from_str::<Value>(record) else { continue };
                    if value["type"] != 1 {
                        continue;
                    }
                    let invocation = Invocation {
                        target: value["target"].as_str().unwrap_or_default().to_string(),
                        arguments: value["arguments"].as_array().cloned().unwrap_or_default(),
                    };
                    let hold = {
                        let mut data = lock(&state.data);
                        data.invocations.push(invocation);
                        data.hold_completions
                    };
                    if hold {
                        continue;
                    }
                    if let Some(id) = value["invocationId"].as_str() {
                        let completion = json!({ "type": 3, "invocationId": id, "result": null });
                        if sink.send(frame(&completion)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    state.hub_clients.send_modify(|n| *n = n.saturating_sub(1));
}

// =============================================================================
// FakeApi
// =============================================================================

/// Running fake API server. Stops when dropped.
pub struct FakeApi {
    addr: SocketAddr,
    state: Arc<FakeState>,
    server: JoinHandle<()>,
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl FakeApi {
    /// Start the server on an ephemeral port.
    pub async fn start() -> Self {
        let (hub_tx, _) = broadcast::channel(64);
        let (hub_clients, _) = watch::channel(0);
        let state = Arc::new(FakeState {
            hits: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            data: Mutex::new(Data {
                generation: 0,
                valid_token: None,
                email: String::new(),
                first_name: "Jane".to_string(),
                cart_id: Some("c1".to_string()),
                liked: BTreeSet::new(),
                replaced_liked: None,
                cart_items: Vec::new(),
                invocations: Vec::new(),
                hub_tokens: Vec::new(),
                hold_completions: false,
            }),
            hub: hub_tx,
            hub_clients,
        });

        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/users/me", get(me).put(update_profile))
            .route(
                "/users/me/liked-products",
                axum::routing::put(replace_liked),
            )
            .route("/users/me/liked-products/{id}", post(toggle_like))
            .route(
                "/users/me/stock-subscriptions",
                post(toggle_stock_subscription),
            )
            .route("/products", get(products))
            .route("/products/categories", get(categories))
            .route("/products/{slug}", get(product))
            .route("/cart", get(cart))
            .route("/cart/items", post(add_cart_item))
            .route("/orders", get(orders));
        let app = Router::new()
            .nest("/api", api)
            .route("/hubs/notifications", get(hub))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake API listener");
        let addr = listener
            .local_addr()
            .expect("Failed to read fake API address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL of the HTTP API.
    #[must_use]
    pub fn api_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/", self.addr)).expect("valid fake API URL")
    }

    /// Client configuration pointing at this server.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.api_url()).expect("valid fake API config");
        config.hub_invoke_timeout = Duration::from_secs(2);
        config
    }

    /// A login form with the accepted password.
    #[must_use]
    pub fn login_form(&self) -> LoginForm {
        LoginForm {
            email: "jane@example.com".to_string(),
            password: PASSWORD.to_string(),
        }
    }

    /// Requests received by `endpoint`.
    #[must_use]
    pub fn hits(&self, endpoint: Endpoint) -> usize {
        lock(&self.state.hits)
            .get(&endpoint)
            .copied()
            .unwrap_or_default()
    }

    /// Make `endpoint` fail (`401` for refresh, `503` otherwise).
    pub fn fail(&self, endpoint: Endpoint) {
        lock(&self.state.failing).insert(endpoint);
    }

    /// Let `endpoint` succeed again.
    pub fn recover(&self, endpoint: Endpoint) {
        lock(&self.state.failing).remove(&endpoint);
    }

    /// Invalidate the current access token, so the next authorized request
    /// gets a `401`.
    pub fn expire_token(&self) {
        lock(&self.state.data).valid_token = None;
    }

    /// Number of tokens issued by login and refresh.
    #[must_use]
    pub fn tokens_issued(&self) -> u64 {
        lock(&self.state.data).generation
    }

    /// Set the user's cart reference (`None` for a user without a cart).
    pub fn set_cart_id(&self, cart_id: Option<&str>) {
        lock(&self.state.data).cart_id = cart_id.map(str::to_string);
    }

    /// Seed the server-side liked set.
    pub fn set_liked(&self, ids: &[&str]) {
        lock(&self.state.data).liked = ids.iter().map(|id| (*id).to_string()).collect();
    }

    /// The server-side liked set.
    #[must_use]
    pub fn liked(&self) -> Vec<String> {
        lock(&self.state.data).liked.iter().cloned().collect()
    }

    /// Body of the last liked-set replacement, if any.
    #[must_use]
    pub fn replaced_liked(&self) -> Option<Vec<String>> {
        lock(&self.state.data).replaced_liked.clone()
    }

    /// Hub method calls received so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        lock(&self.state.data).invocations.clone()
    }

    /// `access_token` query values of hub connections, in order.
    #[must_use]
    pub fn hub_tokens(&self) -> Vec<Option<String>> {
        lock(&self.state.data).hub_tokens.clone()
    }

    /// Wait until at least `count` hub clients have completed the handshake.
    pub async fn wait_for_hub_clients(&self, count: usize) {
        let mut clients = self.state.hub_clients.subscribe();
        tokio::time::timeout(Duration::from_secs(5), clients.wait_for(|n| *n >= count))
            .await
            .expect("hub clients did not connect in time")
            .expect("hub client counter closed");
    }

    /// Invoke `target` on every connected hub client. Returns how many
    /// clients received it.
    pub fn push(&self, target: &str, payload: Value) -> usize {
        let message = json!({ "type": 1, "target": target, "arguments": [payload] });
        self.state
            .hub
            .send(HubCommand::Send(format!("{message}{RECORD_SEPARATOR}")))
            .unwrap_or_default()
    }

    /// Drop every hub connection without a close frame.
    pub fn disconnect_hub_clients(&self) {
        let _ = self.state.hub.send(HubCommand::Disconnect);
    }

    /// Record hub invocations without completing them.
    pub fn hold_hub_completions(&self, hold: bool) {
        lock(&self.state.data).hold_completions = hold;
    }
}

/// Wait until `condition` holds for the store's state, re-checking after
/// every update.
pub async fn wait_until(store: &Store, condition: impl Fn(&AppState) -> bool) {
    let mut versions = store.subscribe();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if store.read(&condition).await {
            return;
        }
        tokio::time::timeout_at(deadline, versions.changed())
            .await
            .expect("store condition not reached in time")
            .expect("store dropped");
    }
}
