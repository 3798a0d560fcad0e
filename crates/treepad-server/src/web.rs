//! REST interface over the sandboxed file service.

#![allow(missing_docs)]

mod routes;

use std::sync::Arc;
use std::thread;

use serde_json::Value;
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, info};
use treepad_fs::{DefaultBaseDir, FileService, JsonFileStore, Workspaces};

use crate::ai::AiClient;
use crate::config::ServerConfig;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("web bind {listen}: {message}")]
    Bind { listen: String, message: String },
}

/// Everything a request handler needs.
#[derive(Debug)]
pub struct AppContext {
    pub workspaces: Arc<Workspaces>,
    pub ai: AiClient,
    pub cors_origins: Vec<String>,
}

impl AppContext {
    #[must_use]
    pub fn new(workspaces: Arc<Workspaces>, config: &ServerConfig) -> Self {
        Self {
            workspaces,
            ai: AiClient::new(config.ai.clone()),
            cors_origins: config.cors_origins.clone(),
        }
    }

    /// Opens the workspace state file named by `config`; loading creates it
    /// if missing.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        let store = JsonFileStore::new(config.state_file.clone());
        let workspaces = Workspaces::load(
            Arc::new(store),
            &DefaultBaseDir::new(config.default_dir.clone()),
        );
        Self::new(Arc::new(workspaces), config)
    }

    /// File operations against the base directory active right now.
    #[must_use]
    pub fn files(&self) -> FileService {
        FileService::new(self.workspaces.active_base_dir())
    }
}

/// A decoded HTTP request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub origin: Option<String>,
}

impl ApiRequest {
    /// Splits `url` into path and percent-decoded query pairs.
    #[must_use]
    pub fn new(method: Method, url: &str) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_query_component(key), decode_query_component(value))
            })
            .collect();
        Self {
            method,
            path: path.to_string(),
            query,
            body: Vec::new(),
            origin: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_json(self, body: &Value) -> Self {
        self.with_body(body.to_string())
    }

    #[must_use]
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    /// First value of query parameter `name`.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A response ready to be written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ApiReply {
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self::bytes(status, "application/json", body.to_string().into_bytes())
    }

    #[must_use]
    pub fn text(status: u16, body: &str) -> Self {
        Self::bytes(status, "text/plain; charset=utf-8", body.as_bytes().to_vec())
    }

    #[must_use]
    pub fn bytes(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.to_string(),
            headers: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self::bytes(204, "text/plain", Vec::new())
    }

    /// Body parsed as JSON, if it is JSON.
    #[must_use]
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Routes one request. Never panics on client input.
#[must_use]
pub fn handle(ctx: &AppContext, request: &ApiRequest) -> ApiReply {
    let mut reply = if request.method == Method::Options {
        ApiReply::no_content()
    } else {
        routes::dispatch(ctx, request)
    };
    apply_cors(ctx, request, &mut reply);
    debug!(
        method = %request.method,
        path = %request.path,
        status = reply.status,
        "handled request"
    );
    reply
}

fn apply_cors(ctx: &AppContext, request: &ApiRequest, reply: &mut ApiReply) {
    let Some(origin) = request.origin.as_deref() else {
        return;
    };
    if !ctx.cors_origins.iter().any(|allowed| allowed == origin) {
        return;
    }
    reply
        .headers
        .push(("Access-Control-Allow-Origin".to_string(), origin.to_string()));
    reply
        .headers
        .push(("Vary".to_string(), "Origin".to_string()));
    if request.method == Method::Options {
        reply.headers.push((
            "Access-Control-Allow-Methods".to_string(),
            "GET, POST, DELETE, OPTIONS".to_string(),
        ));
        reply.headers.push((
            "Access-Control-Allow-Headers".to_string(),
            "Content-Type".to_string(),
        ));
    }
}

fn decode_query_component(input: &str) -> String {
    let spaced = input.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

/// A running server; requests are handled one at a time on its thread.
pub struct WebServer {
    server: Arc<Server>,
    handle: Option<thread::JoinHandle<()>>,
    pub listen: String,
}

impl std::fmt::Debug for WebServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebServer")
            .field("listen", &self.listen)
            .finish_non_exhaustive()
    }
}

impl WebServer {
    /// Blocks until the server thread exits.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Stops accepting requests and waits for the server thread.
    pub fn shutdown(mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn start_web_server(listen: &str, ctx: Arc<AppContext>) -> Result<WebServer, WebError> {
    let server = Server::http(listen).map_err(|err| WebError::Bind {
        listen: listen.to_string(),
        message: err.to_string(),
    })?;
    let listen = server
        .server_addr()
        .to_ip()
        .map_or_else(|| listen.to_string(), |addr| addr.to_string());
    let server = Arc::new(server);
    info!(listen = %listen, "file server listening");

    let worker = Arc::clone(&server);
    let worker_thread = thread::spawn(move || {
        for mut request in worker.incoming_requests() {
            let mut body = Vec::new();
            if request.as_reader().read_to_end(&mut body).is_err() {
                let _ = request.respond(Response::from_string("invalid body").with_status_code(400));
                continue;
            }
            let origin = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Origin"))
                .map(|header| header.value.as_str().to_string());
            let mut api_request =
                ApiRequest::new(request.method().clone(), request.url()).with_body(body);
            api_request.origin = origin;

            let reply = handle(&ctx, &api_request);
            let _ = request.respond(into_response(reply));
        }
    });

    Ok(WebServer {
        server,
        handle: Some(worker_thread),
        listen,
    })
}

fn into_response(reply: ApiReply) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_data(reply.body).with_status_code(StatusCode(reply.status));
    let headers = std::iter::once(("Content-Type".to_string(), reply.content_type))
        .chain(reply.headers);
    for (name, value) in headers {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    response
}
