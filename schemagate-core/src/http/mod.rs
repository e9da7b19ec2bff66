//! HTTP boundary of the dynamic routes
//!
//! ```text
//! GET                  /dynamic/                   welcome text
//! GET|POST|PUT|DELETE  /dynamic/:schemaId/:route   dynamic CRUD
//! ```
//!
//! [`DynamicService`] is generic over the request body so it can be driven by
//! hyper's `Incoming` in production and by `Full<Bytes>` in tests.

mod server;

pub use server::serve;

use crate::catalog::SchemaCatalog;
use crate::engine::{DynamicEngine, DynamicRequest, Envelope, Outcome};
use crate::error::DynamicError;
use crate::schema::Operation;
use bytes::Bytes;
use http::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use std::convert::Infallible;
use std::sync::Arc;

pub type RespBody = BoxBody<Bytes, Infallible>;
pub type Resp = Response<RespBody>;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Path prefix every dynamic route lives under
pub const DYNAMIC_PREFIX: &str = "/dynamic";

pub const WELCOME_MESSAGE: &str =
    "Welcome to SchemaGate, this is a dynamic route, these are used for your APIs";

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE";

#[inline]
fn body_from<T: Into<Bytes>>(data: T) -> RespBody {
    Full::new(data.into()).boxed()
}

/// Serves `/dynamic/...` requests from a catalog and an engine
#[derive(Clone)]
pub struct DynamicService {
    catalog: Arc<dyn SchemaCatalog>,
    engine: Arc<DynamicEngine>,
    max_body_size: usize,
}

impl DynamicService {
    pub fn new(catalog: Arc<dyn SchemaCatalog>, engine: Arc<DynamicEngine>) -> Self {
        Self { catalog, engine, max_body_size: 1024 * 1024 }
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn engine(&self) -> &DynamicEngine {
        &self.engine
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Resp
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let path = req.uri().path().to_string();

        let Some(rest) = path
            .strip_prefix(DYNAMIC_PREFIX)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        else {
            return envelope_response(StatusCode::NOT_FOUND, &Envelope::failure("Route not found"));
        };

        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] if rest.is_empty() || rest == "/" => {
                if req.method() == Method::GET {
                    text_response(StatusCode::OK, WELCOME_MESSAGE)
                } else {
                    method_not_allowed(req.method(), "GET")
                }
            }
            [schema_id, route] => {
                let (schema_id, route) = (schema_id.to_string(), route.to_string());
                let outcome = self.dispatch(req, &schema_id, &route).await;
                outcome_response(outcome)
            }
            _ => envelope_response(StatusCode::NOT_FOUND, &Envelope::failure("Route not found")),
        }
    }

    async fn dispatch<B>(&self, req: Request<B>, schema_id: &str, route: &str) -> Outcome
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let Some(operation) = Operation::from_method(req.method()) else {
            return DynamicError::UnsupportedMethod(req.method().to_string()).into();
        };

        let Some(schema) = self.catalog.schema(schema_id).await else {
            return DynamicError::SchemaNotFound.into();
        };
        let Some(project) = self.catalog.project(&schema.project_id).await else {
            return DynamicError::ProjectNotFound.into();
        };

        let request = match self.read_request(req).await {
            Ok(request) => request,
            Err(error) => return error.into(),
        };

        log::debug!("{} /dynamic/{}/{} on {}", operation, schema_id, route, schema.schema_name);
        self.engine.execute(&schema, &project, route, operation, &request).await
    }

    async fn read_request<B>(&self, req: Request<B>) -> Result<DynamicRequest, DynamicError>
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_body_size) {
            return Err(DynamicError::PayloadTooLarge(self.max_body_size));
        }

        let (parts, body) = req.into_parts();
        let bytes = match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                return Err(DynamicError::PayloadTooLarge(self.max_body_size));
            }
            Err(e) => return Err(DynamicError::InvalidBody(e.to_string())),
        };

        DynamicRequest::from_http(&parts, &bytes)
    }
}

fn text_response(status: StatusCode, text: &'static str) -> Resp {
    let mut resp = Response::new(body_from(text));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    resp
}

fn envelope_response(status: StatusCode, envelope: &Envelope) -> Resp {
    let json = serde_json::to_vec(envelope)
        .unwrap_or_else(|_| br#"{"success":false,"message":"Internal error"}"#.to_vec());
    let mut resp = Response::new(body_from(json));
    *resp.status_mut() = status;
    resp.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

fn method_not_allowed(method: &Method, allow: &'static str) -> Resp {
    let envelope = Envelope::failure(DynamicError::UnsupportedMethod(method.to_string()).to_string());
    let mut resp = envelope_response(StatusCode::METHOD_NOT_ALLOWED, &envelope);
    resp.headers_mut().insert(ALLOW, HeaderValue::from_static(allow));
    resp
}

/// Write an engine outcome to the wire
pub fn outcome_response(outcome: Outcome) -> Resp {
    let mut resp = envelope_response(outcome.status, &outcome.envelope);

    if outcome.status == StatusCode::METHOD_NOT_ALLOWED {
        resp.headers_mut().insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    }

    if let Some(cookie) = outcome.set_cookie {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                resp.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => log::error!("Dropping unencodable Set-Cookie header: {}", e),
        }
    }

    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::schema::{MethodDefinition, Project, SchemaDefinition};
    use crate::security::TokenIssuer;
    use crate::store::MemoryDocumentStore;
    use http_body::Frame;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    /// Chunked body that never ends, counting the bytes handed out
    struct Endless {
        sent: Arc<AtomicUsize>,
    }

    impl Body for Endless {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            self.sent.fetch_add(1024, Ordering::SeqCst);
            Poll::Ready(Some(Ok(Frame::data(Bytes::from(vec![b'a'; 1024])))))
        }
    }

    fn service() -> DynamicService {
        let engine = DynamicEngine::new(Arc::new(MemoryDocumentStore::new()), TokenIssuer::new("k"));
        DynamicService::new(Arc::new(MemoryCatalog::new()), Arc::new(engine))
    }

    fn request(method: Method, uri: &str) -> Request<Full<Bytes>> {
        Request::builder().method(method).uri(uri).body(Full::new(Bytes::new())).unwrap()
    }

    async fn body_text(resp: Resp) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_welcome() {
        let resp = service().handle(request(Method::GET, "/dynamic/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, WELCOME_MESSAGE);

        let resp = service().handle(request(Method::GET, "/dynamic")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_schema() {
        let resp = service().handle(request(Method::GET, "/dynamic/nope/all")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(resp).await, r#"{"success":false,"message":"Schema not found"}"#);
    }

    #[tokio::test]
    async fn test_unsupported_verb() {
        let resp = service().handle(request(Method::PATCH, "/dynamic/s1/all")).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers().get(ALLOW).unwrap(), ALLOWED_METHODS);
    }

    #[tokio::test]
    async fn test_unknown_paths() {
        let resp = service().handle(request(Method::GET, "/other")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = service().handle(request(Method::GET, "/dynamic/a/b/c")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = service().handle(request(Method::GET, "/dynamicx/a")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(resp).await, r#"{"success":false,"message":"Route not found"}"#);
    }

    #[tokio::test]
    async fn test_streamed_body_is_capped() {
        let catalog = MemoryCatalog::new();
        catalog
            .insert_project(Project {
                id: "p1".into(),
                project_name: "shop".into(),
                user_name: "alice".into(),
            })
            .await;
        catalog
            .insert_schema(SchemaDefinition {
                id: "s1".into(),
                schema_name: "Note".into(),
                fields: Vec::new(),
                methods_list: vec![MethodDefinition::new(Operation::Create, "add")],
                project_id: "p1".into(),
            })
            .await;
        let engine = DynamicEngine::new(Arc::new(MemoryDocumentStore::new()), TokenIssuer::new("k"));
        let service =
            DynamicService::new(Arc::new(catalog), Arc::new(engine)).with_max_body_size(16);

        let sent = Arc::new(AtomicUsize::new(0));
        let req = Request::builder()
            .method(Method::POST)
            .uri("/dynamic/s1/add")
            .body(Endless { sent: sent.clone() })
            .unwrap();
        let resp = service.handle(req).await;

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(sent.load(Ordering::SeqCst) <= 2048);
    }
}
