//! Code sources
//!
//! A [`CodeSource`] turns a tool name into an [`Artifact`] the loader can
//! instantiate. Sources never cache; caching is the loader's job.
//!
//! | source | artifact |
//! |---|---|
//! | [`BuiltinSource`] | native factory compiled into the worker |
//! | [`DirectorySource`] | `<dir>/<name>.js` |
//! | [`HttpSource`] | `GET http://host:port/<name>.js` |
//! | [`LayeredSource`] | first of several sources that knows the name |

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use jobrelay_common::protocol::error::{JobRelayError, Result};
use tracing::debug;

use crate::builtin::{Echo, Fibonacci};
use crate::tool::{factory, ToolFactory};

/// File extension of script tools.
pub const SCRIPT_EXTENSION: &str = "js";

/// A loadable unit for one tool.
#[derive(Clone)]
pub enum Artifact {
    /// JavaScript source defining a global `execute(parameter)` function
    Script { source: Arc<str> },
    /// Factory for a tool compiled into the worker
    Native(ToolFactory),
}

impl Artifact {
    pub fn script(source: impl Into<Arc<str>>) -> Self {
        Artifact::Script {
            source: source.into(),
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Script { source } => f
                .debug_struct("Script")
                .field("bytes", &source.len())
                .finish(),
            Artifact::Native(_) => f.write_str("Native"),
        }
    }
}

/// Resolves tool names to artifacts.
#[async_trait]
pub trait CodeSource: Send + Sync {
    /// Fetches the artifact for `name`.
    ///
    /// # Errors
    /// - `UnknownTool` if this source has nothing under that name
    /// - `LoadFailure` if it does but the artifact cannot be retrieved
    async fn fetch(&self, name: &str) -> Result<Artifact>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Checks that `name` is safe to use as a file or URL path segment.
///
/// Allowed: non-empty, ASCII letters, digits, `_`, `-`, `.`, not starting
/// with `.` and without `..`.
pub fn validate_tool_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(JobRelayError::UnknownTool(name.to_string()))
    }
}

/// Compile-time table of named tool factories.
#[derive(Clone, Default)]
pub struct BuiltinSource {
    tools: HashMap<String, ToolFactory>,
}

impl BuiltinSource {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tools every worker ships: `Echo` and `Fibonacci`.
    pub fn with_defaults() -> Self {
        Self::new()
            .with_tool("Echo", factory(|| Echo))
            .with_tool("Fibonacci", factory(|| Fibonacci))
    }

    pub fn with_tool(mut self, name: impl Into<String>, factory: ToolFactory) -> Self {
        self.register(name, factory);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, factory: ToolFactory) {
        self.tools.insert(name.into(), factory);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl CodeSource for BuiltinSource {
    async fn fetch(&self, name: &str) -> Result<Artifact> {
        self.tools
            .get(name)
            .cloned()
            .map(Artifact::Native)
            .ok_or_else(|| JobRelayError::UnknownTool(name.to_string()))
    }

    fn describe(&self) -> String {
        format!("builtin[{}]", self.names().join(","))
    }
}

/// Reads `<root>/<name>.js`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, SCRIPT_EXTENSION))
    }
}

#[async_trait]
impl CodeSource for DirectorySource {
    async fn fetch(&self, name: &str) -> Result<Artifact> {
        validate_tool_name(name)?;
        let path = self.path_for(name);

        match tokio::fs::read_to_string(&path).await {
            Ok(source) => {
                debug!(tool = name, path = %path.display(), "Script read");
                Ok(Artifact::script(source))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(JobRelayError::UnknownTool(name.to_string()))
            }
            Err(e) => Err(JobRelayError::load_failure(
                name,
                format!("cannot read {}: {}", path.display(), e),
            )),
        }
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}

/// Fetches scripts from a code server over HTTP.
#[derive(Clone)]
pub struct HttpSource {
    authority: String,
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HttpSource {
    /// A source for the code server at `host:port`.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            authority: format!("{}:{}", host, port),
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("http://{}/{}.{}", self.authority, name, SCRIPT_EXTENSION)
    }
}

#[async_trait]
impl CodeSource for HttpSource {
    async fn fetch(&self, name: &str) -> Result<Artifact> {
        validate_tool_name(name)?;
        let url = self.url_for(name);

        let request = Request::builder()
            .method(Method::GET)
            .uri(&url)
            .body(Empty::<Bytes>::new())
            .map_err(|e| JobRelayError::load_failure(name, format!("bad request for {}: {}", url, e)))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| JobRelayError::load_failure(name, format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(JobRelayError::UnknownTool(name.to_string()));
        }
        if !status.is_success() {
            return Err(JobRelayError::load_failure(
                name,
                format!("GET {} returned {}", url, status),
            ));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| JobRelayError::load_failure(name, format!("reading {}: {}", url, e)))?
            .to_bytes();

        let source = String::from_utf8(body.to_vec())
            .map_err(|_| JobRelayError::load_failure(name, format!("{} is not UTF-8", url)))?;

        debug!(tool = name, %url, bytes = source.len(), "Script downloaded");
        Ok(Artifact::script(source))
    }

    fn describe(&self) -> String {
        format!("http://{}", self.authority)
    }
}

/// Consults sources in order, moving on only when one reports `UnknownTool`.
#[derive(Clone, Default)]
pub struct LayeredSource {
    sources: Vec<Arc<dyn CodeSource>>,
}

impl LayeredSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl CodeSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn push(&mut self, source: Arc<dyn CodeSource>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl CodeSource for LayeredSource {
    async fn fetch(&self, name: &str) -> Result<Artifact> {
        for source in &self.sources {
            match source.fetch(name).await {
                Err(JobRelayError::UnknownTool(_)) => continue,
                other => return other,
            }
        }
        Err(JobRelayError::UnknownTool(name.to_string()))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        parts.join(" > ")
    }
}
