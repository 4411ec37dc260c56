/*!
 * VFS Requests and Responses
 * Transport-shaped request values and typed results
 */

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::capability::CapabilitySet;
use super::entry::DirEntry;
use super::errors::{VfsError, VfsResult};
use super::identity::CallerIdentity;
use super::method::{ArgKind, VfsMethod};

/// A request in the shape a transport layer produces: named fields plus an
/// optional upload body
#[derive(Debug, Clone, Default)]
pub struct VfsRequest {
    pub identity: CallerIdentity,
    pub fields: Map<String, Value>,
    pub data: Option<Bytes>,
}

impl VfsRequest {
    pub fn new(identity: CallerIdentity) -> Self {
        Self {
            identity,
            ..Default::default()
        }
    }

    pub fn with_field<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_data<B: Into<Bytes>>(mut self, data: B) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Required string field
    pub fn text(&self, name: &str) -> VfsResult<&str> {
        match self.fields.get(name) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(VfsError::InvalidArgument(format!(
                "argument '{}' must be a string",
                name
            ))),
            None => Err(VfsError::InvalidArgument(format!(
                "missing argument '{}'",
                name
            ))),
        }
    }

    /// Optional options object, defaulted when absent or null
    pub fn options<T: DeserializeOwned + Default>(&self, name: &str) -> VfsResult<T> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                VfsError::InvalidArgument(format!("invalid '{}' options: {}", name, e))
            }),
        }
    }

    /// Upload body
    pub fn body(&self) -> VfsResult<Bytes> {
        self.data
            .clone()
            .ok_or_else(|| VfsError::InvalidArgument("missing argument 'data'".into()))
    }

    /// Check presence and shape of every argument in the method schema
    pub fn validate(&self, method: VfsMethod) -> VfsResult<()> {
        for arg in method.arguments() {
            match arg.kind {
                ArgKind::Data => {
                    if arg.required && self.data.is_none() {
                        return Err(VfsError::InvalidArgument(format!(
                            "{}: missing argument '{}'",
                            method, arg.name
                        )));
                    }
                }
                ArgKind::Path | ArgKind::Text => match self.fields.get(arg.name) {
                    Some(Value::String(s)) if arg.kind == ArgKind::Path && s.is_empty() => {
                        return Err(VfsError::InvalidPath(format!(
                            "{}: argument '{}' is empty",
                            method, arg.name
                        )));
                    }
                    Some(Value::String(_)) => {}
                    None | Some(Value::Null) if !arg.required => {}
                    None | Some(Value::Null) => {
                        return Err(VfsError::InvalidArgument(format!(
                            "{}: missing argument '{}'",
                            method, arg.name
                        )));
                    }
                    Some(_) => {
                        return Err(VfsError::InvalidArgument(format!(
                            "{}: argument '{}' must be a string",
                            method, arg.name
                        )));
                    }
                },
                ArgKind::Options => match self.fields.get(arg.name) {
                    None | Some(Value::Null) | Some(Value::Object(_)) => {}
                    Some(_) => {
                        return Err(VfsError::InvalidArgument(format!(
                            "{}: argument '{}' must be an object",
                            method, arg.name
                        )));
                    }
                },
            }
        }
        Ok(())
    }
}

/// Positional argument for simulated calls
#[derive(Debug, Clone)]
pub enum CallArg {
    Text(String),
    Data(Bytes),
    Options(Value),
}

impl From<&str> for CallArg {
    fn from(s: &str) -> Self {
        CallArg::Text(s.to_string())
    }
}

impl From<String> for CallArg {
    fn from(s: String) -> Self {
        CallArg::Text(s)
    }
}

impl From<Bytes> for CallArg {
    fn from(b: Bytes) -> Self {
        CallArg::Data(b)
    }
}

impl From<Vec<u8>> for CallArg {
    fn from(b: Vec<u8>) -> Self {
        CallArg::Data(Bytes::from(b))
    }
}

impl From<Value> for CallArg {
    fn from(v: Value) -> Self {
        CallArg::Options(v)
    }
}

/// Options for a simulated call
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub method: VfsMethod,
    pub identity: CallerIdentity,
}

impl CallOptions {
    pub fn new(method: VfsMethod) -> Self {
        Self {
            method,
            identity: CallerIdentity::anonymous(),
        }
    }

    pub fn as_user(mut self, identity: CallerIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Zip positional arguments with the method schema into a request.
    /// Extra arguments are ignored; missing ones surface during validation.
    pub fn into_request(self, args: Vec<CallArg>) -> VfsRequest {
        let mut request = VfsRequest::new(self.identity);
        for (spec, arg) in self.method.arguments().iter().zip(args) {
            match arg {
                CallArg::Data(bytes) if spec.kind == ArgKind::Data => request.data = Some(bytes),
                CallArg::Text(text) if spec.kind == ArgKind::Data => {
                    request.data = Some(Bytes::from(text))
                }
                CallArg::Text(text) => {
                    request.fields.insert(spec.name.to_string(), Value::String(text));
                }
                CallArg::Options(value) => {
                    request.fields.insert(spec.name.to_string(), value);
                }
                CallArg::Data(bytes) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    request.fields.insert(spec.name.to_string(), Value::String(text));
                }
            }
        }
        request
    }
}

/// File payload returned by `download`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl Download {
    /// `Content-Disposition` value for transports
    pub fn disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename.replace('"', "'"))
    }
}

/// Typed result of a routed request
#[derive(Debug, Clone, PartialEq)]
pub enum VfsResponse {
    Capabilities(CapabilitySet),
    Text(String),
    Bool(bool),
    Entry(DirEntry),
    Entries(Vec<DirEntry>),
    Data { mime: String, bytes: Bytes },
    Written(u64),
    Download(Download),
    Done,
}

impl VfsResponse {
    pub fn into_entries(self) -> Option<Vec<DirEntry>> {
        match self {
            VfsResponse::Entries(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            VfsResponse::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            VfsResponse::Data { bytes, .. } => Some(bytes),
            VfsResponse::Download(download) => Some(download.bytes),
            _ => None,
        }
    }

    /// JSON body for transports; file contents are not representable and
    /// yield `None`
    pub fn to_json(&self) -> Option<Value> {
        fn json<T: Serialize>(value: &T) -> Option<Value> {
            serde_json::to_value(value).ok()
        }

        match self {
            VfsResponse::Capabilities(set) => json(set),
            VfsResponse::Text(text) => Some(Value::String(text.clone())),
            VfsResponse::Bool(b) => Some(Value::Bool(*b)),
            VfsResponse::Entry(entry) => json(entry),
            VfsResponse::Entries(entries) => json(entries),
            VfsResponse::Written(n) => Some(Value::from(*n)),
            VfsResponse::Done => Some(Value::Bool(true)),
            VfsResponse::Data { .. } | VfsResponse::Download(_) => None,
        }
    }
}
