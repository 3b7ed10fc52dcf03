//! A minimal HTTP request carrying decoded form data.
//!
//! [`HttpRequest`] keeps what form processing needs: the method (to decide
//! whether a submission should be validated), the decoded query string,
//! the decoded body, and uploaded files.

use std::collections::HashMap;

use formbind_core::{FormError, FormResult};
use http::{HeaderMap, Method};

use crate::querydict::QueryDict;
use crate::upload::{self, UploadedFile};

/// An HTTP request with decoded GET/POST data.
///
/// # Examples
///
/// ```
/// use formbind_http::HttpRequest;
///
/// let request = HttpRequest::builder()
///     .method(http::Method::POST)
///     .content_type("application/x-www-form-urlencoded")
///     .body(b"username=ada&tags.0=math".to_vec())
///     .build();
///
/// assert_eq!(request.method(), &http::Method::POST);
/// assert_eq!(request.post().get("tags.0"), Some("math"));
/// ```
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    path: String,
    content_type: Option<String>,
    headers: HeaderMap,
    get: QueryDict,
    post: QueryDict,
    files: HashMap<String, Vec<UploadedFile>>,
    body: Vec<u8>,
    body_error: Option<String>,
}

impl HttpRequest {
    /// Creates a new [`HttpRequestBuilder`].
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// Builds a request from `http` request parts and the collected body.
    pub fn from_parts(parts: http::request::Parts, body: Vec<u8>) -> Self {
        let content_type = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let mut builder = Self::builder()
            .method(parts.method)
            .path(parts.uri.path())
            .query_string(parts.uri.query().unwrap_or(""))
            .body(body);
        builder.headers = parts.headers;
        builder.content_type = content_type;
        builder.build()
    }

    /// Returns the HTTP method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the content type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns the request headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the decoded query string parameters.
    pub const fn get(&self) -> &QueryDict {
        &self.get
    }

    /// Returns the decoded body parameters (empty for undecodable bodies).
    pub const fn post(&self) -> &QueryDict {
        &self.post
    }

    /// Returns uploaded files keyed by input name.
    pub const fn files(&self) -> &HashMap<String, Vec<UploadedFile>> {
        &self.files
    }

    /// Returns the raw body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the decoded body together with uploaded files.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::BadRequest`] if the body could not be decoded.
    pub fn form(&self) -> FormResult<(&QueryDict, &HashMap<String, Vec<UploadedFile>>)> {
        match &self.body_error {
            Some(err) => Err(FormError::BadRequest(err.clone())),
            None => Ok((&self.post, &self.files)),
        }
    }
}

/// Builder for constructing [`HttpRequest`] instances.
#[derive(Debug)]
pub struct HttpRequestBuilder {
    method: Method,
    path: String,
    query_string: String,
    content_type: Option<String>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for HttpRequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            path: "/".to_string(),
            query_string: String::new(),
            content_type: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl HttpRequestBuilder {
    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the request path.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    /// Sets the query string (without leading `?`).
    #[must_use]
    pub fn query_string(mut self, qs: &str) -> Self {
        self.query_string = qs.to_string();
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn content_type(mut self, ct: &str) -> Self {
        self.content_type = Some(ct.to_string());
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Sets a url-encoded body from `(key, value)` pairs and the matching
    /// content type.
    #[must_use]
    pub fn form<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut qd = QueryDict::new_mutable();
        for (k, v) in pairs {
            // Freshly created dictionaries are mutable.
            let _ = qd.append(k, v);
        }
        self.content_type = Some("application/x-www-form-urlencoded".to_string());
        self.body = qd.urlencode().into_bytes();
        self
    }

    /// Builds the [`HttpRequest`], decoding the body according to its
    /// content type.
    pub fn build(self) -> HttpRequest {
        let get = QueryDict::parse(&self.query_string);
        let (post, files, body_error) = decode_body(self.content_type.as_deref(), &self.body);

        HttpRequest {
            method: self.method,
            path: self.path,
            content_type: self.content_type,
            headers: self.headers,
            get,
            post,
            files,
            body: self.body,
            body_error,
        }
    }
}

type DecodedBody = (QueryDict, HashMap<String, Vec<UploadedFile>>, Option<String>);

fn decode_body(content_type: Option<&str>, body: &[u8]) -> DecodedBody {
    let Some(ct) = content_type else {
        return (QueryDict::new(), HashMap::new(), None);
    };

    if ct.starts_with("application/x-www-form-urlencoded") {
        return (
            QueryDict::parse(&String::from_utf8_lossy(body)),
            HashMap::new(),
            None,
        );
    }

    if ct.starts_with("multipart/form-data") {
        let Some(boundary) = upload::extract_boundary(ct) else {
            return (
                QueryDict::new(),
                HashMap::new(),
                Some("Missing multipart boundary".to_string()),
            );
        };
        return match upload::parse_multipart(body, boundary) {
            Ok(multipart) => {
                let mut post = QueryDict::new_mutable();
                for (name, values) in &multipart.fields {
                    for value in values {
                        let _ = post.append(name, value);
                    }
                }
                (post, multipart.files, None)
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to decode multipart body");
                (QueryDict::new(), HashMap::new(), Some(err.to_string()))
            }
        };
    }

    (QueryDict::new(), HashMap::new(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let req = HttpRequest::builder().build();
        assert_eq!(req.method(), &Method::GET);
        assert_eq!(req.path(), "/");
        assert!(req.post().is_empty());
        assert!(req.files().is_empty());
        assert!(req.form().is_ok());
    }

    #[test]
    fn test_urlencoded_body() {
        let req = HttpRequest::builder()
            .method(Method::POST)
            .content_type("application/x-www-form-urlencoded; charset=utf-8")
            .body(b"a=1&b=two+words".to_vec())
            .build();
        assert_eq!(req.post().get("a"), Some("1"));
        assert_eq!(req.post().get("b"), Some("two words"));
    }

    #[test]
    fn test_form_helper_encodes_pairs() {
        let req = HttpRequest::builder()
            .method(Method::POST)
            .form([("xys.0", "value1"), ("xys.1", "value 2")])
            .build();
        assert_eq!(req.content_type(), Some("application/x-www-form-urlencoded"));
        assert_eq!(req.post().get("xys.0"), Some("value1"));
        assert_eq!(req.post().get("xys.1"), Some("value 2"));
    }

    #[test]
    fn test_multipart_body() {
        let body = "--B\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nHello\r\n\
                    --B\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
                    Content-Type: text/plain\r\n\r\nhi\r\n--B--\r\n";
        let req = HttpRequest::builder()
            .method(Method::POST)
            .content_type("multipart/form-data; boundary=B")
            .body(body.as_bytes().to_vec())
            .build();
        let (post, files) = req.form().unwrap();
        assert_eq!(post.get("title"), Some("Hello"));
        assert_eq!(files.get("doc").unwrap()[0].name, "a.txt");
    }

    #[test]
    fn test_multipart_without_boundary_is_bad_request() {
        let req = HttpRequest::builder()
            .method(Method::POST)
            .content_type("multipart/form-data")
            .build();
        assert!(matches!(req.form(), Err(FormError::BadRequest(_))));
    }

    #[test]
    fn test_from_parts() {
        let (parts, ()) = http::Request::builder()
            .method(Method::PUT)
            .uri("/profile?tab=1")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(())
            .unwrap()
            .into_parts();
        let req = HttpRequest::from_parts(parts, b"name=Ada".to_vec());
        assert_eq!(req.method(), &Method::PUT);
        assert_eq!(req.path(), "/profile");
        assert_eq!(req.get().get("tab"), Some("1"));
        assert_eq!(req.post().get("name"), Some("Ada"));
        assert!(req.headers().contains_key("content-type"));
    }
}
