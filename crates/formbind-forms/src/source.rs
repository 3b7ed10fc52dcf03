//! Where submitted form data comes from.
//!
//! Fields never see a request directly. They read a [`FlatFormData`]
//! snapshot from a [`FormDataSource`], which keeps the forms layer
//! independent of any particular HTTP stack. [`HttpRequest`] implements
//! the trait; [`InMemorySource`] serves tests and programmatic use.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use formbind_core::utils::MultiValueDict;
use formbind_core::{FormResult, UploadedFile, Value};
use formbind_http::{HttpRequest, QueryDict};
use tokio::sync::OnceCell;

/// A flat multi-value mapping of submitted keys to values.
///
/// Text inputs are stored as [`Value::String`] and uploads as
/// [`Value::File`]. A key may carry several values (multi-selects,
/// repeated inputs); [`get`](Self::get) returns the last one.
#[derive(Debug, Clone, Default)]
pub struct FlatFormData {
    inner: MultiValueDict<String, Value>,
}

impl FlatFormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from decoded body fields and uploaded files.
    pub fn from_parts(fields: &QueryDict, files: &HashMap<String, Vec<UploadedFile>>) -> Self {
        let mut inner = MultiValueDict::new();
        for (key, values) in fields.iter() {
            for value in values {
                inner.append(key.clone(), Value::String(value.clone()));
            }
        }
        for (key, uploads) in files {
            for file in uploads {
                inner.append(key.clone(), Value::File(file.clone()));
            }
        }
        Self { inner }
    }

    /// Returns the last value submitted under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    /// Returns every value submitted under `key`.
    pub fn get_list(&self, key: &str) -> Option<&Vec<Value>> {
        self.inner.get_list(key)
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.append(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FlatFormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = Self::new();
        for (k, v) in iter {
            data.append(k, v);
        }
        data
    }
}

/// Something that can supply submitted form data.
#[async_trait]
pub trait FormDataSource: Send + Sync {
    /// Returns the decoded submission.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::BadRequest`](formbind_core::FormError::BadRequest)
    /// if the underlying body could not be decoded.
    async fn flat_form_data(&self) -> FormResult<Arc<FlatFormData>>;

    /// The request method, e.g. `"POST"`.
    fn method(&self) -> &str;
}

#[async_trait]
impl FormDataSource for HttpRequest {
    async fn flat_form_data(&self) -> FormResult<Arc<FlatFormData>> {
        let (fields, files) = self.form()?;
        Ok(Arc::new(FlatFormData::from_parts(fields, files)))
    }

    fn method(&self) -> &str {
        HttpRequest::method(self).as_str()
    }
}

#[async_trait]
impl<T: FormDataSource + ?Sized> FormDataSource for Arc<T> {
    async fn flat_form_data(&self) -> FormResult<Arc<FlatFormData>> {
        (**self).flat_form_data().await
    }

    fn method(&self) -> &str {
        (**self).method()
    }
}

/// A fixed submission held in memory.
///
/// # Examples
///
/// ```
/// use formbind_forms::source::{FormDataSource, InMemorySource};
///
/// let source = InMemorySource::post([("name", "Ada"), ("tags.0", "math")]);
/// assert_eq!(source.method(), "POST");
/// ```
#[derive(Debug, Clone)]
pub struct InMemorySource {
    method: String,
    data: Arc<FlatFormData>,
}

impl InMemorySource {
    pub fn new(method: impl Into<String>, data: FlatFormData) -> Self {
        Self {
            method: method.into(),
            data: Arc::new(data),
        }
    }

    /// A `POST` submission of string pairs.
    pub fn post<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::new("POST", pairs.into_iter().collect())
    }

    /// A `GET` request with no body.
    pub fn get() -> Self {
        Self::new("GET", FlatFormData::new())
    }
}

#[async_trait]
impl FormDataSource for InMemorySource {
    async fn flat_form_data(&self) -> FormResult<Arc<FlatFormData>> {
        Ok(Arc::clone(&self.data))
    }

    fn method(&self) -> &str {
        &self.method
    }
}

/// Decodes the wrapped source once and serves the cached snapshot
/// afterwards.
pub struct CachedSource<S> {
    inner: S,
    cache: OnceCell<Arc<FlatFormData>>,
}

impl<S: FormDataSource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: OnceCell::new(),
        }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: FormDataSource> FormDataSource for CachedSource<S> {
    async fn flat_form_data(&self) -> FormResult<Arc<FlatFormData>> {
        self.cache
            .get_or_try_init(|| async {
                tracing::trace!("decoding form data");
                self.inner.flat_form_data().await
            })
            .await
            .map(Arc::clone)
    }

    fn method(&self) -> &str {
        self.inner.method()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use formbind_core::FormError;

    use super::*;

    #[tokio::test]
    async fn test_http_request_source() {
        let request = HttpRequest::builder()
            .method(http::Method::POST)
            .form([("color", "red"), ("color", "blue"), ("name", "Ada")])
            .build();
        let data = request.flat_form_data().await.unwrap();
        assert_eq!(FormDataSource::method(&request), "POST");
        assert_eq!(data.get("name"), Some(&Value::from("Ada")));
        assert_eq!(data.get("color"), Some(&Value::from("blue")));
        assert_eq!(data.get_list("color").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_http_request_source_with_files() {
        let body = "--B\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
                    Content-Type: text/plain\r\n\r\nhi\r\n--B--\r\n";
        let request = HttpRequest::builder()
            .method(http::Method::POST)
            .content_type("multipart/form-data; boundary=B")
            .body(body.as_bytes().to_vec())
            .build();
        let data = request.flat_form_data().await.unwrap();
        assert_eq!(data.get("doc").and_then(Value::as_file).unwrap().name, "a.txt");
    }

    #[tokio::test]
    async fn test_bad_body_is_bad_request() {
        let request = HttpRequest::builder()
            .method(http::Method::POST)
            .content_type("multipart/form-data")
            .build();
        assert!(matches!(
            request.flat_form_data().await,
            Err(FormError::BadRequest(_))
        ));
    }

    #[test]
    fn test_in_memory_source() {
        let source = InMemorySource::post([("a", "1")]);
        let data = tokio_test::block_on(source.flat_form_data()).unwrap();
        assert_eq!(data.get("a"), Some(&Value::from("1")));
        assert_eq!(InMemorySource::get().method(), "GET");
    }

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FormDataSource for Counting {
        async fn flat_form_data(&self) -> FormResult<Arc<FlatFormData>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new([("k", "v")].into_iter().collect()))
        }

        fn method(&self) -> &str {
            "POST"
        }
    }

    #[tokio::test]
    async fn test_cached_source_decodes_once() {
        let cached = CachedSource::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let first = cached.flat_form_data().await.unwrap();
        let second = cached.flat_form_data().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.method(), "POST");
    }
}
