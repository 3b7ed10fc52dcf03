//! Query string dictionary for submitted form data.
//!
//! [`QueryDict`] wraps [`MultiValueDict`] and is immutable by default: data
//! decoded from a request should not be edited in place by form code.

use formbind_core::utils::MultiValueDict;
use formbind_core::{FormError, FormResult};

/// An immutable-by-default dictionary for query string and form data.
///
/// # Examples
///
/// ```
/// use formbind_http::QueryDict;
///
/// let qd = QueryDict::parse("tags.0=red&tags.1=blue&name=Ada+Lovelace");
/// assert_eq!(qd.get("tags.1"), Some("blue"));
/// assert_eq!(qd.get("name"), Some("Ada Lovelace"));
///
/// let mut mutable = QueryDict::new_mutable();
/// mutable.set("name", "Grace").unwrap();
/// assert_eq!(mutable.get("name"), Some("Grace"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryDict {
    data: MultiValueDict<String, String>,
    mutable: bool,
}

impl QueryDict {
    /// Creates a new, empty, immutable `QueryDict`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, empty, mutable `QueryDict`.
    pub fn new_mutable() -> Self {
        Self {
            data: MultiValueDict::new(),
            mutable: true,
        }
    }

    /// Parses an `application/x-www-form-urlencoded` string into an
    /// immutable `QueryDict`. Repeated keys keep every value in order.
    pub fn parse(query_string: &str) -> Self {
        let data = query_string
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (percent_decode(key), percent_decode(value))
            })
            .collect();

        Self {
            data,
            mutable: false,
        }
    }

    /// Returns the last value for the given key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Returns all values for the given key.
    pub fn get_list(&self, key: &str) -> Option<&Vec<String>> {
        self.data.get_list(key)
    }

    /// Sets a single value for the given key, replacing any existing values.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::SuspiciousOperation`] if this `QueryDict` is immutable.
    pub fn set(&mut self, key: &str, value: &str) -> FormResult<()> {
        self.ensure_mutable()?;
        self.data.set(key.to_string(), value.to_string());
        Ok(())
    }

    /// Appends a value to the list for the given key.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::SuspiciousOperation`] if this `QueryDict` is immutable.
    pub fn append(&mut self, key: &str, value: &str) -> FormResult<()> {
        self.ensure_mutable()?;
        self.data.append(key.to_string(), value.to_string());
        Ok(())
    }

    /// Encodes this `QueryDict` as a url-encoded string, keys in the order
    /// they were first added.
    pub fn urlencode(&self) -> String {
        self.data
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .map(move |value| format!("{}={}", percent_encode(key), percent_encode(value)))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Returns `true` if this `QueryDict` is mutable.
    pub const fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the `QueryDict` contains no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if the specified key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns an iterator over the keys in submission order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Returns an iterator over `(key, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.data.iter()
    }

    fn ensure_mutable(&self) -> FormResult<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(FormError::SuspiciousOperation(
                "This QueryDict instance is immutable".to_string(),
            ))
        }
    }
}

/// Decodes a form-encoded component: `+` becomes a space, then percent
/// sequences are decoded (lossily for invalid UTF-8).
fn percent_decode(input: &str) -> String {
    let plus_decoded = input.replace('+', " ");
    percent_encoding::percent_decode_str(&plus_decoded)
        .decode_utf8_lossy()
        .into_owned()
}

fn percent_encode(input: &str) -> String {
    percent_encoding::utf8_percent_encode(input, percent_encoding::NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_empty() {
        let qd = QueryDict::new();
        assert!(qd.is_empty());
        assert!(!qd.is_mutable());
    }

    #[test]
    fn test_parse_dotted_keys() {
        let qd = QueryDict::parse("sample.name=John+&sample.age=30");
        assert_eq!(qd.get("sample.name"), Some("John "));
        assert_eq!(qd.get("sample.age"), Some("30"));
        assert_eq!(qd.len(), 2);
    }

    #[test]
    fn test_parse_multiple_values() {
        let qd = QueryDict::parse("color=red&color=green");
        assert_eq!(qd.get("color"), Some("green"));
        assert_eq!(
            qd.get_list("color"),
            Some(&vec!["red".to_string(), "green".to_string()])
        );
    }

    #[test]
    fn test_parse_percent_encoded() {
        let qd = QueryDict::parse("email=a%40b.com&empty=&flag");
        assert_eq!(qd.get("email"), Some("a@b.com"));
        assert_eq!(qd.get("empty"), Some(""));
        assert_eq!(qd.get("flag"), Some(""));
    }

    #[test]
    fn test_parse_skips_empty_pairs() {
        let qd = QueryDict::parse("&&a=1&");
        assert_eq!(qd.len(), 1);
    }

    #[test]
    fn test_immutable_rejects_writes() {
        let mut qd = QueryDict::parse("a=1");
        assert!(matches!(
            qd.set("a", "2"),
            Err(FormError::SuspiciousOperation(_))
        ));
        assert!(qd.append("a", "2").is_err());
    }

    #[test]
    fn test_mutable_set_replaces_values() {
        let mut qd = QueryDict::new_mutable();
        qd.append("a", "1").unwrap();
        qd.append("a", "2").unwrap();
        qd.set("a", "3").unwrap();
        assert_eq!(qd.get_list("a"), Some(&vec!["3".to_string()]));
    }

    #[test]
    fn test_urlencode_keeps_key_order() {
        let mut qd = QueryDict::new_mutable();
        qd.append("b", "x y").unwrap();
        qd.append("a", "1").unwrap();
        qd.append("b", "z").unwrap();
        assert_eq!(qd.urlencode(), "b=x%20y&b=z&a=1");
    }
}
