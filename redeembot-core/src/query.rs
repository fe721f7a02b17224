// File: redeembot-core/src/query.rs
//
// Ordered query-string building for Helix endpoints. Absent values are skipped and
// list values repeat their key (`id=a&id=b`), which is how Helix takes multiple ids.

use std::fmt;

use url::form_urlencoded;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn push_opt<V: ToString>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.push(key, v);
        }
        self
    }

    pub fn push_all<I, V>(&mut self, key: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        for v in values {
            self.push(key, v);
        }
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// All values for `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn encode(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.pairs {
            ser.append_pair(k, v);
        }
        ser.finish()
    }

    /// Parse a query string back into pairs. A leading `?` is ignored.
    pub fn parse(input: &str) -> Self {
        let input = input.strip_prefix('?').unwrap_or(input);
        Self {
            pairs: form_urlencoded::parse(input.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    /// `endpoint?query`, or just `endpoint` when there is nothing to append.
    pub fn append_to(&self, endpoint: &str) -> String {
        if self.is_empty() {
            endpoint.to_string()
        } else {
            format!("{}?{}", endpoint, self.encode())
        }
    }
}

impl fmt::Display for QueryString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl<K: ToString, V: ToString> FromIterator<(K, V)> for QueryString {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn skips_absent_values_and_repeats_lists() {
        let mut q = QueryString::new();
        q.push("broadcaster_id", "b1")
            .push_opt("sort", None::<&str>)
            .push_all("id", ["r1", "r2"])
            .push_opt("first", Some(5));
        assert_eq!(q.encode(), "broadcaster_id=b1&id=r1&id=r2&first=5");
        assert_eq!(q.get_all("id"), vec!["r1", "r2"]);
    }

    #[test]
    fn encode_then_parse_keeps_the_key_value_set() {
        let mut q = QueryString::new();
        q.push("broadcaster_id", "b1")
            .push("status", "UNFULFILLED")
            .push("first", "5");

        let encoded = q.encode();
        assert_eq!(encoded, "broadcaster_id=b1&status=UNFULFILLED&first=5");

        let parsed = QueryString::parse(&format!("?{}", encoded));
        let a: BTreeSet<_> = q.pairs().iter().cloned().collect();
        let b: BTreeSet<_> = parsed.pairs().iter().cloned().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn values_are_percent_encoded() {
        let q: QueryString = [("after", "a b&c")].into_iter().collect();
        assert_eq!(q.encode(), "after=a+b%26c");
        assert_eq!(QueryString::parse(&q.encode()), q);
    }

    #[test]
    fn append_to_leaves_bare_endpoint_when_empty() {
        let q = QueryString::new();
        assert_eq!(q.append_to("/x"), "/x");
    }
}
