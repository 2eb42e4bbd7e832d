//! Reference resolution
//!
//! Walks a component data tree and replaces every reference with the data
//! stored under its `_ref` path, recursively. The `_ref` key is kept next to
//! the merged fields so callers can see where data came from.
//!
//! Unrelated branches resolve concurrently. A reference's fetched document is
//! fully resolved before it is merged into its holder. Each branch tracks the
//! chain of references above it, which bounds both cycles and depth.
//!
//! Within one call every store key is read at most once; branches that reach
//! the same component share the read. Nothing is kept between calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared, try_join, try_join_all};
use kiln::config::DEFAULT_MAX_REFERENCE_DEPTH;
use kiln::{ComponentData, ComponentValue, Reference};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::storage::{StorageError, Store, parse_document};

type Fetch = Shared<BoxFuture<'static, std::result::Result<String, StorageError>>>;

/// Expands references against a store
#[derive(Clone)]
pub struct ReferenceResolver {
    store: Arc<dyn Store>,
    max_depth: usize,
}

impl ReferenceResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_REFERENCE_DEPTH,
        }
    }

    /// Bound the chain of nested references followed in one branch
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve every reference in `data`.
    ///
    /// Data without references comes back unchanged. Any failed lookup fails
    /// the whole call.
    pub async fn resolve_data_references(&self, data: ComponentData) -> Result<ComponentData> {
        self.resolve_staged(data, Vec::new()).await
    }

    /// Resolve `data` as if the `staged` documents, keyed by store key, were
    /// already in the store
    pub async fn resolve_staged<I>(&self, data: ComponentData, staged: I) -> Result<ComponentData>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if !data.has_references() {
            return Ok(data);
        }
        Pass::new(self, staged).resolve_data(data, Vec::new()).await
    }
}

/// State of a single resolution call
struct Pass<'r> {
    resolver: &'r ReferenceResolver,
    fetches: Mutex<HashMap<String, Fetch>>,
}

impl<'r> Pass<'r> {
    fn new<I>(resolver: &'r ReferenceResolver, staged: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let fetches = staged
            .into_iter()
            .map(|(key, raw)| {
                let ready = future::ready(Ok::<_, StorageError>(raw));
                (key, ready.boxed().shared())
            })
            .collect();
        Self {
            resolver,
            fetches: Mutex::new(fetches),
        }
    }

    fn resolve_data(
        &self,
        data: ComponentData,
        chain: Vec<String>,
    ) -> BoxFuture<'_, Result<ComponentData>> {
        async move {
            let fields = data.into_iter().map(|(key, value)| {
                let chain = chain.clone();
                async move {
                    let value = self.resolve_value(value, chain).await?;
                    Ok::<_, RegistryError>((key, value))
                }
            });
            let resolved: Vec<(String, ComponentValue)> = try_join_all(fields).await?;
            Ok::<_, RegistryError>(resolved.into_iter().collect())
        }
        .boxed()
    }

    fn resolve_value(
        &self,
        value: ComponentValue,
        chain: Vec<String>,
    ) -> BoxFuture<'_, Result<ComponentValue>> {
        async move {
            match value {
                ComponentValue::Scalar(scalar) => {
                    Ok::<_, RegistryError>(ComponentValue::Scalar(scalar))
                }
                ComponentValue::Object(data) => {
                    Ok(ComponentValue::Object(self.resolve_data(data, chain).await?))
                }
                ComponentValue::Sequence(items) => {
                    let items = items
                        .into_iter()
                        .map(|item| self.resolve_value(item, chain.clone()));
                    Ok(ComponentValue::Sequence(try_join_all(items).await?))
                }
                ComponentValue::Reference(reference) => {
                    let path = reference.path.clone();
                    self.resolve_reference(reference, chain)
                        .await
                        .map(ComponentValue::Reference)
                        .map_err(|source| RegistryError::Resolution {
                            reference: path,
                            source: Box::new(source),
                        })
                }
            }
        }
        .boxed()
    }

    async fn resolve_reference(&self, reference: Reference, chain: Vec<String>) -> Result<Reference> {
        let Reference { path, fields } = reference;
        let max_depth = self.resolver.max_depth;

        if chain.contains(&path) {
            let mut cycle = chain;
            cycle.push(path);
            return Err(RegistryError::ReferenceCycle { chain: cycle });
        }
        if chain.len() >= max_depth {
            return Err(RegistryError::DepthExceeded {
                reference: path,
                max_depth,
            });
        }

        debug!(reference = %path, depth = chain.len(), "resolving component reference");

        let mut nested = chain.clone();
        nested.push(path.clone());

        let fetched = async {
            let data = self.fetch(&path).await?;
            self.resolve_data(data, nested).await
        };
        let (mut fields, fetched) = try_join(self.resolve_data(fields, chain), fetched).await?;

        fields.merge(fetched);
        Ok(Reference { path, fields })
    }

    async fn fetch(&self, key: &str) -> Result<ComponentData> {
        let raw = self
            .pending(key)
            .await
            .map_err(|e| RegistryError::from_storage(key, e))?;
        parse_document(key, &raw)
    }

    // The first branch to ask for a key starts the read; later ones join it
    fn pending(&self, key: &str) -> Fetch {
        let mut fetches = self.fetches.lock().unwrap_or_else(PoisonError::into_inner);
        fetches
            .entry(key.to_string())
            .or_insert_with(|| {
                let store = self.resolver.store.clone();
                let key = key.to_string();
                async move { store.get(&key).await }.boxed().shared()
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::{Value, json};

    fn data(value: Value) -> ComponentData {
        ComponentData::try_from(value).unwrap()
    }

    fn resolver(entries: &[(&str, Value)]) -> ReferenceResolver {
        let store = MemoryStorage::with_entries(
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );
        ReferenceResolver::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_data_without_references_is_unchanged() {
        let resolver = resolver(&[]);
        let input = data(json!({"a": {"b": [1, "two", null]}, "c": true}));

        let result = resolver.resolve_data_references(input.clone()).await.unwrap();
        assert_eq!(result, input);
    }

    #[tokio::test]
    async fn test_own_fields_survive_unless_overwritten() {
        let resolver = resolver(&[("/components/b", json!({"g": "h", "title": "fetched"}))]);
        let input = data(json!({"a": {"_ref": "/components/b", "title": "own", "extra": 1}}));

        let result = resolver.resolve_data_references(input).await.unwrap();
        assert_eq!(
            result.to_value(),
            json!({"a": {"_ref": "/components/b", "g": "h", "title": "fetched", "extra": 1}})
        );
    }

    #[tokio::test]
    async fn test_fetched_ref_key_does_not_replace_holder_ref() {
        let resolver = resolver(&[("/components/b", json!({"_ref": "/components/x", "g": "h"}))]);
        let input = data(json!({"a": {"_ref": "/components/b"}}));

        let result = resolver.resolve_data_references(input).await.unwrap();
        assert_eq!(result.to_value(), json!({"a": {"_ref": "/components/b", "g": "h"}}));
    }

    #[tokio::test]
    async fn test_resolves_references_inside_sequences() {
        let resolver = resolver(&[
            ("/components/b", json!({"g": "h"})),
            ("/components/c", json!({"i": "j"})),
        ]);
        let input = data(json!({"list": [{"_ref": "/components/b"}, {"_ref": "/components/c"}, 3]}));

        let result = resolver.resolve_data_references(input).await.unwrap();
        assert_eq!(
            result.to_value(),
            json!({"list": [
                {"_ref": "/components/b", "g": "h"},
                {"_ref": "/components/c", "i": "j"},
                3
            ]})
        );
    }

    #[tokio::test]
    async fn test_same_component_in_sibling_branches_is_not_a_cycle() {
        let resolver = resolver(&[("/components/b", json!({"g": "h"}))]);
        let input = data(json!({"x": {"_ref": "/components/b"}, "y": {"_ref": "/components/b"}}));

        let result = resolver.resolve_data_references(input).await.unwrap();
        assert_eq!(
            result.to_value(),
            json!({"x": {"_ref": "/components/b", "g": "h"}, "y": {"_ref": "/components/b", "g": "h"}})
        );
    }

    #[tokio::test]
    async fn test_detects_cycles() {
        let resolver = resolver(&[
            ("/components/a", json!({"next": {"_ref": "/components/b"}})),
            ("/components/b", json!({"next": {"_ref": "/components/a"}})),
        ]);
        let input = data(json!({"root": {"_ref": "/components/a"}}));

        let err = resolver.resolve_data_references(input).await.unwrap_err();
        match err.root_cause() {
            RegistryError::ReferenceCycle { chain } => assert_eq!(
                chain,
                &vec![
                    "/components/a".to_string(),
                    "/components/b".to_string(),
                    "/components/a".to_string(),
                ]
            ),
            other => panic!("Expected ReferenceCycle, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enforces_max_depth() {
        let resolver = resolver(&[
            ("/components/a", json!({"next": {"_ref": "/components/b"}})),
            ("/components/b", json!({"next": {"_ref": "/components/c"}})),
            ("/components/c", json!({"end": true})),
        ])
        .with_max_depth(2);
        let input = data(json!({"root": {"_ref": "/components/a"}}));

        let err = resolver.resolve_data_references(input).await.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            RegistryError::DepthExceeded { reference, max_depth: 2 } if reference == "/components/c"
        ));
    }

    #[tokio::test]
    async fn test_shared_component_is_read_once_per_call() {
        let store = Arc::new(MemoryStorage::with_entries([
            ("/components/a", r#"{"x":{"_ref":"/components/d"}}"#),
            ("/components/b", r#"{"y":{"_ref":"/components/d"}}"#),
            ("/components/d", r#"{"leaf":true}"#),
        ]));
        let resolver = ReferenceResolver::new(store.clone());
        let input = data(json!({
            "left": {"_ref": "/components/a"},
            "right": {"_ref": "/components/b"},
            "again": [{"_ref": "/components/d"}, {"_ref": "/components/d"}]
        }));

        let result = resolver.resolve_data_references(input.clone()).await.unwrap();
        assert_eq!(
            result.to_value(),
            json!({
                "left": {"_ref": "/components/a", "x": {"_ref": "/components/d", "leaf": true}},
                "right": {"_ref": "/components/b", "y": {"_ref": "/components/d", "leaf": true}},
                "again": [
                    {"_ref": "/components/d", "leaf": true},
                    {"_ref": "/components/d", "leaf": true}
                ]
            })
        );
        assert_eq!(store.stats().gets, 3);

        // A new call reads again
        resolver.resolve_data_references(input).await.unwrap();
        assert_eq!(store.stats().gets, 6);
    }

    #[tokio::test]
    async fn test_staged_documents_shadow_the_store() {
        let store = Arc::new(MemoryStorage::with_entries([(
            "/components/b",
            r#"{"g":"stored"}"#,
        )]));
        let resolver = ReferenceResolver::new(store.clone());
        let input = data(json!({
            "a": {"_ref": "/components/b"},
            "c": {"_ref": "/components/new"}
        }));

        let result = resolver
            .resolve_staged(
                input,
                vec![
                    ("/components/b".to_string(), r#"{"g":"staged"}"#.to_string()),
                    ("/components/new".to_string(), r#"{"n":1}"#.to_string()),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            result.to_value(),
            json!({
                "a": {"_ref": "/components/b", "g": "staged"},
                "c": {"_ref": "/components/new", "n": 1}
            })
        );
        assert_eq!(store.stats().gets, 0);
    }

    #[tokio::test]
    async fn test_malformed_document_fails_resolution() {
        let store = MemoryStorage::with_entries([("/components/b", "{not json")]);
        let resolver = ReferenceResolver::new(Arc::new(store));
        let input = data(json!({"a": {"_ref": "/components/b"}}));

        let err = resolver.resolve_data_references(input).await.unwrap_err();
        match err {
            RegistryError::Resolution { reference, source } => {
                assert_eq!(reference, "/components/b");
                assert!(matches!(*source, RegistryError::MalformedDocument { .. }));
            }
            other => panic!("Expected Resolution error, got {:?}", other),
        }
    }
}
