//! Versioned writes
//!
//! Every write lands as a single atomic batch. Component data the caller
//! embeds inside a reference is written to the key that reference addresses,
//! and publishing moves the latest key along with the published one.

use std::iter;
use std::sync::Arc;

use kiln::{ComponentData, ComponentPath, ComponentValue, Reference, VersionLabel};
use tracing::{debug, info};

use crate::error::{RegistryError, Result};
use crate::storage::{BatchOp, Store};

/// A write, split into the documents it stores
#[derive(Debug, Clone, PartialEq)]
pub struct PutPlan {
    path: ComponentPath,
    label: VersionLabel,
    root: ComponentData,
    children: Vec<(String, String)>,
}

impl PutPlan {
    /// Split embedded component data out of `data`.
    ///
    /// Every reference carrying fields becomes a child document stored under
    /// the key its `_ref` addresses, and is collapsed to a bare reference in
    /// the root. References without fields are left alone.
    pub fn new(path: ComponentPath, label: VersionLabel, data: ComponentData) -> Result<Self> {
        let mut children = Vec::new();
        let root = split_embedded(data, &mut children)?;
        Ok(Self {
            path,
            label,
            root,
            children,
        })
    }

    pub fn path(&self) -> &ComponentPath {
        &self.path
    }

    pub fn label(&self) -> &VersionLabel {
        &self.label
    }

    /// The document written for the target component
    pub fn root(&self) -> &ComponentData {
        &self.root
    }

    /// Embedded documents as `(store key, JSON)`, in the order they were found
    pub fn children(&self) -> &[(String, String)] {
        &self.children
    }

    /// Replace the root document; it is written as given, without splitting
    pub fn with_root(mut self, root: ComponentData) -> Self {
        self.root = root;
        self
    }

    /// Child documents first, then the root under the label and each of its
    /// bookkeeping labels
    pub fn into_operations(self) -> Vec<BatchOp> {
        let document = self.root.to_json();
        let labels = iter::once(&self.label).chain(self.label.bookkeeping());

        let mut ops: Vec<BatchOp> = self
            .children
            .into_iter()
            .map(|(key, child)| BatchOp::put(key, child))
            .collect();
        ops.extend(labels.map(|label| BatchOp::put(self.path.key_for(label), document.clone())));
        ops
    }
}

/// Writes component data under version labels
#[derive(Clone)]
pub struct VersionedWriter {
    store: Arc<dyn Store>,
}

impl VersionedWriter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Write `data` as the latest version of `reference`
    pub async fn put_latest(&self, reference: &str, data: ComponentData) -> Result<()> {
        self.put_label(reference, data, &VersionLabel::Latest).await
    }

    /// Write `data` as the published version of `reference`
    pub async fn put_published(&self, reference: &str, data: ComponentData) -> Result<()> {
        self.put_label(reference, data, &VersionLabel::Published).await
    }

    /// Write `data` under the named tag
    pub async fn put_tag(&self, reference: &str, data: ComponentData, tag: &str) -> Result<()> {
        let label = VersionLabel::tag(tag)?;
        self.put_label(reference, data, &label).await
    }

    /// Write `data` under `label` in one batch
    pub async fn put_label(
        &self,
        reference: &str,
        data: ComponentData,
        label: &VersionLabel,
    ) -> Result<()> {
        let path = ComponentPath::parse(reference)?;
        let plan = PutPlan::new(path, label.clone(), data)?;
        self.commit(reference, plan).await
    }

    /// Write `data` under the label named by the reference's version and
    /// return the root document written.
    ///
    /// No version (or `latest`) writes latest, `published` publishes, and
    /// anything else is a tag. `@list` is rejected before touching the store.
    pub async fn put_default_behavior(
        &self,
        reference: &str,
        data: ComponentData,
    ) -> Result<ComponentData> {
        let path = ComponentPath::parse(reference)?;
        let label = path.write_label()?;
        let plan = PutPlan::new(path, label, data)?;
        let written = plan.root().clone();
        self.commit(reference, plan).await?;
        Ok(written)
    }

    /// Apply a prepared plan as one batch
    pub async fn commit(&self, reference: &str, plan: PutPlan) -> Result<()> {
        let label = plan.label().clone();
        let ops = plan.into_operations();
        info!(
            reference,
            label = %label,
            operations = ops.len(),
            "writing component"
        );

        self.store
            .batch(ops)
            .await
            .map_err(|source| RegistryError::Upstream {
                reference: reference.to_string(),
                source,
            })
    }
}

/// Build the batch that writes `data` to `path` under `label`
pub fn put_operations(
    path: &ComponentPath,
    data: ComponentData,
    label: &VersionLabel,
) -> Result<Vec<BatchOp>> {
    Ok(PutPlan::new(path.clone(), label.clone(), data)?.into_operations())
}

fn split_embedded(
    data: ComponentData,
    children: &mut Vec<(String, String)>,
) -> Result<ComponentData> {
    data.into_iter()
        .map(|(key, value)| Ok((key, split_value(value, children)?)))
        .collect()
}

fn split_value(value: ComponentValue, children: &mut Vec<(String, String)>) -> Result<ComponentValue> {
    let value = match value {
        ComponentValue::Scalar(scalar) => ComponentValue::Scalar(scalar),
        ComponentValue::Object(data) => ComponentValue::Object(split_embedded(data, children)?),
        ComponentValue::Sequence(items) => ComponentValue::Sequence(
            items
                .into_iter()
                .map(|item| split_value(item, children))
                .collect::<Result<Vec<_>>>()?,
        ),
        ComponentValue::Reference(reference) if reference.is_bare() => {
            ComponentValue::Reference(reference)
        }
        ComponentValue::Reference(Reference { path, fields }) => {
            let child = ComponentPath::parse(&path)?;
            let key = child.key_for(&child.write_label()?);
            let fields = split_embedded(fields, children)?;
            debug!(reference = %path, key = %key, "splitting embedded component data");
            children.push((key, fields.to_json()));
            ComponentValue::reference(path)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::{Value, json};

    fn data(value: Value) -> ComponentData {
        ComponentData::try_from(value).unwrap()
    }

    fn keys(ops: &[BatchOp]) -> Vec<&str> {
        ops.iter().map(BatchOp::key).collect()
    }

    #[test]
    fn test_latest_writes_base_key_only() {
        let path = ComponentPath::parse("/components/article/instances/a").unwrap();
        let ops = put_operations(&path, data(json!({"title": "x"})), &VersionLabel::Latest).unwrap();

        assert_eq!(keys(&ops), vec!["/components/article/instances/a"]);
    }

    #[test]
    fn test_publish_also_writes_latest() {
        let path = ComponentPath::parse("/components/article/instances/a").unwrap();
        let ops =
            put_operations(&path, data(json!({"title": "x"})), &VersionLabel::Published).unwrap();

        assert_eq!(
            keys(&ops),
            vec![
                "/components/article/instances/a@published",
                "/components/article/instances/a",
            ]
        );
    }

    #[test]
    fn test_embedded_data_goes_to_the_referenced_key() {
        let path = ComponentPath::parse("/components/page").unwrap();
        let input = data(json!({
            "main": [
                {"_ref": "/components/para/instances/p1", "text": "hi"},
                {"_ref": "/components/para/instances/p2@draft", "text": "later"}
            ],
            "head": {"_ref": "/components/meta"}
        }));

        let ops = put_operations(&path, input, &VersionLabel::tag("v1").unwrap()).unwrap();

        assert_eq!(
            ops,
            vec![
                BatchOp::put("/components/para/instances/p1", r#"{"text":"hi"}"#),
                BatchOp::put("/components/para/instances/p2@draft", r#"{"text":"later"}"#),
                BatchOp::put(
                    "/components/page@v1",
                    r#"{"main":[{"_ref":"/components/para/instances/p1"},{"_ref":"/components/para/instances/p2@draft"}],"head":{"_ref":"/components/meta"}}"#
                ),
            ]
        );
    }

    #[test]
    fn test_children_are_not_copied_to_bookkeeping_labels() {
        let path = ComponentPath::parse("/components/page").unwrap();
        let input = data(json!({"hero": {"_ref": "/components/image/instances/i1", "src": "a.png"}}));

        let ops = put_operations(&path, input, &VersionLabel::Published).unwrap();

        assert_eq!(
            keys(&ops),
            vec![
                "/components/image/instances/i1",
                "/components/page@published",
                "/components/page",
            ]
        );
    }

    #[test]
    fn test_replaced_root_is_not_split_again() {
        let path = ComponentPath::parse("/components/page").unwrap();
        let plan = PutPlan::new(
            path,
            VersionLabel::Published,
            data(json!({"by": {"_ref": "/components/author/instances/jo"}})),
        )
        .unwrap();
        assert!(plan.children().is_empty());

        let resolved = data(json!({"by": {"_ref": "/components/author/instances/jo", "name": "Jo"}}));
        let ops = plan.with_root(resolved).into_operations();

        assert_eq!(
            keys(&ops),
            vec!["/components/page@published", "/components/page"]
        );
    }

    #[test]
    fn test_embedded_data_under_invalid_reference_is_rejected() {
        let path = ComponentPath::parse("/components/page").unwrap();

        for input in [
            json!({"a": {"_ref": "/pages/home", "x": 1}}),
            json!({"a": {"_ref": "/components/b@list", "x": 1}}),
        ] {
            let err = put_operations(&path, data(input), &VersionLabel::Latest).unwrap_err();
            assert!(err.is_validation());
        }
    }

    #[tokio::test]
    async fn test_put_default_behavior_dispatches_on_version() {
        let store = Arc::new(MemoryStorage::new());
        let writer = VersionedWriter::new(store.clone());

        writer
            .put_default_behavior("/components/a@published", data(json!({"n": 1})))
            .await
            .unwrap();
        writer
            .put_default_behavior("/components/b@latest", data(json!({"n": 2})))
            .await
            .unwrap();
        writer
            .put_default_behavior("/components/c@draft", data(json!({"n": 3})))
            .await
            .unwrap();

        assert_eq!(
            store.keys(),
            vec![
                "/components/a".to_string(),
                "/components/a@published".to_string(),
                "/components/b".to_string(),
                "/components/c@draft".to_string(),
            ]
        );
        assert_eq!(store.stats().batches, 3);
    }

    #[tokio::test]
    async fn test_list_is_rejected_before_io() {
        let store = Arc::new(MemoryStorage::new());
        let writer = VersionedWriter::new(store.clone());

        let err = writer
            .put_default_behavior("/components/whatever@list", ComponentData::new())
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(store.stats(), Default::default());
    }

    #[tokio::test]
    async fn test_invalid_tag_is_rejected() {
        let writer = VersionedWriter::new(Arc::new(MemoryStorage::new()));

        let err = writer
            .put_tag("/components/a", ComponentData::new(), "bad tag")
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
