#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};
use trellis::CascadeSummary;
use trellis::prelude::*;

pub const ORGANIZATIONS: &str = "organizations";
pub const STUDIOS: &str = "studios";
pub const TITLES: &str = "titles";

pub fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().unwrap_or_default()
}

pub struct Organization {
    pub id: String,
}

impl Organization {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }

    pub fn reference(&self) -> String {
        entity_ref("organization", &self.id)
    }
}

impl Entity for Organization {
    fn table_name(&self) -> &str {
        ORGANIZATIONS
    }

    fn key(&self) -> ItemKey {
        ItemKey::single("id", self.id.as_str())
    }

    fn entity_ref(&self) -> String {
        self.reference()
    }

    fn entity_type(&self) -> &str {
        "organization"
    }
}

/// A studio belongs to an organization; name and slug are unique per
/// organization.
pub struct Studio {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub slug: String,
}

impl Studio {
    pub fn new(id: &str, organization_id: &str, name: &str, slug: &str) -> Self {
        Self {
            id: id.to_string(),
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            slug: slug.to_string(),
        }
    }

    pub fn reference(&self) -> String {
        entity_ref("studio", &self.id)
    }

    pub fn attributes(&self) -> Attributes {
        attrs(json!({
            "organization_id": self.organization_id,
            "name": self.name,
            "slug": self.slug,
        }))
    }
}

impl Entity for Studio {
    fn table_name(&self) -> &str {
        STUDIOS
    }

    fn key(&self) -> ItemKey {
        ItemKey::single("id", self.id.as_str())
    }

    fn entity_ref(&self) -> String {
        self.reference()
    }

    fn entity_type(&self) -> &str {
        "studio"
    }

    fn parent(&self) -> Option<ParentLink> {
        Some(ParentLink::checked(
            entity_ref("organization", &self.organization_id),
            ORGANIZATIONS,
            ItemKey::single("id", self.organization_id.as_str()),
        ))
    }

    fn unique_fields(&self) -> Option<BTreeMap<String, String>> {
        Some(BTreeMap::from([
            ("name".to_string(), self.name.clone()),
            ("slug".to_string(), self.slug.clone()),
        ]))
    }
}

/// Titles are partitioned by studio and sorted by id.
pub struct Title {
    pub id: String,
    pub studio_id: String,
}

impl Title {
    pub fn new(id: &str, studio_id: &str) -> Self {
        Self {
            id: id.to_string(),
            studio_id: studio_id.to_string(),
        }
    }

    pub fn reference(&self) -> String {
        entity_ref("title", &self.id)
    }
}

impl Entity for Title {
    fn table_name(&self) -> &str {
        TITLES
    }

    fn key(&self) -> ItemKey {
        ItemKey::single("studio_id", self.studio_id.as_str()).with("id", self.id.as_str())
    }

    fn entity_ref(&self) -> String {
        self.reference()
    }

    fn entity_type(&self) -> &str {
        "title"
    }

    fn parent(&self) -> Option<ParentLink> {
        Some(ParentLink::checked(
            entity_ref("studio", &self.studio_id),
            STUDIOS,
            ItemKey::single("id", self.studio_id.as_str()),
        ))
    }
}

pub fn registry() -> RelationshipRegistry {
    let mut registry = RelationshipRegistry::new();
    registry.register(Relationship::new("organization", "studio", STUDIOS, "organization_id"));
    registry.register(Relationship::new("studio", "title", TITLES, "studio_id"));
    registry
}

pub struct Harness {
    pub backend: Arc<InMemoryBackingStore>,
    pub store: EntityStore,
    pub coordinator: CascadeCoordinator,
}

pub async fn harness(config: StoreConfig) -> Harness {
    harness_with_options(config, MemoryStoreOptions::default()).await
}

pub async fn harness_with_options(config: StoreConfig, options: MemoryStoreOptions) -> Harness {
    let backend = Arc::new(InMemoryBackingStore::with_options(options));
    let store = EntityStore::with_registry(backend.clone(), config, registry());

    backend
        .create_table(store.relationship_table_schema())
        .await
        .unwrap();
    backend.create_table(store.unique_table_schema()).await.unwrap();
    for table in [ORGANIZATIONS, STUDIOS] {
        backend
            .create_table(
                TableSchema::new(table, "id")
                    .with_ttl("ttl")
                    .with_change_stream(),
            )
            .await
            .unwrap();
    }
    backend
        .create_table(
            TableSchema::new(TITLES, "studio_id")
                .with_sort_key("id")
                .with_ttl("ttl")
                .with_change_stream(),
        )
        .await
        .unwrap();

    let coordinator = CascadeCoordinator::new(store.clone());
    Harness {
        backend,
        store,
        coordinator,
    }
}

impl Harness {
    /// Delivers change batches to the coordinator until the log is empty.
    ///
    /// A failed batch is put back on the log, like a stream consumer that
    /// reports the failure and gets the batch again.
    pub async fn settle(&self) -> Result<CascadeSummary> {
        let mut total = CascadeSummary::default();
        loop {
            let batch = self.backend.drain_changes().await;
            if batch.is_empty() {
                return Ok(total);
            }
            match self.coordinator.handle_batch(&batch).await {
                Ok(summary) => {
                    total.events += summary.events;
                    total.propagated += summary.propagated;
                    total.children += summary.children;
                    total.soft_failures += summary.soft_failures;
                }
                Err(err) => {
                    self.backend.redeliver(batch).await;
                    return Err(err);
                }
            }
        }
    }

    /// Organization `org`, its studios and `titles_per_studio` titles under
    /// each studio. Studio ids are `{org}-s{i}`, title ids `{studio}-t{j}`.
    pub async fn seed(&self, org: &str, studios: usize, titles_per_studio: usize) -> Vec<Studio> {
        self.store
            .create(&Organization::new(org), attrs(json!({"name": org})))
            .await
            .unwrap();

        let mut created = Vec::new();
        for i in 0..studios {
            let id = format!("{org}-s{i}");
            let studio = Studio::new(&id, org, &format!("Studio {i}"), &format!("studio-{i}"));
            self.store
                .create(&studio, studio.attributes())
                .await
                .unwrap();
            for j in 0..titles_per_studio {
                let title = Title::new(&format!("{id}-t{j}"), &id);
                self.store
                    .create(&title, attrs(json!({"name": format!("Title {j}")})))
                    .await
                    .unwrap();
            }
            created.push(studio);
        }
        created
    }

    /// Table contents as sorted JSON strings, for before/after comparisons.
    pub async fn snapshot(&self, table: &str) -> Vec<String> {
        let mut rows: Vec<String> = self
            .backend
            .scan_table(table)
            .await
            .unwrap()
            .iter()
            .map(|item| Value::Object(item.clone()).to_string())
            .collect();
        rows.sort();
        rows
    }

    pub fn tables(&self) -> Vec<String> {
        let config = self.store.config();
        vec![
            ORGANIZATIONS.to_string(),
            STUDIOS.to_string(),
            TITLES.to_string(),
            config.relationship_table.clone(),
            config.unique_table.clone(),
        ]
    }
}
