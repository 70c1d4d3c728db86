//! Property collection over the inventory.
//!
//! A listing is one container view plus one retrieval call, however large the
//! inventory is. Results are flattened into [`PropertyRecord`]s that only
//! contain attributes the endpoint actually returned.

use crate::error::{CoreError, Result};
use crate::session::Session;
use guestrun_vim::{
    kinds, ManagedObjectRef, ObjectContent, ObjectSpec, PropertyFilterSpec, PropertySpec,
    PropertyValue, TraversalSpec,
};
use serde::Serialize;
use std::collections::HashMap;

/// Reserved record key holding the object's own reference.
pub const OBJ_KEY: &str = "obj";

/// Name of the traversal from a container view to its members.
pub const TRAVERSE_ENTITIES: &str = "traverseEntities";

/// Attributes fetched by [`PropertyCollector::list_vms`].
pub const VM_PROPERTIES: &[&str] = &[
    "name",
    "config.uuid",
    "config",
    "config.hardware.numCPU",
    "config.hardware.memoryMB",
    "guest.guestState",
    "config.guestFullName",
    "config.guestId",
    "config.version",
];

/// Attributes fetched by [`PropertyCollector::describe_vm`].
pub const VM_SUMMARY_PROPERTIES: &[&str] = &[
    "name",
    "config.hardware.numCPU",
    "config.hardware.memoryMB",
    "config.guestFullName",
    "guest.guestState",
];

static ABSENT: PropertyValue = PropertyValue::Absent;

/// What to collect: attributes of every `target_type` object under `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyQuery {
    /// Container the view is scoped to.
    pub root: ManagedObjectRef,
    /// Object type to collect.
    pub target_type: String,
    /// Attribute paths; empty means all attributes.
    pub attributes: Vec<String>,
    /// Attach each object's reference under [`OBJ_KEY`].
    pub include_handles: bool,
}

impl PropertyQuery {
    /// Query every attribute of `target_type` objects under `root`.
    pub fn new(root: ManagedObjectRef, target_type: impl Into<String>) -> Self {
        Self {
            root,
            target_type: target_type.into(),
            attributes: Vec::new(),
            include_handles: false,
        }
    }

    /// Restrict the query to the given attribute paths.
    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Attach object references to records.
    pub fn include_handles(mut self, include: bool) -> Self {
        self.include_handles = include;
        self
    }
}

/// Attributes returned for one object.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PropertyRecord {
    properties: HashMap<String, PropertyValue>,
}

impl PropertyRecord {
    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Look up an attribute, resolving missing keys to [`PropertyValue::Absent`].
    pub fn value(&self, name: &str) -> &PropertyValue {
        self.properties.get(name).unwrap_or(&ABSENT)
    }

    /// Check if an attribute was returned.
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// The originating object, when handles were requested.
    pub fn object_ref(&self) -> Option<&ManagedObjectRef> {
        self.get(OBJ_KEY).and_then(PropertyValue::as_reference)
    }

    /// Returned attribute names, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// True when nothing was returned for the object.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    fn insert(&mut self, name: String, value: PropertyValue) {
        self.properties.insert(name, value);
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyRecord {
    fn from_iter<T: IntoIterator<Item = (String, PropertyValue)>>(iter: T) -> Self {
        Self {
            properties: iter.into_iter().collect(),
        }
    }
}

/// Basic facts about a virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VmSummary {
    /// Display name.
    pub name: Option<String>,
    /// Managed object id, e.g. `vm-42`.
    pub moid: Option<String>,
    /// Virtual CPU count.
    pub num_cpu: Option<i64>,
    /// Configured memory in MiB.
    pub memory_mb: Option<i64>,
    /// Guest OS as configured.
    pub guest_full_name: Option<String>,
    /// Guest tools' view of the guest OS state, e.g. `running`.
    pub guest_state: Option<String>,
}

impl VmSummary {
    /// Read the summary attributes out of a record; missing ones stay `None`.
    pub fn from_record(record: &PropertyRecord) -> Self {
        let text = |name: &str| record.value(name).as_str().map(str::to_string);
        Self {
            name: text("name"),
            moid: record.object_ref().map(|mor| mor.value.clone()),
            num_cpu: record.value("config.hardware.numCPU").as_i64(),
            memory_mb: record.value("config.hardware.memoryMB").as_i64(),
            guest_full_name: text("config.guestFullName"),
            guest_state: text("guest.guestState"),
        }
    }
}

/// Build the filter for collecting `query` through `view`.
///
/// The view itself is skipped; its `view` property is traversed so every
/// member object is visited.
pub fn build_filter_spec(view: &ManagedObjectRef, query: &PropertyQuery) -> PropertyFilterSpec {
    let traversal = TraversalSpec {
        name: TRAVERSE_ENTITIES.to_string(),
        kind: kinds::CONTAINER_VIEW.to_string(),
        path: "view".to_string(),
        skip: false,
    };

    PropertyFilterSpec {
        object_set: vec![ObjectSpec {
            obj: view.clone(),
            skip: true,
            select_set: vec![traversal],
        }],
        prop_set: vec![property_spec(&query.target_type, &query.attributes)],
    }
}

fn property_spec(kind: &str, attributes: &[String]) -> PropertySpec {
    PropertySpec {
        kind: kind.to_string(),
        all: attributes.is_empty(),
        path_set: attributes.to_vec(),
    }
}

/// Flatten retrieval results into records.
///
/// Attributes that were not returned are left out. When `requested` is
/// non-empty, anything outside it is dropped as well.
pub fn flatten(
    contents: Vec<ObjectContent>,
    requested: &[String],
    include_handles: bool,
) -> Vec<PropertyRecord> {
    contents
        .into_iter()
        .map(|content| {
            if !content.missing_set.is_empty() {
                tracing::trace!(
                    object = %content.obj,
                    missing = content.missing_set.len(),
                    "Object has missing properties"
                );
            }

            let mut record = PropertyRecord::default();
            for prop in content.prop_set {
                if prop.val.is_absent() {
                    continue;
                }
                if !requested.is_empty() && !requested.contains(&prop.name) {
                    continue;
                }
                record.insert(prop.name, prop.val);
            }
            if include_handles {
                record.insert(OBJ_KEY.to_string(), PropertyValue::Reference(content.obj));
            }
            record
        })
        .collect()
}

/// Inventory queries against one session.
#[derive(Debug, Clone)]
pub struct PropertyCollector {
    session: Session,
}

impl PropertyCollector {
    /// Create a collector for `session`.
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Collect attributes of every `query.target_type` object under `query.root`.
    ///
    /// Transport failures propagate unchanged; listing is cheap to retry as a whole.
    pub async fn list_objects(&self, query: &PropertyQuery) -> Result<Vec<PropertyRecord>> {
        let start = std::time::Instant::now();
        let service = self.session.service();
        let content = self.session.content();
        tracing::debug!(
            root = %query.root,
            target_type = %query.target_type,
            attributes = query.attributes.len(),
            "Listing objects"
        );

        let view = service
            .create_container_view(
                &content.view_manager,
                &query.root,
                std::slice::from_ref(&query.target_type),
                true,
            )
            .await?;

        let spec = build_filter_spec(&view, query);
        let retrieved = service
            .retrieve_contents(&content.property_collector, std::slice::from_ref(&spec))
            .await;

        if let Err(e) = service.destroy_view(&view).await {
            tracing::warn!(view = %view, error = %e, "Failed to destroy container view");
        }

        let records = flatten(retrieved?, &query.attributes, query.include_handles);
        tracing::info!(
            target_type = %query.target_type,
            count = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Objects listed"
        );
        Ok(records)
    }

    /// List every virtual machine under the root folder with [`VM_PROPERTIES`]
    /// and object references attached.
    pub async fn list_vms(&self) -> Result<Vec<PropertyRecord>> {
        let query = PropertyQuery::new(
            self.session.content().root_folder.clone(),
            kinds::VIRTUAL_MACHINE,
        )
        .attributes(VM_PROPERTIES.iter().copied())
        .include_handles(true);
        self.list_objects(&query).await
    }

    /// Fetch the summary attributes of a single virtual machine.
    pub async fn describe_vm(&self, vm: &ManagedObjectRef) -> Result<VmSummary> {
        tracing::debug!(vm = %vm, "Describing VM");
        let requested: Vec<String> = VM_SUMMARY_PROPERTIES.iter().map(|s| s.to_string()).collect();
        let spec = PropertyFilterSpec {
            object_set: vec![ObjectSpec {
                obj: vm.clone(),
                skip: false,
                select_set: Vec::new(),
            }],
            prop_set: vec![property_spec(kinds::VIRTUAL_MACHINE, &requested)],
        };

        let contents = self
            .session
            .service()
            .retrieve_contents(
                &self.session.content().property_collector,
                std::slice::from_ref(&spec),
            )
            .await?;

        flatten(contents, &requested, true)
            .first()
            .map(VmSummary::from_record)
            .ok_or_else(|| CoreError::ObjectNotFound(vm.clone()))
    }
}
