/// Lazily populated, mutation-tracking resource objects
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{LinodeClient, PathContext};
use crate::error::{Error, Result};

pub mod id;
pub mod property;

pub use self::id::ResourceId;
pub use self::property::{find_property, DerivedClass, Property, PropertyTable};

/// Timestamp format used by the Linode API
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Scope marker for kinds addressed by their own identifier only
#[derive(Debug)]
pub struct RootScope;

/// Scope marker for kinds addressed under a parent object
#[derive(Debug)]
pub struct DerivedScope;

/// Static description of one kind of API object
pub trait ResourceKind {
    /// Human readable kind name, used in errors and logs
    const NAME: &'static str;
    /// Path template with `{id}` and, for derived kinds, a parent placeholder
    const API_ENDPOINT: &'static str;
    const PROPERTIES: PropertyTable;
    /// Name of the property holding the object's own identifier
    const ID_ATTRIBUTE: &'static str = "id";

    /// Either [`RootScope`] or [`DerivedScope`]
    type Scope;
    /// Memoized values beyond the snapshot; reset by `invalidate`
    type Cache: Default + fmt::Debug;
}

/// A kind living under a parent object, e.g. a node pool under a cluster
pub trait DerivedKind: ResourceKind<Scope = DerivedScope> {
    type Parent: ResourceKind;
    /// Name of the identifier property holding the parent's id
    const PARENT_ID_NAME: &'static str;
    /// Collection path below the parent's endpoint
    const DERIVED_URL_PATH: &'static str;
}

/// A property value after descriptor-driven coercion
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Json(Value),
    DateTime(Option<DateTime<Utc>>),
    /// Reference to another object by slug; nothing is fetched
    Slug {
        kind: &'static str,
        id: Option<ResourceId>,
    },
    /// Raw items of a derived collection
    Derived {
        kind: &'static str,
        items: Vec<Value>,
    },
}

impl PropertyValue {
    /// Back to plain JSON
    ///
    /// Datetimes come out as RFC 3339 so they deserialize into `DateTime<Utc>`.
    pub fn into_json(self) -> Value {
        match self {
            PropertyValue::Json(value) => value,
            PropertyValue::DateTime(Some(dt)) => Value::from(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            PropertyValue::DateTime(None) => Value::Null,
            PropertyValue::Slug { id, .. } => id.map(|id| id.to_json()).unwrap_or(Value::Null),
            PropertyValue::Derived { items, .. } => Value::Array(items),
        }
    }
}

/// Parse an API timestamp; RFC 3339 is accepted as well
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// An API object of kind `K`
///
/// Addressed by an identifier (plus a parent identifier for derived kinds)
/// and the endpoint template of `K`. Holds the last JSON snapshot fetched
/// from the API and a set of pending local writes. Reading a property
/// fetches the snapshot on first use; writing a property only touches
/// pending state until [`Resource::save`] is called.
pub struct Resource<K: ResourceKind> {
    client: LinodeClient,
    id: ResourceId,
    parent_id: Option<ResourceId>,
    raw: Option<Map<String, Value>>,
    pending: BTreeMap<String, Value>,
    fetched_at: Option<Instant>,
    derived: HashMap<&'static str, Vec<Value>>,
    pub(crate) cache: K::Cache,
}

impl<K: ResourceKind> fmt::Debug for Resource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(K::NAME)
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("populated", &self.raw.is_some())
            .field("pending", &self.pending)
            .field("cache", &self.cache)
            .finish()
    }
}

impl<K: ResourceKind> PathContext for Resource<K> {
    fn identifier(&self) -> String {
        self.id.to_string()
    }

    fn parent_identifier(&self) -> Option<String> {
        self.parent_id.as_ref().map(ResourceId::to_string)
    }
}

impl<K: ResourceKind<Scope = RootScope>> Resource<K> {
    /// An empty object; the first property read fetches it
    pub fn new(client: LinodeClient, id: impl Into<ResourceId>) -> Self {
        Self::from_parts(client, id.into(), None, None)
    }

    /// An object pre-populated from a listing or creation response
    pub fn from_json(client: LinodeClient, id: impl Into<ResourceId>, json: Value) -> Self {
        Self::from_parts(client, id.into(), None, Some(json))
    }

    /// Read the whole collection this kind lives in
    pub async fn list(client: &LinodeClient) -> Result<Vec<Self>> {
        let collection = K::API_ENDPOINT
            .strip_suffix("/{id}")
            .ok_or_else(|| Error::Config(format!("{} has no collection endpoint", K::NAME)))?;

        let items = client.get_all(collection, None).await?;
        items
            .into_iter()
            .map(|item| {
                let id = ResourceId::from_json(&item[K::ID_ATTRIBUTE])
                    .ok_or_else(|| Error::unexpected(format!("{} listing item without identifier", K::NAME), &item))?;
                Ok(Self::from_json(client.clone(), id, item))
            })
            .collect()
    }
}

impl<K: DerivedKind> Resource<K> {
    /// An empty object under `parent_id`; the parent id is never inferred
    pub fn new_derived(
        client: LinodeClient,
        id: impl Into<ResourceId>,
        parent_id: impl Into<ResourceId>,
    ) -> Self {
        Self::from_parts(client, id.into(), Some(parent_id.into()), None)
    }

    /// An object under `parent_id`, pre-populated from a response
    pub fn derived_from_json(
        client: LinodeClient,
        id: impl Into<ResourceId>,
        parent_id: impl Into<ResourceId>,
        json: Value,
    ) -> Self {
        Self::from_parts(client, id.into(), Some(parent_id.into()), Some(json))
    }
}

impl<K: ResourceKind> Resource<K> {
    fn from_parts(
        client: LinodeClient,
        id: ResourceId,
        parent_id: Option<ResourceId>,
        json: Option<Value>,
    ) -> Self {
        let mut resource = Self {
            client,
            id,
            parent_id,
            raw: None,
            pending: BTreeMap::new(),
            fetched_at: None,
            derived: HashMap::new(),
            cache: K::Cache::default(),
        };
        if let Some(Value::Object(map)) = json {
            resource.apply_snapshot(map);
        }
        resource
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&ResourceId> {
        self.parent_id.as_ref()
    }

    pub fn client(&self) -> &LinodeClient {
        &self.client
    }

    /// Whether a snapshot is currently held
    pub fn is_populated(&self) -> bool {
        self.raw.is_some()
    }

    /// The raw snapshot, without pending changes applied
    pub fn snapshot(&self) -> Option<&Map<String, Value>> {
        self.raw.as_ref()
    }

    /// Local writes not yet saved
    pub fn pending_changes(&self) -> &BTreeMap<String, Value> {
        &self.pending
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    fn descriptor(&self, name: &str) -> Result<(&'static str, Property)> {
        find_property(K::PROPERTIES, name).ok_or_else(|| Error::UnknownProperty {
            kind: K::NAME,
            property: name.to_string(),
        })
    }

    fn apply_snapshot(&mut self, map: Map<String, Value>) {
        self.raw = Some(map);
        self.fetched_at = Some(Instant::now());
    }

    /// Fetch the object now, replacing any snapshot
    ///
    /// On failure the previous state is left untouched.
    pub async fn populate(&mut self) -> Result<()> {
        let json = self.client.get(K::API_ENDPOINT, Some(&*self)).await?;
        match json {
            Value::Object(map) => {
                debug!("Populated {} {}", K::NAME, self.id);
                self.apply_snapshot(map);
                Ok(())
            }
            other => Err(Error::unexpected(
                format!("{} {} did not come back as an object", K::NAME, self.id),
                &other,
            )),
        }
    }

    async fn ensure_fresh(&mut self, property: &Property) -> Result<()> {
        let stale = match self.fetched_at {
            None => true,
            Some(at) => property.is_volatile() && at.elapsed() > self.client.volatile_refresh(),
        };
        if stale {
            self.populate().await?;
        }
        Ok(())
    }

    async fn derived_items(&mut self, name: &'static str, class: DerivedClass) -> Result<Vec<Value>> {
        if let Some(items) = self.derived.get(name) {
            return Ok(items.clone());
        }

        let template = format!("{}/{}", K::API_ENDPOINT, class.url_path);
        let items = self.client.get_all(&template, Some(&*self)).await?;
        self.derived.insert(name, items.clone());
        Ok(items)
    }

    /// Read a property, coerced according to its descriptor
    ///
    /// Identifier properties never trigger a fetch. Other properties populate
    /// the object if needed; derived collections are fetched once and kept
    /// until the next `invalidate`.
    pub async fn property(&mut self, name: &str) -> Result<PropertyValue> {
        let (name, property) = self.descriptor(name)?;

        if property.is_identifier() {
            let value = if name == K::ID_ATTRIBUTE {
                self.id.to_json()
            } else {
                self.parent_id.as_ref().map(ResourceId::to_json).unwrap_or(Value::Null)
            };
            return Ok(PropertyValue::Json(value));
        }

        if let Some(class) = property.derived_class() {
            let items = self.derived_items(name, class).await?;
            return Ok(PropertyValue::Derived {
                kind: class.kind,
                items,
            });
        }

        self.ensure_fresh(&property).await?;

        let value = self
            .pending
            .get(name)
            .or_else(|| self.raw.as_ref().and_then(|raw| raw.get(name)))
            .cloned()
            .unwrap_or(Value::Null);

        if property.is_datetime() {
            return match &value {
                Value::Null => Ok(PropertyValue::DateTime(None)),
                Value::String(raw) => parse_datetime(raw)
                    .map(|dt| PropertyValue::DateTime(Some(dt)))
                    .ok_or_else(|| Error::unexpected(format!("invalid timestamp in '{}'", name), &value)),
                _ => Err(Error::unexpected(format!("invalid timestamp in '{}'", name), &value)),
            };
        }

        if let Some(kind) = property.slug_relationship() {
            return Ok(PropertyValue::Slug {
                kind,
                id: ResourceId::from_json(&value),
            });
        }

        Ok(PropertyValue::Json(value))
    }

    /// Read a property and deserialize it into `T`
    pub async fn attr<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        let value = self.property(name).await?.into_json();
        serde_json::from_value(value).map_err(|source| Error::Decode {
            kind: K::NAME,
            property: name.to_string(),
            source,
        })
    }

    /// Read a datetime property
    pub async fn datetime(&mut self, name: &str) -> Result<Option<DateTime<Utc>>> {
        match self.property(name).await? {
            PropertyValue::DateTime(dt) => Ok(dt),
            other => {
                let value = other.into_json();
                Ok(value.as_str().and_then(parse_datetime))
            }
        }
    }

    /// Read a slug property as an unpopulated reference to an `R`
    pub async fn slug<R: ResourceKind<Scope = RootScope>>(&mut self, name: &str) -> Result<Option<Resource<R>>> {
        let id = match self.property(name).await? {
            PropertyValue::Slug { id, .. } => id,
            other => ResourceId::from_json(&other.into_json()),
        };
        Ok(id.map(|id| Resource::new(self.client.clone(), id)))
    }

    /// Read a derived collection as objects scoped under this one
    pub async fn derived<D: DerivedKind<Parent = K>>(&mut self, name: &str) -> Result<Vec<Resource<D>>> {
        let items = match self.property(name).await? {
            PropertyValue::Derived { items, .. } => items,
            other => {
                return Err(Error::unexpected(
                    format!("'{}' of {} is not a derived collection", name, K::NAME),
                    &other.into_json(),
                ))
            }
        };

        items
            .into_iter()
            .map(|item| {
                let id = ResourceId::from_json(&item[D::ID_ATTRIBUTE]).ok_or_else(|| {
                    Error::unexpected(format!("{} item without identifier", D::NAME), &item)
                })?;
                Ok(Resource::derived_from_json(
                    self.client.clone(),
                    id,
                    self.id.clone(),
                    item,
                ))
            })
            .collect()
    }

    /// Stage a write to a mutable property; nothing is sent until `save`
    ///
    /// Writing back the value the snapshot already holds leaves the property
    /// clean. Lists of `unordered` properties compare as multisets.
    pub fn set(&mut self, name: &str, value: impl Serialize) -> Result<()> {
        let (name, property) = self.descriptor(name)?;
        if !property.is_mutable() {
            return Err(Error::ReadOnlyProperty {
                kind: K::NAME,
                property: name.to_string(),
            });
        }

        let value = serde_json::to_value(value)?;
        let unchanged = self
            .raw
            .as_ref()
            .and_then(|raw| raw.get(name))
            .is_some_and(|current| property.values_equal(current, &value));

        if unchanged {
            self.pending.remove(name);
        } else {
            debug!("Staged {} on {} {}", name, K::NAME, self.id);
            self.pending.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Drop all staged writes
    pub fn discard_changes(&mut self) {
        self.pending.clear();
    }

    /// PUT staged writes and merge the response into the snapshot
    ///
    /// Returns `false` without any request when nothing is staged. On failure
    /// the staged writes are kept so the save can be retried.
    pub async fn save(&mut self) -> Result<bool> {
        if self.pending.is_empty() {
            return Ok(false);
        }

        let body = Value::Object(
            self.pending
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        let response = self.client.put(K::API_ENDPOINT, Some(&*self), &body).await?;

        match response {
            Value::Object(map) => {
                let mut raw = self.raw.take().unwrap_or_default();
                raw.extend(map);
                self.apply_snapshot(raw);
            }
            other => {
                warn!("Save of {} {} returned {}, dropping snapshot", K::NAME, self.id, other);
                self.raw = None;
                self.fetched_at = None;
            }
        }

        info!("Saved {} {} ({} properties)", K::NAME, self.id, self.pending.len());
        self.pending.clear();
        Ok(true)
    }

    /// DELETE the object remotely
    ///
    /// The instance should be treated as dead afterwards; a later read
    /// re-fetches and will usually fail with `NotFound`.
    pub async fn delete(&mut self) -> Result<()> {
        self.client.delete(K::API_ENDPOINT, Some(&*self)).await?;
        info!("Deleted {} {}", K::NAME, self.id);
        self.invalidate();
        Ok(())
    }

    /// Forget everything fetched so the next read goes back to the API
    ///
    /// Drops the snapshot, cached derived collections and the kind's cache
    /// slots. Staged writes survive.
    pub fn invalidate(&mut self) {
        self.raw = None;
        self.fetched_at = None;
        self.derived.clear();
        self.cache = K::Cache::default();
    }
}

/// Generate async accessors that deserialize a property into a fixed type
macro_rules! json_accessors {
    ($($(#[$meta:meta])* $name:ident: $ty:ty;)*) => {
        $(
            $(#[$meta])*
            pub async fn $name(&mut self) -> $crate::error::Result<$ty> {
                self.attr(stringify!($name)).await
            }
        )*
    };
}

pub(crate) use json_accessors;
