/// Linode instances, referenced by LKE pool nodes
use chrono::{DateTime, Utc};

use super::region::{LinodeType, LinodeTypeKind, Region, RegionKind};
use crate::base::{json_accessors, Property, PropertyTable, Resource, ResourceKind, RootScope};
use crate::error::Result;

pub struct InstanceKind;

impl ResourceKind for InstanceKind {
    const NAME: &'static str = "Instance";
    const API_ENDPOINT: &'static str = "/linode/instances/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("label", Property::new().mutable()),
        ("group", Property::new().mutable()),
        ("status", Property::new().volatile()),
        ("created", Property::new().datetime()),
        ("updated", Property::new().volatile().datetime()),
        ("region", Property::new().slug::<RegionKind>()),
        ("type", Property::new().slug::<LinodeTypeKind>()),
        ("image", Property::new()),
        ("ipv4", Property::new().unordered()),
        ("ipv6", Property::new()),
        ("tags", Property::new().mutable().unordered()),
    ];
    type Scope = RootScope;
    type Cache = ();
}

/// A Linode compute instance
pub type Instance = Resource<InstanceKind>;

impl Resource<InstanceKind> {
    json_accessors! {
        label: String;
        group: Option<String>;
        /// Refreshed on read once the snapshot is older than the volatile interval
        status: String;
        image: Option<String>;
        ipv4: Vec<String>;
        ipv6: Option<String>;
        tags: Vec<String>;
    }

    pub async fn created(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("created").await
    }

    pub async fn updated(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("updated").await
    }

    pub async fn region(&mut self) -> Result<Option<Region>> {
        self.slug::<RegionKind>("region").await
    }

    pub async fn instance_type(&mut self) -> Result<Option<LinodeType>> {
        self.slug::<LinodeTypeKind>("type").await
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> Result<()> {
        self.set("label", label.into())
    }

    pub fn set_tags<I, S>(&mut self, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set("tags", tags.into_iter().map(Into::into).collect::<Vec<String>>())
    }
}
