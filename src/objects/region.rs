/// Region and Linode type kinds, the targets of slug relationships
use crate::base::{json_accessors, Property, PropertyTable, Resource, ResourceKind, RootScope};

pub struct RegionKind;

impl ResourceKind for RegionKind {
    const NAME: &'static str = "Region";
    const API_ENDPOINT: &'static str = "/regions/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("label", Property::new()),
        ("country", Property::new()),
        ("capabilities", Property::new().unordered()),
        ("status", Property::new()),
    ];
    type Scope = RootScope;
    type Cache = ();
}

/// A datacenter region, e.g. `us-east`
pub type Region = Resource<RegionKind>;

impl Resource<RegionKind> {
    json_accessors! {
        label: String;
        country: String;
        capabilities: Vec<String>;
        status: String;
    }
}

pub struct LinodeTypeKind;

impl ResourceKind for LinodeTypeKind {
    const NAME: &'static str = "Type";
    const API_ENDPOINT: &'static str = "/linode/types/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("label", Property::new()),
        ("class", Property::new()),
        ("disk", Property::new()),
        ("memory", Property::new()),
        ("vcpus", Property::new()),
        ("transfer", Property::new()),
        ("price", Property::new()),
    ];
    type Scope = RootScope;
    type Cache = ();
}

/// A plan size, e.g. `g6-standard-2`
pub type LinodeType = Resource<LinodeTypeKind>;

impl Resource<LinodeTypeKind> {
    json_accessors! {
        label: String;
        class: String;
        /// Disk size in MB
        disk: u64;
        /// Memory in MB
        memory: u64;
        vcpus: u32;
        transfer: u64;
        price: serde_json::Value;
    }
}
