/// Resource kinds of the Linode API
pub mod linode;
pub mod lke;
pub mod profile;
pub mod region;

pub use linode::{Instance, InstanceKind};
pub use lke::{
    ApiEndpoint, ControlPlaneAcl, ControlPlaneAclAddresses, ControlPlaneAclAddressesOptions,
    ControlPlaneAclOptions, ControlPlaneOptions, CreateNodePoolRequest, KubeVersion, KubeVersionKind,
    LkeCluster, LkeClusterCache, LkeClusterKind, LkeNodePool, LkeNodePoolKind, LkeNodePoolNode,
    NodePoolAutoscaler, NodePoolDisk,
};
pub use profile::{
    AuthorizedApp, PersonalAccessToken, Profile, ProfileKind, ProfileLogin, SshKey, TrustedDevice,
    WhitelistEntry,
};
pub use region::{LinodeType, LinodeTypeKind, Region, RegionKind};
