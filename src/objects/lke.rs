/// Linode Kubernetes Engine objects
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::linode::Instance;
use super::region::{LinodeType, LinodeTypeKind, Region, RegionKind};
use crate::base::{
    json_accessors, DerivedKind, DerivedScope, Property, PropertyTable, Resource, ResourceId,
    ResourceKind, RootScope,
};
use crate::client::LinodeClient;
use crate::error::{Error, Result};
use crate::utils::polling::PollingConfig;

pub struct KubeVersionKind;

impl ResourceKind for KubeVersionKind {
    const NAME: &'static str = "KubeVersion";
    const API_ENDPOINT: &'static str = "/lke/versions/{id}";
    const PROPERTIES: PropertyTable = &[("id", Property::new().identifier())];
    type Scope = RootScope;
    type Cache = ();
}

/// A Kubernetes version LKE can deploy, e.g. `1.29`
pub type KubeVersion = Resource<KubeVersionKind>;

/// IP ranges to allow through the control-plane ACL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPlaneAclAddressesOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Vec<String>>,
}

/// Control-plane ACL settings sent on update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPlaneAclOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<ControlPlaneAclAddressesOptions>,
}

/// The cluster's `control_plane` property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPlaneOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_availability: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<ControlPlaneAclOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPlaneAclAddresses {
    #[serde(default)]
    pub ipv4: Vec<String>,
    #[serde(default)]
    pub ipv6: Vec<String>,
}

/// Control-plane ACL as reported by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPlaneAcl {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub addresses: Option<ControlPlaneAclAddresses>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePoolAutoscaler {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePoolDisk {
    pub size: u64,
    #[serde(rename = "type")]
    pub disk_type: String,
}

/// One entry of a node pool's `nodes` list
///
/// Nodes have no endpoint of their own. The backing instance is referenced
/// by id only; use [`LkeNodePoolNode::instance`] to get a lazy handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LkeNodePoolNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub instance_id: Option<u64>,
    /// `ready` or `not_ready`; absent while the node is being provisioned
    #[serde(default)]
    pub status: Option<String>,
}

impl LkeNodePoolNode {
    /// Unpopulated handle on the instance backing this node; nothing is fetched
    pub fn instance(&self, client: &LinodeClient) -> Option<Instance> {
        self.instance_id.map(|id| Instance::new(client.clone(), id))
    }
}

/// Body of a node pool creation request
#[derive(Debug, Clone, Serialize)]
pub struct CreateNodePoolRequest {
    #[serde(rename = "type")]
    pub node_type: String,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaler: Option<NodePoolAutoscaler>,
    /// Any further fields the API accepts, passed through verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CreateNodePoolRequest {
    pub fn new(node_type: impl Into<String>, count: u32) -> Self {
        Self {
            node_type: node_type.into(),
            count,
            tags: None,
            autoscaler: None,
            extra: Map::new(),
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn autoscaler(mut self, autoscaler: NodePoolAutoscaler) -> Self {
        self.autoscaler = Some(autoscaler);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

pub struct LkeNodePoolKind;

impl ResourceKind for LkeNodePoolKind {
    const NAME: &'static str = "LKENodePool";
    const API_ENDPOINT: &'static str = "/lke/clusters/{cluster_id}/pools/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("cluster_id", Property::new().identifier()),
        ("type", Property::new().slug::<LinodeTypeKind>()),
        ("disks", Property::new()),
        ("disk_encryption", Property::new()),
        ("count", Property::new().mutable()),
        ("nodes", Property::new().volatile()),
        ("autoscaler", Property::new().mutable()),
        ("tags", Property::new().mutable().unordered()),
    ];
    type Scope = DerivedScope;
    type Cache = ();
}

impl DerivedKind for LkeNodePoolKind {
    type Parent = LkeClusterKind;
    const PARENT_ID_NAME: &'static str = "cluster_id";
    const DERIVED_URL_PATH: &'static str = "pools";
}

/// A pool of identically sized nodes inside an LKE cluster
pub type LkeNodePool = Resource<LkeNodePoolKind>;

impl Resource<LkeNodePoolKind> {
    json_accessors! {
        disks: Option<Vec<NodePoolDisk>>;
        disk_encryption: Option<String>;
        count: u32;
        /// Re-fetched on read once the snapshot is older than the volatile interval
        nodes: Vec<LkeNodePoolNode>;
        autoscaler: Option<NodePoolAutoscaler>;
        tags: Vec<String>;
    }

    pub fn cluster_id(&self) -> Option<&ResourceId> {
        self.parent_id()
    }

    pub async fn node_type(&mut self) -> Result<Option<LinodeType>> {
        self.slug::<LinodeTypeKind>("type").await
    }

    pub fn set_count(&mut self, count: u32) -> Result<()> {
        self.set("count", count)
    }

    pub fn set_autoscaler(&mut self, autoscaler: NodePoolAutoscaler) -> Result<()> {
        self.set("autoscaler", autoscaler)
    }

    pub fn set_tags<I, S>(&mut self, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set("tags", tags.into_iter().map(Into::into).collect::<Vec<String>>())
    }

    /// Delete and recreate every node of this pool in a rolling fashion
    ///
    /// Local data on the pool's instances is lost.
    pub async fn recycle(&mut self) -> Result<()> {
        let template = format!("{}/recycle", LkeNodePoolKind::API_ENDPOINT);
        self.client().post(&template, Some(&*self), None).await?;
        info!("Recycling node pool {}", self.id());
        self.invalidate();
        Ok(())
    }
}

/// Memoized side lookups of a cluster
///
/// Besides its snapshot, a cluster keeps the API endpoint list, the
/// kubeconfig and the control-plane ACL here. `invalidate` drops all three.
#[derive(Debug, Default)]
pub struct LkeClusterCache {
    pub api_endpoints: Option<Vec<ApiEndpoint>>,
    pub kubeconfig: Option<String>,
    pub control_plane_acl: Option<ControlPlaneAcl>,
}

pub struct LkeClusterKind;

impl ResourceKind for LkeClusterKind {
    const NAME: &'static str = "LKECluster";
    const API_ENDPOINT: &'static str = "/lke/clusters/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("created", Property::new().datetime()),
        ("label", Property::new().mutable()),
        ("tags", Property::new().mutable().unordered()),
        ("updated", Property::new().datetime()),
        ("region", Property::new().slug::<RegionKind>()),
        ("k8s_version", Property::new().slug::<KubeVersionKind>().mutable()),
        ("pools", Property::new().derived::<LkeNodePoolKind>()),
        ("control_plane", Property::new().mutable()),
    ];
    type Scope = RootScope;
    type Cache = LkeClusterCache;
}

/// A Kubernetes cluster deployed through LKE
pub type LkeCluster = Resource<LkeClusterKind>;

impl Resource<LkeClusterKind> {
    json_accessors! {
        label: String;
        tags: Vec<String>;
        control_plane: ControlPlaneOptions;
    }

    fn action_path(suffix: &str) -> String {
        format!("{}/{}", LkeClusterKind::API_ENDPOINT, suffix)
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

    pub async fn k8s_version(&mut self) -> Result<Option<KubeVersion>> {
        self.slug::<KubeVersionKind>("k8s_version").await
    }

    /// Node pools of this cluster, fetched once until the next invalidation
    pub async fn pools(&mut self) -> Result<Vec<LkeNodePool>> {
        self.derived::<LkeNodePoolKind>("pools").await
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

    /// Stage an upgrade to another Kubernetes version slug
    pub fn set_k8s_version(&mut self, version: impl Into<String>) -> Result<()> {
        self.set("k8s_version", version.into())
    }

    pub fn set_control_plane(&mut self, control_plane: ControlPlaneOptions) -> Result<()> {
        self.set("control_plane", control_plane)
    }

    /// API endpoints of the cluster's control plane
    pub async fn api_endpoints(&mut self) -> Result<Vec<ApiEndpoint>> {
        if let Some(endpoints) = &self.cache.api_endpoints {
            return Ok(endpoints.clone());
        }

        // Looks paginated, but items have no ids and paging params are ignored
        let result = self
            .client()
            .get(&Self::action_path("api-endpoints"), Some(&*self))
            .await?;
        let data = result
            .get("data")
            .cloned()
            .ok_or_else(|| Error::unexpected("api-endpoints response without 'data'", &result))?;
        let endpoints: Vec<ApiEndpoint> = serde_json::from_value(data)?;

        self.cache.api_endpoints = Some(endpoints.clone());
        Ok(endpoints)
    }

    /// The administrative kubeconfig, base64 encoded
    ///
    /// Contains cluster credentials. For a freshly created cluster this may
    /// fail for a few minutes; see [`LkeCluster::wait_for_kubeconfig`].
    pub async fn kubeconfig(&mut self) -> Result<String> {
        if let Some(kubeconfig) = &self.cache.kubeconfig {
            return Ok(kubeconfig.clone());
        }

        let result = self
            .client()
            .get(&Self::action_path("kubeconfig"), Some(&*self))
            .await?;
        let kubeconfig = kubeconfig_from(&result)?;

        self.cache.kubeconfig = Some(kubeconfig.clone());
        Ok(kubeconfig)
    }

    /// The kubeconfig as YAML text
    pub async fn decoded_kubeconfig(&mut self) -> Result<String> {
        let encoded = self.kubeconfig().await?;
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::unexpected(format!("kubeconfig is not base64: {}", e), &Value::Null))?;
        String::from_utf8(bytes)
            .map_err(|e| Error::unexpected(format!("kubeconfig is not UTF-8: {}", e), &Value::Null))
    }

    /// Poll for the kubeconfig until the API stops refusing it
    ///
    /// API errors count as "not ready yet"; not-found and transport errors
    /// end the wait. The result is memoized like [`LkeCluster::kubeconfig`].
    pub async fn wait_for_kubeconfig(&mut self, timeout: Duration, interval: Duration) -> Result<String> {
        if let Some(kubeconfig) = &self.cache.kubeconfig {
            return Ok(kubeconfig.clone());
        }

        let path = Self::action_path("kubeconfig");
        let template = path.as_str();
        let polling = PollingConfig::new(
            timeout,
            interval,
            format!("Waiting for kubeconfig of cluster {}", self.id()),
        );

        let this: &Self = self;
        let kubeconfig = polling
            .poll(move || async move {
                match this.client().get(template, Some(this)).await {
                    Ok(result) => kubeconfig_from(&result).map(Some),
                    Err(Error::Api { status, .. }) => {
                        debug!("kubeconfig not ready yet ({})", status);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .await?;

        self.cache.kubeconfig = Some(kubeconfig.clone());
        Ok(kubeconfig)
    }

    /// Delete and regenerate the kubeconfig
    ///
    /// The memoized kubeconfig is dropped so the next read fetches the new one.
    pub async fn kubeconfig_delete(&mut self) -> Result<()> {
        self.client()
            .delete(&Self::action_path("kubeconfig"), Some(&*self))
            .await?;
        info!("Regenerating kubeconfig of cluster {}", self.id());
        self.cache.kubeconfig = None;
        Ok(())
    }

    /// URL of the Kubernetes dashboard for this cluster
    pub async fn dashboard_url(&self) -> Result<String> {
        let result = self
            .client()
            .get(&Self::action_path("dashboard"), Some(self))
            .await?;
        result
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::unexpected("dashboard response without 'url'", &result))
    }

    /// Create a node pool; the cluster is invalidated so `pools` re-fetches
    pub async fn node_pool_create(&mut self, request: CreateNodePoolRequest) -> Result<LkeNodePool> {
        let body = serde_json::to_value(&request)?;
        let result = self
            .client()
            .post(&Self::action_path("pools"), Some(&*self), Some(&body))
            .await?;
        self.invalidate();

        let id = result
            .get("id")
            .and_then(ResourceId::from_json)
            .ok_or_else(|| Error::unexpected("Unexpected response creating node pool!", &result))?;

        info!(
            "Created node pool {} ({} x {}) in cluster {}",
            id,
            request.count,
            request.node_type,
            self.id()
        );

        Ok(LkeNodePool::derived_from_json(
            self.client().clone(),
            id,
            self.id().clone(),
            result,
        ))
    }

    /// Look up a single node by id
    pub async fn node_view(&self, node_id: &str) -> Result<LkeNodePoolNode> {
        let template = Self::action_path(&format!("nodes/{}", urlencoding::encode(node_id)));
        let node = self.client().get(&template, Some(self)).await?;
        Ok(serde_json::from_value(node)?)
    }

    /// Delete a node from its pool
    pub async fn node_delete(&self, node_id: &str) -> Result<()> {
        let template = Self::action_path(&format!("nodes/{}", urlencoding::encode(node_id)));
        self.client().delete(&template, Some(self)).await?;
        info!("Deleted node {} of cluster {}", node_id, self.id());
        Ok(())
    }

    /// Recycle a single node
    pub async fn node_recycle(&self, node_id: &str) -> Result<()> {
        let template = Self::action_path(&format!("nodes/{}/recycle", urlencoding::encode(node_id)));
        self.client().post(&template, Some(self), None).await?;
        info!("Recycling node {} of cluster {}", node_id, self.id());
        Ok(())
    }

    /// Recycle every node in every pool of this cluster
    pub async fn cluster_nodes_recycle(&self) -> Result<()> {
        self.client()
            .post(&Self::action_path("recycle"), Some(self), None)
            .await?;
        info!("Recycling all nodes of cluster {}", self.id());
        Ok(())
    }

    /// Regenerate the kubeconfig and/or service account token
    pub async fn cluster_regenerate(&self) -> Result<()> {
        self.client()
            .post(&Self::action_path("regenerate"), Some(self), None)
            .await?;
        Ok(())
    }

    /// Delete and regenerate the service account token
    pub async fn service_token_delete(&self) -> Result<()> {
        self.client()
            .delete(&Self::action_path("servicetoken"), Some(self))
            .await?;
        Ok(())
    }

    pub async fn control_plane_acl(&mut self) -> Result<ControlPlaneAcl> {
        if let Some(acl) = &self.cache.control_plane_acl {
            return Ok(acl.clone());
        }

        let result = self
            .client()
            .get(&Self::action_path("control_plane_acl"), Some(&*self))
            .await?;
        let acl = acl_from(&result)?;

        self.cache.control_plane_acl = Some(acl.clone());
        Ok(acl)
    }

    /// Replace the control-plane ACL and refresh the memoized copy
    pub async fn control_plane_acl_update(&mut self, acl: &ControlPlaneAclOptions) -> Result<ControlPlaneAcl> {
        let body = serde_json::json!({ "acl": acl });
        let result = self
            .client()
            .put(&Self::action_path("control_plane_acl"), Some(&*self), &body)
            .await?;
        let acl = acl_from(&result)?;

        info!("Updated control plane ACL of cluster {}", self.id());
        self.cache.control_plane_acl = Some(acl.clone());
        Ok(acl)
    }

    /// Disable the control-plane ACL and delete all of its rules
    pub async fn control_plane_acl_delete(&mut self) -> Result<()> {
        self.client()
            .delete(&Self::action_path("control_plane_acl"), Some(&*self))
            .await?;
        info!("Deleted control plane ACL of cluster {}", self.id());
        self.cache.control_plane_acl = None;
        Ok(())
    }
}

fn kubeconfig_from(result: &Value) -> Result<String> {
    result
        .get("kubeconfig")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::unexpected("kubeconfig response without 'kubeconfig'", result))
}

fn acl_from(result: &Value) -> Result<ControlPlaneAcl> {
    let acl = result
        .get("acl")
        .cloned()
        .ok_or_else(|| Error::unexpected("control_plane_acl response without 'acl'", result))?;
    Ok(serde_json::from_value(acl)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cluster_json() -> Value {
        json!({
            "id": 18881,
            "label": "example-cluster",
            "region": "ap-west",
            "k8s_version": "1.29",
            "tags": ["prod", "web"],
            "created": "2024-01-10T08:00:00",
            "updated": "2024-02-11T09:30:00",
            "control_plane": {"high_availability": true}
        })
    }

    async fn cluster(server: &MockServer) -> LkeCluster {
        let client = LinodeClient::with_base_url("test-token", server.uri()).unwrap();
        LkeCluster::new(client, 18881u64)
    }

    async fn mount_get(server: &MockServer, at: &str, body: Value, times: u64) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_cluster_properties() {
        let server = MockServer::start().await;
        mount_get(&server, "/lke/clusters/18881", cluster_json(), 1).await;

        let mut cluster = cluster(&server).await;
        assert_eq!(cluster.label().await.unwrap(), "example-cluster");
        assert_eq!(cluster.region().await.unwrap().unwrap().id(), &ResourceId::from("ap-west"));
        assert_eq!(cluster.k8s_version().await.unwrap().unwrap().id(), &ResourceId::from("1.29"));
        assert_eq!(
            cluster.control_plane().await.unwrap().high_availability,
            Some(true)
        );
        let created = cluster.created().await.unwrap().unwrap();
        assert_eq!(created.to_rfc3339(), "2024-01-10T08:00:00+00:00");
    }

    #[tokio::test]
    async fn test_pools_are_derived() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/lke/clusters/18881/pools",
            json!({
                "data": [{
                    "id": 456,
                    "type": "g6-standard-2",
                    "count": 3,
                    "nodes": [
                        {"id": "456-aaa", "instance_id": 1001, "status": "ready"},
                        {"id": "456-bbb", "instance_id": null, "status": "not_ready"}
                    ],
                    "tags": [],
                    "disks": [{"size": 1024, "type": "ext4"}]
                }],
                "page": 1, "pages": 1, "results": 1
            }),
            1,
        )
        .await;

        let mut cluster = cluster(&server).await;
        let mut pools = cluster.pools().await.unwrap();
        assert_eq!(pools.len(), 1);

        let pool = &mut pools[0];
        assert_eq!(pool.cluster_id(), Some(&ResourceId::from(18881)));
        assert_eq!(pool.count().await.unwrap(), 3);
        assert_eq!(pool.node_type().await.unwrap().unwrap().id(), &ResourceId::from("g6-standard-2"));
        assert_eq!(pool.disks().await.unwrap().unwrap()[0].disk_type, "ext4");

        let nodes = pool.nodes().await.unwrap();
        let client = pool.client().clone();
        let instance = nodes[0].instance(&client).unwrap();
        assert_eq!(instance.id(), &ResourceId::from(1001));
        assert!(!instance.is_populated());
        assert!(nodes[1].instance(&client).is_none());
    }

    #[test]
    fn test_node_entry_tolerates_missing_fields() {
        let nodes: Vec<LkeNodePoolNode> = serde_json::from_value(json!([
            {"id": "456-aaa", "instance_id": 1001},
            {"instance_id": null, "status": "ready"}
        ]))
        .unwrap();
        assert_eq!(nodes[0].id, "456-aaa");
        assert!(nodes[0].status.is_none());
        assert!(nodes[1].id.is_empty());
        assert_eq!(nodes[1].status.as_deref(), Some("ready"));
    }

    #[tokio::test]
    async fn test_memoized_lookups() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/lke/clusters/18881/api-endpoints",
            json!({"data": [{"endpoint": "https://abc.ap-west-2.linodelke.net:443"}], "page": 1, "pages": 1}),
            1,
        )
        .await;
        mount_get(&server, "/lke/clusters/18881/kubeconfig", json!({"kubeconfig": "YWJjZGVm"}), 1).await;
        mount_get(
            &server,
            "/lke/clusters/18881/control_plane_acl",
            json!({"acl": {"enabled": true, "addresses": {"ipv4": ["10.0.0.1/32"]}}}),
            1,
        )
        .await;

        let mut cluster = cluster(&server).await;
        for _ in 0..2 {
            let endpoints = cluster.api_endpoints().await.unwrap();
            assert_eq!(endpoints[0].endpoint, "https://abc.ap-west-2.linodelke.net:443");
            assert_eq!(cluster.kubeconfig().await.unwrap(), "YWJjZGVm");
            let acl = cluster.control_plane_acl().await.unwrap();
            assert!(acl.enabled);
            assert_eq!(acl.addresses.unwrap().ipv4, vec!["10.0.0.1/32".to_string()]);
        }
        assert_eq!(cluster.decoded_kubeconfig().await.unwrap(), "abcdef");
    }

    #[tokio::test]
    async fn test_invalidate_clears_cache_slots() {
        let server = MockServer::start().await;
        mount_get(&server, "/lke/clusters/18881", cluster_json(), 2).await;
        mount_get(&server, "/lke/clusters/18881/api-endpoints", json!({"data": []}), 2).await;
        mount_get(&server, "/lke/clusters/18881/kubeconfig", json!({"kubeconfig": "YQ=="}), 2).await;
        mount_get(&server, "/lke/clusters/18881/control_plane_acl", json!({"acl": {"enabled": false}}), 2).await;

        let mut cluster = cluster(&server).await;
        for _ in 0..2 {
            cluster.label().await.unwrap();
            cluster.api_endpoints().await.unwrap();
            cluster.kubeconfig().await.unwrap();
            cluster.control_plane_acl().await.unwrap();
            // second pass hits the cache
            cluster.label().await.unwrap();
            cluster.kubeconfig().await.unwrap();
            cluster.invalidate();
            assert!(cluster.cache.kubeconfig.is_none());
            assert!(cluster.cache.api_endpoints.is_none());
            assert!(cluster.cache.control_plane_acl.is_none());
        }
    }

    #[tokio::test]
    async fn test_kubeconfig_delete_drops_memoized_config() {
        let server = MockServer::start().await;
        mount_get(&server, "/lke/clusters/18881/kubeconfig", json!({"kubeconfig": "YQ=="}), 2).await;
        Mock::given(method("DELETE"))
            .and(path("/lke/clusters/18881/kubeconfig"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let mut cluster = cluster(&server).await;
        cluster.kubeconfig().await.unwrap();
        cluster.kubeconfig_delete().await.unwrap();
        cluster.kubeconfig().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_kubeconfig_retries_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lke/clusters/18881/kubeconfig"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "errors": [{"reason": "Cluster kubeconfig is not yet available"}]
            })))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        mount_get(&server, "/lke/clusters/18881/kubeconfig", json!({"kubeconfig": "YQ=="}), 1).await;

        let mut cluster = cluster(&server).await;
        let kubeconfig = cluster
            .wait_for_kubeconfig(Duration::from_secs(5), Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(kubeconfig, "YQ==");
        assert_eq!(cluster.kubeconfig().await.unwrap(), "YQ==");
    }

    #[tokio::test]
    async fn test_node_pool_create_without_id_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/lke/clusters/18881/pools"))
            .and(body_json(json!({"type": "g6-standard-1", "count": 1, "tags": ["x"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let mut cluster = cluster(&server).await;
        let err = cluster
            .node_pool_create(CreateNodePoolRequest::new("g6-standard-1", 1).tags(["x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { .. }));
    }

    #[tokio::test]
    async fn test_node_actions_encode_ids() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/lke/clusters/18881/nodes/456-aaa",
            json!({"id": "456-aaa", "instance_id": 1001, "status": "ready"}),
            1,
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/lke/clusters/18881/nodes/456-aaa/recycle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/lke/clusters/18881/nodes/456-aaa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let cluster = cluster(&server).await;
        let node = cluster.node_view("456-aaa").await.unwrap();
        assert_eq!(node.instance_id, Some(1001));
        cluster.node_recycle("456-aaa").await.unwrap();
        cluster.node_delete("456-aaa").await.unwrap();
    }

    #[tokio::test]
    async fn test_pool_recycle_invalidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/lke/clusters/18881/pools/456/recycle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = LinodeClient::with_base_url("t", server.uri()).unwrap();
        let mut pool = LkeNodePool::derived_from_json(client, 456u64, 18881u64, json!({"id": 456, "count": 3}));
        assert!(pool.is_populated());
        pool.recycle().await.unwrap();
        assert!(!pool.is_populated());
    }

    #[tokio::test]
    async fn test_simple_cluster_actions() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/lke/clusters/18881/dashboard",
            json!({"url": "https://dashboard.example"}),
            1,
        )
        .await;
        for (verb, at) in [
            ("POST", "/lke/clusters/18881/recycle"),
            ("POST", "/lke/clusters/18881/regenerate"),
            ("DELETE", "/lke/clusters/18881/servicetoken"),
        ] {
            Mock::given(method(verb))
                .and(path(at))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
                .expect(1)
                .mount(&server)
                .await;
        }

        let cluster = cluster(&server).await;
        assert_eq!(cluster.dashboard_url().await.unwrap(), "https://dashboard.example");
        cluster.cluster_nodes_recycle().await.unwrap();
        cluster.cluster_regenerate().await.unwrap();
        cluster.service_token_delete().await.unwrap();
    }

    #[test]
    fn test_acl_options_skip_absent_fields() {
        let options = ControlPlaneAclOptions {
            enabled: Some(true),
            addresses: Some(ControlPlaneAclAddressesOptions {
                ipv4: Some(vec!["1.2.3.4/32".to_string()]),
                ipv6: None,
            }),
        };
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({"enabled": true, "addresses": {"ipv4": ["1.2.3.4/32"]}})
        );
    }

    #[test]
    fn test_create_request_flattens_extra() {
        let request = CreateNodePoolRequest::new("g6-standard-2", 3).extra("disk_encryption", "enabled");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"type": "g6-standard-2", "count": 3, "disk_encryption": "enabled"})
        );
    }
}
