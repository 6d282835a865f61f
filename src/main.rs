/// linode-objects - inspect and manage LKE clusters and the Linode profile
///
/// A thin command line front end over the `linode_objects` library.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linode_objects::keygen::generate_ed25519_keypair;
use linode_objects::{
    ClientConfig, ControlPlaneAclAddressesOptions, ControlPlaneAclOptions, CreateNodePoolRequest,
    LinodeClient, LkeCluster, LkeNodePool, Profile,
};

#[derive(Parser)]
#[command(name = "linode-objects")]
#[command(about = "Inspect and manage Linode LKE clusters and your profile", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "linode.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate example configuration file
    Init,

    /// Show a summary of one or more clusters
    Cluster {
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// List the node pools of a cluster
    Pools { cluster: u64 },

    /// Add a node pool to a cluster
    PoolCreate {
        cluster: u64,

        /// Linode type of the nodes, e.g. g6-standard-2
        #[arg(long = "type")]
        node_type: String,

        #[arg(long, default_value_t = 3)]
        count: u32,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Recycle all nodes of a pool
    PoolRecycle { cluster: u64, pool: u64 },

    /// Fetch the cluster's kubeconfig
    Kubeconfig {
        cluster: u64,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep retrying for up to this many seconds while the cluster provisions
        #[arg(long)]
        wait: Option<u64>,

        /// Regenerate the kubeconfig before fetching it
        #[arg(long)]
        reset: bool,
    },

    /// Show the control plane ACL
    Acl { cluster: u64 },

    /// Replace the control plane ACL
    AclSet {
        cluster: u64,

        /// Turn the ACL off
        #[arg(long)]
        disable: bool,

        #[arg(long)]
        ipv4: Vec<String>,

        #[arg(long)]
        ipv6: Vec<String>,
    },

    /// Show the profile of the token's user
    Profile,

    /// Upload an SSH key to the profile
    SshKeyAdd {
        label: String,

        /// Public key file; an ED25519 pair is generated when omitted
        #[arg(long)]
        public_key: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("linode_objects={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Init => init_config(&cli).await,
        Commands::Cluster { ref ids } => show_clusters(&cli, ids).await,
        Commands::Pools { cluster } => list_pools(&cli, cluster).await,
        Commands::PoolCreate {
            cluster,
            ref node_type,
            count,
            ref tags,
        } => create_pool(&cli, cluster, node_type, count, tags).await,
        Commands::PoolRecycle { cluster, pool } => recycle_pool(&cli, cluster, pool).await,
        Commands::Kubeconfig {
            cluster,
            ref output,
            wait,
            reset,
        } => fetch_kubeconfig(&cli, cluster, output.as_ref(), wait, reset).await,
        Commands::Acl { cluster } => show_acl(&cli, cluster).await,
        Commands::AclSet {
            cluster,
            disable,
            ref ipv4,
            ref ipv6,
        } => set_acl(&cli, cluster, disable, ipv4, ipv6).await,
        Commands::Profile => show_profile(&cli).await,
        Commands::SshKeyAdd {
            ref label,
            ref public_key,
        } => add_ssh_key(&cli, label, public_key.as_ref()).await,
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Build a client from the config file, or from defaults plus LINODE_TOKEN
fn client(cli: &Cli) -> Result<LinodeClient> {
    let mut config = if cli.config.exists() {
        ClientConfig::from_file(&cli.config).context("Failed to load configuration")?
    } else {
        ClientConfig::default()
    };
    config.token = Some(config.get_token()?);

    LinodeClient::from_config(&config).context("Failed to create Linode client")
}

async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let yaml = serde_yaml::to_string(&ClientConfig::example())?;
    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("Set your token in the file or export LINODE_TOKEN=your-token-here");

    Ok(())
}

async fn cluster_summary(mut cluster: LkeCluster) -> Result<String> {
    let label = cluster.label().await?;
    let region = cluster
        .region()
        .await?
        .map(|r| r.id().to_string())
        .unwrap_or_default();
    let version = cluster
        .k8s_version()
        .await?
        .map(|v| v.id().to_string())
        .unwrap_or_default();
    let ha = cluster.control_plane().await?.high_availability.unwrap_or(false);
    let pools = cluster.pools().await?;

    Ok(format!(
        "{}\t{}\t{}\tk8s {}\tHA {}\t{} pool(s)",
        cluster.id(),
        label,
        region,
        version,
        ha,
        pools.len()
    ))
}

async fn show_clusters(cli: &Cli, ids: &[u64]) -> Result<()> {
    let client = client(cli)?;

    let tasks = ids
        .iter()
        .map(|id| cluster_summary(LkeCluster::new(client.clone(), *id)));
    let results = join_all(tasks).await;

    let mut failed = 0;
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(line) => println!("{}", line),
            Err(e) => {
                warn!("Cluster {}: {:#}", id, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} clusters could not be read", failed, ids.len());
    }
    Ok(())
}

async fn list_pools(cli: &Cli, cluster: u64) -> Result<()> {
    let mut cluster = LkeCluster::new(client(cli)?, cluster);

    for mut pool in cluster.pools().await? {
        let node_type = pool
            .node_type()
            .await?
            .map(|t| t.id().to_string())
            .unwrap_or_default();
        let count = pool.count().await?;
        println!("{}\t{}\tx{}", pool.id(), node_type, count);
        for node in pool.nodes().await? {
            let instance = node
                .instance_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {}\t{}\t{}", node.id, instance, node.status.as_deref().unwrap_or("-"));
        }
    }

    Ok(())
}

async fn create_pool(
    cli: &Cli,
    cluster: u64,
    node_type: &str,
    count: u32,
    tags: &[String],
) -> Result<()> {
    let mut cluster = LkeCluster::new(client(cli)?, cluster);

    let mut request = CreateNodePoolRequest::new(node_type, count);
    if !tags.is_empty() {
        request = request.tags(tags.iter().cloned());
    }

    let pool = cluster
        .node_pool_create(request)
        .await
        .context("Failed to create node pool")?;
    println!("{}", pool.id());

    Ok(())
}

async fn recycle_pool(cli: &Cli, cluster: u64, pool: u64) -> Result<()> {
    let mut pool = LkeNodePool::new_derived(client(cli)?, pool, cluster);
    pool.recycle().await.context("Failed to recycle node pool")?;
    Ok(())
}

async fn fetch_kubeconfig(
    cli: &Cli,
    cluster: u64,
    output: Option<&PathBuf>,
    wait: Option<u64>,
    reset: bool,
) -> Result<()> {
    let mut cluster = LkeCluster::new(client(cli)?, cluster);

    if reset {
        cluster.kubeconfig_delete().await?;
    }
    if let Some(secs) = wait {
        cluster
            .wait_for_kubeconfig(Duration::from_secs(secs), Duration::from_secs(5))
            .await?;
    }
    let kubeconfig = cluster.decoded_kubeconfig().await?;

    match output {
        Some(path) => {
            tokio::fs::write(path, kubeconfig)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Kubeconfig written to {}", path.display());
        }
        None => print!("{}", kubeconfig),
    }

    Ok(())
}

async fn show_acl(cli: &Cli, cluster: u64) -> Result<()> {
    let mut cluster = LkeCluster::new(client(cli)?, cluster);
    let acl = cluster.control_plane_acl().await?;
    println!("{}", serde_json::to_string_pretty(&acl)?);
    Ok(())
}

async fn set_acl(
    cli: &Cli,
    cluster: u64,
    disable: bool,
    ipv4: &[String],
    ipv6: &[String],
) -> Result<()> {
    let mut cluster = LkeCluster::new(client(cli)?, cluster);

    let addresses = if ipv4.is_empty() && ipv6.is_empty() {
        None
    } else {
        Some(ControlPlaneAclAddressesOptions {
            ipv4: Some(ipv4.to_vec()),
            ipv6: Some(ipv6.to_vec()),
        })
    };
    let options = ControlPlaneAclOptions {
        enabled: Some(!disable),
        addresses,
    };

    let acl = cluster.control_plane_acl_update(&options).await?;
    println!("{}", serde_json::to_string_pretty(&acl)?);
    Ok(())
}

async fn show_profile(cli: &Cli) -> Result<()> {
    let mut profile = Profile::fetch(&client(cli)?).await?;

    println!("username:  {}", profile.username());
    println!("email:     {}", profile.email().await?);
    println!("timezone:  {}", profile.timezone().await?);
    println!("2FA:       {}", profile.two_factor_auth().await?);
    println!("restricted: {}", profile.restricted().await?);
    for mut key in profile.ssh_keys().await? {
        println!("ssh key:   {} ({})", key.label().await?, key.id());
    }

    Ok(())
}

async fn add_ssh_key(cli: &Cli, label: &str, public_key: Option<&PathBuf>) -> Result<()> {
    let profile = Profile::fetch(&client(cli)?).await?;

    let public = match public_key {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            info!("Generating new ED25519 SSH key pair...");
            let pair = generate_ed25519_keypair(label);
            let private_path = PathBuf::from(format!("{}_ed25519", label));
            write_private_key(&private_path, &pair.private_key).await?;
            info!("Private key written to {}", private_path.display());
            pair.public_key
        }
    };

    let key = profile.ssh_key_upload(label, &public).await?;
    info!("SSH key uploaded (ID: {})", key.id());

    Ok(())
}

/// Write a private key to a new file readable only by the owner
///
/// Refuses to replace an existing file.
async fn write_private_key(path: &Path, contents: &str) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options
        .open(path)
        .await
        .with_context(|| format!("Failed to create private key file {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .await
        .context("Failed to write private key")?;
    file.flush().await.context("Failed to write private key")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}-{}-{}", name, std::process::id(), rand::random::<u32>()))
    }

    #[tokio::test]
    async fn test_private_key_is_owner_only() {
        let path = scratch_path("key_ed25519");
        write_private_key(&path, "secret").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "secret");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_private_key_never_overwrites() {
        let path = scratch_path("existing_ed25519");
        tokio::fs::write(&path, "old key").await.unwrap();

        assert!(write_private_key(&path, "new key").await.is_err());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "old key");

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
