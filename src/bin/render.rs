//! Render CSI driver operator manifests the way the operator does
//!
//! Prints the rendered Deployment of a driver, or any embedded asset, as
//! YAML. Images come from the same `*_IMAGE` environment variables the
//! operator reads.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use cluster_storage_operator::assets::replace::{common_replacer, namespace_replacer};
use cluster_storage_operator::assets::{self, AssetLoader};
use cluster_storage_operator::config::{OperatorConfig, CSI_DRIVER_NAMESPACE};
use cluster_storage_operator::controllers::csidriver::driver_configs;
use cluster_storage_operator::controllers::deployment::render_deployment;
use cluster_storage_operator::crd::{self, Storage, StorageSpec, TopologyMode};

/// Render CSI driver operator manifests
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Driver whose Deployment is rendered, e.g. aws-ebs
    #[arg(long, required_unless_present_any = ["asset", "list"])]
    driver: Option<String>,

    /// Render this asset instead of the driver Deployment
    #[arg(long)]
    asset: Option<String>,

    /// Namespace the operands run in
    #[arg(long, default_value = CSI_DRIVER_NAMESPACE)]
    namespace: String,

    /// Operand log level
    #[arg(long, value_enum, default_value_t = LogLevel::Normal)]
    log_level: LogLevel,

    /// Control plane topology of the cluster
    #[arg(long, value_enum, default_value_t = Topology::HighlyAvailable)]
    topology: Topology,

    /// List drivers and embedded assets
    #[arg(long)]
    list: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Normal,
    Debug,
    Trace,
    TraceAll,
}

impl From<LogLevel> for crd::LogLevel {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Normal => crd::LogLevel::Normal,
            LogLevel::Debug => crd::LogLevel::Debug,
            LogLevel::Trace => crd::LogLevel::Trace,
            LogLevel::TraceAll => crd::LogLevel::TraceAll,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Topology {
    HighlyAvailable,
    SingleReplica,
    External,
}

impl From<Topology> for TopologyMode {
    fn from(topology: Topology) -> Self {
        match topology {
            Topology::HighlyAvailable => TopologyMode::HighlyAvailable,
            Topology::SingleReplica => TopologyMode::SingleReplica,
            Topology::External => TopologyMode::External,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let drivers = driver_configs();

    if args.list {
        for driver in &drivers {
            println!("driver {}", driver.name);
        }
        for name in assets::names() {
            println!("asset {name}");
        }
        return Ok(());
    }

    let config = OperatorConfig::from_env();
    let mut loader = AssetLoader::new(
        common_replacer(&config.environment).extend(namespace_replacer(&args.namespace)),
    );
    let driver = match &args.driver {
        Some(name) => match drivers.iter().find(|d| d.name == name.as_str()) {
            Some(driver) => {
                loader = loader.with(driver.image_replacer(&config.environment));
                Some(driver)
            }
            None => bail!("unknown driver {name}; see --list"),
        },
        None => None,
    };

    let rendered = match (&args.asset, driver) {
        (Some(asset), _) => {
            let object = loader.load(asset)?;
            serde_yaml::to_string(&object)?
        }
        (None, Some(driver)) => {
            let storage = Storage::new(
                crd::OPERATOR_CONFIG_NAME,
                StorageSpec {
                    log_level: args.log_level.into(),
                    ..Default::default()
                },
            );
            let deployment = render_deployment(
                &loader,
                &driver.deployment_asset,
                &storage,
                args.topology.into(),
            )
            .with_context(|| format!("failed to render {}", driver.deployment_asset))?;
            serde_yaml::to_string(&deployment)?
        }
        (None, None) => bail!("either --driver or --asset is required"),
    };
    print!("{rendered}");
    Ok(())
}
