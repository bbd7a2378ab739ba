//! CSI driver operators
//!
//! Every supported driver is a row of [`DriverConfig`]. The
//! [`starter::CSIDriverStarter`] decides which rows apply to the cluster and
//! runs a [`manager::DriverManager`] for each of them.

pub mod cr;
pub mod manager;
pub mod olmremoval;
pub mod starter;

use crate::assets::replace::{env_replacer, Replacer};
use crate::config::Environment;
use crate::crd::{FeatureGates, Infrastructure, PlatformType};
use crate::error::{Error, Result};
use k8s_openapi::api::storage::v1::CSIDriver;
use kube::api::GroupVersionKind;

pub use manager::DriverManager;
pub use starter::CSIDriverStarter;

/// Annotation marking a CSIDriver object as installed by this operator
pub const MANAGED_ANNOTATION: &str = "csi.openshift.io/managed";

/// Platforms a driver runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformSelector {
    All,
    Only(PlatformType),
}

impl PlatformSelector {
    pub fn matches(self, platform: Option<PlatformType>) -> bool {
        match self {
            PlatformSelector::All => true,
            PlatformSelector::Only(want) => platform == Some(want),
        }
    }
}

/// A copy of the driver operator previously installed through OLM
#[derive(Debug, Clone)]
pub struct OlmConfig {
    /// `spec.name` of the Subscription
    pub package_name: &'static str,
    /// Deployment OLM created for the legacy operator
    pub deployment_name: &'static str,
    /// Kind of the legacy driver CR, always named `cluster`
    pub cr_kind: GroupVersionKind,
}

/// Static description of one CSI driver operator
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Asset directory under `csidriveroperators/`
    pub name: &'static str,
    /// CSI driver name, also the name of its ClusterCSIDriver
    pub driver_name: &'static str,
    /// Prefix of every condition the driver's controllers write
    pub condition_prefix: &'static str,
    pub platform: PlatformSelector,
    /// Extra check on the Infrastructure; the driver is skipped when it returns false
    pub status_filter: Option<fn(&Infrastructure) -> bool>,
    pub require_feature_gate: Option<&'static str>,
    /// Cluster-scoped assets, applied to the guest cluster
    pub static_assets: Vec<String>,
    /// Namespaced assets, applied next to the operator Deployment
    pub control_plane_assets: Vec<String>,
    pub cr_asset: String,
    pub deployment_asset: String,
    pub service_monitor_asset: Option<String>,
    /// `(placeholder, environment variable)` pairs
    pub images: Vec<(&'static str, &'static str)>,
    pub olm: Option<OlmConfig>,
    /// The driver operator may legitimately never report Available
    pub optional: bool,
    /// Supported in hosted control plane mode
    pub hosted: bool,
}

impl DriverConfig {
    /// A driver using the conventional asset layout and image variables `<env>_DRIVER_OPERATOR_IMAGE`
    /// and `<env>_DRIVER_IMAGE`
    pub fn new(
        name: &'static str,
        driver_name: &'static str,
        condition_prefix: &'static str,
        platform: PlatformSelector,
        images: [(&'static str, &'static str); 2],
    ) -> Self {
        let asset = |file: &str| format!("csidriveroperators/{name}/{file}");
        Self {
            name,
            driver_name,
            condition_prefix,
            platform,
            status_filter: None,
            require_feature_gate: None,
            static_assets: vec![
                asset("01_clusterrole.yaml"),
                asset("02_clusterrolebinding.yaml"),
            ],
            control_plane_assets: vec![
                asset("03_sa.yaml"),
                asset("04_role.yaml"),
                asset("05_rolebinding.yaml"),
            ],
            cr_asset: asset("06_cr.yaml"),
            deployment_asset: asset("07_deployment.yaml"),
            service_monitor_asset: None,
            images: images.to_vec(),
            olm: None,
            optional: false,
            hosted: false,
        }
    }

    fn with_image(mut self, placeholder: &'static str, var: &'static str) -> Self {
        self.images.push((placeholder, var));
        self
    }

    fn with_service_monitor(mut self) -> Self {
        self.service_monitor_asset = Some(format!(
            "csidriveroperators/{}/08_servicemonitor.yaml",
            self.name
        ));
        self
    }

    fn with_status_filter(mut self, filter: fn(&Infrastructure) -> bool) -> Self {
        self.status_filter = Some(filter);
        self
    }

    fn with_feature_gate(mut self, gate: &'static str) -> Self {
        self.require_feature_gate = Some(gate);
        self
    }

    fn with_olm(mut self, olm: OlmConfig) -> Self {
        self.olm = Some(olm);
        self
    }

    fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn hosted(mut self) -> Self {
        self.hosted = true;
        self
    }

    /// Every asset the driver renders
    pub fn asset_names(&self) -> impl Iterator<Item = &str> {
        self.static_assets
            .iter()
            .chain(&self.control_plane_assets)
            .chain([&self.cr_asset, &self.deployment_asset])
            .chain(&self.service_monitor_asset)
            .map(String::as_str)
    }

    pub fn image_replacer(&self, env: &Environment) -> Replacer {
        env_replacer(env, &self.images)
    }

    pub fn static_controller_name(&self) -> String {
        format!("{}CSIDriverOperatorStaticController", self.condition_prefix)
    }

    pub fn cr_controller_name(&self) -> String {
        format!("{}CSIDriverOperatorCRController", self.condition_prefix)
    }

    pub fn deployment_controller_name(&self) -> String {
        format!("{}CSIDriverOperatorDeploymentController", self.condition_prefix)
    }

    pub fn service_monitor_controller_name(&self) -> String {
        format!("{}CSIDriverOperatorServiceMonitorController", self.condition_prefix)
    }

    pub fn olm_controller_name(&self) -> String {
        format!("{}OLMOperatorRemovalController", self.condition_prefix)
    }

    /// Condition the deployment waits for when legacy removal is configured
    pub fn olm_available_condition(&self) -> String {
        format!("{}OLMOperatorRemovalAvailable", self.condition_prefix)
    }
}

/// Operator and driver image placeholders backed by `operator` and `driver`
fn images(operator: &'static str, driver: &'static str) -> [(&'static str, &'static str); 2] {
    [("OPERATOR_IMAGE", operator), ("DRIVER_IMAGE", driver)]
}

fn not_azure_stack_hub(infra: &Infrastructure) -> bool {
    infra.azure_cloud_name() != Some("AzureStackCloud")
}

/// Every driver this operator knows how to run
pub fn driver_configs() -> Vec<DriverConfig> {
    use PlatformSelector::{All, Only};
    vec![
        DriverConfig::new(
            "aws-ebs",
            "ebs.csi.aws.com",
            "AWSEBS",
            Only(PlatformType::AWS),
            images("AWS_EBS_DRIVER_OPERATOR_IMAGE", "AWS_EBS_DRIVER_IMAGE"),
        )
        .with_service_monitor()
        .with_olm(OlmConfig {
            package_name: "aws-ebs-csi-driver-operator",
            deployment_name: "aws-ebs-csi-driver-operator",
            cr_kind: GroupVersionKind::gvk("csi.openshift.io", "v1alpha1", "AWSEBSDriver"),
        })
        .hosted(),
        DriverConfig::new(
            "gcp-pd",
            "pd.csi.storage.gke.io",
            "GCPPD",
            Only(PlatformType::GCP),
            images("GCP_PD_DRIVER_OPERATOR_IMAGE", "GCP_PD_DRIVER_IMAGE"),
        ),
        DriverConfig::new(
            "azure-disk",
            "disk.csi.azure.com",
            "AzureDisk",
            Only(PlatformType::Azure),
            images("AZURE_DISK_DRIVER_OPERATOR_IMAGE", "AZURE_DISK_DRIVER_IMAGE"),
        )
        .with_image(
            "ARO_HCP_SECRET_PROVIDER_CLASS",
            "ARO_HCP_SECRET_PROVIDER_CLASS_FOR_DISK",
        )
        .hosted(),
        DriverConfig::new(
            "azure-file",
            "file.csi.azure.com",
            "AzureFile",
            Only(PlatformType::Azure),
            images("AZURE_FILE_DRIVER_OPERATOR_IMAGE", "AZURE_FILE_DRIVER_IMAGE"),
        )
        .with_status_filter(not_azure_stack_hub)
        .with_image(
            "ARO_HCP_SECRET_PROVIDER_CLASS",
            "ARO_HCP_SECRET_PROVIDER_CLASS_FOR_FILE",
        )
        .hosted(),
        DriverConfig::new(
            "openstack-cinder",
            "cinder.csi.openstack.org",
            "OpenStackCinder",
            Only(PlatformType::OpenStack),
            images("OPENSTACK_CINDER_DRIVER_OPERATOR_IMAGE", "OPENSTACK_CINDER_DRIVER_IMAGE"),
        ),
        DriverConfig::new(
            "openstack-manila",
            "manila.csi.openstack.org",
            "Manila",
            Only(PlatformType::OpenStack),
            images("MANILA_DRIVER_OPERATOR_IMAGE", "MANILA_DRIVER_IMAGE"),
        )
        .with_image("NFS_DRIVER_IMAGE", "MANILA_NFS_DRIVER_IMAGE")
        .optional(),
        DriverConfig::new(
            "vsphere",
            "csi.vsphere.vmware.com",
            "VMwareVSphere",
            Only(PlatformType::VSphere),
            images("VMWARE_VSPHERE_DRIVER_OPERATOR_IMAGE", "VMWARE_VSPHERE_DRIVER_IMAGE"),
        )
        .with_image("SYNCER_IMAGE", "VMWARE_VSPHERE_SYNCER_IMAGE")
        .with_service_monitor(),
        DriverConfig::new(
            "ibm-vpc-block",
            "vpc.block.csi.ibm.io",
            "IBMVPCBlock",
            Only(PlatformType::IBMCloud),
            images("IBM_VPC_BLOCK_DRIVER_OPERATOR_IMAGE", "IBM_VPC_BLOCK_DRIVER_IMAGE"),
        )
        .with_image("NODE_LABEL_UPDATER_IMAGE", "IBM_VPC_NODE_LABEL_UPDATER_IMAGE"),
        DriverConfig::new(
            "powervs-block",
            "powervs.csi.ibm.com",
            "PowerVSBlock",
            Only(PlatformType::PowerVS),
            images("POWERVS_BLOCK_CSI_DRIVER_OPERATOR_IMAGE", "POWERVS_BLOCK_CSI_DRIVER_IMAGE"),
        ),
        DriverConfig::new(
            "alibaba-disk",
            "diskplugin.csi.alibabacloud.com",
            "AlibabaDisk",
            Only(PlatformType::AlibabaCloud),
            images("ALIBABA_DISK_DRIVER_OPERATOR_IMAGE", "ALIBABA_CLOUD_DRIVER_IMAGE"),
        ),
        DriverConfig::new(
            "shared-resource",
            "csi.sharedresource.openshift.io",
            "SharedResources",
            All,
            images("SHARED_RESOURCE_DRIVER_OPERATOR_IMAGE", "SHARED_RESOURCE_DRIVER_IMAGE"),
        )
        .with_image("WEBHOOK_IMAGE", "SHARED_RESOURCE_DRIVER_WEBHOOK_IMAGE")
        .with_feature_gate("CSIDriverSharedResource"),
        DriverConfig::new(
            "ovirt",
            "csi.ovirt.org",
            "Ovirt",
            Only(PlatformType::Ovirt),
            images("OVIRT_DRIVER_OPERATOR_IMAGE", "OVIRT_DRIVER_IMAGE"),
        ),
    ]
}

/// Drivers supported in hosted control plane mode
pub fn hosted_driver_configs() -> Vec<DriverConfig> {
    driver_configs().into_iter().filter(|c| c.hosted).collect()
}

/// Whether a CSIDriver object was installed by something other than this operator
pub fn is_foreign(csi_driver: &CSIDriver) -> bool {
    csi_driver
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(MANAGED_ANNOTATION))
        .map_or(true, |v| v != "true")
}

/// Decide whether the driver's operator should run on this cluster.
///
/// A CSIDriver of the same name installed by someone else is an error, so
/// the administrator learns about the conflict instead of the driver silently
/// staying off. `gates` is `None` until the FeatureGate has been observed.
pub fn should_run(
    config: &DriverConfig,
    infra: &Infrastructure,
    gates: Option<&FeatureGates>,
    csi_driver: Option<&CSIDriver>,
) -> Result<bool> {
    if !config.platform.matches(infra.platform()) {
        return Ok(false);
    }
    if let Some(filter) = config.status_filter {
        if !filter(infra) {
            return Ok(false);
        }
    }
    if csi_driver.is_some_and(is_foreign) {
        return Err(Error::ForeignDriver {
            driver: config.driver_name.to_string(),
        });
    }
    match config.require_feature_gate {
        None => Ok(true),
        Some(gate) => Ok(gates.is_some_and(|g| g.is_known(gate) && g.is_enabled(gate))),
    }
}
