//! Compiled-in asset bundle

/// (name, content) of every embedded asset
pub(crate) static ASSETS: &[(&str, &str)] = &[
    (
        "csidriveroperators/alibaba-disk/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/alibaba-disk/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/alibaba-disk/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/alibaba-disk/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/alibaba-disk/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/alibaba-disk/03_sa.yaml"),
    ),
    (
        "csidriveroperators/alibaba-disk/04_role.yaml",
        include_str!("../../assets/csidriveroperators/alibaba-disk/04_role.yaml"),
    ),
    (
        "csidriveroperators/alibaba-disk/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/alibaba-disk/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/alibaba-disk/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/alibaba-disk/06_cr.yaml"),
    ),
    (
        "csidriveroperators/alibaba-disk/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/alibaba-disk/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/aws-ebs/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/aws-ebs/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/aws-ebs/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/aws-ebs/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/aws-ebs/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/aws-ebs/03_sa.yaml"),
    ),
    (
        "csidriveroperators/aws-ebs/04_role.yaml",
        include_str!("../../assets/csidriveroperators/aws-ebs/04_role.yaml"),
    ),
    (
        "csidriveroperators/aws-ebs/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/aws-ebs/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/aws-ebs/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/aws-ebs/06_cr.yaml"),
    ),
    (
        "csidriveroperators/aws-ebs/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/aws-ebs/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/aws-ebs/08_servicemonitor.yaml",
        include_str!("../../assets/csidriveroperators/aws-ebs/08_servicemonitor.yaml"),
    ),
    (
        "csidriveroperators/azure-disk/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/azure-disk/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/azure-disk/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/azure-disk/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/azure-disk/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/azure-disk/03_sa.yaml"),
    ),
    (
        "csidriveroperators/azure-disk/04_role.yaml",
        include_str!("../../assets/csidriveroperators/azure-disk/04_role.yaml"),
    ),
    (
        "csidriveroperators/azure-disk/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/azure-disk/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/azure-disk/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/azure-disk/06_cr.yaml"),
    ),
    (
        "csidriveroperators/azure-disk/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/azure-disk/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/azure-file/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/azure-file/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/azure-file/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/azure-file/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/azure-file/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/azure-file/03_sa.yaml"),
    ),
    (
        "csidriveroperators/azure-file/04_role.yaml",
        include_str!("../../assets/csidriveroperators/azure-file/04_role.yaml"),
    ),
    (
        "csidriveroperators/azure-file/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/azure-file/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/azure-file/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/azure-file/06_cr.yaml"),
    ),
    (
        "csidriveroperators/azure-file/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/azure-file/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/gcp-pd/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/gcp-pd/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/gcp-pd/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/gcp-pd/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/gcp-pd/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/gcp-pd/03_sa.yaml"),
    ),
    (
        "csidriveroperators/gcp-pd/04_role.yaml",
        include_str!("../../assets/csidriveroperators/gcp-pd/04_role.yaml"),
    ),
    (
        "csidriveroperators/gcp-pd/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/gcp-pd/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/gcp-pd/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/gcp-pd/06_cr.yaml"),
    ),
    (
        "csidriveroperators/gcp-pd/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/gcp-pd/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/ibm-vpc-block/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/ibm-vpc-block/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/ibm-vpc-block/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/ibm-vpc-block/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/ibm-vpc-block/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/ibm-vpc-block/03_sa.yaml"),
    ),
    (
        "csidriveroperators/ibm-vpc-block/04_role.yaml",
        include_str!("../../assets/csidriveroperators/ibm-vpc-block/04_role.yaml"),
    ),
    (
        "csidriveroperators/ibm-vpc-block/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/ibm-vpc-block/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/ibm-vpc-block/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/ibm-vpc-block/06_cr.yaml"),
    ),
    (
        "csidriveroperators/ibm-vpc-block/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/ibm-vpc-block/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/openstack-cinder/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/openstack-cinder/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/openstack-cinder/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/openstack-cinder/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/openstack-cinder/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/openstack-cinder/03_sa.yaml"),
    ),
    (
        "csidriveroperators/openstack-cinder/04_role.yaml",
        include_str!("../../assets/csidriveroperators/openstack-cinder/04_role.yaml"),
    ),
    (
        "csidriveroperators/openstack-cinder/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/openstack-cinder/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/openstack-cinder/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/openstack-cinder/06_cr.yaml"),
    ),
    (
        "csidriveroperators/openstack-cinder/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/openstack-cinder/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/openstack-manila/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/openstack-manila/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/openstack-manila/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/openstack-manila/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/openstack-manila/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/openstack-manila/03_sa.yaml"),
    ),
    (
        "csidriveroperators/openstack-manila/04_role.yaml",
        include_str!("../../assets/csidriveroperators/openstack-manila/04_role.yaml"),
    ),
    (
        "csidriveroperators/openstack-manila/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/openstack-manila/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/openstack-manila/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/openstack-manila/06_cr.yaml"),
    ),
    (
        "csidriveroperators/openstack-manila/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/openstack-manila/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/ovirt/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/ovirt/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/ovirt/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/ovirt/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/ovirt/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/ovirt/03_sa.yaml"),
    ),
    (
        "csidriveroperators/ovirt/04_role.yaml",
        include_str!("../../assets/csidriveroperators/ovirt/04_role.yaml"),
    ),
    (
        "csidriveroperators/ovirt/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/ovirt/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/ovirt/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/ovirt/06_cr.yaml"),
    ),
    (
        "csidriveroperators/ovirt/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/ovirt/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/powervs-block/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/powervs-block/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/powervs-block/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/powervs-block/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/powervs-block/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/powervs-block/03_sa.yaml"),
    ),
    (
        "csidriveroperators/powervs-block/04_role.yaml",
        include_str!("../../assets/csidriveroperators/powervs-block/04_role.yaml"),
    ),
    (
        "csidriveroperators/powervs-block/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/powervs-block/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/powervs-block/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/powervs-block/06_cr.yaml"),
    ),
    (
        "csidriveroperators/powervs-block/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/powervs-block/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/shared-resource/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/shared-resource/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/shared-resource/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/shared-resource/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/shared-resource/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/shared-resource/03_sa.yaml"),
    ),
    (
        "csidriveroperators/shared-resource/04_role.yaml",
        include_str!("../../assets/csidriveroperators/shared-resource/04_role.yaml"),
    ),
    (
        "csidriveroperators/shared-resource/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/shared-resource/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/shared-resource/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/shared-resource/06_cr.yaml"),
    ),
    (
        "csidriveroperators/shared-resource/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/shared-resource/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/vsphere/01_clusterrole.yaml",
        include_str!("../../assets/csidriveroperators/vsphere/01_clusterrole.yaml"),
    ),
    (
        "csidriveroperators/vsphere/02_clusterrolebinding.yaml",
        include_str!("../../assets/csidriveroperators/vsphere/02_clusterrolebinding.yaml"),
    ),
    (
        "csidriveroperators/vsphere/03_sa.yaml",
        include_str!("../../assets/csidriveroperators/vsphere/03_sa.yaml"),
    ),
    (
        "csidriveroperators/vsphere/04_role.yaml",
        include_str!("../../assets/csidriveroperators/vsphere/04_role.yaml"),
    ),
    (
        "csidriveroperators/vsphere/05_rolebinding.yaml",
        include_str!("../../assets/csidriveroperators/vsphere/05_rolebinding.yaml"),
    ),
    (
        "csidriveroperators/vsphere/06_cr.yaml",
        include_str!("../../assets/csidriveroperators/vsphere/06_cr.yaml"),
    ),
    (
        "csidriveroperators/vsphere/07_deployment.yaml",
        include_str!("../../assets/csidriveroperators/vsphere/07_deployment.yaml"),
    ),
    (
        "csidriveroperators/vsphere/08_servicemonitor.yaml",
        include_str!("../../assets/csidriveroperators/vsphere/08_servicemonitor.yaml"),
    ),
    (
        "storageclasses/vsphere.yaml",
        include_str!("../../assets/storageclasses/vsphere.yaml"),
    ),
    (
        "vsphere_problem_detector/01_sa.yaml",
        include_str!("../../assets/vsphere_problem_detector/01_sa.yaml"),
    ),
    (
        "vsphere_problem_detector/02_role.yaml",
        include_str!("../../assets/vsphere_problem_detector/02_role.yaml"),
    ),
    (
        "vsphere_problem_detector/03_rolebinding.yaml",
        include_str!("../../assets/vsphere_problem_detector/03_rolebinding.yaml"),
    ),
    (
        "vsphere_problem_detector/04_clusterrole.yaml",
        include_str!("../../assets/vsphere_problem_detector/04_clusterrole.yaml"),
    ),
    (
        "vsphere_problem_detector/05_clusterrolebinding.yaml",
        include_str!("../../assets/vsphere_problem_detector/05_clusterrolebinding.yaml"),
    ),
    (
        "vsphere_problem_detector/06_service.yaml",
        include_str!("../../assets/vsphere_problem_detector/06_service.yaml"),
    ),
    (
        "vsphere_problem_detector/07_deployment.yaml",
        include_str!("../../assets/vsphere_problem_detector/07_deployment.yaml"),
    ),
    (
        "vsphere_problem_detector/08_servicemonitor.yaml",
        include_str!("../../assets/vsphere_problem_detector/08_servicemonitor.yaml"),
    ),
    (
        "vsphere_problem_detector/09_prometheusrules.yaml",
        include_str!("../../assets/vsphere_problem_detector/09_prometheusrules.yaml"),
    ),
];
