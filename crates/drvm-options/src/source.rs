//! Source option extraction: the current disk, network and compute state of
//! an Azure VM, in the same shape the resolvers produce.

use log::{debug, info};

use crate::disks::{disk_size, invert_lun_map, lun_for_disk, source_disk_sku, DiskMap};
use crate::types::{AzureVm, DiskOptions, DrResult, VmOptionsRecord};

/// Describe `vm` as it is now.
///
/// `restoreAsManagedVM` reports whether the source uses managed disks, and
/// `nicCount` is the source's NIC count rather than `nic_details.len()`.
pub fn extract_source_options(vm: &AzureVm) -> DrResult<VmOptionsRecord> {
    info!("extract_source_options({})", vm.name);
    let luns = invert_lun_map(vm);

    let mut disks = DiskMap::with_capacity(vm.disk_dict.len());
    for (disk_name, uri) in &vm.disk_dict {
        let lun = lun_for_disk(vm, &luns, disk_name)?;
        let sku = if vm.managed_disk {
            source_disk_sku(vm, lun).map(str::to_string)
        } else {
            None
        };
        debug!("source disk {} (lun {}) sku={:?}", disk_name, lun, sku);
        disks.insert(
            disk_name.clone(),
            DiskOptions {
                uri: Some(uri.clone()),
                size: Some(disk_size(vm, disk_name)?),
                sku,
                is_managed: vm.managed_disk,
                lun,
            },
        );
    }

    Ok(VmOptionsRecord {
        cpu_count: vm.no_of_cpu,
        memory: vm.memory,
        disks,
        nic_count: vm.nic_count,
        resource_group: Some(vm.resource_group_name.clone()),
        region: Some(vm.region.clone()),
        availability_zone: vm.availability_zone.clone(),
        vm_size: vm.vm_size.clone(),
        virtual_networks: Some(vm.nic_details.iter().map(|n| n.subnet_uri.clone()).collect()),
        network_security_groups: Some(vm.nic_details.iter().map(|n| n.nsg_uri.clone()).collect()),
        create_public_ip: vm.nic_details.iter().map(|n| n.has_public_ip()).collect(),
        restore_as_managed_vm: vm.managed_disk,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiskSkuInfo, DrErrorKind, NicDetail};

    fn sku(t: &str) -> DiskSkuInfo {
        DiskSkuInfo {
            storage_account_type: Some(t.into()),
            name: None,
        }
    }

    fn make_vm(managed: bool) -> AzureVm {
        let mut vm = AzureVm {
            name: "src1".into(),
            managed_disk: managed,
            no_of_cpu: 4,
            memory: 16.0,
            nic_count: 3,
            resource_group_name: "prod-rg".into(),
            region: "eastus".into(),
            availability_zone: Some("2".into()),
            vm_size: Some("Standard_D4s_v3".into()),
            nic_details: vec![
                NicDetail {
                    subnet_uri: Some("/subnets/a".into()),
                    nsg_uri: Some("/nsg/a".into()),
                    public_ip_uri: Some("/pip/a".into()),
                    ..Default::default()
                },
                NicDetail {
                    subnet_uri: Some("/subnets/b".into()),
                    public_ip_uri: Some(String::new()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        vm.disk_dict.insert("disk0".into(), "uri0".into());
        vm.disk_dict.insert("disk1".into(), "uri1".into());
        vm.disk_lun_dict.insert(0, "disk0".into());
        vm.disk_lun_dict.insert(1, "disk1".into());
        vm.disk_size_dict.insert("disk0".into(), 128);
        vm.disk_size_dict.insert("disk1".into(), 256);
        vm.disk_sku_dict.insert(0, sku("Premium_LRS"));
        vm.disk_sku_dict.insert(1, sku("Standard_LRS"));
        vm
    }

    #[test]
    fn managed_disks_carry_sku_and_uri() {
        let record = extract_source_options(&make_vm(true)).unwrap();
        assert_eq!(
            record.disks["disk0"],
            DiskOptions {
                uri: Some("uri0".into()),
                size: Some(128),
                sku: Some("Premium_LRS".into()),
                is_managed: true,
                lun: 0,
            }
        );
        assert_eq!(record.disks["disk1"].sku.as_deref(), Some("Standard_LRS"));
        assert!(record.restore_as_managed_vm);
    }

    #[test]
    fn unmanaged_disks_have_no_sku() {
        let record = extract_source_options(&make_vm(false)).unwrap();
        assert!(record.disks.values().all(|d| d.sku.is_none() && !d.is_managed));
        assert!(!record.restore_as_managed_vm);
    }

    #[test]
    fn disk_order_follows_attachment_order() {
        let record = extract_source_options(&make_vm(true)).unwrap();
        assert_eq!(record.disks.keys().collect::<Vec<_>>(), vec!["disk0", "disk1"]);
    }

    #[test]
    fn network_projection_per_nic() {
        let record = extract_source_options(&make_vm(true)).unwrap();
        assert_eq!(
            record.virtual_networks,
            Some(vec![Some("/subnets/a".into()), Some("/subnets/b".into())])
        );
        assert_eq!(
            record.network_security_groups,
            Some(vec![Some("/nsg/a".into()), None])
        );
        assert_eq!(record.create_public_ip, vec![true, false]);
        assert_eq!(record.nic_count, 3);
    }

    #[test]
    fn scalars_copied_verbatim() {
        let record = extract_source_options(&make_vm(true)).unwrap();
        assert_eq!(record.cpu_count, 4);
        assert_eq!(record.memory, 16.0);
        assert_eq!(record.resource_group.as_deref(), Some("prod-rg"));
        assert_eq!(record.region.as_deref(), Some("eastus"));
        assert_eq!(record.availability_zone.as_deref(), Some("2"));
        assert_eq!(record.vm_size.as_deref(), Some("Standard_D4s_v3"));
    }

    #[test]
    fn disk_without_lun_is_rejected() {
        let mut vm = make_vm(true);
        vm.disk_lun_dict.remove(&1);
        let err = extract_source_options(&vm).unwrap_err();
        assert_eq!(err.kind, DrErrorKind::InconsistentDiskMapping);
    }
}
