//! Destination option resolution for a DR restore or failover.
//!
//! Four independent axes drive the result: managed or unmanaged target,
//! Azure or cross-hypervisor source, explicit or `"Auto"` disk type, and
//! whether unmanaged blobs are emitted next to managed disks (DVDF).

use log::{debug, info};

use crate::disks::{managed_azure_disks, managed_foreign_disks, unmanaged_blob_disks, BlobTarget, DiskMap};
use crate::types::{
    AdvancedRestoreOptions, DrError, DrOptionsConfig, DrResult, RestoreOptionsInput, SourceVm,
    VmOptionsRecord,
};

/// Resolve the VM configuration to provision for `source`.
pub fn resolve_destination_options(
    source: &SourceVm,
    restore_options: &RestoreOptionsInput,
    config: &DrOptionsConfig,
) -> DrResult<VmOptionsRecord> {
    let adv = &restore_options.advanced_restore_options;
    let restore_managed_vm = adv.restore_as_managed_vm;
    info!(
        "resolve_destination_options({}) managed={} dvdf={}",
        source.name(),
        restore_managed_vm,
        adv.deploy_vm_when_failover
    );

    let mut disks = DiskMap::new();
    if restore_managed_vm {
        // None means "match each disk's source SKU".
        let disk_type = adv.volume_type.explicit();
        if adv.volume_type.is_auto() {
            debug!("disk type Auto for {}", source.name());
        }
        disks.extend(match source {
            SourceVm::Azure(vm) => managed_azure_disks(vm, disk_type, config)?,
            SourceVm::Foreign(vm) => managed_foreign_disks(vm.disk_count, disk_type, config),
        });
    }
    if !restore_managed_vm || adv.deploy_vm_when_failover {
        let vm_name = adv.new_name.as_deref().unwrap_or(source.name());
        let target = blob_target(adv, vm_name)?;
        debug!("unmanaged blobs under {}", target.container_url(config));
        disks.extend(unmanaged_blob_disks(&target, source.disk_count(), config));
    }

    let azure = source.as_azure();
    let record = VmOptionsRecord {
        cpu_count: source.cpu_count(),
        memory: source.memory(),
        disks,
        nic_count: config.destination_nic_count,
        resource_group: adv.esx_host.clone(),
        region: adv.datacenter.clone(),
        availability_zone: adv
            .availability_zones
            .or_inherit(azure.and_then(|vm| vm.availability_zone.as_deref())),
        vm_size: adv.vm_size.or_inherit(azure.and_then(|vm| vm.vm_size.as_deref())),
        virtual_networks: resolve_virtual_networks(adv, source),
        network_security_groups: resolve_security_groups(adv, source),
        create_public_ip: vec![adv.create_public_ip],
        restore_as_managed_vm: restore_managed_vm,
    };
    debug!(
        "{}: {} managed disks, {} blobs",
        source.name(),
        record.managed_disks().count(),
        record.blob_disks().count()
    );
    Ok(record)
}

fn blob_target<'a>(adv: &'a AdvancedRestoreOptions, vm_name: &'a str) -> DrResult<BlobTarget<'a>> {
    Ok(BlobTarget {
        resource_group: adv
            .esx_host
            .as_deref()
            .ok_or_else(|| DrError::missing_option("esxHost"))?,
        vm_name,
        storage_account: adv
            .datastore
            .as_deref()
            .ok_or_else(|| DrError::missing_option("Datastore"))?,
    })
}

/// Subnet overrides, else the Azure source's subnets, else nothing.
fn resolve_virtual_networks(
    adv: &AdvancedRestoreOptions,
    source: &SourceVm,
) -> Option<Vec<Option<String>>> {
    let overrides = adv.subnet_ids();
    if !overrides.is_empty() {
        return Some(overrides.into_iter().map(Some).collect());
    }
    source
        .as_azure()
        .map(|vm| vm.nic_details.iter().map(|n| n.subnet_uri.clone()).collect())
}

/// NSG overrides, else the Azure source's NSGs when it has NICs.
fn resolve_security_groups(
    adv: &AdvancedRestoreOptions,
    source: &SourceVm,
) -> Option<Vec<Option<String>>> {
    let overrides = adv.security_group_ids();
    if !overrides.is_empty() {
        return Some(overrides.into_iter().map(Some).collect());
    }
    source
        .as_azure()
        .filter(|vm| !vm.nic_details.is_empty())
        .map(|vm| vm.nic_details.iter().map(|n| n.nsg_uri.clone()).collect())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AutoSetting, AzureVm, DiskSkuInfo, DrErrorKind, ForeignVm, NicDetail, NicOverride,
        SecurityGroupOverride,
    };

    fn azure_source() -> SourceVm {
        let mut vm = AzureVm {
            name: "src1".into(),
            managed_disk: true,
            no_of_cpu: 2,
            memory: 8.0,
            nic_count: 2,
            resource_group_name: "prod-rg".into(),
            region: "eastus".into(),
            availability_zone: Some("1".into()),
            vm_size: Some("Standard_D2s_v3".into()),
            nic_details: vec![NicDetail {
                subnet_uri: Some("/subnets/prod".into()),
                nsg_uri: Some("/nsg/prod".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        vm.disk_dict.insert("disk0".into(), "uri0".into());
        vm.disk_dict.insert("disk1".into(), "uri1".into());
        vm.disk_lun_dict.insert(0, "disk0".into());
        vm.disk_lun_dict.insert(1, "disk1".into());
        vm.disk_size_dict.insert("disk0".into(), 30);
        vm.disk_size_dict.insert("disk1".into(), 10);
        vm.disk_sku_dict.insert(
            0,
            DiskSkuInfo {
                storage_account_type: Some("Premium_LRS".into()),
                name: Some("disk0".into()),
            },
        );
        SourceVm::Azure(vm)
    }

    fn foreign_source() -> SourceVm {
        SourceVm::Foreign(ForeignVm {
            name: "vmw1".into(),
            hypervisor: Some("VMware".into()),
            no_of_cpu: 8,
            memory: 32.0,
            disk_count: 2,
        })
    }

    fn options(adv: AdvancedRestoreOptions) -> RestoreOptionsInput {
        RestoreOptionsInput {
            advanced_restore_options: adv,
        }
    }

    fn managed_adv() -> AdvancedRestoreOptions {
        AdvancedRestoreOptions {
            esx_host: Some("RG1".into()),
            datastore: Some("sa1".into()),
            restore_as_managed_vm: true,
            datacenter: Some("westus".into()),
            ..Default::default()
        }
    }

    #[test]
    fn managed_auto_type_matches_source_per_disk() {
        let cfg = DrOptionsConfig::default();
        let record = resolve_destination_options(&azure_source(), &options(managed_adv()), &cfg).unwrap();
        assert_eq!(record.disks.len(), 2);
        assert_eq!(record.disks["disk0"].sku.as_deref(), Some("Premium_LRS"));
        assert_eq!(record.disks["disk1"].sku.as_deref(), Some("Standard_LRS"));
        assert!(record.disks.values().all(|d| d.uri.is_none() && d.is_managed));
        assert_eq!(record.disks["disk1"].size, Some(10));
        assert_eq!(record.disks["disk1"].lun, 1);
    }

    #[test]
    fn managed_explicit_type_applies_to_all_disks() {
        let adv = AdvancedRestoreOptions {
            volume_type: AutoSetting::from("StandardSSD_LRS"),
            ..managed_adv()
        };
        let record =
            resolve_destination_options(&azure_source(), &options(adv), &DrOptionsConfig::default()).unwrap();
        assert!(record
            .disks
            .values()
            .all(|d| d.sku.as_deref() == Some("StandardSSD_LRS")));
    }

    #[test]
    fn managed_foreign_source_uses_synthetic_names() {
        let record =
            resolve_destination_options(&foreign_source(), &options(managed_adv()), &DrOptionsConfig::default())
                .unwrap();
        assert_eq!(record.disks.keys().collect::<Vec<_>>(), vec!["OsDisk", "DataDisk_1"]);
        assert_eq!(record.disks["OsDisk"].lun, -1);
        assert_eq!(record.disks["OsDisk"].size, None);
        assert_eq!(record.disks["OsDisk"].sku.as_deref(), Some("Standard_LRS"));
        assert_eq!(record.cpu_count, 8);
        assert_eq!(record.memory, 32.0);
    }

    #[test]
    fn unmanaged_target_emits_blobs_only() {
        let adv = AdvancedRestoreOptions {
            restore_as_managed_vm: false,
            new_name: Some("DRVM".into()),
            ..managed_adv()
        };
        let record =
            resolve_destination_options(&azure_source(), &options(adv), &DrOptionsConfig::default()).unwrap();
        assert_eq!(
            record.disks.keys().collect::<Vec<_>>(),
            vec!["rg1-drvm.vhd", "rg1-drvm-1.vhd"]
        );
        assert!(!record.restore_as_managed_vm);
        assert!(record.disks.values().all(|d| !d.is_managed));
    }

    #[test]
    fn unmanaged_vm_name_defaults_to_source_name() {
        let adv = AdvancedRestoreOptions {
            restore_as_managed_vm: false,
            ..managed_adv()
        };
        let record =
            resolve_destination_options(&azure_source(), &options(adv), &DrOptionsConfig::default()).unwrap();
        assert!(record.disks.contains_key("rg1-src1.vhd"));
    }

    #[test]
    fn dvdf_emits_managed_and_blob_disks() {
        let adv = AdvancedRestoreOptions {
            deploy_vm_when_failover: true,
            new_name: Some("vm1".into()),
            ..managed_adv()
        };
        let record =
            resolve_destination_options(&azure_source(), &options(adv), &DrOptionsConfig::default()).unwrap();
        assert_eq!(record.disks.len(), 4);
        assert_eq!(record.managed_disks().count(), 2);
        assert_eq!(record.blob_disks().count(), 2);
        assert!(record.disks.contains_key("disk0"));
        assert!(record.disks.contains_key("rg1-vm1.vhd"));
    }

    #[test]
    fn blob_branch_requires_storage_account() {
        let adv = AdvancedRestoreOptions {
            restore_as_managed_vm: false,
            datastore: None,
            ..managed_adv()
        };
        let err = resolve_destination_options(&azure_source(), &options(adv), &DrOptionsConfig::default())
            .unwrap_err();
        assert_eq!(err.kind, DrErrorKind::MissingOption);
        assert!(err.message.contains("Datastore"));
    }

    #[test]
    fn auto_zone_and_size_inherit_from_azure_source() {
        let record =
            resolve_destination_options(&azure_source(), &options(managed_adv()), &DrOptionsConfig::default())
                .unwrap();
        assert_eq!(record.availability_zone.as_deref(), Some("1"));
        assert_eq!(record.vm_size.as_deref(), Some("Standard_D2s_v3"));
    }

    #[test]
    fn auto_zone_and_size_are_none_for_foreign_source() {
        let record =
            resolve_destination_options(&foreign_source(), &options(managed_adv()), &DrOptionsConfig::default())
                .unwrap();
        assert_eq!(record.availability_zone, None);
        assert_eq!(record.vm_size, None);
        assert_eq!(record.virtual_networks, None);
        assert_eq!(record.network_security_groups, None);
    }

    #[test]
    fn explicit_zone_and_size_win() {
        let adv = AdvancedRestoreOptions {
            availability_zones: AutoSetting::from("3"),
            vm_size: AutoSetting::from("Standard_B2s"),
            ..managed_adv()
        };
        let record =
            resolve_destination_options(&azure_source(), &options(adv), &DrOptionsConfig::default()).unwrap();
        assert_eq!(record.availability_zone.as_deref(), Some("3"));
        assert_eq!(record.vm_size.as_deref(), Some("Standard_B2s"));
    }

    #[test]
    fn network_overrides_win_over_source() {
        let adv = AdvancedRestoreOptions {
            nics: vec![
                NicOverride {
                    subnet_id: Some("/subnets/dr".into()),
                },
                NicOverride { subnet_id: None },
            ],
            security_groups: vec![SecurityGroupOverride {
                group_id: Some("/nsg/dr".into()),
            }],
            ..managed_adv()
        };
        let record =
            resolve_destination_options(&azure_source(), &options(adv), &DrOptionsConfig::default()).unwrap();
        assert_eq!(record.virtual_networks, Some(vec![Some("/subnets/dr".into())]));
        assert_eq!(record.network_security_groups, Some(vec![Some("/nsg/dr".into())]));
    }

    #[test]
    fn network_falls_back_to_azure_source() {
        let record =
            resolve_destination_options(&azure_source(), &options(managed_adv()), &DrOptionsConfig::default())
                .unwrap();
        assert_eq!(record.virtual_networks, Some(vec![Some("/subnets/prod".into())]));
        assert_eq!(record.network_security_groups, Some(vec![Some("/nsg/prod".into())]));
    }

    #[test]
    fn nsg_fallback_needs_source_nics() {
        let mut source = azure_source();
        if let SourceVm::Azure(vm) = &mut source {
            vm.nic_details.clear();
        }
        let record =
            resolve_destination_options(&source, &options(managed_adv()), &DrOptionsConfig::default()).unwrap();
        assert_eq!(record.network_security_groups, None);
        assert_eq!(record.virtual_networks, Some(vec![]));
    }

    #[test]
    fn fixed_scalars() {
        let adv = AdvancedRestoreOptions {
            create_public_ip: true,
            ..managed_adv()
        };
        let record =
            resolve_destination_options(&azure_source(), &options(adv), &DrOptionsConfig::default()).unwrap();
        assert_eq!(record.nic_count, 1);
        assert_eq!(record.create_public_ip, vec![true]);
        assert_eq!(record.resource_group.as_deref(), Some("RG1"));
        assert_eq!(record.region.as_deref(), Some("westus"));
        assert_eq!(record.cpu_count, 2);
        assert!(record.restore_as_managed_vm);
    }
}
