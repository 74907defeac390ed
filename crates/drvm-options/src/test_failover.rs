//! Option resolution for test failover (a non-destructive DR drill).
//!
//! Only Azure sources are supported here. Hot sites always run managed VMs;
//! warm sites follow the recovery target.

use log::{debug, info};

use crate::disks::{disk_size, invert_lun_map, lun_for_disk, DiskMap};
use crate::types::{
    AzureVm, DiskOptions, DrGroupOptions, DrOptionsConfig, DrResult, RecoveryTarget,
    VmOptionsRecord,
};

/// Whether test-failover VMs get managed disks.
pub fn test_failover_managed(group: &DrGroupOptions, target: &RecoveryTarget) -> bool {
    if group.is_warm_site() {
        target.restore_as_managed_vm
    } else {
        true
    }
}

/// SKU applied to every disk of a test-failover VM.
///
/// Unlike a real restore, `"Auto"` resolves to the default SKU instead of
/// each disk's source SKU.
pub fn test_failover_disk_type(
    group: &DrGroupOptions,
    restore_managed_vm: bool,
    config: &DrOptionsConfig,
) -> Option<String> {
    if group.is_warm_site() && !restore_managed_vm {
        return None;
    }
    let volume_type = &group.advanced_restore_options.volume_type;
    Some(
        volume_type
            .explicit()
            .unwrap_or(config.default_sku_name())
            .to_string(),
    )
}

/// Resolve the VM configuration for a test failover of `source`.
pub fn resolve_test_failover_options(
    source: &AzureVm,
    group: &DrGroupOptions,
    target: &RecoveryTarget,
    config: &DrOptionsConfig,
) -> DrResult<VmOptionsRecord> {
    let adv = &group.advanced_restore_options;
    let restore_managed_vm = test_failover_managed(group, target);
    let disk_type = test_failover_disk_type(group, restore_managed_vm, config);
    info!(
        "resolve_test_failover_options({}) warm={} managed={} disk_type={:?}",
        source.name,
        group.is_warm_site(),
        restore_managed_vm,
        disk_type
    );

    let luns = invert_lun_map(source);
    let mut disks = DiskMap::with_capacity(source.disk_dict.len());
    for disk_name in source.disk_dict.keys() {
        let lun = lun_for_disk(source, &luns, disk_name)?;
        debug!("test failover disk {} (lun {})", disk_name, lun);
        disks.insert(
            disk_name.clone(),
            DiskOptions {
                uri: None,
                size: Some(disk_size(source, disk_name)?),
                sku: disk_type.clone(),
                is_managed: restore_managed_vm,
                lun,
            },
        );
    }

    Ok(VmOptionsRecord {
        cpu_count: source.no_of_cpu,
        memory: source.memory,
        disks,
        nic_count: config.destination_nic_count,
        resource_group: adv.esx_host.clone(),
        region: adv.datacenter.clone(),
        availability_zone: adv.availability_zones.explicit().map(str::to_string),
        vm_size: target.test_vm_size.clone(),
        virtual_networks: Some(target.test_subnet_ids().into_iter().map(Some).collect()),
        network_security_groups: Some(adv.security_group_ids().into_iter().map(Some).collect()),
        create_public_ip: vec![adv.create_public_ip],
        restore_as_managed_vm: restore_managed_vm,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────
