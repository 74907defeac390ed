//! Disk-mapping helpers shared by the source, destination and test-failover
//! resolvers.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::types::{AzureVm, DiskOptions, DrError, DrOptionsConfig, DrResult};

/// Disk options keyed by disk name (managed) or blob file name (unmanaged).
pub type DiskMap = IndexMap<String, DiskOptions>;

/// Invert `disk_lun_dict` into disk name → LUN.
pub fn invert_lun_map(vm: &AzureVm) -> HashMap<&str, i32> {
    vm.disk_lun_dict
        .iter()
        .map(|(lun, name)| (name.as_str(), *lun))
        .collect()
}

/// LUN of `disk_name`. Every disk in `disk_dict` must have one.
pub fn lun_for_disk(vm: &AzureVm, luns: &HashMap<&str, i32>, disk_name: &str) -> DrResult<i32> {
    luns.get(disk_name)
        .copied()
        .ok_or_else(|| DrError::inconsistent_disk_mapping(&vm.name, disk_name, "disk_lun_dict"))
}

/// Size in GB of `disk_name`. Every disk in `disk_dict` must have one.
pub fn disk_size(vm: &AzureVm, disk_name: &str) -> DrResult<u64> {
    vm.disk_size_dict
        .get(disk_name)
        .copied()
        .ok_or_else(|| DrError::inconsistent_disk_mapping(&vm.name, disk_name, "disk_size_dict"))
}

/// `storageAccountType` recorded for the disk at `lun`, if any.
pub fn source_disk_sku(vm: &AzureVm, lun: i32) -> Option<&str> {
    vm.disk_sku_dict
        .get(&lun)
        .and_then(|info| info.storage_account_type.as_deref())
}

/// Source SKU for the disk at `lun`, falling back to the configured default.
pub fn source_disk_sku_or_default(
    vm: &AzureVm,
    disk_name: &str,
    lun: i32,
    config: &DrOptionsConfig,
) -> String {
    match source_disk_sku(vm, lun) {
        Some(sku) => sku.to_string(),
        None => {
            warn!(
                "No SKU recorded for disk '{}' (lun {}) of VM '{}', using {}",
                disk_name,
                lun,
                vm.name,
                config.default_sku_name()
            );
            config.default_sku_name().to_string()
        }
    }
}

/// LUN assigned to the `idx`-th enumerated disk; the OS disk gets `-1`.
pub fn lun_for_index(idx: usize) -> i32 {
    idx as i32 - 1
}

/// Managed disks for an Azure source, one per entry of `disk_dict`.
///
/// `disk_type` wins when set; otherwise each disk keeps its source SKU.
pub fn managed_azure_disks(
    vm: &AzureVm,
    disk_type: Option<&str>,
    config: &DrOptionsConfig,
) -> DrResult<DiskMap> {
    let luns = invert_lun_map(vm);
    let mut disks = DiskMap::with_capacity(vm.disk_dict.len());
    for disk_name in vm.disk_dict.keys() {
        let lun = lun_for_disk(vm, &luns, disk_name)?;
        let sku = match disk_type {
            Some(t) => t.to_string(),
            None => source_disk_sku_or_default(vm, disk_name, lun, config),
        };
        debug!("managed disk {} (lun {}) → {}", disk_name, lun, sku);
        disks.insert(
            disk_name.clone(),
            DiskOptions {
                uri: None,
                size: Some(disk_size(vm, disk_name)?),
                sku: Some(sku),
                is_managed: true,
                lun,
            },
        );
    }
    Ok(disks)
}

/// Name of the `idx`-th disk of a cross-hypervisor source.
pub fn foreign_disk_name(idx: usize, config: &DrOptionsConfig) -> String {
    if idx == 0 {
        config.os_disk_name.clone()
    } else {
        format!("{}{}", config.data_disk_prefix, idx)
    }
}

/// Managed disks for a cross-hypervisor source, where only a count is known.
pub fn managed_foreign_disks(
    disk_count: usize,
    disk_type: Option<&str>,
    config: &DrOptionsConfig,
) -> DiskMap {
    let sku = disk_type.unwrap_or(config.default_sku_name());
    (0..disk_count)
        .map(|idx| {
            (
                foreign_disk_name(idx, config),
                DiskOptions {
                    uri: None,
                    size: None,
                    sku: Some(sku.to_string()),
                    is_managed: true,
                    lun: lun_for_index(idx),
                },
            )
        })
        .collect()
}

/// Where unmanaged VHD blobs of a restored VM are written.
#[derive(Debug, Clone, Copy)]
pub struct BlobTarget<'a> {
    pub resource_group: &'a str,
    pub vm_name: &'a str,
    pub storage_account: &'a str,
}

impl BlobTarget<'_> {
    /// `https://{account}.{suffix}/{container}/`, lower-cased account.
    pub fn container_url(&self, config: &DrOptionsConfig) -> String {
        format!(
            "https://{}.{}/{}/",
            self.storage_account.to_lowercase(),
            config.blob_endpoint_suffix,
            config.blob_container
        )
    }

    /// `{resource group}-{vm name}`, lower-cased.
    pub fn base_name(&self) -> String {
        format!(
            "{}-{}",
            self.resource_group.to_lowercase(),
            self.vm_name.to_lowercase()
        )
    }

    /// Blob file name of the `idx`-th disk. The OS disk has no suffix.
    pub fn blob_name(&self, idx: usize) -> String {
        if idx == 0 {
            format!("{}.vhd", self.base_name())
        } else {
            format!("{}-{}.vhd", self.base_name(), idx)
        }
    }
}

/// Unmanaged (page blob) disks, keyed by blob file name.
pub fn unmanaged_blob_disks(
    target: &BlobTarget<'_>,
    disk_count: usize,
    config: &DrOptionsConfig,
) -> DiskMap {
    let url = target.container_url(config);
    (0..disk_count)
        .map(|idx| {
            let key = target.blob_name(idx);
            let disk = DiskOptions {
                uri: Some(format!("{}{}", url, key)),
                size: None,
                sku: None,
                is_managed: false,
                lun: lun_for_index(idx),
            };
            (key, disk)
        })
        .collect()
}

// ─── Tests ──────────────────────────────────────────────────────────
