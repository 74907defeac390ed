//! Post-provisioning checks of a DR VM against the options it was built from.
//!
//! Lookups that need the hypervisor (does a disk or blob exist, which sizes
//! a region offers, which networks a resource group holds) go through
//! [`DrInventory`]. Every mismatch is reported as a `Validation` error.

use std::collections::BTreeSet;

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::disks::source_disk_sku;
use crate::types::{AzureVm, DiskOptions, DrError, DrResult, VmOptionsRecord};

/// A VM size offered in a region, with the zones it can be placed in.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VmSizeOffer {
    pub name: String,
    #[serde(default)]
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NsgSummary {
    pub id: String,
    #[serde(default)]
    pub location: String,
}

/// Expected presence of disks or blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExistCheck {
    Present,
    Absent,
    Skip,
}

/// Hypervisor lookups needed by [`DrVmValidator`].
#[async_trait]
pub trait DrInventory: Send + Sync {
    async fn vm_exists(&self, vm_name: &str) -> DrResult<bool>;

    /// Whether a managed disk exists in its resource group.
    async fn disk_exists(&self, disk_uri: &str) -> DrResult<bool>;

    async fn blob_exists(&self, blob_uri: &str) -> DrResult<bool>;

    async fn vm_sizes(&self, region: &str) -> DrResult<Vec<VmSizeOffer>>;

    async fn subnets_in_resource_group(&self, resource_group: &str) -> DrResult<Vec<String>>;

    async fn nsgs_in_resource_group(&self, resource_group: &str) -> DrResult<Vec<NsgSummary>>;

    async fn nic_names_in_resource_group(&self, resource_group: &str) -> DrResult<Vec<String>>;
}

/// Validates an observed DR VM against its [`VmOptionsRecord`].
pub struct DrVmValidator<'a, I: DrInventory + ?Sized> {
    vm: &'a AzureVm,
    options: &'a VmOptionsRecord,
    inventory: &'a I,
}

impl<'a, I: DrInventory + ?Sized> DrVmValidator<'a, I> {
    pub fn new(vm: &'a AzureVm, options: &'a VmOptionsRecord, inventory: &'a I) -> Self {
        Self {
            vm,
            options,
            inventory,
        }
    }

    fn fail(&self, message: impl AsRef<str>) -> DrError {
        DrError::validation(format!("VM [{}] {}", self.vm.name, message.as_ref()))
    }

    fn nic_subnets(&self) -> BTreeSet<Option<&str>> {
        self.vm.nic_details.iter().map(|n| n.subnet_uri.as_deref()).collect()
    }

    fn nic_nsgs(&self) -> BTreeSet<Option<&str>> {
        self.vm.nic_details.iter().map(|n| n.nsg_uri.as_deref()).collect()
    }

    // ── Existence ────────────────────────────────────────────────────

    pub async fn validate_vm_exists(&self) -> DrResult<()> {
        if !self.inventory.vm_exists(&self.vm.name).await? {
            return Err(self.fail("does not exist on the hypervisor"));
        }
        Ok(())
    }

    pub async fn validate_no_vm_exists(&self) -> DrResult<()> {
        if self.inventory.vm_exists(&self.vm.name).await? {
            return Err(self.fail("exists on the hypervisor"));
        }
        Ok(())
    }

    // ── Compute ──────────────────────────────────────────────────────

    /// With an `"Auto"` size, the chosen size must have at least the
    /// expected CPU count.
    pub fn validate_cpu_count(&self) -> DrResult<()> {
        if self.options.vm_size.is_some() {
            return Ok(());
        }
        if self.vm.no_of_cpu < self.options.cpu_count {
            return Err(self.fail(format!(
                "CPU count {} is below the expected {}",
                self.vm.no_of_cpu, self.options.cpu_count
            )));
        }
        Ok(())
    }

    pub fn validate_memory(&self) -> DrResult<()> {
        if self.options.vm_size.is_some() {
            return Ok(());
        }
        if self.vm.memory < self.options.memory {
            return Err(self.fail(format!(
                "memory {} is below the expected {}",
                self.vm.memory, self.options.memory
            )));
        }
        Ok(())
    }

    // ── Disks ────────────────────────────────────────────────────────

    async fn validate_managed_disk(&self, disk_name: &str, expected: &DiskOptions) -> DrResult<()> {
        let observed_name = self
            .vm
            .disk_lun_dict
            .get(&expected.lun)
            .ok_or_else(|| self.fail(format!("has no disk at LUN [{}]", expected.lun)))?;
        let observed_uri = self
            .vm
            .disk_dict
            .get(observed_name)
            .map(String::as_str)
            .unwrap_or_default();
        let observed_size = self
            .vm
            .disk_size_dict
            .get(observed_name)
            .copied()
            .unwrap_or_default();
        let observed_sku = source_disk_sku(self.vm, expected.lun);

        if let Some(uri) = expected.uri.as_deref() {
            if uri != observed_uri {
                return Err(self.fail(format!(
                    "disk URI changed from [{}] to [{}]",
                    uri, observed_uri
                )));
            }
            if !self.inventory.disk_exists(uri).await? {
                return Err(self.fail(format!("disk [{}] does not exist", uri)));
            }
        }
        if let Some(size) = expected.size.filter(|s| *s > 0) {
            if size != observed_size {
                return Err(self.fail(format!(
                    "disk [{}] size changed from {} to {}",
                    disk_name, size, observed_size
                )));
            }
        }
        if let Some(sku) = expected.sku.as_deref() {
            if Some(sku) != observed_sku {
                return Err(self.fail(format!(
                    "disk [{}] SKU changed from [{}] to [{:?}]",
                    disk_name, sku, observed_sku
                )));
            }
        }
        debug!("managed disk {} of {} matches", disk_name, self.vm.name);
        Ok(())
    }

    /// Check every disk in the options record.
    ///
    /// `disk_check` applies to managed entries; `blob_check` to every entry
    /// with a URI. Blob mismatches are collected and reported together.
    pub async fn validate_disks(&self, disk_check: ExistCheck, blob_check: ExistCheck) -> DrResult<()> {
        let mut incorrect_blobs = BTreeSet::new();

        for (disk_name, expected) in &self.options.disks {
            if expected.is_managed {
                match disk_check {
                    ExistCheck::Skip => {
                        debug!("skipping managed disk check for {}", disk_name)
                    }
                    ExistCheck::Present => self.validate_managed_disk(disk_name, expected).await?,
                    ExistCheck::Absent => {
                        if let Some(uri) = expected.uri.as_deref() {
                            if self.inventory.disk_exists(uri).await? {
                                return Err(self.fail(format!("disk [{}] still exists", uri)));
                            }
                        }
                    }
                }
            }

            let Some(uri) = expected.uri.as_deref() else {
                continue;
            };
            match blob_check {
                ExistCheck::Skip => {}
                ExistCheck::Present => {
                    if !self.inventory.blob_exists(uri).await? {
                        incorrect_blobs.insert(uri);
                    }
                }
                ExistCheck::Absent => {
                    if self.inventory.blob_exists(uri).await? {
                        incorrect_blobs.insert(uri);
                    }
                }
            }
        }

        if incorrect_blobs.is_empty() {
            return Ok(());
        }
        let blobs = incorrect_blobs.into_iter().collect::<Vec<_>>().join(", ");
        match blob_check {
            ExistCheck::Absent => Err(self.fail(format!("has blobs that should not exist: [{}]", blobs))),
            _ => Err(self.fail(format!("is missing blobs: [{}]", blobs))),
        }
    }

    /// Managed VMs check their disks (and blobs per `blobs_retained`);
    /// unmanaged VMs check their blobs only.
    pub async fn validate_disk_count(&self, blobs_retained: ExistCheck) -> DrResult<()> {
        if self.options.restore_as_managed_vm {
            info!("managed disk validation for {}", self.vm.name);
            self.validate_disks(ExistCheck::Present, blobs_retained).await
        } else {
            info!("unmanaged disk validation for {}", self.vm.name);
            self.validate_disks(ExistCheck::Skip, ExistCheck::Present).await
        }
    }

    // ── NICs ─────────────────────────────────────────────────────────

    pub fn validate_network_adapter(&self) -> DrResult<()> {
        if self.options.nic_count != self.vm.nic_count {
            return Err(self.fail(format!(
                "has {} NICs, expected {}",
                self.vm.nic_count, self.options.nic_count
            )));
        }
        Ok(())
    }

    pub async fn validate_no_network_adapter(&self) -> DrResult<()> {
        let resource_group = self
            .options
            .resource_group
            .as_deref()
            .unwrap_or(&self.vm.resource_group_name);
        let nics = self.inventory.nic_names_in_resource_group(resource_group).await?;
        if nics.iter().any(|n| *n == self.vm.name) {
            return Err(self.fail(format!("NIC still exists in [{}]", resource_group)));
        }
        Ok(())
    }

    // ── Deployment modes ─────────────────────────────────────────────

    /// Before failover with DVDF: no VM yet, but its blobs are staged.
    pub async fn validate_dvdf(&self) -> DrResult<()> {
        if self.inventory.vm_exists(&self.vm.name).await? {
            return Err(self.fail("exists before failover even though DVDF is enabled"));
        }
        self.validate_disks(ExistCheck::Skip, ExistCheck::Present).await
    }

    pub async fn validate_dvdf_on_failover(&self) -> DrResult<()> {
        if !self.inventory.vm_exists(&self.vm.name).await? {
            return Err(self.fail("does not exist after failover with DVDF enabled"));
        }
        Ok(())
    }

    /// Warm sync leaves nothing provisioned: no VM, disk, blob or NIC.
    pub async fn validate_warm_sync(&self) -> DrResult<()> {
        self.validate_no_vm_exists().await?;
        self.validate_disks(ExistCheck::Absent, ExistCheck::Absent).await?;
        self.validate_no_network_adapter().await
    }

    // ── Placement ────────────────────────────────────────────────────

    pub fn validate_resource_group(&self) -> DrResult<()> {
        if self.options.resource_group.as_deref() != Some(self.vm.resource_group_name.as_str()) {
            return Err(self.fail(format!(
                "resource group is {}, expected {:?}",
                self.vm.resource_group_name, self.options.resource_group
            )));
        }
        Ok(())
    }

    pub fn validate_region(&self) -> DrResult<()> {
        match self.options.region.as_deref() {
            Some(region) if region != self.vm.region => Err(self.fail(format!(
                "region is {}, expected {}",
                self.vm.region, region
            ))),
            _ => Ok(()),
        }
    }

    /// Zones only apply to managed VMs, and only when the VM size offers
    /// them in the region.
    pub async fn validate_availability_zone(&self) -> DrResult<()> {
        if !self.options.restore_as_managed_vm {
            return Ok(());
        }
        let observed_size = self.vm.vm_size.as_deref().unwrap_or_default();
        let zones = self
            .inventory
            .vm_sizes(&self.vm.region)
            .await?
            .into_iter()
            .find(|s| s.name == observed_size)
            .map(|s| s.zones)
            .unwrap_or_default();
        let observed = self.vm.availability_zone.as_deref();

        if zones.is_empty() && observed.is_some() {
            return Err(self.fail(format!(
                "availability zone is {:?}, expected none",
                observed
            )));
        }
        match self.options.availability_zone.as_deref() {
            Some(expected) if zones.iter().any(|z| z == expected) => {
                if observed != Some(expected) {
                    return Err(self.fail(format!(
                        "availability zone is {:?}, expected {}",
                        observed, expected
                    )));
                }
            }
            Some(_) => {
                if observed.is_some() {
                    return Err(self.fail(format!(
                        "availability zone is {:?}, expected none",
                        observed
                    )));
                }
            }
            None => {
                if !zones.is_empty() && !observed.is_some_and(|z| zones.iter().any(|s| s == z)) {
                    return Err(self.fail(format!(
                        "availability zone is {:?}, expected one of {:?}",
                        observed, zones
                    )));
                }
            }
        }
        Ok(())
    }

    pub async fn validate_vm_size(&self) -> DrResult<()> {
        let sizes = self.inventory.vm_sizes(&self.vm.region).await?;
        let offered = |name: &str| sizes.iter().any(|s| s.name == name);
        let observed = self.vm.vm_size.as_deref().unwrap_or_default();
        match self.options.vm_size.as_deref() {
            Some(expected) if offered(expected) && observed != expected => Err(self.fail(format!(
                "size is {}, expected {}",
                observed, expected
            ))),
            None if !offered(observed) => Err(self.fail(format!(
                "size {} is not offered in region {}",
                observed, self.vm.region
            ))),
            _ => Ok(()),
        }
    }

    // ── Networking ───────────────────────────────────────────────────

    /// Explicit subnets must all be attached (or the single one must be);
    /// under `"Auto"` every subnet must belong to the VM's resource group.
    pub async fn validate_vnets(&self) -> DrResult<()> {
        let observed = self.nic_subnets();
        match self.options.virtual_networks.as_deref() {
            Some(expected) if !expected.is_empty() => {
                let expected: BTreeSet<Option<&str>> = expected.iter().map(|v| v.as_deref()).collect();
                check_expected_set("subnets", &expected, &observed).map_err(|m| self.fail(m))
            }
            Some(_) => Ok(()),
            None => {
                let in_rg = self
                    .inventory
                    .subnets_in_resource_group(&self.vm.resource_group_name)
                    .await?;
                let allowed: BTreeSet<Option<&str>> = in_rg.iter().map(|s| Some(s.as_str())).collect();
                if !observed.is_subset(&allowed) {
                    return Err(self.fail(format!(
                        "subnets {:?} are not all in resource group {}",
                        observed, self.vm.resource_group_name
                    )));
                }
                Ok(())
            }
        }
    }

    /// Same rules as [`Self::validate_vnets`]; `"Auto"` NSGs must also be in
    /// the VM's region.
    pub async fn validate_nsgs(&self) -> DrResult<()> {
        let observed = self.nic_nsgs();
        match self.options.network_security_groups.as_deref() {
            Some(expected) if !expected.is_empty() => {
                let expected: BTreeSet<Option<&str>> = expected.iter().map(|v| v.as_deref()).collect();
                check_expected_set("NSGs", &expected, &observed).map_err(|m| self.fail(m))
            }
            Some(_) => Ok(()),
            None => {
                let in_rg = self
                    .inventory
                    .nsgs_in_resource_group(&self.vm.resource_group_name)
                    .await?;
                let allowed: BTreeSet<Option<&str>> = in_rg
                    .iter()
                    .filter(|n| n.location == self.vm.region)
                    .map(|n| Some(n.id.as_str()))
                    .collect();
                if !observed.is_subset(&allowed) {
                    return Err(self.fail(format!(
                        "NSGs {:?} are not all in resource group {} / region {}",
                        observed, self.vm.resource_group_name, self.vm.region
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn validate_public_ip(&self) -> DrResult<()> {
        let mut expected = self.options.create_public_ip.clone();
        let mut observed: Vec<bool> = self.vm.nic_details.iter().map(|n| n.has_public_ip()).collect();
        expected.sort_unstable();
        observed.sort_unstable();
        if expected != observed {
            return Err(self.fail(format!(
                "public IPs per NIC are {:?}, expected {:?}",
                observed, expected
            )));
        }
        Ok(())
    }

    /// Placement and networking checks, in order.
    pub async fn advanced_validation(&self) -> DrResult<()> {
        info!("advanced DR validation for {}", self.vm.name);
        self.validate_resource_group()?;
        self.validate_region()?;
        self.validate_availability_zone().await?;
        self.validate_vm_size().await?;
        self.validate_vnets().await?;
        self.validate_nsgs().await?;
        self.validate_public_ip()
    }
}

/// More than one expected value: sets must match. Exactly one: it must be
/// attached.
fn check_expected_set(
    what: &str,
    expected: &BTreeSet<Option<&str>>,
    observed: &BTreeSet<Option<&str>>,
) -> Result<(), String> {
    let ok = if expected.len() > 1 {
        expected == observed
    } else {
        expected.is_subset(observed)
    };
    if ok {
        Ok(())
    } else {
        Err(format!("{} are {:?}, expected {:?}", what, observed, expected))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
