//! Core types for DR VM option derivation.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ─── Error types ─────────────────────────────────────────────────────

/// Categorised error kinds for option derivation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DrErrorKind {
    /// `disk_dict`, `disk_lun_dict` and `disk_size_dict` disagree.
    InconsistentDiskMapping,
    /// A restore option required by the selected branch is absent.
    MissingOption,
    /// An observed DR VM does not match its options record.
    Validation,
    /// A hypervisor inventory lookup failed.
    Inventory,
    /// Configuration could not be parsed.
    Config,
    /// A VM or restore-options payload could not be parsed.
    InvalidInput,
}

impl fmt::Display for DrErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InconsistentDiskMapping => write!(f, "Inconsistent disk mapping"),
            Self::MissingOption => write!(f, "Missing restore option"),
            Self::Validation => write!(f, "Validation error"),
            Self::Inventory => write!(f, "Inventory error"),
            Self::Config => write!(f, "Configuration error"),
            Self::InvalidInput => write!(f, "Invalid input"),
        }
    }
}

/// Main error type for option derivation and DR validation.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{kind}] {message}")]
pub struct DrError {
    pub kind: DrErrorKind,
    pub message: String,
}

impl DrError {
    pub fn new(kind: DrErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn inconsistent_disk_mapping(vm_name: &str, disk_name: &str, map: &str) -> Self {
        Self::new(
            DrErrorKind::InconsistentDiskMapping,
            format!("Disk '{}' of VM '{}' has no entry in {}", disk_name, vm_name, map),
        )
    }

    pub fn missing_option(option: &str) -> Self {
        Self::new(
            DrErrorKind::MissingOption,
            format!("advancedRestoreOptions.{} is required for this restore", option),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(DrErrorKind::Validation, message)
    }

    /// For [`crate::validation::DrInventory`] implementations whose lookup failed.
    pub fn inventory(message: impl Into<String>) -> Self {
        Self::new(DrErrorKind::Inventory, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(DrErrorKind::Config, message)
    }

    pub fn invalid_input(what: &str, e: impl fmt::Display) -> Self {
        Self::new(DrErrorKind::InvalidInput, format!("invalid {}: {}", what, e))
    }
}

impl From<serde_json::Error> for DrError {
    fn from(e: serde_json::Error) -> Self {
        Self::config(e.to_string())
    }
}

impl From<DrError> for String {
    fn from(e: DrError) -> String {
        e.to_string()
    }
}

pub type DrResult<T> = Result<T, DrError>;

// ─── Disk SKU catalog ───────────────────────────────────────────────

/// Azure managed-disk storage types known to the DR workflow.
///
/// Serialized as the ARM SKU name; either the SKU name or the display name
/// is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiskSku {
    #[default]
    StandardHdd,
    StandardSsd,
    PremiumSsd,
}

impl DiskSku {
    pub const ALL: [DiskSku; 3] = [Self::StandardHdd, Self::StandardSsd, Self::PremiumSsd];

    /// ARM `storageAccountType` value.
    pub fn sku_name(self) -> &'static str {
        match self {
            Self::StandardHdd => "Standard_LRS",
            Self::StandardSsd => "StandardSSD_LRS",
            Self::PremiumSsd => "Premium_LRS",
        }
    }

    /// Name shown in the admin console.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::StandardHdd => "Standard HDD",
            Self::StandardSsd => "Standard SSD",
            Self::PremiumSsd => "Premium SSD",
        }
    }

    /// Look up a SKU by either its ARM name or its display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.sku_name() == name || s.display_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for DiskSku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sku_name())
    }
}

impl FromStr for DiskSku {
    type Err = DrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| DrError::config(format!("Unknown disk SKU '{}'", s)))
    }
}

impl Serialize for DiskSku {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.sku_name())
    }
}

impl<'de> Deserialize<'de> for DiskSku {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(|e: DrError| serde::de::Error::custom(e.message))
    }
}

// ─── "Auto" sentinel ────────────────────────────────────────────────

/// An override that is either left on `"Auto"` or set explicitly.
///
/// A missing, `null`, empty or `"Auto"` value all mean `Auto`. Numbers are
/// accepted for fields such as availability zones and kept as strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AutoSetting {
    #[default]
    Auto,
    Explicit(String),
}

impl AutoSetting {
    pub const SENTINEL: &'static str = "Auto";

    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") => Self::Auto,
            Some(v) if v == Self::SENTINEL => Self::Auto,
            Some(v) => Self::Explicit(v.to_string()),
        }
    }

    pub fn explicit(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Explicit(v) => Some(v),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    /// Explicit value, otherwise the inherited one.
    pub fn or_inherit(&self, inherited: Option<&str>) -> Option<String> {
        self.explicit().or(inherited).map(str::to_string)
    }
}

impl From<&str> for AutoSetting {
    fn from(raw: &str) -> Self {
        Self::parse(Some(raw))
    }
}

impl Serialize for AutoSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.explicit().unwrap_or(Self::SENTINEL))
    }
}

impl<'de> Deserialize<'de> for AutoSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            None | Some(serde_json::Value::Null) => Ok(Self::Auto),
            Some(serde_json::Value::String(s)) => Ok(Self::parse(Some(&s))),
            Some(serde_json::Value::Number(n)) => Ok(Self::Explicit(n.to_string())),
            Some(other) => Err(serde::de::Error::custom(format!(
                "expected string, number or null, got {}",
                other
            ))),
        }
    }
}

// ─── Source VMs ─────────────────────────────────────────────────────

/// Per-disk SKU entry, keyed by LUN in [`AzureVm::disk_sku_dict`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiskSkuInfo {
    #[serde(default)]
    pub storage_account_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One network interface of an Azure VM.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NicDetail {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subnet_uri: Option<String>,
    #[serde(default)]
    pub nsg_uri: Option<String>,
    #[serde(default)]
    pub public_ip_uri: Option<String>,
}

impl NicDetail {
    pub fn has_public_ip(&self) -> bool {
        self.public_ip_uri.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// LUN-keyed maps arrive with string keys (`"-1"`, `"0"`) once buffered by
/// the `SourceVm` tag, so keys are parsed here rather than by serde.
mod lun_map {
    use std::collections::BTreeMap;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<i32, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        BTreeMap::<String, V>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, value)| {
                key.trim()
                    .parse::<i32>()
                    .map(|lun| (lun, value))
                    .map_err(|_| D::Error::custom(format!("invalid LUN key '{}'", key)))
            })
            .collect()
    }
}

/// Disk, network and compute metadata of a live Azure VM.
///
/// Used both for DR sources and for DR VMs observed after provisioning.
/// The OS disk sits at LUN `-1` in `disk_lun_dict`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AzureVm {
    pub name: String,
    /// Disk name to disk URI, in attachment order.
    #[serde(default)]
    pub disk_dict: IndexMap<String, String>,
    /// Disk name to size in GB.
    #[serde(default)]
    pub disk_size_dict: HashMap<String, u64>,
    #[serde(default, deserialize_with = "lun_map::deserialize")]
    pub disk_sku_dict: BTreeMap<i32, DiskSkuInfo>,
    #[serde(default, deserialize_with = "lun_map::deserialize")]
    pub disk_lun_dict: BTreeMap<i32, String>,
    #[serde(default)]
    pub managed_disk: bool,
    #[serde(default)]
    pub no_of_cpu: u32,
    /// Memory in GB.
    #[serde(default)]
    pub memory: f64,
    #[serde(default)]
    pub nic_count: u32,
    #[serde(default)]
    pub resource_group_name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub vm_size: Option<String>,
    #[serde(default)]
    pub nic_details: Vec<NicDetail>,
}

impl AzureVm {
    pub fn disk_count(&self) -> usize {
        self.disk_dict.len()
    }
}

/// A source VM on another hypervisor. Only counts are known up front.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ForeignVm {
    pub name: String,
    #[serde(default)]
    pub hypervisor: Option<String>,
    #[serde(default)]
    pub no_of_cpu: u32,
    #[serde(default)]
    pub memory: f64,
    #[serde(default)]
    pub disk_count: usize,
}

/// Source of a DR restore: same-hypervisor Azure or cross-hypervisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SourceVm {
    Azure(AzureVm),
    Foreign(ForeignVm),
}

impl SourceVm {
    pub fn name(&self) -> &str {
        match self {
            Self::Azure(vm) => &vm.name,
            Self::Foreign(vm) => &vm.name,
        }
    }

    pub fn as_azure(&self) -> Option<&AzureVm> {
        match self {
            Self::Azure(vm) => Some(vm),
            Self::Foreign(_) => None,
        }
    }

    pub fn cpu_count(&self) -> u32 {
        match self {
            Self::Azure(vm) => vm.no_of_cpu,
            Self::Foreign(vm) => vm.no_of_cpu,
        }
    }

    pub fn memory(&self) -> f64 {
        match self {
            Self::Azure(vm) => vm.memory,
            Self::Foreign(vm) => vm.memory,
        }
    }

    pub fn disk_count(&self) -> usize {
        match self {
            Self::Azure(vm) => vm.disk_count(),
            Self::Foreign(vm) => vm.disk_count,
        }
    }
}

// ─── Restore inputs ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NicOverride {
    #[serde(default)]
    pub subnet_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupOverride {
    #[serde(default)]
    pub group_id: Option<String>,
}

/// User or workflow supplied overrides. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedRestoreOptions {
    #[serde(default)]
    pub new_name: Option<String>,
    /// Destination resource group.
    #[serde(default)]
    pub esx_host: Option<String>,
    /// Destination storage account.
    #[serde(default, rename = "Datastore")]
    pub datastore: Option<String>,
    #[serde(default, rename = "restoreAsManagedVM")]
    pub restore_as_managed_vm: bool,
    #[serde(default)]
    pub volume_type: AutoSetting,
    /// Destination region.
    #[serde(default)]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub availability_zones: AutoSetting,
    #[serde(default)]
    pub vm_size: AutoSetting,
    #[serde(default)]
    pub nics: Vec<NicOverride>,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupOverride>,
    #[serde(default)]
    pub create_public_ip: bool,
    /// DVDF: deploy the VM only when failover runs.
    #[serde(default)]
    pub deploy_vm_when_failover: bool,
}

impl AdvancedRestoreOptions {
    /// Non-empty subnet IDs from the NIC overrides.
    pub fn subnet_ids(&self) -> Vec<String> {
        self.nics
            .iter()
            .filter_map(|n| n.subnet_id.as_deref())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Non-empty NSG IDs from the security group overrides.
    pub fn security_group_ids(&self) -> Vec<String> {
        self.security_groups
            .iter()
            .filter_map(|g| g.group_id.as_deref())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOptionsInput {
    #[serde(default)]
    pub advanced_restore_options: AdvancedRestoreOptions,
}

/// Persisted options of a DR (failover) group.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrGroupOptions {
    /// `true` is a warm site, `false` a hot site.
    #[serde(default)]
    pub create_vms_during_failover: bool,
    #[serde(default)]
    pub advanced_restore_options: AdvancedRestoreOptions,
}

impl DrGroupOptions {
    pub fn is_warm_site(&self) -> bool {
        self.create_vms_during_failover
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetRef {
    #[serde(default)]
    pub subnet_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    #[serde(default)]
    pub subnet_names: Vec<SubnetRef>,
}

/// Recovery target policy, as configured in the admin console.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RecoveryTarget {
    #[serde(default)]
    pub restore_as_managed_vm: bool,
    #[serde(default)]
    pub test_vm_size: Option<String>,
    #[serde(default, rename = "networkInfo")]
    pub network_info: Vec<NetworkInfo>,
}

impl RecoveryTarget {
    /// First subnet of every network entry that has one.
    pub fn test_subnet_ids(&self) -> Vec<String> {
        self.network_info
            .iter()
            .filter_map(|n| n.subnet_names.first())
            .map(|s| s.subnet_id.clone())
            .collect()
    }
}

// ─── Output records ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiskOptions {
    pub uri: Option<String>,
    pub size: Option<u64>,
    pub sku: Option<String>,
    pub is_managed: bool,
    pub lun: i32,
}

/// Disk, network and compute configuration for one DR VM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VmOptionsRecord {
    pub cpu_count: u32,
    pub memory: f64,
    pub disks: IndexMap<String, DiskOptions>,
    pub nic_count: u32,
    pub resource_group: Option<String>,
    pub region: Option<String>,
    pub availability_zone: Option<String>,
    pub vm_size: Option<String>,
    pub virtual_networks: Option<Vec<Option<String>>>,
    pub network_security_groups: Option<Vec<Option<String>>>,
    pub create_public_ip: Vec<bool>,
    #[serde(rename = "restoreAsManagedVM")]
    pub restore_as_managed_vm: bool,
}

impl VmOptionsRecord {
    pub fn managed_disks(&self) -> impl Iterator<Item = (&String, &DiskOptions)> {
        self.disks.iter().filter(|(_, d)| d.is_managed)
    }

    pub fn blob_disks(&self) -> impl Iterator<Item = (&String, &DiskOptions)> {
        self.disks.iter().filter(|(_, d)| !d.is_managed)
    }
}

// ─── Configuration ──────────────────────────────────────────────────

/// Tunables shared by all resolvers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DrOptionsConfig {
    /// SKU used when no per-disk SKU is known.
    pub default_disk_sku: DiskSku,
    pub blob_endpoint_suffix: String,
    pub blob_container: String,
    /// Destination VMs are provisioned with a single NIC.
    pub destination_nic_count: u32,
    pub os_disk_name: String,
    pub data_disk_prefix: String,
}

impl DrOptionsConfig {
    pub fn new() -> Self {
        Self {
            default_disk_sku: DiskSku::StandardHdd,
            blob_endpoint_suffix: "blob.core.windows.net".into(),
            blob_container: "vhds".into(),
            destination_nic_count: 1,
            os_disk_name: "OsDisk".into(),
            data_disk_prefix: "DataDisk_".into(),
        }
    }

    /// Parse a (possibly partial) JSON document. Missing keys keep defaults.
    pub fn from_json(json: &str) -> DrResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn default_sku_name(&self) -> &'static str {
        self.default_disk_sku.sku_name()
    }
}

impl Default for DrOptionsConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
