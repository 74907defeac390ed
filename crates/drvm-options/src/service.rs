//! Service façade for DR option derivation.
//!
//! Holds the active [`DrOptionsConfig`] and exposes the resolvers behind a
//! single `DrOptionsService` that can be managed as Tauri state.

use std::sync::Arc;
use tokio::sync::Mutex;

use log::info;

use crate::destination;
use crate::source;
use crate::test_failover;
use crate::types::*;
use crate::validation::{DrInventory, DrVmValidator, ExistCheck};

/// Thread-safe service state for Tauri.
pub type DrOptionsServiceState = Arc<Mutex<DrOptionsService>>;

pub struct DrOptionsService {
    config: DrOptionsConfig,
}

impl DrOptionsService {
    /// Create a new service wrapped in `Arc<Mutex<_>>` for Tauri state management.
    pub fn new() -> DrOptionsServiceState {
        Self::with_config(DrOptionsConfig::new())
    }

    pub fn with_config(config: DrOptionsConfig) -> DrOptionsServiceState {
        Arc::new(Mutex::new(Self { config }))
    }

    // ── Configuration ────────────────────────────────────────────────

    pub fn config(&self) -> &DrOptionsConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DrOptionsConfig) {
        info!(
            "DR options config updated (default SKU {})",
            config.default_sku_name()
        );
        self.config = config;
    }

    /// Replace the config from a partial JSON document.
    pub fn load_config_json(&mut self, json: &str) -> DrResult<()> {
        let config = DrOptionsConfig::from_json(json)?;
        self.set_config(config);
        Ok(())
    }

    // ── Derivation ───────────────────────────────────────────────────

    pub fn extract_source_options(&self, vm: &AzureVm) -> DrResult<VmOptionsRecord> {
        source::extract_source_options(vm)
    }

    pub fn resolve_destination_options(
        &self,
        vm: &SourceVm,
        restore_options: &RestoreOptionsInput,
    ) -> DrResult<VmOptionsRecord> {
        destination::resolve_destination_options(vm, restore_options, &self.config)
    }

    pub fn resolve_test_failover_options(
        &self,
        vm: &AzureVm,
        group: &DrGroupOptions,
        target: &RecoveryTarget,
    ) -> DrResult<VmOptionsRecord> {
        test_failover::resolve_test_failover_options(vm, group, target, &self.config)
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Full post-restore check of `vm` against `options`: existence,
    /// compute, disks, NICs, then placement and networking.
    pub async fn validate_restored_vm<I: DrInventory + ?Sized>(
        &self,
        vm: &AzureVm,
        options: &VmOptionsRecord,
        inventory: &I,
    ) -> DrResult<()> {
        let validator = DrVmValidator::new(vm, options, inventory);
        validator.validate_vm_exists().await?;
        validator.validate_cpu_count()?;
        validator.validate_memory()?;
        validator.validate_disk_count(ExistCheck::Skip).await?;
        validator.validate_network_adapter()?;
        validator.advanced_validation().await?;
        info!("DR VM {} validated", vm.name);
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
