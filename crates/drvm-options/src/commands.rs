//! Tauri command handlers for DR option derivation.
//!
//! All commands follow the `dr_*` naming convention and accept
//! `State<'_, DrOptionsServiceState>` as their first parameter.

use tauri::State;

use crate::service::DrOptionsServiceState;
use crate::types::*;

fn err_str(e: DrError) -> String {
    e.to_string()
}

// ── Configuration ────────────────────────────────────────────────────

#[tauri::command]
pub async fn dr_get_config(state: State<'_, DrOptionsServiceState>) -> Result<DrOptionsConfig, String> {
    Ok(state.lock().await.config().clone())
}

#[tauri::command]
pub async fn dr_set_config(
    state: State<'_, DrOptionsServiceState>,
    config: DrOptionsConfig,
) -> Result<(), String> {
    state.lock().await.set_config(config);
    Ok(())
}

// ── Derivation ───────────────────────────────────────────────────────

#[tauri::command]
pub async fn dr_extract_source_options(
    state: State<'_, DrOptionsServiceState>,
    vm: AzureVm,
) -> Result<VmOptionsRecord, String> {
    state.lock().await.extract_source_options(&vm).map_err(err_str)
}

#[tauri::command]
pub async fn dr_resolve_destination_options(
    state: State<'_, DrOptionsServiceState>,
    vm: SourceVm,
    restore_options: RestoreOptionsInput,
) -> Result<VmOptionsRecord, String> {
    state
        .lock()
        .await
        .resolve_destination_options(&vm, &restore_options)
        .map_err(err_str)
}

#[tauri::command]
pub async fn dr_resolve_test_failover_options(
    state: State<'_, DrOptionsServiceState>,
    vm: AzureVm,
    group_options: DrGroupOptions,
    recovery_target: RecoveryTarget,
) -> Result<VmOptionsRecord, String> {
    state
        .lock()
        .await
        .resolve_test_failover_options(&vm, &group_options, &recovery_target)
        .map_err(err_str)
}
