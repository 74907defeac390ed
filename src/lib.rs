//! DR VM option derivation.
//!
//! Re-exports the `drvm-options` engine and adds JSON entry points for
//! hosts that pass VM snapshots and restore settings as untyped documents.

pub use drvm_options::*;

use log::debug;
use serde_json::Value;

fn parse<T: serde::de::DeserializeOwned>(what: &str, value: Value) -> DrResult<T> {
  serde_json::from_value(value).map_err(|e| DrError::invalid_input(what, e))
}

fn to_value<T: serde::Serialize>(record: T) -> DrResult<Value> {
  serde_json::to_value(record).map_err(|e| DrError::invalid_input("options record", e))
}

/// [`extract_source_options`] over a JSON `AzureVm`.
pub fn extract_source_options_json(vm: Value) -> DrResult<Value> {
  let vm: AzureVm = parse("source VM", vm)?;
  debug!("extract_source_options_json({})", vm.name);
  to_value(extract_source_options(&vm)?)
}

/// [`resolve_destination_options`] over a JSON `SourceVm` (tagged by `kind`)
/// and a JSON restore-options document.
pub fn resolve_destination_options_json(
  vm: Value,
  restore_options: Value,
  config: &DrOptionsConfig,
) -> DrResult<Value> {
  let vm: SourceVm = parse("source VM", vm)?;
  let restore_options: RestoreOptionsInput = parse("restore options", restore_options)?;
  debug!("resolve_destination_options_json({})", vm.name());
  to_value(resolve_destination_options(&vm, &restore_options, config)?)
}

/// [`resolve_test_failover_options`] over JSON inputs.
pub fn resolve_test_failover_options_json(
  vm: Value,
  group_options: Value,
  recovery_target: Value,
  config: &DrOptionsConfig,
) -> DrResult<Value> {
  let vm: AzureVm = parse("source VM", vm)?;
  let group_options: DrGroupOptions = parse("group options", group_options)?;
  let recovery_target: RecoveryTarget = parse("recovery target", recovery_target)?;
  debug!("resolve_test_failover_options_json({})", vm.name);
  to_value(resolve_test_failover_options(&vm, &group_options, &recovery_target, config)?)
}
