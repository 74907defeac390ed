//! # DR VM Options
//!
//! Derives the configuration of a disaster-recovery VM from its source VM
//! and the operator's restore settings.
//!
//! ## Features
//!
//! - **Source extraction** – disks, NICs, placement and size of an Azure VM as they are now
//! - **Destination resolution** – managed / unmanaged / DVDF disks, `"Auto"` inheritance, cross-hypervisor sources
//! - **Test failover** – drill VMs with test size and test subnets, hot vs warm site
//! - **Disk SKUs** – Standard HDD, Standard SSD and Premium SSD catalog with a configurable default
//! - **Validation** – post-restore checks of a DR VM against its options record
//! - **Service / commands** – Tauri-managed state and `dr_*` commands (feature `tauri-commands`)

pub mod types;
pub mod disks;
pub mod source;
pub mod destination;
pub mod test_failover;
pub mod validation;
pub mod service;
#[cfg(feature = "tauri-commands")]
pub mod commands;

pub use destination::resolve_destination_options;
pub use service::{DrOptionsService, DrOptionsServiceState};
pub use source::extract_source_options;
pub use test_failover::resolve_test_failover_options;
pub use types::*;
pub use validation::{DrInventory, DrVmValidator, ExistCheck, NsgSummary, VmSizeOffer};
