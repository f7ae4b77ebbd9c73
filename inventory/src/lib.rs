#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The verified-catalog inventory: a keyed store of catalog entries, scored
//! independently on every add/update through a closed check set, with
//! best-effort status patching back onto the catalog objects.

mod extract;
mod patcher;
mod scorer;
mod types;
mod watcher;

pub use self::extract::extract_resource;
pub use self::patcher::StatusPatcher;
pub use self::scorer::{score_catalog, ScoringPolicy};
pub use self::types::{
    grade_from_score, status_from_score, AgentUsage, VerifiedCheck, VerifiedFinding,
    VerifiedResource, VerifiedScore, VerifiedSummary,
};
pub use self::watcher::{run, Inventory, InventoryStats, SharedInventory};
