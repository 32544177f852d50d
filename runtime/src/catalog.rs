//! Bundled vendor catalog.
//!
//! Shown when the remote vendor collection is empty or unreachable. The
//! entries are compiled into the binary, so the fallback never depends on the
//! network.

use event_planner_core::model::Vendor;
use std::sync::OnceLock;

/// Number of bundled vendors.
pub const FALLBACK_VENDOR_COUNT: usize = 15;

static CATALOG: OnceLock<Vec<Vendor>> = OnceLock::new();

/// The bundled vendors, in catalog order.
#[must_use]
pub fn fallback_vendors() -> Vec<Vendor> {
    CATALOG.get_or_init(load).clone()
}

fn load() -> Vec<Vendor> {
    match serde_json::from_str::<Vec<Vendor>>(include_str!("../catalog/vendors.json")) {
        Ok(vendors) => vendors
            .into_iter()
            .filter(|vendor| match vendor.check() {
                Ok(()) => true,
                Err(reason) => {
                    tracing::error!(vendor = %vendor.id, %reason, "Bundled vendor is invalid");
                    false
                }
            })
            .collect(),
        Err(err) => {
            tracing::error!(error = %err, "Bundled vendor catalog is unreadable");
            Vec::new()
        }
    }
}
