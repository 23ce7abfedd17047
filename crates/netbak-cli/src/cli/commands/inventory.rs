//! `netbak inventory` – validate the inventory and list devices.

use anyhow::Result;
use netbak_core::config::NetbakConfig;
use netbak_core::{inventory, platform};

pub fn run_inventory(cfg: &NetbakConfig) -> Result<()> {
    let path = cfg.inventory_path();
    let devices = inventory::load(&path)?;
    if devices.is_empty() {
        println!("No devices in {}.", path.display());
        return Ok(());
    }
    println!(
        "{:<18} {:<12} {:<10} {:<12} {}",
        "ADDRESS", "PLATFORM", "ROLE", "USER", "SUPPORTED"
    );
    let mut unsupported = 0;
    for d in &devices {
        let supported = platform::profile_for(&d.platform).is_ok();
        if !supported {
            unsupported += 1;
        }
        println!(
            "{:<18} {:<12} {:<10} {:<12} {}",
            d.address,
            d.platform.as_str(),
            d.role,
            d.username,
            if supported { "yes" } else { "no" }
        );
    }
    println!("{} device(s), {} unsupported platform", devices.len(), unsupported);
    Ok(())
}
