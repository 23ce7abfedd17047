//! `netbak platforms` – show the platform capability table.

use netbak_core::platform;

pub fn run_platforms() {
    println!(
        "{:<12} {:<45} {:<20} {}",
        "PLATFORM", "PAGINATION DISABLE", "FETCH", "TIMEOUT"
    );
    for p in platform::profiles() {
        let steps: Vec<String> = p
            .pagination_disable
            .iter()
            .map(|s| format!("{} -> {}", s.command, s.expect))
            .collect();
        println!(
            "{:<12} {:<45} {:<20} {}s",
            p.platform,
            steps.join(", "),
            p.fetch_command,
            p.fetch_timeout.as_secs()
        );
    }
}
