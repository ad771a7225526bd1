//! Static fallback table - locally computable facts, no LLM, no shell.
//!
//! Last line of defense: consulted when generation returns nothing usable or
//! the retry budget runs out. Entries are ordered; the first keyword match
//! wins.

use sysinfo::{Disks, System};
use sysask_shared::format::format_bytes;

type FactFn = fn() -> Option<String>;

/// Ordered (keywords, fact) table
const TABLE: &[(&[&str], FactFn)] = &[
    (&["core", "cpus", "processors"], core_count),
    (&["memory", "ram"], total_memory),
    (&["hostname", "computer name", "machine name"], hostname),
    (&["uptime", "how long"], uptime),
    (&["disk", "storage", "space"], total_disk),
    // "os" alone would substring-match words like "compose" or "most".
    (
        &["operating system", "which os", "what os", "kernel", "distro"],
        os_name,
    ),
];

/// Look up a locally computable answer for the query, if any entry matches.
pub fn lookup(query: &str) -> Option<String> {
    let q = query.to_lowercase();
    for (keywords, fact) in TABLE {
        if keywords.iter().any(|keyword| q.contains(keyword)) {
            if let Some(answer) = fact() {
                return Some(answer);
            }
        }
    }
    None
}

fn core_count() -> Option<String> {
    Some(format!("CPU cores: {}", num_cpus::get()))
}

fn total_memory() -> Option<String> {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return None;
    }
    Some(format!("Total memory: {}", format_bytes(total)))
}

fn hostname() -> Option<String> {
    System::host_name().map(|name| format!("Hostname: {}", name))
}

fn uptime() -> Option<String> {
    let secs = System::uptime();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    Some(if days > 0 {
        format!("Uptime: {}d {}h {}m", days, hours, minutes)
    } else {
        format!("Uptime: {}h {}m", hours, minutes)
    })
}

fn total_disk() -> Option<String> {
    let disks = Disks::new_with_refreshed_list();
    let total: u64 = disks.list().iter().map(|disk| disk.total_space()).sum();
    if total == 0 {
        return None;
    }
    Some(format!("Total disk space: {}", format_bytes(total)))
}

fn os_name() -> Option<String> {
    let name = System::name()?;
    let version = System::os_version().unwrap_or_default();
    Some(format!("Operating system: {} {}", name, version).trim_end().to_string())
}
