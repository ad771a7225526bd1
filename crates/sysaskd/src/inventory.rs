//! Structured system inventory - typed lookups for static host facts.
//!
//! Pure data accessors backed by sysinfo plus a couple of sysfs/vendor-tool
//! reads. No LLM involved; the resolver uses these as a shortcut for
//! static-fact questions.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::fmt;
use std::fs;
use std::process::Command;
use sysinfo::{Disks, Networks, System};
use tracing::debug;

/// The facts the inventory can answer directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    Cpu,
    Memory,
    Disk,
    Network,
    Battery,
    Os,
    Graphics,
    ProcessCount,
}

impl fmt::Display for InfoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Network => "network",
            Self::Battery => "battery",
            Self::Os => "os",
            Self::Graphics => "graphics",
            Self::ProcessCount => "process_count",
        };
        write!(f, "{}", s)
    }
}

/// Ordered keyword dispatch. Evaluated top to bottom, first match wins, so
/// overlaps ("disk" vs "memory" in one query) resolve by this priority and
/// not by accident of iteration order.
const DISPATCH: &[(&[&str], InfoKind)] = &[
    (&["battery", "power supply"], InfoKind::Battery),
    (&["graphics", "gpu", "video card", "vram"], InfoKind::Graphics),
    (
        &["network", "interface", "ip address", "mac address"],
        InfoKind::Network,
    ),
    (
        &["disk", "storage", "filesystem", "drive", "partition"],
        InfoKind::Disk,
    ),
    (&["memory", "ram", "swap"], InfoKind::Memory),
    (&["cpu", "processor"], InfoKind::Cpu),
    (&["process count", "number of process"], InfoKind::ProcessCount),
    (
        &["operating system", "distro", "kernel", "which os", "what os"],
        InfoKind::Os,
    ),
];

/// Match a query against the dispatch table
pub fn match_kind(query: &str) -> Option<InfoKind> {
    let q = query.to_lowercase();
    for (keywords, kind) in DISPATCH {
        if keywords.iter().any(|keyword| q.contains(keyword)) {
            return Some(*kind);
        }
    }
    None
}

/// Read-only system facts, swappable for tests
pub trait SystemInventory: Send + Sync {
    fn lookup(&self, kind: InfoKind) -> Result<Value>;
}

/// Production inventory backed by sysinfo
pub struct SysinfoInventory;

impl SystemInventory for SysinfoInventory {
    fn lookup(&self, kind: InfoKind) -> Result<Value> {
        debug!("inventory lookup: {}", kind);
        match kind {
            InfoKind::Cpu => cpu_info(),
            InfoKind::Memory => memory_info(),
            InfoKind::Disk => disk_info(),
            InfoKind::Network => network_info(),
            InfoKind::Battery => battery_info(),
            InfoKind::Os => os_info(),
            InfoKind::Graphics => graphics_info(),
            InfoKind::ProcessCount => process_count(),
        }
    }
}

fn cpu_info() -> Result<Value> {
    let mut sys = System::new();
    sys.refresh_cpu();

    Ok(json!({
        "model": sys.global_cpu_info().brand(),
        "logical_cores": sys.cpus().len(),
        "physical_cores": sys.physical_core_count(),
        "frequency_mhz": sys.global_cpu_info().frequency(),
    }))
}

fn memory_info() -> Result<Value> {
    let mut sys = System::new();
    sys.refresh_memory();

    Ok(json!({
        "total_bytes": sys.total_memory(),
        "used_bytes": sys.used_memory(),
        "available_bytes": sys.available_memory(),
        "swap_total_bytes": sys.total_swap(),
        "swap_used_bytes": sys.used_swap(),
    }))
}

fn disk_info() -> Result<Value> {
    let disks = Disks::new_with_refreshed_list();
    let list: Vec<Value> = disks
        .list()
        .iter()
        .map(|disk| {
            json!({
                "name": disk.name().to_string_lossy(),
                "mount": disk.mount_point().to_string_lossy(),
                "fs": disk.file_system().to_string_lossy(),
                "total_bytes": disk.total_space(),
                "available_bytes": disk.available_space(),
            })
        })
        .collect();

    if list.is_empty() {
        return Err(anyhow!("no disks reported"));
    }
    Ok(Value::Array(list))
}

fn network_info() -> Result<Value> {
    let networks = Networks::new_with_refreshed_list();
    let list: Vec<Value> = networks
        .list()
        .iter()
        .map(|(iface, data)| {
            json!({
                "iface": iface,
                "mac": data.mac_address().to_string(),
                "received_bytes": data.total_received(),
                "transmitted_bytes": data.total_transmitted(),
            })
        })
        .collect();

    if list.is_empty() {
        return Err(anyhow!("no network interfaces reported"));
    }
    Ok(Value::Array(list))
}

/// Battery state from /sys/class/power_supply. Errors when the host has no
/// battery so the resolver falls through to command generation.
fn battery_info() -> Result<Value> {
    let entries = fs::read_dir("/sys/class/power_supply")?;

    for entry in entries.flatten() {
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if !name.starts_with("BAT") {
            continue;
        }

        let capacity = fs::read_to_string(path.join("capacity"))?;
        let status = fs::read_to_string(path.join("status"))?;
        return Ok(json!({
            "name": name,
            "capacity_percent": capacity.trim().parse::<u8>().unwrap_or(0),
            "status": status.trim(),
        }));
    }

    Err(anyhow!("no battery present"))
}

fn os_info() -> Result<Value> {
    Ok(json!({
        "name": System::name().unwrap_or_else(|| "Unknown".to_string()),
        "version": System::os_version().unwrap_or_else(|| "Unknown".to_string()),
        "kernel": System::kernel_version().unwrap_or_else(|| "Unknown".to_string()),
        "hostname": System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        "uptime_secs": System::uptime(),
    }))
}

/// GPU detection via vendor tools. nvidia-smi first, then rocm-smi.
fn graphics_info() -> Result<Value> {
    if let Some(gpu) = detect_nvidia_gpu() {
        return Ok(gpu);
    }
    if let Some(gpu) = detect_amd_gpu() {
        return Ok(gpu);
    }
    Err(anyhow!("no discrete GPU detected"))
}

fn detect_nvidia_gpu() -> Option<Value> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=name,memory.total", "--format=csv,noheader,nounits"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next()?;
    let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
    if parts.len() < 2 {
        return None;
    }

    let vram_mb: u64 = parts[1].parse().unwrap_or(0);
    Some(json!({
        "vendor": "NVIDIA",
        "model": parts[0],
        "vram_bytes": vram_mb * 1024 * 1024,
    }))
}

fn detect_amd_gpu() -> Option<Value> {
    let output = Command::new("rocm-smi")
        .args(["--showproductname"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.contains("GPU") {
        Some(json!({
            "vendor": "AMD",
            "model": "AMD GPU",
            "vram_bytes": 0,
        }))
    } else {
        None
    }
}

fn process_count() -> Result<Value> {
    let mut sys = System::new();
    sys.refresh_processes();

    Ok(json!({
        "process_count": sys.processes().len(),
    }))
}
