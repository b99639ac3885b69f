//! GPU probe
//!
//! Loads a probe configuration, selects a device on the configured backend,
//! places a batch of buffers into a single memory block and reports what it
//! got.
//!
//! Usage: `gpu_probe [config.toml|config.ron]`

mod config;

use std::path::{Path, PathBuf};

use gpu_core::backend::simulated::{SimulatedInstance, SimulationProfile};
use gpu_core::backend::vulkan::VulkanInstance;
use gpu_core::backend::InstanceBackend;
use gpu_core::config::{Config, ConfigError};
use gpu_core::device::DeviceSelector;
use gpu_core::foundation::logging;
use gpu_core::memory::MemoryArena;
use gpu_core::types::{BufferDesc, BufferUsage, MemoryProperties};
use gpu_core::GpuError;

use crate::config::{BackendChoice, ProbeConfig};

/// Probe failures
#[derive(thiserror::Error, Debug)]
enum ProbeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
}

/// What one probe run found
#[derive(Debug)]
struct ProbeReport {
    device_name: String,
    supported_queues: usize,
    requested_queues: usize,
    aliased_queues: usize,
    block_size: u64,
    memory_type_index: u32,
    offsets: Vec<u64>,
}

fn main() {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_with_level("info");
            log::error!("{}", e);
            std::process::exit(2);
        }
    };
    logging::init_with_level(config.log_level());

    match run(&config) {
        Ok(report) => {
            log::info!("Probe finished: {:#?}", report);
        }
        Err(e) => {
            log::error!("Probe failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ProbeConfig, ConfigError> {
    let config = match path {
        Some(path) => ProbeConfig::load_from_file(path)?,
        None => ProbeConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run(config: &ProbeConfig) -> Result<ProbeReport, ProbeError> {
    match &config.backend {
        BackendChoice::Vulkan { app_name, validation } => {
            let instance = VulkanInstance::new(app_name, *validation, &[])?;
            probe(&instance, config)
        }
        BackendChoice::Simulated { profile } => {
            let profile = SimulationProfile::load_from_file(profile)?;
            log::info!("Loaded simulation profile with {} device(s)", profile.devices.len());
            let instance = SimulatedInstance::from_profile(profile);
            probe(&instance, config)
        }
    }
}

fn probe<I: InstanceBackend>(instance: &I, config: &ProbeConfig) -> Result<ProbeReport, ProbeError> {
    let device = DeviceSelector::from_config(instance, &config.selection).select()?;

    for (index, request) in device.requests().iter().enumerate() {
        match device.queue(index) {
            Some(queue) => log::info!(
                "Request {}: {:?} -> family {}, queue {}{}",
                index,
                queue.capabilities(),
                queue.family_index(),
                queue.queue_index(),
                if queue.is_aliased() { " (aliased)" } else { "" }
            ),
            None => log::warn!("Request {}: unsupported (priority {})", index, request.priority),
        }
    }

    let descs: Vec<BufferDesc> = config
        .arena
        .buffer_sizes
        .iter()
        .map(|&size| BufferDesc {
            size,
            usage: BufferUsage::UNIFORM | BufferUsage::TRANSFER_SRC | BufferUsage::TRANSFER_DST,
        })
        .collect();
    let buffers = MemoryArena::allocate_buffers(&device, &descs, config.arena.memory_properties)?;

    let (block_size, memory_type_index) = buffers
        .first()
        .and_then(|buffer| buffer.memory_block())
        .map_or((0, 0), |block| (block.size(), block.memory_type_index()));

    if config.arena.memory_properties.contains(MemoryProperties::HOST_VISIBLE) {
        for (index, buffer) in buffers.iter().enumerate() {
            let marker = u32::try_from(index).unwrap_or(u32::MAX);
            buffer.write(0, &[marker])?;
            let read_back = buffer.read::<u32>(0, 1)?;
            log::debug!("Buffer {} at offset {:?}: wrote {}, read {:?}", index, buffer.offset(), marker, read_back);
        }
    }

    Ok(ProbeReport {
        device_name: device.properties().name.clone(),
        supported_queues: (0..device.requests().len())
            .filter(|&index| device.is_queue_supported(index))
            .count(),
        requested_queues: device.requests().len(),
        aliased_queues: device.queues().flatten().filter(|queue| queue.is_aliased()).count(),
        block_size,
        memory_type_index,
        offsets: buffers.iter().filter_map(|buffer| buffer.offset()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulated_config() -> ProbeConfig {
        let profile = Path::new(env!("CARGO_MANIFEST_DIR")).join("profiles/two_gpus.toml");
        ProbeConfig {
            backend: BackendChoice::Simulated { profile },
            ..ProbeConfig::default()
        }
    }

    #[test]
    fn test_probe_simulated_profile() {
        let report = run(&simulated_config()).unwrap();

        assert_eq!(report.device_name, "Simulated Discrete GPU");
        assert_eq!(report.requested_queues, 1);
        assert_eq!(report.supported_queues, 1);
        assert_eq!(report.offsets, vec![0, 256]);
        assert_eq!(report.block_size, 768);
        assert_eq!(report.memory_type_index, 2);
    }

    #[test]
    fn test_missing_profile_is_config_error() {
        let config = ProbeConfig {
            backend: BackendChoice::Simulated {
                profile: PathBuf::from("does/not/exist.toml"),
            },
            ..ProbeConfig::default()
        };
        assert!(matches!(run(&config), Err(ProbeError::Config(_))));
    }

    #[test]
    fn test_sample_configs_load() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        for name in ["probe.toml", "probe.ron"] {
            let config = load_config(Some(&root.join("profiles").join(name))).unwrap();
            assert!(!config.selection.queues.is_empty(), "{name}");
        }
    }
}
