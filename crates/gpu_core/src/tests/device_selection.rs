//! Device selection scenarios: scoring, family matching, aliasing and presentation

use super::common::{C, G, P, T};
use crate::backend::simulated::{DeviceProfile, SimSurface, SimulatedInstance, SIMULATED_SWAPCHAIN_EXTENSION};
use crate::config::{DeviceSelectionConfig, QueueRequestConfig};
use crate::device::{prefer_device_type, DeviceSelector};
use crate::error::GpuError;
use crate::foundation::logging::init_for_tests;
use crate::types::{DeviceFeatures, DeviceType, MemoryProperties, QueueCapabilities};

fn profile(name: &str, device_type: DeviceType) -> DeviceProfile {
    DeviceProfile::new(name, device_type).with_memory_type(MemoryProperties::HOST_VISIBLE)
}

#[test]
fn test_highest_score_wins() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![
        profile("integrated", DeviceType::IntegratedGpu).with_queue_family(G, 1, false),
        profile("discrete", DeviceType::DiscreteGpu).with_queue_family(G, 1, false),
        profile("cpu", DeviceType::Cpu).with_queue_family(G, 1, false),
    ]);

    let device = DeviceSelector::new(&instance)
        .with_queue(G, 1.0)
        .with_scorer(prefer_device_type(DeviceType::DiscreteGpu))
        .select()
        .unwrap();

    assert_eq!(device.properties().name, "discrete");
}

#[test]
fn test_equal_scores_keep_first_device() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![
        profile("first", DeviceType::IntegratedGpu).with_queue_family(G, 1, false),
        profile("second", DeviceType::DiscreteGpu).with_queue_family(G, 1, false),
    ]);

    let device = DeviceSelector::new(&instance).with_queue(G, 1.0).select().unwrap();
    assert_eq!(device.properties().name, "first");
}

#[test]
fn test_custom_scorer_sees_limits_and_features() {
    init_for_tests();
    let mut big = profile("big", DeviceType::IntegratedGpu)
        .with_queue_family(G, 1, false)
        .with_features(DeviceFeatures::GEOMETRY_SHADER);
    big.limits.max_image_dimension_2d = 16384;
    let instance = SimulatedInstance::new(vec![
        profile("small", DeviceType::DiscreteGpu).with_queue_family(G, 1, false),
        big,
    ]);

    let device = DeviceSelector::new(&instance)
        .with_queue(G, 1.0)
        .with_scorer(|ctx| {
            if ctx.default_score() < 0 || !ctx.features.contains(DeviceFeatures::GEOMETRY_SHADER) {
                return -1;
            }
            i64::from(ctx.limits.max_image_dimension_2d)
        })
        .select()
        .unwrap();

    assert_eq!(device.properties().name, "big");
}

#[test]
fn test_missing_required_extension_rejects_device() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![
        profile("plain", DeviceType::DiscreteGpu).with_queue_family(G, 1, false),
        profile("raytracing", DeviceType::IntegratedGpu)
            .with_queue_family(G, 1, false)
            .with_extension("VK_KHR_ray_query"),
    ]);

    let device = DeviceSelector::new(&instance)
        .with_queue(G, 1.0)
        .with_required_extension("VK_KHR_ray_query")
        .select()
        .unwrap();

    assert_eq!(device.properties().name, "raytracing");
    assert_eq!(device.enabled_extensions(), ["VK_KHR_ray_query".to_string()]);
}

#[test]
fn test_no_compatible_device() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![profile("graphics only", DeviceType::DiscreteGpu).with_queue_family(G, 4, false)]);

    let result = DeviceSelector::new(&instance).with_queue(C, 1.0).select();
    assert!(matches!(result, Err(GpuError::NoCompatibleDevice)));

    let empty = SimulatedInstance::new(Vec::new());
    let result = DeviceSelector::new(&empty).with_queue(G, 1.0).select();
    assert!(matches!(result, Err(GpuError::NoCompatibleDevice)));
}

#[test]
fn test_empty_request_list_is_contract_violation() {
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu).with_queue_family(G, 1, false)]);
    let result = DeviceSelector::new(&instance).select();
    assert!(matches!(result, Err(GpuError::ContractViolation(_))));
}

#[test]
fn test_request_without_capabilities_is_contract_violation() {
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu).with_queue_family(G, 1, false)]);
    let result = DeviceSelector::new(&instance)
        .with_queue(G, 1.0)
        .with_queue(QueueCapabilities::empty(), 1.0)
        .select();
    assert!(matches!(result, Err(GpuError::ContractViolation(_))));
}

#[test]
fn test_requests_land_on_most_specialized_families() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu)
        .with_queue_family(G | C | T, 1, false)
        .with_queue_family(C | T, 1, false)
        .with_queue_family(T, 1, false)]);

    let device = DeviceSelector::new(&instance)
        .with_queue(T, 0.5)
        .with_queue(C, 0.75)
        .with_queue(G, 1.0)
        .select()
        .unwrap();

    let families: Vec<_> = device.requests().iter().map(|request| request.family_index).collect();
    assert_eq!(families, vec![Some(2), Some(1), Some(0)]);
    assert!(device.queues().all(|queue| queue.is_some_and(|q| !q.is_aliased())));

    // Families appear in order of first use
    let desc = device.backend().create_desc();
    let order: Vec<_> = desc.queues.iter().map(|queue| queue.family_index).collect();
    assert_eq!(order, vec![2, 1, 0]);
    assert_eq!(desc.queues[0].priorities, vec![0.5]);
}

#[test]
fn test_superset_family_serves_combined_request() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu)
        .with_queue_family(G, 2, false)
        .with_queue_family(C, 2, false)
        .with_queue_family(G | C | T, 2, false)]);

    let device = DeviceSelector::new(&instance).with_queue(G | C, 1.0).select().unwrap();

    let queue = device.queue(0).unwrap();
    assert_eq!(queue.family_index(), 2);
    assert_eq!(queue.capabilities(), G | C);
}

#[test]
fn test_exhausted_family_aliases_queues() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![profile("one queue", DeviceType::DiscreteGpu).with_queue_family(G, 1, false)]);

    let device = DeviceSelector::new(&instance)
        .with_queue(G, 1.0)
        .with_queue(G, 0.5)
        .with_queue(G, 0.25)
        .select()
        .unwrap();
    let sim = device.backend().clone();

    let owner = device.queue(0).unwrap();
    assert!(!owner.is_aliased());
    for index in 1..3 {
        let alias = device.queue(index).unwrap();
        assert!(alias.is_aliased());
        assert_eq!(alias.handle(), owner.handle());
        assert!(std::ptr::eq(alias.command_pool(), owner.command_pool()));
        assert!(std::ptr::eq(alias.transient_pool(), owner.transient_pool()));
    }

    let desc = sim.create_desc();
    assert_eq!(desc.queues.len(), 1);
    assert_eq!(desc.queues[0].priorities, vec![1.0]);
    assert_eq!(sim.stats().command_pools_created, 2);

    drop(device);
    let stats = sim.stats();
    assert_eq!(stats.command_pools_destroyed, 2);
    assert_eq!(stats.invalid_calls, 0);
}

#[test]
fn test_pools_match_family_and_flags() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu)
        .with_queue_family(G, 1, false)
        .with_queue_family(T, 1, false)]);

    let device = DeviceSelector::new(&instance)
        .with_queue(G, 1.0)
        .with_queue(T, 1.0)
        .select()
        .unwrap();
    let sim = device.backend().clone();

    let transfer = device.queue(1).unwrap();
    assert_eq!(sim.command_pool_info(transfer.command_pool().handle()), Some((1, false)));
    assert_eq!(sim.command_pool_info(transfer.transient_pool().handle()), Some((1, true)));
    assert_eq!(sim.stats().command_pools_created, 4);
}

#[test]
fn test_unmatched_request_is_marked_unsupported() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu).with_queue_family(G, 2, false)]);

    let device = DeviceSelector::new(&instance)
        .with_queue(G, 1.0)
        .with_queue(C, 1.0)
        .with_scorer(|_| 0)
        .select()
        .unwrap();

    assert!(device.is_queue_supported(0));
    assert!(!device.is_queue_supported(1));
    assert!(device.requests()[1].capabilities.is_empty());
    assert_eq!(device.requests()[1].family_index, None);
    assert!(device.queue(1).is_none());
}

#[test]
fn test_present_without_surface_is_contract_violation() {
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu).with_queue_family(G, 1, true)]);
    let result = DeviceSelector::new(&instance).with_queue(G | P, 1.0).select();
    assert!(matches!(result, Err(GpuError::ContractViolation(_))));
}

#[test]
fn test_surface_without_present_is_contract_violation() {
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu).with_queue_family(G, 1, true)]);
    let result = DeviceSelector::new(&instance)
        .with_queue(G, 1.0)
        .with_surface(SimSurface(1))
        .select();
    assert!(matches!(result, Err(GpuError::ContractViolation(_))));
}

#[test]
fn test_present_goes_to_family_with_surface_support() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu)
        .with_queue_family(G, 1, false)
        .with_queue_family(G, 1, true)
        .with_extension(SIMULATED_SWAPCHAIN_EXTENSION)]);

    let device = DeviceSelector::new(&instance)
        .with_queue(G | P, 1.0)
        .with_queue(G, 1.0)
        .with_surface(SimSurface(1))
        .select()
        .unwrap();

    assert_eq!(device.requests()[0].family_index, Some(1));
    assert_eq!(device.requests()[1].family_index, Some(0));
    assert_eq!(device.enabled_extensions(), [SIMULATED_SWAPCHAIN_EXTENSION.to_string()]);
}

#[test]
fn test_presenting_needs_swapchain_extension_and_surface_modes() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![
        profile("no swapchain", DeviceType::DiscreteGpu).with_queue_family(G, 1, true),
        profile("no formats", DeviceType::DiscreteGpu)
            .with_queue_family(G, 1, true)
            .with_extension(SIMULATED_SWAPCHAIN_EXTENSION)
            .with_surface_support(0, 2),
        profile("no present family", DeviceType::DiscreteGpu)
            .with_queue_family(G, 1, false)
            .with_extension(SIMULATED_SWAPCHAIN_EXTENSION),
    ]);

    let result = DeviceSelector::new(&instance)
        .with_queue(G | P, 1.0)
        .with_surface(SimSurface(1))
        .select();
    assert!(matches!(result, Err(GpuError::NoCompatibleDevice)));
}

#[test]
fn test_failed_surface_support_query_rejects_only_that_device() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![
        profile("lost surface", DeviceType::DiscreteGpu)
            .with_queue_family(G, 1, true)
            .with_extension(SIMULATED_SWAPCHAIN_EXTENSION)
            .with_failing_surface_support(),
        profile("presenting", DeviceType::IntegratedGpu)
            .with_queue_family(G, 1, true)
            .with_extension(SIMULATED_SWAPCHAIN_EXTENSION),
    ]);

    let device = DeviceSelector::new(&instance)
        .with_queue(G | P, 1.0)
        .with_surface(SimSurface(1))
        .with_scorer(prefer_device_type(DeviceType::DiscreteGpu))
        .select()
        .unwrap();

    assert_eq!(device.properties().name, "presenting");
}

#[test]
fn test_enabled_features_are_hints_the_device_supports() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu)
        .with_queue_family(G, 1, false)
        .with_features(DeviceFeatures::SAMPLER_ANISOTROPY | DeviceFeatures::WIDE_LINES)]);

    let device = DeviceSelector::new(&instance)
        .with_queue(G, 1.0)
        .with_feature_hints(DeviceFeatures::SAMPLER_ANISOTROPY | DeviceFeatures::GEOMETRY_SHADER)
        .select()
        .unwrap();

    assert_eq!(device.enabled_features(), DeviceFeatures::SAMPLER_ANISOTROPY);
    assert_eq!(device.backend().create_desc().features, DeviceFeatures::SAMPLER_ANISOTROPY);
}

#[test]
fn test_drop_releases_pools_then_device() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![profile("gpu", DeviceType::DiscreteGpu).with_queue_family(G | C, 2, false)]);

    let device = DeviceSelector::new(&instance)
        .with_queue(G, 1.0)
        .with_queue(C, 1.0)
        .with_queue(G | C, 1.0)
        .select()
        .unwrap();
    let sim = device.backend().clone();
    assert_eq!(sim.live_command_pools(), 4);

    drop(device);
    let stats = sim.stats();
    assert!(sim.is_destroyed());
    assert_eq!(sim.live_command_pools(), 0);
    assert_eq!(stats.command_pools_destroyed, 4);
    assert_eq!(stats.invalid_calls, 0);
}

#[test]
fn test_selection_from_config() {
    init_for_tests();
    let instance = SimulatedInstance::new(vec![
        profile("integrated", DeviceType::IntegratedGpu).with_queue_family(G | C | T, 1, false),
        profile("discrete", DeviceType::DiscreteGpu)
            .with_queue_family(G | C | T, 1, false)
            .with_queue_family(T, 1, false),
    ]);
    let config = DeviceSelectionConfig {
        queues: vec![
            QueueRequestConfig {
                capabilities: G,
                priority: 1.0,
            },
            QueueRequestConfig {
                capabilities: T,
                priority: 0.5,
            },
        ],
        ..DeviceSelectionConfig::default()
    };

    let device = DeviceSelector::from_config(&instance, &config).select().unwrap();

    assert_eq!(device.properties().name, "discrete");
    assert_eq!(device.queue(1).unwrap().family_index(), 1);
    assert!(device.enabled_features().is_empty());
}
