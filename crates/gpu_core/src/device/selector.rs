//! Physical device selection and logical device creation
//!
//! Every physical device is probed for surface support, matched against the
//! requested queues and scored. The best non-negative score wins; the
//! requests are then assigned to families on the winner, queues are laid out
//! (aliasing when a family runs out of queues) and the device is created.

use std::collections::BTreeSet;

use super::family::{match_requests, plan_queue_layout, FamilySlots};
use super::logical::LogicalDevice;
use super::queue::QueueRequest;
use crate::backend::{DeviceCreateDesc, InstanceBackend};
use crate::config::DeviceSelectionConfig;
use crate::error::{GpuError, GpuResult};
use crate::types::{DeviceFeatures, DeviceLimits, DeviceProperties, DeviceType, QueueCapabilities, QueueFamilyInfo};

/// What a scorer sees about one candidate device
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    /// Device name
    pub device_name: &'a str,
    /// Per request, the family it would use on this device (`None` = unsupported)
    pub queue_support: &'a [Option<u32>],
    /// Extensions the device supports
    pub supported_extensions: &'a BTreeSet<String>,
    /// Extensions the caller requires
    pub required_extensions: &'a [String],
    /// Kind of device
    pub device_type: DeviceType,
    /// Device limits
    pub limits: &'a DeviceLimits,
    /// Features the device supports
    pub features: DeviceFeatures,
}

impl ScoringContext<'_> {
    /// Whether every request found a family on this device
    pub fn all_queues_supported(&self) -> bool {
        self.queue_support.iter().all(Option::is_some)
    }

    /// Whether every required extension is supported
    pub fn has_required_extensions(&self) -> bool {
        self.required_extensions
            .iter()
            .all(|ext| self.supported_extensions.contains(ext))
    }

    /// Default rule: -1 if a queue or a required extension is missing, else 0
    pub fn default_score(&self) -> i64 {
        if self.all_queues_supported() && self.has_required_extensions() {
            0
        } else {
            -1
        }
    }
}

/// Scoring function; a negative score rejects the candidate
pub type DeviceScorer<'a> = Box<dyn Fn(&ScoringContext<'_>) -> i64 + 'a>;

/// Scorer that applies the default rule and then ranks by device type
///
/// `preferred` always outranks other types; among the rest discrete beats
/// integrated beats virtual beats CPU.
pub fn prefer_device_type(preferred: DeviceType) -> impl Fn(&ScoringContext<'_>) -> i64 {
    move |ctx: &ScoringContext<'_>| {
        let base = ctx.default_score();
        if base < 0 {
            return base;
        }
        let rank = match ctx.device_type {
            DeviceType::DiscreteGpu => 4,
            DeviceType::IntegratedGpu => 3,
            DeviceType::VirtualGpu => 2,
            DeviceType::Cpu => 1,
            DeviceType::Other => 0,
        };
        let bonus = if ctx.device_type == preferred { 100 } else { 0 };
        base + bonus + rank
    }
}

/// Everything learned about a physical device during the scan
struct PhysicalDeviceCandidate<P> {
    physical_device: P,
    properties: DeviceProperties,
    features: DeviceFeatures,
    extensions: BTreeSet<String>,
    family_infos: Vec<QueueFamilyInfo>,
    families: Vec<FamilySlots>,
    score: i64,
}

/// Builder that picks a physical device and creates the logical device
pub struct DeviceSelector<'a, I: InstanceBackend> {
    instance: &'a I,
    requests: Vec<QueueRequest>,
    required_extensions: Vec<String>,
    feature_hints: DeviceFeatures,
    surface: Option<I::Surface>,
    scorer: Option<DeviceScorer<'a>>,
}

impl<'a, I: InstanceBackend> DeviceSelector<'a, I> {
    /// Selector with no requests
    pub fn new(instance: &'a I) -> Self {
        Self {
            instance,
            requests: Vec::new(),
            required_extensions: Vec::new(),
            feature_hints: DeviceFeatures::empty(),
            surface: None,
            scorer: None,
        }
    }

    /// Selector populated from configuration
    pub fn from_config(instance: &'a I, config: &DeviceSelectionConfig) -> Self {
        let mut selector = Self::new(instance).with_feature_hints(config.feature_hints);
        for queue in &config.queues {
            selector = selector.with_queue(queue.capabilities, queue.priority);
        }
        for extension in &config.required_extensions {
            selector = selector.with_required_extension(extension.clone());
        }
        if let Some(preferred) = config.preferred_device_type {
            selector = selector.with_scorer(prefer_device_type(preferred));
        }
        selector
    }

    /// Request a queue; requests keep their order
    pub fn with_queue(mut self, capabilities: QueueCapabilities, priority: f32) -> Self {
        self.requests.push(QueueRequest::new(capabilities, priority));
        self
    }

    /// Require a device extension
    pub fn with_required_extension(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.required_extensions.contains(&name) {
            self.required_extensions.push(name);
        }
        self
    }

    /// Features to enable where the chosen device supports them
    pub fn with_feature_hints(mut self, features: DeviceFeatures) -> Self {
        self.feature_hints = features;
        self
    }

    /// Surface that PRESENT requests must be able to present to
    pub fn with_surface(mut self, surface: I::Surface) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Replace the default scorer
    pub fn with_scorer(mut self, scorer: impl Fn(&ScoringContext<'_>) -> i64 + 'a) -> Self {
        self.scorer = Some(Box::new(scorer));
        self
    }

    /// Requests as currently recorded
    pub fn requests(&self) -> &[QueueRequest] {
        &self.requests
    }

    fn presenting(&self) -> bool {
        self.requests
            .iter()
            .any(|request| request.capabilities.contains(QueueCapabilities::PRESENT))
    }

    fn check_preconditions(&self) -> GpuResult<()> {
        if self.requests.is_empty() {
            return Err(GpuError::ContractViolation(
                "device selection needs at least one queue request".to_string(),
            ));
        }
        if let Some(index) = self.requests.iter().position(|request| request.capabilities.is_empty()) {
            return Err(GpuError::ContractViolation(format!(
                "queue request {index} asks for no capabilities"
            )));
        }
        match (self.presenting(), self.surface.is_some()) {
            (true, false) => Err(GpuError::ContractViolation(
                "a PRESENT queue was requested but no surface was given".to_string(),
            )),
            (false, true) => Err(GpuError::ContractViolation(
                "a surface was given but no queue requests PRESENT".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn requested_capabilities(&self) -> Vec<QueueCapabilities> {
        self.requests.iter().map(|request| request.capabilities).collect()
    }

    /// Probe one physical device; `None` when it cannot present at all
    fn evaluate(&self, physical_device: I::PhysicalDevice) -> GpuResult<Option<PhysicalDeviceCandidate<I::PhysicalDevice>>> {
        let instance = self.instance;
        let extensions = instance.device_extensions(physical_device)?;
        let properties = instance.device_properties(physical_device);

        if let Some(surface) = self.surface {
            if !extensions.contains(instance.surface_extension_name()) {
                log::debug!(
                    "Rejecting '{}': missing {}",
                    properties.name,
                    instance.surface_extension_name()
                );
                return Ok(None);
            }
            match instance.surface_formats_and_modes(physical_device, surface) {
                Ok(support) if support.is_usable() => {}
                Ok(_) => {
                    log::debug!("Rejecting '{}': no surface formats or present modes", properties.name);
                    return Ok(None);
                }
                Err(e) => {
                    log::warn!("Rejecting '{}': surface query failed: {}", properties.name, e);
                    return Ok(None);
                }
            }
        }

        let family_infos = instance.queue_family_properties(physical_device);
        let mut families = Vec::with_capacity(family_infos.len());
        for (index, info) in family_infos.iter().enumerate() {
            let can_present = match self.surface {
                Some(surface) => {
                    let index = u32::try_from(index)
                        .map_err(|_| GpuError::Backend("queue family index overflow".to_string()))?;
                    match instance.surface_support(physical_device, index, surface) {
                        Ok(supported) => supported,
                        Err(e) => {
                            log::warn!(
                                "Rejecting '{}': surface support query for family {} failed: {}",
                                properties.name,
                                index,
                                e
                            );
                            return Ok(None);
                        }
                    }
                }
                None => false,
            };
            families.push(FamilySlots::new(*info, can_present));
        }

        let queue_support = match_requests(&mut families.clone(), &self.requested_capabilities());
        let features = instance.device_features(physical_device);

        let ctx = ScoringContext {
            device_name: &properties.name,
            queue_support: &queue_support,
            supported_extensions: &extensions,
            required_extensions: &self.required_extensions,
            device_type: properties.device_type,
            limits: &properties.limits,
            features,
        };
        let score = match &self.scorer {
            Some(scorer) => scorer(&ctx),
            None => ctx.default_score(),
        };

        log::debug!(
            "Candidate '{}' ({:?}): score {}, queue support {:?}",
            properties.name,
            properties.device_type,
            score,
            queue_support
        );

        Ok(Some(PhysicalDeviceCandidate {
            physical_device,
            properties,
            features,
            extensions,
            family_infos,
            families,
            score,
        }))
    }

    /// Pick the best device and create it
    ///
    /// Fails with [`GpuError::NoCompatibleDevice`] when no candidate scores
    /// zero or more. Requests that cannot be served on the chosen device are
    /// returned unsupported in [`LogicalDevice::requests`] rather than failing.
    pub fn select(mut self) -> GpuResult<LogicalDevice<I::Device>> {
        self.check_preconditions()?;

        let mut best: Option<PhysicalDeviceCandidate<I::PhysicalDevice>> = None;
        for physical_device in self.instance.enumerate_physical_devices()? {
            let Some(candidate) = self.evaluate(physical_device)? else {
                continue;
            };
            if candidate.score < 0 {
                continue;
            }
            if best.as_ref().map_or(true, |current| candidate.score > current.score) {
                best = Some(candidate);
            }
        }

        let winner = best.ok_or(GpuError::NoCompatibleDevice)?;
        log::info!(
            "Selected GPU: {} ({:?}, score {})",
            winner.properties.name,
            winner.properties.device_type,
            winner.score
        );

        // Assign on a fresh copy of the winner's family table
        let assignments = match_requests(&mut winner.families.clone(), &self.requested_capabilities());
        for (request, assignment) in self.requests.iter_mut().zip(&assignments) {
            match assignment {
                Some(family_index) => request.family_index = Some(*family_index),
                None => {
                    log::warn!(
                        "Queue request {:?} has no matching family on '{}'; marked unsupported",
                        request.capabilities,
                        winner.properties.name
                    );
                    request.mark_unsupported();
                }
            }
        }

        let priorities: Vec<f32> = self.requests.iter().map(|request| request.priority).collect();
        let layout = plan_queue_layout(&assignments, &priorities, &winner.family_infos);
        for (index, slot) in layout.slots.iter().enumerate() {
            if let Some(target) = slot.and_then(|slot| slot.alias_of) {
                log::warn!(
                    "Queue request {} aliases request {} (family {} out of queues)",
                    index,
                    target,
                    self.requests[index].family_index.unwrap_or_default()
                );
            }
        }

        let mut extensions = self.required_extensions.clone();
        if self.surface.is_some() {
            let surface_extension = self.instance.surface_extension_name().to_string();
            if !extensions.contains(&surface_extension) {
                extensions.push(surface_extension);
            }
        }
        // Scorers may accept devices lacking a required extension; never ask the driver for them
        extensions.retain(|ext| {
            let supported = winner.extensions.contains(ext);
            if !supported {
                log::warn!("Extension {} not supported by '{}'; not enabled", ext, winner.properties.name);
            }
            supported
        });

        let desc = DeviceCreateDesc {
            queues: layout.create_descs.clone(),
            extensions,
            features: self.feature_hints & winner.features,
        };
        let device = self.instance.create_device(winner.physical_device, &desc)?;
        let memory_types = self.instance.memory_types(winner.physical_device);

        for queue in &desc.queues {
            log::info!(
                "Queue family {}: {} queue(s), priorities {:?}",
                queue.family_index,
                queue.priorities.len(),
                queue.priorities
            );
        }

        LogicalDevice::new(
            device,
            winner.properties,
            winner.family_infos,
            memory_types,
            std::mem::take(&mut self.requests),
            &layout.slots,
            desc.extensions,
            desc.features,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        queue_support: &'a [Option<u32>],
        supported: &'a BTreeSet<String>,
        required: &'a [String],
        device_type: DeviceType,
        limits: &'a DeviceLimits,
    ) -> ScoringContext<'a> {
        ScoringContext {
            device_name: "test",
            queue_support,
            supported_extensions: supported,
            required_extensions: required,
            device_type,
            limits,
            features: DeviceFeatures::empty(),
        }
    }

    #[test]
    fn test_default_score_rejects_missing_queue() {
        let limits = DeviceLimits::default();
        let supported = BTreeSet::new();
        let context = ctx(&[Some(0), None], &supported, &[], DeviceType::DiscreteGpu, &limits);
        assert_eq!(context.default_score(), -1);
    }

    #[test]
    fn test_default_score_rejects_missing_extension() {
        let limits = DeviceLimits::default();
        let supported: BTreeSet<String> = ["VK_KHR_swapchain".to_string()].into_iter().collect();
        let required = vec!["VK_KHR_ray_query".to_string()];
        let context = ctx(&[Some(0)], &supported, &required, DeviceType::DiscreteGpu, &limits);
        assert_eq!(context.default_score(), -1);

        let required = vec!["VK_KHR_swapchain".to_string()];
        let context = ctx(&[Some(0)], &supported, &required, DeviceType::DiscreteGpu, &limits);
        assert_eq!(context.default_score(), 0);
    }

    #[test]
    fn test_prefer_device_type_ranks_preferred_first() {
        let limits = DeviceLimits::default();
        let supported = BTreeSet::new();
        let scorer = prefer_device_type(DeviceType::IntegratedGpu);

        let integrated = scorer(&ctx(&[Some(0)], &supported, &[], DeviceType::IntegratedGpu, &limits));
        let discrete = scorer(&ctx(&[Some(0)], &supported, &[], DeviceType::DiscreteGpu, &limits));
        let rejected = scorer(&ctx(&[None], &supported, &[], DeviceType::IntegratedGpu, &limits));

        assert!(integrated > discrete);
        assert!(discrete >= 0);
        assert!(rejected < 0);
    }
}
