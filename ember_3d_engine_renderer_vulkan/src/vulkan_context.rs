/// VulkanContext - shared device state for all Vulkan objects
///
/// Every object created by the backend holds an `Arc<VulkanContext>`, so the
/// allocator outlives the last allocation. The `ash::Device` itself is owned
/// by the caller and must stay alive until every backend object is dropped.

use ember_3d_engine::ember3d::{Error, Result};
use ember_3d_engine::ember3d::device::QueueType;
use ember_3d_engine::engine_error;
use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Queue handed to the backend
#[derive(Debug, Clone, Copy)]
pub struct VulkanQueue {
    pub queue_type: QueueType,
    pub family_index: u32,
    pub queue: vk::Queue,
}

pub(crate) struct VulkanContext {
    pub(crate) device: ash::Device,
    allocator: Mutex<Allocator>,
    queues: FxHashMap<QueueType, VulkanQueue>,
    /// Serializes queue submission and presentation (queues may be shared)
    queue_lock: Mutex<()>,
}

impl VulkanContext {
    pub(crate) fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        queues: &[VulkanQueue],
    ) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| {
            engine_error!("ember3d::vulkan", "Failed to create GPU allocator: {:?}", e);
            Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
        })?;

        let queues = queues.iter().map(|queue| (queue.queue_type, *queue)).collect();

        Ok(Self {
            device,
            allocator: Mutex::new(allocator),
            queues,
            queue_lock: Mutex::new(()),
        })
    }

    pub(crate) fn queue(&self, queue_type: QueueType) -> Result<VulkanQueue> {
        self.queues.get(&queue_type).copied().ok_or_else(|| {
            engine_error!("ember3d::vulkan", "No Vulkan queue provided for {:?}", queue_type);
            Error::InitializationFailed(format!("No Vulkan queue for {:?}", queue_type))
        })
    }

    pub(crate) fn allocator(&self) -> MutexGuard<'_, Allocator> {
        self.allocator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_queues(&self) -> MutexGuard<'_, ()> {
        self.queue_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Log a failed Vulkan call and map it to an engine error
///
/// Memory exhaustion becomes `OutOfMemory`, everything else `BackendError`.
pub(crate) fn vk_error(what: &str, result: vk::Result) -> Error {
    engine_error!("ember3d::vulkan", "{} failed: {:?}", what, result);
    match result {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Error::OutOfMemory,
        _ => Error::BackendError(format!("{} failed: {:?}", what, result)),
    }
}
