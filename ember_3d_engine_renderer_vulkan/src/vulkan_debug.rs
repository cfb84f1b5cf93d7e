/// Vulkan debug messenger - forwards validation layer messages to the engine logger
///
/// Compiled only with the `vulkan-validation` feature. The caller enables
/// [`VALIDATION_LAYER_NAME`] and [`DEBUG_UTILS_EXTENSION_NAME`] on its instance,
/// then creates a [`VulkanDebugMessenger`] on it.

use ember_3d_engine::ember3d::{Config, Engine, Error, Result};
use ember_3d_engine::ember3d::log::LogSeverity;
use ember_3d_engine::{engine_error, engine_info};
use ash::vk;
use colored::*;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Khronos validation layer
pub const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance extension required by the debug messenger
pub const DEBUG_UTILS_EXTENSION_NAME: &CStr = ash::ext::debug_utils::NAME;

const VALIDATION_SOURCE: &str = "ember3d::vulkan::validation";

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Validation message counts since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn record(&self, severity: LogSeverity) {
        let counter = match severity {
            LogSeverity::Error => &self.errors,
            LogSeverity::Warn => &self.warnings,
            LogSeverity::Info => &self.info,
            LogSeverity::Debug | LogSeverity::Trace => &self.verbose,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Current validation statistics
pub fn validation_stats() -> ValidationStats {
    VALIDATION_STATS.snapshot()
}

pub fn reset_validation_stats() {
    VALIDATION_STATS.reset();
}

/// Print validation statistics report
pub fn print_validation_stats_report() {
    let stats = validation_stats();

    if stats.total() == 0 {
        println!("\n{}", "✓ No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== Validation Statistics Report ===".bright_blue().bold());
    if stats.errors > 0 {
        println!("  {} {}", "Errors:".red().bold(), stats.errors);
    }
    if stats.warnings > 0 {
        println!("  {} {}", "Warnings:".yellow().bold(), stats.warnings);
    }
    if stats.info > 0 {
        println!("  {} {}", "Info:".cyan(), stats.info);
    }
    if stats.verbose > 0 {
        println!("  {} {}", "Verbose:".bright_black(), stats.verbose);
    }
    println!("  {} {}", "Total:".white().bold(), stats.total());
    println!("{}\n", "====================================".bright_blue().bold());
}

/// Engine log severity of a validation message
fn log_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Trace
    }
}

fn message_kind(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = &*p_callback_data;
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        std::borrow::Cow::Borrowed("Unknown")
    } else {
        CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
    };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("No message")
    } else {
        CStr::from_ptr(callback_data.p_message).to_string_lossy()
    };

    let severity = log_severity(message_severity);
    VALIDATION_STATS.record(severity);
    Engine::log(
        severity,
        VALIDATION_SOURCE,
        format!("[{}] {}: {}", message_kind(message_type), message_id_name, message),
    );

    // Never abort the call that triggered the message
    vk::FALSE
}

/// Debug utils messenger bound to an instance
///
/// Must be dropped before the instance is destroyed.
pub struct VulkanDebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl VulkanDebugMessenger {
    /// Create the messenger when `config.enable_validation` is set, `None` otherwise
    pub fn new(entry: &ash::Entry, instance: &ash::Instance, config: &Config) -> Result<Option<Self>> {
        if !config.enable_validation {
            return Ok(None);
        }

        reset_validation_stats();
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .map_err(|e| {
                engine_error!("ember3d::vulkan", "Failed to create debug messenger: {:?}", e);
                Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
            })?;

        engine_info!("ember3d::vulkan", "Validation messages forwarded to the engine logger");
        Ok(Some(Self { loader, messenger }))
    }
}

impl Drop for VulkanDebugMessenger {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_debug_tests.rs"]
mod tests;
