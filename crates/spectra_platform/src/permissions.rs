//! Microphone Permission
//!
//! The OS prompt is modelled as a single awaitable request with a
//! granted/denied outcome. Dropping the future abandons the wait.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Outcome of a microphone permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

/// Source of microphone permission decisions
pub trait PermissionProvider {
    /// Ask for microphone access, suspending until the OS answers.
    fn request_microphone(&self) -> impl Future<Output = PermissionStatus> + Send;
}

/// Permission provider backed by the host operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPermissions;

impl SystemPermissions {
    pub fn new() -> Self {
        Self
    }
}

impl PermissionProvider for SystemPermissions {
    fn request_microphone(&self) -> impl Future<Output = PermissionStatus> + Send {
        async {
            #[cfg(target_os = "macos")]
            {
                let status = crate::macos::request_microphone_permission().await;
                info!("Microphone permission: {:?}", status);
                status
            }

            #[cfg(not(target_os = "macos"))]
            {
                debug!("No microphone permission prompt on this platform");
                info!("Microphone permission: {:?}", PermissionStatus::Granted);
                PermissionStatus::Granted
            }
        }
    }
}

/// Provider that always answers with the same status
///
/// Useful for headless runs and for exercising the denied path.
#[derive(Debug, Clone, Copy)]
pub struct FixedPermission(PermissionStatus);

impl FixedPermission {
    pub fn new(status: PermissionStatus) -> Self {
        Self(status)
    }
}

impl PermissionProvider for FixedPermission {
    fn request_microphone(&self) -> impl Future<Output = PermissionStatus> + Send {
        let status = self.0;
        async move {
            debug!("Fixed microphone permission: {:?}", status);
            status
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_permission() {
        let granted = FixedPermission::new(PermissionStatus::Granted);
        assert!(granted.request_microphone().await.is_granted());

        let denied = FixedPermission::new(PermissionStatus::Denied);
        assert_eq!(denied.request_microphone().await, PermissionStatus::Denied);
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn test_system_permission_implicit() {
        let status = SystemPermissions::new().request_microphone().await;
        assert_eq!(status, PermissionStatus::Granted);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&PermissionStatus::Denied).unwrap();
        let deserialized: PermissionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, PermissionStatus::Denied);
    }
}
