//! Spectra Platform - OS-Specific Capabilities
//!
//! This crate isolates the parts of capture setup that depend on the
//! operating system rather than on the audio API:
//!
//! | Platform | Microphone permission                       |
//! |----------|---------------------------------------------|
//! | macOS    | AVCaptureDevice prompt (awaitable)          |
//! | Linux    | Implicit (device access is not gated)       |
//! | Windows  | Implicit (privacy toggle surfaces as a stream build error) |

mod permissions;

#[cfg(target_os = "macos")]
pub mod macos;

pub use permissions::{FixedPermission, PermissionProvider, PermissionStatus, SystemPermissions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let _system = SystemPermissions::new();
        let _fixed = FixedPermission::new(PermissionStatus::Granted);
    }
}
