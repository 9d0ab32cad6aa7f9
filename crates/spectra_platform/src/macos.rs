//! macOS Microphone Permission
//!
//! AVCaptureDevice answers the prompt on an arbitrary queue through a
//! completion block; the block forwards the answer over a oneshot channel
//! so callers can simply `.await` it.

use block2::RcBlock;
use objc2::msg_send;
use objc2::runtime::{AnyClass, Bool};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::permissions::PermissionStatus;

#[link(name = "AVFoundation", kind = "framework")]
extern "C" {}

/// AVMediaTypeAudio
const MEDIA_TYPE_AUDIO: &str = "soun";

/// AVAuthorizationStatusAuthorized
const AUTHORIZED: isize = 3;

/// Check if Microphone permission is already granted
pub fn has_microphone_permission() -> bool {
    unsafe {
        let cls = match AnyClass::get(c"AVCaptureDevice") {
            Some(c) => c,
            None => return false,
        };

        let media_type = objc2_foundation::NSString::from_str(MEDIA_TYPE_AUDIO);

        // 0=NotDetermined, 1=Restricted, 2=Denied, 3=Authorized
        let status: isize = msg_send![cls, authorizationStatusForMediaType: &*media_type];
        debug!("Microphone authorization status: {}", status);

        status == AUTHORIZED
    }
}

/// Request Microphone permission
///
/// Resolves immediately if the user already decided, otherwise once the
/// prompt is answered.
pub async fn request_microphone_permission() -> PermissionStatus {
    if has_microphone_permission() {
        return PermissionStatus::Granted;
    }

    info!("Requesting Microphone permission...");

    let (tx, rx) = oneshot::channel::<bool>();

    unsafe {
        let cls = match AnyClass::get(c"AVCaptureDevice") {
            Some(c) => c,
            None => {
                warn!("AVCaptureDevice class not found");
                return PermissionStatus::Denied;
            }
        };

        let media_type = objc2_foundation::NSString::from_str(MEDIA_TYPE_AUDIO);

        // The block is Fn, so the sender sits behind a take-once slot
        let slot = Mutex::new(Some(tx));
        let block = RcBlock::new(move |granted: Bool| {
            debug!("Microphone permission callback: {:?}", granted);
            if let Some(tx) = slot.lock().take() {
                let _ = tx.send(granted.is_true());
            }
        });

        let _: () = msg_send![cls, requestAccessForMediaType: &*media_type, completionHandler: &*block];
    }

    match rx.await {
        Ok(true) => PermissionStatus::Granted,
        Ok(false) => PermissionStatus::Denied,
        Err(_) => {
            warn!("Permission callback dropped without an answer");
            PermissionStatus::Denied
        }
    }
}
