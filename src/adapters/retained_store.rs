//! Retained-memory snapshot store.
//!
//! Implements [`RetainedStorePort`] on top of the [`crate::retained`] image
//! codec.  On hardware the image lives in RTC slow memory, which keeps its
//! contents through deep sleep and comes back zeroed (magic 0 → "empty")
//! after power loss.  The host twin keeps the image in the adapter itself.

use log::warn;

use crate::app::ports::RetainedStorePort;
use crate::error::StorageError;
use crate::retained::{self, IMAGE_SIZE, RetainedImage, RetainedState};

#[cfg(target_os = "espidf")]
#[unsafe(link_section = ".rtc.data")]
static mut RTC_IMAGE: RetainedImage = [0u8; IMAGE_SIZE];

pub struct RtcRetainedStore {
    #[cfg(not(target_os = "espidf"))]
    image: RetainedImage,
    last_error: Option<StorageError>,
}

impl Default for RtcRetainedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcRetainedStore {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            image: [0u8; IMAGE_SIZE],
            last_error: None,
        }
    }

    /// Host twin pre-loaded with an image, as if the previous cycle had
    /// written it.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_image(image: RetainedImage) -> Self {
        Self {
            image,
            last_error: None,
        }
    }

    /// The raw region as it would survive sleep.
    #[cfg(not(target_os = "espidf"))]
    pub fn image(&self) -> &RetainedImage {
        &self.image
    }

    /// Why the last `restore` fell back to defaults, if it did.
    pub fn last_error(&self) -> Option<StorageError> {
        self.last_error
    }

    #[cfg(target_os = "espidf")]
    fn read_image(&self) -> RetainedImage {
        // SAFETY: single execution context per wake; nothing else touches
        // RTC_IMAGE.
        unsafe { *(&raw const RTC_IMAGE) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_image(&self) -> RetainedImage {
        self.image
    }

    #[cfg(target_os = "espidf")]
    fn write_image(&mut self, image: &RetainedImage) {
        // SAFETY: see read_image.
        unsafe { *(&raw mut RTC_IMAGE) = *image };
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_image(&mut self, image: &RetainedImage) {
        self.image = *image;
    }
}

impl RetainedStorePort for RtcRetainedStore {
    fn restore(&mut self) -> Option<RetainedState> {
        match retained::decode(&self.read_image()) {
            Ok(state) => {
                self.last_error = None;
                Some(state)
            }
            Err(StorageError::Empty) => {
                self.last_error = Some(StorageError::Empty);
                None
            }
            Err(e) => {
                warn!("RetainedStore: discarding image ({})", e);
                self.last_error = Some(e);
                None
            }
        }
    }

    fn persist(&mut self, state: &RetainedState) -> Result<(), StorageError> {
        let image = retained::encode(state)?;
        self.write_image(&image);
        Ok(())
    }
}
