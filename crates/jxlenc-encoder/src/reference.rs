//! Reference frame arena
//!
//! Four slots of owned frame snapshots, addressed by the small slot index
//! carried in frame headers (1..=4; 0 means "do not save"). Patches refer
//! to slots by the same index, so no frame ever holds a pointer into
//! another.

use jxlenc_core::consts::REFERENCE_SLOTS;
use jxlenc_core::{ImageFrame, Result};

use crate::modular::extract_channels;

/// An owned snapshot of a frame's main channel planes
#[derive(Debug, Clone)]
pub struct ReferenceFrame {
    pub width: usize,
    pub height: usize,
    pub planes: Vec<Vec<i32>>,
}

impl ReferenceFrame {
    /// Snapshot the main channels of a frame
    pub fn snapshot(frame: &ImageFrame) -> Result<Self> {
        let channels = extract_channels(frame)?;
        let planes = channels
            .into_iter()
            .take(frame.channels)
            .map(|c| c.data)
            .collect();
        Ok(Self {
            width: frame.width() as usize,
            height: frame.height() as usize,
            planes,
        })
    }
}

/// The four-slot reference arena
#[derive(Debug, Default)]
pub struct ReferenceSlots {
    slots: [Option<ReferenceFrame>; REFERENCE_SLOTS],
    most_recent: Option<u8>,
}

impl ReferenceSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot in `slot` (1..=4)
    pub fn save(&mut self, slot: u8, frame: ReferenceFrame) {
        debug_assert!((1..=REFERENCE_SLOTS as u8).contains(&slot));
        self.slots[(slot - 1) as usize] = Some(frame);
        self.most_recent = Some(slot);
    }

    pub fn get(&self, slot: u8) -> Option<&ReferenceFrame> {
        if slot == 0 || slot as usize > REFERENCE_SLOTS {
            return None;
        }
        self.slots[(slot - 1) as usize].as_ref()
    }

    /// The most recently saved slot, if any
    pub fn most_recent(&self) -> Option<(u8, &ReferenceFrame)> {
        let slot = self.most_recent?;
        self.get(slot).map(|frame| (slot, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jxlenc_core::{ColorDescriptor, Dimensions, PixelType};

    fn frame() -> ImageFrame {
        ImageFrame::new(
            Dimensions::new(8, 8),
            3,
            PixelType::U8,
            ColorDescriptor::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_get() {
        let mut slots = ReferenceSlots::new();
        assert!(slots.most_recent().is_none());
        let snapshot = ReferenceFrame::snapshot(&frame()).unwrap();
        slots.save(2, snapshot);
        assert!(slots.get(2).is_some());
        assert!(slots.get(1).is_none());
        assert!(slots.get(0).is_none());
        let (slot, reference) = slots.most_recent().unwrap();
        assert_eq!(slot, 2);
        assert_eq!(reference.planes.len(), 3);
        assert_eq!(reference.width, 8);
    }

    #[test]
    fn test_overwrite_slot() {
        let mut slots = ReferenceSlots::new();
        slots.save(1, ReferenceFrame::snapshot(&frame()).unwrap());
        slots.save(1, ReferenceFrame::snapshot(&frame()).unwrap());
        assert!(slots.get(1).is_some());
        assert_eq!(slots.most_recent().unwrap().0, 1);
    }
}
