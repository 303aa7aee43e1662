//! H.264 keyframe classification.
//!
//! Access units are expected in Annex B form, starting with a 4-byte start
//! code followed by the first NAL header:
//!
//! ```text
//! 00 00 00 01 | NAL header | ...
//!               ^ byte 4
//! ```
//!
//! Encoders emit an SPS (type 7) ahead of every IDR picture, so an access
//! unit whose first NAL is an SPS is treated as a random-access point. This
//! is a flagging heuristic only; the bitstream is not parsed further.

/// Offset of the first NAL header after a 4-byte start code.
pub const NAL_HEADER_OFFSET: usize = 4;

/// Type field value of a sequence parameter set.
pub const NAL_TYPE_SPS: u8 = 7;

/// Keyframe status of a video access unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Keyframe,
    Delta,
}

impl FrameKind {
    pub fn is_keyframe(self) -> bool {
        self == Self::Keyframe
    }
}

/// Type field of the leading NAL header, if the unit is long enough to have one.
///
/// Reads the low four bits of the header byte.
pub fn leading_nal_type(access_unit: &[u8]) -> Option<u8> {
    access_unit.get(NAL_HEADER_OFFSET).map(|header| header & 0x0f)
}

/// Classify a video access unit.
///
/// Units too short to contain a NAL header are [`FrameKind::Delta`].
pub fn classify(access_unit: &[u8]) -> FrameKind {
    match leading_nal_type(access_unit) {
        Some(NAL_TYPE_SPS) => FrameKind::Keyframe,
        _ => FrameKind::Delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(header: u8) -> Vec<u8> {
        vec![0, 0, 0, 1, header, 0xAA, 0xBB]
    }

    #[test]
    fn sps_is_keyframe() {
        assert_eq!(classify(&unit(0x67)), FrameKind::Keyframe);
    }

    #[test]
    fn other_types_are_delta() {
        // non-IDR slice, IDR slice, PPS, and type 0
        for header in [0x41, 0x65, 0x68, 0x60] {
            assert_eq!(classify(&unit(header)), FrameKind::Delta, "{header:#x}");
        }
    }

    #[test]
    fn reads_low_nibble_only() {
        // 0x17 & 0x0f == 7
        assert_eq!(classify(&unit(0x17)), FrameKind::Keyframe);
        assert_eq!(leading_nal_type(&unit(0x1f)), Some(0x0f));
    }

    #[test]
    fn short_unit_fails_closed() {
        assert_eq!(classify(&[]), FrameKind::Delta);
        assert_eq!(classify(&[0, 0, 0, 1]), FrameKind::Delta);
        assert_eq!(leading_nal_type(&[0, 0, 1]), None);
    }

    #[test]
    fn minimal_unit() {
        assert_eq!(classify(&[0, 0, 0, 1, 0x07]), FrameKind::Keyframe);
        assert!(FrameKind::Keyframe.is_keyframe());
        assert!(!FrameKind::Delta.is_keyframe());
    }
}
