//! Internal utility functions.
//!
//! Helpers for pixel-plane copying and timestamp conversion that do not
//! belong in any single public module.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy the first plane of a packed frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > row bytes).
/// This strips that padding so the result can be passed directly to the
/// `image` buffer constructors. Returns `None` if the plane is shorter than
/// the requested geometry.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Option<Vec<u8>> {
    if video_frame.planes() == 0 {
        return None;
    }

    let stride = video_frame.stride(0);
    let row_bytes = width as usize * bytes_per_pixel;
    let rows = height as usize;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data.get(..row_bytes * rows).map(<[u8]>::to_vec)
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * rows);
        for row in 0..rows {
            let row_start = row * stride;
            buffer.extend_from_slice(data.get(row_start..row_start + row_bytes)?);
        }
        Some(buffer)
    }
}

/// Convert a timestamp in `time_base` units to a [`Duration`].
///
/// Negative timestamps clamp to zero. Returns `None` for `AV_NOPTS_VALUE`, a
/// zero denominator, or a value too large for a `Duration`.
pub fn pts_to_duration(pts: i64, time_base: Rational) -> Option<Duration> {
    if pts == ffmpeg_sys_next::AV_NOPTS_VALUE || time_base.denominator() == 0 {
        return None;
    }
    let seconds =
        pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64;
    Duration::try_from_secs_f64(seconds.max(0.0)).ok()
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::format::Pixel;

    use super::*;

    #[test]
    fn strips_row_padding() {
        // Odd widths force FFmpeg to pad each row to its alignment.
        let mut frame = VideoFrame::new(Pixel::GRAY8, 3, 2);
        let stride = frame.stride(0);
        assert!(stride >= 3);
        let data = frame.data_mut(0);
        data[..3].copy_from_slice(&[1, 2, 3]);
        data[stride..stride + 3].copy_from_slice(&[4, 5, 6]);

        let buffer = frame_to_buffer(&frame, 3, 2, 1).unwrap();
        assert_eq!(buffer, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn blank_frames_have_no_buffer() {
        let frame = VideoFrame::empty();
        assert!(frame_to_buffer(&frame, 4, 4, 1).is_none());
    }

    #[test]
    fn pts_conversion() {
        assert_eq!(
            pts_to_duration(90_000, Rational::new(1, 90_000)),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            pts_to_duration(-10, Rational::new(1, 25)),
            Some(Duration::ZERO)
        );
        assert_eq!(pts_to_duration(10, Rational::new(1, 0)), None);
    }

    #[test]
    fn unrepresentable_timestamps_have_no_duration() {
        assert_eq!(pts_to_duration(i64::MAX, Rational::new(1000, 1)), None);
        assert_eq!(
            pts_to_duration(ffmpeg_sys_next::AV_NOPTS_VALUE, Rational::new(1, 25)),
            None
        );
    }
}
