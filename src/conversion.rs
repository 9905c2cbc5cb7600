//! Internal conversion helpers.
//!
//! Pixel-buffer packing, interlaced-field blending, and conversions between
//! stream time-base ticks, seconds, and the microsecond timestamps the
//! demuxer seeks with.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// `bytes_per_pixel` is the number of bytes per pixel of the packed output
/// format (4 for BGRA, 3 for RGB24, 1 for GRAY8).
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Blend the two fields of an interlaced picture in place.
///
/// Every odd row is replaced by the average of its neighbours above and
/// below; the last row, if odd, copies the row above it. Cheap and free of
/// the frame delay a temporal deinterlacer introduces.
pub(crate) fn blend_fields(buffer: &mut [u8], row_bytes: usize, height: usize) {
    if row_bytes == 0 || height < 2 || buffer.len() < row_bytes * height {
        return;
    }

    for row in (1..height).step_by(2) {
        let (before, rest) = buffer.split_at_mut(row * row_bytes);
        let above = &before[(row - 1) * row_bytes..];
        let (current, after) = rest.split_at_mut(row_bytes);

        if row + 1 < height {
            let below = &after[..row_bytes];
            for ((out, &a), &b) in current.iter_mut().zip(above).zip(below) {
                *out = ((a as u16 + b as u16 + 1) / 2) as u8;
            }
        } else {
            current.copy_from_slice(above);
        }
    }
}

/// Rescale a timestamp from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Number of stream time-base ticks in one second.
pub(crate) fn ticks_per_second(time_base: Rational) -> f64 {
    if time_base.numerator() == 0 {
        return 0.0;
    }
    time_base.denominator() as f64 / time_base.numerator() as f64
}

/// Convert a stream timestamp to AV_TIME_BASE microseconds.
///
/// `input.seek()` (via `avformat_seek_file` with `stream_index = -1`)
/// expects AV_TIME_BASE units, not the stream's own time base.
pub(crate) fn stream_to_seek_timestamp(timestamp: i64, time_base: Rational) -> i64 {
    let av_time_base = ffmpeg_sys_next::AV_TIME_BASE as f64;
    (pts_to_seconds(timestamp, time_base) * av_time_base).round() as i64
}

/// Convert AV_TIME_BASE microseconds to a stream timestamp.
pub(crate) fn seek_to_stream_timestamp(microseconds: i64, time_base: Rational) -> i64 {
    let av_time_base = ffmpeg_sys_next::AV_TIME_BASE as f64;
    (microseconds as f64 / av_time_base * ticks_per_second(time_base)).round() as i64
}
