//! FFmpeg-backed [`Decoder`].
//!
//! Reads the best video stream of a file one packet at a time, reports the
//! packet's timestamp hints with every event, and converts the last picture
//! with a cached scaling context. Deinterlacing blends the two fields of the
//! decoded picture before scaling.

use std::path::Path;

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::{Id, context::Context as CodecContext},
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};

use crate::{
    configuration::OutputSettings,
    conversion,
    decoder::{DecodeEvent, Decoder},
    error::FrameServerError,
    frame::Picture,
    media_info::{self, FrameRateHints, MediaInfo},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalerKey {
    source_format: Pixel,
    source_width: u32,
    source_height: u32,
    target_format: Pixel,
    target_width: u32,
    target_height: u32,
    flags: ScalingFlags,
}

/// The production decoder, built on `ffmpeg-next`.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use frameserver::{Decoder, FfmpegDecoder};
///
/// let decoder = FfmpegDecoder::open(Path::new("input.mp4"))?;
/// println!("{} fps", decoder.info().frames_per_second);
/// # Ok::<(), frameserver::FrameServerError>(())
/// ```
pub struct FfmpegDecoder {
    input: Input,
    decoder: VideoDecoder,
    stream_index: usize,
    time_base: Rational,
    info: MediaInfo,
    decoded: VideoFrame,
    converted: VideoFrame,
    has_picture: bool,
    draining: bool,
    scaler: Option<(ScalerKey, ScalingContext)>,
}

impl FfmpegDecoder {
    /// The video stream's time base.
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    fn receive(&mut self) -> Result<bool, FrameServerError> {
        match self.decoder.receive_frame(&mut self.decoded) {
            Ok(()) => {
                self.has_picture = true;
                Ok(true)
            }
            Err(FfmpegError::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => Ok(false),
            Err(FfmpegError::Eof) => Ok(false),
            Err(error) => Err(FrameServerError::FrameNotRead(format!(
                "decoder refused to output a frame: {error}"
            ))),
        }
    }

    fn drain(&mut self) -> Result<DecodeEvent, FrameServerError> {
        if self.receive()? {
            Ok(DecodeEvent::Decoded {
                dts: None,
                pts: None,
            })
        } else {
            Ok(DecodeEvent::EndOfStream)
        }
    }
}

impl std::fmt::Debug for FfmpegDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegDecoder")
            .field("stream_index", &self.stream_index)
            .field("time_base", &self.time_base)
            .field("info", &self.info)
            .field("draining", &self.draining)
            .finish()
    }
}

impl Decoder for FfmpegDecoder {
    fn open(path: &Path) -> Result<Self, FrameServerError> {
        let canonical_path = path.to_path_buf();
        log::debug!("Opening media file: {}", canonical_path.display());

        crate::ffmpeg::initialize().map_err(|error| FrameServerError::FileOpen {
            path: canonical_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input =
            ffmpeg_next::format::input(&path).map_err(|error| FrameServerError::FileOpen {
                path: canonical_path.clone(),
                reason: error.to_string(),
            })?;

        if input.streams().count() == 0 {
            return Err(FrameServerError::StreamInfoNotFound);
        }

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(FrameServerError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let timestamps_per_second = conversion::ticks_per_second(time_base);

        let codec_id = stream.parameters().id();
        let is_mpeg2 = codec_id == Id::MPEG2VIDEO;
        if ffmpeg_next::decoder::find(codec_id).is_none() {
            return Err(FrameServerError::CodecNotFound);
        }

        let decoder_context = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| FrameServerError::CodecNotOpened(error.to_string()))?;
        let decoder = decoder_context
            .decoder()
            .video()
            .map_err(|error| FrameServerError::CodecNotOpened(error.to_string()))?;

        let duration_microseconds = input.duration();
        if duration_microseconds <= 0 || timestamps_per_second <= 0.0 {
            return Err(FrameServerError::DurationNotFound);
        }
        let duration = conversion::seek_to_stream_timestamp(duration_microseconds, time_base);
        if duration <= 0 {
            return Err(FrameServerError::DurationNotFound);
        }

        let start_time = stream.start_time();
        let first_timestamp = if start_time > 0 { start_time } else { 0 };

        let average = stream.avg_frame_rate();
        let hints = FrameRateHints {
            average_frame_rate: if average.denominator() != 0 {
                average.numerator() as f64 / average.denominator() as f64
            } else {
                0.0
            },
            stream_frame_count: stream.frames(),
            duration_microseconds,
            stream_ticks_per_second: timestamps_per_second,
            codec_ticks_per_second: decoder
                .frame_rate()
                .filter(|rate| rate.denominator() != 0)
                .map(|rate| rate.numerator() as f64 / rate.denominator() as f64)
                .unwrap_or(0.0),
        };
        let (frames_per_second, frame_rate_source) =
            media_info::estimate_frames_per_second(&hints);
        let timestamps_per_frame = ((timestamps_per_second / frames_per_second).round() as i64).max(1);

        let width = decoder.width();
        let height = decoder.height();
        let sample_aspect_ratio = decoder.aspect_ratio();
        let pixel_aspect_ratio = media_info::pixel_aspect_ratio(
            sample_aspect_ratio.numerator(),
            sample_aspect_ratio.denominator(),
            width,
            height,
            is_mpeg2,
        );

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let format = input.format().name().to_string();

        let info = MediaInfo {
            path: canonical_path,
            format,
            codec,
            width,
            height,
            pixel_aspect_ratio,
            frames_per_second,
            frame_rate_source,
            timestamps_per_second,
            timestamps_per_frame,
            duration,
            first_timestamp,
        };

        Ok(Self {
            input,
            decoder,
            stream_index,
            time_base,
            info,
            decoded: VideoFrame::empty(),
            converted: VideoFrame::empty(),
            has_picture: false,
            draining: false,
            scaler: None,
        })
    }

    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn read_next(&mut self) -> Result<DecodeEvent, FrameServerError> {
        if self.draining {
            return self.drain();
        }

        // Pictures left over from a packet that produced more than one.
        if self.receive()? {
            return Ok(DecodeEvent::Decoded {
                dts: None,
                pts: None,
            });
        }

        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(FfmpegError::Eof) => {
                    log::debug!("End of stream reached, draining decoder");
                    self.decoder.send_eof().map_err(|error| {
                        FrameServerError::FrameNotRead(format!("failed to flush decoder: {error}"))
                    })?;
                    self.draining = true;
                    return self.drain();
                }
                Err(error) => return Err(FrameServerError::FrameNotRead(error.to_string())),
            }

            if packet.stream() != self.stream_index {
                continue;
            }

            let dts = packet.dts();
            let pts = packet.pts();
            self.decoder.send_packet(&packet).map_err(|error| {
                FrameServerError::FrameNotRead(format!("decoder rejected packet: {error}"))
            })?;

            return if self.receive()? {
                Ok(DecodeEvent::Decoded { dts, pts })
            } else {
                Ok(DecodeEvent::Buffered { dts, pts })
            };
        }
    }

    fn seek(&mut self, target: i64) -> Result<(), FrameServerError> {
        let seek_timestamp = conversion::stream_to_seek_timestamp(target, self.time_base);
        log::debug!("Seeking to {target} ({seek_timestamp} µs)");

        let result = self.input.seek(seek_timestamp, ..seek_timestamp);

        self.decoder.flush();
        self.draining = false;
        self.has_picture = false;

        result.map_err(|error| {
            log::warn!("Seek to {target} failed: {error}");
            FrameServerError::SeekFailed(target)
        })
    }

    fn convert(&mut self, settings: &OutputSettings) -> Result<Picture, FrameServerError> {
        if !self.has_picture {
            return Err(FrameServerError::ImageNotConverted(
                "no decoded picture to convert".to_string(),
            ));
        }

        let key = ScalerKey {
            source_format: self.decoded.format(),
            source_width: self.decoded.width(),
            source_height: self.decoded.height(),
            target_format: settings.pixel_format.to_ffmpeg_pixel(),
            target_width: settings.width,
            target_height: settings.height,
            flags: settings.quality.to_scaling_flags(),
        };

        if self.scaler.as_ref().is_none_or(|(cached, _)| *cached != key) {
            let scaler = ScalingContext::get(
                key.source_format,
                key.source_width,
                key.source_height,
                key.target_format,
                key.target_width,
                key.target_height,
                key.flags,
            )
            .map_err(|error| {
                FrameServerError::ImageNotConverted(format!("failed to create scaler: {error}"))
            })?;
            self.scaler = Some((key, scaler));
        }

        let Some((_, scaler)) = self.scaler.as_mut() else {
            return Err(FrameServerError::ImageNotConverted(
                "scaler unavailable".to_string(),
            ));
        };

        let run = if settings.deinterlace {
            let mut source = self.decoded.clone();
            for plane in 0..source.planes() {
                let stride = source.stride(plane);
                let rows = source.plane_height(plane) as usize;
                conversion::blend_fields(source.data_mut(plane), stride, rows);
            }
            scaler.run(&source, &mut self.converted)
        } else {
            scaler.run(&self.decoded, &mut self.converted)
        };
        run.map_err(|error| FrameServerError::ImageNotConverted(error.to_string()))?;

        let data = conversion::frame_to_buffer(
            &self.converted,
            settings.width,
            settings.height,
            settings.pixel_format.bytes_per_pixel(),
        );

        Ok(Picture {
            width: settings.width,
            height: settings.height,
            format: settings.pixel_format,
            data,
        })
    }
}
