use std::{ffi::OsStr, io::Cursor, path::Path};

use symphonia::core::{
    codecs::CodecParameters,
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
    units::TimeBase,
};
use symphonia::default::get_probe;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognised audio container: {0}")]
    Format(#[source] SymphoniaError),

    #[error("no audio track found")]
    NoTrack,

    #[error("could not determine the track length")]
    UnknownLength,

    #[error("failed while reading packets: {0}")]
    Read(#[source] SymphoniaError),
}

/// Works out how long an uploaded audio file plays for.
pub trait DurationDecoder: Send + Sync {
    /// `filename` is only a hint for the container format.
    fn duration_seconds(&self, filename: &str, bytes: &[u8]) -> Result<f64, DecodeError>;
}

/// Decoder backed by symphonia's default format registry (MP3 and WAV enabled).
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl DurationDecoder for SymphoniaDecoder {
    fn duration_seconds(&self, filename: &str, bytes: &[u8]) -> Result<f64, DecodeError> {
        let source = MediaSourceStream::new(
            Box::new(Cursor::new(bytes.to_vec())),
            MediaSourceStreamOptions::default(),
        );

        let mut hint = Hint::new();
        if let Some(extension) = Path::new(filename).extension().and_then(OsStr::to_str) {
            hint.with_extension(extension);
        }

        let opened = get_probe()
            .format(
                &hint,
                source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(DecodeError::Format)?;
        let mut format = opened.format;

        let track = format.default_track().ok_or(DecodeError::NoTrack)?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        if let Some(seconds) = codec_duration_seconds(&params) {
            return Ok(seconds);
        }

        // No frame count in the header (e.g. MP3 without a Xing/Info frame):
        // walk the packets and add up their durations.
        let time_base = params
            .time_base
            .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))
            .ok_or(DecodeError::UnknownLength)?;

        let mut total_ts: u64 = 0;
        loop {
            match format.next_packet() {
                Ok(packet) if packet.track_id() == track_id => total_ts += packet.dur,
                Ok(_) => {}
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(DecodeError::Read(e)),
            }
        }

        if total_ts == 0 {
            return Err(DecodeError::UnknownLength);
        }
        let time = time_base.calc_time(total_ts);
        Ok(time.seconds as f64 + time.frac)
    }
}

fn codec_duration_seconds(params: &CodecParameters) -> Option<f64> {
    if let (Some(time_base), Some(frames)) = (params.time_base, params.n_frames) {
        let time = time_base.calc_time(frames);
        return Some(time.seconds as f64 + time.frac);
    }

    params
        .n_frames
        .zip(params.sample_rate)
        .filter(|(_, rate)| *rate > 0)
        .map(|(frames, rate)| frames as f64 / rate as f64)
}
