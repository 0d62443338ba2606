//! WAV encoding, header parsing, and upload format sniffing.
//!
//! Pure functions, no I/O, no async runtime.

/// Capture sample rate for microphone recordings (16 kHz mono).
pub const SAMPLE_RATE: u32 = 16_000;

const SIZE_SENTINEL: u32 = 0xFFFF_FFFF;

/// Compute RMS level of 16-bit PCM samples, normalized to 0.0–1.0.
pub fn compute_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / 32768.0;
            v * v
        })
        .sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// PCM layout of a WAV stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    pub fn mono16(sample_rate: u32) -> Self {
        Self {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
        }
    }

    fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }
}

/// Wrap raw little-endian PCM bytes in a canonical 44-byte WAV header.
pub fn wav_from_pcm(format: WavFormat, pcm: &[u8]) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let block_align = format.block_align();
    let mut buf = Vec::with_capacity(44 + pcm.len());

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_len).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&format.channels.to_le_bytes());
    buf.extend_from_slice(&format.sample_rate.to_le_bytes());
    buf.extend_from_slice(&(format.sample_rate * block_align as u32).to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_len.to_le_bytes());
    buf.extend_from_slice(pcm);

    buf
}

/// Write a 16-bit mono WAV file from captured samples.
pub fn write_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    wav_from_pcm(WavFormat::mono16(sample_rate), &pcm)
}

/// Parsed WAV header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavHeader {
    pub format: WavFormat,
    /// Byte offset in the buffer where raw PCM data begins.
    pub data_offset: usize,
    /// Declared data size; `None` when the writer left the streaming sentinel.
    pub data_len: Option<u32>,
}

/// Parse a WAV header from a byte buffer.
///
/// Speech servers that stream their output write `0xFFFFFFFF` for unknown
/// sizes; those are tolerated and reported as `data_len: None`.
pub fn parse_wav_header(buf: &[u8]) -> Result<WavHeader, &'static str> {
    if buf.len() < 12 {
        return Err("too short for RIFF header");
    }
    if &buf[0..4] != b"RIFF" {
        return Err("missing RIFF tag");
    }
    if &buf[8..12] != b"WAVE" {
        return Err("missing WAVE tag");
    }

    let mut pos = 12;
    let mut format: Option<WavFormat> = None;

    while pos + 8 <= buf.len() {
        let chunk_id = &buf[pos..pos + 4];
        let chunk_size = read_u32(buf, pos + 4);

        if chunk_id == b"fmt " {
            if pos + 24 > buf.len() {
                return Err("fmt chunk truncated");
            }
            if read_u16(buf, pos + 8) != 1 {
                return Err("not PCM format");
            }
            format = Some(WavFormat {
                channels: read_u16(buf, pos + 10),
                sample_rate: read_u32(buf, pos + 12),
                bits_per_sample: read_u16(buf, pos + 22),
            });
            let skip = if chunk_size == SIZE_SENTINEL {
                16
            } else {
                chunk_size as usize
            };
            pos += 8 + skip;
            continue;
        }

        if chunk_id == b"data" {
            let format = format.ok_or("data chunk before fmt chunk")?;
            return Ok(WavHeader {
                format,
                data_offset: pos + 8,
                data_len: (chunk_size != SIZE_SENTINEL).then_some(chunk_size),
            });
        }

        // Unknown chunk; a sentinel size here means we cannot skip it reliably.
        let skip = if chunk_size == SIZE_SENTINEL {
            0
        } else {
            chunk_size as usize
        };
        pos += 8 + skip;
    }

    Err("data chunk not found")
}

/// Patch RIFF and `data` sizes to match the buffer we actually received.
pub fn fix_wav_sizes(mut wav: Vec<u8>) -> Vec<u8> {
    if wav.len() < 44 || &wav[0..4] != b"RIFF" {
        return wav;
    }
    let riff_size = (wav.len() - 8) as u32;
    wav[4..8].copy_from_slice(&riff_size.to_le_bytes());

    let mut pos = 12;
    while pos + 8 <= wav.len() {
        if &wav[pos..pos + 4] == b"data" {
            let data_size = (wav.len() - pos - 8) as u32;
            wav[pos + 4..pos + 8].copy_from_slice(&data_size.to_le_bytes());
            break;
        }
        let chunk_size = read_u32(&wav, pos + 4);
        let skip = if chunk_size == SIZE_SENTINEL {
            0
        } else {
            chunk_size as usize
        };
        pos += 8 + skip;
    }

    wav
}

/// Join several WAV files with the same PCM format into one.
///
/// Used to stitch per-chunk speech synthesis back into a single reply.
pub fn concat_wav(parts: &[Vec<u8>]) -> Result<Vec<u8>, &'static str> {
    let mut format: Option<WavFormat> = None;
    let mut pcm = Vec::new();

    for part in parts {
        let header = parse_wav_header(part)?;
        match format {
            None => format = Some(header.format),
            Some(f) if f != header.format => return Err("mismatched WAV formats"),
            Some(_) => {}
        }
        let end = match header.data_len {
            Some(len) => (header.data_offset + len as usize).min(part.len()),
            None => part.len(),
        };
        pcm.extend_from_slice(&part[header.data_offset..end]);
    }

    let format = format.ok_or("no audio to join")?;
    Ok(wav_from_pcm(format, &pcm))
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

// ─── Upload sniffing ───────────────────────────────────────────────────────

/// Container of an uploaded recording, detected from its magic bytes.
///
/// Browsers record webm/ogg, the terminal client sends wav; the transcriber
/// wants a file name with the right extension either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Webm,
    Ogg,
    Mp3,
    Flac,
    M4a,
    Unknown,
}

impl AudioFormat {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(&b"WAVE"[..]) {
            Self::Wav
        } else if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            Self::Webm
        } else if bytes.starts_with(b"OggS") {
            Self::Ogg
        } else if bytes.starts_with(b"fLaC") {
            Self::Flac
        } else if bytes.starts_with(b"ID3") || matches!(bytes, [0xFF, b, ..] if b & 0xE0 == 0xE0) {
            Self::Mp3
        } else if bytes.get(4..8) == Some(&b"ftyp"[..]) {
            Self::M4a
        } else {
            Self::Unknown
        }
    }

    /// File name to send with the upload. Unknown data is labelled as wav.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Wav | Self::Unknown => "recording.wav",
            Self::Webm => "recording.webm",
            Self::Ogg => "recording.ogg",
            Self::Mp3 => "recording.mp3",
            Self::Flac => "recording.flac",
            Self::M4a => "recording.m4a",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Wav | Self::Unknown => "audio/wav",
            Self::Webm => "audio/webm",
            Self::Ogg => "audio/ogg",
            Self::Mp3 => "audio/mpeg",
            Self::Flac => "audio/flac",
            Self::M4a => "audio/mp4",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_wav_produces_valid_header() {
        let samples = vec![0i16; 100];
        let wav = write_wav(&samples, 16000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(wav.len(), 44 + 200);
    }

    #[test]
    fn compute_rms_silence() {
        assert_eq!(compute_rms(&vec![0i16; 1000]), 0.0);
    }

    #[test]
    fn compute_rms_nonzero() {
        let rms = compute_rms(&vec![16384i16; 100]);
        assert!(rms > 0.4 && rms < 0.6, "rms={rms}");
    }

    #[test]
    fn compute_rms_empty() {
        assert_eq!(compute_rms(&[]), 0.0);
    }

    #[test]
    fn fix_wav_sizes_patches_sentinel() {
        let mut wav = write_wav(&vec![0i16; 50], 16000);
        wav[4..8].copy_from_slice(&SIZE_SENTINEL.to_le_bytes());
        wav[40..44].copy_from_slice(&SIZE_SENTINEL.to_le_bytes());
        let fixed = fix_wav_sizes(wav);
        assert_eq!(read_u32(&fixed, 4), (fixed.len() - 8) as u32);
        assert_eq!(read_u32(&fixed, 40), 100);
    }

    #[test]
    fn fix_wav_sizes_noop_on_good_wav() {
        let wav = write_wav(&vec![0i16; 50], 16000);
        assert_eq!(fix_wav_sizes(wav.clone()), wav);
    }

    #[test]
    fn parse_wav_header_basic() {
        let wav = write_wav(&vec![0i16; 50], 24000);
        let hdr = parse_wav_header(&wav).unwrap();
        assert_eq!(hdr.format, WavFormat::mono16(24000));
        assert_eq!(hdr.data_offset, 44);
        assert_eq!(hdr.data_len, Some(100));
    }

    #[test]
    fn parse_wav_header_sentinel_sizes() {
        let mut wav = write_wav(&vec![0i16; 50], 24000);
        wav[4..8].copy_from_slice(&SIZE_SENTINEL.to_le_bytes());
        wav[40..44].copy_from_slice(&SIZE_SENTINEL.to_le_bytes());
        let hdr = parse_wav_header(&wav).unwrap();
        assert_eq!(hdr.format.sample_rate, 24000);
        assert_eq!(hdr.data_offset, 44);
        assert_eq!(hdr.data_len, None);
    }

    #[test]
    fn parse_wav_header_rejects_garbage() {
        assert!(parse_wav_header(b"RIFF").is_err());
        let mut wav = write_wav(&vec![0i16; 10], 16000);
        wav[0..4].copy_from_slice(b"NOPE");
        assert!(parse_wav_header(&wav).is_err());
    }

    #[test]
    fn concat_joins_pcm() {
        let a = write_wav(&[1, 2, 3], 24000);
        let b = write_wav(&[4, 5], 24000);
        let joined = concat_wav(&[a, b]).unwrap();
        let hdr = parse_wav_header(&joined).unwrap();
        assert_eq!(hdr.data_len, Some(10));
        assert_eq!(joined, write_wav(&[1, 2, 3, 4, 5], 24000));
    }

    #[test]
    fn concat_handles_streamed_part() {
        let mut a = write_wav(&[7, 7], 24000);
        a[40..44].copy_from_slice(&SIZE_SENTINEL.to_le_bytes());
        let joined = concat_wav(&[a]).unwrap();
        assert_eq!(joined, write_wav(&[7, 7], 24000));
    }

    #[test]
    fn concat_rejects_mixed_rates() {
        let a = write_wav(&[1], 24000);
        let b = write_wav(&[1], 16000);
        assert!(concat_wav(&[a, b]).is_err());
        assert!(concat_wav(&[]).is_err());
    }

    #[test]
    fn sniffs_common_containers() {
        assert_eq!(AudioFormat::sniff(&write_wav(&[0], 16000)), AudioFormat::Wav);
        assert_eq!(
            AudioFormat::sniff(&[0x1A, 0x45, 0xDF, 0xA3, 0, 0]),
            AudioFormat::Webm
        );
        assert_eq!(AudioFormat::sniff(b"OggS\0\x02"), AudioFormat::Ogg);
        assert_eq!(AudioFormat::sniff(b"ID3\x04"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::sniff(b"fLaC\0"), AudioFormat::Flac);
        assert_eq!(AudioFormat::sniff(b"\0\0\0\x20ftypM4A "), AudioFormat::M4a);
        assert_eq!(AudioFormat::sniff(b"hello"), AudioFormat::Unknown);
    }

    #[test]
    fn unknown_uploads_are_labelled_wav() {
        assert_eq!(AudioFormat::Unknown.file_name(), "recording.wav");
        assert_eq!(AudioFormat::Webm.mime(), "audio/webm");
    }
}
