//! Push-to-talk microphone capture using cpal.
//!
//! `AudioCapture::start` opens the default input device and buffers 16 kHz
//! mono i16 samples until `finish` is called, whatever the device's native
//! format, rate or channel count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tokio::sync::mpsc;
use tracing::{debug, error};

use sogo_core::wav::SAMPLE_RATE;

use crate::error::{Error, Result};

pub struct AudioCapture {
    rx: mpsc::UnboundedReceiver<Vec<i16>>,
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl AudioCapture {
    /// Open the default input device and start recording.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Audio`] if there is no microphone or the stream
    /// cannot be started.
    pub fn start() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::audio("no microphone found; connect an audio input device"))?;

        let supported = device
            .default_input_config()
            .map_err(|e| Error::audio(format!("cannot read input config: {e}")))?;

        let native_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        debug!("capture: {native_rate} Hz, {channels} ch, {sample_format:?}");

        let (tx, rx) = mpsc::unbounded_channel::<Vec<i16>>();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<std::result::Result<(), String>>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();

        // cpal Stream is !Send on macOS, so it lives on its own OS thread.
        let thread = std::thread::spawn(move || {
            let err_fn = |err: cpal::StreamError| error!("capture stream error: {err}");
            let stream = match sample_format {
                SampleFormat::I16 => {
                    let stop = stop_thread.clone();
                    device.build_input_stream(
                        &config,
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            if stop.load(Ordering::Relaxed) {
                                return;
                            }
                            let mono = mix_to_mono(data, channels);
                            let _ = tx.send(resample_linear(&mono, native_rate, SAMPLE_RATE));
                        },
                        err_fn,
                        None,
                    )
                }
                SampleFormat::F32 => {
                    let stop = stop_thread.clone();
                    device.build_input_stream(
                        &config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            if stop.load(Ordering::Relaxed) {
                                return;
                            }
                            let pcm: Vec<i16> = data
                                .iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                                .collect();
                            let mono = mix_to_mono(&pcm, channels);
                            let _ = tx.send(resample_linear(&mono, native_rate, SAMPLE_RATE));
                        },
                        err_fn,
                        None,
                    )
                }
                other => {
                    let _ = ready_tx.send(Err(format!("unsupported sample format {other:?}")));
                    return;
                }
            };

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("cannot build input stream: {e}")));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("cannot start input stream: {e}")));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            while !stop_thread.load(Ordering::Relaxed) {
                std::thread::park();
            }
            // stream dropped here, which stops cpal
        });

        let mut capture = AudioCapture {
            rx,
            stop,
            thread: Some(thread),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(capture),
            Ok(Err(message)) => {
                capture.shutdown();
                Err(Error::audio(message))
            }
            Err(_) => {
                capture.shutdown();
                Err(Error::audio("capture thread exited before starting"))
            }
        }
    }

    /// Stop recording and return everything captured so far.
    pub fn finish(mut self) -> Vec<i16> {
        self.shutdown();
        let mut samples = Vec::new();
        while let Ok(chunk) = self.rx.try_recv() {
            samples.extend_from_slice(&chunk);
        }
        debug!(
            "capture: {} samples ({:.1}s)",
            samples.len(),
            samples.len() as f32 / SAMPLE_RATE as f32
        );
        samples
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Mix multi-channel audio to mono by averaging channels.
fn mix_to_mono(input: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return input.to_vec();
    }
    let ch = channels as usize;
    input
        .chunks_exact(ch)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear interpolation resampler. Good enough for speech.
fn resample_linear(input: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio) as usize;
    (0..output_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = pos - idx as f64;
            let s0 = input[idx] as f64;
            let s1 = input.get(idx + 1).map_or(s0, |&s| s as f64);
            (s0 + frac * (s1 - s0)) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_to_mono_passthrough() {
        assert_eq!(mix_to_mono(&[100, 200, 300], 1), vec![100, 200, 300]);
    }

    #[test]
    fn test_mix_to_mono_stereo() {
        assert_eq!(mix_to_mono(&[100, 200, 300, 400], 2), vec![150, 350]);
    }

    #[test]
    fn test_mix_to_mono_drops_partial_frame() {
        assert_eq!(mix_to_mono(&[10, 20, 30], 2), vec![15]);
    }

    #[test]
    fn test_resample_passthrough() {
        assert_eq!(resample_linear(&[1, 2, 3, 4], 16_000, 16_000), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_resample_downsample() {
        // 48 kHz → 16 kHz is 3:1, 9 samples in → 3 out
        let input: Vec<i16> = (0..9).collect();
        assert_eq!(resample_linear(&input, 48_000, 16_000), vec![0, 3, 6]);
    }

    #[test]
    fn test_resample_upsample_interpolates() {
        let output = resample_linear(&[0, 100], 8_000, 16_000);
        assert_eq!(output, vec![0, 50, 100, 100]);
    }

    #[test]
    fn test_resample_empty() {
        assert_eq!(resample_linear(&[], 48_000, 16_000), Vec::<i16>::new());
    }
}
