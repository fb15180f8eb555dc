/// Sound engine: procedural beeps for robot actions via rodio.
///
/// All sounds are generated as in-memory WAV buffers at init time.
/// Playback is fire-and-forget (non-blocking) via rodio's Sink.
///
/// Compile with `--no-default-features` to disable audio entirely
/// (the stub SoundEngine does nothing).

#[cfg(feature = "sound")]
mod inner {
    use std::f32::consts::PI;
    use std::io::Cursor;
    use std::sync::Arc;

    use log::debug;
    use rodio::{OutputStream, OutputStreamHandle, Sink};

    const SAMPLE_RATE: u32 = 22050;

    /// Pre-generated WAV buffers for each sound effect.
    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sfx_step: Arc<Vec<u8>>,
        sfx_turn: Arc<Vec<u8>>,
        sfx_pick: Arc<Vec<u8>>,
        sfx_door: Arc<Vec<u8>>,
        sfx_splash: Arc<Vec<u8>>,
        sfx_bump: Arc<Vec<u8>>,
        sfx_win: Arc<Vec<u8>>,
        sfx_crash: Arc<Vec<u8>>,
        sfx_click: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    debug!("no audio output: {e}");
                    return None;
                }
            };

            Some(SoundEngine {
                _stream: stream,
                handle,
                sfx_step: Arc::new(make_wav(&gen_blip(660.0, 0.03, 0.15))),
                sfx_turn: Arc::new(make_wav(&gen_sweep(500.0, 800.0, 0.05, 0.15))),
                sfx_pick: Arc::new(make_wav(&gen_arpeggio(&[1047.0, 1319.0, 1568.0], 0.045))),
                sfx_door: Arc::new(make_wav(&gen_clunk())),
                sfx_splash: Arc::new(make_wav(&gen_hiss())),
                sfx_bump: Arc::new(make_wav(&gen_sweep(220.0, 120.0, 0.08, 0.3))),
                sfx_win: Arc::new(make_wav(&gen_fanfare())),
                sfx_crash: Arc::new(make_wav(&gen_crash())),
                sfx_click: Arc::new(make_wav(&gen_blip(1200.0, 0.015, 0.12))),
            })
        }

        fn play(&self, buf: &Arc<Vec<u8>>) {
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }

        pub fn play_step(&self) { self.play(&self.sfx_step); }
        pub fn play_turn(&self) { self.play(&self.sfx_turn); }
        pub fn play_pick(&self) { self.play(&self.sfx_pick); }
        pub fn play_door(&self) { self.play(&self.sfx_door); }
        pub fn play_splash(&self) { self.play(&self.sfx_splash); }
        pub fn play_bump(&self) { self.play(&self.sfx_bump); }
        pub fn play_win(&self) { self.play(&self.sfx_win); }
        pub fn play_crash(&self) { self.play(&self.sfx_crash); }
        pub fn play_click(&self) { self.play(&self.sfx_click); }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators: all produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    fn samples_for(duration: f32) -> usize {
        (SAMPLE_RATE as f32 * duration) as usize
    }

    /// Sine blip with a linear fade out.
    fn gen_blip(freq: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = samples_for(duration);
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32);
                (t * freq * 2.0 * PI).sin() * env * volume
            })
            .collect()
    }

    /// Linear pitch sweep from `from` to `to` Hz.
    fn gen_sweep(from: f32, to: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = samples_for(duration);
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = from + (to - from) * t;
                phase += freq * 2.0 * PI / SAMPLE_RATE as f32;
                phase.sin() * (1.0 - t).powf(0.6) * volume
            })
            .collect()
    }

    /// Quick square-ish arpeggio (key pickup).
    fn gen_arpeggio(notes: &[f32], note_dur: f32) -> Vec<f32> {
        let mut samples = Vec::new();
        for &freq in notes {
            let n = samples_for(note_dur);
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5);
                let wave = (t * freq * 2.0 * PI).sin() * 0.7 + (t * freq * 3.0 * 2.0 * PI).sin() * 0.3;
                samples.push(wave * env * 0.25);
            }
        }
        samples
    }

    /// Door unlocking: low tone mixed with a noise burst.
    fn gen_clunk() -> Vec<f32> {
        let n = samples_for(0.14);
        let mut rng: u32 = 12345;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = 140.0 + (1.0 - t) * 120.0;
                let ti = i as f32 / SAMPLE_RATE as f32;
                let tone = (ti * freq * 2.0 * PI).sin();
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                (tone * 0.7 + noise * 0.3) * (1.0 - t).powf(1.5) * 0.35
            })
            .collect()
    }

    /// Fire going out: filtered noise fading slowly.
    fn gen_hiss() -> Vec<f32> {
        let n = samples_for(0.3);
        let mut rng: u32 = 777;
        let mut last = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                last = last * 0.6 + noise * 0.4;
                last * (1.0 - t).powf(0.8) * 0.3
            })
            .collect()
    }

    /// Goal reached: ascending fanfare C5-E5-G5-C6 with a held last note.
    fn gen_fanfare() -> Vec<f32> {
        let notes = [523.0_f32, 659.0, 784.0, 1047.0];
        let mut samples = Vec::new();
        for &freq in &notes {
            let n = samples_for(0.1);
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32) * 0.3;
                let wave = (t * freq * 2.0 * PI).sin() * 0.6
                    + (t * freq * 2.0 * 2.0 * PI).sin() * 0.3
                    + (t * freq * 3.0 * 2.0 * PI).sin() * 0.1;
                samples.push(wave * env * 0.3);
            }
        }
        samples.extend(gen_blip(1047.0, 0.25, 0.3));
        samples
    }

    /// Crash: descending A4-F#4-Eb4-C4 with a fade at the end.
    fn gen_crash() -> Vec<f32> {
        let notes = [440.0_f32, 370.0, 311.0, 261.0];
        let mut samples = Vec::new();
        for &freq in &notes {
            let n = samples_for(0.12);
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32) * 0.3;
                samples.push((t * freq * 2.0 * PI).sin() * env * 0.3);
            }
        }
        let total = samples.len();
        let fade_len = total / 4;
        for (k, s) in samples[total - fade_len..].iter_mut().enumerate() {
            *s *= (fade_len - k) as f32 / fade_len as f32;
        }
        samples
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: wraps f32 samples into a valid WAV buffer
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let num_channels: u16 = 1;
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
        let block_align = num_channels * bits_per_sample / 8;
        let data_size = samples.len() as u32 * 2;
        let file_size = 36 + data_size;

        let mut buf = Vec::with_capacity(44 + data_size as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&num_channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }

        buf
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn wav_header_sizes() {
            let wav = make_wav(&gen_blip(440.0, 0.01, 0.5));
            let n = samples_for(0.01);
            assert_eq!(&wav[0..4], b"RIFF");
            assert_eq!(wav.len(), 44 + n * 2);
            assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]) as usize, n * 2);
        }

        #[test]
        fn generators_stay_in_range() {
            for s in gen_fanfare().into_iter().chain(gen_crash()).chain(gen_hiss()).chain(gen_clunk()) {
                assert!((-1.0..=1.0).contains(&s));
            }
        }
    }
}

// ════════════════════════════════════════════════════════════
//  Public API: compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play_step(&self) {}
    pub fn play_turn(&self) {}
    pub fn play_pick(&self) {}
    pub fn play_door(&self) {}
    pub fn play_splash(&self) {}
    pub fn play_bump(&self) {}
    pub fn play_win(&self) {}
    pub fn play_crash(&self) {}
    pub fn play_click(&self) {}
}
