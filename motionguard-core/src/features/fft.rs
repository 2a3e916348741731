//! Power Spectrum Estimation
//!
//! Radix-2 real-input FFT with a Hann window, sized for the feature
//! window. Everything runs on fixed-capacity stack buffers; the only
//! runtime requirement is a power-of-two input length, which the config
//! layer already enforces.
//!
//! The output is a one-sided power spectrum with helpers for the spectral
//! features the fingerprint needs: band power, centroid, flatness, and
//! dominant frequency.

use libm::{cosf, expf, logf, sinf};

use crate::buffer::WINDOW_CAPACITY;

/// One-sided spectrum bins for a full-capacity window
pub const MAX_BINS: usize = WINDOW_CAPACITY / 2 + 1;

/// One-sided power spectrum of a windowed real signal
#[derive(Debug, Clone)]
pub struct Spectrum {
    bins: [f32; MAX_BINS],
    len: usize,
    /// Frequency step between adjacent bins
    bin_hz: f32,
}

impl Spectrum {
    /// Width of one frequency bin in Hz
    pub fn bin_hz(&self) -> f32 {
        self.bin_hz
    }

    /// Number of one-sided bins (DC through Nyquist)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total power excluding the DC bin
    pub fn total_power(&self) -> f32 {
        self.bins[1..self.len].iter().sum()
    }

    /// Power integrated over `[lo_hz, hi_hz)`
    pub fn band_power(&self, lo_hz: f32, hi_hz: f32) -> f32 {
        let mut acc = 0.0;
        for k in 1..self.len {
            let f = k as f32 * self.bin_hz;
            if f >= lo_hz && f < hi_hz {
                acc += self.bins[k];
            }
        }
        acc
    }

    /// Power-weighted mean frequency in Hz
    pub fn centroid_hz(&self) -> f32 {
        let mut weighted = 0.0;
        let mut total = 0.0;
        for k in 1..self.len {
            weighted += k as f32 * self.bin_hz * self.bins[k];
            total += self.bins[k];
        }
        if total > 1e-12 {
            weighted / total
        } else {
            0.0
        }
    }

    /// Spectral flatness: geometric over arithmetic mean of bin power
    ///
    /// Near 1 for broadband noise, near 0 for a pure tone.
    pub fn flatness(&self) -> f32 {
        let n = self.len.saturating_sub(1);
        if n == 0 {
            return 0.0;
        }
        let mut log_sum = 0.0;
        let mut sum = 0.0;
        for k in 1..self.len {
            let p = self.bins[k].max(1e-20);
            log_sum += logf(p);
            sum += p;
        }
        let arith = sum / n as f32;
        if arith > 1e-20 {
            expf(log_sum / n as f32) / arith
        } else {
            0.0
        }
    }

    /// Frequency of the strongest non-DC bin in Hz
    pub fn dominant_hz(&self) -> f32 {
        let mut best_k = 0;
        let mut best_p = 0.0;
        for k in 1..self.len {
            if self.bins[k] > best_p {
                best_p = self.bins[k];
                best_k = k;
            }
        }
        best_k as f32 * self.bin_hz
    }
}

/// Hann window coefficient for sample `i` of `n`
fn hann(n: usize, i: usize) -> f32 {
    let phase = 2.0 * core::f32::consts::PI * i as f32 / n as f32;
    0.5 * (1.0 - cosf(phase))
}

/// Compute the one-sided power spectrum of `samples`
///
/// The input length must be a power of two no larger than
/// [`WINDOW_CAPACITY`]; anything else yields an empty spectrum. Power is
/// normalized by the window energy so the result is comparable across
/// window sizes.
pub fn power_spectrum(samples: &[f32], sample_rate_hz: f32) -> Spectrum {
    let n = samples.len();
    let mut out = Spectrum {
        bins: [0.0; MAX_BINS],
        len: 0,
        bin_hz: 0.0,
    };
    if n < 2 || n > WINDOW_CAPACITY || !n.is_power_of_two() {
        return out;
    }

    let mut re = [0.0f32; WINDOW_CAPACITY];
    let mut im = [0.0f32; WINDOW_CAPACITY];
    let mut window_energy = 0.0;
    for i in 0..n {
        let w = hann(n, i);
        re[i] = samples[i] * w;
        window_energy += w * w;
    }

    fft_in_place(&mut re[..n], &mut im[..n]);

    // One-sided power, doubled for interior bins to account for the
    // mirrored half
    let scale = 1.0 / (window_energy * n as f32).max(1e-20);
    let half = n / 2;
    for k in 0..=half {
        let p = (re[k] * re[k] + im[k] * im[k]) * scale;
        out.bins[k] = if k == 0 || k == half { p } else { 2.0 * p };
    }
    out.len = half + 1;
    out.bin_hz = sample_rate_hz / n as f32;
    out
}

/// Iterative radix-2 Cooley-Tukey, in place
///
/// Length must be a power of two; callers guarantee it.
fn fft_in_place(re: &mut [f32], im: &mut [f32]) {
    let n = re.len();

    // Bit-reversal permutation
    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
    }

    // Butterflies
    let mut len = 2;
    while len <= n {
        let angle = -2.0 * core::f32::consts::PI / len as f32;
        let (w_re, w_im) = (cosf(angle), sinf(angle));
        let mut start = 0;
        while start < n {
            let mut cur_re = 1.0f32;
            let mut cur_im = 0.0f32;
            for k in 0..len / 2 {
                let a = start + k;
                let b = a + len / 2;
                let t_re = re[b] * cur_re - im[b] * cur_im;
                let t_im = re[b] * cur_im + im[b] * cur_re;
                re[b] = re[a] - t_re;
                im[b] = im[a] - t_im;
                re[a] += t_re;
                im[a] += t_im;
                let next_re = cur_re * w_re - cur_im * w_im;
                cur_im = cur_re * w_im + cur_im * w_re;
                cur_re = next_re;
            }
            start += len;
        }
        len <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(n: usize, freq_hz: f32, fs: f32, amp: f32) -> heapless::Vec<f32, WINDOW_CAPACITY> {
        (0..n)
            .map(|i| amp * sinf(2.0 * core::f32::consts::PI * freq_hz * i as f32 / fs))
            .collect()
    }

    #[test]
    fn pure_tone_lands_in_its_bin() {
        let fs = 100.0;
        let signal = sine(256, 5.0, fs, 1.0);
        let spec = power_spectrum(&signal, fs);

        // 5 Hz at fs=100, n=256 sits near bin 12.8; the Hann lobe spans
        // a couple of bins either side
        let dom = spec.dominant_hz();
        assert!((dom - 5.0).abs() < 2.0 * spec.bin_hz(), "dominant = {}", dom);

        let in_band = spec.band_power(3.0, 7.0);
        let out_band = spec.band_power(20.0, 45.0);
        assert!(in_band > 10.0 * out_band);
    }

    #[test]
    fn tone_is_spectrally_peaked() {
        let fs = 100.0;
        let tone = power_spectrum(&sine(256, 8.0, fs, 1.0), fs);
        assert!(tone.flatness() < 0.1, "flatness = {}", tone.flatness());
    }

    #[test]
    fn centroid_tracks_the_tone() {
        let fs = 100.0;
        let spec = power_spectrum(&sine(256, 12.0, fs, 1.0), fs);
        assert!((spec.centroid_hz() - 12.0).abs() < 2.0);
    }

    #[test]
    fn dc_offset_does_not_leak_into_power() {
        let fs = 100.0;
        let flat: heapless::Vec<f32, WINDOW_CAPACITY> = (0..128).map(|_| 3.0).collect();
        let spec = power_spectrum(&flat, fs);
        // Hann tapering smears a little DC into bin 1; the tail stays quiet
        assert!(spec.band_power(5.0, 50.0) < 1e-6);
    }

    #[test]
    fn non_power_of_two_yields_empty() {
        let signal = [1.0f32; 100];
        let spec = power_spectrum(&signal, 100.0);
        assert!(spec.is_empty());
        assert_eq!(spec.total_power(), 0.0);
    }

    #[test]
    fn band_power_sums_to_total() {
        let fs = 100.0;
        let mut signal = sine(256, 7.0, fs, 1.0);
        for (i, v) in signal.iter_mut().enumerate() {
            *v += 0.3 * sinf(2.0 * core::f32::consts::PI * 31.0 * i as f32 / fs);
        }
        let spec = power_spectrum(&signal, fs);
        let split = spec.band_power(0.0, 20.0) + spec.band_power(20.0, fs / 2.0 + 1.0);
        let total = spec.total_power();
        assert!((split - total).abs() < total * 0.01 + 1e-9);
    }
}
