/// Frame sampling and per-frame signal metrics.
///
/// The engine scores from byte-level signal statistics: the payload is cut
/// into fixed-size sample windows ("frames") at an even stride, and each frame
/// yields three normalized metrics in [0, 1]. Everything here is pure
/// integer/float arithmetic over the input bytes, so identical bytes always
/// produce identical metrics.

pub const FRAME_SIZE: usize = 4096;
pub const MAX_FRAMES: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetrics {
    /// Mean absolute deviation of sample values, normalized.
    pub energy: f64,
    /// Shannon entropy over 16 value buckets, normalized by the 4-bit maximum.
    pub entropy: f64,
    /// Absolute change of the frame mean against the previous frame.
    pub motion: f64,
}

/// Cut the payload into up to MAX_FRAMES windows of FRAME_SIZE bytes. Frames
/// are spread across the whole payload: short clips are sampled back to back,
/// long ones at a wider stride so late content still contributes.
pub fn sample_frames(payload: &[u8]) -> Vec<FrameMetrics> {
    let frame_count = (payload.len() / FRAME_SIZE).min(MAX_FRAMES);
    if frame_count == 0 {
        return Vec::new();
    }
    let stride = payload.len() / frame_count;

    let mut frames = Vec::with_capacity(frame_count);
    let mut prev_mean: Option<f64> = None;
    for i in 0..frame_count {
        let start = i * stride;
        let end = (start + FRAME_SIZE).min(payload.len());
        let window = &payload[start..end];

        let mean = byte_mean(window);
        let motion = match prev_mean {
            Some(prev) => (mean - prev).abs() / 255.0,
            None => 0.0,
        };
        prev_mean = Some(mean);

        frames.push(FrameMetrics {
            energy: mean_abs_deviation(window) / 128.0,
            entropy: bucket_entropy(window),
            motion,
        });
    }
    frames
}

fn byte_mean(window: &[u8]) -> f64 {
    let sum: u64 = window.iter().map(|&b| b as u64).sum();
    sum as f64 / window.len() as f64
}

fn mean_abs_deviation(window: &[u8]) -> f64 {
    let sum: u64 = window
        .iter()
        .map(|&b| (b as i64 - 128).unsigned_abs())
        .sum();
    sum as f64 / window.len() as f64
}

fn bucket_entropy(window: &[u8]) -> f64 {
    let mut buckets = [0u32; 16];
    for &b in window {
        buckets[(b >> 4) as usize] += 1;
    }
    let total = window.len() as f64;
    let mut entropy = 0.0;
    for &count in &buckets {
        if count > 0 {
            let p = count as f64 / total;
            entropy -= p * p.log2();
        }
    }
    // 16 buckets, so 4 bits is the ceiling
    entropy / 4.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_yields_no_frames() {
        assert!(sample_frames(&[]).is_empty());
        assert!(sample_frames(&[0u8; FRAME_SIZE - 1]).is_empty());
    }

    #[test]
    fn constant_payload_has_zero_entropy_and_motion() {
        let payload = vec![128u8; FRAME_SIZE * 4];
        let frames = sample_frames(&payload);
        assert_eq!(frames.len(), 4);
        for frame in &frames {
            assert_eq!(frame.entropy, 0.0);
            assert_eq!(frame.motion, 0.0);
            assert_eq!(frame.energy, 0.0);
        }
    }

    #[test]
    fn metrics_stay_normalized() {
        let payload: Vec<u8> = (0..FRAME_SIZE * 16).map(|i| (i * 31 % 251) as u8).collect();
        for frame in sample_frames(&payload) {
            assert!((0.0..=1.0).contains(&frame.energy));
            assert!((0.0..=1.0).contains(&frame.entropy));
            assert!((0.0..=1.0).contains(&frame.motion));
        }
    }

    #[test]
    fn long_payloads_cap_at_max_frames() {
        let payload = vec![7u8; FRAME_SIZE * (MAX_FRAMES + 40)];
        assert_eq!(sample_frames(&payload).len(), MAX_FRAMES);
    }

    #[test]
    fn sampling_is_deterministic() {
        let payload: Vec<u8> = (0..FRAME_SIZE * 8).map(|i| (i % 256) as u8).collect();
        assert_eq!(sample_frames(&payload), sample_frames(&payload));
    }
}
