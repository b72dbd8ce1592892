const EPSILON: f32 = 1e-6;

/// Scales `samples` in place so the peak absolute amplitude is 1.
/// Silence is left untouched.
pub fn normalize_peak(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |max, &s| max.max(s.abs()));
    if peak > EPSILON {
        for sample in samples.iter_mut() {
            *sample /= peak;
        }
    }
}

/// Scales `vec` in place to unit L2 length. Near-zero vectors are left as-is
/// rather than dividing by a vanishing norm.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > EPSILON {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}
