/// Moves `value` toward `target` for a frame of `dt` seconds.
///
/// `slide_time` is 0..=100; 100 gives a time constant of half a second.
pub fn apply_slide(value: f32, target: f32, slide_time: i32, dt: f32) -> f32 {
    if slide_time <= 0 || dt <= 0.0 {
        return target;
    }
    let time_constant = slide_time as f32 * 0.005;
    let factor = 1.0 - (-dt / time_constant).exp();
    let next = value + (target - value) * factor;
    if (target - next).abs() < 1e-4 {
        target
    } else {
        next
    }
}
