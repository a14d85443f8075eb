/// Whether the temperature moved far enough since the last fan write to act again.
///
/// The first reading (`last_acted_temp` unset) always acts. A `hysteresis` of 0
/// acts on every tick.
pub fn should_act(current_temp: i32, last_acted_temp: Option<i32>, hysteresis: u32) -> bool {
    match last_acted_temp {
        None => true,
        Some(last) => current_temp.abs_diff(last) >= hysteresis,
    }
}
