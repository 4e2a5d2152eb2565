/// Display hue in degrees `[0, 360)`. Purely cosmetic.
pub fn random_hue() -> u16 {
    (uuid::Uuid::new_v4().as_u128() % 360) as u16
}

/// CSS color string for a field outline.
pub fn hsl_css(hue: u16) -> String {
    format!("hsl({}, 70%, 50%)", hue % 360)
}
