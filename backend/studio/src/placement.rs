use sceneforge_core::Position;
use uuid::Uuid;

/// Random point in a cube of side `extent` centred on the origin, drawn from
/// the bytes of a fresh v4 uuid.
pub fn spawn_position(extent: f64) -> Position {
    let extent = if extent.is_finite() && extent > 0.0 { extent } else { 0.0 };
    let id = Uuid::new_v4();
    let bytes = id.as_bytes();
    let axis = |i: usize| {
        let raw = u16::from_be_bytes([bytes[i], bytes[i + 1]]);
        (f64::from(raw) / f64::from(u16::MAX) - 0.5) * extent
    };
    Position::new(axis(0), axis(2), axis(4)).unwrap_or_default()
}

/// Pick one of `n` choices from a fresh uuid.
pub(crate) fn random_index(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    Uuid::new_v4().as_bytes()[15] as usize % n
}

pub(crate) fn random_color() -> String {
    let id = Uuid::new_v4();
    let b = id.as_bytes();
    format!("#{:02x}{:02x}{:02x}", b[0], b[1], b[2])
}
