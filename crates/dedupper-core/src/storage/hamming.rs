/// Hamming distance between two decimal-encoded perceptual hashes.
///
/// Returns `None` ("incomparable") when either side is absent, empty or not a
/// decimal number. Callers must never read `None` as a zero distance.
pub fn hamming_distance(a: Option<&str>, b: Option<&str>) -> Option<u32> {
    let a = parse_hash(a?)?;
    let b = parse_hash(b?)?;
    Some((a ^ b).count_ones())
}

fn parse_hash(value: &str) -> Option<u128> {
    if value.is_empty() {
        return None;
    }
    value.parse::<u128>().ok()
}
