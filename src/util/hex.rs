pub fn hex(src: &[u8]) -> String {
    src.iter()
        .map(|x| format!("{:02x}", x))
        .collect::<Vec<_>>()
        .concat()
}

/// Hex of at most `n` leading bytes, for logging long records.
pub fn prefix(src: &[u8], n: usize) -> String {
    if src.len() <= n {
        hex(src)
    } else {
        format!("{}..({} bytes)", hex(&src[..n]), src.len())
    }
}
