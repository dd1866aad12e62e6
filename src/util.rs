use std::fmt::Write;

/// Render bytes the way they are traced on the wire: "0x0d 0x0a".
pub(crate) fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 5);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "0x{byte:02x}");
    }
    out
}
