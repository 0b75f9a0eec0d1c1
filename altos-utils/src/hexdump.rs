use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;
// Address, four groups of four bytes, two bars and a newline, plus the ASCII.
const LINE_WIDTH: usize = 7 + 4 * 13 + 3 + BYTES_PER_LINE + 1;

/// Format the given bytes as a hex block, sixteen bytes per line, with the
/// printable ASCII alongside. The listed addresses start from `start`.
pub fn hex_dump(buf: &[u8], start: usize) -> String {
    let mut out = String::with_capacity((buf.len() / BYTES_PER_LINE + 1) * LINE_WIDTH);
    for (line, chunk) in buf.chunks(BYTES_PER_LINE).enumerate() {
        if line != 0 {
            out.push('\n');
        }
        write!(out, "{:#06X} ", start + line * BYTES_PER_LINE).unwrap();
        for i in 0..BYTES_PER_LINE {
            // Extra gap between each group of four.
            if i % 4 == 0 {
                out.push(' ');
            }
            match chunk.get(i) {
                Some(byte) => write!(out, " {:02X}", byte).unwrap(),
                None => out.push_str("   "),
            }
        }
        out.push_str("  |");
        out.extend(chunk.iter().map(|&byte| printable(byte)));
        out.push('|');
    }
    out
}

fn printable(byte: u8) -> char {
    match byte {
        32..=126 => byte.into(),
        _ => '.',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(hex_dump(&[], 0), "");
    }

    #[test]
    fn test_full_line() {
        let dump = hex_dump(b"ABCDEFGHIJKLMNOP", 0);
        assert!(dump.starts_with("0x0000   41 42 43 44   45"));
        assert!(dump.ends_with("  |ABCDEFGHIJKLMNOP|"));
        assert!(!dump.contains('\n'));
    }

    #[test]
    fn test_partial_line_is_padded() {
        let mut buf = b"ABCDEFGHIJKLMNOP".to_vec();
        buf.extend_from_slice(&[0x00, 0xFE, b'z']);
        let dump = hex_dump(&buf, 0x200);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0x0200"));
        assert!(lines[1].starts_with("0x0210   00 FE 7A"));
        assert!(lines[1].ends_with("|..z|"));
        // The ASCII column lines up even on a short final line.
        assert_eq!(lines[0].find('|'), lines[1].find('|'));
    }
}
