//! Incremental UTF-8 decoding for byte sources that split characters across reads.
//!
//! Invalid sequences decode to U+FFFD and decoding continues, so a bad byte
//! never stalls the stream.

/// Stateful decoder holding at most one incomplete UTF-8 sequence between calls.
#[derive(Clone, Debug, Default)]
pub struct Utf8StreamDecoder {
    carry: [u8; 4],
    carry_len: usize,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while an incomplete sequence from a previous chunk is held back.
    pub fn has_pending(&self) -> bool {
        self.carry_len != 0
    }

    /// Decode `bytes`, returning the text that is complete so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());
        self.decode_into(&mut out, bytes);
        out
    }

    pub fn decode_into(&mut self, out: &mut String, mut bytes: &[u8]) {
        // The carry never exceeds 3 bytes, so each round borrows at most enough
        // bytes from the chunk to complete one 4-byte window.
        while self.carry_len > 0 && !bytes.is_empty() {
            let take = (self.carry.len() - self.carry_len).min(bytes.len());
            let mut window = [0u8; 4];
            window[..self.carry_len].copy_from_slice(&self.carry[..self.carry_len]);
            window[self.carry_len..self.carry_len + take].copy_from_slice(&bytes[..take]);
            let window_len = self.carry_len + take;
            bytes = &bytes[take..];

            let tail = decode_lossy(out, &window[..window_len]);
            self.set_carry(tail);
        }

        if !bytes.is_empty() {
            let tail = decode_lossy(out, bytes);
            self.set_carry(tail);
        }
    }

    /// Flush a held-back sequence as U+FFFD so a truncated source is never
    /// silently shortened.
    pub fn finish(&mut self) -> String {
        if self.carry_len == 0 {
            return String::new();
        }
        let text = String::from_utf8_lossy(&self.carry[..self.carry_len]).into_owned();
        self.carry_len = 0;
        text
    }

    fn set_carry(&mut self, tail: &[u8]) {
        debug_assert!(tail.len() < self.carry.len(), "incomplete UTF-8 tail too long");
        let len = tail.len().min(self.carry.len() - 1);
        self.carry[..len].copy_from_slice(&tail[..len]);
        self.carry_len = len;
    }
}

/// Decode everything decodable in `bytes` into `out` and return the trailing
/// incomplete sequence, if any.
fn decode_lossy<'a>(out: &mut String, mut bytes: &'a [u8]) -> &'a [u8] {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                out.push_str(text);
                return &[];
            }
            Err(err) => {
                let (valid, rest) = bytes.split_at(err.valid_up_to());
                if let Ok(text) = std::str::from_utf8(valid) {
                    out.push_str(text);
                }
                match err.error_len() {
                    Some(len) => {
                        out.push('\u{FFFD}');
                        bytes = &rest[len..];
                    }
                    None => return rest,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_byte_character_split_across_chunks() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[0xC3]), "");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(&[0x97]), "\u{00D7}");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn carry_completes_and_rest_of_chunk_decodes() {
        let mut decoder = Utf8StreamDecoder::new();
        // F0 9F 98 80 is U+1F600.
        assert_eq!(decoder.decode(&[b'<', 0xF0, 0x9F]), "<");
        assert_eq!(decoder.decode(&[0x98, 0x80, b'>', b'x']), "\u{1F600}>x");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn one_byte_at_a_time_matches_whole_input() {
        let input = "caf\u{00E9} \u{20AC}5 \u{1F600}<p>";
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        for byte in input.as_bytes() {
            decoder.decode_into(&mut out, std::slice::from_ref(byte));
        }
        out.push_str(&decoder.finish());
        assert_eq!(out, input);
    }

    #[test]
    fn back_to_back_incomplete_sequences() {
        let mut decoder = Utf8StreamDecoder::new();
        // E2 82 AC is U+20AC.
        assert_eq!(decoder.decode(&[0xE2]), "");
        assert_eq!(decoder.decode(&[0x82, 0xAC, 0xE2]), "\u{20AC}");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(&[0x82, 0xAC]), "\u{20AC}");
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[0xFF, b'f']), "\u{FFFD}f");
        // A lead byte followed by ASCII is not a sequence.
        assert_eq!(decoder.decode(&[0xE2]), "");
        assert_eq!(decoder.decode(b"ab"), "\u{FFFD}ab");
    }

    #[test]
    fn finish_flushes_truncated_sequence() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[0xE2, 0x82]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert!(!decoder.has_pending());
        assert_eq!(decoder.finish(), "");
    }
}
