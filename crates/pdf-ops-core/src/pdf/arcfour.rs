//! RC4 stream cipher used by the Standard Security Handler.

/// RC4 keystream generator. Encryption and decryption are the same
/// operation.
pub struct Arcfour {
    state: [u8; 256],
    i: u8,
    j: u8,
}

impl Arcfour {
    /// Key schedule for a 1..=256 byte key. An empty key behaves like a
    /// single zero byte.
    pub fn new(key: &[u8]) -> Self {
        let key: &[u8] = if key.is_empty() { &[0] } else { key };

        #[allow(clippy::cast_possible_truncation)]
        let mut state: [u8; 256] = std::array::from_fn(|i| i as u8);

        let mut j: u8 = 0;
        for i in 0..256 {
            j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
            state.swap(i, usize::from(j));
        }

        Self { state, i: 0, j: 0 }
    }

    /// XOR `data` with the keystream and return the result.
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        data.iter().map(|byte| byte ^ self.next_byte()).collect()
    }

    /// One-shot helper: fresh cipher, one message.
    pub fn apply(key: &[u8], data: &[u8]) -> Vec<u8> {
        Self::new(key).process(data)
    }

    fn next_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.state[usize::from(self.i)]);
        self.state.swap(usize::from(self.i), usize::from(self.j));

        let idx = self.state[usize::from(self.i)].wrapping_add(self.state[usize::from(self.j)]);
        self.state[usize::from(idx)]
    }
}
