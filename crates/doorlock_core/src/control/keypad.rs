//! Passcode entry buffer and the shuffled keypad layout.

use crate::passcode::PASSCODE_LEN;
use rand::seq::SliceRandom;
use rand::Rng;

/// Digits typed so far in one entry session. Holds at most six.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasscodeBuffer {
    digits: String,
}

impl PasscodeBuffer {
    /// Appends a digit. Rejects non-digits and anything past the sixth.
    pub fn push(&mut self, digit: u8) -> bool {
        if digit > 9 || self.is_complete() {
            return false;
        }
        self.digits.push(char::from(b'0' + digit));
        true
    }

    /// Removes the last digit; a no-op on an empty buffer.
    pub fn pop(&mut self) -> bool {
        self.digits.pop().is_some()
    }

    pub fn clear(&mut self) {
        self.digits.clear();
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.digits.len() == PASSCODE_LEN
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }
}

/// Digit shown at each keypad position. Reshuffled per entry session so
/// key positions reveal nothing to an onlooker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeypadLayout([u8; 10]);

impl KeypadLayout {
    pub fn ordered() -> Self {
        Self([1, 2, 3, 4, 5, 6, 7, 8, 9, 0])
    }

    /// A uniformly random permutation of 0-9 (Fisher-Yates).
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut keys = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        keys.shuffle(rng);
        Self(keys)
    }

    pub fn digit_at(&self, position: usize) -> Option<u8> {
        self.0.get(position).copied()
    }

    pub fn keys(&self) -> [u8; 10] {
        self.0
    }
}

impl Default for KeypadLayout {
    fn default() -> Self {
        Self::ordered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn seventh_digit_is_rejected() {
        let mut buffer = PasscodeBuffer::default();
        for d in [1, 2, 3, 4, 5, 6] {
            assert!(buffer.push(d));
        }
        assert!(!buffer.push(7));
        assert_eq!(buffer.as_str(), "123456");
    }

    #[test]
    fn pop_on_empty_buffer_is_a_no_op() {
        let mut buffer = PasscodeBuffer::default();
        assert!(!buffer.pop());
        assert!(buffer.is_empty());
    }

    #[test]
    fn shuffled_layout_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let mut keys = KeypadLayout::shuffled(&mut rng).keys();
            keys.sort_unstable();
            assert_eq!(keys, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        }
    }
}
