use rand::Rng;
use std::fmt;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_LENGTH: usize = 6;

/// Short code players share to meet in a room. Always uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalizes user input (surrounding whitespace, lowercase) into a code.
    pub fn parse(input: &str) -> Self {
        Self(input.trim().to_ascii_uppercase())
    }

    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..CODE_LENGTH)
            .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn generate_unique<F>(exists: F) -> Self
    where
        F: Fn(&RoomCode) -> bool,
    {
        loop {
            let code = Self::generate();
            if !exists(&code) {
                return code;
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
