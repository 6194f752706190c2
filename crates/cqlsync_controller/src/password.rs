//! Passwords for newly created roles.

use cqlsync_protocol::defaults::GENERATED_PASSWORD_LENGTH;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::PasswordError;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of the alphabet size that fits in a byte; bytes at or
/// above it are rejected so every character is equally likely.
const REJECT_FROM: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Produces an unpredictable secret string.
pub trait PasswordGenerator: Send + Sync {
    fn generate(&self) -> Result<String, PasswordError>;
}

/// Alphanumeric passwords from the operating system CSPRNG.
///
/// Output never contains a quote, so it can be inlined into a
/// `PASSWORD = '...'` literal as is.
#[derive(Debug, Clone, Copy)]
pub struct RandomPassword {
    length: usize,
}

impl RandomPassword {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomPassword {
    fn default() -> Self {
        Self::new(GENERATED_PASSWORD_LENGTH)
    }
}

impl PasswordGenerator for RandomPassword {
    fn generate(&self) -> Result<String, PasswordError> {
        let mut password = String::with_capacity(self.length);
        let mut buf = [0u8; 64];
        while password.len() < self.length {
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|e| PasswordError(e.to_string()))?;
            for byte in buf.iter().copied().filter(|b| *b < REJECT_FROM) {
                if password.len() == self.length {
                    break;
                }
                password.push(ALPHABET[usize::from(byte) % ALPHABET.len()] as char);
            }
        }
        Ok(password)
    }
}

/// Always returns the same password. For tests and dry runs.
#[derive(Debug, Clone)]
pub struct FixedPassword(pub String);

impl PasswordGenerator for FixedPassword {
    fn generate(&self) -> Result<String, PasswordError> {
        Ok(self.0.clone())
    }
}
