use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, hash::Hash, str::FromStr};

use crate::{error::ServerError, store::Store};

/// Token abstraction to store game codes as fixed length byte slices rather
/// than strings. Makes them cheap to compare, generate, and serialize.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize)]
#[serde(try_from = "String")]
pub struct GameToken([u8; GameToken::LENGTH]);

impl Hash for GameToken {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl GameToken {
    const LENGTH: usize = 5;
    const CHARSET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Creates a unique random token that isn't already present in the store.
    pub async fn unique_token(store: &Store) -> Result<GameToken, ServerError> {
        const RANGE: usize = GameToken::CHARSET.len();

        loop {
            let mut rand = OsRng;
            let mut token = Self([0u8; Self::LENGTH]);

            for at in token.0.iter_mut() {
                loop {
                    let var = (rand.next_u32() >> (32 - 6)) as usize;
                    if var < RANGE {
                        *at = Self::CHARSET[var];
                        break;
                    }
                }
            }

            if !store.game_exists(&token).await? {
                return Ok(token);
            }
        }
    }
}

impl Serialize for GameToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let token = unsafe { std::str::from_utf8_unchecked(&self.0) };
        serializer.serialize_str(token)
    }
}

impl FromStr for GameToken {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_uppercase();

        if s.len() != GameToken::LENGTH {
            return Err(ServerError::InvalidToken);
        }

        let bytes = s.as_bytes();
        if bytes
            .iter()
            .any(|value| !GameToken::CHARSET.contains(value))
        {
            return Err(ServerError::InvalidToken);
        }

        let mut output = [0u8; GameToken::LENGTH];
        output.copy_from_slice(bytes);
        Ok(Self(output))
    }
}

impl TryFrom<String> for GameToken {
    type Error = ServerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Display for GameToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = unsafe { std::str::from_utf8_unchecked(&self.0) };
        f.write_str(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let token: GameToken = "ABCDE".parse().expect("valid token");
        assert_eq!(token.to_string(), "ABCDE");
    }

    #[test]
    fn lowercase_input_is_normalized() {
        let token: GameToken = "abcde".parse().expect("valid token");
        assert_eq!(token.to_string(), "ABCDE");
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("ABCD".parse::<GameToken>().is_err());
        assert!("ABCDEF".parse::<GameToken>().is_err());
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!("AB!DE".parse::<GameToken>().is_err());
    }
}
