//! Save/Load for the whole game.
//!
//! Uses bincode for a compact binary snapshot. The routing cache is not
//! saved; it rebuilds on first use after a load.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use supplyline_logic::config::GameConfig;
use thiserror::Error;

use crate::engine::World;
use crate::treasury::Treasury;

/// Bump whenever `SaveData` changes shape.
pub const SAVE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    /// Seed the engine was created with. The generator RNG is reseeded from
    /// this and the saved day on load.
    pub seed: u64,
    pub config: GameConfig,
    pub world: World,
    pub treasury: Treasury,
}

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),

    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

pub fn save_game<W: Write>(writer: W, data: &SaveData) -> Result<(), SaveError> {
    bincode::serialize_into(writer, data)?;
    Ok(())
}

pub fn load_game<R: Read>(reader: R) -> Result<SaveData, SaveError> {
    let data: SaveData = bincode::deserialize_from(reader)?;
    if data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: data.version,
        });
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(version: u32) -> SaveData {
        SaveData {
            version,
            seed: 5,
            config: GameConfig::default(),
            world: World::default(),
            treasury: Treasury::new(),
        }
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut buf = Vec::new();
        save_game(&mut buf, &empty(SAVE_VERSION + 1)).unwrap();
        match load_game(buf.as_slice()) {
            Err(SaveError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, SAVE_VERSION);
                assert_eq!(found, SAVE_VERSION + 1);
            }
            other => panic!("expected a version mismatch, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let mut buf = Vec::new();
        save_game(&mut buf, &empty(SAVE_VERSION)).unwrap();
        buf.truncate(buf.len() / 2);
        assert!(load_game(buf.as_slice()).is_err());
    }
}
