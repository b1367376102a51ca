//! The 21-byte user-info record packed into `FETCH_USERS` response bodies.

use crate::cursor::{Reader, Underrun};

/// Wire size of one [`UserInfo`] record.
pub const USER_INFO_SIZE: usize = 21;

/// Fixed width of the ASCII name field within a record.
const NAME_FIELD_SIZE: usize = 16;

/// One entry in a `FETCH_USERS` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: u32,
    pub connected: bool,
    /// Right-padded with zero bytes up to [`NAME_FIELD_SIZE`] on the wire.
    pub name: String,
}

impl UserInfo {
    pub fn pack(&self) -> [u8; USER_INFO_SIZE] {
        let mut out = [0u8; USER_INFO_SIZE];
        out[0..4].copy_from_slice(&self.id.to_le_bytes());
        out[4] = self.connected as u8;
        let name_bytes = self.name.as_bytes();
        let n = name_bytes.len().min(NAME_FIELD_SIZE);
        out[5..5 + n].copy_from_slice(&name_bytes[..n]);
        out
    }

    pub fn unpack(bytes: &[u8; USER_INFO_SIZE]) -> Self {
        let id = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let connected = bytes[4] != 0;
        let name_raw = &bytes[5..5 + NAME_FIELD_SIZE];
        let end = name_raw.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_SIZE);
        let name = String::from_utf8_lossy(&name_raw[..end]).into_owned();
        UserInfo { id, connected, name }
    }

    /// Unpack every whole [`USER_INFO_SIZE`]-byte record out of a body,
    /// as used when assembling a `FETCH_USERS` response.
    pub fn unpack_many(body: &[u8]) -> Result<Vec<UserInfo>, Underrun> {
        let mut reader = Reader::new(body);
        let mut out = Vec::with_capacity(body.len() / USER_INFO_SIZE);
        while !reader.remaining().is_empty() {
            let chunk = reader.get_bytes(USER_INFO_SIZE)?;
            out.push(UserInfo::unpack(chunk.try_into().unwrap()));
        }
        Ok(out)
    }
}
