use super::{Entity, EntityKind};
use crate::codec::{RecordReader, RecordWriter};
use quadra_common::Result;
use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    Admin = 0,
    Student = 1,
    Teacher = 2,
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Admin),
            1 => Ok(Self::Student),
            2 => Ok(Self::Teacher),
            other => Err(format!("unknown role {}", other)),
        }
    }
}

/// Login record, keyed by email. The password hash is stored as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuth {
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub name: String,
}

impl Entity for UserAuth {
    const KIND: EntityKind = EntityKind::UserAuth;

    fn key(&self) -> String {
        self.email.clone()
    }

    fn encode(&self) -> String {
        RecordWriter::new()
            .str(&self.user_id)
            .str(&self.email)
            .str(&self.password_hash)
            .num(self.role as u8)
            .str(&self.name)
            .finish()
    }

    fn decode(line: &str) -> Result<Self> {
        let mut r = RecordReader::new(Self::KIND.name(), line, 5)?;
        let user_id = r.str()?;
        let email = r.key()?;
        let password_hash = r.str()?;
        let role = Role::try_from(r.num::<u8>()?).map_err(|e| r.error(e))?;
        let name = r.str()?;
        Ok(Self {
            user_id,
            email,
            password_hash,
            role,
            name,
        })
    }
}
