pub use self::error::NickStoreError;
pub use self::nick_store::{NICK_FLUSH_INTERVAL, NickStore};

pub mod error;
pub mod nick_store;
