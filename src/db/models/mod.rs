//! Database models split into separate files.

pub mod dashboard;
pub mod team;
pub mod user;

pub use self::dashboard::*;
pub use self::team::*;
pub use self::user::*;
