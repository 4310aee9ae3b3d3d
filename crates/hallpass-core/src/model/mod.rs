mod reservation;
mod room;
mod user;

pub use reservation::*;
pub use room::*;
pub use user::*;
