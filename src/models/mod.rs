pub mod appointment;
pub mod doctor;
pub mod enums;
pub mod hospital;
pub mod medical_record;
pub mod schedule;
pub mod user;

pub use appointment::*;
pub use doctor::*;
pub use enums::*;
pub use hospital::*;
pub use medical_record::*;
pub use schedule::*;
pub use user::*;
