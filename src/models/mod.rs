pub mod meetup;
pub mod message;
pub mod participation;
pub mod session;
pub mod trip;
pub mod user;
