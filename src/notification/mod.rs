pub mod gate;
pub mod mailer;
pub mod models;
