pub mod admin;
pub mod categories;
pub mod jobs;
pub mod notifications;
pub mod payments;
pub mod reviews;
pub mod users;
pub mod workers;
