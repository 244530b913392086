pub mod background_jobs;
pub mod cloudinary;
pub mod error;
pub mod firebase_auth;
pub mod job_service;
pub mod notification_service;
pub mod payment_provider;
pub mod payment_service;
pub mod review_service;
