pub mod usermodel;
pub mod workermodel;
pub mod jobmodel;
pub mod paymentmodel;
pub mod reviewmodel;
pub mod notificationmodel;
