pub mod admin;
pub mod affiliate;
pub mod init;
pub mod school;
pub mod token;
