pub mod daemon;
pub mod diff;
pub mod fetch;
pub mod init;
pub mod run;
pub mod status;
pub mod transform;
