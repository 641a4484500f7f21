pub mod run;
pub mod transcript;
