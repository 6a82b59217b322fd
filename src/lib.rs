//! Automates sign-in to an Authing SSO portal inside a controlled Chrome
//! instance, captures the SAML response posted to an AWS federation endpoint
//! from browser network traffic, and exchanges it for temporary credentials
//! via STS `AssumeRoleWithSAML`.

pub mod aws;
pub mod browser;
pub mod capture;
pub mod cli;
pub mod commands;
pub mod constants;
pub mod error;
pub mod portal;
pub mod saml;

pub use error::{Error, Result};
