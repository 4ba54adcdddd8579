//! Install bridge: hands ready artifacts to the platform installer.
//!
//! The registry never talks to the platform directly. It resolves the
//! artifact path of a ready task and passes it to an [`InstallBridge`].
//! [`CommandInstaller`] is the stock bridge; it runs an external program
//! such as `adb install` with the path substituted into its arguments.

mod command;
mod config;
mod error;
mod traits;

pub use command::CommandInstaller;
pub use config::{InstallerConfig, PACKAGE_PLACEHOLDER, PATH_PLACEHOLDER};
pub use error::InstallError;
pub use traits::InstallBridge;
