pub mod autostart;
pub mod detach;
pub mod registry;
pub mod services;
pub mod shortcuts;
pub mod status;
pub mod switcher;
pub mod users;

pub use autostart::AutostartConfigurator;
pub use detach::SelfReexec;
pub use registry::Registry;
pub use services::{ServiceControl, ShellController};
pub use shortcuts::ShortcutInstaller;
pub use switcher::Switcher;
