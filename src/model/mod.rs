mod application;
mod service_entry;

pub use application::{AppKind, Application};
pub use service_entry::{Privilege, ServiceClass, ServiceEntry};
