mod app;
mod view;

pub use app::{PortalApp, Sources};
pub use view::{ListIcon, PortalView};
