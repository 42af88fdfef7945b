pub mod dispatcher_service;
pub mod refresh_service;
#[cfg(feature = "web")]
pub mod webserver_service;

pub use dispatcher_service::DispatcherService;
pub use refresh_service::RefreshService;
#[cfg(feature = "web")]
pub use webserver_service::WebserverService;
