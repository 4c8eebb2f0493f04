pub mod catalog_services;
pub mod client_id_services;
pub mod frontend_services;
pub mod restream_services;
pub mod stream_services;

pub use catalog_services::DynCatalogService;
pub use client_id_services::DynClientIdService;
pub use frontend_services::FrontendServices;
pub use restream_services::DynRestreamService;
pub use stream_services::DynStreamService;
