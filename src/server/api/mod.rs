pub mod api_controller;
pub mod health_controller;
pub mod proxy_controller;
pub mod restream_controller;
