pub mod api_dto;
pub mod health_dto;
pub mod restream_dto;
pub mod search_dto;
