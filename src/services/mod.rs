pub mod registration_service;
pub mod response_mapper;
pub mod survey_service;
