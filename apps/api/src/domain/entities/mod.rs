pub mod analytics;
pub mod form;
pub mod gateway_event;
pub mod link;
pub mod payment_status;
pub mod social_link;
pub mod subscription;
pub mod system_settings;
pub mod theme;
pub mod user;
