pub mod role_catalog;
pub mod username_filter;
