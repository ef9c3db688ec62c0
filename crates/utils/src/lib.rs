pub mod api;
pub mod build_info;
pub mod slug;
