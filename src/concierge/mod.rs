pub mod compare;
pub mod dashboard;
pub mod history;
pub mod intake;
pub mod listing;
pub mod mortgage;
pub mod property_chat;
pub mod tour;
pub mod view;
pub mod visits;
