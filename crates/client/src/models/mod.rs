//! Marketplace domain types as exchanged with the backend.
//!
//! Field names follow the backend's camelCase JSON; document ids arrive as
//! `_id` and are wrapped in the newtypes from `renomarket-core`.

pub mod cart;
pub mod catalog;
pub mod messaging;
pub mod user;

pub use cart::{Cart, CartItem, CartProduct};
pub use catalog::{
    Article, ForumTopic, Ideabook, IdeabookItem, IdeabookItemKind, ListQuery, Listing, Product,
    Professional, Project, SearchSuggestion, SuggestionKind,
};
pub use messaging::{Conversation, Message, MessageSender, Participant};
pub use user::{ProfessionalInfo, RegisterRequest, User, UserPatch};
